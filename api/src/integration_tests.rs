//! End-to-end service flows for the studio backend
//!
//! These wire the real application services over the in-memory adapters:
//! 1. Guest fills a cart
//! 2. Guest registers and the cart follows them
//! 3. Checkout books an appointment
//! 4. Staff bill the appointment and split it into installments
//! 5. Payments settle the bill and credit loyalty
//!
//! Run with: cargo test integration_tests

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use chrono::{Duration, Utc};

    use crate::app::{
        generate_guest_token, AddItem, AppointmentService, AuditService, AuthService,
        BillRequest, BillingService, CartService, CheckoutRequest, InstallmentRequest,
        NotificationService, PaymentRequest, Registration, StatusChange,
    };
    use crate::auth::TokenIssuer;
    use crate::domain::entities::*;
    use crate::domain::ports::{AuditLogRepository, MemberRepository};
    use crate::test_utils::{
        test_artist, test_branch, test_manager, test_service, test_user,
        InMemoryAppointmentRepository, InMemoryArtistRepository, InMemoryAuditLogRepository,
        InMemoryBillingRepository, InMemoryBranchRepository, InMemoryCartRepository,
        InMemoryMemberRepository, InMemoryNotificationRepository, InMemoryServiceRepository,
        InMemoryUserRepository,
    };

    type Auth = AuthService<InMemoryUserRepository, InMemoryMemberRepository>;
    type Carts = CartService<
        InMemoryCartRepository,
        InMemoryServiceRepository,
        InMemoryBranchRepository,
        InMemoryArtistRepository,
    >;
    type Appointments = AppointmentService<
        InMemoryAppointmentRepository,
        InMemoryArtistRepository,
        InMemoryBranchRepository,
        InMemoryMemberRepository,
        InMemoryNotificationRepository,
        InMemoryAuditLogRepository,
    >;
    type Billing = BillingService<
        InMemoryBillingRepository,
        InMemoryAppointmentRepository,
        InMemoryMemberRepository,
        InMemoryNotificationRepository,
        InMemoryAuditLogRepository,
    >;

    struct Studio {
        auth: Auth,
        carts: Carts,
        appointments: Appointments,
        billing: Billing,
        members: Arc<InMemoryMemberRepository>,
        notifications: Arc<InMemoryNotificationRepository>,
        audit_logs: Arc<InMemoryAuditLogRepository>,
        branch: Branch,
        artist: Artist,
        service: Service,
    }

    fn studio() -> Studio {
        let branch = test_branch("Hongdae");
        let artist = test_artist(branch.id);
        let service = test_service("Fine line", 30_000);

        let users = Arc::new(InMemoryUserRepository::new());
        let members = Arc::new(InMemoryMemberRepository::new());
        let branches = Arc::new(InMemoryBranchRepository::new().with_branch(branch.clone()));
        let services = Arc::new(InMemoryServiceRepository::new().with_service(service.clone()));
        let artists = Arc::new(InMemoryArtistRepository::new().with_artist(artist.clone()));
        let appointment_repo = Arc::new(InMemoryAppointmentRepository::new());
        let notifications = Arc::new(InMemoryNotificationRepository::new());
        let audit_logs = Arc::new(InMemoryAuditLogRepository::new());

        let audit = Arc::new(AuditService::new(audit_logs.clone()));
        let notification_service = Arc::new(NotificationService::new(notifications.clone()));

        let tokens = TokenIssuer::new(
            "integration-access".to_string(),
            "integration-refresh".to_string(),
            Duration::minutes(15),
            Duration::days(7),
        );

        Studio {
            auth: AuthService::new(users, members.clone(), tokens),
            carts: CartService::new(
                Arc::new(InMemoryCartRepository::new()),
                services,
                branches.clone(),
                artists.clone(),
            ),
            appointments: AppointmentService::new(
                appointment_repo.clone(),
                artists,
                branches,
                members.clone(),
                notification_service.clone(),
                audit.clone(),
            ),
            billing: BillingService::new(
                Arc::new(InMemoryBillingRepository::new()),
                appointment_repo,
                members.clone(),
                notification_service,
                audit,
            ),
            members,
            notifications,
            audit_logs,
            branch,
            artist,
            service,
        }
    }

    fn registration(email: &str) -> Registration {
        Registration {
            email: email.to_string(),
            password: "ink-and-needles".to_string(),
            name: "Jun".to_string(),
            phone: None,
        }
    }

    fn add(service: &Service) -> AddItem {
        AddItem {
            service_id: service.id,
            selection: VariantSelection::default(),
            quantity: 1,
            notes: Some("Left forearm".to_string()),
            reference_images: vec![],
        }
    }

    /// Register, fill the cart and check out; returns the member user and booking
    async fn book(studio: &Studio, email: &str) -> (User, Appointment) {
        let session = studio.auth.register(registration(email)).await.unwrap();
        let owner = CartOwner::Member(session.user.id);
        studio.carts.add_item(&owner, add(&studio.service)).await.unwrap();

        let draft = studio
            .carts
            .checkout_draft(
                session.user.id,
                CheckoutRequest {
                    branch_id: Some(studio.branch.id),
                    artist_id: Some(studio.artist.id),
                    start_at: Utc::now() + Duration::days(3),
                    notes: None,
                },
            )
            .await
            .unwrap();
        let appointment = studio
            .appointments
            .create_from_checkout(&session.user, &draft)
            .await
            .unwrap();
        studio.carts.complete_checkout(&draft).await.unwrap();

        (session.user, appointment)
    }

    #[tokio::test]
    async fn guest_cart_follows_member_through_checkout() {
        let studio = studio();

        let token = generate_guest_token();
        let guest = CartOwner::Guest(token.clone());
        let view = studio.carts.add_item(&guest, add(&studio.service)).await.unwrap();
        assert_eq!(view.total, 30_000);

        let session = studio.auth.register(registration("jun@example.com")).await.unwrap();
        let login = studio.auth.login("JUN@example.com", "ink-and-needles").await.unwrap();
        assert_eq!(login.user.id, session.user.id);

        studio.carts.merge_guest(&token, session.user.id).await.unwrap();
        let member_cart = studio
            .carts
            .view(&CartOwner::Member(session.user.id))
            .await
            .unwrap();
        assert_eq!(member_cart.item_count, 1);

        let draft = studio
            .carts
            .checkout_draft(
                session.user.id,
                CheckoutRequest {
                    branch_id: Some(studio.branch.id),
                    artist_id: Some(studio.artist.id),
                    start_at: Utc::now() + Duration::days(5),
                    notes: Some("First tattoo".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(draft.total, 30_000);
        assert_eq!(draft.end_at - draft.start_at, Duration::minutes(60));

        let appointment = studio
            .appointments
            .create_from_checkout(&session.user, &draft)
            .await
            .unwrap();
        assert_eq!(appointment.status, AppointmentStatus::Pending);
        assert_eq!(appointment.artist_id, studio.artist.id);
        assert!(appointment.cart_snapshot.is_some());

        studio.carts.complete_checkout(&draft).await.unwrap();
        let emptied = studio
            .carts
            .view(&CartOwner::Member(session.user.id))
            .await
            .unwrap();
        assert_eq!(emptied.item_count, 0);

        // Both the member and the artist hear about the booking
        assert!(studio.notifications.count_for(&session.user.id) >= 1);
        assert!(studio.notifications.count_for(&studio.artist.user_id) >= 1);
    }

    #[tokio::test]
    async fn installment_bill_settles_and_upgrades_member() {
        let studio = studio();
        let (member_user, appointment) = book(&studio, "mira@example.com").await;
        let manager = test_manager(studio.branch.id);

        studio
            .appointments
            .change_status(
                &manager,
                &appointment.id,
                StatusChange {
                    status: AppointmentStatus::Confirmed,
                    reason: None,
                },
            )
            .await
            .unwrap();

        // Lines come from the checkout snapshot
        let bill = studio
            .billing
            .create_bill(&manager, &appointment.id, BillRequest::default())
            .await
            .unwrap();
        assert_eq!(bill.subtotal, 30_000);
        assert_eq!(bill.discount, 0);
        assert_eq!(bill.final_amount, 30_000);
        assert_eq!(bill.status, PaymentStatus::Unpaid);

        let plan = studio
            .billing
            .create_installments(
                &manager,
                &bill.id,
                InstallmentRequest {
                    count: 3,
                    first_due_date: Utc::now().date_naive() + Duration::days(30),
                    interval_months: 1,
                },
            )
            .await
            .unwrap();
        assert_eq!(plan.len(), 3);
        assert_eq!(plan.iter().map(|i| i.amount).sum::<i64>(), 30_000);

        studio
            .billing
            .record_payment(
                &manager,
                &bill.id,
                PaymentRequest {
                    amount: 15_000,
                    method: PaymentMethod::Card,
                    note: None,
                },
            )
            .await
            .unwrap();
        let partial = studio.billing.get(&member_user, &bill.id).await.unwrap();
        assert_eq!(partial.status, PaymentStatus::PartiallyPaid);
        assert_eq!(partial.outstanding(), 15_000);

        studio
            .billing
            .record_payment(
                &manager,
                &bill.id,
                PaymentRequest {
                    amount: 15_000,
                    method: PaymentMethod::Cash,
                    note: Some("Paid at the desk".to_string()),
                },
            )
            .await
            .unwrap();
        let settled = studio.billing.get(&member_user, &bill.id).await.unwrap();
        assert_eq!(settled.status, PaymentStatus::Paid);
        assert!(settled
            .installments
            .iter()
            .all(|i| i.status == PaymentStatus::Paid));

        let member = studio
            .members
            .find_by_user_id(&member_user.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(member.total_spent, 30_000);
        assert_eq!(member.points, 300);
        assert_eq!(member.level, MembershipLevel::Silver);

        let mine = studio.billing.member_bills(&member_user).await.unwrap();
        assert_eq!(mine.len(), 1);

        let actions: Vec<String> = studio
            .audit_logs
            .entries()
            .into_iter()
            .map(|e| e.action)
            .collect();
        assert!(actions.iter().any(|a| a == "bill.create"));
        assert!(actions.iter().any(|a| a == "bill.installments"));
        assert_eq!(actions.iter().filter(|a| *a == "bill.payment").count(), 2);
    }

    #[tokio::test]
    async fn double_booking_the_artist_conflicts() {
        let studio = studio();
        let (_, first) = book(&studio, "first@example.com").await;

        let session = studio
            .auth
            .register(registration("second@example.com"))
            .await
            .unwrap();
        studio
            .carts
            .add_item(&CartOwner::Member(session.user.id), add(&studio.service))
            .await
            .unwrap();
        let draft = studio
            .carts
            .checkout_draft(
                session.user.id,
                CheckoutRequest {
                    branch_id: Some(studio.branch.id),
                    artist_id: Some(studio.artist.id),
                    start_at: first.start_at + Duration::minutes(30),
                    notes: None,
                },
            )
            .await
            .unwrap();

        let err = studio
            .appointments
            .create_from_checkout(&session.user, &draft)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);

        // The cart survives a failed booking
        let cart = studio
            .carts
            .view(&CartOwner::Member(session.user.id))
            .await
            .unwrap();
        assert_eq!(cart.item_count, 1);
    }

    #[tokio::test]
    async fn canceled_appointment_cannot_be_billed() {
        let studio = studio();
        let (member_user, appointment) = book(&studio, "late@example.com").await;

        studio
            .appointments
            .change_status(
                &member_user,
                &appointment.id,
                StatusChange {
                    status: AppointmentStatus::Canceled,
                    reason: Some("Moving away".to_string()),
                },
            )
            .await
            .unwrap();

        let err = studio
            .billing
            .create_bill(
                &test_user(Role::Boss),
                &appointment.id,
                BillRequest::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let logs = studio.audit_logs.list(&AuditLogQuery::default()).await.unwrap();
        assert!(logs.iter().all(|l| l.action != "bill.create"));
    }
}
