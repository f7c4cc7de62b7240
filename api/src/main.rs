//! Inkstone API Server
//!
//! Customer and operations backend for a multi-branch tattoo studio:
//! catalog, carts, appointments, billing, loyalty and encrypted backups.
//! Uses hexagonal (ports & adapters) architecture for clean separation of concerns.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderName, HeaderValue},
    middleware,
    routing::{delete, get, patch, post},
    Json, Router,
};
use sea_orm::Database;
use serde::Serialize;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::PeerIpKeyExtractor;
use tower_governor::GovernorLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod adapters;
mod app;
mod auth;
mod backup;
mod config;
mod domain;
mod entity;
mod error;
mod handlers;

#[cfg(test)]
mod test_utils;

#[cfg(test)]
mod integration_tests;

use adapters::{
    PostgresAppointmentRepository, PostgresArtistRepository, PostgresAuditLogRepository,
    PostgresBillingRepository, PostgresBranchRepository, PostgresCartRepository,
    PostgresContactRepository, PostgresMemberRepository, PostgresNotificationRepository,
    PostgresServiceRepository, PostgresSettingsRepository, PostgresUserRepository,
    TokioCommandRunner,
};
use app::{
    AppointmentService, ArtistService, AuditService, AuthService, BackupService, BackupSettings,
    BillingService, CartService, CatalogService, ContactService, DashboardService,
    MaintenanceService, MemberService, NotificationService, UserService,
};
use auth::TokenIssuer;
use config::Config;

/// Largest artifact accepted by the restore upload endpoint
const MAX_RESTORE_UPLOAD: usize = 1024 * 1024 * 1024;

type Users = PostgresUserRepository;
type Branches = PostgresBranchRepository;
type Services = PostgresServiceRepository;
type Members = PostgresMemberRepository;
type Artists = PostgresArtistRepository;
type Carts = PostgresCartRepository;
type Contacts = PostgresContactRepository;
type Appointments = PostgresAppointmentRepository;
type Bills = PostgresBillingRepository;
type Notifications = PostgresNotificationRepository;
type AuditLogs = PostgresAuditLogRepository;
type Settings = PostgresSettingsRepository;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<AuthService<Users, Members>>,
    pub user_service: Arc<UserService<Users, Branches, AuditLogs>>,
    pub catalog_service: Arc<CatalogService<Branches, Services, AuditLogs>>,
    pub cart_service: Arc<CartService<Carts, Services, Branches, Artists>>,
    pub member_service: Arc<MemberService<Members, AuditLogs>>,
    pub artist_service: Arc<ArtistService<Artists, Users, Branches, AuditLogs>>,
    pub contact_service: Arc<ContactService<Contacts, AuditLogs>>,
    pub appointment_service:
        Arc<AppointmentService<Appointments, Artists, Branches, Members, Notifications, AuditLogs>>,
    pub billing_service:
        Arc<BillingService<Bills, Appointments, Members, Notifications, AuditLogs>>,
    pub notification_service: Arc<NotificationService<Notifications>>,
    pub audit_service: Arc<AuditService<AuditLogs>>,
    pub dashboard_service: Arc<DashboardService<Appointments, Bills, Members>>,
    pub maintenance_service: Arc<MaintenanceService<Settings, AuditLogs>>,
    pub backup_service: Arc<BackupService<TokioCommandRunner, Settings, AuditLogs>>,
    pub config: Config,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

fn cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let layer = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([HeaderName::from_static(handlers::cart::CART_TOKEN_HEADER)]);

    Ok(match &config.cors_origin {
        Some(origin) => layer.allow_origin(AllowOrigin::exact(HeaderValue::from_str(origin)?)),
        None => layer.allow_origin(Any),
    })
}

fn router(state: AppState) -> anyhow::Result<Router> {
    // Rate limiting config: 2 req/sec sustained, burst of 5
    // Uses PeerIpKeyExtractor to get client IP from socket connection
    let governor_config = Arc::new(
        GovernorConfigBuilder::default()
            .key_extractor(PeerIpKeyExtractor)
            .per_second(2)
            .burst_size(5)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limit configuration"))?,
    );

    // Rate-limited routes (sign up, sign in, contact form)
    let rate_limited_routes = Router::new()
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/contacts", post(handlers::submit_contact))
        .layer(GovernorLayer {
            config: governor_config,
        });

    // Carts work for guests and members alike
    let optional_auth_routes = Router::new()
        .route(
            "/cart",
            get(handlers::get_cart)
                .patch(handlers::set_preferences)
                .delete(handlers::clear_cart),
        )
        .route("/cart/items", post(handlers::add_item))
        .route(
            "/cart/items/:id",
            patch(handlers::update_item).delete(handlers::remove_item),
        )
        .route("/artists/:id", get(handlers::get_artist))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::optional_auth_middleware,
        ));

    let protected_routes = Router::new()
        // Account
        .route("/auth/me", get(handlers::me))
        .route("/auth/change-password", post(handlers::change_password))
        // Staff administration
        .route(
            "/admin/users",
            get(handlers::list_users).post(handlers::create_user),
        )
        .route("/admin/users/:id", patch(handlers::update_user))
        // Catalog management
        .route("/branches", post(handlers::create_branch))
        .route(
            "/branches/:id",
            patch(handlers::update_branch).delete(handlers::delete_branch),
        )
        .route("/services", post(handlers::create_service))
        .route(
            "/services/:id",
            patch(handlers::update_service).delete(handlers::delete_service),
        )
        .route("/services/:id/variants", post(handlers::create_variant))
        .route(
            "/variants/:id",
            patch(handlers::update_variant).delete(handlers::delete_variant),
        )
        // Checkout
        .route("/cart/checkout", post(handlers::checkout))
        // Members
        .route(
            "/members/me",
            get(handlers::get_me).patch(handlers::update_me),
        )
        .route("/members/me/bills", get(handlers::my_bills))
        .route("/members", get(handlers::search_members))
        .route("/members/:id", get(handlers::get_member))
        .route("/members/:id/notes", patch(handlers::update_notes))
        .route("/members/:id/points", post(handlers::adjust_points))
        // Artists
        .route("/artists", post(handlers::create_artist))
        .route("/artists/:id", patch(handlers::update_artist))
        .route("/artists/:id/portfolio", post(handlers::add_portfolio_item))
        .route(
            "/portfolio/:id",
            patch(handlers::update_portfolio_item).delete(handlers::delete_portfolio_item),
        )
        // Contacts
        .route("/contacts", get(handlers::list_contacts))
        .route("/contacts/:id", patch(handlers::update_contact))
        // Appointments
        .route(
            "/appointments",
            get(handlers::list_appointments).post(handlers::create_appointment),
        )
        .route(
            "/appointments/:id",
            get(handlers::get_appointment).patch(handlers::reschedule_appointment),
        )
        .route("/appointments/:id/status", post(handlers::change_status))
        .route("/appointments/:id/bill", post(handlers::create_bill))
        // Billing
        .route("/bills", get(handlers::list_bills))
        .route("/bills/overdue", get(handlers::list_overdue))
        .route("/bills/:id", get(handlers::get_bill))
        .route(
            "/bills/:id/payments",
            get(handlers::list_payments).post(handlers::record_payment),
        )
        .route("/bills/:id/installments", post(handlers::create_installments))
        .route("/bills/:id/void", post(handlers::void_bill))
        // Notifications
        .route("/notifications", get(handlers::list_notifications))
        .route("/notifications/unread-count", get(handlers::unread_count))
        .route("/notifications/read-all", post(handlers::mark_all_read))
        .route("/notifications/:id/read", post(handlers::mark_read))
        // Administration
        .route("/admin/audit-logs", get(handlers::list_audit_logs))
        .route("/admin/dashboard", get(handlers::dashboard))
        .route(
            "/admin/maintenance",
            get(handlers::get_maintenance).post(handlers::set_maintenance),
        )
        .route(
            "/admin/backups",
            get(handlers::list_backups).post(handlers::create_backup),
        )
        .route(
            "/admin/backups/restore-upload",
            post(handlers::restore_upload).layer(DefaultBodyLimit::max(MAX_RESTORE_UPLOAD)),
        )
        .route(
            "/admin/backups/:name",
            get(handlers::download_backup).delete(handlers::delete_backup),
        )
        .route("/admin/backups/:name/restore", post(handlers::restore_backup))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ));

    let app = Router::new()
        // Health check (no auth)
        .route("/health", get(health))
        // Public catalog
        .route("/branches", get(handlers::list_branches))
        .route("/branches/:id", get(handlers::get_branch))
        .route("/services", get(handlers::list_services))
        .route("/services/:id", get(handlers::get_service))
        .route("/pricing/quote", post(handlers::quote))
        .route("/artists", get(handlers::list_artists))
        .route("/auth/refresh", post(handlers::refresh))
        .merge(rate_limited_routes)
        .merge(optional_auth_routes)
        .merge(protected_routes)
        // Middleware
        .layer(middleware::from_fn_with_state(
            state.maintenance_service.clone(),
            handlers::maintenance_gate::<Settings, AuditLogs>,
        ))
        .layer(cors_layer(&state.config)?)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(app)
}

/// Periodically delete expired carts
fn spawn_cart_sweeper(
    carts: Arc<CartService<Carts, Services, Branches, Artists>>,
    every: std::time::Duration,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            if let Err(e) = carts.sweep_expired().await {
                tracing::warn!(error = %e, "Expired cart sweep failed");
            }
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,inkstone_api=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Inkstone API...");

    // Load configuration
    let config = Config::from_env()?;

    // Connect to PostgreSQL
    tracing::info!("Connecting to database...");
    let db = Database::connect(&config.database_url).await?;
    tracing::info!("Database connected");

    // Create adapters
    let user_repo = Arc::new(Users::new(db.clone()));
    let branch_repo = Arc::new(Branches::new(db.clone()));
    let service_repo = Arc::new(Services::new(db.clone()));
    let member_repo = Arc::new(Members::new(db.clone()));
    let artist_repo = Arc::new(Artists::new(db.clone()));
    let cart_repo = Arc::new(Carts::new(db.clone()));
    let contact_repo = Arc::new(Contacts::new(db.clone()));
    let appointment_repo = Arc::new(Appointments::new(db.clone()));
    let bill_repo = Arc::new(Bills::new(db.clone()));
    let notification_repo = Arc::new(Notifications::new(db.clone()));
    let audit_repo = Arc::new(AuditLogs::new(db.clone()));
    let settings_repo = Arc::new(Settings::new(db.clone()));

    // Create application services
    let audit_service = Arc::new(AuditService::new(audit_repo));
    let notification_service = Arc::new(NotificationService::new(notification_repo));

    let maintenance_service = Arc::new(MaintenanceService::new(
        settings_repo,
        audit_service.clone(),
        config.maintenance_mode,
    ));
    maintenance_service.load().await?;
    if maintenance_service.is_enabled().await {
        tracing::warn!("Starting in maintenance mode");
    }

    let auth_service = Arc::new(AuthService::new(
        user_repo.clone(),
        member_repo.clone(),
        TokenIssuer::from_config(&config),
    ));

    let user_service = Arc::new(UserService::new(
        user_repo.clone(),
        branch_repo.clone(),
        audit_service.clone(),
    ));

    let catalog_service = Arc::new(CatalogService::new(
        branch_repo.clone(),
        service_repo.clone(),
        audit_service.clone(),
    ));

    let cart_service = Arc::new(CartService::new(
        cart_repo,
        service_repo,
        branch_repo.clone(),
        artist_repo.clone(),
    ));

    let member_service = Arc::new(MemberService::new(
        member_repo.clone(),
        audit_service.clone(),
    ));

    let artist_service = Arc::new(ArtistService::new(
        artist_repo.clone(),
        user_repo,
        branch_repo.clone(),
        audit_service.clone(),
    ));

    let contact_service = Arc::new(ContactService::new(contact_repo, audit_service.clone()));

    let appointment_service = Arc::new(AppointmentService::new(
        appointment_repo.clone(),
        artist_repo,
        branch_repo,
        member_repo.clone(),
        notification_service.clone(),
        audit_service.clone(),
    ));

    let billing_service = Arc::new(BillingService::new(
        bill_repo.clone(),
        appointment_repo.clone(),
        member_repo.clone(),
        notification_service.clone(),
        audit_service.clone(),
    ));

    let dashboard_service = Arc::new(DashboardService::new(
        appointment_repo,
        bill_repo,
        member_repo,
    ));

    let backup_service = Arc::new(BackupService::new(
        Arc::new(TokioCommandRunner::new()),
        maintenance_service.clone(),
        audit_service.clone(),
        BackupSettings::from_config(&config),
    ));

    // Create app state
    let state = AppState {
        auth_service,
        user_service,
        catalog_service,
        cart_service,
        member_service,
        artist_service,
        contact_service,
        appointment_service,
        billing_service,
        notification_service,
        audit_service,
        dashboard_service,
        maintenance_service,
        backup_service,
        config: config.clone(),
    };

    spawn_cart_sweeper(state.cart_service.clone(), config.cart_sweep_interval);

    let app = router(state)?;

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
