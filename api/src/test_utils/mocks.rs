//! Mock implementations of port traits
//!
//! These are in-memory implementations that can be configured for testing.
//! They store data in memory and allow tests to verify behavior.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::domain::entities::{
    Appointment, AppointmentId, AppointmentQuery, AppointmentStatus, Artist, ArtistChanges,
    ArtistId, AuditLog, AuditLogId, AuditLogQuery, Bill, BillId, BillItem, BillItemId, BillQuery,
    Branch, BranchChanges, BranchId, Cart, CartId, CartItem, CartItemId, CartOwner, Contact,
    ContactId, ContactStatus, Installment, InstallmentId, Member, MemberChanges, MemberId,
    MemberQuery, MembershipLevel, NewAppointment, NewArtist, NewAuditLog, NewBill, NewBranch,
    NewCartItem, NewContact, NewMember, NewNotification, NewPayment, NewPortfolioItem, NewService,
    NewServiceVariant, NewUser, Notification, NotificationId, Payment, PaymentId, PaymentStatus,
    PaymentType, PlannedInstallment, PortfolioChanges, PortfolioItem, PortfolioItemId, Service,
    ServiceChanges, ServiceId, ServiceVariant, User, UserChanges, UserId, VariantChanges,
    VariantId,
};
use crate::domain::ports::{
    AppointmentRepository, ArtistRepository, AuditLogRepository, BillSettlement,
    BillingRepository, BranchRepository, CartRepository, CommandOutput, CommandRunner,
    ContactRepository, MemberRepository, NotificationRepository, ServiceRepository,
    SettingsRepository, UserRepository,
};
use crate::error::{BackupError, DomainError};

fn not_found(what: &str, id: impl std::fmt::Display) -> DomainError {
    DomainError::NotFound(format!("{} {} not found", what, id))
}

// ============================================================================
// In-Memory User Repository
// ============================================================================

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: Arc<RwLock<HashMap<UserId, User>>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate with a user for testing
    pub fn with_user(self, user: User) -> Self {
        self.insert(user);
        self
    }

    pub fn insert(&self, user: User) {
        self.users.write().unwrap().insert(user.id, user);
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, DomainError> {
        Ok(self.users.read().unwrap().get(id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DomainError> {
        let users = self.users.read().unwrap();
        Ok(users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<User>, DomainError> {
        let users = self.users.read().unwrap();
        Ok(users
            .values()
            .find(|u| u.phone.as_deref() == Some(phone))
            .cloned())
    }

    async fn create(&self, new_user: &NewUser) -> Result<User, DomainError> {
        let user = User {
            id: UserId::new(),
            email: new_user.email.clone(),
            phone: new_user.phone.clone(),
            password_hash: new_user.password_hash.clone(),
            name: new_user.name.clone(),
            role: new_user.role,
            branch_id: new_user.branch_id,
            is_active: true,
            created_at: Utc::now(),
            last_login_at: None,
        };
        self.insert(user.clone());
        Ok(user)
    }

    async fn update(&self, id: &UserId, changes: &UserChanges) -> Result<User, DomainError> {
        let mut users = self.users.write().unwrap();
        let user = users.get_mut(id).ok_or_else(|| not_found("User", id))?;

        if let Some(name) = &changes.name {
            user.name = name.clone();
        }
        if let Some(phone) = &changes.phone {
            user.phone = phone.clone();
        }
        if let Some(role) = changes.role {
            user.role = role;
        }
        if let Some(branch_id) = changes.branch_id {
            user.branch_id = branch_id;
        }
        if let Some(is_active) = changes.is_active {
            user.is_active = is_active;
        }
        Ok(user.clone())
    }

    async fn update_password(&self, id: &UserId, password_hash: &str) -> Result<(), DomainError> {
        let mut users = self.users.write().unwrap();
        let user = users.get_mut(id).ok_or_else(|| not_found("User", id))?;
        user.password_hash = password_hash.to_string();
        Ok(())
    }

    async fn touch_last_login(&self, id: &UserId) -> Result<(), DomainError> {
        if let Some(user) = self.users.write().unwrap().get_mut(id) {
            user.last_login_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn list(&self, branch_id: Option<&BranchId>) -> Result<Vec<User>, DomainError> {
        let users = self.users.read().unwrap();
        let mut result: Vec<User> = users
            .values()
            .filter(|u| branch_id.is_none() || u.branch_id.as_ref() == branch_id)
            .cloned()
            .collect();
        result.sort_by_key(|u| u.created_at);
        Ok(result)
    }
}

// ============================================================================
// In-Memory Branch Repository
// ============================================================================

#[derive(Default)]
pub struct InMemoryBranchRepository {
    branches: Arc<RwLock<HashMap<BranchId, Branch>>>,
}

impl InMemoryBranchRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_branch(self, branch: Branch) -> Self {
        self.branches.write().unwrap().insert(branch.id, branch);
        self
    }
}

#[async_trait]
impl BranchRepository for InMemoryBranchRepository {
    async fn find_by_id(&self, id: &BranchId) -> Result<Option<Branch>, DomainError> {
        Ok(self.branches.read().unwrap().get(id).cloned())
    }

    async fn list(&self, include_inactive: bool) -> Result<Vec<Branch>, DomainError> {
        let branches = self.branches.read().unwrap();
        let mut result: Vec<Branch> = branches
            .values()
            .filter(|b| include_inactive || b.is_active)
            .cloned()
            .collect();
        result.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(result)
    }

    async fn create(&self, new_branch: &NewBranch) -> Result<Branch, DomainError> {
        let branch = Branch {
            id: BranchId::new(),
            name: new_branch.name.clone(),
            address: new_branch.address.clone(),
            phone: new_branch.phone.clone(),
            business_hours: new_branch.business_hours.clone(),
            is_active: true,
            created_at: Utc::now(),
        };
        self.branches
            .write()
            .unwrap()
            .insert(branch.id, branch.clone());
        Ok(branch)
    }

    async fn update(&self, id: &BranchId, changes: &BranchChanges) -> Result<Branch, DomainError> {
        let mut branches = self.branches.write().unwrap();
        let branch = branches.get_mut(id).ok_or_else(|| not_found("Branch", id))?;

        if let Some(name) = &changes.name {
            branch.name = name.clone();
        }
        if let Some(address) = &changes.address {
            branch.address = address.clone();
        }
        if let Some(phone) = &changes.phone {
            branch.phone = phone.clone();
        }
        if let Some(hours) = &changes.business_hours {
            branch.business_hours = hours.clone();
        }
        if let Some(is_active) = changes.is_active {
            branch.is_active = is_active;
        }
        Ok(branch.clone())
    }
}

// ============================================================================
// In-Memory Service Repository
// ============================================================================

#[derive(Default)]
pub struct InMemoryServiceRepository {
    services: Arc<RwLock<HashMap<ServiceId, Service>>>,
    variants: Arc<RwLock<HashMap<VariantId, ServiceVariant>>>,
}

impl InMemoryServiceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_service(self, service: Service) -> Self {
        self.services.write().unwrap().insert(service.id, service);
        self
    }

    pub fn with_variant(self, variant: ServiceVariant) -> Self {
        self.variants.write().unwrap().insert(variant.id, variant);
        self
    }
}

#[async_trait]
impl ServiceRepository for InMemoryServiceRepository {
    async fn find_by_id(&self, id: &ServiceId) -> Result<Option<Service>, DomainError> {
        Ok(self.services.read().unwrap().get(id).cloned())
    }

    async fn list(&self, include_inactive: bool) -> Result<Vec<Service>, DomainError> {
        let services = self.services.read().unwrap();
        let mut result: Vec<Service> = services
            .values()
            .filter(|s| include_inactive || s.is_active)
            .cloned()
            .collect();
        result.sort_by_key(|s| (s.sort_order, s.created_at));
        Ok(result)
    }

    async fn create(&self, new_service: &NewService) -> Result<Service, DomainError> {
        let service = Service {
            id: ServiceId::new(),
            name: new_service.name.clone(),
            description: new_service.description.clone(),
            category: new_service.category.clone(),
            base_price: new_service.base_price,
            duration_minutes: new_service.duration_minutes,
            is_active: true,
            sort_order: new_service.sort_order,
            created_at: Utc::now(),
        };
        self.services
            .write()
            .unwrap()
            .insert(service.id, service.clone());
        Ok(service)
    }

    async fn update(
        &self,
        id: &ServiceId,
        changes: &ServiceChanges,
    ) -> Result<Service, DomainError> {
        let mut services = self.services.write().unwrap();
        let service = services.get_mut(id).ok_or_else(|| not_found("Service", id))?;

        if let Some(name) = &changes.name {
            service.name = name.clone();
        }
        if let Some(description) = &changes.description {
            service.description = description.clone();
        }
        if let Some(category) = &changes.category {
            service.category = category.clone();
        }
        if let Some(base_price) = changes.base_price {
            service.base_price = base_price;
        }
        if let Some(duration) = changes.duration_minutes {
            service.duration_minutes = duration;
        }
        if let Some(is_active) = changes.is_active {
            service.is_active = is_active;
        }
        if let Some(sort_order) = changes.sort_order {
            service.sort_order = sort_order;
        }
        Ok(service.clone())
    }

    async fn variants_for(
        &self,
        service_id: &ServiceId,
    ) -> Result<Vec<ServiceVariant>, DomainError> {
        let variants = self.variants.read().unwrap();
        let mut result: Vec<ServiceVariant> = variants
            .values()
            .filter(|v| v.service_id == *service_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then(a.name.cmp(&b.name)));
        Ok(result)
    }

    async fn find_variant(&self, id: &VariantId) -> Result<Option<ServiceVariant>, DomainError> {
        Ok(self.variants.read().unwrap().get(id).cloned())
    }

    async fn create_variant(
        &self,
        new_variant: &NewServiceVariant,
    ) -> Result<ServiceVariant, DomainError> {
        let variant = ServiceVariant {
            id: VariantId::new(),
            service_id: new_variant.service_id,
            kind: new_variant.kind,
            name: new_variant.name.clone(),
            price: new_variant.price,
            is_active: true,
            sort_order: new_variant.sort_order,
        };
        self.variants
            .write()
            .unwrap()
            .insert(variant.id, variant.clone());
        Ok(variant)
    }

    async fn update_variant(
        &self,
        id: &VariantId,
        changes: &VariantChanges,
    ) -> Result<ServiceVariant, DomainError> {
        let mut variants = self.variants.write().unwrap();
        let variant = variants.get_mut(id).ok_or_else(|| not_found("Variant", id))?;

        if let Some(name) = &changes.name {
            variant.name = name.clone();
        }
        if let Some(price) = changes.price {
            variant.price = price;
        }
        if let Some(is_active) = changes.is_active {
            variant.is_active = is_active;
        }
        if let Some(sort_order) = changes.sort_order {
            variant.sort_order = sort_order;
        }
        Ok(variant.clone())
    }

    async fn delete_variant(&self, id: &VariantId) -> Result<(), DomainError> {
        self.variants
            .write()
            .unwrap()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| not_found("Variant", id))
    }
}

// ============================================================================
// In-Memory Member Repository
// ============================================================================

#[derive(Default)]
pub struct InMemoryMemberRepository {
    members: Arc<RwLock<HashMap<MemberId, Member>>>,
    emails: Arc<RwLock<HashMap<UserId, String>>>,
    yield_on_read: bool,
}

impl InMemoryMemberRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_member(self, member: Member) -> Self {
        self.members.write().unwrap().insert(member.id, member);
        self
    }

    /// Yield to the scheduler after every lookup snapshot, like a database round-trip
    pub fn with_yielding_reads(mut self) -> Self {
        self.yield_on_read = true;
        self
    }

    /// Account email searched alongside the member's name and phone
    pub fn with_email(self, user_id: UserId, email: &str) -> Self {
        self.emails.write().unwrap().insert(user_id, email.to_lowercase());
        self
    }
}

#[async_trait]
impl MemberRepository for InMemoryMemberRepository {
    async fn find_by_id(&self, id: &MemberId) -> Result<Option<Member>, DomainError> {
        let member = self.members.read().unwrap().get(id).cloned();
        if self.yield_on_read {
            tokio::task::yield_now().await;
        }
        Ok(member)
    }

    async fn find_by_user_id(&self, user_id: &UserId) -> Result<Option<Member>, DomainError> {
        let member = self
            .members
            .read()
            .unwrap()
            .values()
            .find(|m| m.user_id == *user_id)
            .cloned();
        if self.yield_on_read {
            tokio::task::yield_now().await;
        }
        Ok(member)
    }

    async fn create(&self, new_member: &NewMember) -> Result<Member, DomainError> {
        let member = Member {
            id: MemberId::new(),
            user_id: new_member.user_id,
            name: new_member.name.clone(),
            phone: new_member.phone.clone(),
            birthday: new_member.birthday,
            level: MembershipLevel::Standard,
            points: 0,
            total_spent: 0,
            notes: None,
            created_at: Utc::now(),
        };
        self.members
            .write()
            .unwrap()
            .insert(member.id, member.clone());
        Ok(member)
    }

    async fn update(&self, id: &MemberId, changes: &MemberChanges) -> Result<Member, DomainError> {
        let mut members = self.members.write().unwrap();
        let member = members.get_mut(id).ok_or_else(|| not_found("Member", id))?;

        if let Some(name) = &changes.name {
            member.name = name.clone();
        }
        if let Some(phone) = &changes.phone {
            member.phone = phone.clone();
        }
        if let Some(birthday) = changes.birthday {
            member.birthday = birthday;
        }
        if let Some(notes) = &changes.notes {
            member.notes = notes.clone();
        }
        Ok(member.clone())
    }

    async fn search(&self, query: &MemberQuery) -> Result<Vec<Member>, DomainError> {
        let members = self.members.read().unwrap();
        let emails = self.emails.read().unwrap();
        let needle = query.search.as_deref().map(|s| s.trim().to_lowercase());
        let mut result: Vec<Member> = members
            .values()
            .filter(|m| match &needle {
                Some(n) => {
                    m.name.to_lowercase().contains(n)
                        || m.phone.as_deref().is_some_and(|p| p.contains(n.as_str()))
                        || emails.get(&m.user_id).is_some_and(|e| e.contains(n.as_str()))
                }
                None => true,
            })
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let limit = if query.limit == 0 { usize::MAX } else { query.limit as usize };
        Ok(result
            .into_iter()
            .skip(query.offset as usize)
            .take(limit)
            .collect())
    }

    async fn add_loyalty(
        &self,
        id: &MemberId,
        points: i64,
        spent: i64,
    ) -> Result<Member, DomainError> {
        let mut members = self.members.write().unwrap();
        let member = members.get_mut(id).ok_or_else(|| not_found("Member", id))?;

        let balance = member
            .points
            .checked_add(points)
            .filter(|p| *p >= 0)
            .ok_or_else(|| {
                DomainError::Validation(format!("Member has only {} points", member.points))
            })?;
        member.points = balance;
        member.total_spent += spent;
        member.level = MembershipLevel::from_total_spent(member.total_spent);
        Ok(member.clone())
    }

    async fn count_created_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<u64, DomainError> {
        let members = self.members.read().unwrap();
        Ok(members
            .values()
            .filter(|m| m.created_at >= from && m.created_at < to)
            .count() as u64)
    }
}

// ============================================================================
// In-Memory Artist Repository
// ============================================================================

#[derive(Default)]
pub struct InMemoryArtistRepository {
    artists: Arc<RwLock<HashMap<ArtistId, Artist>>>,
    portfolio: Arc<RwLock<HashMap<PortfolioItemId, PortfolioItem>>>,
}

impl InMemoryArtistRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_artist(self, artist: Artist) -> Self {
        self.artists.write().unwrap().insert(artist.id, artist);
        self
    }
}

#[async_trait]
impl ArtistRepository for InMemoryArtistRepository {
    async fn find_by_id(&self, id: &ArtistId) -> Result<Option<Artist>, DomainError> {
        Ok(self.artists.read().unwrap().get(id).cloned())
    }

    async fn find_by_user_id(&self, user_id: &UserId) -> Result<Option<Artist>, DomainError> {
        let artists = self.artists.read().unwrap();
        Ok(artists.values().find(|a| a.user_id == *user_id).cloned())
    }

    async fn list(
        &self,
        branch_id: Option<&BranchId>,
        include_inactive: bool,
    ) -> Result<Vec<Artist>, DomainError> {
        let artists = self.artists.read().unwrap();
        let mut result: Vec<Artist> = artists
            .values()
            .filter(|a| include_inactive || a.is_active)
            .filter(|a| branch_id.is_none_or(|b| a.branch_id == *b))
            .cloned()
            .collect();
        result.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        Ok(result)
    }

    async fn create(&self, new_artist: &NewArtist) -> Result<Artist, DomainError> {
        let artist = Artist {
            id: ArtistId::new(),
            user_id: new_artist.user_id,
            branch_id: new_artist.branch_id,
            display_name: new_artist.display_name.clone(),
            bio: new_artist.bio.clone(),
            specialties: new_artist.specialties.clone(),
            avatar_url: new_artist.avatar_url.clone(),
            is_active: true,
            created_at: Utc::now(),
        };
        self.artists
            .write()
            .unwrap()
            .insert(artist.id, artist.clone());
        Ok(artist)
    }

    async fn update(&self, id: &ArtistId, changes: &ArtistChanges) -> Result<Artist, DomainError> {
        let mut artists = self.artists.write().unwrap();
        let artist = artists.get_mut(id).ok_or_else(|| not_found("Artist", id))?;

        if let Some(branch_id) = changes.branch_id {
            artist.branch_id = branch_id;
        }
        if let Some(name) = &changes.display_name {
            artist.display_name = name.clone();
        }
        if let Some(bio) = &changes.bio {
            artist.bio = bio.clone();
        }
        if let Some(specialties) = &changes.specialties {
            artist.specialties = specialties.clone();
        }
        if let Some(avatar_url) = &changes.avatar_url {
            artist.avatar_url = avatar_url.clone();
        }
        if let Some(is_active) = changes.is_active {
            artist.is_active = is_active;
        }
        Ok(artist.clone())
    }

    async fn list_portfolio(
        &self,
        artist_id: &ArtistId,
        include_private: bool,
    ) -> Result<Vec<PortfolioItem>, DomainError> {
        let portfolio = self.portfolio.read().unwrap();
        let mut result: Vec<PortfolioItem> = portfolio
            .values()
            .filter(|p| p.artist_id == *artist_id && (include_private || p.is_public))
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }

    async fn find_portfolio_item(
        &self,
        id: &PortfolioItemId,
    ) -> Result<Option<PortfolioItem>, DomainError> {
        Ok(self.portfolio.read().unwrap().get(id).cloned())
    }

    async fn create_portfolio_item(
        &self,
        item: &NewPortfolioItem,
    ) -> Result<PortfolioItem, DomainError> {
        let item = PortfolioItem {
            id: PortfolioItemId::new(),
            artist_id: item.artist_id,
            title: item.title.clone(),
            description: item.description.clone(),
            image_url: item.image_url.clone(),
            tags: item.tags.clone(),
            is_public: item.is_public,
            created_at: Utc::now(),
        };
        self.portfolio
            .write()
            .unwrap()
            .insert(item.id, item.clone());
        Ok(item)
    }

    async fn update_portfolio_item(
        &self,
        id: &PortfolioItemId,
        changes: &PortfolioChanges,
    ) -> Result<PortfolioItem, DomainError> {
        let mut portfolio = self.portfolio.write().unwrap();
        let item = portfolio
            .get_mut(id)
            .ok_or_else(|| not_found("Portfolio item", id))?;

        if let Some(title) = &changes.title {
            item.title = title.clone();
        }
        if let Some(description) = &changes.description {
            item.description = description.clone();
        }
        if let Some(image_url) = &changes.image_url {
            item.image_url = image_url.clone();
        }
        if let Some(tags) = &changes.tags {
            item.tags = tags.clone();
        }
        if let Some(is_public) = changes.is_public {
            item.is_public = is_public;
        }
        Ok(item.clone())
    }

    async fn delete_portfolio_item(&self, id: &PortfolioItemId) -> Result<(), DomainError> {
        self.portfolio
            .write()
            .unwrap()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| not_found("Portfolio item", id))
    }
}

// ============================================================================
// In-Memory Cart Repository
// ============================================================================

#[derive(Default)]
pub struct InMemoryCartRepository {
    carts: Arc<RwLock<HashMap<CartId, Cart>>>,
}

impl InMemoryCartRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.carts.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Push a cart's expiry into the past
    pub fn expire(&self, id: &CartId) {
        if let Some(cart) = self.carts.write().unwrap().get_mut(id) {
            cart.expires_at = Utc::now() - Duration::seconds(1);
        }
    }

    fn with_cart<T>(
        &self,
        id: &CartId,
        f: impl FnOnce(&mut Cart) -> T,
    ) -> Result<T, DomainError> {
        let mut carts = self.carts.write().unwrap();
        let cart = carts.get_mut(id).ok_or_else(|| not_found("Cart", id))?;
        Ok(f(cart))
    }
}

#[async_trait]
impl CartRepository for InMemoryCartRepository {
    async fn find_by_owner(&self, owner: &CartOwner) -> Result<Option<Cart>, DomainError> {
        let carts = self.carts.read().unwrap();
        Ok(carts.values().find(|c| c.owner == *owner).cloned())
    }

    async fn create(
        &self,
        owner: &CartOwner,
        expires_at: DateTime<Utc>,
    ) -> Result<Cart, DomainError> {
        let now = Utc::now();
        let cart = Cart {
            id: CartId::new(),
            owner: owner.clone(),
            branch_id: None,
            artist_id: None,
            items: Vec::new(),
            created_at: now,
            updated_at: now,
            expires_at,
        };
        self.carts.write().unwrap().insert(cart.id, cart.clone());
        Ok(cart)
    }

    async fn delete(&self, id: &CartId) -> Result<(), DomainError> {
        self.carts.write().unwrap().remove(id);
        Ok(())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, DomainError> {
        let mut carts = self.carts.write().unwrap();
        let before = carts.len();
        carts.retain(|_, c| !c.is_expired(now));
        Ok((before - carts.len()) as u64)
    }

    async fn add_item(
        &self,
        cart_id: &CartId,
        item: &NewCartItem,
    ) -> Result<CartItem, DomainError> {
        let item = CartItem {
            id: CartItemId::new(),
            service_id: item.service_id,
            selection: item.selection.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price,
            notes: item.notes.clone(),
            reference_images: item.reference_images.clone(),
            created_at: Utc::now(),
        };
        let stored = item.clone();
        self.with_cart(cart_id, |cart| cart.items.push(stored))?;
        Ok(item)
    }

    async fn save_item(&self, cart_id: &CartId, item: &CartItem) -> Result<(), DomainError> {
        self.with_cart(cart_id, |cart| {
            if let Some(existing) = cart.items.iter_mut().find(|i| i.id == item.id) {
                *existing = item.clone();
            }
        })
    }

    async fn remove_item(
        &self,
        cart_id: &CartId,
        item_id: &CartItemId,
    ) -> Result<bool, DomainError> {
        self.with_cart(cart_id, |cart| {
            let before = cart.items.len();
            cart.items.retain(|i| i.id != *item_id);
            cart.items.len() != before
        })
    }

    async fn clear(&self, cart_id: &CartId) -> Result<(), DomainError> {
        self.with_cart(cart_id, |cart| cart.items.clear())
    }

    async fn set_preferences(
        &self,
        cart_id: &CartId,
        branch_id: Option<BranchId>,
        artist_id: Option<ArtistId>,
    ) -> Result<(), DomainError> {
        self.with_cart(cart_id, |cart| {
            cart.branch_id = branch_id;
            cart.artist_id = artist_id;
        })
    }

    async fn touch(
        &self,
        cart_id: &CartId,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.with_cart(cart_id, |cart| {
            cart.updated_at = now;
            cart.expires_at = expires_at;
        })
    }

    async fn move_items(&self, from: &CartId, to: &CartId) -> Result<(), DomainError> {
        let mut carts = self.carts.write().unwrap();
        let moved = carts
            .get_mut(from)
            .map(|c| std::mem::take(&mut c.items))
            .unwrap_or_default();
        let target = carts.get_mut(to).ok_or_else(|| not_found("Cart", to))?;
        target.items.extend(moved);
        Ok(())
    }
}

// ============================================================================
// In-Memory Contact Repository
// ============================================================================

#[derive(Default)]
pub struct InMemoryContactRepository {
    contacts: Arc<RwLock<HashMap<ContactId, Contact>>>,
}

impl InMemoryContactRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContactRepository for InMemoryContactRepository {
    async fn create(&self, new_contact: &NewContact) -> Result<Contact, DomainError> {
        let now = Utc::now();
        let contact = Contact {
            id: ContactId::new(),
            name: new_contact.name.clone(),
            phone: new_contact.phone.clone(),
            email: new_contact.email.clone(),
            message: new_contact.message.clone(),
            branch_id: new_contact.branch_id,
            artist_id: new_contact.artist_id,
            status: ContactStatus::New,
            admin_note: None,
            created_at: now,
            updated_at: now,
        };
        self.contacts
            .write()
            .unwrap()
            .insert(contact.id, contact.clone());
        Ok(contact)
    }

    async fn find_by_id(&self, id: &ContactId) -> Result<Option<Contact>, DomainError> {
        Ok(self.contacts.read().unwrap().get(id).cloned())
    }

    async fn list(
        &self,
        status: Option<ContactStatus>,
        branch_id: Option<&BranchId>,
    ) -> Result<Vec<Contact>, DomainError> {
        let contacts = self.contacts.read().unwrap();
        let mut result: Vec<Contact> = contacts
            .values()
            .filter(|c| status.is_none_or(|s| c.status == s))
            .filter(|c| match branch_id {
                Some(b) => c.branch_id.is_none() || c.branch_id.as_ref() == Some(b),
                None => true,
            })
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }

    async fn update_status(
        &self,
        id: &ContactId,
        status: ContactStatus,
        admin_note: Option<String>,
    ) -> Result<Contact, DomainError> {
        let mut contacts = self.contacts.write().unwrap();
        let contact = contacts.get_mut(id).ok_or_else(|| not_found("Contact", id))?;
        contact.status = status;
        if admin_note.is_some() {
            contact.admin_note = admin_note;
        }
        contact.updated_at = Utc::now();
        Ok(contact.clone())
    }
}

// ============================================================================
// In-Memory Appointment Repository
// ============================================================================

#[derive(Default)]
pub struct InMemoryAppointmentRepository {
    appointments: Arc<RwLock<HashMap<AppointmentId, Appointment>>>,
    yield_on_read: bool,
}

/// Stand-in for the exclusion constraint on an artist's slots
fn ensure_slot_free(
    appointments: &HashMap<AppointmentId, Appointment>,
    candidate: &Appointment,
) -> Result<(), DomainError> {
    if !candidate.status.occupies_slot() {
        return Ok(());
    }
    let taken = appointments.values().any(|a| {
        a.id != candidate.id
            && a.artist_id == candidate.artist_id
            && a.status.occupies_slot()
            && a.overlaps(candidate.start_at, candidate.end_at)
    });
    if taken {
        return Err(DomainError::Conflict(
            "The artist is already booked at that time".to_string(),
        ));
    }
    Ok(())
}

impl InMemoryAppointmentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Yield to the scheduler after every overlap query, like a database round-trip
    pub fn with_yielding_reads(mut self) -> Self {
        self.yield_on_read = true;
        self
    }

    pub fn with_appointment(self, appointment: Appointment) -> Self {
        self.appointments
            .write()
            .unwrap()
            .insert(appointment.id, appointment);
        self
    }

    fn modify(
        &self,
        id: &AppointmentId,
        f: impl FnOnce(&mut Appointment),
    ) -> Result<Appointment, DomainError> {
        let mut appointments = self.appointments.write().unwrap();
        let mut changed = appointments
            .get(id)
            .cloned()
            .ok_or_else(|| not_found("Appointment", id))?;
        f(&mut changed);
        ensure_slot_free(&appointments, &changed)?;

        changed.updated_at = Utc::now();
        appointments.insert(changed.id, changed.clone());
        Ok(changed)
    }
}

#[async_trait]
impl AppointmentRepository for InMemoryAppointmentRepository {
    async fn find_by_id(&self, id: &AppointmentId) -> Result<Option<Appointment>, DomainError> {
        Ok(self.appointments.read().unwrap().get(id).cloned())
    }

    async fn create(&self, new: &NewAppointment) -> Result<Appointment, DomainError> {
        let now = Utc::now();
        let appointment = Appointment {
            id: AppointmentId::new(),
            member_id: new.member_id,
            artist_id: new.artist_id,
            branch_id: new.branch_id,
            service_id: new.service_id,
            cart_snapshot: new.cart_snapshot.clone(),
            start_at: new.start_at,
            end_at: new.end_at,
            status: AppointmentStatus::Pending,
            notes: new.notes.clone(),
            created_by: new.created_by,
            created_at: now,
            updated_at: now,
        };
        let mut appointments = self.appointments.write().unwrap();
        ensure_slot_free(&appointments, &appointment)?;
        appointments.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn list(&self, query: &AppointmentQuery) -> Result<Vec<Appointment>, DomainError> {
        let appointments = self.appointments.read().unwrap();
        let mut result: Vec<Appointment> = appointments
            .values()
            .filter(|a| query.member_id.is_none_or(|m| a.member_id == m))
            .filter(|a| query.artist_id.is_none_or(|x| a.artist_id == x))
            .filter(|a| query.branch_id.is_none_or(|b| a.branch_id == b))
            .filter(|a| query.status.is_none_or(|s| a.status == s))
            .filter(|a| query.from.is_none_or(|from| a.start_at >= from))
            .filter(|a| query.to.is_none_or(|to| a.start_at < to))
            .cloned()
            .collect();
        result.sort_by_key(|a| a.start_at);
        Ok(result)
    }

    async fn find_overlapping(
        &self,
        artist_id: &ArtistId,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
        exclude: Option<&AppointmentId>,
    ) -> Result<Vec<Appointment>, DomainError> {
        let found: Vec<Appointment> = self
            .appointments
            .read()
            .unwrap()
            .values()
            .filter(|a| a.artist_id == *artist_id && a.status.occupies_slot())
            .filter(|a| exclude != Some(&a.id))
            .filter(|a| a.overlaps(start_at, end_at))
            .cloned()
            .collect();
        if self.yield_on_read {
            tokio::task::yield_now().await;
        }
        Ok(found)
    }

    async fn update_status(
        &self,
        id: &AppointmentId,
        status: AppointmentStatus,
    ) -> Result<Appointment, DomainError> {
        self.modify(id, |a| a.status = status)
    }

    async fn reschedule(
        &self,
        id: &AppointmentId,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
        notes: Option<String>,
    ) -> Result<Appointment, DomainError> {
        self.modify(id, |a| {
            a.start_at = start_at;
            a.end_at = end_at;
            if notes.is_some() {
                a.notes = notes;
            }
        })
    }
}

// ============================================================================
// In-Memory Billing Repository
// ============================================================================

#[derive(Default)]
pub struct InMemoryBillingRepository {
    bills: Arc<RwLock<HashMap<BillId, Bill>>>,
    payments: Arc<RwLock<Vec<Payment>>>,
    yield_on_read: bool,
}

impl InMemoryBillingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Yield to the scheduler after every `find_by_id` snapshot, like a database round-trip
    pub fn with_yielding_reads(mut self) -> Self {
        self.yield_on_read = true;
        self
    }
}

#[async_trait]
impl BillingRepository for InMemoryBillingRepository {
    async fn find_by_id(&self, id: &BillId) -> Result<Option<Bill>, DomainError> {
        let bill = self.bills.read().unwrap().get(id).cloned();
        if self.yield_on_read {
            tokio::task::yield_now().await;
        }
        Ok(bill)
    }

    async fn find_by_appointment(
        &self,
        appointment_id: &AppointmentId,
    ) -> Result<Option<Bill>, DomainError> {
        let bills = self.bills.read().unwrap();
        Ok(bills
            .values()
            .find(|b| b.appointment_id == *appointment_id)
            .cloned())
    }

    async fn create(&self, new_bill: &NewBill) -> Result<Bill, DomainError> {
        let now = Utc::now();
        let bill = Bill {
            id: BillId::new(),
            appointment_id: new_bill.appointment_id,
            member_id: new_bill.member_id,
            branch_id: new_bill.branch_id,
            subtotal: new_bill.subtotal,
            discount: new_bill.discount,
            final_amount: new_bill.final_amount,
            paid_amount: 0,
            status: PaymentStatus::from_amounts(0, new_bill.final_amount),
            payment_type: PaymentType::Full,
            items: new_bill
                .items
                .iter()
                .map(|i| BillItem {
                    id: BillItemId::new(),
                    description: i.description.clone(),
                    unit_price: i.unit_price,
                    quantity: i.quantity,
                    amount: i.amount(),
                })
                .collect(),
            installments: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.bills.write().unwrap().insert(bill.id, bill.clone());
        Ok(bill)
    }

    async fn list(&self, query: &BillQuery) -> Result<Vec<Bill>, DomainError> {
        let bills = self.bills.read().unwrap();
        let mut result: Vec<Bill> = bills
            .values()
            .filter(|b| query.member_id.is_none_or(|m| b.member_id == m))
            .filter(|b| query.branch_id.is_none_or(|x| b.branch_id == x))
            .filter(|b| query.status.is_none_or(|s| b.status == s))
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }

    async fn create_installments(
        &self,
        bill_id: &BillId,
        plan: &[PlannedInstallment],
    ) -> Result<Vec<Installment>, DomainError> {
        let mut bills = self.bills.write().unwrap();
        let bill = bills.get_mut(bill_id).ok_or_else(|| not_found("Bill", bill_id))?;

        bill.payment_type = PaymentType::Installment;
        bill.installments = plan
            .iter()
            .map(|p| Installment {
                id: InstallmentId::new(),
                bill_id: *bill_id,
                sequence: p.sequence,
                due_date: p.due_date,
                amount: p.amount,
                paid_amount: 0,
                status: PaymentStatus::from_amounts(0, p.amount),
            })
            .collect();
        bill.updated_at = Utc::now();
        Ok(bill.installments.clone())
    }

    async fn record_payment(
        &self,
        new_payment: &NewPayment,
    ) -> Result<(Payment, BillSettlement), DomainError> {
        let mut bills = self.bills.write().unwrap();
        let bill = bills
            .get_mut(&new_payment.bill_id)
            .ok_or_else(|| not_found("Bill", new_payment.bill_id))?;
        let settlement = BillSettlement::for_payment(bill, new_payment.amount)?;

        bill.paid_amount = settlement.paid_amount;
        bill.status = settlement.status;
        bill.updated_at = Utc::now();
        for s in &settlement.installments {
            if let Some(installment) = bill
                .installments
                .iter_mut()
                .find(|i| i.id == s.installment_id)
            {
                installment.paid_amount = s.paid_amount;
                installment.status = s.status;
            }
        }

        let payment = Payment {
            id: PaymentId::new(),
            bill_id: new_payment.bill_id,
            amount: new_payment.amount,
            method: new_payment.method,
            paid_at: Utc::now(),
            recorded_by: new_payment.recorded_by,
            note: new_payment.note.clone(),
            allocations: settlement.allocations.clone(),
        };
        self.payments.write().unwrap().push(payment.clone());
        Ok((payment, settlement))
    }

    async fn list_payments(&self, bill_id: &BillId) -> Result<Vec<Payment>, DomainError> {
        let payments = self.payments.read().unwrap();
        Ok(payments
            .iter()
            .filter(|p| p.bill_id == *bill_id)
            .cloned()
            .collect())
    }

    async fn payments_between(
        &self,
        branch_id: Option<&BranchId>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Payment>, DomainError> {
        let bills = self.bills.read().unwrap();
        let payments = self.payments.read().unwrap();
        Ok(payments
            .iter()
            .filter(|p| p.paid_at >= from && p.paid_at < to)
            .filter(|p| match branch_id {
                Some(b) => bills.get(&p.bill_id).is_some_and(|bill| bill.branch_id == *b),
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn set_status(&self, id: &BillId, status: PaymentStatus) -> Result<(), DomainError> {
        let mut bills = self.bills.write().unwrap();
        let bill = bills.get_mut(id).ok_or_else(|| not_found("Bill", id))?;
        bill.status = status;
        bill.updated_at = Utc::now();
        Ok(())
    }
}

// ============================================================================
// In-Memory Notification Repository
// ============================================================================

#[derive(Default)]
pub struct InMemoryNotificationRepository {
    notifications: Arc<RwLock<Vec<Notification>>>,
    should_fail: bool,
}

impl InMemoryNotificationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every write fails
    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Notifications delivered to a user, read or not
    pub fn count_for(&self, user_id: &UserId) -> usize {
        self.notifications
            .read()
            .unwrap()
            .iter()
            .filter(|n| n.user_id == *user_id)
            .count()
    }
}

#[async_trait]
impl NotificationRepository for InMemoryNotificationRepository {
    async fn create(&self, new: &NewNotification) -> Result<Notification, DomainError> {
        if self.should_fail {
            return Err(DomainError::Database("Mock failure".to_string()));
        }
        let notification = Notification {
            id: NotificationId::new(),
            user_id: new.user_id,
            kind: new.kind,
            title: new.title.clone(),
            body: new.body.clone(),
            link: new.link.clone(),
            is_read: false,
            created_at: Utc::now(),
        };
        self.notifications
            .write()
            .unwrap()
            .push(notification.clone());
        Ok(notification)
    }

    async fn list_for_user(
        &self,
        user_id: &UserId,
        unread_only: bool,
        limit: u64,
    ) -> Result<Vec<Notification>, DomainError> {
        let notifications = self.notifications.read().unwrap();
        Ok(notifications
            .iter()
            .rev()
            .filter(|n| n.user_id == *user_id && (!unread_only || !n.is_read))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn count_unread(&self, user_id: &UserId) -> Result<u64, DomainError> {
        let notifications = self.notifications.read().unwrap();
        Ok(notifications
            .iter()
            .filter(|n| n.user_id == *user_id && !n.is_read)
            .count() as u64)
    }

    async fn mark_read(&self, user_id: &UserId, id: &NotificationId) -> Result<bool, DomainError> {
        let mut notifications = self.notifications.write().unwrap();
        match notifications
            .iter_mut()
            .find(|n| n.id == *id && n.user_id == *user_id)
        {
            Some(n) => {
                n.is_read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_all_read(&self, user_id: &UserId) -> Result<u64, DomainError> {
        let mut notifications = self.notifications.write().unwrap();
        let mut updated = 0;
        for n in notifications
            .iter_mut()
            .filter(|n| n.user_id == *user_id && !n.is_read)
        {
            n.is_read = true;
            updated += 1;
        }
        Ok(updated)
    }
}

// ============================================================================
// In-Memory Audit Log Repository
// ============================================================================

#[derive(Default)]
pub struct InMemoryAuditLogRepository {
    entries: Arc<RwLock<Vec<AuditLog>>>,
    should_fail: bool,
}

impl InMemoryAuditLogRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every write fails
    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Everything recorded so far, oldest first
    pub fn entries(&self) -> Vec<AuditLog> {
        self.entries.read().unwrap().clone()
    }
}

#[async_trait]
impl AuditLogRepository for InMemoryAuditLogRepository {
    async fn create(&self, entry: &NewAuditLog) -> Result<AuditLog, DomainError> {
        if self.should_fail {
            return Err(DomainError::Database("Mock failure".to_string()));
        }
        let log = AuditLog {
            id: AuditLogId::new(),
            actor_id: entry.actor_id,
            action: entry.action.clone(),
            entity_type: entry.entity_type.clone(),
            entity_id: entry.entity_id.clone(),
            details: entry.details.clone(),
            created_at: Utc::now(),
        };
        self.entries.write().unwrap().push(log.clone());
        Ok(log)
    }

    async fn list(&self, query: &AuditLogQuery) -> Result<Vec<AuditLog>, DomainError> {
        let entries = self.entries.read().unwrap();
        let limit = if query.limit == 0 { usize::MAX } else { query.limit as usize };
        Ok(entries
            .iter()
            .rev()
            .filter(|e| query.actor_id.is_none_or(|a| e.actor_id == Some(a)))
            .filter(|e| query.entity_type.as_ref().is_none_or(|t| e.entity_type == *t))
            .filter(|e| query.action.as_ref().is_none_or(|a| e.action == *a))
            .filter(|e| query.from.is_none_or(|from| e.created_at >= from))
            .filter(|e| query.to.is_none_or(|to| e.created_at < to))
            .skip(query.offset as usize)
            .take(limit)
            .cloned()
            .collect())
    }
}

// ============================================================================
// In-Memory Settings Repository
// ============================================================================

#[derive(Default)]
pub struct InMemorySettingsRepository {
    values: Arc<RwLock<HashMap<String, serde_json::Value>>>,
}

impl InMemorySettingsRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsRepository for InMemorySettingsRepository {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, DomainError> {
        Ok(self.values.read().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &serde_json::Value) -> Result<(), DomainError> {
        self.values
            .write()
            .unwrap()
            .insert(key.to_string(), value.clone());
        Ok(())
    }
}

// ============================================================================
// Fake Command Runner
// ============================================================================

/// Stands in for pg_dump, pg_restore and tar
///
/// Writing commands produce a small file at their output path so the backup
/// flow can read it back. Every call is recorded.
#[derive(Default)]
pub struct FakeCommandRunner {
    calls: Arc<RwLock<Vec<(String, Vec<String>)>>>,
    envs: Arc<RwLock<Vec<Vec<(String, String)>>>>,
    fail_on: Arc<RwLock<Option<String>>>,
}

impl FakeCommandRunner {
    pub const DUMP_CONTENT: &'static [u8] = b"PGDMP fake custom-format dump";
    pub const ARCHIVE_CONTENT: &'static [u8] = b"fake gzip tarball";

    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later call of `program` exit with status 1
    pub fn fail_on(&self, program: &str) {
        *self.fail_on.write().unwrap() = Some(program.to_string());
    }

    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.read().unwrap().clone()
    }

    /// Environment passed to each call, in call order
    pub fn envs(&self) -> Vec<Vec<(String, String)>> {
        self.envs.read().unwrap().clone()
    }
}

fn arg_after<'a>(args: &'a [String], flag: &str) -> Option<&'a String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
}

#[async_trait]
impl CommandRunner for FakeCommandRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        envs: &[(String, String)],
    ) -> Result<CommandOutput, BackupError> {
        self.calls
            .write()
            .unwrap()
            .push((program.to_string(), args.to_vec()));
        self.envs.write().unwrap().push(envs.to_vec());

        if self.fail_on.read().unwrap().as_deref() == Some(program) {
            return Ok(CommandOutput {
                success: false,
                code: Some(1),
                stdout: String::new(),
                stderr: format!("{}: simulated failure", program),
            });
        }

        let output = match program {
            "pg_dump" => arg_after(args, "--file").map(|p| (p, Self::DUMP_CONTENT)),
            "tar" => arg_after(args, "-czf").map(|p| (p, Self::ARCHIVE_CONTENT)),
            _ => None,
        };
        if let Some((path, content)) = output {
            std::fs::write(path, content)?;
        }

        Ok(CommandOutput {
            success: true,
            code: Some(0),
            ..Default::default()
        })
    }
}
