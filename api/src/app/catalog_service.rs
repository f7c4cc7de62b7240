//! Branch and service catalog

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;

use crate::app::audit_service::AuditService;
use crate::app::pricing::{calculate_price, PriceBreakdown, PriceRequest};
use crate::app::serde_helpers::double_option;
use crate::app::validation::{non_negative, optional_text, required_text};
use crate::auth::require_role;
use crate::domain::entities::{
    Branch, BranchChanges, BranchId, NewBranch, NewService, NewServiceVariant, Role, Service,
    ServiceChanges, ServiceId, ServiceVariant, ServiceWithVariants, User, VariantChanges,
    VariantId, VariantKind,
};
use crate::domain::ports::{AuditLogRepository, BranchRepository, ServiceRepository};
use crate::error::{AppError, DomainError};

const NAME_MAX: usize = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct BranchInput {
    pub name: String,
    pub address: String,
    pub phone: Option<String>,
    pub business_hours: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BranchUpdate {
    pub name: Option<String>,
    pub address: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub business_hours: Option<Option<String>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceInput {
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub base_price: i64,
    pub duration_minutes: i32,
    #[serde(default)]
    pub sort_order: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceUpdate {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub category: Option<Option<String>>,
    pub base_price: Option<i64>,
    pub duration_minutes: Option<i32>,
    pub is_active: Option<bool>,
    pub sort_order: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VariantInput {
    pub kind: VariantKind,
    pub name: String,
    pub price: i64,
    #[serde(default)]
    pub sort_order: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VariantUpdate {
    pub name: Option<String>,
    pub price: Option<i64>,
    pub is_active: Option<bool>,
    pub sort_order: Option<i32>,
}

fn validate_duration(minutes: i32) -> Result<(), DomainError> {
    if minutes <= 0 {
        return Err(DomainError::Validation(
            "duration_minutes must be positive".to_string(),
        ));
    }
    Ok(())
}

pub struct CatalogService<BR, SR, AL>
where
    BR: BranchRepository,
    SR: ServiceRepository,
    AL: AuditLogRepository,
{
    branches: Arc<BR>,
    services: Arc<SR>,
    audit: Arc<AuditService<AL>>,
}

impl<BR, SR, AL> CatalogService<BR, SR, AL>
where
    BR: BranchRepository,
    SR: ServiceRepository,
    AL: AuditLogRepository,
{
    pub fn new(branches: Arc<BR>, services: Arc<SR>, audit: Arc<AuditService<AL>>) -> Self {
        Self {
            branches,
            services,
            audit,
        }
    }

    // ------------------------------------------------------------------
    // Branches
    // ------------------------------------------------------------------

    pub async fn list_branches(&self, include_inactive: bool) -> Result<Vec<Branch>, AppError> {
        Ok(self.branches.list(include_inactive).await?)
    }

    pub async fn get_branch(
        &self,
        id: &BranchId,
        include_inactive: bool,
    ) -> Result<Branch, AppError> {
        match self.branches.find_by_id(id).await? {
            Some(branch) if branch.is_active || include_inactive => Ok(branch),
            _ => Err(DomainError::NotFound(format!("Branch {} not found", id)).into()),
        }
    }

    pub async fn create_branch(
        &self,
        actor: &User,
        input: BranchInput,
    ) -> Result<Branch, AppError> {
        require_role(actor, &[Role::Boss])?;

        let branch = self
            .branches
            .create(&NewBranch {
                name: required_text("Name", &input.name, NAME_MAX)?,
                address: required_text("Address", &input.address, 255)?,
                phone: optional_text(input.phone.as_deref()),
                business_hours: optional_text(input.business_hours.as_deref()),
            })
            .await?;

        tracing::info!(branch_id = %branch.id, "Branch created");
        self.audit
            .record_by(actor, "branch.create", "branch", branch.id, json!({"name": branch.name}))
            .await;
        Ok(branch)
    }

    pub async fn update_branch(
        &self,
        actor: &User,
        id: &BranchId,
        update: BranchUpdate,
    ) -> Result<Branch, AppError> {
        require_role(actor, &[Role::Boss])?;

        let name = match &update.name {
            Some(name) => Some(required_text("Name", name, NAME_MAX)?),
            None => None,
        };
        let address = match &update.address {
            Some(address) => Some(required_text("Address", address, 255)?),
            None => None,
        };

        let changes = BranchChanges {
            name,
            address,
            phone: update.phone.map(|p| optional_text(p.as_deref())),
            business_hours: update.business_hours.map(|h| optional_text(h.as_deref())),
            is_active: update.is_active,
        };
        let branch = self.branches.update(id, &changes).await?;

        self.audit
            .record_by(
                actor,
                "branch.update",
                "branch",
                branch.id,
                json!({"is_active": update.is_active}),
            )
            .await;
        Ok(branch)
    }

    /// Soft delete
    pub async fn deactivate_branch(&self, actor: &User, id: &BranchId) -> Result<Branch, AppError> {
        require_role(actor, &[Role::Boss])?;

        let changes = BranchChanges {
            is_active: Some(false),
            ..Default::default()
        };
        let branch = self.branches.update(id, &changes).await?;

        tracing::info!(branch_id = %branch.id, "Branch deactivated");
        self.audit
            .record_by(actor, "branch.deactivate", "branch", branch.id, json!({}))
            .await;
        Ok(branch)
    }

    // ------------------------------------------------------------------
    // Services and variants
    // ------------------------------------------------------------------

    async fn with_variants(
        &self,
        service: Service,
        include_inactive: bool,
    ) -> Result<ServiceWithVariants, AppError> {
        let variants = self
            .services
            .variants_for(&service.id)
            .await?
            .into_iter()
            .filter(|v| include_inactive || v.is_active)
            .collect();
        Ok(ServiceWithVariants { service, variants })
    }

    /// Services ordered by `sort_order`, with their variants
    pub async fn list_services(
        &self,
        include_inactive: bool,
    ) -> Result<Vec<ServiceWithVariants>, AppError> {
        let services = self.services.list(include_inactive).await?;
        let mut out = Vec::with_capacity(services.len());
        for service in services {
            out.push(self.with_variants(service, include_inactive).await?);
        }
        Ok(out)
    }

    pub async fn get_service(
        &self,
        id: &ServiceId,
        include_inactive: bool,
    ) -> Result<ServiceWithVariants, AppError> {
        match self.services.find_by_id(id).await? {
            Some(service) if service.is_active || include_inactive => {
                self.with_variants(service, include_inactive).await
            }
            _ => Err(DomainError::NotFound(format!("Service {} not found", id)).into()),
        }
    }

    pub async fn create_service(
        &self,
        actor: &User,
        input: ServiceInput,
    ) -> Result<Service, AppError> {
        require_role(actor, &[Role::Boss])?;
        non_negative("base_price", input.base_price)?;
        validate_duration(input.duration_minutes)?;

        let service = self
            .services
            .create(&NewService {
                name: required_text("Name", &input.name, NAME_MAX)?,
                description: optional_text(input.description.as_deref()),
                category: optional_text(input.category.as_deref()),
                base_price: input.base_price,
                duration_minutes: input.duration_minutes,
                sort_order: input.sort_order,
            })
            .await?;

        self.audit
            .record_by(
                actor,
                "service.create",
                "service",
                service.id,
                json!({"name": service.name, "base_price": service.base_price}),
            )
            .await;
        Ok(service)
    }

    pub async fn update_service(
        &self,
        actor: &User,
        id: &ServiceId,
        update: ServiceUpdate,
    ) -> Result<Service, AppError> {
        require_role(actor, &[Role::Boss])?;
        if let Some(price) = update.base_price {
            non_negative("base_price", price)?;
        }
        if let Some(minutes) = update.duration_minutes {
            validate_duration(minutes)?;
        }
        let name = match &update.name {
            Some(name) => Some(required_text("Name", name, NAME_MAX)?),
            None => None,
        };

        let changes = ServiceChanges {
            name,
            description: update.description.map(|d| optional_text(d.as_deref())),
            category: update.category.map(|c| optional_text(c.as_deref())),
            base_price: update.base_price,
            duration_minutes: update.duration_minutes,
            is_active: update.is_active,
            sort_order: update.sort_order,
        };
        let service = self.services.update(id, &changes).await?;

        self.audit
            .record_by(
                actor,
                "service.update",
                "service",
                service.id,
                json!({"base_price": update.base_price, "is_active": update.is_active}),
            )
            .await;
        Ok(service)
    }

    pub async fn deactivate_service(
        &self,
        actor: &User,
        id: &ServiceId,
    ) -> Result<Service, AppError> {
        self.update_service(
            actor,
            id,
            ServiceUpdate {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn create_variant(
        &self,
        actor: &User,
        service_id: &ServiceId,
        input: VariantInput,
    ) -> Result<ServiceVariant, AppError> {
        require_role(actor, &[Role::Boss])?;
        non_negative("price", input.price)?;
        if self.services.find_by_id(service_id).await?.is_none() {
            return Err(DomainError::NotFound(format!("Service {} not found", service_id)).into());
        }

        let variant = self
            .services
            .create_variant(&NewServiceVariant {
                service_id: *service_id,
                kind: input.kind,
                name: required_text("Name", &input.name, NAME_MAX)?,
                price: input.price,
                sort_order: input.sort_order,
            })
            .await?;

        self.audit
            .record_by(
                actor,
                "variant.create",
                "service_variant",
                variant.id,
                json!({"service_id": service_id, "kind": variant.kind, "price": variant.price}),
            )
            .await;
        Ok(variant)
    }

    pub async fn update_variant(
        &self,
        actor: &User,
        id: &VariantId,
        update: VariantUpdate,
    ) -> Result<ServiceVariant, AppError> {
        require_role(actor, &[Role::Boss])?;
        if let Some(price) = update.price {
            non_negative("price", price)?;
        }
        let name = match &update.name {
            Some(name) => Some(required_text("Name", name, NAME_MAX)?),
            None => None,
        };

        let variant = self
            .services
            .update_variant(
                id,
                &VariantChanges {
                    name,
                    price: update.price,
                    is_active: update.is_active,
                    sort_order: update.sort_order,
                },
            )
            .await?;

        self.audit
            .record_by(
                actor,
                "variant.update",
                "service_variant",
                variant.id,
                json!({"price": update.price, "is_active": update.is_active}),
            )
            .await;
        Ok(variant)
    }

    pub async fn delete_variant(&self, actor: &User, id: &VariantId) -> Result<(), AppError> {
        require_role(actor, &[Role::Boss])?;
        self.services.delete_variant(id).await?;
        self.audit
            .record_by(actor, "variant.delete", "service_variant", id, json!({}))
            .await;
        Ok(())
    }

    /// Price a selection for an active service
    pub async fn quote(
        &self,
        service_id: &ServiceId,
        request: &PriceRequest,
    ) -> Result<PriceBreakdown, AppError> {
        let service = self.get_service(service_id, false).await?;
        Ok(calculate_price(
            &service.service,
            &service.variants,
            &request.selection,
            request.quantity,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::VariantSelection;
    use crate::test_utils::{
        test_service, test_user, test_variant, InMemoryAuditLogRepository,
        InMemoryBranchRepository, InMemoryServiceRepository,
    };

    type TestCatalog = CatalogService<
        InMemoryBranchRepository,
        InMemoryServiceRepository,
        InMemoryAuditLogRepository,
    >;

    fn create_test_service(services: InMemoryServiceRepository) -> TestCatalog {
        CatalogService::new(
            Arc::new(InMemoryBranchRepository::new()),
            Arc::new(services),
            Arc::new(AuditService::new(Arc::new(InMemoryAuditLogRepository::new()))),
        )
    }

    fn branch_input(name: &str) -> BranchInput {
        BranchInput {
            name: name.to_string(),
            address: "12 Ink Road".to_string(),
            phone: None,
            business_hours: Some("10:00-20:00".to_string()),
        }
    }

    #[tokio::test]
    async fn only_boss_manages_branches() {
        let catalog = create_test_service(InMemoryServiceRepository::new());
        let manager = test_user(Role::Manager);
        assert!(matches!(
            catalog.create_branch(&manager, branch_input("North")).await,
            Err(AppError::Forbidden)
        ));

        let boss = test_user(Role::Boss);
        let branch = catalog.create_branch(&boss, branch_input("North")).await.unwrap();
        assert_eq!(catalog.list_branches(false).await.unwrap().len(), 1);

        catalog.deactivate_branch(&boss, &branch.id).await.unwrap();
        assert!(catalog.list_branches(false).await.unwrap().is_empty());
        assert!(catalog.get_branch(&branch.id, false).await.is_err());
        assert!(catalog.get_branch(&branch.id, true).await.is_ok());
    }

    #[tokio::test]
    async fn branch_name_is_required_and_bounded() {
        let catalog = create_test_service(InMemoryServiceRepository::new());
        let boss = test_user(Role::Boss);
        assert!(catalog.create_branch(&boss, branch_input("  ")).await.is_err());
        assert!(catalog
            .create_branch(&boss, branch_input(&"x".repeat(101)))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn service_validation() {
        let catalog = create_test_service(InMemoryServiceRepository::new());
        let boss = test_user(Role::Boss);
        let input = |price, minutes| ServiceInput {
            name: "Realism".to_string(),
            description: None,
            category: None,
            base_price: price,
            duration_minutes: minutes,
            sort_order: 0,
        };

        assert!(catalog.create_service(&boss, input(-1, 60)).await.is_err());
        assert!(catalog.create_service(&boss, input(1000, 0)).await.is_err());
        assert!(catalog.create_service(&boss, input(1000, 60)).await.is_ok());
    }

    #[tokio::test]
    async fn public_listing_hides_inactive_variants() {
        let service = test_service("Lettering", 2000);
        let active = test_variant(&service.id, VariantKind::Addon, "Gold leaf", 300);
        let mut retired = test_variant(&service.id, VariantKind::Addon, "Glitter", 100);
        retired.is_active = false;
        let catalog = create_test_service(
            InMemoryServiceRepository::new()
                .with_service(service.clone())
                .with_variant(active.clone())
                .with_variant(retired),
        );

        let listed = catalog.list_services(false).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].variants.len(), 1);
        assert_eq!(listed[0].variants[0].id, active.id);

        let admin_view = catalog.get_service(&service.id, true).await.unwrap();
        assert_eq!(admin_view.variants.len(), 2);
    }

    #[tokio::test]
    async fn quote_uses_stored_variants() {
        let service = test_service("Lettering", 2000);
        let addon = test_variant(&service.id, VariantKind::Addon, "Gold leaf", 300);
        let catalog = create_test_service(
            InMemoryServiceRepository::new()
                .with_service(service.clone())
                .with_variant(addon.clone()),
        );

        let quote = catalog
            .quote(
                &service.id,
                &PriceRequest {
                    selection: VariantSelection {
                        addon_ids: vec![addon.id],
                        ..Default::default()
                    },
                    quantity: 2,
                },
            )
            .await
            .unwrap();
        assert_eq!(quote.unit_price, 2300);
        assert_eq!(quote.total, 4600);
    }

    #[tokio::test]
    async fn variants_require_existing_service() {
        let catalog = create_test_service(InMemoryServiceRepository::new());
        let boss = test_user(Role::Boss);
        let err = catalog
            .create_variant(
                &boss,
                &ServiceId::new(),
                VariantInput {
                    kind: VariantKind::Size,
                    name: "XL".to_string(),
                    price: 9000,
                    sort_order: 0,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::NOT_FOUND);
    }
}
