use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use fractic_server_error::ServerError;

use crate::{
    config::PosConfig,
    data::{
        datasources::categories_csv_datasource::{
            CategoriesCsvDatasource, CategoriesCsvDatasourceImpl,
        },
        models::category_kind_model::CategoryKindModel,
        repositories::store_repository_impl::StoreRepositoryImpl,
    },
    domain::{
        logic::{
            access::ensure_can,
            lookup::location_by_id,
            runtime_settings::{
                backup_settings, google_settings, save_backup_settings, save_google_settings,
            },
            validators::{generate_slug, validate_category, validate_location_name, validate_slug},
        },
        repositories::store_repository::StoreRepository,
    },
    entities::{
        BackupSettings, Category, CategoryId, CategoryKind, CategorySpec, GoogleSettings,
        Location, LocationId, LocationSpec, Permission, User,
    },
    errors::{DuplicateEntity, EntityNotFound, InvalidCategoryRule, LocationInUse},
};

/// Management of locations, their POS categories and runtime settings.
#[async_trait]
pub trait AdminUsecase: Send + Sync {
    async fn list_locations(&self, actor: &User) -> Result<Vec<Location>, ServerError>;
    async fn add_location(&self, actor: &User, spec: LocationSpec)
        -> Result<Location, ServerError>;
    async fn edit_location(
        &self,
        actor: &User,
        id: LocationId,
        spec: LocationSpec,
    ) -> Result<Location, ServerError>;
    /// Rejected while the location still has business days.
    async fn delete_location(&self, actor: &User, id: LocationId) -> Result<(), ServerError>;

    /// Suggested slug for a location name.
    fn suggest_slug(&self, name: &str) -> String;

    async fn list_categories(
        &self,
        actor: &User,
        location: LocationId,
    ) -> Result<Vec<Category>, ServerError>;
    async fn add_category(
        &self,
        actor: &User,
        location: LocationId,
        spec: CategorySpec,
    ) -> Result<Category, ServerError>;
    async fn edit_category(
        &self,
        actor: &User,
        id: CategoryId,
        spec: CategorySpec,
    ) -> Result<Category, ServerError>;
    async fn delete_category(&self, actor: &User, id: CategoryId) -> Result<(), ServerError>;

    /// Adds every category of a `name,color,kind` CSV file. Rule targets may
    /// refer to existing categories or to rows earlier in the same file. The
    /// whole file is checked before anything is stored.
    async fn import_categories_csv(
        &self,
        actor: &User,
        location: LocationId,
        csv: &str,
    ) -> Result<Vec<Category>, ServerError>;

    async fn google_settings(&self, actor: &User) -> Result<GoogleSettings, ServerError>;
    async fn save_google_settings(
        &self,
        actor: &User,
        settings: &GoogleSettings,
    ) -> Result<(), ServerError>;
    async fn backup_settings(&self, actor: &User) -> Result<BackupSettings, ServerError>;
    async fn save_backup_settings(
        &self,
        actor: &User,
        settings: &BackupSettings,
    ) -> Result<(), ServerError>;
}

pub(crate) struct AdminUsecaseImpl<
    R1 = StoreRepositoryImpl,         // Default.
    D1 = CategoriesCsvDatasourceImpl, // Default.
> where
    R1: StoreRepository,
    D1: CategoriesCsvDatasource + Send + Sync,
{
    store_repository: Arc<R1>,
    categories_csv_datasource: D1,
    config: Arc<PosConfig>,
}

impl<R1: StoreRepository> AdminUsecaseImpl<R1, CategoriesCsvDatasourceImpl> {
    pub(crate) fn new(store_repository: Arc<R1>, config: Arc<PosConfig>) -> Self {
        Self {
            store_repository,
            categories_csv_datasource: CategoriesCsvDatasourceImpl::new(),
            config,
        }
    }
}

impl<R1, D1> AdminUsecaseImpl<R1, D1>
where
    R1: StoreRepository,
    D1: CategoriesCsvDatasource + Send + Sync,
{
    fn checked_location_spec(
        &self,
        spec: LocationSpec,
        own_id: Option<LocationId>,
    ) -> Result<LocationSpec, ServerError> {
        let spec = LocationSpec::new(spec.name.trim(), spec.slug.trim());
        validate_location_name(&spec.name)?;
        validate_slug(&spec.slug)?;
        let other = |l: Option<Location>| l.filter(|l| Some(l.id) != own_id);
        if other(self.store_repository.location_by_name(&spec.name)?).is_some() {
            return Err(DuplicateEntity::new("Location", &spec.name));
        }
        if other(self.store_repository.location_by_slug(&spec.slug)?).is_some() {
            return Err(DuplicateEntity::new("Location", &spec.slug));
        }
        Ok(spec)
    }

    fn checked_category_spec(
        &self,
        location: LocationId,
        spec: CategorySpec,
        own_id: Option<CategoryId>,
    ) -> Result<CategorySpec, ServerError> {
        let spec = CategorySpec::new(spec.name.trim(), spec.color.trim(), spec.kind);
        let existing = self.store_repository.list_categories(location)?;
        validate_category(&spec, &existing, own_id)?;
        if existing
            .iter()
            .any(|c| c.name == spec.name && Some(c.id) != own_id)
        {
            return Err(DuplicateEntity::new("Category", &spec.name));
        }
        Ok(spec)
    }

    fn category(&self, id: CategoryId) -> Result<Category, ServerError> {
        self.store_repository
            .category_by_id(id)?
            .ok_or_else(|| EntityNotFound::new("Category", &id.to_string()))
    }
}

#[async_trait]
impl<R1, D1> AdminUsecase for AdminUsecaseImpl<R1, D1>
where
    R1: StoreRepository,
    D1: CategoriesCsvDatasource + Send + Sync,
{
    async fn list_locations(&self, actor: &User) -> Result<Vec<Location>, ServerError> {
        ensure_can(actor, Permission::ManageLocations)?;
        self.store_repository.list_locations()
    }

    async fn add_location(
        &self,
        actor: &User,
        spec: LocationSpec,
    ) -> Result<Location, ServerError> {
        ensure_can(actor, Permission::ManageLocations)?;
        let spec = self.checked_location_spec(spec, None)?;
        let location = self.store_repository.insert_location(&spec)?;
        tracing::info!(location = %location.slug, user = %actor.username, "location added");
        Ok(location)
    }

    async fn edit_location(
        &self,
        actor: &User,
        id: LocationId,
        spec: LocationSpec,
    ) -> Result<Location, ServerError> {
        ensure_can(actor, Permission::ManageLocations)?;
        location_by_id(self.store_repository.as_ref(), id)?;
        let spec = self.checked_location_spec(spec, Some(id))?;
        let location = self.store_repository.update_location(id, &spec)?;
        tracing::info!(location = %location.slug, user = %actor.username, "location updated");
        Ok(location)
    }

    async fn delete_location(&self, actor: &User, id: LocationId) -> Result<(), ServerError> {
        ensure_can(actor, Permission::ManageLocations)?;
        let location = location_by_id(self.store_repository.as_ref(), id)?;
        if self.store_repository.count_business_days(id)? > 0 {
            return Err(LocationInUse::new(&location.name));
        }
        self.store_repository.delete_location(id)?;
        tracing::info!(location = %location.slug, user = %actor.username, "location deleted");
        Ok(())
    }

    fn suggest_slug(&self, name: &str) -> String {
        generate_slug(name)
    }

    async fn list_categories(
        &self,
        actor: &User,
        location: LocationId,
    ) -> Result<Vec<Category>, ServerError> {
        ensure_can(actor, Permission::ManageLocations)?;
        location_by_id(self.store_repository.as_ref(), location)?;
        self.store_repository.list_categories(location)
    }

    async fn add_category(
        &self,
        actor: &User,
        location: LocationId,
        spec: CategorySpec,
    ) -> Result<Category, ServerError> {
        ensure_can(actor, Permission::ManageLocations)?;
        location_by_id(self.store_repository.as_ref(), location)?;
        let spec = self.checked_category_spec(location, spec, None)?;
        let category = self.store_repository.insert_category(location, &spec)?;
        tracing::info!(
            location = %location,
            category = %category.name,
            kind = category.kind.type_key(),
            "category added"
        );
        Ok(category)
    }

    async fn edit_category(
        &self,
        actor: &User,
        id: CategoryId,
        spec: CategorySpec,
    ) -> Result<Category, ServerError> {
        ensure_can(actor, Permission::ManageLocations)?;
        let current = self.category(id)?;
        let spec = self.checked_category_spec(current.location_id, spec, Some(id))?;
        if current.kind == CategoryKind::Product && spec.kind != CategoryKind::Product {
            let targeted_by = self
                .store_repository
                .list_categories(current.location_id)?
                .into_iter()
                .find(|c| c.kind.target() == Some(id));
            if let Some(rule) = targeted_by {
                return Err(InvalidCategoryRule::new(
                    &rule.name,
                    "its target must stay a product category",
                ));
            }
        }
        let category = self.store_repository.update_category(id, &spec)?;
        tracing::info!(category = %category.name, user = %actor.username, "category updated");
        Ok(category)
    }

    async fn delete_category(&self, actor: &User, id: CategoryId) -> Result<(), ServerError> {
        ensure_can(actor, Permission::ManageLocations)?;
        let category = self.category(id)?;
        let targeted_by = self
            .store_repository
            .list_categories(category.location_id)?
            .into_iter()
            .find(|c| c.kind.target() == Some(id));
        if let Some(rule) = targeted_by {
            return Err(InvalidCategoryRule::new(
                &rule.name,
                &format!("still targets '{}'", category.name),
            ));
        }
        self.store_repository.delete_category(id)?;
        tracing::info!(category = %category.name, user = %actor.username, "category deleted");
        Ok(())
    }

    async fn import_categories_csv(
        &self,
        actor: &User,
        location: LocationId,
        csv: &str,
    ) -> Result<Vec<Category>, ServerError> {
        ensure_can(actor, Permission::ManageLocations)?;
        location_by_id(self.store_repository.as_ref(), location)?;
        let records = self.categories_csv_datasource.from_string(csv)?;
        let existing = self.store_repository.list_categories(location)?;

        // Check every row first. Product names become valid targets for the
        // rows after them.
        let mut products: HashMap<String, Option<CategoryId>> = existing
            .iter()
            .filter(|c| c.kind == CategoryKind::Product)
            .map(|c| (c.name.clone(), Some(c.id)))
            .collect();
        let mut names: Vec<&str> = existing.iter().map(|c| c.name.as_str()).collect();
        for record in &records {
            if names.contains(&record.name.as_str()) {
                return Err(DuplicateEntity::new("Category", &record.name));
            }
            if let Some(target) = record.kind.target_name() {
                if !products.contains_key(target) {
                    return Err(InvalidCategoryRule::new(
                        &record.name,
                        &format!("unknown product category '{}'", target),
                    ));
                }
            }
            if record.kind == CategoryKindModel::Product {
                products.insert(record.name.clone(), None);
            }
            names.push(&record.name);
        }

        let mut created = Vec::with_capacity(records.len());
        for record in records {
            let target = record
                .kind
                .target_name()
                .and_then(|name| products.get(name).copied().flatten());
            let kind = record.kind.resolve(target).ok_or_else(|| {
                InvalidCategoryRule::new(&record.name, "rule target could not be resolved")
            })?;
            let spec = self.checked_category_spec(
                location,
                CategorySpec::new(record.name, record.color, kind),
                None,
            )?;
            let category = self.store_repository.insert_category(location, &spec)?;
            if category.kind == CategoryKind::Product {
                products.insert(category.name.clone(), Some(category.id));
            }
            created.push(category);
        }
        tracing::info!(
            location = %location,
            count = created.len(),
            user = %actor.username,
            "categories imported"
        );
        Ok(created)
    }

    async fn google_settings(&self, actor: &User) -> Result<GoogleSettings, ServerError> {
        ensure_can(actor, Permission::SystemSettings)?;
        google_settings(self.store_repository.as_ref())
    }

    async fn save_google_settings(
        &self,
        actor: &User,
        settings: &GoogleSettings,
    ) -> Result<(), ServerError> {
        ensure_can(actor, Permission::SystemSettings)?;
        save_google_settings(self.store_repository.as_ref(), settings)?;
        tracing::info!(user = %actor.username, "google settings saved");
        Ok(())
    }

    async fn backup_settings(&self, actor: &User) -> Result<BackupSettings, ServerError> {
        ensure_can(actor, Permission::SystemSettings)?;
        backup_settings(
            self.store_repository.as_ref(),
            &self.config.backup.default_files,
        )
    }

    async fn save_backup_settings(
        &self,
        actor: &User,
        settings: &BackupSettings,
    ) -> Result<(), ServerError> {
        ensure_can(actor, Permission::SystemSettings)?;
        save_backup_settings(self.store_repository.as_ref(), settings)?;
        tracing::info!(
            user = %actor.username,
            frequency = settings.frequency.as_str(),
            "backup settings saved"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Role, RoleId, UserId, ADMIN_ROLE};
    use pretty_assertions::assert_eq;

    fn admin() -> User {
        User {
            id: UserId(1),
            username: "admin".into(),
            email: None,
            password_hash: None,
            roles: vec![Role {
                id: RoleId(1),
                name: ADMIN_ROLE.into(),
                permissions: vec![],
            }],
        }
    }

    fn usecase() -> AdminUsecaseImpl {
        AdminUsecaseImpl::new(
            Arc::new(StoreRepositoryImpl::open_in_memory().unwrap()),
            Arc::new(PosConfig::default()),
        )
    }

    #[tokio::test]
    async fn locations_are_unique_and_protected() {
        let admin = admin();
        let usecase = usecase();
        let main = usecase
            .add_location(&admin, LocationSpec::new(" Main ", "main"))
            .await
            .unwrap();
        assert_eq!(main.name, "Main");
        assert!(usecase
            .add_location(&admin, LocationSpec::new("Other", "main"))
            .await
            .is_err());
        assert!(usecase
            .add_location(&admin, LocationSpec::new("Bad", "Bad Slug"))
            .await
            .is_err());
        let renamed = usecase
            .edit_location(&admin, main.id, LocationSpec::new("Main Store", "main"))
            .await
            .unwrap();
        assert_eq!(renamed.name, "Main Store");
        usecase.delete_location(&admin, main.id).await.unwrap();
        assert!(usecase.list_locations(&admin).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn import_resolves_targets_from_earlier_rows() {
        let admin = admin();
        let usecase = usecase();
        let location = usecase
            .add_location(&admin, LocationSpec::new("Main", "main"))
            .await
            .unwrap();
        let csv = "name,color,kind\n\
                   Books,#112233,Product\n\
                   Books 2+1,#445566,\"BuyNGetM(target: \"\"Books\"\", buy_n: 2, get_m: 1)\"\n";

        let created = usecase
            .import_categories_csv(&admin, location.id, csv)
            .await
            .unwrap();
        assert_eq!(created.len(), 2);
        assert_eq!(
            created[1].kind,
            CategoryKind::BuyNGetM {
                target: created[0].id,
                buy_n: 2,
                get_m: 1
            }
        );
        assert!(usecase.delete_category(&admin, created[0].id).await.is_err());
    }

    #[tokio::test]
    async fn import_checks_every_row_before_storing() {
        let admin = admin();
        let usecase = usecase();
        let location = usecase
            .add_location(&admin, LocationSpec::new("Main", "main"))
            .await
            .unwrap();
        let csv = "name,color,kind\n\
                   Books,#112233,Product\n\
                   Promo,#445566,\"BuyXGetXMinus1(target: \"\"Pens\"\")\"\n";

        assert!(usecase
            .import_categories_csv(&admin, location.id, csv)
            .await
            .is_err());
        assert!(usecase
            .list_categories(&admin, location.id)
            .await
            .unwrap()
            .is_empty());
    }
}
