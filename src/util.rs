use std::sync::Arc;

use fractic_server_error::ServerError;

use crate::{
    config::PosConfig,
    data::repositories::{
        cloud_repository_impl::CloudRepositoryImpl, store_repository_impl::StoreRepositoryImpl,
    },
    domain::usecases::{
        admin_usecase::{AdminUsecase, AdminUsecaseImpl},
        auth_usecase::{AuthUsecase, AuthUsecaseImpl},
        backup_usecase::{BackupUsecase, BackupUsecaseImpl},
        cashier_usecase::{CashierUsecase, CashierUsecaseImpl},
        correction_usecase::{CorrectionUsecase, CorrectionUsecaseImpl},
        report_usecase::{ReportUsecase, ReportUsecaseImpl},
        settlement_usecase::{SettlementUsecase, SettlementUsecaseImpl},
        sync_usecase::SyncUsecaseImpl,
    },
};

/// Entry point of the library: one store and one Google connection shared by
/// every use case.
pub struct PosSettlementUtil {
    config: Arc<PosConfig>,
    auth_usecase: AuthUsecaseImpl,
    admin_usecase: AdminUsecaseImpl,
    cashier_usecase: CashierUsecaseImpl,
    correction_usecase: CorrectionUsecaseImpl,
    settlement_usecase: SettlementUsecaseImpl,
    report_usecase: ReportUsecaseImpl,
    backup_usecase: BackupUsecaseImpl,
}

impl PosSettlementUtil {
    /// Opens (and if needed creates) the database at `config.db_path`.
    pub fn open(config: PosConfig) -> Result<Self, ServerError> {
        let store = StoreRepositoryImpl::open(&config.db_path)?;
        Self::build(config, store)
    }

    /// Same as `open`, with a database that lives only as long as the value.
    pub fn open_in_memory(config: PosConfig) -> Result<Self, ServerError> {
        Self::build(config, StoreRepositoryImpl::open_in_memory()?)
    }

    fn build(config: PosConfig, store: StoreRepositoryImpl) -> Result<Self, ServerError> {
        let currency = config.currency()?;
        let config = Arc::new(config);
        let store = Arc::new(store);
        let cloud = Arc::new(CloudRepositoryImpl::new(
            &config.google.token_path,
            &config.google.drive_api_url,
            &config.google.sheets_api_url,
        ));
        let sync = Arc::new(SyncUsecaseImpl::new(
            Arc::clone(&store),
            Arc::clone(&cloud),
            config.google.background_sync,
        ));
        tracing::debug!(
            db = %config.db_path.display(),
            currency = currency.code(),
            "pos settlement initialized"
        );

        Ok(Self {
            auth_usecase: AuthUsecaseImpl::new(Arc::clone(&store)),
            admin_usecase: AdminUsecaseImpl::new(Arc::clone(&store), Arc::clone(&config)),
            cashier_usecase: CashierUsecaseImpl::new(
                Arc::clone(&store),
                sync,
                Arc::clone(&config),
                currency,
            ),
            correction_usecase: CorrectionUsecaseImpl::new(
                Arc::clone(&store),
                Arc::clone(&config),
                currency,
            ),
            settlement_usecase: SettlementUsecaseImpl::new(
                Arc::clone(&store),
                Arc::clone(&config),
                currency,
            ),
            report_usecase: ReportUsecaseImpl::new(Arc::clone(&store), currency),
            backup_usecase: BackupUsecaseImpl::new(store, cloud, Arc::clone(&config)),
            config,
        })
    }

    pub fn config(&self) -> &PosConfig {
        &self.config
    }

    pub fn auth(&self) -> &dyn AuthUsecase {
        &self.auth_usecase
    }

    pub fn admin(&self) -> &dyn AdminUsecase {
        &self.admin_usecase
    }

    pub fn cashier(&self) -> &dyn CashierUsecase {
        &self.cashier_usecase
    }

    pub fn corrections(&self) -> &dyn CorrectionUsecase {
        &self.correction_usecase
    }

    pub fn settlement(&self) -> &dyn SettlementUsecase {
        &self.settlement_usecase
    }

    pub fn reports(&self) -> &dyn ReportUsecase {
        &self.report_usecase
    }

    pub fn backup(&self) -> &dyn BackupUsecase {
        &self.backup_usecase
    }
}
