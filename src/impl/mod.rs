// Crate-internal.
// ---

pub(crate) mod data {
    pub(crate) mod datasources {
        pub(crate) mod categories_csv_datasource;
        pub(crate) mod google_api_datasource;
        pub(crate) mod sqlite_datasource;
        pub(crate) mod token_file_datasource;
    }
    pub(crate) mod models {
        pub(crate) mod cash_breakdown_model;
        pub(crate) mod category_kind_model;
        pub(crate) mod token_model;
    }
    pub(crate) mod repositories {
        pub(crate) mod cloud_repository_impl;
        pub(crate) mod store_repository_impl;
    }
}

pub(crate) mod domain {
    pub(crate) mod entities {
        pub(crate) mod business_day;
        pub(crate) mod cash_breakdown;
        pub(crate) mod category;
        pub(crate) mod location;
        pub(crate) mod report;
        pub(crate) mod settings;
        pub(crate) mod settlement;
        pub(crate) mod transaction;
        pub(crate) mod user;
    }
    pub(crate) mod logic {
        pub(crate) mod access;
        pub(crate) mod day_lifecycle;
        pub(crate) mod lookup;
        pub(crate) mod password;
        pub(crate) mod period;
        pub(crate) mod pricing;
        pub(crate) mod report_builder;
        pub(crate) mod runtime_settings;
        pub(crate) mod settlement_calculator;
        pub(crate) mod validators;
    }
    pub(crate) mod repositories {
        pub(crate) mod cloud_repository;
        pub(crate) mod store_repository;
    }
    pub(crate) mod usecases {
        pub(crate) mod admin_usecase;
        pub(crate) mod auth_usecase;
        pub(crate) mod backup_usecase;
        pub(crate) mod cashier_usecase;
        pub(crate) mod correction_usecase;
        pub(crate) mod report_usecase;
        pub(crate) mod settlement_usecase;
        pub(crate) mod sync_usecase;
    }
}

pub(crate) mod presentation {
    pub(crate) mod csv_exporter;
    pub(crate) mod filename_template;
    pub(crate) mod settlement_printer;
    pub(crate) mod utils;
}

// Public exports.
// ---

#[doc(hidden)]
#[allow(unused_imports)]
pub mod exports {
    // Public surface, re-exported at the crate root. Repository traits are
    // exposed so callers can see what a cloud backend must provide.

    pub mod entities {
        pub use crate::domain::entities::business_day::*;
        pub use crate::domain::entities::cash_breakdown::*;
        pub use crate::domain::entities::category::*;
        pub use crate::domain::entities::location::*;
        pub use crate::domain::entities::report::*;
        pub use crate::domain::entities::settings::*;
        pub use crate::domain::entities::settlement::*;
        pub use crate::domain::entities::transaction::*;
        pub use crate::domain::entities::user::*;
    }

    pub mod usecases {
        pub use crate::domain::usecases::admin_usecase::AdminUsecase;
        pub use crate::domain::usecases::auth_usecase::AuthUsecase;
        pub use crate::domain::usecases::backup_usecase::BackupUsecase;
        pub use crate::domain::usecases::cashier_usecase::CashierUsecase;
        pub use crate::domain::usecases::correction_usecase::CorrectionUsecase;
        pub use crate::domain::usecases::report_usecase::ReportUsecase;
        pub use crate::domain::usecases::settlement_usecase::SettlementUsecase;
    }

    pub mod repositories {
        pub use crate::domain::repositories::cloud_repository::*;
    }
}
