use presswork_core::config::{AppConfig, ConfigError, LoadOptions};
use presswork_db::{connect_with_settings, migrations, DbPool};
use thiserror::Error;
use tracing::info;

use crate::routes::AppState;
use crate::service::QuotationService;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

#[cfg(test)]
pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    bootstrap_with_config(AppConfig::load(options)?).await
}

/// Connects, migrates and wires the quotation service for an already loaded config.
pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        database_url = %config.database.url,
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        max_connections = config.database.max_connections,
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let service = QuotationService::sql(db_pool.clone(), config.pricing.clone());
    let state = AppState::new(service, config.server.api_token());
    if state.api_token().is_none() {
        info!(
            event_name = "system.bootstrap.open_api",
            correlation_id = "bootstrap",
            "no server.api_token configured; only actor headers gate /quotations"
        );
    }

    Ok(Application { config, db_pool, state })
}

#[cfg(test)]
mod tests {
    use presswork_core::config::{ConfigOverrides, LoadOptions};

    use crate::bootstrap::bootstrap;

    fn options(database_url: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_applies_migrations_and_wires_the_token() {
        let mut options = options("sqlite::memory:");
        options.overrides.api_token = Some("s3cret".to_string());
        let app = bootstrap(options).await.expect("bootstrap should succeed");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('quotations', 'quotation_items', 'quotation_history')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("quotation tables should exist after bootstrap");
        assert_eq!(table_count, 3);
        assert_eq!(app.state.api_token(), Some("s3cret"));

        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn bootstrap_fails_on_invalid_configuration() {
        let result = bootstrap(options("")).await;

        let message = result.err().expect("empty database url must be rejected").to_string();
        assert!(message.contains("database.url"));
    }
}
