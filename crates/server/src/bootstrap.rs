use std::sync::Arc;

use gatepass_core::config::{AppConfig, ConfigError};
use gatepass_core::workflow::WorkflowEngine;
use gatepass_db::connection::connect_with_config;
use gatepass_db::{migrations, DbPool, SqlRequestRepository};
use thiserror::Error;
use tracing::info;

pub type SqlWorkflowEngine = WorkflowEngine<SqlRequestRepository>;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub engine: Arc<SqlWorkflowEngine>,
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

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    // The engine owns its own handle to the pool; the health probe keeps another.
    let engine = Arc::new(WorkflowEngine::new(SqlRequestRepository::new(db_pool.clone())));

    Ok(Application { config, db_pool, engine })
}
