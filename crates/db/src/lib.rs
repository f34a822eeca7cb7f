//! Storage for the fediseer trust graph: entities, migrations and
//! repositories over `PostgreSQL`.

pub mod entities;
pub mod migrations;
pub mod repositories;
pub mod test_utils;

use fediseer_common::{AppError, Config, config::DatabaseConfig};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::time::Duration;
use tracing::log::LevelFilter;

/// Pool options for `config`.
///
/// Idle connections are dropped after five minutes and pinged before reuse.
/// `min_connections` never exceeds `max_connections`.
#[must_use]
pub fn connect_options(config: &DatabaseConfig) -> ConnectOptions {
    let timeout = Duration::from_secs(config.connect_timeout_secs);
    let mut opt = ConnectOptions::new(&config.url);
    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections.min(config.max_connections))
        .connect_timeout(timeout)
        .acquire_timeout(timeout)
        .idle_timeout(Duration::from_secs(300))
        .test_before_acquire(true)
        .sqlx_logging(config.log_statements)
        .sqlx_logging_level(LevelFilter::Debug);
    opt
}

/// Connect the pool described by `config.database`.
pub async fn init(config: &Config) -> Result<DatabaseConnection, AppError> {
    tracing::debug!(
        max_connections = config.database.max_connections,
        "Connecting to database"
    );
    Database::connect(connect_options(&config.database))
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}

/// Bring the schema up to date.
pub async fn migrate(db: &DatabaseConnection) -> Result<(), AppError> {
    use sea_orm_migration::MigratorTrait;
    migrations::Migrator::up(db, None)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}
