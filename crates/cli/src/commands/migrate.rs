//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! evault migrate
//! ```
//!
//! # Migration Files
//!
//! Migrations live in `crates/checkout/migrations/`:
//! ```text
//! migrations/
//! ├── 20260301000001_create_catalog.sql
//! ├── 20260301000002_create_carts.sql
//! └── 20260301000003_create_orders.sql
//! ```

use sqlx::PgPool;
use thiserror::Error;

/// Errors that can occur while migrating.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Apply every pending migration.
///
/// # Errors
///
/// Returns `MigrationError` if a migration fails to apply.
pub async fn run(pool: &PgPool) -> Result<(), MigrationError> {
    tracing::info!("Running checkout migrations...");
    sqlx::migrate!("../checkout/migrations").run(pool).await?;
    tracing::info!("Checkout migrations complete!");
    Ok(())
}
