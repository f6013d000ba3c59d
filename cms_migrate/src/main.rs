//! Applies the CMS schema migrations to the configured database.
//!
//! `cms-migrate` migrates and prints the history; `cms-migrate status` only
//! prints it.

use anyhow::Result;
use cms_core::{get_database_pool, AppConfig, DatabaseManager, MigrationManager};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let status_only = match std::env::args().nth(1).as_deref() {
        None | Some("up") => false,
        Some("status") => true,
        Some(other) => anyhow::bail!("Unknown command '{}', expected 'up' or 'status'", other),
    };

    let config = AppConfig::load()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    info!("Configuration loaded successfully");
    info!("Database URL: {}", config.database.url);

    let pool = get_database_pool(&config.database).await?;
    let db_manager = DatabaseManager::new(pool.clone());
    db_manager.health_check().await?;

    let migrations = MigrationManager::new(pool);
    if !status_only {
        migrations.run_migrations().await?;
    }

    for record in migrations.get_migration_history().await? {
        info!(
            version = record.version,
            checksum = %record.checksum,
            applied_at = %record.applied_at,
            "{}",
            record.name
        );
    }

    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let default_level = if cfg!(debug_assertions) { "debug" } else { "info" };

        format!("cms_migrate={},cms_core={},sqlx=warn", default_level, default_level).into()
    });

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    let is_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    if is_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.pretty())
            .init();
    }
}
