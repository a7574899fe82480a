use sea_orm_migration::MigratorTrait;
use storefront_api::{config, db, migrator::Migrator};
use tracing::info;

/// Applies (or with `down`, reverts) the embedded schema migrations.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_config = config::load_config()?;
    config::init_tracing(app_config.log_level.as_str(), app_config.log_json);

    let pool = db::establish_connection_from_app_config(&app_config).await?;

    match std::env::args().nth(1).as_deref() {
        Some("down") => {
            info!("Reverting the most recent migration");
            Migrator::down(&pool, Some(1)).await?;
        }
        Some("status") => {
            Migrator::status(&pool).await?;
        }
        _ => db::run_migrations(&pool).await?,
    }

    info!("Migration command completed");
    Ok(())
}
