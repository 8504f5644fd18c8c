use fornada_app::{config::AppConfig, database};
use tracing::info;

pub(crate) async fn run(config: &AppConfig) -> Result<(), String> {
    let url = config
        .storage
        .database_url
        .as_deref()
        .ok_or_else(|| "DATABASE_URL is required to migrate".to_string())?;

    let pool = database::connect(url)
        .await
        .map_err(|error| format!("failed to connect to database: {error}"))?;

    database::migrate(&pool)
        .await
        .map_err(|error| format!("failed to apply migrations: {error}"))?;

    info!("migrations applied");

    Ok(())
}
