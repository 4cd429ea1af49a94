use dotenvy::dotenv;
use inrfs::config::{self, Settings};
use inrfs::context::AppContext;
use inrfs::errors::Result;
use std::path::Path;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const PLAN_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();
    info!("Attempted to load .env file.");

    // 3. Settings
    let settings = Settings::from_env()
        .inspect_err(|e| error!("Critical error loading settings: {}", e))?;

    // 4. Database and schema
    let db = config::database::create_connection(&settings.database_url)
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    config::database::create_tables(&db)
        .await
        .inspect(|()| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to create tables: {}", e))?;

    // 5. Plan reference data
    if Path::new(PLAN_CONFIG_PATH).exists() {
        let plans = config::plans::load_config(PLAN_CONFIG_PATH)?;
        let inserted = config::plans::seed_plan_types(&db, &plans.plan_types).await?;
        info!(inserted, "Plan types seeded");
    } else {
        warn!("{} not found; skipping plan type seeding", PLAN_CONFIG_PATH);
    }

    // 6. Wire collaborators
    let ctx = AppContext::from_settings(db, &settings)?;
    info!(
        frontend = %ctx.frontend_base_url,
        "Investment backend core ready"
    );

    Ok(())
}
