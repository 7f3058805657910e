use anyhow::Result;
use std::net::SocketAddr;
use swing_coach::api::create_routes;
use swing_coach::config::{run_migrations, AppConfig, DatabaseConfig, DatabaseSeeder};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("swing_coach=info,tower_http=info")),
        )
        .init();

    let config = AppConfig::from_env()?;
    if config.uses_dev_secret() {
        warn!("SECRET_KEY not set; using the development signing key");
        if config.is_production() {
            anyhow::bail!("SECRET_KEY must be set in production");
        }
    }

    let database = DatabaseConfig::from_env()?;
    let pool = database.create_pool().await?;
    run_migrations(&pool).await?;
    info!("database migrations applied");

    DatabaseSeeder::new(pool.clone())
        .seed_default_instructor(config.instructor_default_code.as_deref())
        .await?;

    let app = create_routes(pool, &config)?;

    let address = config.server_address();
    let listener = TcpListener::bind(&address).await?;
    info!("swing-coach listening on http://{}", address);
    info!("health check available at http://{}/healthz", address);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
