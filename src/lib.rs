pub(crate) mod auth;
pub(crate) mod controllers;
pub(crate) mod core;
pub(crate) mod routes;
pub(crate) mod types;
pub(crate) mod utils;

use config::Config;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::core::error::ConfigError as Error;
use crate::core::store::PgRecordStore;
use crate::core::{config::Args, state::AppState};

pub async fn run() -> Result<(), Error> {
    let config = Config::builder()
        .add_source(config::Environment::with_prefix("RECORDGATE"))
        .build()
        .map_err(Error::Config)?;

    let config = config.try_deserialize::<Args>().map_err(Error::Config)?;

    let database_url = format!(
        "postgresql://{}:{}@{}:{}/{}",
        config.database_user,
        config.database_password,
        config.database_host,
        config.database_port,
        config.database_name
    );

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_new(&config.log_level).unwrap_or_default())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let store = PgRecordStore::connect(&database_url).await?;

    sqlx::migrate!()
        .run(&store.pool.clone())
        .await
        .map_err(Error::DatabaseMigration)?;

    let state = AppState::new(&config, store)?;

    let app = routes::router::routes(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .map_err(Error::IO)?;

    tracing::debug!("listening on port {}", config.port);

    axum::serve(listener, app).await.map_err(Error::IO)?;

    Ok(())
}
