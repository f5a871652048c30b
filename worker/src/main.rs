use anyhow::Result;
use backend::{config::config_loader::get_stage, wiring::CoreServices};
use crates::infra::db::postgres::postgres_connection;
use std::{sync::Arc, time::Duration};
use tracing::{error, info};
use worker::{axum_http, config, reconciliation::{self, worker::MembershipSync}};

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(error) = run().await {
        error!("Worker exited with error: {}", error);
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    crates::observability::init_observability("worker")?;

    let dotenvy_env = Arc::new(config::config_loader::load()?);
    let stage = get_stage();
    info!(%stage, "ENV has been loaded");

    let postgres_pool = postgres_connection::establish_connection(&dotenvy_env.database.url)?;
    info!("Postgres connection has been established");

    let services = CoreServices::build(
        Arc::new(postgres_pool),
        &dotenvy_env.stripe,
        dotenvy_env.core.settings(),
        stage,
    );
    let reconciler: Arc<dyn MembershipSync> = services.reconciler.clone();

    let reconciliation_loop = tokio::spawn(reconciliation::worker::run(
        Arc::clone(&reconciler),
        Arc::clone(&services.locks),
        Duration::from_secs(dotenvy_env.reconciliation.interval_secs.max(1)),
    ));

    let server_config = Arc::clone(&dotenvy_env);
    let sync_server =
        tokio::spawn(async move { axum_http::http_serve::start(server_config, reconciler).await });

    tokio::select! {
        result = reconciliation_loop => result??,
        result = sync_server => result??,
    };
    Ok(())
}
