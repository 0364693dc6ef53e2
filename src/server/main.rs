use std::env;
use std::error::Error;

use tokio::net::TcpListener;
use tracing::info;

use activator::activation_code::CodeBatchConfig;
use activator::config::get_config;
use activator::server::{
    build_router, execute_codes_command, init_logging, parse_codes_command, AppState, Database,
};

#[cfg(feature = "background-jobs")]
use activator::jobs::{JobConfig, JobScheduler};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = get_config()?;
    init_logging(&config.logging)?;

    let db = Database::connect(&config.database).await?;
    db.migrate().await?;
    info!("Database ready ({})", db.db_type());

    // Operator commands run against the same database, then exit.
    let args: Vec<String> = env::args().collect();
    let command = parse_codes_command(&args)?;
    let batch = CodeBatchConfig::from(&config.issuance);
    if execute_codes_command(&db, command, &batch).await? {
        return Ok(());
    }

    let state = AppState::new(db.clone(), config.issuance.clone());

    #[cfg(feature = "background-jobs")]
    let _scheduler = if config.issuance.enabled {
        let scheduler = JobScheduler::new(
            db,
            JobConfig {
                batch: batch.clone(),
                ..JobConfig::default()
            },
        )
        .await?
        .with_refill_lock(state.refill_lock());
        scheduler.start().await?;
        Some(scheduler)
    } else {
        None
    };

    let app = build_router(state, &config.cors);

    let addr = config.server.bind_address();
    let listener = TcpListener::bind(&addr).await?;
    info!(
        "Listening on http://{} (issuance endpoint {})",
        listener.local_addr()?,
        if config.issuance.enabled { "enabled" } else { "disabled" }
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}
