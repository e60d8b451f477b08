//! Authstream API server entry point.

use std::sync::Arc;

use authstream_api::config::Config;
use authstream_api::directory::DisabledDirectory;
use authstream_api::error::AppError;
use authstream_api::rebuild::UserRebuildHandler;
use authstream_api::state::AppState;
use authstream_api::telemetry::Telemetry;
use authstream_api::token::JwtTokenProvider;
use authstream_core::clock::{Clock, SystemClock};
use authstream_core::container::view_container;
use authstream_event_store::MIGRATOR;
use authstream_event_store::pg_checkpoint_repository::PgCheckpointRepository;
use authstream_event_store::pg_container_repository::PgContainerRepository;
use authstream_event_store::pg_event_repository::PgEventRepository;
use authstream_rebuild::queue::rebuild_queue;
use authstream_rebuild::worker::RebuildWorker;
use authstream_user::domain::aggregates::User;
use authstream_user::domain::events::USER_STREAM_TYPE;
use authstream_user::domain::records::UserViewRecord;
use sqlx::postgres::PgPoolOptions;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;
    let telemetry = Telemetry::init(config.otlp_endpoint.as_deref())?;

    tracing::info!("Starting Authstream API server");

    // Create database connection pool.
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;
    MIGRATOR.run(&pool).await?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let event_repository = Arc::new(PgEventRepository::new(pool.clone()));
    let user_checkpoints = Arc::new(PgCheckpointRepository::<User>::new(
        pool.clone(),
        event_repository.clone(),
    ));
    let user_views = Arc::new(PgContainerRepository::<UserViewRecord>::new(
        pool,
        view_container(USER_STREAM_TYPE),
    ));

    let (queue, receiver) = rebuild_queue();
    let worker = RebuildWorker::new(
        UserRebuildHandler::new(user_checkpoints.clone(), user_views.clone()),
        receiver,
    )
    .spawn();

    let app_state = AppState::new(
        clock.clone(),
        event_repository,
        user_checkpoints,
        user_views,
        Arc::new(queue),
        Arc::new(JwtTokenProvider::new(&config.jwt, clock)),
        Arc::new(DisabledDirectory),
    )
    .with_retry_limit(config.append_retry_limit);
    let app = authstream_api::app(app_state);

    // Start server.
    let addr = config.bind_addr()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Stopping rebuild worker");
    if let Err(e) = worker.shutdown().await {
        tracing::error!(error = %e, "rebuild worker panicked");
    }
    telemetry.shutdown();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
