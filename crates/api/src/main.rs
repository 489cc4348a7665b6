//! API server entry point.

use std::sync::Arc;

use api::config::Config;
use api::error::StartupError;
use api::{Application, Stores};
use broker::{InMemoryBroker, MessageBroker};
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json")) {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn connect_stores(config: &Config) -> Result<Stores, StartupError> {
    let Some(url) = config.database_url.as_deref() else {
        tracing::info!("DATABASE_URL not set, using in-memory stores");
        return Ok(Stores::in_memory());
    };

    let pool = PgPoolOptions::new().max_connections(10).connect(url).await?;
    event_store::run_migrations(&pool).await?;
    tracing::info!("connected to PostgreSQL, migrations applied");
    Ok(Stores::postgres(pool))
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    // 1. Load configuration and initialize tracing
    let config = Config::from_env();
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;

    // 3. Stores, broker and the saga consumers
    let stores = connect_stores(&config).await?;
    let broker = Arc::new(InMemoryBroker::new());
    let application = Application::start(
        &config,
        broker.clone() as Arc<dyn MessageBroker>,
        stores,
    )
    .await?;

    // 4. Build the application
    let app = api::create_app(application.state(), metrics_handle);

    // 5. Start server
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // 6. Stop the consumers
    broker.close().await;
    application.shutdown();

    tracing::info!("server shut down gracefully");
    Ok(())
}
