use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vigil::api::{create_router, AppState};
use vigil::config::Config;
use vigil::db::{Database, DatabaseBackend, LibSqlBackend};
use vigil::embeddings::EmbeddingProvider;
use vigil::llm::LlmProvider;
use vigil::services::{PageSweeper, SearchScheduler};

#[derive(Parser)]
#[command(name = "vigil")]
#[command(about = "Self-hostable recurring search and deep-content alerting engine")]
struct Args {
    /// Run one scheduler tick and one page sweep, then exit.
    #[arg(long)]
    run_once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vigil=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    if config.server.api_keys.is_empty() {
        tracing::warn!(
            "VIGIL_API_KEYS is not set — all protected routes are locked. Set VIGIL_API_KEYS to enable access."
        );
    }

    tracing::info!("Initializing database...");
    let raw_db = Database::new(&config.database).await?;
    let db: Arc<dyn DatabaseBackend> = Arc::new(LibSqlBackend::new(raw_db));

    tracing::info!("Loading embedding model: {}...", config.embeddings.model);
    let embedder = Arc::new(EmbeddingProvider::new(&config.embeddings)?);

    if let Some(llm_config) = &config.llm {
        tracing::info!("Initializing LLM provider: {}...", llm_config.model);
    }
    let llm = LlmProvider::new(config.llm.as_ref());
    if !llm.is_available() {
        tracing::warn!("LLM unavailable - delta analysis will mark executions as failed");
    }

    let state = AppState::new(config.clone(), db, embedder, llm)?;

    let scheduler = SearchScheduler::new(
        state.db.clone(),
        state.search.clone(),
        state.config.learning.schedule_tick_secs,
    );
    let sweeper = PageSweeper::new(state.db.clone(), state.config.processing.sweep_interval_secs);

    if args.run_once {
        let triggered = scheduler.run_once().await?;
        let swept = sweeper.run_once().await?;
        tracing::info!(triggered, swept, "Single maintenance pass complete");
        return Ok(());
    }

    let cancel_token = CancellationToken::new();

    tracing::info!(
        "Starting search scheduler... (tick={}s)",
        scheduler.interval_secs()
    );
    let token = cancel_token.child_token();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::info!("Search scheduler shutting down...");
                    break;
                }
                _ = tokio::time::sleep(tokio::time::Duration::from_secs(scheduler.interval_secs())) => {
                    if let Err(e) = scheduler.run_once().await {
                        tracing::error!("Search scheduler error: {}", e);
                    }
                }
            }
        }
    });

    tracing::info!(
        "Starting page sweeper... (interval={}s)",
        sweeper.interval_secs()
    );
    let token = cancel_token.child_token();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::info!("Page sweeper shutting down...");
                    break;
                }
                _ = tokio::time::sleep(tokio::time::Duration::from_secs(sweeper.interval_secs())) => {
                    if let Err(e) = sweeper.run_once().await {
                        tracing::error!("Page sweeper error: {}", e);
                    }
                }
            }
        }
    });

    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Vigil starting on http://{}", addr);
    tracing::info!("  Health check: http://{}/api/v1/health", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel_token))
        .await?;

    Ok(())
}

async fn shutdown_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, cancelling background tasks...");
    cancel_token.cancel();
}
