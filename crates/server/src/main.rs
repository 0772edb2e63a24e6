use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use fincat_classify::{AiBackend, ClassificationEngine, OpenAiBackend};
use fincat_core::ClassifierConfig;
use fincat_server::{app, AppState, SqliteStore};
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if std::env::var("FINCAT_LOG_FORMAT").is_ok_and(|f| f == "json") {
        tracing_subscriber::registry()
            .with(filter)
            .with(JsonStorageLayer)
            .with(BunyanFormattingLayer::new(
                "fincat-server".to_string(),
                std::io::stdout,
            ))
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config_path = std::env::var("FINCAT_CONFIG").ok().map(PathBuf::from);
    let config = ClassifierConfig::load(config_path.as_deref())
        .context("invalid classifier configuration")?;

    let db_path = PathBuf::from(
        std::env::var("FINCAT_DATABASE").unwrap_or_else(|_| "fincat.db".to_string()),
    );
    let db = fincat_storage::create_db(&db_path)
        .await
        .with_context(|| format!("failed to open database at {}", db_path.display()))?;

    let ai = OpenAiBackend::from_config(&config.ai)
        .context("failed to build AI backend")?
        .map(|b| Arc::new(b) as Arc<dyn AiBackend>);
    if ai.is_none() {
        tracing::info!("no AI endpoint configured; AI fallback disabled");
    }

    let engine = ClassificationEngine::new(config, Arc::new(SqliteStore::new(db.clone())), ai);
    let router = app(AppState {
        engine: Arc::new(engine),
        db,
    });

    let bind = std::env::var("FINCAT_BIND").unwrap_or_else(|_| "127.0.0.1:8787".to_string());
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    tracing::info!(%bind, database = %db_path.display(), "fincat-server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;
    Ok(())
}
