//! Event recommender: binary entrypoint.
//! Boots the Axum HTTP server, the maintenance scheduler and `/metrics`.

use std::sync::Arc;

use anyhow::Context;
use event_recommender::categorize::classifier::build_scorer;
use event_recommender::config::{AppConfig, Settings};
use event_recommender::ingest::scheduler::{spawn_scheduler, SchedulerCfg};
use event_recommender::logging::init_tracing;
use event_recommender::metrics::Metrics;
use event_recommender::store::{DynStore, JsonFileStore, MemoryStore};
use event_recommender::{router, AppState};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional; real env wins
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::from_env();
    let settings = Settings::load_or_builtin();

    let store: DynStore = match &cfg.store_path {
        Some(path) => Arc::new(JsonFileStore::open(path).await?),
        None => Arc::new(MemoryStore::new()),
    };
    let category_model = build_scorer("category", cfg.category_model_path.as_deref());
    let genre_model = build_scorer("genre", cfg.genre_model_path.as_deref());

    let metrics = Metrics::init(settings.fusion.threshold)?;
    let state = AppState::build(&settings, store, category_model, genre_model)?;

    let _scheduler = spawn_scheduler(
        state.pipeline.clone(),
        SchedulerCfg::from_hours(cfg.schedule_interval_hours, cfg.cleanup_interval_hours),
    );

    let app = router(state).merge(metrics.router());
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr)
        .await
        .with_context(|| format!("binding {}", cfg.bind_addr))?;
    info!(
        addr = %cfg.bind_addr,
        store = ?cfg.store_path,
        threshold = settings.fusion.threshold,
        "event recommender listening"
    );
    axum::serve(listener, app).await?;
    Ok(())
}
