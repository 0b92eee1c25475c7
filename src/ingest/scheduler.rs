// src/ingest/scheduler.rs
use super::IngestPipeline;
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Clone, Copy, Debug)]
pub struct SchedulerCfg {
    pub revectorize_every: Duration,
    pub cleanup_every: Duration,
}

impl SchedulerCfg {
    pub fn from_hours(revectorize_hours: u64, cleanup_hours: u64) -> Self {
        Self {
            revectorize_every: Duration::from_secs(revectorize_hours.max(1) * 3600),
            cleanup_every: Duration::from_secs(cleanup_hours.max(1) * 3600),
        }
    }
}

/// Spawn the periodic maintenance loop: catalogue re-vectorization and
/// expired-event cleanup, each on its own interval. Both fire once at start.
pub fn spawn_scheduler(pipeline: Arc<IngestPipeline>, cfg: SchedulerCfg) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut revectorize = tokio::time::interval(cfg.revectorize_every);
        let mut cleanup = tokio::time::interval(cfg.cleanup_every);
        loop {
            tokio::select! {
                _ = cleanup.tick() => {
                    let now = chrono::Local::now().naive_local();
                    counter!("ingest_runs_total", "job" => "cleanup").increment(1);
                    if let Err(e) = pipeline.purge_expired(now).await {
                        tracing::warn!(target: "ingest", error = ?e, "scheduled cleanup failed");
                    }
                }
                _ = revectorize.tick() => {
                    counter!("ingest_runs_total", "job" => "revectorize").increment(1);
                    match pipeline.revectorize_all().await {
                        Ok(n) => tracing::info!(target: "ingest", vectorized = n, "scheduled re-vectorization"),
                        Err(e) => tracing::warn!(target: "ingest", error = ?e, "scheduled re-vectorization failed"),
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_hours_never_spin() {
        let cfg = SchedulerCfg::from_hours(0, 24);
        assert_eq!(cfg.revectorize_every, Duration::from_secs(3600));
        assert_eq!(cfg.cleanup_every, Duration::from_secs(24 * 3600));
    }
}
