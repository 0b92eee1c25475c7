// src/ingest/mod.rs
pub mod raw;
pub mod scheduler;

use crate::categorize::Categorizer;
use crate::model::ComponentVectorSet;
use crate::store::{DynStore, EventFilter};
use crate::vectorize::FieldVectorizer;
use chrono::NaiveDateTime;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use raw::{transform, RawEvent};
use serde::Serialize;
use std::sync::Arc;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_events_total", "Raw events received.");
        describe_counter!("ingest_rejected_total", "Raw events failing validation.");
        describe_counter!("ingest_stored_total", "Events categorized and stored.");
        describe_counter!("ingest_expired_total", "Expired events deleted.");
        describe_gauge!(
            "ingest_vectorized_events",
            "Events carrying vectors after the last re-vectorization."
        );
        describe_gauge!(
            "ingest_pipeline_last_run_ts",
            "Unix ts when the ingest pipeline last ran."
        );
    });
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestReport {
    pub received: usize,
    pub rejected: usize,
    pub stored: usize,
    pub vectorized: usize,
}

pub struct IngestPipeline {
    store: DynStore,
    categorizer: Arc<Categorizer>,
    vectorizer: FieldVectorizer,
}

impl IngestPipeline {
    pub fn new(store: DynStore, categorizer: Arc<Categorizer>, vectorizer: FieldVectorizer) -> Self {
        Self {
            store,
            categorizer,
            vectorizer,
        }
    }

    /// Validate, categorize and store a raw batch, then re-vectorize the whole
    /// stored catalogue so every event shares one text vocabulary.
    pub async fn run(&self, batch: Vec<RawEvent>) -> anyhow::Result<IngestReport> {
        ensure_metrics_described();
        let mut report = IngestReport {
            received: batch.len(),
            ..Default::default()
        };
        counter!("ingest_events_total").increment(batch.len() as u64);

        let mut events = Vec::with_capacity(batch.len());
        for raw in &batch {
            match transform(raw) {
                Ok(e) => events.push(e),
                Err(e) => {
                    report.rejected += 1;
                    tracing::warn!(target: "ingest", error = %e, "raw event rejected");
                }
            }
        }
        counter!("ingest_rejected_total").increment(report.rejected as u64);

        self.categorizer.assign_categories(&mut events);
        report.stored = events.len();
        self.store.put_events(events).await?;
        counter!("ingest_stored_total").increment(report.stored as u64);

        report.vectorized = self.revectorize_all().await?;

        let now = chrono::Utc::now().timestamp().max(0);
        gauge!("ingest_pipeline_last_run_ts").set(now as f64);
        tracing::info!(
            target: "ingest",
            received = report.received,
            rejected = report.rejected,
            stored = report.stored,
            vectorized = report.vectorized,
            "ingest run finished"
        );
        Ok(report)
    }

    /// Fit text vocabularies on every stored event and write all vectors back
    /// in a single store write.
    pub async fn revectorize_all(&self) -> anyhow::Result<usize> {
        ensure_metrics_described();
        let mut events = self.store.list_events(&EventFilter::default()).await?;
        if events.is_empty() {
            return Ok(0);
        }
        self.vectorizer.vectorize_batch(&mut events);

        let updates: Vec<(String, ComponentVectorSet)> = events
            .into_iter()
            .filter_map(|e| e.component_vectors.map(|v| (e.id, v)))
            .collect();
        // events deleted in the meantime are skipped by the store
        let written = self.store.set_events_component_vectors(updates).await?;
        gauge!("ingest_vectorized_events").set(written as f64);
        Ok(written)
    }

    /// Delete events whose end time (or start time without an end) is before
    /// `now`, together with every like pointing at them.
    pub async fn purge_expired(&self, now: NaiveDateTime) -> anyhow::Result<usize> {
        ensure_metrics_described();
        let events = self.store.list_events(&EventFilter::default()).await?;
        let mut deleted = 0usize;
        for e in events.iter().filter(|e| e.is_expired(now)) {
            if self.store.delete_event(&e.id).await? {
                deleted += 1;
            }
        }
        counter!("ingest_expired_total").increment(deleted as u64);
        tracing::info!(target: "ingest", deleted, "expired events purged");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::model::{Event, LikedEvent, OnboardingAnswers, UserProfile};
    use crate::store::{DocumentStore, MemoryStore};
    use crate::vectorize::{FIELD_MAIN_CATEGORIES, FIELD_NAME};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Memory store that counts vector writes.
    #[derive(Default)]
    struct CountingStore {
        inner: MemoryStore,
        vector_writes: AtomicUsize,
    }

    #[async_trait]
    impl DocumentStore for CountingStore {
        async fn get_user(&self, user_id: &str) -> anyhow::Result<Option<UserProfile>> {
            self.inner.get_user(user_id).await
        }
        async fn set_user_profile_vectors(&self, user_id: &str, vectors: ComponentVectorSet) -> anyhow::Result<()> {
            self.inner.set_user_profile_vectors(user_id, vectors).await
        }
        async fn get_onboarding(&self, user_id: &str) -> anyhow::Result<Option<OnboardingAnswers>> {
            self.inner.get_onboarding(user_id).await
        }
        async fn put_onboarding(&self, user_id: &str, answers: OnboardingAnswers) -> anyhow::Result<()> {
            self.inner.put_onboarding(user_id, answers).await
        }
        async fn list_liked(&self, user_id: &str) -> anyhow::Result<Vec<LikedEvent>> {
            self.inner.list_liked(user_id).await
        }
        async fn add_like(&self, like: LikedEvent) -> anyhow::Result<()> {
            self.inner.add_like(like).await
        }
        async fn get_event(&self, event_id: &str) -> anyhow::Result<Option<Event>> {
            self.inner.get_event(event_id).await
        }
        async fn list_events(&self, filter: &EventFilter) -> anyhow::Result<Vec<Event>> {
            self.inner.list_events(filter).await
        }
        async fn put_events(&self, events: Vec<Event>) -> anyhow::Result<()> {
            self.inner.put_events(events).await
        }
        async fn set_events_component_vectors(&self, updates: Vec<(String, ComponentVectorSet)>) -> anyhow::Result<usize> {
            self.vector_writes.fetch_add(1, Ordering::SeqCst);
            self.inner.set_events_component_vectors(updates).await
        }
        async fn delete_event(&self, event_id: &str) -> anyhow::Result<bool> {
            self.inner.delete_event(event_id).await
        }
    }

    fn pipeline() -> (Arc<MemoryStore>, IngestPipeline) {
        let s = Settings::builtin();
        let store = Arc::new(MemoryStore::new());
        let categorizer = Arc::new(Categorizer::keyword_only(&s).unwrap());
        let p = IngestPipeline::new(store.clone(), categorizer, FieldVectorizer::new(&s.catalog));
        (store, p)
    }

    fn raw(id: &str, name: &str, start: &str) -> RawEvent {
        RawEvent {
            event_id: Some(id.into()),
            name: Some(name.into()),
            start_time: Some(start.into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn run_categorizes_stores_and_vectorizes_jointly() {
        let (store, p) = pipeline();
        let report = p
            .run(vec![
                raw("a", "Rock concert", "2030-01-01 19:00:00"),
                RawEvent::default(),
            ])
            .await
            .unwrap();
        assert_eq!(report.received, 2);
        assert_eq!(report.rejected, 1);
        assert_eq!(report.stored, 1);

        p.run(vec![raw("b", "Football match", "2030-01-02 12:00:00")])
            .await
            .unwrap();

        let a = store.get_event("a").await.unwrap().unwrap();
        let b = store.get_event("b").await.unwrap().unwrap();
        assert_eq!(a.main_categories, vec!["music"]);
        assert_eq!(a.genres, vec!["rock"]);
        let (va, vb) = (a.component_vectors.unwrap(), b.component_vectors.unwrap());
        assert_eq!(va[FIELD_NAME].len(), vb[FIELD_NAME].len());
        assert_eq!(va[FIELD_MAIN_CATEGORIES].len(), vb[FIELD_MAIN_CATEGORIES].len());
    }

    #[tokio::test]
    async fn purge_removes_expired_events_and_their_likes() {
        let (store, p) = pipeline();
        p.run(vec![
            raw("old", "Old show", "2020-01-01 19:00:00"),
            raw("new", "New show", "2030-01-01 19:00:00"),
        ])
        .await
        .unwrap();
        store
            .add_like(LikedEvent {
                user_id: "u".into(),
                event_id: "old".into(),
                liked_at: chrono::Utc::now(),
            })
            .await
            .unwrap();

        let now = raw::parse_time("2025-01-01 00:00:00").unwrap();
        assert_eq!(p.purge_expired(now).await.unwrap(), 1);
        assert!(store.get_event("old").await.unwrap().is_none());
        assert!(store.get_event("new").await.unwrap().is_some());
        assert!(store.list_liked("u").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn revectorization_writes_the_catalogue_once() {
        let s = Settings::builtin();
        let store = Arc::new(CountingStore::default());
        let categorizer = Arc::new(Categorizer::keyword_only(&s).unwrap());
        let p = IngestPipeline::new(store.clone(), categorizer, FieldVectorizer::new(&s.catalog));

        let batch: Vec<RawEvent> = (0..25)
            .map(|i| raw(&format!("e{i:02}"), "Rock concert", "2030-01-01 19:00:00"))
            .collect();
        let report = p.run(batch).await.unwrap();
        assert_eq!(report.vectorized, 25);
        assert_eq!(store.vector_writes.load(Ordering::SeqCst), 1);

        assert_eq!(p.revectorize_all().await.unwrap(), 25);
        assert_eq!(store.vector_writes.load(Ordering::SeqCst), 2);
        let stored = store.list_events(&EventFilter::with_vectors()).await.unwrap();
        assert_eq!(stored.len(), 25);
    }
}
