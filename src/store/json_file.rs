// src/store/json_file.rs
//! Single-document JSON persistence. Every write rewrites the file via a
//! temp file + rename while holding the write lock. A failed write leaves
//! the in-memory state untouched.

use super::{DocumentStore, EventFilter, StoreData};
use crate::model::{ComponentVectorSet, Event, LikedEvent, OnboardingAnswers, UserProfile};
use anyhow::Context;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::info;

#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    data: RwLock<StoreData>,
}

impl JsonFileStore {
    /// Open `path`, starting empty when the file does not exist yet.
    pub async fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let data = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => serde_json::from_str::<StoreData>(&raw)
                .with_context(|| format!("parsing store at {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreData::default(),
            Err(e) => {
                return Err(e).with_context(|| format!("reading store at {}", path.display()));
            }
        };
        info!(
            target: "store",
            path = %path.display(),
            events = data.events.len(),
            users = data.users.len(),
            "json store opened"
        );
        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn mutate<R: Send>(&self, f: impl FnOnce(&mut StoreData) -> R + Send) -> anyhow::Result<R> {
        let mut guard = self.data.write().await;
        let mut next = guard.clone();
        let out = f(&mut next);
        persist(&self.path, &next).await?;
        *guard = next;
        Ok(out)
    }
}

async fn persist(path: &Path, data: &StoreData) -> anyhow::Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("creating {}", dir.display()))?;
    }
    let json = serde_json::to_vec(data).context("serializing store")?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json)
        .await
        .with_context(|| format!("writing {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}

#[async_trait]
impl DocumentStore for JsonFileStore {
    async fn get_user(&self, user_id: &str) -> anyhow::Result<Option<UserProfile>> {
        Ok(self.data.read().await.users.get(user_id).cloned())
    }

    async fn set_user_profile_vectors(&self, user_id: &str, vectors: ComponentVectorSet) -> anyhow::Result<()> {
        self.mutate(|d| d.set_user_profile_vectors(user_id, vectors)).await
    }

    async fn get_onboarding(&self, user_id: &str) -> anyhow::Result<Option<OnboardingAnswers>> {
        Ok(self.data.read().await.onboarding.get(user_id).cloned())
    }

    async fn put_onboarding(&self, user_id: &str, answers: OnboardingAnswers) -> anyhow::Result<()> {
        self.mutate(|d| {
            d.onboarding.insert(user_id.to_string(), answers);
        })
        .await
    }

    async fn list_liked(&self, user_id: &str) -> anyhow::Result<Vec<LikedEvent>> {
        Ok(self.data.read().await.list_liked(user_id))
    }

    async fn add_like(&self, like: LikedEvent) -> anyhow::Result<()> {
        self.mutate(|d| d.add_like(like)).await
    }

    async fn get_event(&self, event_id: &str) -> anyhow::Result<Option<Event>> {
        Ok(self.data.read().await.events.get(event_id).cloned())
    }

    async fn list_events(&self, filter: &EventFilter) -> anyhow::Result<Vec<Event>> {
        Ok(self.data.read().await.list_events(filter))
    }

    async fn put_events(&self, events: Vec<Event>) -> anyhow::Result<()> {
        self.mutate(|d| d.put_events(events)).await
    }

    async fn set_events_component_vectors(&self, updates: Vec<(String, ComponentVectorSet)>) -> anyhow::Result<usize> {
        self.mutate(|d| d.set_events_component_vectors(updates)).await
    }

    async fn delete_event(&self, event_id: &str) -> anyhow::Result<bool> {
        self.mutate(|d| d.delete_event(event_id)).await
    }
}
