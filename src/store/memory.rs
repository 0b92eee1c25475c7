// src/store/memory.rs
use super::{DocumentStore, EventFilter, StoreData};
use crate::model::{ComponentVectorSet, Event, LikedEvent, OnboardingAnswers, UserProfile};
use async_trait::async_trait;
use tokio::sync::RwLock;

/// Process-local store. Iteration is ordered by id.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<StoreData>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get_user(&self, user_id: &str) -> anyhow::Result<Option<UserProfile>> {
        Ok(self.data.read().await.users.get(user_id).cloned())
    }

    async fn set_user_profile_vectors(&self, user_id: &str, vectors: ComponentVectorSet) -> anyhow::Result<()> {
        self.data.write().await.set_user_profile_vectors(user_id, vectors);
        Ok(())
    }

    async fn get_onboarding(&self, user_id: &str) -> anyhow::Result<Option<OnboardingAnswers>> {
        Ok(self.data.read().await.onboarding.get(user_id).cloned())
    }

    async fn put_onboarding(&self, user_id: &str, answers: OnboardingAnswers) -> anyhow::Result<()> {
        self.data
            .write()
            .await
            .onboarding
            .insert(user_id.to_string(), answers);
        Ok(())
    }

    async fn list_liked(&self, user_id: &str) -> anyhow::Result<Vec<LikedEvent>> {
        Ok(self.data.read().await.list_liked(user_id))
    }

    async fn add_like(&self, like: LikedEvent) -> anyhow::Result<()> {
        self.data.write().await.add_like(like);
        Ok(())
    }

    async fn get_event(&self, event_id: &str) -> anyhow::Result<Option<Event>> {
        Ok(self.data.read().await.events.get(event_id).cloned())
    }

    async fn list_events(&self, filter: &EventFilter) -> anyhow::Result<Vec<Event>> {
        Ok(self.data.read().await.list_events(filter))
    }

    async fn put_events(&self, events: Vec<Event>) -> anyhow::Result<()> {
        self.data.write().await.put_events(events);
        Ok(())
    }

    async fn set_events_component_vectors(&self, updates: Vec<(String, ComponentVectorSet)>) -> anyhow::Result<usize> {
        Ok(self.data.write().await.set_events_component_vectors(updates))
    }

    async fn delete_event(&self, event_id: &str) -> anyhow::Result<bool> {
        Ok(self.data.write().await.delete_event(event_id))
    }
}
