// src/store/mod.rs
//! Document store boundary.
//!
//! Each method touches one document (an event, a user profile, an onboarding
//! record or a user's like list) and is atomic per document. There are no
//! cross-document transactions: two concurrent profile writes for the same
//! user are last-write-wins at this layer.

pub mod json_file;
pub mod memory;

use crate::model::{ComponentVectorSet, Event, LikedEvent, OnboardingAnswers, UserProfile};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Only events that carry component vectors.
    pub with_vectors: bool,
    /// Skip this event id.
    pub exclude_id: Option<String>,
}

impl EventFilter {
    pub fn with_vectors() -> Self {
        Self {
            with_vectors: true,
            exclude_id: None,
        }
    }

    pub fn excluding(mut self, id: impl Into<String>) -> Self {
        self.exclude_id = Some(id.into());
        self
    }

    fn accepts(&self, e: &Event) -> bool {
        if self.with_vectors && !e.has_vectors() {
            return false;
        }
        self.exclude_id.as_deref() != Some(e.id.as_str())
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_user(&self, user_id: &str) -> anyhow::Result<Option<UserProfile>>;
    /// Creates the user document when it does not exist yet.
    async fn set_user_profile_vectors(&self, user_id: &str, vectors: ComponentVectorSet) -> anyhow::Result<()>;

    async fn get_onboarding(&self, user_id: &str) -> anyhow::Result<Option<OnboardingAnswers>>;
    async fn put_onboarding(&self, user_id: &str, answers: OnboardingAnswers) -> anyhow::Result<()>;

    /// Likes of `user_id`, oldest first.
    async fn list_liked(&self, user_id: &str) -> anyhow::Result<Vec<LikedEvent>>;
    /// Re-liking an event refreshes its timestamp.
    async fn add_like(&self, like: LikedEvent) -> anyhow::Result<()>;

    async fn get_event(&self, event_id: &str) -> anyhow::Result<Option<Event>>;
    /// Events in id order.
    async fn list_events(&self, filter: &EventFilter) -> anyhow::Result<Vec<Event>>;
    /// Insert or replace by id.
    async fn put_events(&self, events: Vec<Event>) -> anyhow::Result<()>;
    /// Applies every update in one write. Ids with no stored event are
    /// skipped; returns how many events were updated.
    async fn set_events_component_vectors(&self, updates: Vec<(String, ComponentVectorSet)>) -> anyhow::Result<usize>;
    /// Removes the event and every like that references it.
    async fn delete_event(&self, event_id: &str) -> anyhow::Result<bool>;
}

pub type DynStore = Arc<dyn DocumentStore>;

/// The whole document set; shared by the in-memory and file backends.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreData {
    #[serde(default)]
    pub events: BTreeMap<String, Event>,
    #[serde(default)]
    pub users: BTreeMap<String, UserProfile>,
    #[serde(default)]
    pub onboarding: BTreeMap<String, OnboardingAnswers>,
    #[serde(default)]
    pub likes: BTreeMap<String, Vec<LikedEvent>>,
}

impl StoreData {
    fn set_user_profile_vectors(&mut self, user_id: &str, vectors: ComponentVectorSet) {
        let user = self
            .users
            .entry(user_id.to_string())
            .or_insert_with(|| UserProfile {
                user_id: user_id.to_string(),
                ..Default::default()
            });
        user.component_profile_vectors = vectors;
    }

    fn list_liked(&self, user_id: &str) -> Vec<LikedEvent> {
        let mut likes = self.likes.get(user_id).cloned().unwrap_or_default();
        likes.sort_by_key(|l| l.liked_at);
        likes
    }

    fn add_like(&mut self, like: LikedEvent) {
        let list = self.likes.entry(like.user_id.clone()).or_default();
        list.retain(|l| l.event_id != like.event_id);
        list.push(like);
    }

    fn list_events(&self, filter: &EventFilter) -> Vec<Event> {
        self.events
            .values()
            .filter(|e| filter.accepts(e))
            .cloned()
            .collect()
    }

    fn put_events(&mut self, events: Vec<Event>) {
        for e in events {
            self.events.insert(e.id.clone(), e);
        }
    }

    fn set_events_component_vectors(&mut self, updates: Vec<(String, ComponentVectorSet)>) -> usize {
        let mut updated = 0;
        for (id, vectors) in updates {
            if let Some(e) = self.events.get_mut(&id) {
                e.component_vectors = Some(vectors);
                updated += 1;
            }
        }
        updated
    }

    fn delete_event(&mut self, event_id: &str) -> bool {
        let existed = self.events.remove(event_id).is_some();
        for list in self.likes.values_mut() {
            list.retain(|l| l.event_id != event_id);
        }
        existed
    }
}
