// src/profile/service.rs
//! Store-backed profile maintenance.
//!
//! Profile writes for one user id go through a per-user async mutex, so two
//! updates inside this process never interleave their read-modify-write.
//! A user's mutex is dropped from the map once nobody holds or waits on it.
//! Writers in other processes sharing the same store are still
//! last-write-wins.

use super::builder::ProfileBuilder;
use crate::logging::anon_hash;
use crate::model::{ComponentVectorSet, LikedEvent};
use crate::store::DynStore;
use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info};

type UserLocks = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "profile_updates_total",
            "Persisted profile updates, labelled by policy."
        );
    });
}

pub struct ProfileService {
    store: DynStore,
    builder: Arc<ProfileBuilder>,
    locks: UserLocks,
}

/// Holds one user's write lock; prunes the map entry on release.
struct UserGuard<'a> {
    locks: &'a UserLocks,
    user_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for UserGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut map = self.locks.lock().unwrap_or_else(|p| p.into_inner());
        // only the map's own handle left: no holder, no waiter
        if map
            .get(&self.user_id)
            .is_some_and(|l| Arc::strong_count(l) == 1)
        {
            map.remove(&self.user_id);
        }
    }
}

impl ProfileService {
    pub fn new(store: DynStore, builder: Arc<ProfileBuilder>) -> Self {
        Self {
            store,
            builder,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn builder(&self) -> &ProfileBuilder {
        &self.builder
    }

    async fn lock_user(&self, user_id: &str) -> UserGuard<'_> {
        let lock = {
            let mut map = self.locks.lock().unwrap_or_else(|p| p.into_inner());
            map.entry(user_id.to_string()).or_default().clone()
        };
        let guard = lock.lock_owned().await;
        UserGuard {
            locks: &self.locks,
            user_id: user_id.to_string(),
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.locks.lock().map(|m| m.len()).unwrap_or_default()
    }

    /// Build and persist the onboarding profile. `None` without onboarding.
    pub async fn build_initial(&self, user_id: &str) -> anyhow::Result<Option<ComponentVectorSet>> {
        let _guard = self.lock_user(user_id).await;
        self.build_initial_locked(user_id).await
    }

    async fn build_initial_locked(&self, user_id: &str) -> anyhow::Result<Option<ComponentVectorSet>> {
        let Some(answers) = self.store.get_onboarding(user_id).await? else {
            debug!(target: "profile", user = %anon_hash(user_id), "no onboarding record");
            return Ok(None);
        };
        let vectors = self.builder.initial_vectors(&answers);
        self.store
            .set_user_profile_vectors(user_id, vectors.clone())
            .await?;
        record_update("initial");
        info!(target: "profile", user = %anon_hash(user_id), "initial profile built");
        Ok(Some(vectors))
    }

    /// Stored profile vectors, building the onboarding profile when the user
    /// has none yet.
    pub async fn resolve(&self, user_id: &str) -> anyhow::Result<Option<ComponentVectorSet>> {
        if let Some(user) = self.store.get_user(user_id).await? {
            if !user.component_profile_vectors.is_empty() {
                return Ok(Some(user.component_profile_vectors));
            }
        }
        self.build_initial(user_id).await
    }

    async fn stored_or_initial_locked(&self, user_id: &str) -> anyhow::Result<ComponentVectorSet> {
        if let Some(user) = self.store.get_user(user_id).await? {
            if !user.component_profile_vectors.is_empty() {
                return Ok(user.component_profile_vectors);
            }
        }
        Ok(self
            .build_initial_locked(user_id)
            .await?
            .unwrap_or_default())
    }

    /// Batch re-aggregation over every currently liked event. Returns `None`
    /// (profile untouched) when the user has no resolvable likes.
    pub async fn reaggregate(&self, user_id: &str) -> anyhow::Result<Option<ComponentVectorSet>> {
        let _guard = self.lock_user(user_id).await;

        let existing = self.stored_or_initial_locked(user_id).await?;

        let mut liked = Vec::new();
        for like in self.store.list_liked(user_id).await? {
            if let Some(e) = self.store.get_event(&like.event_id).await? {
                liked.push(e);
            }
        }
        if liked.is_empty() {
            return Ok(None);
        }

        let fresh = self.builder.liked_vectors(&liked);
        let blended = self.builder.blend(&existing, fresh);
        self.store
            .set_user_profile_vectors(user_id, blended.clone())
            .await?;
        record_update("reaggregate");
        info!(
            target: "profile",
            user = %anon_hash(user_id),
            liked = liked.len(),
            "profile re-aggregated"
        );
        Ok(Some(blended))
    }

    /// Record a like and fold the event into the profile by exponential
    /// smoothing. `None` when the event does not exist (nothing is recorded).
    pub async fn record_like(
        &self,
        user_id: &str,
        event_id: &str,
        liked_at: DateTime<Utc>,
    ) -> anyhow::Result<Option<ComponentVectorSet>> {
        let _guard = self.lock_user(user_id).await;

        let Some(event) = self.store.get_event(event_id).await? else {
            return Ok(None);
        };
        self.store
            .add_like(LikedEvent {
                user_id: user_id.to_string(),
                event_id: event_id.to_string(),
                liked_at,
            })
            .await?;

        let existing = self.stored_or_initial_locked(user_id).await?;
        let smoothed = self.builder.smooth_with_like(&existing, &event);
        self.store
            .set_user_profile_vectors(user_id, smoothed.clone())
            .await?;
        record_update("smoothing");
        info!(target: "profile", user = %anon_hash(user_id), "profile smoothed with like");
        Ok(Some(smoothed))
    }
}

fn record_update(policy: &'static str) {
    ensure_metrics_described();
    counter!("profile_updates_total", "policy" => policy).increment(1);
}
