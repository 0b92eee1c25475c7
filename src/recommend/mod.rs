// src/recommend/mod.rs
//! Personalized ranking and "similar to last liked".
//!
//! Scoring is a pure function of the aggregated profile, the user's location
//! and time preferences, and the candidates' stored component vectors.

pub mod geo;
pub mod schedule;

use crate::config::{Catalog, RankingSettings, Settings};
use crate::logging::anon_hash;
use crate::model::{ComponentVectorSet, Event, OnboardingAnswers};
use crate::profile::ProfileService;
use crate::similarity::score_components;
use crate::store::{DynStore, EventFilter};
use crate::vectorize::FieldVectorizer;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use schedule::TimeBucket;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("recommend_requests_total", "Ranking requests, labelled by kind.");
        describe_counter!(
            "recommend_empty_total",
            "Requests answered with an empty list (no profile or no reference like)."
        );
        describe_histogram!("recommend_rank_ms", "Candidate scoring + sort time in milliseconds.");
    });
}

/// Location and schedule preferences taken from onboarding.
#[derive(Debug, Clone, Default)]
pub struct UserContext {
    pub coordinates: Option<(f64, f64)>,
    pub radius_km: f64,
    pub city: Option<String>,
    pub times: Vec<TimeBucket>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredEvent {
    pub event_id: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarEvents {
    pub event_ids: Vec<String>,
    pub reference_event_id: String,
}

/// Stateless scorer; everything it needs is passed in.
#[derive(Debug, Clone)]
pub struct Ranker {
    settings: RankingSettings,
    catalog: Catalog,
    vectorizer: FieldVectorizer,
}

impl Ranker {
    pub fn new(settings: &Settings) -> Self {
        Self {
            settings: settings.ranking.clone(),
            catalog: settings.catalog.clone(),
            vectorizer: FieldVectorizer::new(&settings.catalog),
        }
    }

    pub fn settings(&self) -> &RankingSettings {
        &self.settings
    }

    pub fn context(&self, answers: Option<&OnboardingAnswers>) -> UserContext {
        let Some(a) = answers else {
            return UserContext {
                radius_km: self.settings.default_radius_km,
                ..Default::default()
            };
        };
        UserContext {
            coordinates: a.coordinates(),
            radius_km: a.max_distance_km(self.settings.default_radius_km),
            city: a
                .location()
                .and_then(|l| l.title.as_deref())
                .and_then(geo::city_from_address),
            times: a
                .preferred_times
                .iter()
                .filter_map(|t| TimeBucket::from_label(&self.catalog, t))
                .collect(),
        }
    }

    /// Vector set used for a liked event: its stored vectors, or closed
    /// vectors rebuilt from its labels when it was never vectorized.
    pub fn liked_vectors(&self, event: &Event) -> ComponentVectorSet {
        match &event.component_vectors {
            Some(v) if !v.is_empty() => v.clone(),
            _ => self
                .vectorizer
                .closed_vectors(&event.main_categories, &event.genres),
        }
    }

    /// `liked_weight * mean(liked) + profile_weight * profile` per field.
    /// Fields the profile lacks (or stores at another length) use the liked
    /// mean alone; with no likes the profile is returned unchanged.
    pub fn aggregate_profile(&self, profile: &ComponentVectorSet, liked: &[ComponentVectorSet]) -> ComponentVectorSet {
        if liked.is_empty() {
            return profile.clone();
        }

        let mut sums: BTreeMap<&str, (Vec<f64>, usize)> = BTreeMap::new();
        for set in liked {
            for (field, v) in set {
                let entry = sums
                    .entry(field.as_str())
                    .or_insert_with(|| (vec![0.0; v.len()], 0));
                // vectors of another width belong to another vocabulary
                if entry.0.len() != v.len() {
                    continue;
                }
                entry.0.iter_mut().zip(v).for_each(|(s, x)| *s += x);
                entry.1 += 1;
            }
        }

        let (w_liked, w_profile) = (self.settings.liked_weight, self.settings.profile_weight);
        let mut out = profile.clone();
        for (field, (sum, n)) in sums {
            if n == 0 {
                continue;
            }
            let mean: Vec<f64> = sum.iter().map(|s| s / n as f64).collect();
            let combined = match profile.get(field) {
                Some(p) if p.len() == mean.len() => mean
                    .iter()
                    .zip(p)
                    .map(|(m, p)| w_liked * m + w_profile * p)
                    .collect(),
                _ => mean,
            };
            out.insert(field.to_string(), combined);
        }
        out
    }

    pub fn distance_multiplier(&self, ctx: &UserContext, event: &Event) -> f64 {
        if let (Some(user), Some(ev)) = (ctx.coordinates, event.coordinates()) {
            let d = geo::haversine_km(user, ev);
            return geo::distance_multiplier(
                d,
                ctx.radius_km,
                self.settings.distance_decay_km,
                self.settings.distance_floor,
            );
        }
        let event_city = if event.city.trim().is_empty() {
            event
                .venue
                .as_ref()
                .and_then(|v| geo::city_from_address(&v.address))
        } else {
            Some(event.city.trim().to_string())
        };
        geo::city_multiplier(
            &self.catalog,
            ctx.city.as_deref(),
            event_city.as_deref(),
            self.settings.city_mismatch_penalty,
        )
    }

    pub fn time_multiplier(&self, ctx: &UserContext, event: &Event) -> f64 {
        schedule::time_multiplier(event.start_time, &ctx.times, self.settings.time_penalty)
    }

    pub fn score_event(&self, profile: &ComponentVectorSet, ctx: &UserContext, event: &Event) -> f64 {
        let Some(vectors) = event.component_vectors.as_ref() else {
            return 0.0;
        };
        let fields: Vec<&str> = profile.keys().map(String::as_str).collect();
        let base = score_components(profile, vectors, &fields);
        base * self.distance_multiplier(ctx, event) * self.time_multiplier(ctx, event)
    }

    /// Score every candidate with vectors, then sort descending (ties keep
    /// candidate order) and keep `top_n`.
    pub fn rank(&self, profile: &ComponentVectorSet, ctx: &UserContext, candidates: &[Event], top_n: usize) -> Vec<ScoredEvent> {
        let scored = candidates
            .iter()
            .filter(|e| e.has_vectors())
            .map(|e| ScoredEvent {
                event_id: e.id.clone(),
                score: self.score_event(profile, ctx, e),
            })
            .collect();
        top(scored, top_n)
    }

    /// Base similarity only, against a single reference vector set.
    pub fn rank_similar(&self, reference: &ComponentVectorSet, candidates: &[Event], top_n: usize) -> Vec<ScoredEvent> {
        let fields: Vec<&str> = reference.keys().map(String::as_str).collect();
        let scored = candidates
            .iter()
            .filter_map(|e| {
                let v = e.component_vectors.as_ref()?;
                Some(ScoredEvent {
                    event_id: e.id.clone(),
                    score: score_components(reference, v, &fields),
                })
            })
            .collect();
        top(scored, top_n)
    }
}

/// Stable descending sort + truncate.
pub fn top(mut scored: Vec<ScoredEvent>, top_n: usize) -> Vec<ScoredEvent> {
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(top_n);
    scored
}

/// Store-backed entry points.
pub struct Recommender {
    store: DynStore,
    profiles: Arc<ProfileService>,
    ranker: Ranker,
}

impl Recommender {
    pub fn new(store: DynStore, profiles: Arc<ProfileService>, ranker: Ranker) -> Self {
        Self {
            store,
            profiles,
            ranker,
        }
    }

    pub fn ranker(&self) -> &Ranker {
        &self.ranker
    }

    /// Top `top_n` event ids for `user_id`; empty when no profile can be resolved.
    pub async fn recommend(&self, user_id: &str, top_n: Option<usize>) -> anyhow::Result<Vec<String>> {
        ensure_metrics_described();
        counter!("recommend_requests_total", "kind" => "personal").increment(1);
        let top_n = top_n.unwrap_or(self.ranker.settings.default_top_n);

        let Some(profile) = self.profiles.resolve(user_id).await? else {
            counter!("recommend_empty_total").increment(1);
            debug!(target: "recommend", user = %anon_hash(user_id), "no profile and no onboarding");
            return Ok(Vec::new());
        };
        let answers = self.store.get_onboarding(user_id).await?;
        let ctx = self.ranker.context(answers.as_ref());

        let mut liked = Vec::new();
        for like in self.store.list_liked(user_id).await? {
            if let Some(e) = self.store.get_event(&like.event_id).await? {
                liked.push(self.ranker.liked_vectors(&e));
            }
        }
        let aggregated = self.ranker.aggregate_profile(&profile, &liked);

        let candidates = self.store.list_events(&EventFilter::with_vectors()).await?;
        let started = Instant::now();
        let ranked = self.ranker.rank(&aggregated, &ctx, &candidates, top_n);
        histogram!("recommend_rank_ms").record(started.elapsed().as_secs_f64() * 1000.0);

        info!(
            target: "recommend",
            user = %anon_hash(user_id),
            liked = liked.len(),
            candidates = candidates.len(),
            returned = ranked.len(),
            "recommendations ranked"
        );
        Ok(ranked.into_iter().map(|s| s.event_id).collect())
    }

    /// Events most similar to the user's latest like. `None` when there is
    /// no like, or the liked event is gone or was never vectorized.
    pub async fn similar_to_last_liked(&self, user_id: &str, top_n: Option<usize>) -> anyhow::Result<Option<SimilarEvents>> {
        ensure_metrics_described();
        counter!("recommend_requests_total", "kind" => "similar").increment(1);
        let top_n = top_n.unwrap_or(self.ranker.settings.default_similar_top_n);

        let likes = self.store.list_liked(user_id).await?;
        let Some(last) = likes.last() else {
            counter!("recommend_empty_total").increment(1);
            return Ok(None);
        };
        let reference = match self.store.get_event(&last.event_id).await? {
            Some(e) => e,
            None => {
                counter!("recommend_empty_total").increment(1);
                return Ok(None);
            }
        };
        let Some(vectors) = reference.component_vectors.filter(|v| !v.is_empty()) else {
            counter!("recommend_empty_total").increment(1);
            return Ok(None);
        };

        let candidates = self
            .store
            .list_events(&EventFilter::with_vectors().excluding(reference.id.clone()))
            .await?;
        let ranked = self.ranker.rank_similar(&vectors, &candidates, top_n);

        debug!(
            target: "recommend",
            user = %anon_hash(user_id),
            reference = %reference.id,
            returned = ranked.len(),
            "similar events ranked"
        );
        Ok(Some(SimilarEvents {
            event_ids: ranked.into_iter().map(|s| s.event_id).collect(),
            reference_event_id: reference.id,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{UserLocation, Venue};
    use chrono::NaiveDate;

    fn ranker() -> Ranker {
        Ranker::new(&Settings::builtin())
    }

    fn vecs(pairs: Vec<(&str, Vec<f64>)>) -> ComponentVectorSet {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn no_likes_leaves_profile_unchanged() {
        let r = ranker();
        let profile = vecs(vec![("main_categories", vec![0.0, 1.0, 0.0, 0.0])]);
        assert_eq!(r.aggregate_profile(&profile, &[]), profile);
    }

    #[test]
    fn likes_blend_with_profile_and_fill_missing_fields() {
        let r = ranker();
        let profile = vecs(vec![("main_categories", vec![1.0, 0.0])]);
        let liked = vec![
            vecs(vec![("main_categories", vec![0.0, 1.0]), ("name", vec![1.0, 0.0])]),
            vecs(vec![("main_categories", vec![0.0, 1.0]), ("name", vec![0.0, 1.0])]),
            // other vocabulary width: ignored for the mean
            vecs(vec![("name", vec![1.0, 1.0, 1.0])]),
        ];
        let agg = r.aggregate_profile(&profile, &liked);
        let mc = &agg["main_categories"];
        assert!((mc[0] - 0.3).abs() < 1e-12 && (mc[1] - 0.7).abs() < 1e-12);
        assert_eq!(agg["name"], vec![0.5, 0.5]);
    }

    #[test]
    fn city_mismatch_without_coordinates_halves_once() {
        let r = ranker();
        let answers = OnboardingAnswers {
            locations: vec![UserLocation {
                lat: None,
                lon: None,
                title: Some("Kyiv".into()),
            }],
            ..Default::default()
        };
        let ctx = r.context(Some(&answers));
        let event = Event {
            id: "e".into(),
            city: "Lviv".into(),
            venue: Some(Venue::default()),
            ..Default::default()
        };
        assert_eq!(r.distance_multiplier(&ctx, &event), 0.5);
    }

    #[test]
    fn coordinates_take_precedence_over_city() {
        let r = ranker();
        let answers = OnboardingAnswers {
            locations: vec![UserLocation {
                lat: Some(50.4501),
                lon: Some(30.5234),
                title: Some("Kyiv".into()),
            }],
            max_distance: vec!["30 км".into()],
            ..Default::default()
        };
        let ctx = r.context(Some(&answers));
        assert_eq!(ctx.radius_km, 30.0);
        let near = Event {
            id: "near".into(),
            city: "Lviv".into(),
            venue: Some(Venue {
                latitude: Some(50.46),
                longitude: Some(30.52),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(r.distance_multiplier(&ctx, &near), 1.0);
    }

    #[test]
    fn time_penalty_reorders_equal_scores() {
        let r = ranker();
        let ctx = UserContext {
            times: vec![TimeBucket::Evening],
            radius_km: 50.0,
            ..Default::default()
        };
        let evening = NaiveDate::from_ymd_opt(2025, 5, 13)
            .and_then(|d| d.and_hms_opt(19, 0, 0))
            .unwrap();
        let morning = NaiveDate::from_ymd_opt(2025, 5, 13)
            .and_then(|d| d.and_hms_opt(9, 0, 0))
            .unwrap();

        let mk = |id: &str, start| Event {
            id: id.into(),
            start_time: Some(start),
            ..Default::default()
        };
        let events = [mk("e1", evening), mk("e2", morning), mk("e3", evening)];
        let base = [0.9, 0.5, 0.5];
        let scored = events
            .iter()
            .zip(base)
            .map(|(e, b)| ScoredEvent {
                event_id: e.id.clone(),
                score: b * r.distance_multiplier(&ctx, e) * r.time_multiplier(&ctx, e),
            })
            .collect();
        let ranked = top(scored, 20);
        let ids: Vec<&str> = ranked.iter().map(|s| s.event_id.as_str()).collect();
        assert_eq!(ids, vec!["e1", "e3", "e2"]);
        assert!((ranked[2].score - 0.35).abs() < 1e-12);
    }

    #[test]
    fn events_without_vectors_are_not_candidates() {
        let r = ranker();
        let profile = vecs(vec![("genres", vec![1.0, 0.0])]);
        let with = Event {
            id: "with".into(),
            component_vectors: Some(vecs(vec![("genres", vec![1.0, 0.0])])),
            ..Default::default()
        };
        let without = Event {
            id: "without".into(),
            ..Default::default()
        };
        let ranked = r.rank(&profile, &UserContext::default(), &[without, with], 10);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].event_id, "with");
        // no preferred times: flat time penalty
        assert!((ranked[0].score - 0.7).abs() < 1e-12);
    }
}
