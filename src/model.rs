//! Typed records for events, users and onboarding answers.
//!
//! These are the validated shapes internal components work with. Missing
//! optional fields deserialize as empty/absent instead of failing.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Field name -> fixed-length numeric vector.
pub type ComponentVectorSet = BTreeMap<String, Vec<f64>>;

// Upstream payloads send `null` for absent text; treat it like a missing field.
pub(crate) fn null_as_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Venue {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub address: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub subtypes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub category: String,
    pub score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default, rename = "imageUrl")]
    pub image_url: Option<String>,
    /// Wall-clock time at the venue.
    #[serde(default, rename = "startTime")]
    pub start_time: Option<NaiveDateTime>,
    #[serde(default, rename = "endTime")]
    pub end_time: Option<NaiveDateTime>,
    #[serde(default, rename = "isVirtual")]
    pub is_virtual: bool,
    #[serde(default)]
    pub venue: Option<Venue>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub city: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub country: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub categories_scored: Vec<CategoryScore>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub main_categories: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub genres: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_vectors: Option<ComponentVectorSet>,
}

impl Event {
    pub fn venue_name(&self) -> &str {
        self.venue.as_ref().map(|v| v.name.as_str()).unwrap_or("")
    }

    pub fn venue_subtypes(&self) -> &[String] {
        self.venue
            .as_ref()
            .map(|v| v.subtypes.as_slice())
            .unwrap_or(&[])
    }

    pub fn coordinates(&self) -> Option<(f64, f64)> {
        let v = self.venue.as_ref()?;
        match (v.latitude, v.longitude) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => Some((lat, lon)),
            _ => None,
        }
    }

    /// End time, or start time when the event has no end time.
    pub fn expires_at(&self) -> Option<NaiveDateTime> {
        self.end_time.or(self.start_time)
    }

    pub fn is_expired(&self, now: NaiveDateTime) -> bool {
        self.expires_at().is_some_and(|t| t < now)
    }

    pub fn has_vectors(&self) -> bool {
        self.component_vectors
            .as_ref()
            .is_some_and(|v| !v.is_empty())
    }
}

/// Persisted per-user preference vectors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    #[serde(default)]
    pub component_profile_vectors: ComponentVectorSet,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserLocation {
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    /// Free-form place title picked in the app, e.g. "Київ, Україна".
    #[serde(default)]
    pub title: Option<String>,
}

/// Onboarding questionnaire, keyed by question index as the app stores it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OnboardingAnswers {
    #[serde(default, rename = "0")]
    pub categories: Vec<String>,
    #[serde(default, rename = "1")]
    pub music_genres: Vec<String>,
    #[serde(default, rename = "2")]
    pub theatre_genres: Vec<String>,
    #[serde(default, rename = "3")]
    pub locations: Vec<UserLocation>,
    #[serde(default, rename = "4")]
    pub max_distance: Vec<String>,
    #[serde(default, rename = "5")]
    pub preferred_times: Vec<String>,
}

impl OnboardingAnswers {
    pub fn location(&self) -> Option<&UserLocation> {
        self.locations.first()
    }

    pub fn coordinates(&self) -> Option<(f64, f64)> {
        let loc = self.location()?;
        match (loc.lat, loc.lon) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => Some((lat, lon)),
            _ => None,
        }
    }

    /// First number in the distance answer ("до 30 км" -> 30), or `default_km`.
    pub fn max_distance_km(&self, default_km: f64) -> f64 {
        self.max_distance
            .first()
            .and_then(|s| {
                let digits: String = s
                    .chars()
                    .skip_while(|c| !c.is_ascii_digit())
                    .take_while(|c| c.is_ascii_digit())
                    .collect();
                digits.parse::<f64>().ok()
            })
            .unwrap_or(default_km)
    }
}

/// A user's "like" of an event. Only the event reference is used downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LikedEvent {
    pub user_id: String,
    pub event_id: String,
    pub liked_at: DateTime<Utc>,
}
