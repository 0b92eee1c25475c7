// src/ingest/raw.rs
//! Upstream event-search payload and its validation into `Event`.

use crate::model::{null_as_default, Event, Venue};
use anyhow::{bail, Context};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawLink {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawVenue {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub full_address: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub subtypes: Vec<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawEvent {
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub info_links: Vec<RawLink>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ticket_links: Vec<RawLink>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub is_virtual: Option<bool>,
    #[serde(default)]
    pub venue: Option<RawVenue>,
    /// Source-side category labels; kept as main categories when present.
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub publisher: Option<String>,
}

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// `"2025-05-13 19:00:00"`, or the same with a `T` separator.
pub fn parse_time(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, TIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .ok()
}

/// Direct link, else the first info link, else the first ticket link.
fn pick_link(raw: &RawEvent) -> Option<String> {
    if let Some(l) = non_empty(&raw.link) {
        return Some(l.to_string());
    }
    raw.info_links
        .first()
        .and_then(|l| non_empty(&l.link))
        .or_else(|| raw.ticket_links.first().and_then(|l| non_empty(&l.link)))
        .map(str::to_string)
}

pub fn transform(raw: &RawEvent) -> anyhow::Result<Event> {
    let Some(id) = non_empty(&raw.event_id) else {
        bail!("event without event_id");
    };
    let name = non_empty(&raw.name)
        .with_context(|| format!("event {id} has no name"))?
        .to_string();

    let venue = raw.venue.as_ref().map(|v| Venue {
        name: v.name.clone().unwrap_or_default(),
        address: v.full_address.clone().unwrap_or_default(),
        latitude: v.latitude,
        longitude: v.longitude,
        subtypes: v.subtypes.clone(),
    });
    let (city, country) = raw
        .venue
        .as_ref()
        .map(|v| {
            (
                v.city.clone().unwrap_or_default(),
                v.country.clone().unwrap_or_default(),
            )
        })
        .unwrap_or_default();

    Ok(Event {
        id: id.to_string(),
        name,
        description: non_empty(&raw.description).map(str::to_string),
        link: pick_link(raw),
        publisher: non_empty(&raw.publisher).map(str::to_string),
        image_url: non_empty(&raw.thumbnail).map(str::to_string),
        start_time: raw.start_time.as_deref().and_then(parse_time),
        end_time: raw.end_time.as_deref().and_then(parse_time),
        is_virtual: raw.is_virtual.unwrap_or(false),
        venue,
        city,
        country,
        main_categories: raw.tags.clone(),
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "event_id": "L2F1dGhvcml0eS9ob3Jpem9u",
        "name": "TNMK (Tanok na Maidani Kongo)",
        "link": null,
        "description": null,
        "start_time": "2025-05-13 19:00:00",
        "is_virtual": false,
        "thumbnail": "https://example.org/t.png",
        "ticket_links": [{"source": "Karabas.com", "link": "https://ternopil.karabas.com/en/index.php/clubs/"}],
        "info_links": [],
        "venue": {
            "name": "PK Berezil",
            "subtypes": ["Transit stop", "Bus stop"],
            "full_address": "PK Berezil, Ternopil, Ukraine, 46003",
            "latitude": 49.54649,
            "longitude": 25.5765,
            "city": "Ternopil",
            "country": "UA"
        }
    }"#;

    #[test]
    fn transforms_upstream_payload() {
        let raw: RawEvent = serde_json::from_str(SAMPLE).unwrap();
        let ev = transform(&raw).unwrap();
        assert_eq!(ev.name, "TNMK (Tanok na Maidani Kongo)");
        assert_eq!(ev.link.as_deref(), Some("https://ternopil.karabas.com/en/index.php/clubs/"));
        assert_eq!(ev.city, "Ternopil");
        assert_eq!(ev.coordinates(), Some((49.54649, 25.5765)));
        assert_eq!(ev.start_time, parse_time("2025-05-13 19:00:00"));
        assert!(ev.end_time.is_none());
        assert!(ev.main_categories.is_empty());
    }

    #[test]
    fn info_link_beats_ticket_link() {
        let raw = RawEvent {
            event_id: Some("x".into()),
            name: Some("n".into()),
            info_links: vec![RawLink {
                source: None,
                link: Some("https://info.example.org".into()),
            }],
            ticket_links: vec![RawLink {
                source: None,
                link: Some("https://tickets.example.org".into()),
            }],
            ..Default::default()
        };
        assert_eq!(transform(&raw).unwrap().link.as_deref(), Some("https://info.example.org"));
    }

    #[test]
    fn missing_identity_is_rejected() {
        assert!(transform(&RawEvent::default()).is_err());
        let no_name = RawEvent {
            event_id: Some("x".into()),
            ..Default::default()
        };
        assert!(transform(&no_name).is_err());
    }

    #[test]
    fn tags_and_bad_times() {
        let raw = RawEvent {
            event_id: Some("x".into()),
            name: Some("n".into()),
            start_time: Some("tomorrow-ish".into()),
            tags: vec!["music".into()],
            ..Default::default()
        };
        let ev = transform(&raw).unwrap();
        assert!(ev.start_time.is_none());
        assert_eq!(ev.main_categories, vec!["music"]);
    }
}
