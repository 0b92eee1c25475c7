// src/recommend/schedule.rs
//! Time-of-day preference buckets.

use crate::config::Catalog;
use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeBucket {
    /// 06:00-12:00
    Morning,
    /// 12:00-17:00
    Day,
    /// 17:00-22:00
    Evening,
    /// Saturday or Sunday
    Weekend,
}

impl TimeBucket {
    pub fn from_canonical(name: &str) -> Option<Self> {
        match name {
            "morning" => Some(Self::Morning),
            "day" => Some(Self::Day),
            "evening" => Some(Self::Evening),
            "weekend" => Some(Self::Weekend),
            _ => None,
        }
    }

    /// Parse an onboarding answer (UI language or canonical).
    pub fn from_label(catalog: &Catalog, label: &str) -> Option<Self> {
        catalog
            .translate_time(label)
            .and_then(|c| Self::from_canonical(&c))
    }

    pub fn contains(self, at: NaiveDateTime) -> bool {
        let hour = at.hour();
        match self {
            Self::Morning => (6..12).contains(&hour),
            Self::Day => (12..17).contains(&hour),
            Self::Evening => (17..22).contains(&hour),
            Self::Weekend => matches!(at.weekday(), Weekday::Sat | Weekday::Sun),
        }
    }
}

/// 1.0 when `start` falls in any preferred bucket, `penalty` otherwise.
/// A missing start time never matches, and neither does an empty preference
/// list, so users without stated times get the flat penalty on every event.
pub fn time_multiplier(start: Option<NaiveDateTime>, preferred: &[TimeBucket], penalty: f64) -> f64 {
    match start {
        Some(at) if preferred.iter().any(|b| b.contains(at)) => 1.0,
        _ => penalty,
    }
}
