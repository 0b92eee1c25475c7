// src/config/app.rs
//! Process-level settings from the environment (`.env` is loaded by the binary).

use std::env;
use std::path::PathBuf;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_STORE_PATH: &str = "data/store.json";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    /// JSON document store location; `None` keeps everything in memory.
    pub store_path: Option<PathBuf>,
    pub category_model_path: Option<PathBuf>,
    pub genre_model_path: Option<PathBuf>,
    pub schedule_interval_hours: u64,
    pub cleanup_interval_hours: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            store_path: Some(PathBuf::from(DEFAULT_STORE_PATH)),
            category_model_path: None,
            genre_model_path: None,
            schedule_interval_hours: 6,
            cleanup_interval_hours: 24,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            bind_addr: env::var("BIND_ADDR").unwrap_or(d.bind_addr),
            store_path: match env::var("STORE_PATH") {
                // "memory" opts out of persistence (handy for local runs)
                Ok(p) if p.trim().eq_ignore_ascii_case("memory") => None,
                Ok(p) if !p.trim().is_empty() => Some(PathBuf::from(p)),
                _ => d.store_path,
            },
            category_model_path: path_var("CATEGORY_MODEL_PATH"),
            genre_model_path: path_var("GENRE_MODEL_PATH"),
            schedule_interval_hours: hours_var("SCHEDULE_INTERVAL_HOURS")
                .unwrap_or(d.schedule_interval_hours),
            cleanup_interval_hours: hours_var("SCHEDULE_CLEANUP_INTERVAL_HOURS")
                .unwrap_or(d.cleanup_interval_hours),
        }
    }
}

fn path_var(name: &str) -> Option<PathBuf> {
    env::var(name)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
}

// zero would spin the scheduler; treat it as unset
fn hours_var(name: &str) -> Option<u64> {
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .filter(|h| *h > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[serial_test::serial]
    #[test]
    fn env_overrides_and_fallbacks() {
        env::set_var("STORE_PATH", "memory");
        env::set_var("SCHEDULE_INTERVAL_HOURS", "0");
        env::set_var("SCHEDULE_CLEANUP_INTERVAL_HOURS", "12");
        env::set_var("CATEGORY_MODEL_PATH", "models/category.json");

        let cfg = AppConfig::from_env();
        assert!(cfg.store_path.is_none());
        assert_eq!(cfg.schedule_interval_hours, 6);
        assert_eq!(cfg.cleanup_interval_hours, 12);
        assert_eq!(
            cfg.category_model_path,
            Some(PathBuf::from("models/category.json"))
        );

        env::remove_var("STORE_PATH");
        env::remove_var("SCHEDULE_INTERVAL_HOURS");
        env::remove_var("SCHEDULE_CLEANUP_INTERVAL_HOURS");
        env::remove_var("CATEGORY_MODEL_PATH");
    }
}
