// src/config/settings.rs
//! Tuning + catalog document (TOML).
//!
//! One immutable `Settings` value is loaded at startup and handed to every
//! component constructor. Scoring code never reads env or files itself.

use anyhow::{anyhow, bail, Context};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use tracing::warn;

// --- env defaults & names ---
pub const DEFAULT_CONFIG_PATH: &str = "config/recommender.toml";
pub const ENV_CONFIG_PATH: &str = "RECOMMENDER_CONFIG_PATH";
pub const ENV_FUSION_THRESHOLD: &str = "FUSION_THRESHOLD";

/// Reserved bucket for onboarding labels without a translation.
pub const OTHER_LABEL: &str = "other";

const BUILTIN_TOML: &str = include_str!("../../config/recommender.toml");

// parse optional float env and clamp to <0.0..=1.0>
fn parse_threshold_env(raw: Option<String>) -> Option<f64> {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .map(|v| v.clamp(0.0, 1.0))
}

/* ----------------------------
Config schema (from TOML)
---------------------------- */

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub fusion: FusionSettings,
    pub profile: ProfileSettings,
    pub ranking: RankingSettings,
    pub catalog: Catalog,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FusionSettings {
    pub model_weight: f64,
    pub keyword_weight: f64,
    pub threshold: f64,
    #[serde(default)]
    pub genre_eligible: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileSettings {
    /// Weight of the stored profile in batch re-aggregation.
    pub existing_weight: f64,
    /// Weight of the freshly computed liked-events vector.
    pub new_weight: f64,
    pub smoothing_alpha: f64,
    pub sparsity_threshold: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RankingSettings {
    pub liked_weight: f64,
    pub profile_weight: f64,
    pub default_radius_km: f64,
    pub distance_decay_km: f64,
    pub distance_floor: f64,
    pub city_mismatch_penalty: f64,
    pub time_penalty: f64,
    pub default_top_n: usize,
    pub default_similar_top_n: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Catalog {
    pub categories: Vec<CategoryKeywords>,
    #[serde(default)]
    pub genres: Vec<CategoryGenres>,
    /// phrase -> genre
    #[serde(default)]
    pub genre_hints: HashMap<String, String>,
    #[serde(default)]
    pub translations: Translations,
    /// English city name -> local spelling
    #[serde(default)]
    pub cities: HashMap<String, String>,
    #[serde(default)]
    pub alphabet: AlphabetSettings,
}

/// Letters kept by text normalization, in lower-case form.
#[derive(Debug, Clone, Deserialize)]
pub struct AlphabetSettings {
    /// Inclusive `[first, last]` letter ranges.
    #[serde(default)]
    pub ranges: Vec<(char, char)>,
    #[serde(default)]
    pub extra: Vec<char>,
}

impl Default for AlphabetSettings {
    /// Latin + Ukrainian Cyrillic.
    fn default() -> Self {
        Self {
            ranges: vec![('a', 'z'), ('а', 'я')],
            extra: vec!['і', 'ї', 'є', 'ґ'],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryKeywords {
    pub name: String,
    pub keywords: HashMap<String, f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryGenres {
    pub category: String,
    pub names: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Translations {
    #[serde(default)]
    pub categories: HashMap<String, String>,
    #[serde(default)]
    pub genres: HashMap<String, String>,
    #[serde(default)]
    pub times: HashMap<String, String>,
}

impl Settings {
    /// Load from a TOML file. Uses RECOMMENDER_CONFIG_PATH or defaults to "config/recommender.toml".
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var(ENV_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

        let content = fs::read_to_string(&path)
            .with_context(|| format!("reading recommender config at {}", path.display()))?;

        let mut settings = Self::from_toml_str(&content)?;

        // optional: override threshold from env
        if let Some(t) = parse_threshold_env(std::env::var(ENV_FUSION_THRESHOLD).ok()) {
            settings.fusion.threshold = t;
        }

        Ok(settings)
    }

    /// Same as `load`, but falls back to the embedded document when the file is missing.
    pub fn load_or_builtin() -> Self {
        match Self::load() {
            Ok(s) => s,
            Err(e) => {
                warn!(target: "config", error = %e, "using built-in recommender settings");
                let mut s = Self::builtin();
                if let Some(t) = parse_threshold_env(std::env::var(ENV_FUSION_THRESHOLD).ok()) {
                    s.fusion.threshold = t;
                }
                s
            }
        }
    }

    /// The default document shipped with the crate.
    pub fn builtin() -> Self {
        Self::from_toml_str(BUILTIN_TOML).expect("embedded config/recommender.toml is valid")
    }

    /// Load from a TOML string and validate.
    pub fn from_toml_str(toml_str: &str) -> anyhow::Result<Self> {
        let mut settings: Settings = toml::from_str(toml_str)?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&mut self) -> anyhow::Result<()> {
        for cat in &self.catalog.categories {
            for (kw, w) in &cat.keywords {
                if !(w.is_finite() && *w > 0.0) {
                    bail!("keyword `{kw}` of category `{}` must have a positive weight, got {w}", cat.name);
                }
            }
        }

        let f = &mut self.fusion;
        if f.model_weight < 0.0 || f.keyword_weight < 0.0 {
            return Err(anyhow!("fusion weights must be non-negative"));
        }
        let sum = f.model_weight + f.keyword_weight;
        if sum <= 0.0 {
            bail!("fusion weights must not both be zero");
        }
        if (sum - 1.0).abs() > 1e-9 {
            warn!(
                target: "config",
                model = f.model_weight,
                keyword = f.keyword_weight,
                "fusion weights do not sum to 1; renormalizing"
            );
            f.model_weight /= sum;
            f.keyword_weight /= sum;
        }
        if !f.threshold.is_finite() {
            bail!("fusion threshold must be finite");
        }

        let p = &self.profile;
        if !(0.0..=1.0).contains(&p.smoothing_alpha) {
            bail!("profile.smoothing_alpha must be within [0, 1]");
        }

        let a = &self.catalog.alphabet;
        if let Some((lo, hi)) = a.ranges.iter().find(|(lo, hi)| lo > hi) {
            bail!("alphabet range `{lo}`-`{hi}` is reversed");
        }
        if a.ranges.is_empty() && a.extra.is_empty() {
            bail!("catalog.alphabet keeps no letters");
        }
        Ok(())
    }
}

impl Catalog {
    /// Closed category vocabulary: keyword-table order plus the `other` bucket.
    pub fn category_vocabulary(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::with_capacity(self.categories.len() + 1);
        for c in &self.categories {
            if !out.contains(&c.name) {
                out.push(c.name.clone());
            }
        }
        if !out.iter().any(|c| c == OTHER_LABEL) {
            out.push(OTHER_LABEL.to_string());
        }
        out
    }

    /// Closed genre vocabulary: first-seen order across per-category lists plus `other`.
    pub fn genre_vocabulary(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for g in self.genres.iter().flat_map(|cg| cg.names.iter()) {
            if !out.contains(g) {
                out.push(g.clone());
            }
        }
        if !out.iter().any(|g| g == OTHER_LABEL) {
            out.push(OTHER_LABEL.to_string());
        }
        out
    }

    /// Translate an onboarding category label; unknown labels land in `other`.
    pub fn translate_category(&self, label: &str) -> String {
        translate_or_other(&self.translations.categories, label)
    }

    pub fn translate_genre(&self, label: &str) -> String {
        translate_or_other(&self.translations.genres, label)
    }

    /// Time-of-day label in either the UI language or canonical form.
    pub fn translate_time(&self, label: &str) -> Option<String> {
        let trimmed = label.trim();
        if let Some(t) = self.translations.times.get(trimmed) {
            return Some(t.clone());
        }
        let lower = trimmed.to_lowercase();
        self.translations
            .times
            .values()
            .find(|v| v.as_str() == lower)
            .cloned()
    }

    /// Canonical (local spelling, lower-cased) form of a city name.
    pub fn canonical_city(&self, city: &str) -> String {
        let trimmed = city.trim();
        let local = self
            .cities
            .iter()
            .find(|(en, _)| en.eq_ignore_ascii_case(trimmed))
            .map(|(_, local)| local.as_str())
            .unwrap_or(trimmed);
        local.to_lowercase()
    }
}

fn translate_or_other(table: &HashMap<String, String>, label: &str) -> String {
    table
        .get(label.trim())
        .cloned()
        .unwrap_or_else(|| OTHER_LABEL.to_string())
}
