// src/categorize/mod.rs
//! Category fusion: statistical model scores + keyword table -> ranked
//! categories, main categories and genres for each event.

pub mod classifier;
pub mod genres;
pub mod keywords;
pub mod normalize;

use crate::config::{FusionSettings, Settings};
use crate::model::{CategoryScore, Event};
use classifier::{DynScorer, LabelScorer, LabelScores, NullScorer};
use genres::GenreDetector;
use keywords::{round3, KeywordScorer};
use metrics::{counter, describe_counter};
use normalize::{Alphabet, TextNormalizer};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("categorize_events_total", "Events run through category fusion.");
        describe_counter!(
            "categorize_classifier_failures_total",
            "Classifier calls that failed and fell back to empty scores."
        );
        describe_counter!(
            "categorize_uncategorized_total",
            "Events left without any main category."
        );
    });
}

/// Fusion output for one event.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Categorization {
    pub categories_scored: Vec<CategoryScore>,
    pub main_categories: Vec<String>,
    pub genres: Vec<String>,
}

pub struct Categorizer {
    normalizer: TextNormalizer,
    keywords: KeywordScorer,
    genres: GenreDetector,
    category_model: DynScorer,
    genre_model: DynScorer,
    fusion: FusionSettings,
}

impl Categorizer {
    pub fn new(settings: &Settings, category_model: DynScorer, genre_model: DynScorer) -> anyhow::Result<Self> {
        let normalizer = TextNormalizer::new(Alphabet::from_settings(&settings.catalog.alphabet));
        let keywords = KeywordScorer::new(&settings.catalog.categories, &normalizer)?;
        let genres = GenreDetector::new(settings, &normalizer);
        Ok(Self {
            normalizer,
            keywords,
            genres,
            category_model,
            genre_model,
            fusion: settings.fusion.clone(),
        })
    }

    /// Keyword evidence only (both models are null scorers).
    pub fn keyword_only(settings: &Settings) -> anyhow::Result<Self> {
        Self::new(settings, Arc::new(NullScorer), Arc::new(NullScorer))
    }

    pub fn normalizer(&self) -> &TextNormalizer {
        &self.normalizer
    }

    pub fn threshold(&self) -> f64 {
        self.fusion.threshold
    }

    /// Ranked fused scores for normalized `text`, highest first. Equal scores
    /// keep keyword-table order; model-only labels follow in name order.
    pub fn fuse(&self, text: &str) -> Vec<CategoryScore> {
        let model = positive(model_scores(self.category_model.as_ref(), text));
        let kw = self.keywords.score(text);

        let mut order: Vec<&str> = self.keywords.category_names().collect();
        for label in model.keys() {
            if !order.contains(&label.as_str()) {
                order.push(label.as_str());
            }
        }

        let mut ranked: Vec<CategoryScore> = order
            .into_iter()
            .filter_map(|c| {
                let m = model.get(c).copied().unwrap_or(0.0);
                let k = kw.get(c).copied().unwrap_or(0.0);
                if m <= 0.0 && k <= 0.0 {
                    return None;
                }
                Some(CategoryScore {
                    category: c.to_string(),
                    score: round3(self.fusion.model_weight * m + self.fusion.keyword_weight * k),
                })
            })
            .collect();

        // stable: ties stay in table order
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked
    }

    pub fn categorize_text(&self, text: &str) -> Categorization {
        self.categorize_with_threshold(text, self.fusion.threshold)
    }

    pub fn categorize_with_threshold(&self, text: &str, threshold: f64) -> Categorization {
        let categories_scored = self.fuse(text);
        let main_categories = main_categories(&categories_scored, threshold);
        let genres = self.detect_genres(text, &main_categories);
        Categorization {
            categories_scored,
            main_categories,
            genres,
        }
    }

    fn detect_genres(&self, text: &str, main_categories: &[String]) -> Vec<String> {
        if !self.genres.is_eligible(main_categories) {
            return Vec::new();
        }
        let model = model_scores(self.genre_model.as_ref(), text);
        self.genres.detect(text, main_categories, &model)
    }

    pub fn categorize_event(&self, event: &Event) -> Categorization {
        let text = self.normalizer.normalize_event(event);
        self.categorize_text(&text)
    }

    /// Write fusion results onto `event`. Upstream-provided main categories
    /// (source tags) are kept when present.
    pub fn apply(&self, event: &mut Event) {
        ensure_metrics_described();
        let text = self.normalizer.normalize_event(event);
        let categories_scored = self.fuse(&text);

        if event.main_categories.is_empty() {
            event.main_categories = main_categories(&categories_scored, self.fusion.threshold);
        }
        event.genres = self.detect_genres(&text, &event.main_categories);
        event.categories_scored = categories_scored;

        counter!("categorize_events_total").increment(1);
        if event.main_categories.is_empty() {
            counter!("categorize_uncategorized_total").increment(1);
        }
        debug!(
            target: "categorize",
            event_id = %event.id,
            main = ?event.main_categories,
            genres = ?event.genres,
            "categorized"
        );
    }

    /// Categorize a batch in place. One event's failure never aborts the rest.
    pub fn assign_categories(&self, events: &mut [Event]) {
        for event in events.iter_mut() {
            self.apply(event);
        }
    }
}

/// Categories whose fused score meets `threshold`, in ranked order.
pub fn main_categories(ranked: &[CategoryScore], threshold: f64) -> Vec<String> {
    ranked
        .iter()
        .filter(|c| c.score >= threshold)
        .map(|c| c.category.clone())
        .collect()
}

// A failing model degrades to "no evidence" for this text only.
fn model_scores(model: &dyn LabelScorer, text: &str) -> LabelScores {
    match model.score_labels(text) {
        Ok(s) => s,
        Err(e) => {
            ensure_metrics_described();
            warn!(target: "categorize", error = ?e, scorer = model.name(), "classifier failed; using keyword evidence");
            counter!("categorize_classifier_failures_total").increment(1);
            LabelScores::new()
        }
    }
}

fn positive(scores: LabelScores) -> LabelScores {
    scores.into_iter().filter(|(_, s)| *s > 0.0).collect()
}
