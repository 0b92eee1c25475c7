// src/categorize/genres.rs
//! Genre detection for genre-eligible events.

use super::classifier::LabelScores;
use super::normalize::TextNormalizer;
use crate::config::Settings;
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
struct Needle {
    /// normalized phrase searched for in the text
    phrase: String,
    genre: String,
}

#[derive(Debug, Clone)]
pub struct GenreDetector {
    eligible: Vec<String>,
    by_category: Vec<(String, Vec<Needle>)>,
    hints: Vec<Needle>,
}

impl GenreDetector {
    pub fn new(settings: &Settings, normalizer: &TextNormalizer) -> Self {
        let needle = |phrase: &str, genre: &str| Needle {
            phrase: normalizer.normalize(&[Some(phrase)]),
            genre: genre.to_string(),
        };

        let by_category = settings
            .catalog
            .genres
            .iter()
            .map(|cg| {
                let needles = cg.names.iter().map(|g| needle(g, g)).collect();
                (cg.category.clone(), needles)
            })
            .collect();

        let mut hints: Vec<Needle> = settings
            .catalog
            .genre_hints
            .iter()
            .map(|(phrase, genre)| needle(phrase, genre))
            .collect();
        hints.sort_by(|a, b| a.phrase.cmp(&b.phrase));

        Self {
            eligible: settings.fusion.genre_eligible.clone(),
            by_category,
            hints,
        }
    }

    /// True when at least one main category gates genre detection in.
    pub fn is_eligible(&self, main_categories: &[String]) -> bool {
        main_categories.iter().any(|c| self.eligible.contains(c))
    }

    /// Sorted, deduplicated genres. `model_scores` contributes its positive
    /// entries; literal genre names of the event's main categories and the
    /// implicit hint phrases contribute substring matches on `text`.
    pub fn detect(&self, text: &str, main_categories: &[String], model_scores: &LabelScores) -> Vec<String> {
        if !self.is_eligible(main_categories) {
            return Vec::new();
        }

        let mut found: BTreeSet<String> = model_scores
            .iter()
            .filter(|(_, s)| **s > 0.0)
            .map(|(g, _)| g.clone())
            .collect();

        for (category, needles) in &self.by_category {
            if !main_categories.contains(category) {
                continue;
            }
            for n in needles {
                if !n.phrase.is_empty() && text.contains(&n.phrase) {
                    found.insert(n.genre.clone());
                }
            }
        }

        for n in &self.hints {
            if !n.phrase.is_empty() && text.contains(&n.phrase) {
                found.insert(n.genre.clone());
            }
        }

        found.into_iter().collect()
    }
}
