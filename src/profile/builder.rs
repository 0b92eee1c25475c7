// src/profile/builder.rs
//! Profile vector construction and the two update policies.

use crate::config::{Catalog, ProfileSettings};
use crate::model::{ComponentVectorSet, Event, OnboardingAnswers};
use crate::vectorize::{FieldVectorizer, CLOSED_FIELDS};
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
pub struct ProfileBuilder {
    vectorizer: FieldVectorizer,
    catalog: Catalog,
    settings: ProfileSettings,
}

impl ProfileBuilder {
    pub fn new(catalog: &Catalog, settings: &ProfileSettings) -> Self {
        Self {
            vectorizer: FieldVectorizer::new(catalog),
            catalog: catalog.clone(),
            settings: settings.clone(),
        }
    }

    pub fn vectorizer(&self) -> &FieldVectorizer {
        &self.vectorizer
    }

    /// Canonical (categories, genres) picked during onboarding. Unknown labels
    /// become `other`; nothing is dropped.
    pub fn translate_answers(&self, answers: &OnboardingAnswers) -> (Vec<String>, Vec<String>) {
        let categories = answers
            .categories
            .iter()
            .map(|c| self.catalog.translate_category(c))
            .collect();
        let genres = answers
            .music_genres
            .iter()
            .chain(&answers.theatre_genres)
            .map(|g| self.catalog.translate_genre(g))
            .collect();
        (categories, genres)
    }

    /// Initial profile from declared interests.
    pub fn initial_vectors(&self, answers: &OnboardingAnswers) -> ComponentVectorSet {
        let (categories, genres) = self.translate_answers(answers);
        self.vectorizer.closed_vectors(&categories, &genres)
    }

    /// Multi-hot union of the liked events' categories and genres.
    pub fn liked_vectors(&self, liked: &[Event]) -> ComponentVectorSet {
        let mut categories = BTreeSet::new();
        let mut genres = BTreeSet::new();
        for e in liked {
            categories.extend(e.main_categories.iter().cloned());
            genres.extend(e.genres.iter().cloned());
        }
        let categories: Vec<String> = categories.into_iter().collect();
        let genres: Vec<String> = genres.into_iter().collect();
        self.vectorizer.closed_vectors(&categories, &genres)
    }

    /// Batch re-aggregation: `existing_weight * old + new_weight * fresh` per
    /// field. A field whose stored length differs from the fresh one keeps
    /// the fresh vector. Stored fields the fresh set does not cover are kept.
    pub fn blend(&self, existing: &ComponentVectorSet, fresh: ComponentVectorSet) -> ComponentVectorSet {
        let (w_old, w_new) = (self.settings.existing_weight, self.settings.new_weight);
        let mut out = existing.clone();
        for (field, new) in fresh {
            let merged = match existing.get(&field) {
                Some(old) if old.len() == new.len() && !old.is_empty() => old
                    .iter()
                    .zip(&new)
                    .map(|(o, n)| w_old * o + w_new * n)
                    .collect(),
                _ => new,
            };
            out.insert(field, merged);
        }
        out
    }

    /// Exponential smoothing of the stored profile with one newly liked event.
    pub fn smooth_with_like(&self, existing: &ComponentVectorSet, liked: &Event) -> ComponentVectorSet {
        let fresh = self
            .vectorizer
            .closed_vectors(&liked.main_categories, &liked.genres);
        let mut out = existing.clone();
        for field in CLOSED_FIELDS {
            let Some(new) = fresh.get(field) else {
                continue;
            };
            let old = existing.get(field).map(Vec::as_slice).unwrap_or(&[]);
            let smoothed = exponential_smoothing(
                old,
                new,
                self.settings.smoothing_alpha,
                self.settings.sparsity_threshold,
            );
            out.insert(field.to_string(), smoothed);
        }
        out
    }
}

/// `alpha * new + (1 - alpha) * old`, min-max rescaled, normalized to sum 1,
/// components below `threshold` zeroed, then renormalized over what is left.
///
/// A length mismatch (including an empty `old`) starts from `new` alone. When
/// nothing survives the threshold the thresholded vector is returned as is.
pub fn exponential_smoothing(old: &[f64], new: &[f64], alpha: f64, threshold: f64) -> Vec<f64> {
    let mut v: Vec<f64> = if old.len() == new.len() {
        old.iter()
            .zip(new)
            .map(|(o, n)| alpha * n + (1.0 - alpha) * o)
            .collect()
    } else {
        new.to_vec()
    };

    let min = v.iter().copied().fold(f64::INFINITY, f64::min);
    let max = v.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if range > 0.0 && range.is_finite() {
        v.iter_mut().for_each(|x| *x = (*x - min) / range);
    }

    normalize_sum(&mut v);

    v.iter_mut().for_each(|x| {
        if *x < threshold {
            *x = 0.0;
        }
    });

    normalize_sum(&mut v);
    v
}

fn normalize_sum(v: &mut [f64]) {
    let sum: f64 = v.iter().sum();
    if sum > 0.0 {
        v.iter_mut().for_each(|x| *x /= sum);
    }
}
