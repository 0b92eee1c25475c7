// src/vectorize/mod.rs
//! Per-field event vectors.
//!
//! Closed-vocabulary fields (`main_categories`, `genres`) are multi-hot over the
//! catalog vocabularies, so they are comparable across every event and profile.
//! Free-text fields are tf-idf encoded against a vocabulary fitted on the batch
//! being vectorized. Text vectors from different fits are NOT comparable; pass
//! the [`TextVocabularies`] returned by an earlier fit to
//! [`FieldVectorizer::vectorize_with`] when a stable encoding is needed.

pub mod text;

use crate::config::Catalog;
use crate::model::{ComponentVectorSet, Event};
use std::collections::BTreeMap;

pub use text::{TextVocabulary, Tokenizer};

pub const FIELD_MAIN_CATEGORIES: &str = "main_categories";
pub const FIELD_GENRES: &str = "genres";
pub const FIELD_NAME: &str = "name";
pub const FIELD_VENUE_SUBTYPES: &str = "venue_subtypes";
pub const FIELD_IS_VIRTUAL: &str = "isVirtual";

pub const CLOSED_FIELDS: [&str; 2] = [FIELD_MAIN_CATEGORIES, FIELD_GENRES];
pub const TEXT_FIELDS: [&str; 3] = [FIELD_NAME, FIELD_VENUE_SUBTYPES, FIELD_IS_VIRTUAL];

/// Fitted text vocabularies keyed by field name.
#[derive(Debug, Clone, Default)]
pub struct TextVocabularies {
    pub fields: BTreeMap<String, TextVocabulary>,
}

#[derive(Debug, Clone)]
pub struct FieldVectorizer {
    categories: Vec<String>,
    genres: Vec<String>,
    tokenizer: Tokenizer,
}

impl FieldVectorizer {
    pub fn new(catalog: &Catalog) -> Self {
        Self {
            categories: catalog.category_vocabulary(),
            genres: catalog.genre_vocabulary(),
            tokenizer: Tokenizer::for_fields(),
        }
    }

    pub fn category_vocabulary(&self) -> &[String] {
        &self.categories
    }

    pub fn genre_vocabulary(&self) -> &[String] {
        &self.genres
    }

    pub fn category_vector<S: AsRef<str>>(&self, selected: &[S]) -> Vec<f64> {
        multi_hot(&self.categories, selected)
    }

    pub fn genre_vector<S: AsRef<str>>(&self, selected: &[S]) -> Vec<f64> {
        multi_hot(&self.genres, selected)
    }

    /// The closed-vocabulary part of a vector set.
    pub fn closed_vectors<S: AsRef<str>>(&self, categories: &[S], genres: &[S]) -> ComponentVectorSet {
        let mut out = ComponentVectorSet::new();
        out.insert(FIELD_MAIN_CATEGORIES.to_string(), self.category_vector(categories));
        out.insert(FIELD_GENRES.to_string(), self.genre_vector(genres));
        out
    }

    /// Fit one text vocabulary per text field over `events`.
    pub fn fit_text(&self, events: &[Event]) -> TextVocabularies {
        let fields = TEXT_FIELDS
            .iter()
            .map(|field| {
                let docs: Vec<String> = events.iter().map(|e| field_text(e, field)).collect();
                (
                    field.to_string(),
                    TextVocabulary::fit(&docs, self.tokenizer.clone()),
                )
            })
            .collect();
        TextVocabularies { fields }
    }

    /// Fit text vocabularies jointly on `events` and write every event's
    /// `component_vectors`. Returns the fitted vocabularies.
    pub fn vectorize_batch(&self, events: &mut [Event]) -> TextVocabularies {
        let vocab = self.fit_text(events);
        self.vectorize_with(events, &vocab);
        vocab
    }

    /// Encode `events` against already fitted vocabularies.
    pub fn vectorize_with(&self, events: &mut [Event], vocab: &TextVocabularies) {
        for event in events.iter_mut() {
            let vectors = self.event_vectors(event, vocab);
            event.component_vectors = Some(vectors);
        }
    }

    pub fn event_vectors(&self, event: &Event, vocab: &TextVocabularies) -> ComponentVectorSet {
        let mut out = self.closed_vectors(&event.main_categories, &event.genres);
        for field in TEXT_FIELDS {
            // fields without a fitted vocabulary are simply left out
            if let Some(v) = vocab.fields.get(field) {
                out.insert(field.to_string(), v.transform(&field_text(event, field)));
            }
        }
        out
    }
}

fn multi_hot<S: AsRef<str>>(vocabulary: &[String], selected: &[S]) -> Vec<f64> {
    vocabulary
        .iter()
        .map(|label| {
            if selected.iter().any(|s| s.as_ref() == label) {
                1.0
            } else {
                0.0
            }
        })
        .collect()
}

/// Lower-cased text an event contributes to a free-text field.
pub fn field_text(event: &Event, field: &str) -> String {
    match field {
        FIELD_NAME => event.name.to_lowercase(),
        FIELD_VENUE_SUBTYPES => event.venue_subtypes().join(" ").to_lowercase(),
        FIELD_IS_VIRTUAL => {
            if event.is_virtual {
                "online".to_string()
            } else {
                "offline".to_string()
            }
        }
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::model::Venue;

    fn ev(id: &str, name: &str, cats: &[&str], genres: &[&str], virt: bool) -> Event {
        Event {
            id: id.into(),
            name: name.into(),
            is_virtual: virt,
            main_categories: cats.iter().map(|s| s.to_string()).collect(),
            genres: genres.iter().map(|s| s.to_string()).collect(),
            venue: Some(Venue {
                subtypes: vec!["Concert hall".into()],
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn closed_vectors_follow_catalog_order() {
        let s = Settings::builtin();
        let fv = FieldVectorizer::new(&s.catalog);
        let v = fv.category_vector(&["show", "music", "not-a-category"]);
        assert_eq!(v.len(), fv.category_vocabulary().len());
        assert_eq!(&v[..3], &[1.0, 1.0, 0.0]);
        assert_eq!(v.iter().sum::<f64>(), 2.0);
    }

    #[test]
    fn batch_vectors_share_dimensions() {
        let s = Settings::builtin();
        let fv = FieldVectorizer::new(&s.catalog);
        let mut events = vec![
            ev("a", "Rock Night", &["music"], &["rock"], false),
            ev("b", "Jazz Evening", &["music"], &["jazz"], true),
        ];
        let vocab = fv.vectorize_batch(&mut events);

        let a = events[0].component_vectors.as_ref().unwrap();
        let b = events[1].component_vectors.as_ref().unwrap();
        for field in CLOSED_FIELDS.iter().chain(TEXT_FIELDS.iter()) {
            assert_eq!(a[*field].len(), b[*field].len(), "field {field}");
        }
        assert_eq!(vocab.fields[FIELD_IS_VIRTUAL].terms(), ["offline", "online"]);
        assert_ne!(a[FIELD_IS_VIRTUAL], b[FIELD_IS_VIRTUAL]);
    }

    #[test]
    fn frozen_vocabulary_keeps_lengths_stable_across_runs() {
        let s = Settings::builtin();
        let fv = FieldVectorizer::new(&s.catalog);
        let mut first = vec![ev("a", "Rock Night", &["music"], &[], false)];
        let vocab = fv.vectorize_batch(&mut first);

        let mut later = vec![ev("c", "Brand new words entirely", &["show"], &[], false)];
        fv.vectorize_with(&mut later, &vocab);
        let c = later[0].component_vectors.as_ref().unwrap();
        assert_eq!(c[FIELD_NAME].len(), vocab.fields[FIELD_NAME].len());
        assert!(c[FIELD_NAME].iter().all(|x| *x == 0.0));
    }
}
