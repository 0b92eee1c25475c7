// src/categorize/classifier.rs
//! Statistical label scorers consumed as black boxes.
//!
//! `LabelScorer` is the seam; `NullScorer` is the always-available fallback and
//! `LinearModelScorer` evaluates an exported one-vs-rest linear text model
//! (raw decision values, positive = evidence).

use crate::vectorize::text::{TextVocabulary, Tokenizer};
use anyhow::{bail, Context};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// label -> confidence
pub type LabelScores = BTreeMap<String, f64>;

pub trait LabelScorer: Send + Sync {
    fn score_labels(&self, text: &str) -> anyhow::Result<LabelScores>;
    /// Scorer name for diagnostics.
    fn name(&self) -> &'static str;
}

pub type DynScorer = Arc<dyn LabelScorer>;

/// Scores nothing. Fusion then runs on keyword evidence alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullScorer;

impl LabelScorer for NullScorer {
    fn score_labels(&self, _text: &str) -> anyhow::Result<LabelScores> {
        Ok(LabelScores::new())
    }

    fn name(&self) -> &'static str {
        "null"
    }
}

/// On-disk shape of an exported linear model.
#[derive(Debug, Deserialize)]
struct LinearModelFile {
    labels: Vec<String>,
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
    coef: Vec<Vec<f64>>,
    intercept: Vec<f64>,
    #[serde(default)]
    ngram_max: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct LinearModelScorer {
    labels: Vec<String>,
    vocabulary: TextVocabulary,
    coef: Vec<Vec<f64>>,
    intercept: Vec<f64>,
}

impl LinearModelScorer {
    pub fn from_json_str(raw: &str) -> anyhow::Result<Self> {
        let file: LinearModelFile = serde_json::from_str(raw).context("parsing linear model JSON")?;

        let width = file.idf.len();
        if file.coef.len() != file.labels.len() || file.intercept.len() != file.labels.len() {
            bail!(
                "model has {} labels, {} coefficient rows and {} intercepts",
                file.labels.len(),
                file.coef.len(),
                file.intercept.len()
            );
        }
        if let Some((i, row)) = file.coef.iter().enumerate().find(|(_, r)| r.len() != width) {
            bail!("coefficient row {i} has {} columns, expected {width}", row.len());
        }

        let tokenizer = Tokenizer::with_ngrams(file.ngram_max.unwrap_or(1));
        let vocabulary = TextVocabulary::from_parts(tokenizer, &file.vocabulary, file.idf)?;

        Ok(Self {
            labels: file.labels,
            vocabulary,
            coef: file.coef,
            intercept: file.intercept,
        })
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading model at {}", path.display()))?;
        Self::from_json_str(&raw).with_context(|| format!("loading model at {}", path.display()))
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

impl LabelScorer for LinearModelScorer {
    fn score_labels(&self, text: &str) -> anyhow::Result<LabelScores> {
        let x = self.vocabulary.transform(text);
        let scores = self
            .labels
            .iter()
            .zip(self.coef.iter().zip(&self.intercept))
            .map(|(label, (row, b))| {
                let dot: f64 = row.iter().zip(&x).map(|(w, v)| w * v).sum();
                (label.clone(), dot + b)
            })
            .collect();
        Ok(scores)
    }

    fn name(&self) -> &'static str {
        "linear"
    }
}

/// Factory: a linear model when `path` is set and loads, else `NullScorer`.
pub fn build_scorer(kind: &str, path: Option<&Path>) -> DynScorer {
    let Some(path) = path else {
        info!(target: "categorize", kind, "no model configured; keyword evidence only");
        return Arc::new(NullScorer);
    };
    match LinearModelScorer::from_path(path) {
        Ok(m) => {
            info!(target: "categorize", kind, labels = m.labels().len(), path = %path.display(), "model loaded");
            Arc::new(m)
        }
        Err(e) => {
            warn!(target: "categorize", kind, error = ?e, "model unavailable; falling back to null scorer");
            Arc::new(NullScorer)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL: &str = r#"{
        "labels": ["music", "sport"],
        "vocabulary": {"concert": 0, "match": 1},
        "idf": [1.0, 1.0],
        "coef": [[2.0, -1.0], [-1.0, 2.0]],
        "intercept": [-0.5, -0.5]
    }"#;

    #[test]
    fn null_scorer_is_empty() {
        assert!(NullScorer.score_labels("anything").unwrap().is_empty());
    }

    #[test]
    fn linear_model_scores_decision_values() {
        let m = LinearModelScorer::from_json_str(MODEL).unwrap();
        let s = m.score_labels("big concert tonight").unwrap();
        assert!((s["music"] - 1.5).abs() < 1e-9);
        assert!((s["sport"] + 1.5).abs() < 1e-9);
    }

    #[test]
    fn malformed_model_is_rejected() {
        let bad = MODEL.replace("[-0.5, -0.5]", "[-0.5]");
        assert!(LinearModelScorer::from_json_str(&bad).is_err());
    }

    #[test]
    fn missing_model_file_falls_back_to_null() {
        let s = build_scorer("category", Some(Path::new("/definitely/not/here.json")));
        assert_eq!(s.name(), "null");
        assert_eq!(build_scorer("genre", None).name(), "null");
    }
}
