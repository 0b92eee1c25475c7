// src/vectorize/text.rs
//! Term-frequency/inverse-document-frequency encoding for free-text fields.
//!
//! Tokens are runs of two or more word characters. The idf is smoothed
//! (`ln((1 + n) / (1 + df)) + 1`) and every vector is l2-normalized, so the
//! encoding matches the exported linear models it also feeds.

use anyhow::{bail, Context};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashMap};

static RE_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?u)\b\w\w+\b").expect("token regex"));

const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
    "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few", "for",
    "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers", "herself",
    "him", "himself", "his", "how", "if", "in", "into", "is", "it", "its", "itself", "just",
    "me", "more", "most", "my", "myself", "no", "nor", "not", "now", "of", "off", "on", "once",
    "only", "or", "other", "our", "ours", "ourselves", "out", "over", "own", "same", "she",
    "should", "so", "some", "such", "than", "that", "the", "their", "theirs", "them",
    "themselves", "then", "there", "these", "they", "this", "those", "through", "to", "too",
    "under", "until", "up", "very", "was", "we", "were", "what", "when", "where", "which",
    "while", "who", "whom", "why", "will", "with", "would", "you", "your", "yours", "yourself",
    "yourselves",
];

#[derive(Debug, Clone, PartialEq)]
pub struct Tokenizer {
    /// Longest word n-gram emitted (1 = unigrams only).
    pub ngram_max: usize,
    pub english_stop_words: bool,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self {
            ngram_max: 1,
            english_stop_words: false,
        }
    }
}

impl Tokenizer {
    /// Unigrams with English stop words removed; used for event text fields.
    pub fn for_fields() -> Self {
        Self {
            ngram_max: 1,
            english_stop_words: true,
        }
    }

    pub fn with_ngrams(ngram_max: usize) -> Self {
        Self {
            ngram_max: ngram_max.max(1),
            english_stop_words: false,
        }
    }

    pub fn terms(&self, text: &str) -> Vec<String> {
        let lower = text.to_lowercase();
        let words: Vec<&str> = RE_TOKEN
            .find_iter(&lower)
            .map(|m| m.as_str())
            .filter(|w| !(self.english_stop_words && ENGLISH_STOP_WORDS.contains(w)))
            .collect();

        let mut out: Vec<String> = words.iter().map(|w| w.to_string()).collect();
        for n in 2..=self.ngram_max.max(1) {
            for window in words.windows(n) {
                out.push(window.join(" "));
            }
        }
        out
    }
}

/// A fitted term vocabulary with idf weights.
#[derive(Debug, Clone, PartialEq)]
pub struct TextVocabulary {
    pub tokenizer: Tokenizer,
    terms: Vec<String>,
    idf: Vec<f64>,
    index: HashMap<String, usize>,
}

impl TextVocabulary {
    /// Learn the vocabulary jointly over `docs`. Terms are ordered alphabetically.
    pub fn fit<S: AsRef<str>>(docs: &[S], tokenizer: Tokenizer) -> Self {
        let mut df: BTreeMap<String, usize> = BTreeMap::new();
        for doc in docs {
            let unique: BTreeSet<String> = tokenizer.terms(doc.as_ref()).into_iter().collect();
            for term in unique {
                *df.entry(term).or_insert(0) += 1;
            }
        }

        let n = docs.len() as f64;
        let (terms, idf): (Vec<String>, Vec<f64>) = df
            .into_iter()
            .map(|(t, d)| {
                let w = ((1.0 + n) / (1.0 + d as f64)).ln() + 1.0;
                (t, w)
            })
            .unzip();

        let mut vocab = Self {
            tokenizer,
            terms,
            idf,
            index: HashMap::new(),
        };
        vocab.reindex();
        vocab
    }

    /// Build from an exported `term -> column` map plus per-column idf.
    pub fn from_parts(
        tokenizer: Tokenizer,
        vocabulary: &HashMap<String, usize>,
        idf: Vec<f64>,
    ) -> anyhow::Result<Self> {
        if vocabulary.len() != idf.len() {
            bail!(
                "vocabulary has {} terms but idf has {} entries",
                vocabulary.len(),
                idf.len()
            );
        }
        let mut terms = vec![String::new(); idf.len()];
        for (term, &col) in vocabulary {
            let slot = terms
                .get_mut(col)
                .with_context(|| format!("term `{term}` maps to column {col} outside the idf range"))?;
            *slot = term.clone();
        }
        let mut vocab = Self {
            tokenizer,
            terms,
            idf,
            index: HashMap::new(),
        };
        vocab.reindex();
        Ok(vocab)
    }

    fn reindex(&mut self) {
        self.index = self
            .terms
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// l2-normalized tf-idf vector; terms outside the vocabulary are ignored.
    pub fn transform(&self, doc: &str) -> Vec<f64> {
        let mut v = vec![0.0; self.terms.len()];
        for term in self.tokenizer.terms(doc) {
            if let Some(&i) = self.index.get(&term) {
                v[i] += self.idf[i];
            }
        }
        let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v
    }
}
