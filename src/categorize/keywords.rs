// src/categorize/keywords.rs
//! Keyword table scoring.
//!
//! Each keyword is a whole-word match. Within a category, longer keywords are
//! matched first and claim their spans; a shorter keyword only counts when it
//! has a match outside the claimed spans, so "hip hop" and "hop" never both
//! score on the same words. A keyword counts at most once per text.

use super::classifier::LabelScores;
use super::normalize::TextNormalizer;
use crate::config::settings::CategoryKeywords;
use anyhow::Context;
use regex::Regex;

#[derive(Debug, Clone)]
struct CompiledKeyword {
    keyword: String,
    re: Regex,
    weight: f64,
}

#[derive(Debug, Clone)]
struct CompiledCategory {
    name: String,
    keywords: Vec<CompiledKeyword>,
}

#[derive(Debug, Clone)]
pub struct KeywordScorer {
    categories: Vec<CompiledCategory>,
}

impl KeywordScorer {
    /// Compile the table. Keywords are passed through `normalizer` so that
    /// they look exactly like the text they are matched against.
    pub fn new(table: &[CategoryKeywords], normalizer: &TextNormalizer) -> anyhow::Result<Self> {
        let mut categories = Vec::with_capacity(table.len());
        for cat in table {
            let mut keywords = Vec::with_capacity(cat.keywords.len());
            for (raw, &weight) in &cat.keywords {
                let keyword = normalizer.normalize(&[Some(raw.as_str())]);
                if keyword.is_empty() {
                    continue;
                }
                let re = Regex::new(&format!(r"\b{}\b", regex::escape(&keyword)))
                    .with_context(|| format!("compiling keyword `{raw}` of `{}`", cat.name))?;
                keywords.push(CompiledKeyword { keyword, re, weight });
            }
            // longest first; ties by keyword so HashMap order never leaks out
            keywords.sort_by(|a, b| {
                b.keyword
                    .chars()
                    .count()
                    .cmp(&a.keyword.chars().count())
                    .then_with(|| a.keyword.cmp(&b.keyword))
            });
            categories.push(CompiledCategory {
                name: cat.name.clone(),
                keywords,
            });
        }
        Ok(Self { categories })
    }

    /// Category names in table order.
    pub fn category_names(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|c| c.name.as_str())
    }

    /// Per-category keyword totals for already-normalized `text`, rounded to
    /// 3 decimals. Categories without a match are absent.
    pub fn score(&self, text: &str) -> LabelScores {
        let mut out = LabelScores::new();
        for cat in &self.categories {
            let mut claimed: Vec<(usize, usize)> = Vec::new();
            let mut total = 0.0;
            for kw in &cat.keywords {
                let fresh: Vec<(usize, usize)> = kw
                    .re
                    .find_iter(text)
                    .map(|m| (m.start(), m.end()))
                    .filter(|&(s, e)| !claimed.iter().any(|&(cs, ce)| s < ce && cs < e))
                    .collect();
                if fresh.is_empty() {
                    continue;
                }
                total += kw.weight;
                claimed.extend(fresh);
            }
            if total > 0.0 {
                out.insert(cat.name.clone(), round3(total));
            }
        }
        out
    }
}

pub fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}
