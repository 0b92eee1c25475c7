// src/categorize/normalize.rs
//! Canonical token string for event text.
//!
//! Steps: join fragments with single spaces, decode HTML entities, lower-case,
//! replace every URL with its base domain token, drop characters outside the
//! alphabet (digits included), collapse whitespace.

use crate::config::AlphabetSettings;
use crate::model::Event;
use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::RangeInclusive;

static RE_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(https?://[^\s]+|www\.[^\s]+)").expect("url regex"));
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Set of letters kept by the normalizer (lower-case forms).
#[derive(Debug, Clone)]
pub struct Alphabet {
    ranges: Vec<RangeInclusive<char>>,
    extra: Vec<char>,
}

impl Alphabet {
    pub fn new(ranges: Vec<RangeInclusive<char>>, extra: Vec<char>) -> Self {
        Self { ranges, extra }
    }

    pub fn from_settings(settings: &AlphabetSettings) -> Self {
        Self::new(
            settings.ranges.iter().map(|&(lo, hi)| lo..=hi).collect(),
            settings.extra.clone(),
        )
    }

    pub fn contains(&self, c: char) -> bool {
        self.ranges.iter().any(|r| r.contains(&c)) || self.extra.contains(&c)
    }
}

impl Default for Alphabet {
    fn default() -> Self {
        Self::from_settings(&AlphabetSettings::default())
    }
}

#[derive(Debug, Clone, Default)]
pub struct TextNormalizer {
    alphabet: Alphabet,
}

impl TextNormalizer {
    pub fn new(alphabet: Alphabet) -> Self {
        Self { alphabet }
    }

    /// Normalize a list of optional fragments. `None` and `""` are equivalent.
    pub fn normalize(&self, fragments: &[Option<&str>]) -> String {
        let joined = fragments
            .iter()
            .filter_map(|f| f.map(str::trim))
            .filter(|f| !f.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        let decoded = html_escape::decode_html_entities(&joined).to_lowercase();
        let replaced = RE_URL.replace_all(&decoded, |caps: &regex::Captures| {
            format!(" {} ", base_domain(&caps[0]))
        });

        let filtered: String = replaced
            .chars()
            .map(|c| {
                if c.is_whitespace() || self.alphabet.contains(c) {
                    c
                } else {
                    ' '
                }
            })
            .collect();

        RE_WS.replace_all(&filtered, " ").trim().to_string()
    }

    /// The text fields categorization looks at, in a fixed order.
    pub fn normalize_event(&self, event: &Event) -> String {
        let subtypes = event.venue_subtypes().join(" ");
        self.normalize(&[
            Some(event.name.as_str()),
            event.description.as_deref(),
            event.link.as_deref(),
            Some(event.venue_name()),
            event.publisher.as_deref(),
            Some(subtypes.as_str()),
        ])
    }
}

/// "https://www.ticketsbox.com/x" -> "ticketsbox"; "www.foo.com/a" -> "foo".
fn base_domain(url: &str) -> String {
    let without_scheme = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));

    let host = match without_scheme {
        Some(rest) => rest.split(['/', '?', '#']).next().unwrap_or(""),
        None => url,
    };
    let host = host.strip_prefix("www.").unwrap_or(host);
    // drop credentials and port
    let host = host.rsplit('@').next().unwrap_or(host);
    let host = host.split(':').next().unwrap_or(host);

    let parts: Vec<&str> = host.split('.').collect();
    let token = if parts.len() >= 2 {
        parts[parts.len() - 2]
    } else {
        parts[0]
    };
    token.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n() -> TextNormalizer {
        TextNormalizer::default()
    }

    #[test]
    fn joins_lowercases_and_collapses() {
        let out = n().normalize(&[Some("  Live CONCERT "), None, Some(""), Some("tonight!!")]);
        assert_eq!(out, "live concert tonight");
    }

    #[test]
    fn none_and_empty_are_identical() {
        assert_eq!(
            n().normalize(&[Some("a"), None, Some("b")]),
            n().normalize(&[Some("a"), Some(""), Some("b")])
        );
        assert_eq!(n().normalize(&[]), "");
    }

    #[test]
    fn urls_become_base_domain_tokens() {
        let out = n().normalize(&[Some("Tickets: https://www.ticketsbox.com/event/42?x=1 now")]);
        assert_eq!(out, "tickets ticketsbox now");

        let out = n().normalize(&[Some("see www.kontramarka.ua/uk/")]);
        assert_eq!(out, "see kontramarka");
    }

    #[test]
    fn strips_digits_and_punctuation_keeps_cyrillic() {
        let out = n().normalize(&[Some("Концерт №5 — «Ґрати» 2025, Їжак & Євген")]);
        assert_eq!(out, "концерт ґрати їжак євген");
    }

    #[test]
    fn configured_alphabet_replaces_the_default() {
        let latin = TextNormalizer::new(Alphabet::from_settings(&AlphabetSettings {
            ranges: vec![('a', 'z')],
            extra: vec![],
        }));
        assert_eq!(latin.normalize(&[Some("Jazz Концерт ґала night")]), "jazz night");

        let with_digits = TextNormalizer::new(Alphabet::new(vec!['a'..='z', '0'..='9'], vec![]));
        assert_eq!(with_digits.normalize(&[Some("Room 101, Київ")]), "room 101");
    }

    #[test]
    fn decodes_html_entities() {
        let out = n().normalize(&[Some("Rock&nbsp;&amp;&nbsp;Roll")]);
        assert_eq!(out, "rock roll");
    }

    #[test]
    fn base_domain_edge_cases() {
        assert_eq!(base_domain("https://ternopil.karabas.com/en/index.php"), "karabas");
        assert_eq!(base_domain("http://localhost:8080/x"), "localhost");
        assert_eq!(base_domain("www.foo.com/path"), "foo");
    }
}
