//! Free-text keyword extraction shared by vendor registration and search.

use std::collections::HashSet;
use std::fmt;

pub const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "is", "are", "was", "were", "i", "you", "my", "your", "do", "does", "need", "want",
    "looking", "find", "get", "have", "has", "can", "could", "would", "should", "will", "am",
];

/// Tokens of this many characters or fewer are dropped.
pub const MIN_DROPPED_LEN: usize = 2;

/// Distinct keywords in first-occurrence order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeywordSet {
    ordered: Vec<String>,
}

impl KeywordSet {
    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.ordered.iter().any(|existing| existing == keyword)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ordered.iter().map(String::as_str)
    }

    /// Single-space join in scan order; re-extracting the result yields the same set.
    pub fn join(&self) -> String {
        self.ordered.join(" ")
    }

    fn push(&mut self, seen: &mut HashSet<String>, keyword: String) {
        if seen.insert(keyword.clone()) {
            self.ordered.push(keyword);
        }
    }
}

impl fmt::Display for KeywordSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.join())
    }
}

pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(&token)
}

pub fn extract_keywords(text: &str) -> KeywordSet {
    let lowered = text.to_lowercase();
    let mut keywords = KeywordSet::default();
    let mut seen = HashSet::new();

    for token in lowered.split(|c: char| !c.is_alphanumeric()) {
        if token.chars().count() <= MIN_DROPPED_LEN || is_stopword(token) {
            continue;
        }
        keywords.push(&mut seen, token.to_owned());
    }

    keywords
}
