//! Tagged sets of alternative text matchers.
//!
//! A TUI gives no structured "ready" or "busy" event, so state is inferred by
//! looking for any one of several fragments in the accumulated output.

use crate::Result;
use regex::Regex;

/// One alternative in a [`PatternSet`].
#[derive(Debug, Clone)]
pub enum Pattern {
    Literal(String),
    Regex(Regex),
}

impl Pattern {
    pub fn literal(text: impl Into<String>) -> Self {
        Pattern::Literal(text.into())
    }

    pub fn regex(source: &str) -> Result<Self> {
        Ok(Pattern::Regex(Regex::new(source)?))
    }

    pub fn is_match(&self, haystack: &str) -> bool {
        match self {
            Pattern::Literal(text) => !text.is_empty() && haystack.contains(text.as_str()),
            Pattern::Regex(re) => re.is_match(haystack),
        }
    }

    /// Human-readable form, used in logs.
    pub fn tag(&self) -> &str {
        match self {
            Pattern::Literal(text) => text,
            Pattern::Regex(re) => re.as_str(),
        }
    }
}

/// Ordered alternatives; the first one that matches wins.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<Pattern>,
}

impl PatternSet {
    /// Build a set of literal substrings.
    pub fn literals<S: AsRef<str>>(items: &[S]) -> Self {
        Self {
            patterns: items
                .iter()
                .map(|s| Pattern::literal(s.as_ref()))
                .collect(),
        }
    }

    /// Literal fragments first, then regexes, in the order given.
    pub fn markers<S: AsRef<str>>(literals: &[S], regexes: &[S]) -> Result<Self> {
        let mut set = Self::literals(literals);
        for source in regexes {
            set.push(Pattern::regex(source.as_ref())?);
        }
        Ok(set)
    }

    pub fn push(&mut self, pattern: Pattern) {
        self.patterns.push(pattern);
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Tag of the first pattern found in `haystack`.
    pub fn find(&self, haystack: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|p| p.is_match(haystack))
            .map(|p| p.tag())
    }
}
