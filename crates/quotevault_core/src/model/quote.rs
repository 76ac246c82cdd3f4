//! Quote domain model.
//!
//! # Responsibility
//! - Define the quote record and its construction-time validation.
//! - Provide the default seed set used when storage is empty.
//!
//! # Invariants
//! - `text` and `category` are non-empty after trimming.
//! - `category` is stored lowercase; category comparison is byte equality.
//! - Merge identity is exact case-insensitive `text` equality (`text_key`).

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Origin of a quote record.
///
/// Local entries are user-authored; server entries were merged or accepted
/// during a reconciliation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    #[default]
    Local,
    Server,
}

impl Provenance {
    /// True for the default provenance, used to keep exported JSON of
    /// purely local quotes down to plain `{text, category}` pairs.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local)
    }
}

/// Validation failure for manual quote input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteValidationError {
    EmptyText,
    EmptyCategory,
}

impl Display for QuoteValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyText => write!(f, "quote text must not be empty"),
            Self::EmptyCategory => write!(f, "quote category must not be empty"),
        }
    }
}

impl Error for QuoteValidationError {}

/// Canonical quote record.
///
/// Optional fields carry remote metadata and are omitted from serialized
/// output when absent, so a local-only collection round-trips as an array
/// of `{text, category}` objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub text: String,
    /// Always lowercase.
    pub category: String,
    #[serde(default, skip_serializing_if = "Provenance::is_local")]
    pub source: Provenance,
    /// Identifier assigned by the remote source, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<i64>,
    /// Unix epoch milliseconds of the last remote observation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_at_ms: Option<i64>,
}

impl Quote {
    /// Creates a local quote from user input.
    ///
    /// Trims both fields and lowercases the category.
    ///
    /// # Errors
    /// - `EmptyText` / `EmptyCategory` when a field is empty after trimming.
    pub fn new(
        text: impl AsRef<str>,
        category: impl AsRef<str>,
    ) -> Result<Self, QuoteValidationError> {
        let text = text.as_ref().trim();
        if text.is_empty() {
            return Err(QuoteValidationError::EmptyText);
        }
        let category = category.as_ref().trim().to_lowercase();
        if category.is_empty() {
            return Err(QuoteValidationError::EmptyCategory);
        }

        Ok(Self {
            text: text.to_string(),
            category,
            source: Provenance::Local,
            server_id: None,
            observed_at_ms: None,
        })
    }

    /// Creates a server-observed quote, as produced by the reconciliation
    /// engine's record mapping.
    pub fn from_server(
        text: impl AsRef<str>,
        category: impl AsRef<str>,
        server_id: Option<i64>,
        observed_at_ms: i64,
    ) -> Result<Self, QuoteValidationError> {
        let mut quote = Self::new(text, category)?;
        quote.source = Provenance::Server;
        quote.server_id = server_id;
        quote.observed_at_ms = Some(observed_at_ms);
        Ok(quote)
    }

    /// Merge identity: exact case-insensitive text equality.
    ///
    /// Distinct from the fuzzy similarity used for conflict detection —
    /// the two notions must not be unified.
    pub fn text_key(&self) -> String {
        self.text.to_lowercase()
    }
}

/// Seed collection persisted on first start when storage holds no quotes.
pub fn default_quotes() -> Vec<Quote> {
    const SEED: [(&str, &str); 10] = [
        (
            "The only way to do great work is to love what you do.",
            "motivation",
        ),
        (
            "Innovation distinguishes between a leader and a follower.",
            "innovation",
        ),
        (
            "Life is what happens to you while you're busy making other plans.",
            "life",
        ),
        (
            "The future belongs to those who believe in the beauty of their dreams.",
            "dreams",
        ),
        (
            "It is during our darkest moments that we must focus to see the light.",
            "inspiration",
        ),
        (
            "Success is not final, failure is not fatal: it is the courage to continue that counts.",
            "success",
        ),
        (
            "The only impossible journey is the one you never begin.",
            "motivation",
        ),
        ("Creativity is intelligence having fun.", "creativity"),
        (
            "The best time to plant a tree was 20 years ago. The second best time is now.",
            "wisdom",
        ),
        (
            "Don't watch the clock; do what it does. Keep going.",
            "perseverance",
        ),
    ];

    SEED.iter()
        .map(|(text, category)| Quote {
            text: (*text).to_string(),
            category: (*category).to_string(),
            source: Provenance::Local,
            server_id: None,
            observed_at_ms: None,
        })
        .collect()
}
