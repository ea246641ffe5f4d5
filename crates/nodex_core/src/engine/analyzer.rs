//! Analyzers turning indexed values into terms.
//!
//! Two analyzers are provided:
//! - [`Analyzer::Keyword`]: the whole value is one term (exact indexes)
//! - [`Analyzer::Standard`]: whitespace/punctuation tokenization (fulltext)
//!
//! Both honour the [`TokenizerConfig`] case folding setting.

use serde::{Deserialize, Serialize};

/// Configuration for the tokenizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenizerConfig {
    /// Minimum token length to index.
    pub min_token_length: usize,
    /// Maximum token length to index.
    pub max_token_length: usize,
    /// Whether terms are lower-cased before indexing and querying.
    pub case_insensitive: bool,
    /// Additional characters to treat as separators.
    pub extra_separators: Vec<char>,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            min_token_length: 1,
            max_token_length: 256,
            case_insensitive: true,
            extra_separators: vec![],
        }
    }
}

impl TokenizerConfig {
    /// Creates a new tokenizer configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets minimum token length.
    #[must_use]
    pub fn min_length(mut self, len: usize) -> Self {
        self.min_token_length = len;
        self
    }

    /// Sets maximum token length.
    #[must_use]
    pub fn max_length(mut self, len: usize) -> Self {
        self.max_token_length = len;
        self
    }

    /// Makes matching case sensitive.
    #[must_use]
    pub fn case_sensitive(mut self) -> Self {
        self.case_insensitive = false;
        self
    }

    /// Adds extra separator characters.
    #[must_use]
    pub fn with_separators(mut self, chars: &[char]) -> Self {
        self.extra_separators.extend_from_slice(chars);
        self
    }
}

/// How values are split into terms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Analyzer {
    /// The whole value is a single term.
    #[default]
    Keyword,
    /// Split on whitespace, ASCII punctuation and configured separators.
    Standard,
}

impl Analyzer {
    /// Analyzes a term string into index terms.
    #[must_use]
    pub fn analyze(self, text: &str, config: &TokenizerConfig) -> Vec<String> {
        match self {
            Analyzer::Keyword => vec![normalize(text, config)],
            Analyzer::Standard => tokenize(text, config),
        }
    }

    /// Normalizes a prefix the way indexed terms were normalized.
    #[must_use]
    pub fn normalize(self, text: &str, config: &TokenizerConfig) -> String {
        normalize(text, config)
    }
}

fn normalize(text: &str, config: &TokenizerConfig) -> String {
    if config.case_insensitive {
        text.to_lowercase()
    } else {
        text.to_string()
    }
}

fn tokenize(text: &str, config: &TokenizerConfig) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();

    let flush = |current: &mut String, tokens: &mut Vec<String>| {
        if current.is_empty() {
            return;
        }
        let len = current.chars().count();
        if len >= config.min_token_length && len <= config.max_token_length {
            tokens.push(normalize(current, config));
        }
        current.clear();
    };

    for c in text.chars() {
        let is_separator = c.is_whitespace()
            || c.is_ascii_punctuation()
            || config.extra_separators.contains(&c);

        if is_separator {
            flush(&mut current, &mut tokens);
        } else {
            current.push(c);
        }
    }
    flush(&mut current, &mut tokens);

    tokens
}
