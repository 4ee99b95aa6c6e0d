// ⚙️ Run Configuration - Policies as data
// Everything that differed between script revisions is a knob here.

use crate::error::RunFatalError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

// ============================================================================
// POLICIES
// ============================================================================

/// How whitespace inside a header or value cell is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WhitespacePolicy {
    /// Leave the text as-is
    Keep,
    /// Trim leading and trailing whitespace
    Trim,
    /// Trim, then collapse internal runs to a single space
    Collapse,
    /// Remove every whitespace character
    Remove,
}

impl WhitespacePolicy {
    pub fn apply(&self, text: &str) -> String {
        match self {
            WhitespacePolicy::Keep => text.to_string(),
            WhitespacePolicy::Trim => text.trim().to_string(),
            WhitespacePolicy::Collapse => text.split_whitespace().collect::<Vec<_>>().join(" "),
            WhitespacePolicy::Remove => text.chars().filter(|c| !c.is_whitespace()).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotePolicy {
    /// Only the CSV reader's own quote handling
    Standard,
    /// Additionally strip one surrounding matched pair of `"` or `'`
    StripMatched,
}

impl QuotePolicy {
    pub fn apply<'a>(&self, text: &'a str) -> &'a str {
        match self {
            QuotePolicy::Standard => text,
            QuotePolicy::StripMatched => {
                let bytes = text.as_bytes();
                if bytes.len() >= 2 {
                    let first = bytes[0];
                    let last = bytes[bytes.len() - 1];
                    if first == last && (first == b'"' || first == b'\'') {
                        return &text[1..text.len() - 1];
                    }
                }
                text
            }
        }
    }
}

/// Meaning of a blank cell in an optional edit column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlankPolicy {
    /// Blank behaves like the sentinel: leave the property alone
    Unchanged,
    /// Blank resets the property to the detector-type default
    Clear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyInputPolicy {
    /// Header-only input is a logged no-op
    Succeed,
    /// Header-only input aborts with EmptyInput
    Fail,
}

// ============================================================================
// RUN CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Primary field delimiter
    pub delimiter: char,

    /// Delimiter for sub-lists inside one cell (handler XIDs, state values)
    pub list_delimiter: char,

    /// Literal meaning "leave unchanged"
    pub sentinel: String,

    pub blank_policy: BlankPolicy,
    pub header_whitespace: WhitespacePolicy,
    pub value_whitespace: WhitespacePolicy,
    pub quote_policy: QuotePolicy,

    /// Accept headers that only differ in case (logged as a warning)
    pub case_insensitive_headers: bool,

    pub empty_input: EmptyInputPolicy,

    /// Ask the store to reload the parent data point after each commit
    pub reload_after_commit: bool,

    /// Emit a progress line every N records (0 disables)
    pub progress_every: usize,

    /// Plan every change but never commit
    pub dry_run: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RunConfig {
    pub fn new() -> Self {
        RunConfig {
            delimiter: ',',
            list_delimiter: ';',
            sentinel: "EMPTY".to_string(),
            blank_policy: BlankPolicy::Unchanged,
            header_whitespace: WhitespacePolicy::Remove,
            value_whitespace: WhitespacePolicy::Trim,
            quote_policy: QuotePolicy::StripMatched,
            case_insensitive_headers: true,
            empty_input: EmptyInputPolicy::Succeed,
            reload_after_commit: true,
            progress_every: 10,
            dry_run: false,
        }
    }

    /// Load a config from a JSON file. Missing keys fall back to defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, RunFatalError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            RunFatalError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, RunFatalError> {
        serde_json::from_str(content).map_err(|e| RunFatalError::Config(e.to_string()))
    }

    // Builders

    pub fn with_delimiters(mut self, delimiter: char, list_delimiter: char) -> Self {
        self.delimiter = delimiter;
        self.list_delimiter = list_delimiter;
        self
    }

    pub fn with_blank_policy(mut self, policy: BlankPolicy) -> Self {
        self.blank_policy = policy;
        self
    }

    pub fn with_empty_input(mut self, policy: EmptyInputPolicy) -> Self {
        self.empty_input = policy;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Checked once per run, before any input is read
    pub fn validate(&self) -> Result<(), RunFatalError> {
        if self.delimiter == self.list_delimiter {
            return Err(RunFatalError::InvalidDelimiter(format!(
                "list delimiter '{}' must differ from the field delimiter",
                self.list_delimiter
            )));
        }
        if !self.delimiter.is_ascii() {
            return Err(RunFatalError::InvalidDelimiter(format!(
                "field delimiter '{}' must be a single ASCII character",
                self.delimiter
            )));
        }
        if self.list_delimiter.is_whitespace() || self.list_delimiter == '"' {
            return Err(RunFatalError::InvalidDelimiter(format!(
                "list delimiter '{}' is not usable",
                self.list_delimiter
            )));
        }
        Ok(())
    }

    /// Sentinel check after value normalization
    pub fn is_sentinel(&self, value: &str) -> bool {
        value == self.sentinel
    }

    /// Normalize one data cell: quotes first, then whitespace
    pub fn clean_value(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        let unquoted = self.quote_policy.apply(trimmed);
        if unquoted.len() != trimmed.len() {
            self.value_whitespace.apply(unquoted)
        } else {
            self.value_whitespace.apply(raw)
        }
    }

    /// Normalize one header cell
    pub fn clean_header(&self, raw: &str) -> String {
        let unquoted = self.quote_policy.apply(raw.trim());
        self.header_whitespace.apply(unquoted)
    }

    /// Split a list cell on the list delimiter, dropping empty items
    pub fn split_list(&self, value: &str) -> Vec<String> {
        value
            .split(self.list_delimiter)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect()
    }
}

// ============================================================================
// TESTS
// ============================================================================
