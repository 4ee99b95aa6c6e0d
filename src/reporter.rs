// 📊 Run Reporter - Per-record outcomes → RunSummary
// The summary is a plain value threaded through the loop and returned at the end.

use crate::error::{RecordError, RecordFailure};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeTag {
    Created,
    Updated,
    Deleted,
    Skipped,
    Failed,
}

impl OutcomeTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeTag::Created => "CREATED",
            OutcomeTag::Updated => "UPDATED",
            OutcomeTag::Deleted => "DELETED",
            OutcomeTag::Skipped => "SKIPPED",
            OutcomeTag::Failed => "FAILED",
        }
    }
}

impl fmt::Display for OutcomeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// RUN OUTCOME
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    /// 1-based record index
    pub record: usize,
    /// Declared external id, when the row had one
    pub xid: Option<String>,
    pub tag: OutcomeTag,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<RecordError>,
}

impl RunOutcome {
    pub fn success(record: usize, xid: Option<String>, tag: OutcomeTag, message: Option<String>) -> Self {
        RunOutcome {
            record,
            xid,
            tag,
            message,
            errors: Vec::new(),
        }
    }

    pub fn failed(record: usize, xid: Option<String>, failure: RecordFailure) -> Self {
        RunOutcome {
            record,
            xid,
            tag: OutcomeTag::Failed,
            message: Some(failure.to_string()),
            errors: failure.errors,
        }
    }
}

// ============================================================================
// RUN SUMMARY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Past-progressive verb for the final line ("editing")
    pub verb: String,
    /// Plural noun for the final line ("event detectors")
    pub noun: String,
    pub total: usize,
    /// Records that did not fail
    pub processed: usize,
    pub failed: usize,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub skipped: usize,
    pub dry_run: bool,
    pub outcomes: Vec<RunOutcome>,
}

impl RunSummary {
    pub fn new(verb: &str, noun: &str, dry_run: bool) -> Self {
        RunSummary {
            verb: verb.to_string(),
            noun: noun.to_string(),
            total: 0,
            processed: 0,
            failed: 0,
            created: 0,
            updated: 0,
            deleted: 0,
            skipped: 0,
            dry_run,
            outcomes: Vec::new(),
        }
    }

    pub fn count(&self, tag: OutcomeTag) -> usize {
        match tag {
            OutcomeTag::Created => self.created,
            OutcomeTag::Updated => self.updated,
            OutcomeTag::Deleted => self.deleted,
            OutcomeTag::Skipped => self.skipped,
            OutcomeTag::Failed => self.failed,
        }
    }

    fn tally(&mut self, outcome: RunOutcome) {
        self.total += 1;
        match outcome.tag {
            OutcomeTag::Created => self.created += 1,
            OutcomeTag::Updated => self.updated += 1,
            OutcomeTag::Deleted => self.deleted += 1,
            OutcomeTag::Skipped => self.skipped += 1,
            OutcomeTag::Failed => self.failed += 1,
        }
        if outcome.tag != OutcomeTag::Failed {
            self.processed += 1;
        }
        self.outcomes.push(outcome);
    }

    /// `Finished <verb> <processed> out of <total> <noun> with <failed> errors`
    pub fn final_line(&self) -> String {
        let line = format!(
            "Finished {} {} out of {} {} with {} errors",
            self.verb, self.processed, self.total, self.noun, self.failed
        );
        if self.dry_run {
            format!("{} (dry run, nothing committed)", line)
        } else {
            line
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

// ============================================================================
// RUN REPORTER
// ============================================================================

/// Accumulates outcomes and logs progress every `progress_every` records
#[derive(Debug)]
pub struct RunReporter {
    summary: RunSummary,
    progress_every: usize,
}

impl RunReporter {
    pub fn new(verb: &str, noun: &str, progress_every: usize, dry_run: bool) -> Self {
        RunReporter {
            summary: RunSummary::new(verb, noun, dry_run),
            progress_every,
        }
    }

    pub fn record(&mut self, outcome: RunOutcome) {
        let xid = outcome.xid.clone().unwrap_or_default();
        match outcome.tag {
            OutcomeTag::Failed => {
                for err in &outcome.errors {
                    error!(
                        record = outcome.record,
                        xid = %xid,
                        kind = %err.kind,
                        field = err.field.as_deref().unwrap_or("-"),
                        "{}",
                        err.message
                    );
                }
            }
            tag => {
                info!(
                    record = outcome.record,
                    xid = %xid,
                    outcome = %tag,
                    "{}",
                    outcome.message.as_deref().unwrap_or("")
                );
            }
        }

        self.summary.tally(outcome);

        if self.progress_every > 0 && self.summary.total % self.progress_every == 0 {
            info!(
                "{} {} {} so far ({} read, {} errors)",
                capitalize(&self.summary.verb),
                self.summary.processed,
                self.summary.noun,
                self.summary.total,
                self.summary.failed
            );
        }
    }

    pub fn finish(self) -> RunSummary {
        self.summary
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ============================================================================
// TESTS
// ============================================================================
