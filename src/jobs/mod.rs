// 🔁 Batch Jobs - The record loop shared by create / edit / delete
//
// Parser → (per record) Validator → Resolver → Applier → Reporter.
// RunFatalError escapes the loop; RecordFailure never does.

pub mod create;
pub mod delete;
pub mod edit;
pub mod export;

use crate::config::{EmptyInputPolicy, RunConfig};
use crate::error::{RecordFailure, RunFatalError, StoreError};
use crate::parser::{ColumnSchema, RecordParser};
use crate::reporter::{OutcomeTag, RunOutcome, RunReporter, RunSummary};
use crate::rules::{validate_record, CrossRule, FieldRule, ValidatedRecord};
use crate::store::{DetectorStore, Event, ACTOR, ENTITY_BATCH_RUN};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::Read;
use std::str::FromStr;
use tracing::{info, warn};

pub use create::CreateJob;
pub use delete::DeleteJob;
pub use edit::EditJob;
pub use export::export_edit_csv;

pub const NOUN: &str = "event detectors";

// ============================================================================
// OPERATION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Edit,
    Delete,
}

impl Operation {
    pub const ALL: [Operation; 3] = [Operation::Create, Operation::Edit, Operation::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Edit => "edit",
            Operation::Delete => "delete",
        }
    }

    /// Verb used in the final report line
    pub fn verb(&self) -> &'static str {
        match self {
            Operation::Create => "creating",
            Operation::Edit => "editing",
            Operation::Delete => "deleting",
        }
    }

    pub fn job(&self) -> Box<dyn BatchJob> {
        match self {
            Operation::Create => Box::new(CreateJob),
            Operation::Edit => Box::new(EditJob),
            Operation::Delete => Box::new(DeleteJob),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "create" => Ok(Operation::Create),
            "edit" => Ok(Operation::Edit),
            "delete" => Ok(Operation::Delete),
            other => Err(format!("unknown operation: {} (expected create, edit or delete)", other)),
        }
    }
}

// ============================================================================
// JOB CONTRACT
// ============================================================================

/// Result of one successfully handled record
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    pub tag: OutcomeTag,
    pub xid: String,
    pub message: Option<String>,
}

impl Applied {
    pub fn new(tag: OutcomeTag, xid: &str, message: impl Into<String>) -> Self {
        Applied {
            tag,
            xid: xid.to_string(),
            message: Some(message.into()),
        }
    }
}

pub trait BatchJob {
    fn operation(&self) -> Operation;

    fn schema(&self) -> ColumnSchema;

    fn rules(&self) -> Vec<FieldRule>;

    /// Evaluated after every field rule passed
    fn cross_rules(&self) -> Vec<CrossRule> {
        Vec::new()
    }

    /// Column that identifies a record in logs, even when validation fails
    fn key_column(&self) -> &'static str;

    /// Resolve and apply one validated record
    fn process(
        &self,
        record: &ValidatedRecord,
        store: &dyn DetectorStore,
        config: &RunConfig,
    ) -> Result<Applied, RecordFailure>;
}

// ============================================================================
// RECORD LOOP
// ============================================================================

/// Run one batch of the given operation over `input`
pub fn run_batch<R: Read>(
    input: R,
    operation: Operation,
    config: &RunConfig,
    store: &dyn DetectorStore,
) -> Result<RunSummary, RunFatalError> {
    let job = operation.job();
    run_job(input, job.as_ref(), config, store)
}

pub fn run_job<R: Read>(
    input: R,
    job: &dyn BatchJob,
    config: &RunConfig,
    store: &dyn DetectorStore,
) -> Result<RunSummary, RunFatalError> {
    // Configuration and header problems abort before any mutation
    config.validate()?;
    let mut parser = RecordParser::new(input, job.schema(), config)?;

    let operation = job.operation();
    let rules = job.rules();
    let cross_rules = job.cross_rules();
    let mut reporter = RunReporter::new(operation.verb(), NOUN, config.progress_every, config.dry_run);

    info!(operation = %operation, dry_run = config.dry_run, "Starting batch");

    while let Some(item) = parser.next() {
        let outcome = match item {
            Err(err) => RunOutcome::failed(parser.records_read(), None, err.into()),
            Ok(record) => {
                let key = record
                    .get(job.key_column())
                    .filter(|v| !v.is_empty() && !config.is_sentinel(v))
                    .map(str::to_string);

                let result = validate_record(&record, &rules, &cross_rules, config)
                    .map_err(RecordFailure::from)
                    .and_then(|validated| job.process(&validated, store, config));

                match result {
                    Ok(applied) => {
                        RunOutcome::success(record.index, Some(applied.xid), applied.tag, applied.message)
                    }
                    Err(failure) => RunOutcome::failed(record.index, key, failure),
                }
            }
        };
        reporter.record(outcome);
    }

    let summary = reporter.finish();
    if summary.total == 0 {
        match config.empty_input {
            EmptyInputPolicy::Fail => return Err(RunFatalError::EmptyInput),
            EmptyInputPolicy::Succeed => warn!("Input contains no data rows, nothing to do"),
        }
    }

    info!(
        operation = %operation,
        total = summary.total,
        processed = summary.processed,
        failed = summary.failed,
        "Batch finished"
    );
    Ok(summary)
}

// ============================================================================
// HELPERS
// ============================================================================

/// Header row for a job's input file
pub fn template_header(operation: Operation, delimiter: char) -> String {
    operation.job().schema().header_line(delimiter)
}

/// SHA-256 of the raw input, used to tie audit events to a file
pub fn input_digest(input: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input);
    format!("{:x}", hasher.finalize())
}

/// Hashes bytes as the parser pulls them, so large inputs stay streamed
pub struct DigestReader<R> {
    inner: R,
    hasher: Sha256,
}

impl<R: Read> DigestReader<R> {
    pub fn new(inner: R) -> Self {
        DigestReader {
            inner,
            hasher: Sha256::new(),
        }
    }

    /// Hex digest of everything read so far
    pub fn finish(self) -> String {
        format!("{:x}", self.hasher.finalize())
    }
}

impl<R: Read> Read for DigestReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }
}

/// Audit the run itself, keyed by the input digest
pub fn record_batch_run(
    store: &dyn DetectorStore,
    operation: Operation,
    digest: &str,
    summary: &RunSummary,
) -> Result<(), StoreError> {
    let event = Event::new(
        "batch_run",
        ENTITY_BATCH_RUN,
        digest,
        serde_json::json!({
            "operation": operation.as_str(),
            "total": summary.total,
            "processed": summary.processed,
            "failed": summary.failed,
            "dry_run": summary.dry_run,
        }),
        ACTOR,
    );
    store.record_event(&event)
}

// ============================================================================
// TESTS
// ============================================================================
