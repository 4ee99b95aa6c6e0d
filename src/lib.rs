// Detector Batch - Core Library
// CSV batch reconciler for event detectors, shared by the CLI, the API server and tests

pub mod config;
pub mod error;
pub mod detector;
pub mod store;      // Persistence + audit trail
pub mod parser;     // Header check, lazy record stream
pub mod rules;      // Field validator
pub mod resolver;   // XID lookup + identifier guard
pub mod applier;    // Delta, server validation, commit
pub mod reporter;   // Per-record outcomes, final line
pub mod jobs;       // create / edit / delete / export

// Re-export commonly used types
pub use config::{BlankPolicy, EmptyInputPolicy, QuotePolicy, RunConfig, WhitespacePolicy};
pub use error::{ErrorKind, RecordError, RecordFailure, RunFatalError, StoreError};
pub use detector::{
    AlarmLevel, DataPoint, DataPointType, DetectorType, DurationUnit, EventDetector, EventHandler,
    StateSetting,
};
pub use store::{
    DetectorStore, Event, SqliteStore, SeedCounts, SeedFixture,
    setup_database, insert_event, get_events_for_entity,
};
pub use parser::{BatchRecord, ColumnSchema, RecordParser};
pub use rules::{Field, FieldKind, FieldRule, FieldState, ValidatedRecord};
pub use applier::{Change, ChangePlan};
pub use reporter::{OutcomeTag, RunOutcome, RunReporter, RunSummary};
pub use jobs::{
    BatchJob, CreateJob, DeleteJob, EditJob, Operation,
    DigestReader, export_edit_csv, input_digest, record_batch_run, run_batch, run_job, template_header,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
