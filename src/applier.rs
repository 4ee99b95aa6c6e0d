// 🔧 Change Applier - Delta, server validation, commit, reload
//
// A ChangePlan only ever holds changes that differ from the current entity,
// so applying the same batch twice converges instead of drifting.

use crate::config::RunConfig;
use crate::detector::{AlarmLevel, DataPoint, DetectorType, DurationUnit, EventDetector};
use crate::error::{ErrorKind, RecordError};
use crate::store::DetectorStore;
use tracing::{debug, warn};

// ============================================================================
// CHANGES
// ============================================================================

/// One property mutation, dispatched by variant
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Name(String),
    AlarmLevel(AlarmLevel),
    Limit(Option<f64>),
    ResetLimit(Option<f64>),
    UseResetLimit(bool),
    Low(Option<f64>),
    High(Option<f64>),
    WithinRange(bool),
    State {
        state: Option<i32>,
        states: Option<Vec<i32>>,
    },
    Inverted(bool),
    Duration(i64),
    DurationType(DurationUnit),
    /// Full resulting handler list after link/unlink
    Handlers(Vec<String>),
}

impl Change {
    pub fn name(&self) -> &'static str {
        match self {
            Change::Name(_) => "name",
            Change::AlarmLevel(_) => "alarmLevel",
            Change::Limit(_) => "limit",
            Change::ResetLimit(_) => "resetLimit",
            Change::UseResetLimit(_) => "useResetLimit",
            Change::Low(_) => "low",
            Change::High(_) => "high",
            Change::WithinRange(_) => "withinRange",
            Change::State { .. } => "state",
            Change::Inverted(_) => "inverted",
            Change::Duration(_) => "duration",
            Change::DurationType(_) => "durationType",
            Change::Handlers(_) => "eventHandlerXids",
        }
    }

    pub fn apply(&self, detector: &mut EventDetector) {
        match self {
            Change::Name(v) => detector.name = v.clone(),
            Change::AlarmLevel(v) => detector.alarm_level = *v,
            Change::Limit(v) => detector.limit = *v,
            Change::ResetLimit(v) => detector.reset_limit = *v,
            Change::UseResetLimit(v) => detector.use_reset_limit = *v,
            Change::Low(v) => detector.low = *v,
            Change::High(v) => detector.high = *v,
            Change::WithinRange(v) => detector.within_range = *v,
            Change::State { state, states } => {
                detector.state = *state;
                detector.states = states.clone();
            }
            Change::Inverted(v) => detector.inverted = *v,
            Change::Duration(v) => detector.duration = *v,
            Change::DurationType(v) => detector.duration_type = *v,
            Change::Handlers(v) => detector.event_handler_xids = v.clone(),
        }
    }

    /// True when applying would leave the detector as it is
    pub fn is_noop(&self, detector: &EventDetector) -> bool {
        let mut candidate = detector.clone();
        self.apply(&mut candidate);
        candidate == *detector
    }
}

// ============================================================================
// CHANGE PLAN
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangePlan {
    changes: Vec<Change>,
}

impl ChangePlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep the change only if it differs from `current`
    pub fn push(&mut self, change: Change, current: &EventDetector) {
        self.changes.retain(|c| c.name() != change.name());
        if change.is_noop(current) {
            debug!(property = change.name(), "Value already current, skipping");
            return;
        }
        self.changes.push(change);
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn property_names(&self) -> Vec<&'static str> {
        self.changes.iter().map(|c| c.name()).collect()
    }

    pub fn apply_to(&self, detector: &mut EventDetector) {
        for change in &self.changes {
            change.apply(detector);
        }
    }
}

// ============================================================================
// ASSOCIATIVE FIELDS
// ============================================================================

/// Union: existing order kept, new XIDs appended
pub fn link_handlers(current: &[String], to_link: &[String]) -> Vec<String> {
    let mut result = current.to_vec();
    for xid in to_link {
        if !result.contains(xid) {
            result.push(xid.clone());
        }
    }
    result
}

/// Set difference. XIDs that were not linked are reported back.
pub fn unlink_handlers(current: &[String], to_remove: &[String]) -> (Vec<String>, Vec<String>) {
    let result = current
        .iter()
        .filter(|xid| !to_remove.contains(xid))
        .cloned()
        .collect();
    let not_linked = to_remove
        .iter()
        .filter(|xid| !current.contains(xid))
        .cloned()
        .collect();
    (result, not_linked)
}

// ============================================================================
// APPLY
// ============================================================================

/// Build a new detector from the type template with the plan applied
pub fn build_from_template(
    detector_type: DetectorType,
    point: &DataPoint,
    plan: &ChangePlan,
) -> EventDetector {
    let mut detector = EventDetector::template(detector_type, point);
    plan.apply_to(&mut detector);
    if detector_type != DetectorType::Update {
        detector.reset_duration = 0;
        detector.reset_duration_type = DurationUnit::Seconds;
    }
    detector
}

/// Server-side semantic validation; any message fails the record
pub fn server_validate(store: &dyn DetectorStore, detector: &EventDetector) -> Result<(), RecordError> {
    let messages = store
        .validate(detector)
        .map_err(|e| RecordError::new(ErrorKind::StoreUnavailable, e.to_string()))?;

    if messages.is_empty() {
        Ok(())
    } else {
        Err(RecordError::new(
            ErrorKind::ServerValidationFailed,
            format!("Validation failed for {}: {}", detector.xid, messages.join("; ")),
        ))
    }
}

/// Insert a freshly built detector. Returns it with its assigned id.
pub fn commit_create(
    store: &dyn DetectorStore,
    mut detector: EventDetector,
    config: &RunConfig,
) -> Result<EventDetector, RecordError> {
    server_validate(store, &detector)?;
    if config.dry_run {
        return Ok(detector);
    }

    store
        .insert(&mut detector)
        .map_err(|e| e.into_commit_error())?;

    reload_parent(store, &detector, config);
    Ok(detector)
}

/// Apply the plan to a copy of `current`, validate and commit it
pub fn commit_update(
    store: &dyn DetectorStore,
    current: &EventDetector,
    plan: &ChangePlan,
    config: &RunConfig,
) -> Result<EventDetector, RecordError> {
    let mut updated = current.clone();
    plan.apply_to(&mut updated);

    server_validate(store, &updated)?;
    if config.dry_run {
        return Ok(updated);
    }

    store
        .update(&current.xid, &updated)
        .map_err(|e| e.into_commit_error())?;

    reload_parent(store, &updated, config);
    Ok(updated)
}

pub fn commit_delete(
    store: &dyn DetectorStore,
    detector: &EventDetector,
    config: &RunConfig,
) -> Result<(), RecordError> {
    if config.dry_run {
        return Ok(());
    }
    store
        .delete(&detector.xid)
        .map_err(|e| e.into_commit_error())
}

/// Refresh the owning data point. Failure here never fails the record.
fn reload_parent(store: &dyn DetectorStore, detector: &EventDetector, config: &RunConfig) {
    if !config.reload_after_commit {
        return;
    }
    if let Err(e) = store.reload_data_point(detector.data_point_id) {
        warn!(xid = %detector.xid, data_point_id = detector.data_point_id, error = %e, "Data point reload failed");
    }
}

// ============================================================================
// TESTS
// ============================================================================
