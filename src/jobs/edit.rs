// ✏️ Edit Job - Change only what a row explicitly asks to change

use super::{Applied, BatchJob, Operation};
use crate::applier::{commit_update, link_handlers, unlink_handlers, Change, ChangePlan};
use crate::config::RunConfig;
use crate::detector::{DataPointType, DetectorType, EventDetector, StateSetting};
use crate::error::{ErrorKind, RecordError, RecordFailure};
use crate::parser::ColumnSchema;
use crate::reporter::OutcomeTag;
use crate::resolver::{resolve_detector, resolve_handlers, HandlerLookup};
use crate::rules::{BoolStyle, CrossRule, Field, FieldKind, FieldRule, FieldState, ValidatedRecord};
use crate::store::DetectorStore;
use tracing::{debug, warn};

pub const COLUMNS: [&str; 18] = [
    "eventDetectorId",
    "eventDetectorXid",
    "detectorType",
    "newDetectorName",
    "newAlarmLevel",
    "newLimit",
    "newResetLimit",
    "newUseResetLimit",
    "newLowRangeLimit",
    "newHighRangeLimit",
    "newWithinRange",
    "newStateValues",
    "newStateInverted",
    "newDuration",
    "newDurationType",
    "handlers_to_link",
    "handlers_to_remove",
    "dataPointType",
];

const ANY_FLOAT: FieldKind = FieldKind::Float { min: None, max: None };

#[derive(Debug, Clone, Copy, Default)]
pub struct EditJob;

impl BatchJob for EditJob {
    fn operation(&self) -> Operation {
        Operation::Edit
    }

    fn schema(&self) -> ColumnSchema {
        ColumnSchema::new(&COLUMNS)
    }

    fn rules(&self) -> Vec<FieldRule> {
        vec![
            // Parsed strictly by the identifier guard after lookup
            FieldRule::new("eventDetectorId", Field::DetectorId, FieldKind::Text).required(),
            FieldRule::new("eventDetectorXid", Field::DetectorXid, FieldKind::Text).required(),
            FieldRule::new(
                "detectorType",
                Field::DetectorType,
                FieldKind::DetectorType(&DetectorType::ALL),
            ),
            FieldRule::new("newDetectorName", Field::Name, FieldKind::Text).clearable(),
            FieldRule::new("newAlarmLevel", Field::AlarmLevel, FieldKind::AlarmLevel).clearable(),
            FieldRule::new("newLimit", Field::Limit, ANY_FLOAT).clearable(),
            FieldRule::new("newResetLimit", Field::ResetLimit, ANY_FLOAT).clearable(),
            FieldRule::new(
                "newUseResetLimit",
                Field::UseResetLimit,
                FieldKind::Bool(BoolStyle::TrueFalse),
            )
            .clearable(),
            FieldRule::new("newLowRangeLimit", Field::LowLimit, ANY_FLOAT).clearable(),
            FieldRule::new("newHighRangeLimit", Field::HighLimit, ANY_FLOAT).clearable(),
            FieldRule::new(
                "newWithinRange",
                Field::WithinRange,
                FieldKind::Bool(BoolStyle::TrueFalse),
            )
            .clearable(),
            FieldRule::new("newStateValues", Field::StateValues, FieldKind::List),
            FieldRule::new(
                "newStateInverted",
                Field::StateInverted,
                FieldKind::Bool(BoolStyle::YesNo),
            )
            .clearable(),
            FieldRule::new(
                "newDuration",
                Field::Duration,
                FieldKind::Integer { min: None, max: None },
            )
            .clearable(),
            FieldRule::new("newDurationType", Field::DurationType, FieldKind::DurationUnit).clearable(),
            FieldRule::new("handlers_to_link", Field::HandlersToLink, FieldKind::List),
            FieldRule::new("handlers_to_remove", Field::HandlersToRemove, FieldKind::List),
            FieldRule::new("dataPointType", Field::DataPointType, FieldKind::DataPointType),
        ]
    }

    fn cross_rules(&self) -> Vec<CrossRule> {
        vec![state_inverted_rule, state_values_rule]
    }

    fn key_column(&self) -> &'static str {
        "eventDetectorXid"
    }

    fn process(
        &self,
        record: &ValidatedRecord,
        store: &dyn DetectorStore,
        config: &RunConfig,
    ) -> Result<Applied, RecordFailure> {
        let xid = record.text(Field::DetectorXid).unwrap_or_default();
        let current = resolve_detector(store, xid, record.text(Field::DetectorId))?;

        if let Some(declared) = record.detector_type(Field::DetectorType) {
            if declared != current.detector_type {
                return Err(RecordError::new(
                    ErrorKind::UnsupportedValue,
                    format!(
                        "detectorType {} does not match stored type {}",
                        declared, current.detector_type
                    ),
                )
                .on("detectorType")
                .into());
            }
        }

        let point = store
            .get_data_point_by_id(current.data_point_id)
            .map_err(|e| e.into_lookup_error().on("dataPointType"))?;
        if let Some(declared) = record.data_point_type(Field::DataPointType) {
            if declared != point.data_type {
                return Err(RecordError::new(
                    ErrorKind::UnsupportedValue,
                    format!(
                        "dataPointType {} does not match data point {} ({})",
                        declared, point.xid, point.data_type
                    ),
                )
                .on("dataPointType")
                .into());
            }
        }

        let misplaced = inapplicable_columns(record, current.detector_type);
        if !misplaced.is_empty() {
            return Err(misplaced.into());
        }

        // Target for blank cells under the `clear` policy
        let defaults = EventDetector::defaults(current.detector_type, current.data_point_id);
        let scope = current.detector_type;
        let mut plan = ChangePlan::new();

        if let Some(v) = planned(record, scope, Field::Name, |r, f| r.text(f).map(str::to_string), defaults.name.clone()) {
            plan.push(Change::Name(v), &current);
        }
        if let Some(v) = planned(record, scope, Field::AlarmLevel, ValidatedRecord::alarm_level, defaults.alarm_level) {
            plan.push(Change::AlarmLevel(v), &current);
        }
        if let Some(v) = planned(record, scope, Field::Limit, |r, f| r.float(f).map(Some), defaults.limit) {
            plan.push(Change::Limit(v), &current);
        }
        if let Some(v) = planned(record, scope, Field::ResetLimit, |r, f| r.float(f).map(Some), defaults.reset_limit) {
            plan.push(Change::ResetLimit(v), &current);
        }
        if let Some(v) = planned(record, scope, Field::UseResetLimit, ValidatedRecord::boolean, defaults.use_reset_limit) {
            plan.push(Change::UseResetLimit(v), &current);
        }
        if let Some(v) = planned(record, scope, Field::LowLimit, |r, f| r.float(f).map(Some), defaults.low) {
            plan.push(Change::Low(v), &current);
        }
        if let Some(v) = planned(record, scope, Field::HighLimit, |r, f| r.float(f).map(Some), defaults.high) {
            plan.push(Change::High(v), &current);
        }
        if let Some(v) = planned(record, scope, Field::WithinRange, ValidatedRecord::boolean, defaults.within_range) {
            plan.push(Change::WithinRange(v), &current);
        }
        if let Some(v) = planned(record, scope, Field::StateInverted, ValidatedRecord::boolean, defaults.inverted) {
            plan.push(Change::Inverted(v), &current);
        }

        if let Some(items) = record.list(Field::StateValues) {
            let setting = StateSetting::parse(items, point.data_type)
                .map_err(|msg| RecordError::new(ErrorKind::UnsupportedValue, msg).on("newStateValues"))?;
            // One value edits `state` and leaves `states` alone, several edit `states`
            let (state, states) = match setting {
                StateSetting::Many(values) => (current.state, Some(values)),
                other => (other.to_fields().0, current.states.clone()),
            };
            plan.push(Change::State { state, states }, &current);
        }

        let wants_duration = !matches!(record.state(Field::Duration), FieldState::Unchanged)
            || !matches!(record.state(Field::DurationType), FieldState::Unchanged);
        if current.detector_type.supports_duration() {
            if let Some(v) = planned(record, scope, Field::Duration, ValidatedRecord::integer, defaults.duration) {
                plan.push(Change::Duration(v), &current);
            }
            if let Some(v) = planned(record, scope, Field::DurationType, ValidatedRecord::duration_unit, defaults.duration_type) {
                plan.push(Change::DurationType(v), &current);
            }
        } else if wants_duration {
            warn!(
                xid = %current.xid,
                detector_type = %current.detector_type,
                "Duration settings are not compatible with this detector type, change ignored"
            );
        }

        let handlers = edit_handlers(record, store, &current)?;
        plan.push(Change::Handlers(handlers), &current);

        if plan.is_empty() {
            return Ok(Applied::new(
                OutcomeTag::Skipped,
                &current.xid,
                format!("Detector {} XID {}: NOTHING TO UPDATE", current.id, current.xid),
            ));
        }

        debug!(xid = %current.xid, changes = ?plan.property_names(), "Applying change plan");
        let updated = commit_update(store, &current, &plan, config)?;

        Ok(Applied::new(
            OutcomeTag::Updated,
            &updated.xid,
            format!(
                "Detector {} XID {}: UPDATED ({})",
                updated.id,
                updated.xid,
                plan.property_names().join(", ")
            ),
        ))
    }
}

/// Columns that only mean something for one family of detector types
const TYPE_SCOPED: [(Field, &str, fn(&DetectorType) -> bool, &str); 8] = [
    (Field::Limit, "newLimit", DetectorType::is_limit, "LOW_LIMIT or HIGH_LIMIT"),
    (Field::ResetLimit, "newResetLimit", DetectorType::is_limit, "LOW_LIMIT or HIGH_LIMIT"),
    (Field::UseResetLimit, "newUseResetLimit", DetectorType::is_limit, "LOW_LIMIT or HIGH_LIMIT"),
    (Field::LowLimit, "newLowRangeLimit", DetectorType::is_range, "RANGE"),
    (Field::HighLimit, "newHighRangeLimit", DetectorType::is_range, "RANGE"),
    (Field::WithinRange, "newWithinRange", DetectorType::is_range, "RANGE"),
    (Field::StateValues, "newStateValues", DetectorType::is_state, "MULTISTATE_STATE or BINARY_STATE"),
    (Field::StateInverted, "newStateInverted", DetectorType::is_state, "MULTISTATE_STATE or BINARY_STATE"),
];

fn applies_to(field: Field, detector_type: DetectorType) -> bool {
    TYPE_SCOPED
        .iter()
        .find(|(scoped, ..)| *scoped == field)
        .map_or(true, |(_, _, applies, _)| applies(&detector_type))
}

/// Values given for columns the stored detector type has no use for
fn inapplicable_columns(record: &ValidatedRecord, detector_type: DetectorType) -> Vec<RecordError> {
    TYPE_SCOPED
        .iter()
        .filter(|(field, _, applies, _)| {
            !applies(&detector_type) && matches!(record.state(*field), FieldState::Set(_))
        })
        .map(|(_, column, _, wanted)| {
            RecordError::new(
                ErrorKind::UnsupportedValue,
                format!("{} only applies to {} detectors, not {}", column, wanted, detector_type),
            )
            .on(*column)
        })
        .collect()
}

/// Value a field should take, or None when the row leaves it alone.
/// Clearing a column outside the detector type's family is a no-op.
fn planned<T>(
    record: &ValidatedRecord,
    detector_type: DetectorType,
    field: Field,
    get: impl Fn(&ValidatedRecord, Field) -> Option<T>,
    default: T,
) -> Option<T> {
    match record.state(field) {
        FieldState::Set(_) => get(record, field),
        FieldState::Clear if applies_to(field, detector_type) => Some(default),
        FieldState::Clear | FieldState::Unchanged => None,
    }
}

/// Link first (union), then unlink (difference). Every XID must exist.
fn edit_handlers(
    record: &ValidatedRecord,
    store: &dyn DetectorStore,
    current: &EventDetector,
) -> Result<Vec<String>, RecordError> {
    let mut handlers = current.event_handler_xids.clone();

    if let Some(xids) = record.list(Field::HandlersToLink) {
        let found = resolve_handlers(store, xids, HandlerLookup::Strict, "handlers_to_link")?;
        handlers = link_handlers(&handlers, &found);
    }

    if let Some(xids) = record.list(Field::HandlersToRemove) {
        let found = resolve_handlers(store, xids, HandlerLookup::Strict, "handlers_to_remove")?;
        let (remaining, not_linked) = unlink_handlers(&handlers, &found);
        for xid in not_linked {
            warn!(
                handler = %xid,
                detector = %current.xid,
                "Event handler was not linked, nothing to unlink"
            );
        }
        handlers = remaining;
    }

    Ok(handlers)
}

// ============================================================================
// CROSS-FIELD RULES
// ============================================================================

fn state_inverted_rule(record: &ValidatedRecord) -> Result<(), RecordError> {
    if !matches!(record.state(Field::StateInverted), FieldState::Set(_)) {
        return Ok(());
    }
    match record.data_point_type(Field::DataPointType) {
        Some(DataPointType::Multistate) => Ok(()),
        None => Err(RecordError::new(
            ErrorKind::MissingRequiredField,
            "dataPointType is required to change newStateInverted",
        )
        .on("dataPointType")),
        Some(other) => Err(RecordError::new(
            ErrorKind::UnsupportedValue,
            format!("newStateInverted is not supported for {} points", other),
        )
        .on("newStateInverted")),
    }
}

fn state_values_rule(record: &ValidatedRecord) -> Result<(), RecordError> {
    let Some(items) = record.list(Field::StateValues) else {
        return Ok(());
    };
    let Some(point_type) = record.data_point_type(Field::DataPointType) else {
        return Err(RecordError::new(
            ErrorKind::MissingRequiredField,
            "dataPointType is required to change newStateValues",
        )
        .on("dataPointType"));
    };
    StateSetting::parse(items, point_type).map_err(|msg| {
        let kind = if point_type == DataPointType::Multistate {
            ErrorKind::InvalidNumber
        } else {
            ErrorKind::UnsupportedValue
        };
        RecordError::new(kind, msg).on("newStateValues")
    })?;
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
