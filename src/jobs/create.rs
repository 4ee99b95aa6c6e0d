// ➕ Create Job - One new detector per row, built from a type template

use super::{Applied, BatchJob, Operation};
use crate::applier::{build_from_template, commit_create, Change, ChangePlan};
use crate::config::RunConfig;
use crate::detector::{DataPointType, DetectorType, EventDetector, StateSetting};
use crate::error::{ErrorKind, RecordError, RecordFailure};
use crate::parser::ColumnSchema;
use crate::reporter::OutcomeTag;
use crate::resolver::{resolve_data_point, resolve_handlers, HandlerLookup};
use crate::rules::{BoolStyle, CrossRule, Field, FieldKind, FieldRule, ValidatedRecord};
use crate::store::DetectorStore;
use tracing::warn;

pub const COLUMNS: [&str; 13] = [
    "dataPointId",
    "dataPointXid",
    "detectorType",
    "detectorName",
    "alarmLevel",
    "limit",
    "stateValues",
    "stateInverted",
    "duration",
    "durationType",
    "handlers_to_link",
    "dataPointName",
    "dataPointType",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct CreateJob;

impl BatchJob for CreateJob {
    fn operation(&self) -> Operation {
        Operation::Create
    }

    fn schema(&self) -> ColumnSchema {
        ColumnSchema::new(&COLUMNS)
    }

    fn rules(&self) -> Vec<FieldRule> {
        vec![
            FieldRule::new("dataPointId", Field::DataPointId, FieldKind::Text),
            FieldRule::new("dataPointXid", Field::DataPointXid, FieldKind::Text).required(),
            FieldRule::new(
                "detectorType",
                Field::DetectorType,
                FieldKind::DetectorType(&DetectorType::CREATABLE),
            )
            .required(),
            FieldRule::new("detectorName", Field::Name, FieldKind::Text),
            FieldRule::new("alarmLevel", Field::AlarmLevel, FieldKind::AlarmLevel).required(),
            FieldRule::new("limit", Field::Limit, FieldKind::Float { min: None, max: None }),
            FieldRule::new("stateValues", Field::StateValues, FieldKind::List),
            FieldRule::new("stateInverted", Field::StateInverted, FieldKind::Bool(BoolStyle::YesNo)),
            FieldRule::new("duration", Field::Duration, FieldKind::Integer { min: None, max: None }),
            FieldRule::new("durationType", Field::DurationType, FieldKind::DurationUnit),
            FieldRule::new("handlers_to_link", Field::HandlersToLink, FieldKind::List),
            FieldRule::new("dataPointName", Field::DataPointName, FieldKind::Text),
            FieldRule::new("dataPointType", Field::DataPointType, FieldKind::DataPointType).required(),
        ]
    }

    fn cross_rules(&self) -> Vec<CrossRule> {
        vec![limit_detector_rule, state_detector_rule, state_inverted_rule]
    }

    fn key_column(&self) -> &'static str {
        "dataPointXid"
    }

    fn process(
        &self,
        record: &ValidatedRecord,
        store: &dyn DetectorStore,
        config: &RunConfig,
    ) -> Result<Applied, RecordFailure> {
        let point_xid = record.text(Field::DataPointXid).unwrap_or_default();
        let point = resolve_data_point(store, point_xid, record.text(Field::DataPointId))?;

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
        if let Some(name) = record.text(Field::DataPointName) {
            if name != point.name {
                warn!(data_point = %point.xid, declared = name, actual = %point.name, "Data point name differs");
            }
        }

        let detector_type = record
            .detector_type(Field::DetectorType)
            .ok_or_else(|| RecordError::missing("detectorType"))?;
        let template = EventDetector::template(detector_type, &point);
        let mut plan = ChangePlan::new();

        if let Some(name) = record.text(Field::Name) {
            plan.push(Change::Name(name.to_string()), &template);
        }
        if let Some(level) = record.alarm_level(Field::AlarmLevel) {
            plan.push(Change::AlarmLevel(level), &template);
        }
        if detector_type.is_limit() {
            plan.push(Change::Limit(record.float(Field::Limit)), &template);
        }

        if matches!(detector_type, DetectorType::MultistateState | DetectorType::BinaryState) {
            if let Some(items) = record.list(Field::StateValues) {
                let setting = StateSetting::parse(items, point.data_type)
                    .map_err(|msg| RecordError::new(ErrorKind::UnsupportedValue, msg).on("stateValues"))?;
                let (state, states) = setting.to_fields();
                plan.push(Change::State { state, states }, &template);
            }
            if let Some(inverted) = record.boolean(Field::StateInverted) {
                plan.push(Change::Inverted(inverted), &template);
            }
        }

        let duration = record.integer(Field::Duration);
        let duration_type = record.duration_unit(Field::DurationType);
        if detector_type.supports_duration() {
            if let Some(d) = duration {
                plan.push(Change::Duration(d), &template);
            }
            if let Some(unit) = duration_type {
                plan.push(Change::DurationType(unit), &template);
            }
        } else if duration.map_or(false, |d| d != 0) {
            warn!(
                data_point = %point.xid,
                detector_type = %detector_type,
                "Duration is not supported for this detector type and is ignored"
            );
        }

        if let Some(xids) = record.list(Field::HandlersToLink) {
            let found = resolve_handlers(store, xids, HandlerLookup::Lenient, "handlers_to_link")?;
            plan.push(Change::Handlers(found), &template);
        }

        let detector = build_from_template(detector_type, &point, &plan);
        let created = commit_create(store, detector, config)?;

        Ok(Applied::new(
            OutcomeTag::Created,
            &created.xid,
            format!(
                "Created {} detector {} (id {}) on data point {}",
                detector_type, created.xid, created.id, point.xid
            ),
        ))
    }
}

// ============================================================================
// CROSS-FIELD RULES
// ============================================================================

/// Limit detectors need a numeric point and a limit
fn limit_detector_rule(record: &ValidatedRecord) -> Result<(), RecordError> {
    let Some(detector_type) = record.detector_type(Field::DetectorType) else {
        return Ok(());
    };
    if !detector_type.is_limit() {
        return Ok(());
    }
    if let Some(point_type) = record.data_point_type(Field::DataPointType) {
        if matches!(point_type, DataPointType::Binary | DataPointType::Multistate) {
            return Err(RecordError::new(
                ErrorKind::UnsupportedValue,
                format!("{} detectors are not supported on {} points", detector_type, point_type),
            )
            .on("detectorType"));
        }
    }
    if !record.is_set(Field::Limit) {
        return Err(RecordError::missing("limit"));
    }
    Ok(())
}

/// State detectors need the matching point type and state values
fn state_detector_rule(record: &ValidatedRecord) -> Result<(), RecordError> {
    let expected_point = match record.detector_type(Field::DetectorType) {
        Some(DetectorType::MultistateState) => DataPointType::Multistate,
        Some(DetectorType::BinaryState) => DataPointType::Binary,
        _ => return Ok(()),
    };
    let point_type = record.data_point_type(Field::DataPointType);
    if point_type != Some(expected_point) {
        return Err(RecordError::new(
            ErrorKind::UnsupportedValue,
            format!(
                "unexpected data point type {} for {} detector",
                point_type.map(|t| t.as_str()).unwrap_or("-"),
                record.detector_type(Field::DetectorType).map(|t| t.as_str()).unwrap_or("-")
            ),
        )
        .on("dataPointType"));
    }

    let Some(items) = record.list(Field::StateValues) else {
        return Err(RecordError::missing("stateValues"));
    };
    StateSetting::parse(items, expected_point).map_err(|msg| {
        let kind = if expected_point == DataPointType::Multistate {
            ErrorKind::InvalidNumber
        } else {
            ErrorKind::UnsupportedValue
        };
        RecordError::new(kind, msg).on("stateValues")
    })?;
    Ok(())
}

fn state_inverted_rule(record: &ValidatedRecord) -> Result<(), RecordError> {
    if record.is_set(Field::StateInverted)
        && record.data_point_type(Field::DataPointType) != Some(DataPointType::Multistate)
    {
        return Err(RecordError::new(
            ErrorKind::UnsupportedValue,
            "stateInverted is only supported on MULTISTATE points",
        )
        .on("stateInverted"));
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::{AlarmLevel, DurationUnit};
    use crate::jobs::run_batch;
    use crate::store::SqliteStore;

    fn setup() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store.add_data_point("DP_TEMP", "Zone temp", DataPointType::Numeric).unwrap();
        store.add_data_point("DP_MODE", "AHU mode", DataPointType::Multistate).unwrap();
        store.add_data_point("DP_FAN", "Fan status", DataPointType::Binary).unwrap();
        store.add_event_handler("EH_1", "Email").unwrap();
        store
    }

    fn run(store: &SqliteStore, rows: &[&str]) -> crate::reporter::RunSummary {
        let mut input = COLUMNS.join(",");
        for row in rows {
            input.push('\n');
            input.push_str(row);
        }
        run_batch(input.as_bytes(), Operation::Create, &RunConfig::default(), store).unwrap()
    }

    #[test]
    fn test_create_high_limit() {
        let store = setup();
        let summary = run(
            &store,
            &[",DP_TEMP,HIGH_LIMIT,Too warm,URGENT,26.5,,,30,MINUTES,EH_1;EH_MISSING,Zone temp,NUMERIC"],
        );
        assert_eq!(summary.created, 1, "{:?}", summary.outcomes);

        let xid = summary.outcomes[0].xid.clone().unwrap();
        assert!(xid.starts_with("ED_"));
        let det = store.get_detector(&xid).unwrap();
        assert_eq!(det.name, "Too warm");
        assert_eq!(det.alarm_level, AlarmLevel::Urgent);
        assert_eq!(det.limit, Some(26.5));
        assert_eq!(det.duration, 30);
        assert_eq!(det.duration_type, DurationUnit::Minutes);
        // Unknown handler skipped in create
        assert_eq!(det.event_handler_xids, vec!["EH_1"]);

        println!("✅ Create high limit test PASSED");
    }

    #[test]
    fn test_create_state_detectors() {
        let store = setup();
        let summary = run(
            &store,
            &[
                ",DP_MODE,MULTISTATE_STATE,Mode alarm,WARNING,,2;3,yes,,,,,MULTISTATE",
                ",DP_FAN,BINARY_STATE,Fan off,CRITICAL,,false,,,2,,,BINARY",
            ],
        );
        assert_eq!(summary.created, 2, "{:?}", summary.outcomes);

        let multi = store.get_detector(summary.outcomes[0].xid.as_ref().unwrap()).unwrap();
        assert_eq!(multi.states, Some(vec![2, 3]));
        assert!(multi.inverted);

        let binary = store.get_detector(summary.outcomes[1].xid.as_ref().unwrap()).unwrap();
        assert_eq!(binary.state, Some(0));
        assert_eq!(binary.duration_type, DurationUnit::Minutes);
    }

    #[test]
    fn test_create_rejections() {
        let store = setup();
        let summary = run(
            &store,
            &[
                // limit detector on a binary point
                ",DP_FAN,LOW_LIMIT,x,WARNING,1,,,,,,,BINARY",
                // limit missing
                ",DP_TEMP,LOW_LIMIT,x,WARNING,,,,,,,,NUMERIC",
                // RANGE cannot be created
                ",DP_TEMP,RANGE,x,WARNING,,,,,,,,NUMERIC",
                // multistate detector with non-integer states
                ",DP_MODE,MULTISTATE_STATE,x,WARNING,,a;b,,,,,,MULTISTATE",
                // unknown data point
                ",DP_GHOST,NO_UPDATE,x,WARNING,,,,,,,,NUMERIC",
                // declared id does not match
                "999,DP_TEMP,NO_UPDATE,x,WARNING,,,,,,,,NUMERIC",
                // declared point type does not match the store
                ",DP_TEMP,NO_UPDATE,x,WARNING,,,,,,,,ALPHANUMERIC",
            ],
        );
        assert_eq!(summary.failed, 7);
        let kinds: Vec<ErrorKind> = summary
            .outcomes
            .iter()
            .map(|o| o.errors[0].kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                ErrorKind::UnsupportedValue,
                ErrorKind::MissingRequiredField,
                ErrorKind::UnsupportedValue,
                ErrorKind::InvalidNumber,
                ErrorKind::NotFound,
                ErrorKind::IdentifierMismatch,
                ErrorKind::UnsupportedValue,
            ]
        );
        assert!(store.list_detectors().unwrap().is_empty());
    }

    #[test]
    fn test_update_detector_ignores_duration() {
        let store = setup();
        let summary = run(&store, &[",DP_TEMP,UPDATE,Changed,INFORMATION,,,,15,2,,,NUMERIC"]);
        assert_eq!(summary.created, 1);
        let det = store.get_detector(summary.outcomes[0].xid.as_ref().unwrap()).unwrap();
        assert_eq!(det.duration, 0);
        assert_eq!(det.duration_type, DurationUnit::Seconds);
    }
}
