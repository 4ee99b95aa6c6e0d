// 📤 Export - Current detectors as a ready-to-edit CSV
//
// The leading columns are exactly the edit schema, so the file can be fed
// straight back into an edit run. `existing*` columns are read-only context.

use super::edit;
use crate::config::RunConfig;
use crate::detector::{DataPoint, EventDetector};
use crate::error::RunFatalError;
use crate::store::DetectorStore;
use std::collections::HashMap;
use std::io::Write;
use tracing::info;

pub const CONTEXT_COLUMNS: [&str; 15] = [
    "existingName",
    "existingAlarmLevel",
    "existingLimit",
    "existingResetLimit",
    "existingUseResetLimit",
    "existingLow",
    "existingHigh",
    "existingWithinRange",
    "existingDuration",
    "existingDurationType",
    "existingStateValues",
    "existingStateInverted",
    "existingHandlers",
    "dataPointName",
    "dataPointXid",
];

/// Write every stored detector as one edit row. Returns the row count.
pub fn export_edit_csv<W: Write>(
    store: &dyn DetectorStore,
    writer: W,
    config: &RunConfig,
) -> Result<usize, RunFatalError> {
    config.validate()?;

    let detectors = store
        .list_detectors()
        .map_err(|e| RunFatalError::Store(e.to_string()))?;

    let mut out = csv::WriterBuilder::new()
        .delimiter(config.delimiter as u8)
        .from_writer(writer);

    let header: Vec<&str> = edit::COLUMNS
        .iter()
        .chain(CONTEXT_COLUMNS.iter())
        .copied()
        .collect();
    out.write_record(&header)?;

    let mut points: HashMap<i64, DataPoint> = HashMap::new();
    for detector in &detectors {
        if !points.contains_key(&detector.data_point_id) {
            let point = store
                .get_data_point_by_id(detector.data_point_id)
                .map_err(|e| RunFatalError::Store(e.to_string()))?;
            points.insert(detector.data_point_id, point);
        }
        if let Some(point) = points.get(&detector.data_point_id) {
            out.write_record(export_row(detector, point, config))?;
        }
    }

    out.flush()?;
    info!(rows = detectors.len(), "Exported event detectors");
    Ok(detectors.len())
}

fn export_row(detector: &EventDetector, point: &DataPoint, config: &RunConfig) -> Vec<String> {
    let list = config.list_delimiter.to_string();
    let unchanged = || config.sentinel.clone();

    let mut row = vec![
        detector.id.to_string(),
        detector.xid.clone(),
        detector.detector_type.to_string(),
    ];
    // newDetectorName .. handlers_to_remove
    row.extend((3..edit::COLUMNS.len() - 1).map(|_| unchanged()));
    row.push(point.data_type.to_string());

    row.extend([
        detector.name.clone(),
        detector.alarm_level.to_string(),
        opt(detector.limit),
        opt(detector.reset_limit),
        detector.use_reset_limit.to_string(),
        opt(detector.low),
        opt(detector.high),
        detector.within_range.to_string(),
        detector.duration.to_string(),
        detector.duration_type.as_str().to_string(),
        detector.state_values_display(config.list_delimiter),
        detector.inverted.to_string(),
        detector.event_handler_xids.join(&list),
        point.name.clone(),
        point.xid.clone(),
    ]);
    row
}

fn opt(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::{AlarmLevel, DataPointType, DetectorType};
    use crate::jobs::{run_batch, Operation};
    use crate::reporter::OutcomeTag;
    use crate::store::SqliteStore;

    fn seeded() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        let temp = store.add_data_point("DP_TEMP", "Zone temp", DataPointType::Numeric).unwrap();
        let mode = store.add_data_point("DP_MODE", "Mode", DataPointType::Multistate).unwrap();
        store.add_event_handler("EH_1", "Email").unwrap();
        store.add_event_handler("EH_2", "SMS").unwrap();

        let mut high = EventDetector::template(DetectorType::HighLimit, &temp);
        high.xid = "ED_HIGH".to_string();
        high.name = "Too warm, again".to_string();
        high.limit = Some(26.5);
        high.alarm_level = AlarmLevel::Urgent;
        high.event_handler_xids = vec!["EH_1".to_string(), "EH_2".to_string()];
        store.insert(&mut high).unwrap();

        let mut multi = EventDetector::template(DetectorType::MultistateState, &mode);
        multi.xid = "ED_MODE".to_string();
        multi.states = Some(vec![2, 3]);
        store.insert(&mut multi).unwrap();
        store
    }

    #[test]
    fn test_export_header_and_context() {
        let store = seeded();
        let mut buf = Vec::new();
        let rows = export_edit_csv(&store, &mut buf, &RunConfig::default()).unwrap();
        assert_eq!(rows, 2);

        let text = String::from_utf8(buf).unwrap();
        let mut reader = csv::Reader::from_reader(text.as_bytes());
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.len(), 33);
        assert_eq!(&headers[17], "dataPointType");
        assert_eq!(&headers[18], "existingName");

        let first = reader.records().next().unwrap().unwrap();
        assert_eq!(&first[1], "ED_HIGH");
        assert_eq!(&first[3], "EMPTY");
        assert_eq!(&first[17], "NUMERIC");
        assert_eq!(&first[18], "Too warm, again");
        assert_eq!(&first[20], "26.5");
        assert_eq!(&first[30], "EH_1;EH_2");
    }

    #[test]
    fn test_export_feeds_back_into_edit_unchanged() {
        let store = seeded();
        let mut buf = Vec::new();
        export_edit_csv(&store, &mut buf, &RunConfig::default()).unwrap();

        let summary = run_batch(buf.as_slice(), Operation::Edit, &RunConfig::default(), &store).unwrap();
        assert_eq!(summary.total, 2);
        assert!(
            summary.outcomes.iter().all(|o| o.tag == OutcomeTag::Skipped),
            "{:?}",
            summary.outcomes
        );
    }
}
