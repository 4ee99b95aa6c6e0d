// 🗑️ Delete Job - Remove detectors named by id + XID

use super::{Applied, BatchJob, Operation};
use crate::applier::commit_delete;
use crate::config::RunConfig;
use crate::error::RecordFailure;
use crate::parser::ColumnSchema;
use crate::reporter::OutcomeTag;
use crate::resolver::resolve_detector;
use crate::rules::{Field, FieldKind, FieldRule, ValidatedRecord};
use crate::store::DetectorStore;

pub const COLUMNS: [&str; 2] = ["eventDetectorId", "eventDetectorXid"];

#[derive(Debug, Clone, Copy, Default)]
pub struct DeleteJob;

impl BatchJob for DeleteJob {
    fn operation(&self) -> Operation {
        Operation::Delete
    }

    fn schema(&self) -> ColumnSchema {
        ColumnSchema::new(&COLUMNS)
    }

    fn rules(&self) -> Vec<FieldRule> {
        vec![
            FieldRule::new("eventDetectorId", Field::DetectorId, FieldKind::Text).required(),
            FieldRule::new("eventDetectorXid", Field::DetectorXid, FieldKind::Text).required(),
        ]
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
        let detector = resolve_detector(store, xid, record.text(Field::DetectorId))?;

        commit_delete(store, &detector, config)?;

        Ok(Applied::new(
            OutcomeTag::Deleted,
            &detector.xid,
            format!("Detector {} XID {}: DELETED", detector.id, detector.xid),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::{DataPointType, DetectorType, EventDetector};
    use crate::error::ErrorKind;
    use crate::jobs::run_batch;
    use crate::store::{SqliteStore, ENTITY_DETECTOR};

    fn setup() -> (SqliteStore, EventDetector, EventDetector) {
        let store = SqliteStore::open_in_memory().unwrap();
        let point = store.add_data_point("DP_1", "Boiler", DataPointType::Numeric).unwrap();

        let mut a = EventDetector::template(DetectorType::PointChange, &point);
        a.xid = "ED_A".to_string();
        store.insert(&mut a).unwrap();
        let mut b = EventDetector::template(DetectorType::NoUpdate, &point);
        b.xid = "ED_B".to_string();
        store.insert(&mut b).unwrap();
        (store, a, b)
    }

    #[test]
    fn test_delete_with_guard() {
        let (store, a, b) = setup();
        let input = format!(
            "eventDetectorId,eventDetectorXid\n{},ED_A\n{},ED_B\n{},ED_GONE\n",
            a.id,
            a.id, // wrong id for ED_B
            b.id
        );
        let summary = run_batch(input.as_bytes(), Operation::Delete, &RunConfig::default(), &store).unwrap();

        assert_eq!(summary.deleted, 1);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.outcomes[1].errors[0].kind, ErrorKind::IdentifierMismatch);
        assert_eq!(summary.outcomes[2].errors[0].kind, ErrorKind::NotFound);
        assert_eq!(
            summary.final_line(),
            "Finished deleting 1 out of 3 event detectors with 2 errors"
        );

        assert!(store.get_detector("ED_A").unwrap_err().is_not_found());
        assert!(store.get_detector("ED_B").is_ok());
        let events = store.events_for(ENTITY_DETECTOR, "ED_A").unwrap();
        assert_eq!(events[0].event_type, "detector_deleted");
    }

    #[test]
    fn test_delete_requires_both_columns() {
        let (store, _, _) = setup();
        let input = "eventDetectorId,eventDetectorXid\nEMPTY,ED_A\n";
        let summary = run_batch(input.as_bytes(), Operation::Delete, &RunConfig::default(), &store).unwrap();
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.outcomes[0].errors[0].kind, ErrorKind::MissingRequiredField);
        assert!(store.get_detector("ED_A").is_ok());
    }

    #[test]
    fn test_dry_run_delete_keeps_detector() {
        let (store, a, _) = setup();
        let input = format!("eventDetectorId,eventDetectorXid\n{},ED_A\n", a.id);
        let config = RunConfig::default().with_dry_run(true);
        let summary = run_batch(input.as_bytes(), Operation::Delete, &config, &store).unwrap();
        assert_eq!(summary.deleted, 1);
        assert!(summary.final_line().ends_with("(dry run, nothing committed)"));
        assert!(store.get_detector("ED_A").is_ok());
    }
}
