// Batch properties exercised end to end through the public API

use detector_batch::{
    run_batch, template_header, AlarmLevel, BlankPolicy, DataPointType, DetectorStore,
    DetectorType, ErrorKind, EventDetector, Operation, OutcomeTag, RunConfig, RunFatalError,
    SqliteStore,
};
use pretty_assertions::assert_eq;
use std::io::Write;

/// Store with A_1 (id 1) and A_2 (id 2), both HIGH_LIMIT on a numeric point
fn store_with_two() -> SqliteStore {
    let store = SqliteStore::open_in_memory().unwrap();
    let point = store.add_data_point("DP_1", "Supply temp", DataPointType::Numeric).unwrap();
    store.add_event_handler("EH_1", "Email").unwrap();

    for (xid, limit) in [("A_1", 10.0), ("A_2", 20.0)] {
        let mut det = EventDetector::template(DetectorType::HighLimit, &point);
        det.xid = xid.to_string();
        det.name = format!("{} high", xid);
        det.limit = Some(limit);
        store.insert(&mut det).unwrap();
    }
    store
}

/// Edit input with only id, xid and newLimit filled in
fn edit_csv(rows: &[(&str, &str, &str)]) -> String {
    let mut csv = template_header(Operation::Edit, ',');
    for (id, xid, limit) in rows {
        csv.push_str(&format!("\n{},{},,,,{},,,,,,,,,,,,", id, xid, limit));
    }
    csv.push('\n');
    csv
}

fn edit(store: &SqliteStore, csv: &str, config: &RunConfig) -> detector_batch::RunSummary {
    run_batch(csv.as_bytes(), Operation::Edit, config, store).unwrap()
}

#[test]
fn test_worked_example() {
    let store = store_with_two();
    let csv = edit_csv(&[("1", "A_1", "5.5"), ("2", "A_2", "EMPTY"), ("abc", "A_3", "5.5")]);

    let summary = edit(&store, &csv, &RunConfig::default());

    assert_eq!(summary.total, 3);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.outcomes[0].tag, OutcomeTag::Updated);
    assert_eq!(summary.outcomes[1].tag, OutcomeTag::Skipped);
    assert_eq!(summary.outcomes[2].errors[0].kind, ErrorKind::NotFound);
    assert_eq!(
        summary.final_line(),
        "Finished editing 2 out of 3 event detectors with 1 errors"
    );

    assert_eq!(store.get_detector("A_1").unwrap().limit, Some(5.5));
    assert_eq!(store.get_detector("A_2").unwrap().limit, Some(20.0));
}

#[test]
fn test_edit_is_idempotent() {
    let store = store_with_two();
    let csv = edit_csv(&[("1", "A_1", "7"), ("2", "A_2", "8")]);

    let first = edit(&store, &csv, &RunConfig::default());
    assert_eq!(first.updated, 2);
    let after_first = store.list_detectors().unwrap();

    let second = edit(&store, &csv, &RunConfig::default());
    assert_eq!(second.updated, 0);
    assert_eq!(second.skipped, 2);
    assert_eq!(store.list_detectors().unwrap(), after_first);
}

#[test]
fn test_header_mismatch_processes_nothing() {
    let store = store_with_two();
    let before = store.list_detectors().unwrap();
    let csv = edit_csv(&[("1", "A_1", "99")]).replacen("newLimit", "limit", 1);

    let err = run_batch(csv.as_bytes(), Operation::Edit, &RunConfig::default(), &store).unwrap_err();
    match err {
        RunFatalError::SchemaMismatch { position, expected, actual } => {
            assert_eq!(position, 6);
            assert_eq!(expected, "newLimit");
            assert_eq!(actual, "limit");
        }
        other => panic!("expected schema mismatch, got {:?}", other),
    }
    assert_eq!(store.list_detectors().unwrap(), before);
}

#[test]
fn test_header_case_and_spacing_tolerated() {
    let store = store_with_two();
    let csv = edit_csv(&[("1", "A_1", "3")]).replacen("eventDetectorXid", " EventDetector XID ", 1);
    let summary = edit(&store, &csv, &RunConfig::default());
    assert_eq!(summary.updated, 1);
}

#[test]
fn test_sentinel_leaves_every_field_alone() {
    let store = store_with_two();
    let before = store.get_detector("A_1").unwrap();

    let header = template_header(Operation::Edit, ',');
    let sentinels = vec!["EMPTY"; 16].join(",");
    let csv = format!("{}\n1,A_1,{}\n", header, sentinels);

    let summary = edit(&store, &csv, &RunConfig::default().with_blank_policy(BlankPolicy::Clear));
    assert_eq!(summary.skipped, 1);
    assert_eq!(store.get_detector("A_1").unwrap(), before);
}

#[test]
fn test_one_bad_record_is_isolated() {
    let store = store_with_two();
    let point = store.get_data_point("DP_1").unwrap();
    for i in 3..=5 {
        let mut det = EventDetector::template(DetectorType::HighLimit, &point);
        det.xid = format!("A_{}", i);
        det.limit = Some(1.0);
        store.insert(&mut det).unwrap();
    }

    let csv = edit_csv(&[
        ("1", "A_1", "11"),
        ("2", "A_2", "12"),
        ("3", "A_3", "twelve"),
        ("4", "A_4", "14"),
        ("5", "A_5", "15"),
    ]);
    let summary = edit(&store, &csv, &RunConfig::default());

    assert_eq!(summary.updated, 4);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.outcomes[2].xid.as_deref(), Some("A_3"));
    assert_eq!(summary.outcomes[2].errors[0].kind, ErrorKind::InvalidNumber);
    assert_eq!(store.get_detector("A_3").unwrap().limit, Some(1.0));
    assert_eq!(store.get_detector("A_5").unwrap().limit, Some(15.0));
}

#[test]
fn test_identifier_mismatch_never_mutates() {
    let store = store_with_two();
    let before = store.get_detector("A_2").unwrap();

    let summary = edit(&store, &edit_csv(&[("1", "A_2", "50")]), &RunConfig::default());

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.outcomes[0].errors[0].kind, ErrorKind::IdentifierMismatch);
    assert_eq!(store.get_detector("A_2").unwrap(), before);
    assert_eq!(store.get_detector("A_1").unwrap().limit, Some(10.0));
}

#[test]
fn test_equal_delimiters_abort_before_processing() {
    let store = store_with_two();
    let config = RunConfig::default().with_delimiters(';', ';');
    let err = run_batch(
        edit_csv(&[("1", "A_1", "1")]).as_bytes(),
        Operation::Edit,
        &config,
        &store,
    )
    .unwrap_err();

    assert!(matches!(err, RunFatalError::InvalidDelimiter(_)));
    assert!(err.to_string().starts_with("INVALID DELIMITER."));
    assert_eq!(store.get_detector("A_1").unwrap().limit, Some(10.0));
}

#[test]
fn test_config_file_with_custom_delimiters() {
    let store = store_with_two();
    store.add_event_handler("EH_2", "SMS").unwrap();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{ "delimiter": ";", "list_delimiter": "|" }}"#).unwrap();
    let config = RunConfig::from_file(file.path()).unwrap();

    let header = template_header(Operation::Edit, ';');
    let csv = format!("{}\n1;A_1;;;URGENT;;;;;;;;;;;EH_1|EH_2;;\n", header);
    let summary = edit(&store, &csv, &config);
    assert_eq!(summary.updated, 1, "{:?}", summary.outcomes);

    let det = store.get_detector("A_1").unwrap();
    assert_eq!(det.alarm_level, AlarmLevel::Urgent);
    assert_eq!(det.event_handler_xids, vec!["EH_1", "EH_2"]);
}

#[test]
fn test_create_edit_delete_lifecycle() {
    let store = store_with_two();

    let create = format!(
        "{}\n,DP_1,LOW_LIMIT,Too cold,WARNING,2,,,,,EH_1,,NUMERIC\n",
        template_header(Operation::Create, ',')
    );
    let created = run_batch(create.as_bytes(), Operation::Create, &RunConfig::default(), &store).unwrap();
    assert_eq!(created.created, 1, "{:?}", created.outcomes);

    let xid = created.outcomes[0].xid.clone().unwrap();
    let det = store.get_detector(&xid).unwrap();
    assert_eq!(det.detector_type, DetectorType::LowLimit);
    assert_eq!(det.event_handler_xids, vec!["EH_1"]);

    let id = det.id.to_string();
    let summary = edit(&store, &edit_csv(&[(id.as_str(), xid.as_str(), "0.5")]), &RunConfig::default());
    assert_eq!(summary.updated, 1);

    let delete = format!("{}\n{},{}\n", template_header(Operation::Delete, ','), det.id, xid);
    let deleted = run_batch(delete.as_bytes(), Operation::Delete, &RunConfig::default(), &store).unwrap();
    assert_eq!(deleted.deleted, 1);
    assert!(store.get_detector(&xid).is_err());
}

#[test]
fn test_dry_run_reports_without_committing() {
    let store = store_with_two();
    let before = store.list_detectors().unwrap();
    let config = RunConfig::default().with_dry_run(true);

    let summary = edit(&store, &edit_csv(&[("1", "A_1", "1"), ("2", "A_2", "2")]), &config);

    assert_eq!(summary.updated, 2);
    assert_eq!(
        summary.final_line(),
        "Finished editing 2 out of 2 event detectors with 0 errors (dry run, nothing committed)"
    );
    assert_eq!(store.list_detectors().unwrap(), before);
}
