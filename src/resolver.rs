// 🔎 Entity Resolver - XID → live entity, guarded by the declared id
// No caching: an earlier record in the same run may have changed the store.

use crate::detector::{DataPoint, EventDetector};
use crate::error::{ErrorKind, RecordError};
use crate::store::DetectorStore;
use tracing::warn;

/// How unknown handler XIDs are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerLookup {
    /// Any unknown XID fails the record with NotFound
    Strict,
    /// Unknown XIDs are logged and dropped
    Lenient,
}

/// Look up a detector and compare the declared internal id with the stored one
pub fn resolve_detector(
    store: &dyn DetectorStore,
    xid: &str,
    declared_id: Option<&str>,
) -> Result<EventDetector, RecordError> {
    let detector = store
        .get_detector(xid)
        .map_err(|e| e.into_lookup_error().on("eventDetectorXid"))?;

    if let Some(declared) = declared_id {
        check_identifier("eventDetectorId", declared, detector.id, xid)?;
    }
    Ok(detector)
}

/// Look up a data point and compare the declared internal id with the stored one
pub fn resolve_data_point(
    store: &dyn DetectorStore,
    xid: &str,
    declared_id: Option<&str>,
) -> Result<DataPoint, RecordError> {
    let point = store
        .get_data_point(xid)
        .map_err(|e| e.into_lookup_error().on("dataPointXid"))?;

    if let Some(declared) = declared_id {
        check_identifier("dataPointId", declared, point.id, xid)?;
    }
    Ok(point)
}

/// Check every handler XID exists. Order is kept, duplicates are dropped.
pub fn resolve_handlers(
    store: &dyn DetectorStore,
    xids: &[String],
    mode: HandlerLookup,
    column: &str,
) -> Result<Vec<String>, RecordError> {
    let mut found: Vec<String> = Vec::with_capacity(xids.len());

    for xid in xids {
        match store.get_event_handler(xid) {
            Ok(handler) => {
                if !found.contains(&handler.xid) {
                    found.push(handler.xid);
                }
            }
            Err(e) if e.is_not_found() && mode == HandlerLookup::Lenient => {
                warn!(handler = %xid, column, "Event handler not found, skipping");
            }
            Err(e) => return Err(e.into_lookup_error().on(column)),
        }
    }

    Ok(found)
}

/// Declared id must parse strictly and equal the resolved id
fn check_identifier(column: &str, declared: &str, actual: i64, xid: &str) -> Result<(), RecordError> {
    let declared_id = declared
        .parse::<i64>()
        .map_err(|_| RecordError::invalid_number(column, declared))?;

    if declared_id != actual {
        return Err(RecordError::new(
            ErrorKind::IdentifierMismatch,
            format!(
                "{} {} does not match id {} resolved from XID {}",
                column, declared_id, actual, xid
            ),
        )
        .on(column));
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
