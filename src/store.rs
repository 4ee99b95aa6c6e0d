// 🗄️ Detector Store - The target system the batch reconciles against
//
// `DetectorStore` is the collaborator contract: lookups, server-side validation,
// insert/update/delete and a parent reload. `SqliteStore` implements it on
// rusqlite and writes an audit event for every mutation.

use crate::detector::{DataPoint, DataPointType, DetectorType, EventDetector, EventHandler};
use crate::error::StoreError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

pub const MAX_NAME_LENGTH: usize = 255;

pub const ACTOR: &str = "detector_batch";

// ============================================================================
// COLLABORATOR INTERFACE
// ============================================================================

pub trait DetectorStore {
    fn get_detector(&self, xid: &str) -> Result<EventDetector, StoreError>;

    fn get_data_point(&self, xid: &str) -> Result<DataPoint, StoreError>;

    fn get_data_point_by_id(&self, id: i64) -> Result<DataPoint, StoreError>;

    fn get_event_handler(&self, xid: &str) -> Result<EventHandler, StoreError>;

    /// Server-side semantic validation. Empty means valid.
    fn validate(&self, detector: &EventDetector) -> Result<Vec<String>, StoreError>;

    /// Insert a new detector and assign its internal id
    fn insert(&self, detector: &mut EventDetector) -> Result<(), StoreError>;

    /// Replace the stored detector identified by `xid`
    fn update(&self, xid: &str, detector: &EventDetector) -> Result<(), StoreError>;

    fn delete(&self, xid: &str) -> Result<(), StoreError>;

    /// Ask the owning data point to refresh its cached detectors
    fn reload_data_point(&self, data_point_id: i64) -> Result<(), StoreError>;

    fn list_detectors(&self) -> Result<Vec<EventDetector>, StoreError>;

    fn record_event(&self, event: &Event) -> Result<(), StoreError>;
}

// ============================================================================
// AUDIT EVENTS
// ============================================================================

/// Audit trail entry. Every mutation is an event.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

pub const ENTITY_DETECTOR: &str = "event_detector";
pub const ENTITY_DATA_POINT: &str = "data_point";
pub const ENTITY_BATCH_RUN: &str = "batch_run";

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> rusqlite::Result<()> {
    // Enable WAL mode for crash recovery (no-op for in-memory databases)
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS data_points (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            xid TEXT UNIQUE NOT NULL,
            name TEXT NOT NULL,
            data_type TEXT NOT NULL,
            reloaded_at TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS event_handlers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            xid TEXT UNIQUE NOT NULL,
            name TEXT NOT NULL
        )",
        [],
    )?;

    // Row columns for lookups, full detector as JSON in `data`
    conn.execute(
        "CREATE TABLE IF NOT EXISTS event_detectors (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            xid TEXT UNIQUE NOT NULL,
            data_point_id INTEGER NOT NULL REFERENCES data_points(id),
            type_name TEXT NOT NULL,
            data TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Events Table (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_detectors_data_point ON event_detectors(data_point_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp)",
        [],
    )?;

    Ok(())
}

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<(), StoreError> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Get events for a specific entity, newest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY timestamp DESC, id DESC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let timestamp_str: String = row.get(1)?;
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                    .map_err(|e| conversion_error(1, e))?
                    .with_timezone(&Utc),
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json).map_err(|e| conversion_error(5, e))?,
                actor: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

fn conversion_error<E>(column: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(err))
}

// ============================================================================
// SEED FIXTURES
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct SeedFixture {
    #[serde(default)]
    pub data_points: Vec<DataPoint>,
    #[serde(default)]
    pub event_handlers: Vec<EventHandler>,
    #[serde(default)]
    pub event_detectors: Vec<SeedDetector>,
}

/// Detector fixture addressed by its data point's XID
#[derive(Debug, Deserialize)]
pub struct SeedDetector {
    pub data_point_xid: String,
    #[serde(flatten)]
    pub detector: EventDetector,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SeedCounts {
    pub data_points: usize,
    pub event_handlers: usize,
    pub event_detectors: usize,
}

// ============================================================================
// SQLITE STORE
// ============================================================================

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        setup_database(&conn)?;
        Ok(SqliteStore { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn add_data_point(
        &self,
        xid: &str,
        name: &str,
        data_type: DataPointType,
    ) -> Result<DataPoint, StoreError> {
        self.conn.execute(
            "INSERT INTO data_points (xid, name, data_type) VALUES (?1, ?2, ?3)",
            params![xid, name, data_type.as_str()],
        )?;
        Ok(DataPoint {
            id: self.conn.last_insert_rowid(),
            xid: xid.to_string(),
            name: name.to_string(),
            data_type,
        })
    }

    pub fn add_event_handler(&self, xid: &str, name: &str) -> Result<EventHandler, StoreError> {
        self.conn.execute(
            "INSERT INTO event_handlers (xid, name) VALUES (?1, ?2)",
            params![xid, name],
        )?;
        Ok(EventHandler {
            id: self.conn.last_insert_rowid(),
            xid: xid.to_string(),
            name: name.to_string(),
        })
    }

    /// Load data points, handlers and detectors from a JSON fixture
    pub fn seed_from_json(&self, content: &str) -> Result<SeedCounts, StoreError> {
        let fixture: SeedFixture = serde_json::from_str(content)?;
        let mut counts = SeedCounts::default();

        for point in &fixture.data_points {
            self.add_data_point(&point.xid, &point.name, point.data_type)?;
            counts.data_points += 1;
        }
        for handler in &fixture.event_handlers {
            self.add_event_handler(&handler.xid, &handler.name)?;
            counts.event_handlers += 1;
        }
        for seed in fixture.event_detectors {
            let point = self.get_data_point(&seed.data_point_xid)?;
            let mut detector = seed.detector;
            detector.data_point_id = point.id;
            self.insert(&mut detector)?;
            counts.event_detectors += 1;
        }

        debug!(
            data_points = counts.data_points,
            event_handlers = counts.event_handlers,
            event_detectors = counts.event_detectors,
            "Seeded store"
        );
        Ok(counts)
    }

    pub fn seed_from_file<P: AsRef<Path>>(&self, path: P) -> Result<SeedCounts, StoreError> {
        let content = fs::read_to_string(path)?;
        self.seed_from_json(&content)
    }

    pub fn events_for(&self, entity_type: &str, entity_id: &str) -> Result<Vec<Event>, StoreError> {
        get_events_for_entity(&self.conn, entity_type, entity_id)
    }

    fn ensure_valid(&self, detector: &EventDetector) -> Result<(), StoreError> {
        let messages = self.validate(detector)?;
        if messages.is_empty() {
            Ok(())
        } else {
            Err(StoreError::Rejected(messages.join("; ")))
        }
    }

    fn row_to_detector(id: i64, xid: String, data: &str) -> Result<EventDetector, StoreError> {
        let mut detector: EventDetector = serde_json::from_str(data)?;
        detector.id = id;
        detector.xid = xid;
        Ok(detector)
    }

    fn handler_exists(&self, xid: &str) -> Result<bool, StoreError> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM event_handlers WHERE xid = ?1",
                params![xid],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

fn row_to_data_point(row: &rusqlite::Row) -> rusqlite::Result<DataPoint> {
    let type_name: String = row.get(3)?;
    let data_type = type_name.parse::<DataPointType>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, e.into())
    })?;
    Ok(DataPoint {
        id: row.get(0)?,
        xid: row.get(1)?,
        name: row.get(2)?,
        data_type,
    })
}

impl DetectorStore for SqliteStore {
    fn get_detector(&self, xid: &str) -> Result<EventDetector, StoreError> {
        let row: Option<(i64, String, String)> = self
            .conn
            .query_row(
                "SELECT id, xid, data FROM event_detectors WHERE xid = ?1",
                params![xid],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        match row {
            Some((id, xid, data)) => Self::row_to_detector(id, xid, &data),
            None => Err(StoreError::NotFound {
                entity: "Event detector",
                xid: xid.to_string(),
            }),
        }
    }

    fn get_data_point(&self, xid: &str) -> Result<DataPoint, StoreError> {
        self.conn
            .query_row(
                "SELECT id, xid, name, data_type FROM data_points WHERE xid = ?1",
                params![xid],
                row_to_data_point,
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound {
                entity: "Data point",
                xid: xid.to_string(),
            })
    }

    fn get_data_point_by_id(&self, id: i64) -> Result<DataPoint, StoreError> {
        self.conn
            .query_row(
                "SELECT id, xid, name, data_type FROM data_points WHERE id = ?1",
                params![id],
                row_to_data_point,
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound {
                entity: "Data point",
                xid: format!("#{}", id),
            })
    }

    fn get_event_handler(&self, xid: &str) -> Result<EventHandler, StoreError> {
        self.conn
            .query_row(
                "SELECT id, xid, name FROM event_handlers WHERE xid = ?1",
                params![xid],
                |row| {
                    Ok(EventHandler {
                        id: row.get(0)?,
                        xid: row.get(1)?,
                        name: row.get(2)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound {
                entity: "Event handler",
                xid: xid.to_string(),
            })
    }

    fn validate(&self, detector: &EventDetector) -> Result<Vec<String>, StoreError> {
        let mut messages = Vec::new();

        if detector.name.chars().count() > MAX_NAME_LENGTH {
            messages.push(format!("name: must be at most {} characters", MAX_NAME_LENGTH));
        }
        if detector.duration < 0 {
            messages.push("duration: must not be negative".to_string());
        }
        if detector.reset_duration < 0 {
            messages.push("resetDuration: must not be negative".to_string());
        }

        match detector.detector_type {
            DetectorType::HighLimit | DetectorType::LowLimit => match detector.limit {
                None => messages.push(format!(
                    "limit: required for {} detectors",
                    detector.detector_type
                )),
                Some(limit) if detector.use_reset_limit => match detector.reset_limit {
                    None => messages.push("resetLimit: required when useResetLimit is set".to_string()),
                    Some(reset) => {
                        if detector.detector_type == DetectorType::HighLimit && reset >= limit {
                            messages.push("resetLimit: must be less than limit".to_string());
                        }
                        if detector.detector_type == DetectorType::LowLimit && reset <= limit {
                            messages.push("resetLimit: must be greater than limit".to_string());
                        }
                    }
                },
                Some(_) => {}
            },
            DetectorType::Range => match (detector.low, detector.high) {
                (Some(low), Some(high)) if low > high => {
                    messages.push("low: must be less than or equal to high".to_string())
                }
                (Some(_), Some(_)) => {}
                _ => messages.push("low/high: both limits required for RANGE detectors".to_string()),
            },
            DetectorType::MultistateState => {
                if detector.state.is_none() && detector.states.as_ref().map_or(true, |s| s.is_empty()) {
                    messages.push("state: a state or states are required".to_string());
                }
            }
            DetectorType::BinaryState => {
                if !matches!(detector.state, Some(0) | Some(1)) {
                    messages.push("state: binary state must be 0 or 1".to_string());
                }
            }
            DetectorType::NoUpdate | DetectorType::Update | DetectorType::PointChange => {}
        }

        for xid in &detector.event_handler_xids {
            if !self.handler_exists(xid)? {
                messages.push(format!("eventHandlerXids: handler {} does not exist", xid));
            }
        }

        match self.get_data_point_by_id(detector.data_point_id) {
            Ok(point) => {
                let compatible = match detector.detector_type {
                    DetectorType::MultistateState => point.data_type == DataPointType::Multistate,
                    DetectorType::BinaryState => point.data_type == DataPointType::Binary,
                    _ => true,
                };
                if !compatible {
                    messages.push(format!(
                        "detectorType: {} is not valid for {} points",
                        detector.detector_type, point.data_type
                    ));
                }
            }
            Err(e) if e.is_not_found() => {
                messages.push(format!("dataPointId: data point {} does not exist", detector.data_point_id))
            }
            Err(e) => return Err(e),
        }

        Ok(messages)
    }

    fn insert(&self, detector: &mut EventDetector) -> Result<(), StoreError> {
        self.ensure_valid(detector)?;

        let tx = self.conn.unchecked_transaction()?;
        let data = serde_json::to_string(&*detector)?;
        tx.execute(
            "INSERT INTO event_detectors (xid, data_point_id, type_name, data) VALUES (?1, ?2, ?3, ?4)",
            params![
                detector.xid,
                detector.data_point_id,
                detector.detector_type.as_str(),
                data
            ],
        )?;
        detector.id = tx.last_insert_rowid();

        let event = Event::new(
            "detector_created",
            ENTITY_DETECTOR,
            &detector.xid,
            serde_json::to_value(&*detector)?,
            ACTOR,
        );
        insert_event(&tx, &event)?;
        tx.commit()?;
        Ok(())
    }

    fn update(&self, xid: &str, detector: &EventDetector) -> Result<(), StoreError> {
        self.ensure_valid(detector)?;

        let tx = self.conn.unchecked_transaction()?;
        let data = serde_json::to_string(detector)?;
        let changed = tx.execute(
            "UPDATE event_detectors
             SET xid = ?1, data_point_id = ?2, type_name = ?3, data = ?4, updated_at = CURRENT_TIMESTAMP
             WHERE xid = ?5",
            params![
                detector.xid,
                detector.data_point_id,
                detector.detector_type.as_str(),
                data,
                xid
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                entity: "Event detector",
                xid: xid.to_string(),
            });
        }

        let event = Event::new(
            "detector_updated",
            ENTITY_DETECTOR,
            &detector.xid,
            serde_json::to_value(detector)?,
            ACTOR,
        );
        insert_event(&tx, &event)?;
        tx.commit()?;
        Ok(())
    }

    fn delete(&self, xid: &str) -> Result<(), StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        let removed = tx.execute("DELETE FROM event_detectors WHERE xid = ?1", params![xid])?;
        if removed == 0 {
            return Err(StoreError::NotFound {
                entity: "Event detector",
                xid: xid.to_string(),
            });
        }

        let event = Event::new(
            "detector_deleted",
            ENTITY_DETECTOR,
            xid,
            serde_json::json!({ "xid": xid }),
            ACTOR,
        );
        insert_event(&tx, &event)?;
        tx.commit()?;
        Ok(())
    }

    fn reload_data_point(&self, data_point_id: i64) -> Result<(), StoreError> {
        let point = self.get_data_point_by_id(data_point_id)?;
        self.conn.execute(
            "UPDATE data_points SET reloaded_at = ?1 WHERE id = ?2",
            params![Utc::now().to_rfc3339(), data_point_id],
        )?;

        let event = Event::new(
            "data_point_reloaded",
            ENTITY_DATA_POINT,
            &point.xid,
            serde_json::json!({ "id": point.id }),
            ACTOR,
        );
        insert_event(&self.conn, &event)
    }

    fn list_detectors(&self) -> Result<Vec<EventDetector>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, xid, data FROM event_detectors ORDER BY id")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, xid, data)| Self::row_to_detector(id, xid, &data))
            .collect()
    }

    fn record_event(&self, event: &Event) -> Result<(), StoreError> {
        insert_event(&self.conn, event)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::{AlarmLevel, DurationUnit};

    fn setup() -> (SqliteStore, DataPoint) {
        let store = SqliteStore::open_in_memory().unwrap();
        let point = store
            .add_data_point("DP_TEMP", "Boiler temp", DataPointType::Numeric)
            .unwrap();
        store.add_event_handler("EH_EMAIL", "Email ops").unwrap();
        (store, point)
    }

    fn high_limit(point: &DataPoint, limit: f64) -> EventDetector {
        let mut det = EventDetector::template(DetectorType::HighLimit, point);
        det.xid = "ED_HIGH".to_string();
        det.name = "Too hot".to_string();
        det.limit = Some(limit);
        det
    }

    #[test]
    fn test_insert_assigns_id_and_roundtrips() {
        let (store, point) = setup();
        let mut det = high_limit(&point, 80.0);
        det.alarm_level = AlarmLevel::Urgent;
        det.event_handler_xids = vec!["EH_EMAIL".to_string()];

        store.insert(&mut det).unwrap();
        assert!(det.id > 0);

        let loaded = store.get_detector("ED_HIGH").unwrap();
        assert_eq!(loaded, det);

        println!("✅ Insert roundtrip test PASSED");
    }

    #[test]
    fn test_missing_detector_is_not_found() {
        let (store, _) = setup();
        let err = store.get_detector("ED_NOPE").unwrap_err();
        assert!(err.is_not_found());
        assert!(store.get_event_handler("EH_NOPE").unwrap_err().is_not_found());
        assert!(store.get_data_point("DP_NOPE").unwrap_err().is_not_found());
    }

    #[test]
    fn test_validate_limit_rules() {
        let (store, point) = setup();
        let mut det = high_limit(&point, 50.0);
        assert!(store.validate(&det).unwrap().is_empty());

        det.limit = None;
        let messages = store.validate(&det).unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("limit"));

        det.limit = Some(50.0);
        det.use_reset_limit = true;
        det.reset_limit = Some(60.0);
        let messages = store.validate(&det).unwrap();
        assert!(messages.iter().any(|m| m.contains("less than limit")));

        det.reset_limit = Some(45.0);
        assert!(store.validate(&det).unwrap().is_empty());
    }

    #[test]
    fn test_validate_other_rules() {
        let (store, point) = setup();
        let mut det = high_limit(&point, 50.0);
        det.name = "x".repeat(MAX_NAME_LENGTH + 1);
        det.duration = -1;
        det.event_handler_xids = vec!["EH_GHOST".to_string()];
        let messages = store.validate(&det).unwrap();
        assert_eq!(messages.len(), 3);

        let mut range = EventDetector::template(DetectorType::Range, &point);
        range.low = Some(10.0);
        range.high = Some(5.0);
        assert_eq!(store.validate(&range).unwrap().len(), 1);

        // Binary state on a numeric point
        let mut binary = EventDetector::template(DetectorType::BinaryState, &point);
        binary.state = Some(1);
        let messages = store.validate(&binary).unwrap();
        assert!(messages.iter().any(|m| m.contains("not valid for NUMERIC")));
    }

    #[test]
    fn test_insert_rejects_invalid() {
        let (store, point) = setup();
        let mut det = high_limit(&point, 50.0);
        det.limit = None;
        let err = store.insert(&mut det).unwrap_err();
        assert!(matches!(err, StoreError::Rejected(_)));
        assert!(store.list_detectors().unwrap().is_empty());
    }

    #[test]
    fn test_update_and_delete_write_audit_events() {
        let (store, point) = setup();
        let mut det = high_limit(&point, 50.0);
        store.insert(&mut det).unwrap();

        det.limit = Some(55.5);
        det.duration_type = DurationUnit::Minutes;
        store.update("ED_HIGH", &det).unwrap();
        assert_eq!(store.get_detector("ED_HIGH").unwrap().limit, Some(55.5));

        store.delete("ED_HIGH").unwrap();
        assert!(store.get_detector("ED_HIGH").unwrap_err().is_not_found());
        assert!(store.delete("ED_HIGH").unwrap_err().is_not_found());

        let events = store.events_for(ENTITY_DETECTOR, "ED_HIGH").unwrap();
        let types: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(types, vec!["detector_deleted", "detector_updated", "detector_created"]);

        println!("✅ Audit trail test PASSED");
    }

    #[test]
    fn test_reload_data_point() {
        let (store, point) = setup();
        store.reload_data_point(point.id).unwrap();
        let events = store.events_for(ENTITY_DATA_POINT, "DP_TEMP").unwrap();
        assert_eq!(events.len(), 1);
        assert!(store.reload_data_point(9999).unwrap_err().is_not_found());
    }

    #[test]
    fn test_seed_from_json() {
        let store = SqliteStore::open_in_memory().unwrap();
        let fixture = r#"{
            "data_points": [
                {"xid": "DP_A", "name": "Pump state", "data_type": "MULTISTATE"},
                {"xid": "DP_B", "name": "Flow", "data_type": "NUMERIC"}
            ],
            "event_handlers": [{"xid": "EH_1", "name": "Pager"}],
            "event_detectors": [{
                "data_point_xid": "DP_B",
                "xid": "ED_FLOW",
                "data_point_id": 0,
                "detector_type": "LOW_LIMIT",
                "name": "Low flow",
                "alarm_level": "WARNING",
                "limit": 2.5,
                "reset_limit": null,
                "use_reset_limit": false,
                "low": null,
                "high": null,
                "within_range": false,
                "state": null,
                "states": null,
                "inverted": false,
                "duration": 0,
                "duration_type": "SECONDS",
                "reset_duration": 0,
                "reset_duration_type": "SECONDS",
                "event_handler_xids": ["EH_1"]
            }]
        }"#;

        let counts = store.seed_from_json(fixture).unwrap();
        assert_eq!(
            counts,
            SeedCounts {
                data_points: 2,
                event_handlers: 1,
                event_detectors: 1
            }
        );

        let det = store.get_detector("ED_FLOW").unwrap();
        let flow = store.get_data_point("DP_B").unwrap();
        assert_eq!(det.data_point_id, flow.id);
        assert_eq!(det.limit, Some(2.5));
    }
}
