// 🚨 Event Detector Domain - Detectors, data points, handlers
//
// A detector watches one data point and raises alarms through linked handlers.
// Identity: internal `id` (assigned by the store) + external `xid` (stable, user-facing).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// DETECTOR TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DetectorType {
    LowLimit,
    HighLimit,
    MultistateState,
    BinaryState,
    NoUpdate,
    Update,
    PointChange,
    Range,
}

impl DetectorType {
    pub const ALL: [DetectorType; 8] = [
        DetectorType::LowLimit,
        DetectorType::HighLimit,
        DetectorType::MultistateState,
        DetectorType::BinaryState,
        DetectorType::NoUpdate,
        DetectorType::Update,
        DetectorType::PointChange,
        DetectorType::Range,
    ];

    /// Types a batch may create
    pub const CREATABLE: [DetectorType; 6] = [
        DetectorType::LowLimit,
        DetectorType::HighLimit,
        DetectorType::MultistateState,
        DetectorType::BinaryState,
        DetectorType::NoUpdate,
        DetectorType::Update,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DetectorType::LowLimit => "LOW_LIMIT",
            DetectorType::HighLimit => "HIGH_LIMIT",
            DetectorType::MultistateState => "MULTISTATE_STATE",
            DetectorType::BinaryState => "BINARY_STATE",
            DetectorType::NoUpdate => "NO_UPDATE",
            DetectorType::Update => "UPDATE",
            DetectorType::PointChange => "POINT_CHANGE",
            DetectorType::Range => "RANGE",
        }
    }

    pub fn is_limit(&self) -> bool {
        matches!(self, DetectorType::LowLimit | DetectorType::HighLimit)
    }

    pub fn is_range(&self) -> bool {
        matches!(self, DetectorType::Range)
    }

    pub fn is_state(&self) -> bool {
        matches!(self, DetectorType::MultistateState | DetectorType::BinaryState)
    }

    /// UPDATE and POINT_CHANGE fire on every change, so duration is meaningless
    pub fn supports_duration(&self) -> bool {
        !matches!(self, DetectorType::Update | DetectorType::PointChange)
    }
}

impl fmt::Display for DetectorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DetectorType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DetectorType::ALL
            .iter()
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown detector type: {}", s))
    }
}

// ============================================================================
// ALARM LEVEL
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlarmLevel {
    None,
    Information,
    Important,
    Warning,
    Urgent,
    Critical,
    LifeSafety,
    DoNotLog,
    Ignore,
}

impl AlarmLevel {
    pub const ALL: [AlarmLevel; 9] = [
        AlarmLevel::None,
        AlarmLevel::Information,
        AlarmLevel::Important,
        AlarmLevel::Warning,
        AlarmLevel::Urgent,
        AlarmLevel::Critical,
        AlarmLevel::LifeSafety,
        AlarmLevel::DoNotLog,
        AlarmLevel::Ignore,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlarmLevel::None => "NONE",
            AlarmLevel::Information => "INFORMATION",
            AlarmLevel::Important => "IMPORTANT",
            AlarmLevel::Warning => "WARNING",
            AlarmLevel::Urgent => "URGENT",
            AlarmLevel::Critical => "CRITICAL",
            AlarmLevel::LifeSafety => "LIFE_SAFETY",
            AlarmLevel::DoNotLog => "DO_NOT_LOG",
            AlarmLevel::Ignore => "IGNORE",
        }
    }
}

impl fmt::Display for AlarmLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlarmLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AlarmLevel::ALL
            .iter()
            .find(|l| l.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown alarm level: {}", s))
    }
}

// ============================================================================
// DURATION UNIT
// ============================================================================

/// Time unit for detector durations. Codes 1-4 appear in exported CSVs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DurationUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl DurationUnit {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(DurationUnit::Seconds),
            2 => Some(DurationUnit::Minutes),
            3 => Some(DurationUnit::Hours),
            4 => Some(DurationUnit::Days),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DurationUnit::Seconds => "SECONDS",
            DurationUnit::Minutes => "MINUTES",
            DurationUnit::Hours => "HOURS",
            DurationUnit::Days => "DAYS",
        }
    }
}

impl FromStr for DurationUnit {
    type Err = String;

    /// Accepts a code (`1`..`4`) or a name (`MINUTES`, case-insensitive)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(code) = s.parse::<i64>() {
            return DurationUnit::from_code(code)
                .ok_or_else(|| format!("duration type {} not supported, expected 1, 2, 3 or 4", s));
        }
        match s.to_uppercase().as_str() {
            "SECONDS" => Ok(DurationUnit::Seconds),
            "MINUTES" => Ok(DurationUnit::Minutes),
            "HOURS" => Ok(DurationUnit::Hours),
            "DAYS" => Ok(DurationUnit::Days),
            _ => Err(format!("unknown duration type: {}", s)),
        }
    }
}

// ============================================================================
// DATA POINT + EVENT HANDLER (parent and linked entities)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataPointType {
    Binary,
    Multistate,
    Numeric,
    Alphanumeric,
}

impl DataPointType {
    pub const ALL: [DataPointType; 4] = [
        DataPointType::Binary,
        DataPointType::Multistate,
        DataPointType::Numeric,
        DataPointType::Alphanumeric,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataPointType::Binary => "BINARY",
            DataPointType::Multistate => "MULTISTATE",
            DataPointType::Numeric => "NUMERIC",
            DataPointType::Alphanumeric => "ALPHANUMERIC",
        }
    }
}

impl fmt::Display for DataPointType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataPointType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DataPointType::ALL
            .iter()
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown data point type: {}", s))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    #[serde(default)]
    pub id: i64,
    pub xid: String,
    pub name: String,
    pub data_type: DataPointType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventHandler {
    #[serde(default)]
    pub id: i64,
    pub xid: String,
    pub name: String,
}

// ============================================================================
// STATE VALUES
// ============================================================================

/// Parsed contents of a state-values cell
#[derive(Debug, Clone, PartialEq)]
pub enum StateSetting {
    /// Single multistate value
    Single(i32),
    /// Several multistate values
    Many(Vec<i32>),
    /// Binary state stored as 0/1
    Binary(bool),
}

impl StateSetting {
    /// Interpret raw list items for a point of the given data type
    pub fn parse(items: &[String], point_type: DataPointType) -> Result<Self, String> {
        match point_type {
            DataPointType::Multistate => {
                let values = items
                    .iter()
                    .map(|v| {
                        v.parse::<i32>()
                            .map_err(|_| format!("state value {} is not an integer", v))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                match values.len() {
                    0 => Err("no state values given".to_string()),
                    1 => Ok(StateSetting::Single(values[0])),
                    _ => Ok(StateSetting::Many(values)),
                }
            }
            DataPointType::Binary => {
                if items.len() != 1 {
                    return Err(format!(
                        "binary points take exactly one state value, got {}",
                        items.len()
                    ));
                }
                match items[0].to_lowercase().as_str() {
                    "true" | "1" => Ok(StateSetting::Binary(true)),
                    "false" | "0" => Ok(StateSetting::Binary(false)),
                    other => Err(format!("binary state value {} not supported", other)),
                }
            }
            other => Err(format!("state values not supported for {} points", other)),
        }
    }

    /// (state, states) pair as stored on the detector
    pub fn to_fields(&self) -> (Option<i32>, Option<Vec<i32>>) {
        match self {
            StateSetting::Single(v) => (Some(*v), None),
            StateSetting::Many(vs) => (None, Some(vs.clone())),
            StateSetting::Binary(b) => (Some(i32::from(*b)), None),
        }
    }
}

// ============================================================================
// EVENT DETECTOR ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDetector {
    // ========================================================================
    // IDENTITY
    // ========================================================================
    /// Internal id, 0 until inserted
    #[serde(default)]
    pub id: i64,

    /// External identifier, stable across edits
    pub xid: String,

    pub data_point_id: i64,
    pub detector_type: DetectorType,

    // ========================================================================
    // MUTABLE PROPERTIES
    // ========================================================================
    pub name: String,
    pub alarm_level: AlarmLevel,

    pub limit: Option<f64>,
    pub reset_limit: Option<f64>,
    pub use_reset_limit: bool,

    pub low: Option<f64>,
    pub high: Option<f64>,
    pub within_range: bool,

    pub state: Option<i32>,
    pub states: Option<Vec<i32>>,
    pub inverted: bool,

    pub duration: i64,
    pub duration_type: DurationUnit,
    pub reset_duration: i64,
    pub reset_duration_type: DurationUnit,

    #[serde(default)]
    pub event_handler_xids: Vec<String>,
}

impl EventDetector {
    /// Fresh detector of the given type attached to a data point
    pub fn template(detector_type: DetectorType, point: &DataPoint) -> Self {
        EventDetector {
            xid: generate_xid("ED_"),
            ..Self::defaults(detector_type, point.id)
        }
    }

    /// Per-type default values, with no identity
    pub fn defaults(detector_type: DetectorType, data_point_id: i64) -> Self {
        EventDetector {
            id: 0,
            xid: String::new(),
            data_point_id,
            detector_type,
            name: String::new(),
            alarm_level: AlarmLevel::None,
            limit: None,
            reset_limit: None,
            use_reset_limit: false,
            low: None,
            high: None,
            within_range: false,
            state: None,
            states: None,
            inverted: false,
            duration: 0,
            duration_type: DurationUnit::Seconds,
            reset_duration: 0,
            reset_duration_type: DurationUnit::Seconds,
            event_handler_xids: Vec::new(),
        }
    }

    /// State values rendered the way an export CSV lists them
    pub fn state_values_display(&self, list_delimiter: char) -> String {
        match (&self.states, self.state) {
            (Some(states), _) => states
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
                .join(&list_delimiter.to_string()),
            (None, Some(state)) => state.to_string(),
            (None, None) => String::new(),
        }
    }
}

/// Generate a new external identifier with the given prefix
pub fn generate_xid(prefix: &str) -> String {
    format!("{}{}", prefix, uuid::Uuid::new_v4())
}

// ============================================================================
// TESTS
// ============================================================================
