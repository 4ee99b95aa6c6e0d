// ✅ Field Validator - Rules as data
// Each column is bound to a typed FieldRule; cross-field rules run after
// every per-field check has passed.

use crate::config::{BlankPolicy, RunConfig};
use crate::detector::{AlarmLevel, DataPointType, DetectorType, DurationUnit};
use crate::error::{ErrorKind, RecordError};
use crate::parser::BatchRecord;
use std::collections::HashMap;
use std::str::FromStr;

// ============================================================================
// FIELDS
// ============================================================================

/// Every property a batch column can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    DetectorId,
    DetectorXid,
    DataPointId,
    DataPointXid,
    DataPointName,
    DataPointType,
    DetectorType,
    Name,
    AlarmLevel,
    Limit,
    ResetLimit,
    UseResetLimit,
    LowLimit,
    HighLimit,
    WithinRange,
    StateValues,
    StateInverted,
    Duration,
    DurationType,
    HandlersToLink,
    HandlersToRemove,
}

/// Accepted spellings for a boolean cell (case-insensitive)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolStyle {
    /// true / false
    TrueFalse,
    /// true / false / yes / no
    YesNo,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind {
    Text,
    Integer { min: Option<i64>, max: Option<i64> },
    Float { min: Option<f64>, max: Option<f64> },
    Bool(BoolStyle),
    DetectorType(&'static [DetectorType]),
    AlarmLevel,
    DurationUnit,
    DataPointType,
    /// Sub-list split on the list delimiter
    List,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    DetectorType(DetectorType),
    AlarmLevel(AlarmLevel),
    DurationUnit(DurationUnit),
    DataPointType(DataPointType),
    List(Vec<String>),
}

/// Outcome of validating one cell
#[derive(Debug, Clone, PartialEq)]
pub enum FieldState {
    /// Blank or sentinel: leave the property alone
    Unchanged,
    /// Blank under the `clear` policy: reset to the default
    Clear,
    Set(FieldValue),
}

// ============================================================================
// FIELD RULE
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct FieldRule {
    pub column: &'static str,
    pub field: Field,
    pub kind: FieldKind,
    pub required: bool,
    /// Blank may mean "clear" when the blank policy says so
    pub clearable: bool,
}

impl FieldRule {
    pub fn new(column: &'static str, field: Field, kind: FieldKind) -> Self {
        FieldRule {
            column,
            field,
            kind,
            required: false,
            clearable: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn clearable(mut self) -> Self {
        self.clearable = true;
        self
    }

    /// Validate one cleaned cell
    pub fn check(&self, raw: &str, config: &RunConfig) -> Result<FieldState, RecordError> {
        if raw.is_empty() || config.is_sentinel(raw) {
            if self.required {
                return Err(RecordError::missing(self.column));
            }
            let blank_clears = raw.is_empty()
                && self.clearable
                && config.blank_policy == BlankPolicy::Clear
                && self.kind != FieldKind::List;
            return Ok(if blank_clears {
                FieldState::Clear
            } else {
                FieldState::Unchanged
            });
        }

        let value = match self.kind {
            FieldKind::Text => FieldValue::Text(raw.to_string()),
            FieldKind::Integer { min, max } => {
                let n = raw
                    .parse::<i64>()
                    .map_err(|_| RecordError::invalid_number(self.column, raw))?;
                self.check_range(n as f64, min.map(|m| m as f64), max.map(|m| m as f64), raw)?;
                FieldValue::Integer(n)
            }
            FieldKind::Float { min, max } => {
                let n = raw
                    .parse::<f64>()
                    .ok()
                    .filter(|n| n.is_finite())
                    .ok_or_else(|| RecordError::invalid_number(self.column, raw))?;
                self.check_range(n, min, max, raw)?;
                FieldValue::Float(n)
            }
            FieldKind::Bool(style) => FieldValue::Bool(parse_bool(raw, style).ok_or_else(|| {
                RecordError::new(
                    ErrorKind::UnsupportedValue,
                    format!("{} {}: must be {}", self.column, raw, style.describe()),
                )
                .on(self.column)
            })?),
            FieldKind::DetectorType(allowed) => {
                let t = self.parse_enum::<DetectorType>(raw)?;
                if !allowed.contains(&t) {
                    return Err(RecordError::unsupported(self.column, raw));
                }
                FieldValue::DetectorType(t)
            }
            FieldKind::AlarmLevel => FieldValue::AlarmLevel(self.parse_enum(raw)?),
            FieldKind::DurationUnit => FieldValue::DurationUnit(self.parse_enum(raw)?),
            FieldKind::DataPointType => FieldValue::DataPointType(self.parse_enum(raw)?),
            FieldKind::List => {
                let items = config.split_list(raw);
                if items.is_empty() {
                    return Ok(FieldState::Unchanged);
                }
                FieldValue::List(items)
            }
        };

        Ok(FieldState::Set(value))
    }

    fn parse_enum<T: FromStr>(&self, raw: &str) -> Result<T, RecordError> {
        raw.parse::<T>()
            .map_err(|_| RecordError::unsupported(self.column, raw))
    }

    fn check_range(
        &self,
        n: f64,
        min: Option<f64>,
        max: Option<f64>,
        raw: &str,
    ) -> Result<(), RecordError> {
        let below = min.map_or(false, |m| n < m);
        let above = max.map_or(false, |m| n > m);
        if below || above {
            return Err(RecordError::new(
                ErrorKind::UnsupportedValue,
                format!("{} {}: out of range", self.column, raw),
            )
            .on(self.column));
        }
        Ok(())
    }
}

impl BoolStyle {
    fn describe(&self) -> &'static str {
        match self {
            BoolStyle::TrueFalse => "'true' or 'false'",
            BoolStyle::YesNo => "'true', 'false', 'yes' or 'no'",
        }
    }
}

fn parse_bool(raw: &str, style: BoolStyle) -> Option<bool> {
    match (raw.to_lowercase().as_str(), style) {
        ("true", _) => Some(true),
        ("false", _) => Some(false),
        ("yes", BoolStyle::YesNo) => Some(true),
        ("no", BoolStyle::YesNo) => Some(false),
        _ => None,
    }
}

// ============================================================================
// VALIDATED RECORD
// ============================================================================

/// Typed view of one record after every rule passed
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRecord {
    pub index: usize,
    values: HashMap<Field, FieldState>,
}

impl ValidatedRecord {
    pub fn new(index: usize) -> Self {
        ValidatedRecord {
            index,
            values: HashMap::new(),
        }
    }

    /// Builder used by tests and by callers that assemble records by hand
    pub fn with(mut self, field: Field, state: FieldState) -> Self {
        self.values.insert(field, state);
        self
    }

    pub fn state(&self, field: Field) -> &FieldState {
        self.values.get(&field).unwrap_or(&FieldState::Unchanged)
    }

    pub fn value(&self, field: Field) -> Option<&FieldValue> {
        match self.state(field) {
            FieldState::Set(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_set(&self, field: Field) -> bool {
        self.value(field).is_some()
    }

    pub fn is_clear(&self, field: Field) -> bool {
        matches!(self.state(field), FieldState::Clear)
    }

    pub fn text(&self, field: Field) -> Option<&str> {
        match self.value(field) {
            Some(FieldValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn integer(&self, field: Field) -> Option<i64> {
        match self.value(field) {
            Some(FieldValue::Integer(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn float(&self, field: Field) -> Option<f64> {
        match self.value(field) {
            Some(FieldValue::Float(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn boolean(&self, field: Field) -> Option<bool> {
        match self.value(field) {
            Some(FieldValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn detector_type(&self, field: Field) -> Option<DetectorType> {
        match self.value(field) {
            Some(FieldValue::DetectorType(t)) => Some(*t),
            _ => None,
        }
    }

    pub fn alarm_level(&self, field: Field) -> Option<AlarmLevel> {
        match self.value(field) {
            Some(FieldValue::AlarmLevel(l)) => Some(*l),
            _ => None,
        }
    }

    pub fn duration_unit(&self, field: Field) -> Option<DurationUnit> {
        match self.value(field) {
            Some(FieldValue::DurationUnit(u)) => Some(*u),
            _ => None,
        }
    }

    pub fn data_point_type(&self, field: Field) -> Option<DataPointType> {
        match self.value(field) {
            Some(FieldValue::DataPointType(t)) => Some(*t),
            _ => None,
        }
    }

    pub fn list(&self, field: Field) -> Option<&[String]> {
        match self.value(field) {
            Some(FieldValue::List(items)) => Some(items),
            _ => None,
        }
    }
}

// ============================================================================
// VALIDATION
// ============================================================================

/// Rule that looks at several fields at once
pub type CrossRule = fn(&ValidatedRecord) -> Result<(), RecordError>;

/// Run every field rule, then (only if all passed) every cross-field rule.
/// All failures of the failing stage are returned.
pub fn validate_record(
    record: &BatchRecord,
    rules: &[FieldRule],
    cross_rules: &[CrossRule],
    config: &RunConfig,
) -> Result<ValidatedRecord, Vec<RecordError>> {
    let mut validated = ValidatedRecord::new(record.index);
    let mut errors = Vec::new();

    for rule in rules {
        let raw = record.get(rule.column).unwrap_or("");
        match rule.check(raw, config) {
            Ok(state) => {
                validated.values.insert(rule.field, state);
            }
            Err(e) => errors.push(e),
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    let cross_errors: Vec<RecordError> = cross_rules
        .iter()
        .filter_map(|rule| rule(&validated).err())
        .collect();

    if cross_errors.is_empty() {
        Ok(validated)
    } else {
        Err(cross_errors)
    }
}

// ============================================================================
// TESTS
// ============================================================================
