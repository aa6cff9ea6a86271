//! Change-log event model.
//!
//! # Responsibility
//! - Define the closed set of change kinds and their payload shapes.
//! - Validate payloads at the write boundary so folds can match exhaustively.
//!
//! # Invariants
//! - `Event::id` is assigned by the log and strictly increases per tenant.
//! - Events are immutable; corrections are new events.
//! - Stored kinds unknown to this build stay readable as
//!   [`EventBody::Unrecognized`] and are never rejected on read.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Log-assigned sequence id. Doubles as the sync version.
pub type EventId = i64;

/// Wire name of [`EventKind::RosterReplaced`].
pub const EVENT_TYPE_ROSTER_REPLACED: &str = "ROSTER_REPLACED";
/// Wire name of [`EventKind::AttendanceRecorded`].
pub const EVENT_TYPE_ATTENDANCE_RECORDED: &str = "ATTENDANCE_RECORDED";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Closed set of change kinds understood by this build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventKind {
    RosterReplaced,
    AttendanceRecorded,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RosterReplaced => EVENT_TYPE_ROSTER_REPLACED,
            Self::AttendanceRecorded => EVENT_TYPE_ATTENDANCE_RECORDED,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            EVENT_TYPE_ROSTER_REPLACED => Some(Self::RosterReplaced),
            EVENT_TYPE_ATTENDANCE_RECORDED => Some(Self::AttendanceRecorded),
            _ => None,
        }
    }
}

impl Display for EventKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Daily attendance status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceStatus {
    Present,
    Sick,
    Excused,
    Absent,
}

/// One roster entry.
///
/// On the wire a student is either a bare name or an object carrying an
/// optional guardian contact; both forms decode to this struct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StudentWire", into = "StudentWire")]
pub struct Student {
    pub name: String,
    pub guardian_contact: Option<String>,
}

impl Student {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            guardian_contact: None,
        }
    }

    pub fn with_guardian(name: impl Into<String>, contact: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            guardian_contact: Some(contact.into()),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum StudentWire {
    Name(String),
    Detailed {
        name: String,
        #[serde(
            rename = "guardianContact",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        guardian_contact: Option<String>,
    },
}

impl From<StudentWire> for Student {
    fn from(value: StudentWire) -> Self {
        match value {
            StudentWire::Name(name) => Self::new(name),
            StudentWire::Detailed {
                name,
                guardian_contact,
            } => Self {
                name,
                guardian_contact,
            },
        }
    }
}

impl From<Student> for StudentWire {
    fn from(value: Student) -> Self {
        match value.guardian_contact {
            None => Self::Name(value.name),
            Some(contact) => Self::Detailed {
                name: value.name,
                guardian_contact: Some(contact),
            },
        }
    }
}

/// `ROSTER_REPLACED` payload: the full student list of one class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterReplaced {
    pub class: String,
    pub students: Vec<Student>,
}

/// `ATTENDANCE_RECORDED` payload: the full status map of one class-day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecorded {
    pub class: String,
    /// Calendar date in `YYYY-MM-DD` form.
    pub date: String,
    pub status_map: BTreeMap<String, AttendanceStatus>,
}

/// Typed change payload, one variant per [`EventKind`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangePayload {
    RosterReplaced(RosterReplaced),
    AttendanceRecorded(AttendanceRecorded),
}

impl ChangePayload {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::RosterReplaced(_) => EventKind::RosterReplaced,
            Self::AttendanceRecorded(_) => EventKind::AttendanceRecorded,
        }
    }

    /// Decodes a loosely-typed `(type, payload)` pair and validates it.
    pub fn from_value(
        event_type: &str,
        payload: serde_json::Value,
    ) -> Result<Self, PayloadValidationError> {
        let kind = EventKind::parse(event_type)
            .ok_or_else(|| PayloadValidationError::UnknownEventType(event_type.to_string()))?;
        let decoded = match kind {
            EventKind::RosterReplaced => serde_json::from_value(payload).map(Self::RosterReplaced),
            EventKind::AttendanceRecorded => {
                serde_json::from_value(payload).map(Self::AttendanceRecorded)
            }
        }
        .map_err(|err| PayloadValidationError::Malformed {
            kind,
            message: err.to_string(),
        })?;
        decoded.validate()?;
        Ok(decoded)
    }

    /// Decodes a stored payload for a known kind without re-validating.
    pub fn from_json_str(kind: EventKind, payload: &str) -> Result<Self, serde_json::Error> {
        match kind {
            EventKind::RosterReplaced => serde_json::from_str(payload).map(Self::RosterReplaced),
            EventKind::AttendanceRecorded => {
                serde_json::from_str(payload).map(Self::AttendanceRecorded)
            }
        }
    }

    /// Serializes the payload body (without the type tag).
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        match self {
            Self::RosterReplaced(body) => serde_json::to_string(body),
            Self::AttendanceRecorded(body) => serde_json::to_string(body),
        }
    }

    pub fn to_json_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            Self::RosterReplaced(body) => serde_json::to_value(body),
            Self::AttendanceRecorded(body) => serde_json::to_value(body),
        }
    }

    /// Checks payload shape rules for the payload's kind.
    pub fn validate(&self) -> Result<(), PayloadValidationError> {
        match self {
            Self::RosterReplaced(roster) => {
                validate_class(&roster.class)?;
                let mut seen = BTreeSet::new();
                for (index, student) in roster.students.iter().enumerate() {
                    let name = student.name.trim();
                    if name.is_empty() {
                        return Err(PayloadValidationError::BlankStudentName { index });
                    }
                    if !seen.insert(name) {
                        return Err(PayloadValidationError::DuplicateStudent(name.to_string()));
                    }
                }
                Ok(())
            }
            Self::AttendanceRecorded(record) => {
                validate_class(&record.class)?;
                validate_date(&record.date)?;
                if record.status_map.keys().any(|name| name.trim().is_empty()) {
                    return Err(PayloadValidationError::BlankStatusKey);
                }
                Ok(())
            }
        }
    }
}

fn validate_class(class: &str) -> Result<(), PayloadValidationError> {
    if class.trim().is_empty() {
        return Err(PayloadValidationError::BlankClass);
    }
    Ok(())
}

fn validate_date(date: &str) -> Result<(), PayloadValidationError> {
    // chrono also accepts unpadded fields; only the zero-padded form is valid.
    match NaiveDate::parse_from_str(date, DATE_FORMAT) {
        Ok(parsed) if parsed.format(DATE_FORMAT).to_string() == date => Ok(()),
        _ => Err(PayloadValidationError::InvalidDate(date.to_string())),
    }
}

/// Event body as read back from the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventBody {
    Change(ChangePayload),
    /// Written by a newer build; carried through untouched.
    Unrecognized { event_type: String, payload: String },
}

impl EventBody {
    pub fn type_name(&self) -> &str {
        match self {
            Self::Change(payload) => payload.kind().as_str(),
            Self::Unrecognized { event_type, .. } => event_type.as_str(),
        }
    }
}

/// Immutable fact appended to a tenant's change log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub id: EventId,
    pub tenant_id: String,
    pub actor_id: String,
    pub body: EventBody,
    /// Unix epoch milliseconds. Informational only; `id` orders events.
    pub created_at_ms: i64,
}

impl Event {
    /// Renders the event in its wire shape.
    pub fn to_wire_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        let payload = match &self.body {
            EventBody::Change(change) => change.to_json_value()?,
            EventBody::Unrecognized { payload, .. } => serde_json::from_str(payload)
                .unwrap_or_else(|_| serde_json::Value::String(payload.clone())),
        };
        Ok(serde_json::json!({
            "id": self.id,
            "tenantId": self.tenant_id,
            "actorId": self.actor_id,
            "type": self.body.type_name(),
            "payload": payload,
            "createdAt": self.created_at_ms,
        }))
    }
}

/// Payload rejection reasons at the write boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadValidationError {
    UnknownEventType(String),
    Malformed { kind: EventKind, message: String },
    BlankClass,
    BlankStudentName { index: usize },
    DuplicateStudent(String),
    InvalidDate(String),
    BlankStatusKey,
}

impl Display for PayloadValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownEventType(value) => write!(f, "unknown event type `{value}`"),
            Self::Malformed { kind, message } => {
                write!(f, "malformed {kind} payload: {message}")
            }
            Self::BlankClass => write!(f, "class must not be blank"),
            Self::BlankStudentName { index } => {
                write!(f, "student name at index {index} must not be blank")
            }
            Self::DuplicateStudent(name) => write!(f, "student `{name}` is listed twice"),
            Self::InvalidDate(value) => {
                write!(f, "date `{value}` is not a valid YYYY-MM-DD calendar date")
            }
            Self::BlankStatusKey => write!(f, "status map contains a blank student name"),
        }
    }
}

impl Error for PayloadValidationError {}
