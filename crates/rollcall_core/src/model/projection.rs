//! Current-state projections derived from the change log.
//!
//! # Invariants
//! - Every key holds exactly the value of the highest-id event that targeted
//!   it; there is no field-level merge.
//! - Ordered maps keep serialization byte-for-byte deterministic.

use crate::model::event::{AttendanceStatus, Student};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Separator between class and date in attendance keys.
pub const ATTENDANCE_KEY_SEPARATOR: char = '|';

/// Student names mapped to their status for one class-day.
pub type StatusMap = BTreeMap<String, AttendanceStatus>;

/// Roster and attendance views for one tenant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Projections {
    /// Class name to current student list.
    pub roster: BTreeMap<String, Vec<Student>>,
    /// `class|date` to the recorded status map.
    pub attendance: BTreeMap<String, StatusMap>,
}

impl Projections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn students(&self, class: &str) -> Option<&[Student]> {
        self.roster.get(class).map(Vec::as_slice)
    }

    pub fn attendance_for(&self, class: &str, date: &str) -> Option<&StatusMap> {
        self.attendance.get(&attendance_key(class, date))
    }

    /// Dates with recorded attendance for `class`, ascending.
    pub fn recorded_dates<'a>(&'a self, class: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.attendance.keys().filter_map(move |key| {
            let (key_class, date) = key.rsplit_once(ATTENDANCE_KEY_SEPARATOR)?;
            (key_class == class).then_some(date)
        })
    }
}

/// Builds the attendance projection key for `(class, date)`.
pub fn attendance_key(class: &str, date: &str) -> String {
    format!("{class}{ATTENDANCE_KEY_SEPARATOR}{date}")
}
