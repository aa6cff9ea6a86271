//! State reconstruction: folding ordered events into projections.
//!
//! # Responsibility
//! - Rebuild roster and attendance views from any ordered slice of the log.
//!
//! # Invariants
//! - Pure and deterministic: same events and seed give the same output.
//! - Each event replaces its target key wholesale, so re-applying an
//!   already-applied prefix leaves the projections unchanged.
//! - Input must be strictly ascending by id; anything else is rejected
//!   before any event is applied.

use crate::model::event::{ChangePayload, Event, EventBody, EventId};
use crate::model::projection::{attendance_key, Projections};
use log::warn;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Fold failures. Only raised for caller bugs, never for event content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FoldError {
    OrderingViolation { previous: EventId, next: EventId },
}

impl Display for FoldError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OrderingViolation { previous, next } => write!(
                f,
                "events must be folded in ascending id order; got {next} after {previous}"
            ),
        }
    }
}

impl Error for FoldError {}

/// Folds `events` onto `seed` (or empty projections).
pub fn fold(events: &[Event], seed: Option<Projections>) -> Result<Projections, FoldError> {
    ensure_ascending(events)?;

    let mut projections = seed.unwrap_or_default();
    for event in events {
        apply_event(&mut projections, event);
    }
    Ok(projections)
}

/// Applies one event in place.
///
/// Callers are responsible for ordering; see [`fold`].
pub fn apply_event(projections: &mut Projections, event: &Event) {
    match &event.body {
        EventBody::Change(ChangePayload::RosterReplaced(roster)) => {
            projections
                .roster
                .insert(roster.class.clone(), roster.students.clone());
        }
        EventBody::Change(ChangePayload::AttendanceRecorded(record)) => {
            projections.attendance.insert(
                attendance_key(&record.class, &record.date),
                record.status_map.clone(),
            );
        }
        EventBody::Unrecognized { event_type, .. } => {
            warn!(
                "event=fold_skip module=reconstruct status=unrecognized_type id={} type={}",
                event.id, event_type
            );
        }
    }
}

fn ensure_ascending(events: &[Event]) -> Result<(), FoldError> {
    for pair in events.windows(2) {
        let (previous, next) = (pair[0].id, pair[1].id);
        if next <= previous {
            return Err(FoldError::OrderingViolation { previous, next });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{fold, FoldError};
    use crate::model::event::{ChangePayload, Event, EventBody, RosterReplaced, Student};

    fn roster_event(id: i64, class: &str, names: &[&str]) -> Event {
        Event {
            id,
            tenant_id: "school-1".to_string(),
            actor_id: "teacher-1".to_string(),
            body: EventBody::Change(ChangePayload::RosterReplaced(RosterReplaced {
                class: class.to_string(),
                students: names.iter().map(|name| Student::new(*name)).collect(),
            })),
            created_at_ms: 0,
        }
    }

    #[test]
    fn later_roster_replaces_earlier_one_wholesale() {
        let events = vec![
            roster_event(1, "3A", &["Ana", "Budi", "Citra"]),
            roster_event(4, "3A", &["Dewi"]),
        ];
        let projections = fold(&events, None).expect("ordered events should fold");
        assert_eq!(
            projections.students("3A").expect("3A roster"),
            &[Student::new("Dewi")]
        );
    }

    #[test]
    fn rejects_descending_or_repeated_ids() {
        let descending = vec![roster_event(5, "3A", &["Ana"]), roster_event(3, "3A", &["Budi"])];
        assert_eq!(
            fold(&descending, None),
            Err(FoldError::OrderingViolation {
                previous: 5,
                next: 3
            })
        );

        let repeated = vec![roster_event(2, "3A", &["Ana"]), roster_event(2, "3B", &["Budi"])];
        assert!(fold(&repeated, None).is_err());
    }

    #[test]
    fn skips_unrecognized_event_types() {
        let events = vec![
            roster_event(1, "3A", &["Ana"]),
            Event {
                id: 2,
                tenant_id: "school-1".to_string(),
                actor_id: "teacher-1".to_string(),
                body: EventBody::Unrecognized {
                    event_type: "GRADE_POSTED".to_string(),
                    payload: "{}".to_string(),
                },
                created_at_ms: 0,
            },
        ];

        let projections = fold(&events, None).expect("unknown types must not fail the fold");
        assert_eq!(projections.roster.len(), 1);
        assert!(projections.attendance.is_empty());
    }
}
