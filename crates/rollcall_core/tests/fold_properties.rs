use rollcall_core::db::{open_db_in_memory, DbRole};
use rollcall_core::{
    fold, AttendanceRecorded, AttendanceStatus, ChangePayload, DeltaSyncService, Event,
    EventBody, FoldError, SqliteEventLog, StatusMap,
};
use serde_json::json;

const TENANT: &str = "school-1";

fn seeded_stream() -> Vec<Event> {
    let conn = open_db_in_memory(DbRole::Server).unwrap();
    let sync = DeltaSyncService::new(SqliteEventLog::new(&conn));
    let writes = [
        ("ROSTER_REPLACED", json!({"class": "3A", "students": ["Ana", "Budi"]})),
        ("ROSTER_REPLACED", json!({"class": "3B", "students": ["Citra"]})),
        (
            "ATTENDANCE_RECORDED",
            json!({"class": "3A", "date": "2024-05-01", "statusMap": {"Ana": "PRESENT", "Budi": "SICK"}}),
        ),
        ("ROSTER_REPLACED", json!({"class": "3A", "students": ["Ana", "Budi", "Dewi"]})),
        (
            "ATTENDANCE_RECORDED",
            json!({"class": "3B", "date": "2024-05-01", "statusMap": {"Citra": "EXCUSED"}}),
        ),
        (
            "ATTENDANCE_RECORDED",
            json!({"class": "3A", "date": "2024-05-01", "statusMap": {"Ana": "ABSENT", "Dewi": "PRESENT"}}),
        ),
        (
            "ATTENDANCE_RECORDED",
            json!({"class": "3A", "date": "2024-05-02", "statusMap": {"Budi": "PRESENT"}}),
        ),
    ];
    for (event_type, payload) in writes {
        sync.append_change(TENANT, "teacher-1", event_type, payload)
            .unwrap();
    }
    sync.changes_since(TENANT, 0).unwrap()
}

fn attendance_event(id: i64, statuses: &[(&str, AttendanceStatus)]) -> Event {
    let status_map: StatusMap = statuses
        .iter()
        .map(|(name, status)| (name.to_string(), *status))
        .collect();
    Event {
        id,
        tenant_id: TENANT.to_string(),
        actor_id: format!("teacher-{id}"),
        body: EventBody::Change(ChangePayload::AttendanceRecorded(AttendanceRecorded {
            class: "3A".to_string(),
            date: "2024-05-01".to_string(),
            status_map,
        })),
        created_at_ms: 0,
    }
}

#[test]
fn fold_is_deterministic_to_the_byte() {
    let events = seeded_stream();
    let first = serde_json::to_string(&fold(&events, None).unwrap()).unwrap();
    let second = serde_json::to_string(&fold(&events, None).unwrap()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn refolding_an_applied_prefix_changes_nothing() {
    let events = seeded_stream();
    for k in 0..=events.len() {
        let prefix = &events[..k];
        let once = fold(prefix, None).unwrap();
        let twice = fold(prefix, Some(once.clone())).unwrap();
        assert_eq!(twice, once, "prefix length {k}");
    }
}

#[test]
fn splitting_the_stream_at_any_version_converges() {
    let events = seeded_stream();
    let whole = fold(&events, None).unwrap();

    for split in 0..=events.len() {
        let (head, tail) = events.split_at(split);
        let partial = fold(head, None).unwrap();
        let stitched = fold(tail, Some(partial)).unwrap();
        assert_eq!(stitched, whole, "split after {split} events");
    }
}

#[test]
fn higher_id_replaces_attendance_without_merging() {
    let older = attendance_event(
        10,
        &[
            ("Ana", AttendanceStatus::Present),
            ("Budi", AttendanceStatus::Sick),
        ],
    );
    let newer = attendance_event(11, &[("Ana", AttendanceStatus::Excused)]);

    let projections = fold(&[older, newer.clone()], None).unwrap();
    let day = projections.attendance_for("3A", "2024-05-01").unwrap();
    match newer.body {
        EventBody::Change(ChangePayload::AttendanceRecorded(record)) => {
            assert_eq!(day, &record.status_map);
        }
        other => panic!("unexpected body: {other:?}"),
    }
    assert!(!day.contains_key("Budi"));
}

#[test]
fn out_of_order_input_is_an_ordering_violation() {
    let older = attendance_event(10, &[("Ana", AttendanceStatus::Present)]);
    let newer = attendance_event(11, &[("Ana", AttendanceStatus::Absent)]);

    assert_eq!(
        fold(&[newer, older], None),
        Err(FoldError::OrderingViolation {
            previous: 11,
            next: 10
        })
    );
}
