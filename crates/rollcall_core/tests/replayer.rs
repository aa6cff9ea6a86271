mod common;

use common::{intent, server_remote, FlakySink, TENANT};
use rollcall_core::db::{open_db_in_memory, DbRole};
use rollcall_core::{
    BackgroundReplayer, ChangeSource, DrainOutcome, OfflineQueue, ReplayConfig, ReplayNotice,
    ReplayNotifier, ReplayTrigger,
};
use std::sync::Mutex;

#[derive(Default)]
struct RecordingNotifier {
    notices: Mutex<Vec<ReplayNotice>>,
}

impl RecordingNotifier {
    fn notices(&self) -> Vec<ReplayNotice> {
        self.notices.lock().unwrap().clone()
    }
}

impl ReplayNotifier for RecordingNotifier {
    fn notify(&self, notice: &ReplayNotice) {
        self.notices.lock().unwrap().push(notice.clone());
    }
}

fn replayer(max_in_flight: usize) -> BackgroundReplayer<RecordingNotifier> {
    BackgroundReplayer::new(ReplayConfig { max_in_flight }, RecordingNotifier::default())
}

#[test]
fn concurrent_replay_commits_every_intent_and_confirms() {
    let conn = open_db_in_memory(DbRole::Client).unwrap();
    let queue = OfflineQueue::new(&conn, TENANT);
    let sink = FlakySink::new(server_remote());
    for index in 0..9 {
        queue.enqueue(&intent(&format!("class-{index}"))).unwrap();
    }

    let replayer = replayer(4);
    let report = replayer
        .on_trigger(ReplayTrigger::ConnectivityRestored, &queue, &sink)
        .unwrap();

    assert_eq!(report.trigger, ReplayTrigger::ConnectivityRestored);
    let versions = match report.outcome {
        DrainOutcome::Drained { versions } => versions,
        other => panic!("unexpected outcome: {other:?}"),
    };
    assert_eq!(versions.len(), 9);
    assert!(queue.is_empty().unwrap());
    assert_eq!(sink.inner.changes_since(0).unwrap().len(), 9);
    assert_eq!(
        replayer.notifier().notices(),
        vec![ReplayNotice::Saved { count: 9 }]
    );
}

#[test]
fn any_failure_keeps_the_whole_queue_and_reports_it() {
    let conn = open_db_in_memory(DbRole::Client).unwrap();
    let queue = OfflineQueue::new(&conn, TENANT);
    let sink = FlakySink::new(server_remote());
    for class in ["1A", "2A", "3A", "4A", "5A"] {
        queue.enqueue(&intent(class)).unwrap();
    }
    let before = queue.pending().unwrap();
    sink.fail_class("4A");

    let replayer = replayer(2);
    let report = replayer
        .on_trigger(ReplayTrigger::Scheduled, &queue, &sink)
        .unwrap();

    match report.outcome {
        DrainOutcome::Failed { failure, pending } => {
            assert_eq!(failure.index, 3);
            assert_eq!(pending, 5);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(queue.pending().unwrap(), before);
    assert_eq!(sink.calls(), 4, "no window starts after a failing one");

    let notices = replayer.notifier().notices();
    assert_eq!(notices.len(), 1);
    match &notices[0] {
        ReplayNotice::Failed { pending, message } => {
            assert_eq!(*pending, Some(5));
            assert!(message.contains("not saved"));
        }
        other => panic!("unexpected notice: {other:?}"),
    }

    sink.heal();
    let retry = replayer
        .on_trigger(ReplayTrigger::ConnectivityRestored, &queue, &sink)
        .unwrap();
    assert!(matches!(retry.outcome, DrainOutcome::Drained { ref versions } if versions.len() == 5));
    assert_eq!(sink.inner.changes_since(0).unwrap().len(), 5);
}

#[test]
fn sequential_replay_preserves_submission_order_in_the_log() {
    let conn = open_db_in_memory(DbRole::Client).unwrap();
    let queue = OfflineQueue::new(&conn, TENANT);
    let sink = FlakySink::new(server_remote());
    let classes = ["1A", "2A", "3A", "4A"];
    for class in classes {
        queue.enqueue(&intent(class)).unwrap();
    }

    replayer(1)
        .on_trigger(ReplayTrigger::Scheduled, &queue, &sink)
        .unwrap();

    let logged: Vec<String> = sink
        .inner
        .changes_since(0)
        .unwrap()
        .into_iter()
        .map(|event| match event.body {
            rollcall_core::EventBody::Change(rollcall_core::ChangePayload::RosterReplaced(r)) => {
                r.class
            }
            other => panic!("unexpected body: {other:?}"),
        })
        .collect();
    assert_eq!(logged, classes);
}

#[test]
fn empty_queue_replays_silently() {
    let conn = open_db_in_memory(DbRole::Client).unwrap();
    let queue = OfflineQueue::new(&conn, TENANT);
    let sink = FlakySink::new(server_remote());

    let replayer = replayer(4);
    let report = replayer
        .on_trigger(ReplayTrigger::Scheduled, &queue, &sink)
        .unwrap();
    assert_eq!(report.outcome, DrainOutcome::Empty);
    assert!(replayer.notifier().notices().is_empty());
    assert_eq!(sink.calls(), 0);
}

#[test]
fn failed_clear_after_confirmation_reports_the_snapshot_and_retries_cleanly() {
    let conn = open_db_in_memory(DbRole::Client).unwrap();
    let queue = OfflineQueue::new(&conn, TENANT);
    let sink = FlakySink::new(server_remote());
    for class in ["1A", "2A", "3A"] {
        queue.enqueue(&intent(class)).unwrap();
    }
    conn.execute_batch(
        "CREATE TRIGGER offline_queue_hold BEFORE DELETE ON offline_queue
         BEGIN SELECT RAISE(ABORT, 'queue is locked'); END;",
    )
    .unwrap();

    let replayer = replayer(2);
    let err = replayer
        .on_trigger(ReplayTrigger::ConnectivityRestored, &queue, &sink)
        .expect_err("clearing the queue must fail");
    assert_eq!(queue.len().unwrap(), 3);
    match &replayer.notifier().notices()[..] {
        [ReplayNotice::Failed { pending, message }] => {
            assert_eq!(*pending, Some(3));
            assert!(message.contains(&err.to_string()));
        }
        other => panic!("unexpected notices: {other:?}"),
    }

    conn.execute_batch("DROP TRIGGER offline_queue_hold;").unwrap();
    let retry = replayer
        .on_trigger(ReplayTrigger::Scheduled, &queue, &sink)
        .unwrap();
    assert!(matches!(retry.outcome, DrainOutcome::Drained { ref versions } if versions.len() == 3));
    assert_eq!(
        sink.inner.changes_since(0).unwrap().len(),
        3,
        "retried intents resolve to their first append"
    );
}

#[test]
fn unreadable_queue_reports_an_unknown_pending_count() {
    let conn = open_db_in_memory(DbRole::Client).unwrap();
    let queue = OfflineQueue::new(&conn, TENANT);
    let sink = FlakySink::new(server_remote());
    conn.execute_batch("DROP TABLE offline_queue;").unwrap();

    let replayer = replayer(4);
    assert!(replayer
        .on_trigger(ReplayTrigger::Scheduled, &queue, &sink)
        .is_err());
    assert_eq!(sink.calls(), 0);
    assert!(matches!(
        &replayer.notifier().notices()[..],
        [ReplayNotice::Failed { pending: None, .. }]
    ));
}
