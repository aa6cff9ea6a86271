#![allow(dead_code)]

use rollcall_core::db::{open_db_in_memory, DbRole};
use rollcall_core::{
    AttendanceRecorded, AttendanceStatus, ChangePayload, ChangeSink, EventId, InProcessRemote,
    QueuedIntent, RosterReplaced, Student, SyncError, SyncResult, TenantScope,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const TENANT: &str = "school-1";

pub fn server_remote() -> InProcessRemote {
    let conn = open_db_in_memory(DbRole::Server).unwrap();
    InProcessRemote::new(
        Arc::new(Mutex::new(conn)),
        TenantScope::new(TENANT, "teacher-1"),
    )
}

pub fn roster(class: &str, names: &[&str]) -> ChangePayload {
    ChangePayload::RosterReplaced(RosterReplaced {
        class: class.to_string(),
        students: names.iter().map(|name| Student::new(*name)).collect(),
    })
}

pub fn attendance(class: &str, date: &str, statuses: &[(&str, AttendanceStatus)]) -> ChangePayload {
    ChangePayload::AttendanceRecorded(AttendanceRecorded {
        class: class.to_string(),
        date: date.to_string(),
        status_map: statuses
            .iter()
            .map(|(name, status)| (name.to_string(), *status))
            .collect(),
    })
}

pub fn intent(class: &str) -> QueuedIntent {
    QueuedIntent::new(roster(class, &["Ana"])).unwrap()
}

/// Sink that forwards to a real server but refuses selected intents.
pub struct FlakySink {
    pub inner: InProcessRemote,
    failing: Mutex<HashSet<String>>,
    offline: Mutex<bool>,
    calls: AtomicUsize,
}

impl FlakySink {
    pub fn new(inner: InProcessRemote) -> Self {
        Self {
            inner,
            failing: Mutex::new(HashSet::new()),
            offline: Mutex::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    /// Fails every submission of the roster for `class`.
    pub fn fail_class(&self, class: &str) {
        self.failing.lock().unwrap().insert(class.to_string());
    }

    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
        *self.offline.lock().unwrap() = false;
    }

    pub fn go_offline(&self) {
        *self.offline.lock().unwrap() = true;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ChangeSink for FlakySink {
    fn submit(&self, intent: &QueuedIntent) -> SyncResult<EventId> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if *self.offline.lock().unwrap() {
            return Err(SyncError::TransientIo("network unreachable".to_string()));
        }
        let class = match &intent.payload {
            ChangePayload::RosterReplaced(roster) => roster.class.as_str(),
            ChangePayload::AttendanceRecorded(record) => record.class.as_str(),
        };
        if self.failing.lock().unwrap().contains(class) {
            return Err(SyncError::TransientIo(format!("timed out sending {class}")));
        }
        self.inner.submit(intent)
    }
}
