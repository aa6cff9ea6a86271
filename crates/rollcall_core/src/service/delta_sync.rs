//! Server-side delta-sync protocol.
//!
//! # Responsibility
//! - Answer "what is the latest version" and "what changed after N".
//! - Validate and append client writes, returning the new version.
//!
//! # Invariants
//! - Every operation is scoped to one tenant supplied by an authorized caller.
//! - Invalid payloads are rejected before the log is touched.
//! - Concurrent writes to one key are not merged; the higher id wins.

use crate::model::event::{ChangePayload, Event, EventId};
use crate::model::intent::QueuedIntent;
use crate::model::scope::TenantScope;
use crate::repo::event_log::{EventLog, EventQuery, NewEvent};
use crate::sync::error::{SyncError, SyncResult};
use log::{info, warn};

/// One bounded slice of a tenant's stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangePage {
    pub events: Vec<Event>,
    /// Version to pass as `since` for the next page.
    pub next_version: EventId,
    pub has_more: bool,
}

/// Delta-sync entry points over an [`EventLog`].
pub struct DeltaSyncService<L: EventLog> {
    log: L,
}

impl<L: EventLog> DeltaSyncService<L> {
    pub fn new(log: L) -> Self {
        Self { log }
    }

    /// Id of the tenant's most recent event, or 0 when none exist.
    pub fn latest_version(&self, tenant_id: &str) -> SyncResult<EventId> {
        ensure_identifier("tenant_id", tenant_id)?;
        Ok(self.log.latest_id(tenant_id)?)
    }

    /// Every event of the tenant with `id > since_version`, ascending.
    pub fn changes_since(&self, tenant_id: &str, since_version: EventId) -> SyncResult<Vec<Event>> {
        ensure_identifier("tenant_id", tenant_id)?;
        ensure_version(since_version)?;
        Ok(self
            .log
            .query(&EventQuery::for_tenant(tenant_id).after(since_version))?)
    }

    /// Like [`Self::changes_since`] but returns at most `limit` events.
    pub fn changes_since_page(
        &self,
        tenant_id: &str,
        since_version: EventId,
        limit: u32,
    ) -> SyncResult<ChangePage> {
        ensure_identifier("tenant_id", tenant_id)?;
        ensure_version(since_version)?;
        if limit == 0 {
            return Err(SyncError::InvalidRequest(
                "page limit must be at least 1".to_string(),
            ));
        }

        let probe = limit.saturating_add(1);
        let mut events = self.log.query(
            &EventQuery::for_tenant(tenant_id)
                .after(since_version)
                .limit(probe),
        )?;
        let has_more = events.len() > limit as usize;
        events.truncate(limit as usize);
        let next_version = events.last().map_or(since_version, |event| event.id);

        Ok(ChangePage {
            events,
            next_version,
            has_more,
        })
    }

    /// Decodes a loosely-typed write, validates it and appends it.
    pub fn append_change(
        &self,
        tenant_id: &str,
        actor_id: &str,
        event_type: &str,
        payload: serde_json::Value,
    ) -> SyncResult<EventId> {
        let scope = TenantScope::new(tenant_id, actor_id);
        let change = match ChangePayload::from_value(event_type, payload) {
            Ok(change) => change,
            Err(err) => {
                warn!(
                    "event=append_change module=delta_sync status=rejected type={} error={}",
                    event_type, err
                );
                return Err(err.into());
            }
        };
        self.append(&scope, &change, None)
    }

    /// Appends a replayed client intent; a repeated intent id returns the
    /// version of its first append.
    pub fn append_intent(&self, scope: &TenantScope, intent: &QueuedIntent) -> SyncResult<EventId> {
        self.append(scope, &intent.payload, Some(intent))
    }

    fn append(
        &self,
        scope: &TenantScope,
        payload: &ChangePayload,
        intent: Option<&QueuedIntent>,
    ) -> SyncResult<EventId> {
        ensure_identifier("tenant_id", &scope.tenant_id)?;
        ensure_identifier("actor_id", &scope.actor_id)?;
        payload.validate()?;

        let version = self.log.append(&NewEvent {
            tenant_id: &scope.tenant_id,
            actor_id: &scope.actor_id,
            payload,
            intent_id: intent.map(|intent| intent.intent_id),
        })?;
        info!(
            "event=append_change module=delta_sync status=ok type={} version={}",
            payload.kind(),
            version
        );
        Ok(version)
    }
}

fn ensure_identifier(field: &str, value: &str) -> SyncResult<()> {
    if value.trim().is_empty() {
        return Err(SyncError::InvalidRequest(format!("{field} must not be blank")));
    }
    Ok(())
}

fn ensure_version(version: EventId) -> SyncResult<()> {
    if version < 0 {
        return Err(SyncError::InvalidRequest(format!(
            "version must not be negative, got {version}"
        )));
    }
    Ok(())
}
