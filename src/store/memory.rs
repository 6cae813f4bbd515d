use chrono::Utc;
use itertools::Itertools;
use parking_lot::RwLock;
use thiserror::Error;

use crate::model::{
    generate_message_id, AuditRecord, EmailMessage, Id, LookupTree, LookupValue, MessageId,
    PersistenceError, QueuedEmail, RevisionMetadata, RevisionType, UserContext,
    FK_LOOKUP_VALUE_PARENT, UC_LOOKUP_LIST_VALUE,
};
use crate::store::traits::{
    AuditReader, EmailOutboxStore, EntityManager, LookupValueStore, Store, StoreResult,
};

const ENTITY: &str = "lookup value";

/// Constraint failure worded the way PostgreSQL reports it.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ConstraintViolation(String);

impl ConstraintViolation {
    fn unique(constraint: &str) -> Self {
        Self(format!(
            "duplicate key value violates unique constraint \"{}\"",
            constraint
        ))
    }

    fn missing_parent() -> Self {
        Self(format!(
            "insert or update on table \"lookup_value\" violates foreign key constraint \"{}\"",
            FK_LOOKUP_VALUE_PARENT
        ))
    }

    fn referenced_by_children() -> Self {
        Self(format!(
            "update or delete on table \"lookup_value\" violates foreign key constraint \"{}\" on table \"lookup_value\"",
            FK_LOOKUP_VALUE_PARENT
        ))
    }
}

#[derive(Debug)]
struct MemoryState {
    tree: LookupTree,
    next_id: Id,
    next_rev: i64,
    history: Vec<(Id, AuditRecord<LookupValue>)>,
    /// Undelivered e-mails only; delivery removes the entry.
    outbox: Vec<QueuedEmail>,
}

impl Default for MemoryState {
    fn default() -> Self {
        Self {
            tree: LookupTree::new(),
            next_id: 1,
            next_rev: 1,
            history: Vec::new(),
            outbox: Vec::new(),
        }
    }
}

impl MemoryState {
    fn record(&mut self, id: Id, snapshot: LookupValue, kind: RevisionType, user: &UserContext) {
        let rev = self.next_rev;
        self.next_rev += 1;
        self.history.push((
            id,
            AuditRecord {
                snapshot,
                metadata: RevisionMetadata {
                    rev,
                    timestamp: Utc::now(),
                    user_name: Some(user.audit_name().to_string()),
                },
                kind,
            },
        ));
    }

    fn violates_unique(&self, candidate: &LookupValue) -> bool {
        self.tree.values().any(|existing| {
            existing.id != candidate.id
                && existing.lookup_list_name == candidate.lookup_list_name
                && existing.display_value == candidate.display_value
                && existing.parent_id == candidate.parent_id
        })
    }
}

/// Audit snapshots carry the persistent state only.
fn snapshot_of(value: &LookupValue) -> LookupValue {
    LookupValue {
        version: None,
        children: Vec::new(),
        revision: None,
        ..value.clone()
    }
}

fn unchanged(stored: &LookupValue, incoming: &LookupValue) -> bool {
    stored.display_value == incoming.display_value
        && stored.active == incoming.active
        && stored.effective_from == incoming.effective_from
        && stored.effective_to == incoming.effective_to
}

/// In-process store used for development and tests. Every write is one critical section.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl EntityManager<LookupValue> for MemoryStore {
    async fn find(&self, id: Id) -> StoreResult<Option<LookupValue>> {
        Ok(self.state.read().tree.get(id).cloned())
    }

    async fn persist(&self, mut entity: LookupValue, user: &UserContext) -> StoreResult<LookupValue> {
        let mut state = self.state.write();

        if let Some(parent_id) = entity.parent_id {
            if !state.tree.contains(parent_id) {
                return Err(PersistenceError::write(
                    "insert",
                    ENTITY,
                    ConstraintViolation::missing_parent(),
                ));
            }
        }
        entity.id = None;
        if state.violates_unique(&entity) {
            return Err(PersistenceError::write(
                "insert",
                ENTITY,
                ConstraintViolation::unique(UC_LOOKUP_LIST_VALUE),
            ));
        }

        let id = state.next_id;
        state.next_id += 1;
        entity.version = Some(0);
        entity.children.clear();
        entity.revision = None;
        state.tree.insert(id, entity);

        let stored = state.tree.get(id).cloned().unwrap_or_default();
        state.record(id, snapshot_of(&stored), RevisionType::Add, user);
        Ok(stored)
    }

    async fn merge(&self, entity: LookupValue, user: &UserContext) -> StoreResult<LookupValue> {
        let Some(id) = entity.id else {
            return Err(PersistenceError::write(
                "update",
                ENTITY,
                "entity has no identity",
            ));
        };
        let mut state = self.state.write();

        let stored = match state.tree.get(id) {
            Some(stored) if stored.version == entity.version => stored.clone(),
            _ => return Err(PersistenceError::StaleVersion { entity: ENTITY, id }),
        };
        if unchanged(&stored, &entity) {
            return Ok(stored);
        }

        let candidate = LookupValue {
            display_value: entity.display_value.clone(),
            ..stored.clone()
        };
        if state.violates_unique(&candidate) {
            return Err(PersistenceError::write(
                "update",
                ENTITY,
                ConstraintViolation::unique(UC_LOOKUP_LIST_VALUE),
            ));
        }

        state.tree.update(id, |value| {
            value.display_value = entity.display_value.clone();
            value.active = entity.active;
            value.effective_from = entity.effective_from;
            value.effective_to = entity.effective_to;
            value.version = value.version.map(|v| v + 1);
        });
        let updated = state.tree.get(id).cloned().unwrap_or_default();
        state.record(id, snapshot_of(&updated), RevisionType::Mod, user);
        Ok(updated)
    }

    async fn remove(&self, entity: &LookupValue, user: &UserContext) -> StoreResult<()> {
        let Some(id) = entity.id else {
            return Err(PersistenceError::write(
                "delete",
                ENTITY,
                "entity has no identity",
            ));
        };
        let mut state = self.state.write();

        let has_children = match state.tree.get(id) {
            Some(stored) => stored.has_children(),
            None => return Err(PersistenceError::StaleVersion { entity: ENTITY, id }),
        };
        if has_children {
            return Err(PersistenceError::write(
                "delete",
                ENTITY,
                ConstraintViolation::referenced_by_children(),
            ));
        }

        state.tree.remove(id);
        state.record(id, LookupValue::tombstone(id), RevisionType::Del, user);
        Ok(())
    }
}

#[async_trait::async_trait]
impl AuditReader<LookupValue> for MemoryStore {
    async fn audit_history(&self, id: Id) -> StoreResult<Vec<AuditRecord<LookupValue>>> {
        Ok(self
            .state
            .read()
            .history
            .iter()
            .filter(|(entity_id, _)| *entity_id == id)
            .map(|(_, record)| record.clone())
            .collect())
    }
}

#[async_trait::async_trait]
impl LookupValueStore for MemoryStore {
    async fn find_by_lookup_list_name(
        &self,
        lookup_list_name: &str,
        parent_id: Option<Id>,
    ) -> StoreResult<Vec<LookupValue>> {
        Ok(self
            .state
            .read()
            .tree
            .values()
            .filter(|v| v.list_name() == Some(lookup_list_name))
            .filter(|v| parent_id.is_none() || v.parent_id == parent_id)
            .sorted_by(|a, b| a.display_value.cmp(&b.display_value))
            .cloned()
            .collect())
    }

    async fn find_by_lookup_list_name_and_display_value(
        &self,
        lookup_list_name: &str,
        display_value: &str,
    ) -> StoreResult<Vec<LookupValue>> {
        Ok(self
            .state
            .read()
            .tree
            .values()
            .filter(|v| {
                v.list_name() == Some(lookup_list_name)
                    && v.display_value.as_deref() == Some(display_value)
            })
            .cloned()
            .collect())
    }
}

#[async_trait::async_trait]
impl EmailOutboxStore for MemoryStore {
    async fn enqueue_email(&self, message: EmailMessage) -> StoreResult<QueuedEmail> {
        let email = QueuedEmail {
            id: generate_message_id(),
            message,
            attempts: 0,
            last_error: None,
            created_at: Utc::now(),
        };
        self.state.write().outbox.push(email.clone());
        Ok(email)
    }

    async fn pending_emails(&self, limit: usize) -> StoreResult<Vec<QueuedEmail>> {
        Ok(self
            .state
            .read()
            .outbox
            .iter()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn mark_email_sent(&self, id: &MessageId) -> StoreResult<()> {
        self.state.write().outbox.retain(|email| &email.id != id);
        Ok(())
    }

    async fn record_email_failure(&self, id: &MessageId, error: &str) -> StoreResult<()> {
        let mut state = self.state.write();
        if let Some(email) = state.outbox.iter_mut().find(|e| &e.id == id) {
            email.attempts += 1;
            email.last_error = Some(error.to_string());
        }
        Ok(())
    }
}

impl Store for MemoryStore {}
