use crate::logic::fields::Entity;
use crate::model::{
    AuditRecord, EmailMessage, Id, LookupValue, MessageId, PersistenceError, QueuedEmail,
    UserContext,
};

pub type StoreResult<T> = std::result::Result<T, PersistenceError>;

/// Entity-manager style persistence for one entity type. Every write is flushed
/// before it returns and appends one audit revision attributed to `user`.
#[async_trait::async_trait]
pub trait EntityManager<T: Entity>: Send + Sync {
    async fn find(&self, id: Id) -> StoreResult<Option<T>>;
    /// Inserts a new entity; storage assigns id and initial version.
    async fn persist(&self, entity: T, user: &UserContext) -> StoreResult<T>;
    /// Writes the entity's updatable state. The version only advances when something changed.
    async fn merge(&self, entity: T, user: &UserContext) -> StoreResult<T>;
    async fn remove(&self, entity: &T, user: &UserContext) -> StoreResult<()>;
}

/// Read access to the audit history of an entity type.
#[async_trait::async_trait]
pub trait AuditReader<T>: Send + Sync {
    /// All revisions recorded for `id`, in no particular order.
    async fn audit_history(&self, id: Id) -> StoreResult<Vec<AuditRecord<T>>>;
}

#[async_trait::async_trait]
pub trait LookupValueStore: EntityManager<LookupValue> + AuditReader<LookupValue> {
    /// Values of a list ordered by display value, optionally restricted to one parent.
    async fn find_by_lookup_list_name(
        &self,
        lookup_list_name: &str,
        parent_id: Option<Id>,
    ) -> StoreResult<Vec<LookupValue>>;

    async fn find_by_lookup_list_name_and_display_value(
        &self,
        lookup_list_name: &str,
        display_value: &str,
    ) -> StoreResult<Vec<LookupValue>>;
}

/// Durable queue of notification e-mails.
#[async_trait::async_trait]
pub trait EmailOutboxStore: Send + Sync {
    async fn enqueue_email(&self, message: EmailMessage) -> StoreResult<QueuedEmail>;
    /// Oldest undelivered messages first.
    async fn pending_emails(&self, limit: usize) -> StoreResult<Vec<QueuedEmail>>;
    async fn mark_email_sent(&self, id: &MessageId) -> StoreResult<()>;
    async fn record_email_failure(&self, id: &MessageId, error: &str) -> StoreResult<()>;
}

pub trait Store: LookupValueStore + EmailOutboxStore + Send + Sync {}
