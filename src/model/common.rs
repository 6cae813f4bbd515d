use uuid::Uuid;

/// Storage-assigned identity of a persisted entity.
pub type Id = i64;

/// Identity of a queued notification e-mail.
pub type MessageId = String;

pub fn generate_message_id() -> MessageId {
    Uuid::new_v4().to_string()
}

/// Name of the unique constraint over (lookup list name, display value, parent).
pub const UC_LOOKUP_LIST_VALUE: &str = "UC_LOOKUP_LIST_VALUE";

/// Name of the foreign key from a lookup value to its parent.
pub const FK_LOOKUP_VALUE_PARENT: &str = "FK_LOOKUP_VALUE_PARENT";
