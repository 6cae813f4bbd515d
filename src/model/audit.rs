use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of change an audit revision records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RevisionType {
    Add,
    Mod,
    Del,
}

impl RevisionType {
    /// Storage encoding of the revision kind.
    pub fn as_db(self) -> i16 {
        match self {
            RevisionType::Add => 0,
            RevisionType::Mod => 1,
            RevisionType::Del => 2,
        }
    }

    pub fn from_db(value: i16) -> Option<Self> {
        match value {
            0 => Some(RevisionType::Add),
            1 => Some(RevisionType::Mod),
            2 => Some(RevisionType::Del),
            _ => None,
        }
    }
}

/// Revision metadata as recorded by the audit store.
#[derive(Debug, Clone, PartialEq)]
pub struct RevisionMetadata {
    pub rev: i64,
    pub timestamp: DateTime<Utc>,
    pub user_name: Option<String>,
}

/// One entry of an entity's audit history.
#[derive(Debug, Clone)]
pub struct AuditRecord<T> {
    pub snapshot: T,
    pub metadata: RevisionMetadata,
    pub kind: RevisionType,
}

/// Revision information attached to an audit snapshot on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRevision {
    pub rev: i64,
    #[serde(with = "revision_date")]
    pub date: DateTime<Utc>,
    pub user: Option<String>,
    #[serde(rename = "type")]
    pub revision_type: RevisionType,
}

impl AuditRevision {
    pub fn new(metadata: &RevisionMetadata, kind: RevisionType) -> Self {
        Self {
            rev: metadata.rev,
            date: metadata.timestamp,
            user: metadata.user_name.clone(),
            revision_type: kind,
        }
    }
}

/// Entities able to carry the revision they were reconstructed from.
pub trait HasAuditRevision {
    fn audit_revision(&self) -> Option<&AuditRevision>;
    fn set_audit_revision(&mut self, revision: AuditRevision);
}

mod revision_date {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

    pub fn serialize<S: Serializer>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&date.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let text = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&text, FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(serde::de::Error::custom)
    }
}
