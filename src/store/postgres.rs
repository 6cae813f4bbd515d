use anyhow::{Context, Result};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};

use crate::model::{
    generate_message_id, AuditRecord, EmailMessage, Id, LookupValue, MessageId,
    PersistenceError, QueuedEmail, RevisionMetadata, RevisionType, UserContext,
};
use crate::store::traits::{
    AuditReader, EmailOutboxStore, EntityManager, LookupValueStore, Store, StoreResult,
};

const ENTITY: &str = "lookup value";

const LOOKUP_COLUMNS: &str = "v.id, v.version, v.lookup_list_name, v.display_value, v.active, \
     v.effective_from, v.effective_to, v.parent_id, \
     ARRAY(SELECT c.id FROM lookup_value c WHERE c.parent_id = v.id ORDER BY c.id) AS children";

const OUTBOX_COLUMNS: &str =
    "id, user_name, to_address, subject, body, attempts, last_error, created_at";

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

enum MergeOutcome {
    Updated(LookupValue),
    Unchanged,
    Stale,
}

fn lookup_value_from_row(row: &PgRow) -> LookupValue {
    LookupValue {
        id: Some(row.get("id")),
        version: Some(row.get("version")),
        lookup_list_name: Some(row.get("lookup_list_name")),
        display_value: Some(row.get("display_value")),
        active: Some(row.get("active")),
        effective_from: row.get("effective_from"),
        effective_to: row.get("effective_to"),
        parent_id: row.get("parent_id"),
        children: row.get("children"),
        revision: None,
    }
}

fn queued_email_from_row(row: &PgRow) -> QueuedEmail {
    QueuedEmail {
        id: row.get("id"),
        message: EmailMessage {
            user_name: row.get("user_name"),
            to_address: row.get("to_address"),
            subject: row.get("subject"),
            body: row.get("body"),
        },
        attempts: row.get("attempts"),
        last_error: row.get("last_error"),
        created_at: row.get("created_at"),
    }
}

/// Appends one audit revision and the matching snapshot row.
async fn record_revision(
    tx: &mut Transaction<'_, Postgres>,
    id: Id,
    snapshot: Option<&LookupValue>,
    kind: RevisionType,
    user: &UserContext,
) -> std::result::Result<(), sqlx::Error> {
    let rev: i64 =
        sqlx::query_scalar("INSERT INTO audit_revision (user_name) VALUES ($1) RETURNING rev")
            .bind(user.audit_name())
            .fetch_one(&mut **tx)
            .await?;

    sqlx::query(
        r#"
        INSERT INTO lookup_value_aud
            (id, rev, revtype, lookup_list_name, display_value, active, effective_from, effective_to, parent_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(id)
    .bind(rev)
    .bind(kind.as_db())
    .bind(snapshot.and_then(|s| s.lookup_list_name.clone()))
    .bind(snapshot.and_then(|s| s.display_value.clone()))
    .bind(snapshot.and_then(|s| s.active))
    .bind(snapshot.and_then(|s| s.effective_from))
    .bind(snapshot.and_then(|s| s.effective_to))
    .bind(snapshot.and_then(|s| s.parent_id))
    .execute(&mut **tx)
    .await?;

    Ok(())
}

impl PostgresStore {
    /// Create a new PostgreSQL store with the given database URL
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to create PostgreSQL connection pool")?;

        Ok(Self { pool })
    }

    /// Run the embedded migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }

    async fn fetch_lookup_value(&self, id: Id) -> std::result::Result<Option<LookupValue>, sqlx::Error> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM lookup_value v WHERE v.id = $1",
            LOOKUP_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(lookup_value_from_row))
    }

    async fn insert_lookup_value(
        &self,
        entity: &LookupValue,
        user: &UserContext,
    ) -> std::result::Result<Id, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let id: Id = sqlx::query_scalar(
            r#"
            INSERT INTO lookup_value
                (version, lookup_list_name, display_value, active, effective_from, effective_to, parent_id)
            VALUES (0, $1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&entity.lookup_list_name)
        .bind(&entity.display_value)
        .bind(entity.active)
        .bind(entity.effective_from)
        .bind(entity.effective_to)
        .bind(entity.parent_id)
        .fetch_one(&mut *tx)
        .await?;

        record_revision(&mut tx, id, Some(entity), RevisionType::Add, user).await?;
        tx.commit().await?;
        Ok(id)
    }

    async fn update_lookup_value(
        &self,
        id: Id,
        entity: &LookupValue,
        user: &UserContext,
    ) -> std::result::Result<MergeOutcome, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE lookup_value
            SET display_value = $3, active = $4, effective_from = $5, effective_to = $6,
                version = version + 1
            WHERE id = $1 AND version = $2
              AND (display_value, active, effective_from, effective_to)
                  IS DISTINCT FROM ($3::TEXT, $4::BOOLEAN, $5::DATE, $6::DATE)
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(entity.version)
        .bind(&entity.display_value)
        .bind(entity.active)
        .bind(entity.effective_from)
        .bind(entity.effective_to)
        .fetch_optional(&mut *tx)
        .await?;

        if updated.is_none() {
            let current: Option<i64> =
                sqlx::query_scalar("SELECT version FROM lookup_value WHERE id = $1")
                    .bind(id)
                    .fetch_optional(&mut *tx)
                    .await?;
            tx.rollback().await?;
            return Ok(match current {
                Some(version) if Some(version) == entity.version => MergeOutcome::Unchanged,
                _ => MergeOutcome::Stale,
            });
        }

        let row = sqlx::query(&format!(
            "SELECT {} FROM lookup_value v WHERE v.id = $1",
            LOOKUP_COLUMNS
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        let merged = lookup_value_from_row(&row);

        record_revision(&mut tx, id, Some(&merged), RevisionType::Mod, user).await?;
        tx.commit().await?;
        Ok(MergeOutcome::Updated(merged))
    }

    async fn delete_lookup_value(
        &self,
        id: Id,
        user: &UserContext,
    ) -> std::result::Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM lookup_value WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if deleted == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        record_revision(&mut tx, id, None, RevisionType::Del, user).await?;
        tx.commit().await?;
        Ok(true)
    }
}

#[async_trait::async_trait]
impl EntityManager<LookupValue> for PostgresStore {
    async fn find(&self, id: Id) -> StoreResult<Option<LookupValue>> {
        self.fetch_lookup_value(id)
            .await
            .map_err(|e| PersistenceError::read("fetch lookup value", e))
    }

    async fn persist(&self, entity: LookupValue, user: &UserContext) -> StoreResult<LookupValue> {
        let id = self
            .insert_lookup_value(&entity, user)
            .await
            .map_err(|e| PersistenceError::write("insert", ENTITY, e))?;

        self.find(id)
            .await?
            .ok_or(PersistenceError::StaleVersion { entity: ENTITY, id })
    }

    async fn merge(&self, entity: LookupValue, user: &UserContext) -> StoreResult<LookupValue> {
        let Some(id) = entity.id else {
            return Err(PersistenceError::write(
                "update",
                ENTITY,
                "entity has no identity",
            ));
        };

        let outcome = self
            .update_lookup_value(id, &entity, user)
            .await
            .map_err(|e| PersistenceError::write("update", ENTITY, e))?;

        match outcome {
            MergeOutcome::Updated(merged) => Ok(merged),
            MergeOutcome::Unchanged => self
                .find(id)
                .await?
                .ok_or(PersistenceError::StaleVersion { entity: ENTITY, id }),
            MergeOutcome::Stale => Err(PersistenceError::StaleVersion { entity: ENTITY, id }),
        }
    }

    async fn remove(&self, entity: &LookupValue, user: &UserContext) -> StoreResult<()> {
        let Some(id) = entity.id else {
            return Err(PersistenceError::write(
                "delete",
                ENTITY,
                "entity has no identity",
            ));
        };

        let deleted = self
            .delete_lookup_value(id, user)
            .await
            .map_err(|e| PersistenceError::write("delete", ENTITY, e))?;
        if deleted {
            Ok(())
        } else {
            Err(PersistenceError::StaleVersion { entity: ENTITY, id })
        }
    }
}

#[async_trait::async_trait]
impl AuditReader<LookupValue> for PostgresStore {
    async fn audit_history(&self, id: Id) -> StoreResult<Vec<AuditRecord<LookupValue>>> {
        let rows = sqlx::query(
            r#"
            SELECT a.id, a.revtype, a.lookup_list_name, a.display_value, a.active,
                   a.effective_from, a.effective_to, a.parent_id,
                   r.rev, r.revision_date, r.user_name
            FROM lookup_value_aud a
            JOIN audit_revision r ON r.rev = a.rev
            WHERE a.id = $1
            ORDER BY r.rev
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PersistenceError::read("fetch lookup value revisions", e))?;

        rows.iter()
            .map(|row| -> StoreResult<AuditRecord<LookupValue>> {
                let revtype: i16 = row.get("revtype");
                let kind = RevisionType::from_db(revtype).ok_or_else(|| {
                    PersistenceError::read(
                        "decode lookup value revision",
                        format!("unknown revision type {}", revtype),
                    )
                })?;
                Ok(AuditRecord {
                    snapshot: LookupValue {
                        id: Some(row.get("id")),
                        lookup_list_name: row.get("lookup_list_name"),
                        display_value: row.get("display_value"),
                        active: row.get("active"),
                        effective_from: row.get("effective_from"),
                        effective_to: row.get("effective_to"),
                        parent_id: row.get("parent_id"),
                        ..Default::default()
                    },
                    metadata: RevisionMetadata {
                        rev: row.get("rev"),
                        timestamp: row.get("revision_date"),
                        user_name: row.get("user_name"),
                    },
                    kind,
                })
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl LookupValueStore for PostgresStore {
    async fn find_by_lookup_list_name(
        &self,
        lookup_list_name: &str,
        parent_id: Option<Id>,
    ) -> StoreResult<Vec<LookupValue>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM lookup_value v \
             WHERE v.lookup_list_name = $1 AND ($2::BIGINT IS NULL OR v.parent_id = $2) \
             ORDER BY v.display_value",
            LOOKUP_COLUMNS
        ))
        .bind(lookup_list_name)
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PersistenceError::read("list lookup values", e))?;

        Ok(rows.iter().map(lookup_value_from_row).collect())
    }

    async fn find_by_lookup_list_name_and_display_value(
        &self,
        lookup_list_name: &str,
        display_value: &str,
    ) -> StoreResult<Vec<LookupValue>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM lookup_value v \
             WHERE v.lookup_list_name = $1 AND v.display_value = $2 ORDER BY v.id",
            LOOKUP_COLUMNS
        ))
        .bind(lookup_list_name)
        .bind(display_value)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PersistenceError::read("find lookup values by display value", e))?;

        Ok(rows.iter().map(lookup_value_from_row).collect())
    }
}

#[async_trait::async_trait]
impl EmailOutboxStore for PostgresStore {
    async fn enqueue_email(&self, message: EmailMessage) -> StoreResult<QueuedEmail> {
        let row = sqlx::query(&format!(
            "INSERT INTO email_outbox (id, user_name, to_address, subject, body) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            OUTBOX_COLUMNS
        ))
        .bind(generate_message_id())
        .bind(&message.user_name)
        .bind(&message.to_address)
        .bind(&message.subject)
        .bind(&message.body)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| PersistenceError::write("enqueue", "e-mail", e))?;

        Ok(queued_email_from_row(&row))
    }

    async fn pending_emails(&self, limit: usize) -> StoreResult<Vec<QueuedEmail>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM email_outbox WHERE sent_at IS NULL ORDER BY created_at LIMIT $1",
            OUTBOX_COLUMNS
        ))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PersistenceError::read("list pending e-mails", e))?;

        Ok(rows.iter().map(queued_email_from_row).collect())
    }

    async fn mark_email_sent(&self, id: &MessageId) -> StoreResult<()> {
        sqlx::query(
            "UPDATE email_outbox SET sent_at = NOW(), attempts = attempts + 1 WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| PersistenceError::write("mark sent", "e-mail", e))?;
        Ok(())
    }

    async fn record_email_failure(&self, id: &MessageId, error: &str) -> StoreResult<()> {
        sqlx::query(
            "UPDATE email_outbox SET attempts = attempts + 1, last_error = $2 WHERE id = $1",
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(|e| PersistenceError::write("record failure of", "e-mail", e))?;
        Ok(())
    }
}

impl Store for PostgresStore {}
