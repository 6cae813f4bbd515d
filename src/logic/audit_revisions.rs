use crate::model::{AppError, AuditRevision, HasAuditRevision, Id};
use crate::store::AuditReader;

/// Reconstructs the audit history of `id` in ascending revision order, each
/// snapshot carrying the revision it was recorded under.
pub async fn get_all_audit_revisions<T, R>(reader: &R, id: Id) -> Result<Vec<T>, AppError>
where
    T: HasAuditRevision + Send,
    R: AuditReader<T> + ?Sized,
{
    let mut records = reader.audit_history(id).await?;
    records.sort_by_key(|record| record.metadata.rev);

    Ok(records
        .into_iter()
        .map(|record| {
            let mut snapshot = record.snapshot;
            snapshot.set_audit_revision(AuditRevision::new(&record.metadata, record.kind));
            snapshot
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AuditRecord, LookupValue, RevisionMetadata, RevisionType};
    use crate::store::StoreResult;
    use chrono::Utc;

    struct FixedHistory(Vec<AuditRecord<LookupValue>>);

    #[async_trait::async_trait]
    impl AuditReader<LookupValue> for FixedHistory {
        async fn audit_history(&self, _id: Id) -> StoreResult<Vec<AuditRecord<LookupValue>>> {
            Ok(self.0.clone())
        }
    }

    fn record(rev: i64, kind: RevisionType, snapshot: LookupValue) -> AuditRecord<LookupValue> {
        AuditRecord {
            snapshot,
            metadata: RevisionMetadata {
                rev,
                timestamp: Utc::now(),
                user_name: Some("auditor".to_string()),
            },
            kind,
        }
    }

    #[tokio::test]
    async fn test_revisions_sorted_and_annotated() {
        let history = FixedHistory(vec![
            record(9, RevisionType::Del, LookupValue::tombstone(1)),
            record(2, RevisionType::Add, LookupValue::new("vehicle-make", "Ford")),
            record(5, RevisionType::Mod, LookupValue::new("vehicle-make", "Ford Motor")),
        ]);

        let revisions: Vec<LookupValue> = get_all_audit_revisions(&history, 1).await.unwrap();
        let kinds: Vec<(i64, RevisionType)> = revisions
            .iter()
            .map(|v| {
                let revision = v.audit_revision().unwrap();
                (revision.rev, revision.revision_type)
            })
            .collect();

        assert_eq!(
            kinds,
            vec![
                (2, RevisionType::Add),
                (5, RevisionType::Mod),
                (9, RevisionType::Del)
            ]
        );
        assert!(revisions[2].display_value.is_none());
        assert_eq!(
            revisions[0].audit_revision().unwrap().user.as_deref(),
            Some("auditor")
        );
    }

    #[tokio::test]
    async fn test_empty_history() {
        let revisions: Vec<LookupValue> = get_all_audit_revisions(&FixedHistory(Vec::new()), 4)
            .await
            .unwrap();
        assert!(revisions.is_empty());
    }
}
