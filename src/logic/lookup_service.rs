use log::info;

use crate::logic::audit_revisions::get_all_audit_revisions;
use crate::logic::lookup_filter::{filter_by_active_status, filter_by_effective_date, parse_date};
use crate::logic::persistence::PersistenceHelper;
use crate::model::{
    AppError, ErrorCode, Id, LookupValue, UserContext, FK_LOOKUP_VALUE_PARENT,
    UC_LOOKUP_LIST_VALUE,
};
use crate::store::LookupValueStore;

/// Optional restrictions when listing the values of a lookup list.
#[derive(Debug, Clone, Default)]
pub struct LookupQuery {
    pub parent_id: Option<Id>,
    pub active: Option<bool>,
    /// Raw `yyyy-MM-dd` text as received.
    pub effective_date: Option<String>,
}

/// Lookup value rules on top of the merge engine.
pub struct LookupValueOperations;

impl LookupValueOperations {
    /// Adds a value, optionally under `parent_id`, which must match the payload's parent.
    pub async fn add_lookup_value<S: LookupValueStore + ?Sized>(
        store: &S,
        user: &UserContext,
        parent_id: Option<Id>,
        mut value: LookupValue,
    ) -> Result<LookupValue, AppError> {
        value.id = None;
        value.version = None;
        value.children.clear();

        if value.parent_id != parent_id {
            return Err(ErrorCode::ParentIdMismatch.into());
        }
        if let Some(parent_id) = parent_id {
            let parent = store
                .find(parent_id)
                .await?
                .ok_or(ErrorCode::InvalidParent)?;
            if parent.lookup_list_name == value.lookup_list_name {
                return Err(ErrorCode::SameListNameAsParent.into());
            }
        }

        PersistenceHelper::new(store, user)
            .with_constraint(UC_LOOKUP_LIST_VALUE, ErrorCode::DuplicateLookupValue)
            .persist_entity(value)
            .await
    }

    /// Values of a list ordered by display value, filtered by the query.
    pub async fn get_lookup_values<S: LookupValueStore + ?Sized>(
        store: &S,
        lookup_list_name: &str,
        query: &LookupQuery,
    ) -> Result<Vec<LookupValue>, AppError> {
        let effective_date = query
            .effective_date
            .as_deref()
            .map(|text| parse_date(text, ErrorCode::InvalidEffectiveDate))
            .transpose()?;

        let values = store
            .find_by_lookup_list_name(lookup_list_name, query.parent_id)
            .await?;
        let values = filter_by_active_status(values, query.active);
        Ok(match effective_date {
            Some(date) => filter_by_effective_date(values, &date),
            None => values,
        })
    }

    pub async fn get_lookup_value<S: LookupValueStore + ?Sized>(
        store: &S,
        id: Id,
    ) -> Result<Option<LookupValue>, AppError> {
        Ok(store.find(id).await?)
    }

    /// Applies the updatable fields of `incoming` to the stored value `id`.
    pub async fn update_lookup_value<S: LookupValueStore + ?Sized>(
        store: &S,
        user: &UserContext,
        id: Id,
        incoming: LookupValue,
    ) -> Result<LookupValue, AppError> {
        if incoming.id != Some(id) {
            return Err(ErrorCode::IdMismatch.into());
        }
        let persisted = store
            .find(id)
            .await?
            .ok_or(ErrorCode::InvalidLookupValueId)?;

        PersistenceHelper::new(store, user)
            .with_constraint(UC_LOOKUP_LIST_VALUE, ErrorCode::DuplicateLookupValue)
            .update_entity(persisted, &incoming)
            .await
    }

    /// Deletes a childless value.
    pub async fn delete_lookup_value<S: LookupValueStore + ?Sized>(
        store: &S,
        user: &UserContext,
        id: Id,
    ) -> Result<(), AppError> {
        let value = store
            .find(id)
            .await?
            .ok_or(ErrorCode::InvalidLookupValueId)?;
        if value.has_children() {
            info!(
                "Refusing to delete lookup value {} with {} children",
                id,
                value.children.len()
            );
            return Err(ErrorCode::HasChildren.into());
        }

        PersistenceHelper::new(store, user)
            .with_constraint(FK_LOOKUP_VALUE_PARENT, ErrorCode::HasChildren)
            .delete_entity(&value)
            .await
    }

    pub async fn get_lookup_value_revisions<S: LookupValueStore + ?Sized>(
        store: &S,
        id: Id,
    ) -> Result<Vec<LookupValue>, AppError> {
        get_all_audit_revisions::<LookupValue, S>(store, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{HasAuditRevision, RevisionType};
    use crate::store::{EntityManager, MemoryStore};
    use chrono::NaiveDate;

    fn user() -> UserContext {
        UserContext::new("tester".to_string())
    }

    async fn add(
        store: &MemoryStore,
        parent_id: Option<Id>,
        value: LookupValue,
    ) -> Result<LookupValue, AppError> {
        LookupValueOperations::add_lookup_value(store, &user(), parent_id, value).await
    }

    async fn ford_and_focus(store: &MemoryStore) {
        add(store, None, LookupValue::new("vehicle-make", "Ford"))
            .await
            .unwrap();
        add(
            store,
            Some(1),
            LookupValue::new("vehicle-model", "Focus").with_parent(1),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_add_then_get_has_version_zero_and_one_add_revision() {
        let store = MemoryStore::new();
        let mut value = LookupValue::new("vehicle-make", "Ford");
        value.id = Some(77);
        value.version = Some(12);

        let created = add(&store, None, value).await.unwrap();
        assert_eq!(created.id, Some(1));
        assert_eq!(created.version, Some(0));

        let fetched = LookupValueOperations::get_lookup_value(&store, 1)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.display_value.as_deref(), Some("Ford"));

        let revisions = LookupValueOperations::get_lookup_value_revisions(&store, 1)
            .await
            .unwrap();
        assert_eq!(revisions.len(), 1);
        let revision = revisions[0].audit_revision().unwrap();
        assert_eq!(revision.revision_type, RevisionType::Add);
        assert_eq!(revision.user.as_deref(), Some("tester"));
    }

    #[tokio::test]
    async fn test_parent_id_rules() {
        let store = MemoryStore::new();
        add(&store, None, LookupValue::new("vehicle-make", "Ford"))
            .await
            .unwrap();

        let err = add(&store, Some(1), LookupValue::new("vehicle-model", "Focus"))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), Some(ErrorCode::ParentIdMismatch));

        let err = add(
            &store,
            None,
            LookupValue::new("vehicle-model", "Focus").with_parent(1),
        )
        .await
        .unwrap_err();
        assert_eq!(err.error_code(), Some(ErrorCode::ParentIdMismatch));

        let err = add(
            &store,
            Some(9),
            LookupValue::new("vehicle-model", "Focus").with_parent(9),
        )
        .await
        .unwrap_err();
        assert_eq!(err.error_code(), Some(ErrorCode::InvalidParent));

        let err = add(
            &store,
            Some(1),
            LookupValue::new("vehicle-make", "Opel").with_parent(1),
        )
        .await
        .unwrap_err();
        assert_eq!(err.error_code(), Some(ErrorCode::SameListNameAsParent));
    }

    #[tokio::test]
    async fn test_duplicate_add_rejected() {
        let store = MemoryStore::new();
        add(&store, None, LookupValue::new("vehicle-make", "Ford"))
            .await
            .unwrap();
        let err = add(&store, None, LookupValue::new("vehicle-make", "Ford"))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), Some(ErrorCode::DuplicateLookupValue));
    }

    #[tokio::test]
    async fn test_delete_parent_only_after_child_is_gone() {
        let store = MemoryStore::new();
        ford_and_focus(&store).await;

        let err = LookupValueOperations::delete_lookup_value(&store, &user(), 1)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), Some(ErrorCode::HasChildren));

        LookupValueOperations::delete_lookup_value(&store, &user(), 2)
            .await
            .unwrap();
        LookupValueOperations::delete_lookup_value(&store, &user(), 1)
            .await
            .unwrap();

        let err = LookupValueOperations::delete_lookup_value(&store, &user(), 1)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), Some(ErrorCode::InvalidLookupValueId));

        let revisions = LookupValueOperations::get_lookup_value_revisions(&store, 1)
            .await
            .unwrap();
        let last = revisions.last().unwrap();
        assert_eq!(last.audit_revision().unwrap().revision_type, RevisionType::Del);
        assert!(last.lookup_list_name.is_none());
    }

    #[tokio::test]
    async fn test_update_rules() {
        let store = MemoryStore::new();
        ford_and_focus(&store).await;
        add(&store, None, LookupValue::new("vehicle-make", "Opel"))
            .await
            .unwrap();

        let mut incoming = store.find(3).await.unwrap().unwrap();
        let err = LookupValueOperations::update_lookup_value(&store, &user(), 1, incoming.clone())
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), Some(ErrorCode::IdMismatch));

        incoming.id = Some(42);
        let err = LookupValueOperations::update_lookup_value(&store, &user(), 42, incoming.clone())
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), Some(ErrorCode::InvalidLookupValueId));

        incoming.id = Some(3);
        incoming.display_value = Some("Ford".to_string());
        let err = LookupValueOperations::update_lookup_value(&store, &user(), 3, incoming.clone())
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), Some(ErrorCode::DuplicateLookupValue));

        incoming.display_value = Some("Vauxhall".to_string());
        incoming.lookup_list_name = Some("ignored".to_string());
        let updated = LookupValueOperations::update_lookup_value(&store, &user(), 3, incoming)
            .await
            .unwrap();
        assert_eq!(updated.version, Some(1));
        assert_eq!(updated.list_name(), Some("vehicle-make"));
    }

    #[tokio::test]
    async fn test_list_filters() {
        let store = MemoryStore::new();
        ford_and_focus(&store).await;
        let mut opel = LookupValue::new("vehicle-make", "Opel");
        opel.active = Some(false);
        opel.effective_to = NaiveDate::from_ymd_opt(2020, 12, 31);
        add(&store, None, opel).await.unwrap();

        let all = LookupValueOperations::get_lookup_values(
            &store,
            "vehicle-make",
            &LookupQuery::default(),
        )
        .await
        .unwrap();
        assert_eq!(all.len(), 2);

        let active = LookupValueOperations::get_lookup_values(
            &store,
            "vehicle-make",
            &LookupQuery {
                active: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(active.len(), 1);

        let historic = LookupValueOperations::get_lookup_values(
            &store,
            "vehicle-make",
            &LookupQuery {
                effective_date: Some("2021-01-01".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(historic.len(), 1);
        assert_eq!(historic[0].display_value.as_deref(), Some("Ford"));

        let models = LookupValueOperations::get_lookup_values(
            &store,
            "vehicle-model",
            &LookupQuery {
                parent_id: Some(3),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(models.is_empty());

        let err = LookupValueOperations::get_lookup_values(
            &store,
            "vehicle-make",
            &LookupQuery {
                effective_date: Some("31-12-2020".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.error_code(), Some(ErrorCode::InvalidEffectiveDate));
    }
}
