use std::marker::PhantomData;

use log::info;

use crate::logic::constraints::ConstraintTranslator;
use crate::logic::fields::{fields_of, Entity};
use crate::model::{AppError, ErrorCode, PersistenceError, UserContext};
use crate::store::EntityManager;

/// Validated writes with optimistic locking and field-level patching.
///
/// Holds the per-operation constraint registry; build a new helper for each operation.
pub struct PersistenceHelper<'a, T, M>
where
    T: Entity,
    M: EntityManager<T> + ?Sized,
{
    em: &'a M,
    user: &'a UserContext,
    constraints: ConstraintTranslator,
    _entity: PhantomData<fn() -> T>,
}

impl<'a, T, M> PersistenceHelper<'a, T, M>
where
    T: Entity,
    M: EntityManager<T> + ?Sized,
{
    pub fn new(em: &'a M, user: &'a UserContext) -> Self {
        Self {
            em,
            user,
            constraints: ConstraintTranslator::new(),
            _entity: PhantomData,
        }
    }

    pub fn with_constraint(mut self, constraint: &'static str, code: ErrorCode) -> Self {
        self.constraints.register(constraint, code);
        self
    }

    pub async fn persist_entity(&self, entity: T) -> Result<T, AppError> {
        validate(&entity)?;
        let persisted = self
            .em
            .persist(entity, self.user)
            .await
            .map_err(|e| self.translate(e))?;
        info!(
            "{} {:?} created by {}",
            T::ENTITY_NAME,
            persisted.id(),
            self.user.user_id
        );
        Ok(persisted)
    }

    /// Applies the updatable fields of `incoming` to `persisted` and merges the result.
    pub async fn update_entity(&self, mut persisted: T, incoming: &T) -> Result<T, AppError> {
        let fields = fields_of::<T>();
        let incoming_version = fields.version_of(incoming);

        if fields.has_version() && fields.version_of(&persisted) != incoming_version {
            return Err(ErrorCode::ConcurrentModification.into());
        }

        fields.copy_updatable(&mut persisted, incoming);
        validate(&persisted)?;

        let merged = self
            .em
            .merge(persisted, self.user)
            .await
            .map_err(|e| self.translate(e))?;

        if fields.has_version() && fields.version_of(&merged) == incoming_version {
            return Err(ErrorCode::NoEffectiveChange.into());
        }
        info!(
            "{} {:?} updated by {}",
            T::ENTITY_NAME,
            merged.id(),
            self.user.user_id
        );
        Ok(merged)
    }

    pub async fn delete_entity(&self, entity: &T) -> Result<(), AppError> {
        self.em
            .remove(entity, self.user)
            .await
            .map_err(|e| self.translate(e))?;
        info!(
            "{} {:?} deleted by {}",
            T::ENTITY_NAME,
            entity.id(),
            self.user.user_id
        );
        Ok(())
    }

    fn translate(&self, error: PersistenceError) -> AppError {
        match error {
            PersistenceError::StaleVersion { .. } => ErrorCode::ConcurrentModification.into(),
            other => self.constraints.translate(other),
        }
    }
}

fn validate<T: Entity>(entity: &T) -> Result<(), AppError> {
    let errors = entity.validate();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}
