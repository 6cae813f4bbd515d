use std::error::Error;

use log::warn;

use crate::model::{AppError, ErrorCode, PersistenceError};

/// Maps database constraint names to domain errors.
#[derive(Debug, Clone, Default)]
pub struct ConstraintTranslator {
    mappings: Vec<(&'static str, ErrorCode)>,
}

impl ConstraintTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Panics
    /// When `constraint` is already registered.
    pub fn register(&mut self, constraint: &'static str, code: ErrorCode) {
        if self.mappings.iter().any(|(name, _)| *name == constraint) {
            panic!("The constraint {} has already been added", constraint);
        }
        self.mappings.push((constraint, code));
    }

    pub fn with(mut self, constraint: &'static str, code: ErrorCode) -> Self {
        self.register(constraint, code);
        self
    }

    /// Looks for a registered constraint name in the messages of the failure's causes.
    /// Without a match the failure is returned unchanged.
    pub fn translate(&self, error: PersistenceError) -> AppError {
        let mut cause = error.source();
        while let Some(current) = cause {
            let message = current.to_string();
            if let Some((name, code)) = self
                .mappings
                .iter()
                .find(|(name, _)| message.contains(name))
            {
                warn!("Constraint {} violated, reporting {}", name, code.code());
                return AppError::Business(*code);
            }
            cause = current.source();
        }
        AppError::Persistence(error)
    }
}
