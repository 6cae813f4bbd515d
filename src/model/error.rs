use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::Id;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Every domain error the service can report, with its stable wire code and message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ParentIdMismatch,
    InvalidParent,
    SameListNameAsParent,
    DuplicateLookupValue,
    IdMismatch,
    InvalidLookupValueId,
    InvalidEffectiveDate,
    HasChildren,
    CsvFileMissing,
    CsvSameListNameAsParent,
    CsvDuplicateLookupValue,
    CsvUnreadable,
    CsvInvalidDate,
    CsvParentNotFound,
    CsvParentAmbiguous,
    CsvInvalidHeaders,
    ConcurrentModification,
    NoEffectiveChange,
    TemplateSyntax,
    TemplateUndefinedReference,
    TemplateNotFound,
    TemplateRuntime,
    InvalidXmlData,
    InvalidJsonData,
    TemplateUnreadable,
    EmailNotQueued,
}

impl ErrorCode {
    pub const fn code(self) -> &'static str {
        match self {
            ErrorCode::ParentIdMismatch => "0001",
            ErrorCode::InvalidParent => "0002",
            ErrorCode::SameListNameAsParent => "0003",
            ErrorCode::DuplicateLookupValue => "0004",
            ErrorCode::IdMismatch => "0005",
            ErrorCode::InvalidLookupValueId => "0006",
            ErrorCode::InvalidEffectiveDate => "0007",
            ErrorCode::HasChildren => "0008",
            ErrorCode::CsvFileMissing => "0009",
            ErrorCode::CsvSameListNameAsParent => "0010",
            ErrorCode::CsvDuplicateLookupValue => "0011",
            ErrorCode::CsvUnreadable => "0012",
            ErrorCode::CsvInvalidDate => "0013",
            ErrorCode::CsvParentNotFound => "0014",
            ErrorCode::CsvParentAmbiguous => "0015",
            ErrorCode::CsvInvalidHeaders => "0016",
            ErrorCode::ConcurrentModification => "F001",
            ErrorCode::NoEffectiveChange => "F002",
            ErrorCode::TemplateSyntax => "FMR2",
            ErrorCode::TemplateUndefinedReference => "FMR3",
            ErrorCode::TemplateNotFound => "FMR4",
            ErrorCode::TemplateRuntime => "FMR5",
            ErrorCode::InvalidXmlData => "FMR6",
            ErrorCode::InvalidJsonData => "FMR7",
            ErrorCode::TemplateUnreadable => "FMR8",
            ErrorCode::EmailNotQueued => "FMR9",
        }
    }

    pub const fn message(self) -> &'static str {
        match self {
            ErrorCode::ParentIdMismatch => {
                "The parent lookup value id in the URL does not match the parent id in the request body"
            }
            ErrorCode::InvalidParent => "The specified parent id is invalid",
            ErrorCode::SameListNameAsParent => {
                "A lookup value may not have the same lookup list name as its parent lookup value"
            }
            ErrorCode::DuplicateLookupValue => {
                "The combination of the lookup list name, display value and parent lookup list must be unique"
            }
            ErrorCode::IdMismatch => {
                "The lookup value id in the URL does not match the id in the request body"
            }
            ErrorCode::InvalidLookupValueId => "The lookup value id is invalid",
            ErrorCode::InvalidEffectiveDate => "The effective date is invalid",
            ErrorCode::HasChildren => {
                "A lookup value cannot be deleted if it has child lookup values"
            }
            ErrorCode::CsvFileMissing => "The uploaded CSV file is missing or empty",
            ErrorCode::CsvSameListNameAsParent => {
                "One of the lookup values in the csv file has the same lookup list name as its parent lookup value"
            }
            ErrorCode::CsvDuplicateLookupValue => {
                "At least one of the lookup values in the CSV file already exists"
            }
            ErrorCode::CsvUnreadable => "The uploaded CSV file could not be read",
            ErrorCode::CsvInvalidDate => {
                "The uploaded CSV file contains an EFFECTIVE_FROM or EFFECTIVE_TO date that is not in the format yyyy-MM-dd"
            }
            ErrorCode::CsvParentNotFound => {
                "One of the records in the CSV file contains a reference to a parent lookup value that does not exist"
            }
            ErrorCode::CsvParentAmbiguous => {
                "One of the records in the CSV file contains a reference to a parent lookup value that is ambiguous"
            }
            ErrorCode::CsvInvalidHeaders => "The CSV file headers are invalid",
            ErrorCode::ConcurrentModification => {
                "The entity has been updated since it has been retrieved"
            }
            ErrorCode::NoEffectiveChange => "None of the updatable fields were updated",
            ErrorCode::TemplateSyntax => "The template could not be parsed",
            ErrorCode::TemplateUndefinedReference => {
                "The template contains a reference to a data element that is not provided"
            }
            ErrorCode::TemplateNotFound => "The template name is invalid",
            ErrorCode::TemplateRuntime => "A template runtime error occurred.",
            ErrorCode::InvalidXmlData => "The input XML data is invalid",
            ErrorCode::InvalidJsonData => "The input JSON data is invalid",
            ErrorCode::TemplateUnreadable => "The template could not be read",
            ErrorCode::EmailNotQueued => {
                "The rendered document could not be queued for e-mail delivery"
            }
        }
    }
}

/// A single structural validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

/// Failure raised by a storage collaborator.
///
/// Write failures keep the backend's own error as their source so that the
/// constraint translator can inspect the diagnostic text.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to {operation} {entity}")]
    Write {
        operation: &'static str,
        entity: &'static str,
        #[source]
        source: BoxError,
    },
    #[error("failed to {operation}")]
    Read {
        operation: &'static str,
        #[source]
        source: BoxError,
    },
    #[error("{entity} {id} was changed or removed by another transaction")]
    StaleVersion { entity: &'static str, id: Id },
}

impl PersistenceError {
    pub fn write(
        operation: &'static str,
        entity: &'static str,
        source: impl Into<BoxError>,
    ) -> Self {
        PersistenceError::Write {
            operation,
            entity,
            source: source.into(),
        }
    }

    pub fn read(operation: &'static str, source: impl Into<BoxError>) -> Self {
        PersistenceError::Read {
            operation,
            source: source.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("[{}] {}", .0.code(), .0.message())]
    Business(ErrorCode),
    #[error("{} field validation error(s)", .0.len())]
    Validation(Vec<FieldError>),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<ErrorCode> for AppError {
    fn from(code: ErrorCode) -> Self {
        AppError::Business(code)
    }
}

impl AppError {
    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            AppError::Business(code) => Some(*code),
            _ => None,
        }
    }

    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            AppError::Validation(errors) => errors,
            _ => &[],
        }
    }
}
