use csv::{ReaderBuilder, Trim};
use log::{info, warn};
use serde::Deserialize;

use crate::logic::lookup_filter::parse_optional_date;
use crate::logic::persistence::PersistenceHelper;
use crate::model::{AppError, ErrorCode, LookupValue, UserContext, UC_LOOKUP_LIST_VALUE};
use crate::store::LookupValueStore;

pub const CSV_HEADERS: [&str; 7] = [
    "LOOKUP-LIST-NAME",
    "DISPLAY-VALUE",
    "ACTIVE",
    "EFFECTIVE-FROM",
    "EFFECTIVE-TO",
    "PARENT-LOOKUP-LIST-NAME",
    "PARENT-DISPLAY-VALUE",
];

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "LOOKUP-LIST-NAME")]
    lookup_list_name: String,
    #[serde(rename = "DISPLAY-VALUE")]
    display_value: String,
    #[serde(rename = "ACTIVE")]
    active: String,
    #[serde(rename = "EFFECTIVE-FROM")]
    effective_from: String,
    #[serde(rename = "EFFECTIVE-TO")]
    effective_to: String,
    #[serde(rename = "PARENT-LOOKUP-LIST-NAME")]
    parent_lookup_list_name: String,
    #[serde(rename = "PARENT-DISPLAY-VALUE")]
    parent_display_value: String,
}

impl CsvRow {
    fn parent_reference(&self) -> Option<(&str, &str)> {
        if self.parent_lookup_list_name.is_empty() || self.parent_display_value.is_empty() {
            None
        } else {
            Some((&self.parent_lookup_list_name, &self.parent_display_value))
        }
    }
}

fn unreadable(error: csv::Error) -> AppError {
    warn!("Rejected CSV upload: {}", error);
    ErrorCode::CsvUnreadable.into()
}

/// Bulk creation of lookup values from an uploaded CSV file.
pub struct CsvImport;

impl CsvImport {
    /// Persists one lookup value per record, in file order. A failing record stops the
    /// import; records before it stay stored.
    pub async fn import_lookup_values<S: LookupValueStore + ?Sized>(
        store: &S,
        user: &UserContext,
        contents: &[u8],
    ) -> Result<Vec<LookupValue>, AppError> {
        if contents.is_empty() {
            return Err(ErrorCode::CsvFileMissing.into());
        }

        let mut reader = ReaderBuilder::new()
            .trim(Trim::All)
            .from_reader(contents);

        let headers = reader.headers().map_err(unreadable)?.clone();
        if !CSV_HEADERS
            .iter()
            .all(|expected| headers.iter().any(|h| h == *expected))
        {
            warn!("Rejected CSV upload with headers {:?}", headers);
            return Err(ErrorCode::CsvInvalidHeaders.into());
        }

        let records: Vec<Result<CsvRow, csv::Error>> = reader.deserialize().collect();

        let mut imported = Vec::with_capacity(records.len());
        for record in records {
            let row = record.map_err(unreadable)?;
            let value = Self::lookup_value_from_row(store, &row).await?;

            let persisted = PersistenceHelper::new(store, user)
                .with_constraint(UC_LOOKUP_LIST_VALUE, ErrorCode::CsvDuplicateLookupValue)
                .persist_entity(value)
                .await?;
            imported.push(persisted);
        }

        info!("Imported {} lookup values from CSV", imported.len());
        Ok(imported)
    }

    async fn lookup_value_from_row<S: LookupValueStore + ?Sized>(
        store: &S,
        row: &CsvRow,
    ) -> Result<LookupValue, AppError> {
        let mut value = LookupValue::new(&row.lookup_list_name, &row.display_value);
        value.active = Some(row.active.eq_ignore_ascii_case("true"));
        value.effective_from = parse_optional_date(&row.effective_from, ErrorCode::CsvInvalidDate)?;
        value.effective_to = parse_optional_date(&row.effective_to, ErrorCode::CsvInvalidDate)?;

        if let Some((parent_list, parent_display)) = row.parent_reference() {
            let mut candidates = store
                .find_by_lookup_list_name_and_display_value(parent_list, parent_display)
                .await?;
            let parent = match candidates.len() {
                0 => return Err(ErrorCode::CsvParentNotFound.into()),
                1 => candidates.remove(0),
                _ => return Err(ErrorCode::CsvParentAmbiguous.into()),
            };
            if parent.lookup_list_name == value.lookup_list_name {
                return Err(ErrorCode::CsvSameListNameAsParent.into());
            }
            value.parent_id = parent.id;
        }

        Ok(value)
    }
}
