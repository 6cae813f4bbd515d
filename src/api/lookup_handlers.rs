use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Multipart, Path, Query, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    Json as RequestJson,
};
use log::{info, warn};
use serde::Deserialize;

use crate::api::handlers::{error_response, not_found, rejected, ApiError, AppState};
use crate::logic::{CsvImport, LookupQuery, LookupValueOperations};
use crate::model::{ErrorCode, Id, LookupValue, UserContext};
use crate::store::traits::Store;

const CSV_FILE_FIELD: &str = "file";

#[derive(Debug, Deserialize)]
pub struct ParentQuery {
    #[serde(rename = "parent-id")]
    pub parent_id: Option<Id>,
}

#[derive(Debug, Deserialize)]
pub struct LookupListQuery {
    #[serde(rename = "parent-id")]
    pub parent_id: Option<Id>,
    pub active: Option<bool>,
    #[serde(rename = "effective-date")]
    pub effective_date: Option<String>,
}

impl From<LookupListQuery> for LookupQuery {
    fn from(query: LookupListQuery) -> Self {
        LookupQuery {
            parent_id: query.parent_id,
            active: query.active,
            effective_date: query.effective_date,
        }
    }
}

/// 200 with the items, or 204 when there are none.
fn list_response(values: Vec<LookupValue>) -> Response {
    if values.is_empty() {
        StatusCode::NO_CONTENT.into_response()
    } else {
        Json(values).into_response()
    }
}

pub async fn add_lookup_value<S: Store + ?Sized>(
    State(state): State<AppState<S>>,
    query: Result<Query<ParentQuery>, QueryRejection>,
    user: UserContext,
    value: Result<RequestJson<LookupValue>, JsonRejection>,
) -> Result<(StatusCode, [(header::HeaderName, String); 1], Json<LookupValue>), ApiError> {
    let Query(query) = query.map_err(rejected)?;
    let RequestJson(value) = value.map_err(rejected)?;
    let created =
        LookupValueOperations::add_lookup_value(&*state.store, &user, query.parent_id, value)
            .await
            .map_err(error_response)?;

    let location = match created.id {
        Some(id) => format!("/lookup-values/{}", id),
        None => "/lookup-values".to_string(),
    };
    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(created)))
}

pub async fn get_lookup_values<S: Store + ?Sized>(
    State(state): State<AppState<S>>,
    Path(lookup_list_name): Path<String>,
    query: Result<Query<LookupListQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query.map_err(rejected)?;
    let values =
        LookupValueOperations::get_lookup_values(&*state.store, &lookup_list_name, &query.into())
            .await
            .map_err(error_response)?;
    Ok(list_response(values))
}

pub async fn get_lookup_value<S: Store + ?Sized>(
    State(state): State<AppState<S>>,
    id: Result<Path<Id>, PathRejection>,
) -> Result<Json<LookupValue>, ApiError> {
    let Path(id) = id.map_err(rejected)?;
    match LookupValueOperations::get_lookup_value(&*state.store, id).await {
        Ok(Some(value)) => Ok(Json(value)),
        Ok(None) => Err(not_found("Lookup value not found")),
        Err(e) => Err(error_response(e)),
    }
}

pub async fn update_lookup_value<S: Store + ?Sized>(
    State(state): State<AppState<S>>,
    id: Result<Path<Id>, PathRejection>,
    user: UserContext,
    value: Result<RequestJson<LookupValue>, JsonRejection>,
) -> Result<(StatusCode, Json<LookupValue>), ApiError> {
    let Path(id) = id.map_err(rejected)?;
    let RequestJson(value) = value.map_err(rejected)?;
    let updated = LookupValueOperations::update_lookup_value(&*state.store, &user, id, value)
        .await
        .map_err(error_response)?;
    Ok((StatusCode::ACCEPTED, Json(updated)))
}

pub async fn delete_lookup_value<S: Store + ?Sized>(
    State(state): State<AppState<S>>,
    id: Result<Path<Id>, PathRejection>,
    user: UserContext,
) -> Result<StatusCode, ApiError> {
    let Path(id) = id.map_err(rejected)?;
    LookupValueOperations::delete_lookup_value(&*state.store, &user, id)
        .await
        .map_err(error_response)?;
    Ok(StatusCode::OK)
}

pub async fn get_lookup_value_revisions<S: Store + ?Sized>(
    State(state): State<AppState<S>>,
    id: Result<Path<Id>, PathRejection>,
) -> Result<Response, ApiError> {
    let Path(id) = id.map_err(rejected)?;
    let revisions = LookupValueOperations::get_lookup_value_revisions(&*state.store, id)
        .await
        .map_err(error_response)?;
    Ok(list_response(revisions))
}

/// Imports the multipart part named `file`.
pub async fn upload_csv_file<S: Store + ?Sized>(
    State(state): State<AppState<S>>,
    user: UserContext,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Vec<LookupValue>>, ApiError> {
    let mut multipart = multipart.map_err(rejected)?;
    let mut contents = None;
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!("Unreadable multipart upload: {}", e);
                return Err(error_response(ErrorCode::CsvUnreadable.into()));
            }
        };
        if field.name() != Some(CSV_FILE_FIELD) {
            continue;
        }
        let bytes = field.bytes().await.map_err(|e| {
            warn!("Unreadable CSV upload: {}", e);
            error_response(ErrorCode::CsvUnreadable.into())
        })?;
        contents = Some(bytes);
        break;
    }

    let Some(contents) = contents else {
        return Err(error_response(ErrorCode::CsvFileMissing.into()));
    };
    info!("Received CSV upload of {} bytes from {}", contents.len(), user.user_id);

    let imported = CsvImport::import_lookup_values(&*state.store, &user, &contents)
        .await
        .map_err(error_response)?;
    Ok(Json(imported))
}
