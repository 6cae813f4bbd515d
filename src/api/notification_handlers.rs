use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap},
    response::IntoResponse,
};
use log::info;
use serde::Deserialize;

use crate::api::handlers::{error_response, ApiError, AppState};
use crate::logic::{queue_notification, rendered_content_type};
use crate::model::{AppError, UserContext};
use crate::store::traits::Store;

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    pub email_to: Option<String>,
    pub email_subject: Option<String>,
}

/// Renders `template` with the request body as data. With both `email_to` and
/// `email_subject` set, the document is also queued for delivery.
pub async fn render_notification<S: Store + ?Sized>(
    State(state): State<AppState<S>>,
    Path(template): Path<String>,
    Query(query): Query<NotificationQuery>,
    user: UserContext,
    headers: HeaderMap,
    body: String,
) -> Result<impl IntoResponse, ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("text/plain")
        .to_string();

    let renderer = state.renderer.clone();
    let template_name = template.clone();
    // Templates are read from disk on demand.
    let document = tokio::task::spawn_blocking(move || {
        renderer.render(&template_name, &content_type, &body)
    })
    .await
    .map_err(|e| error_response(AppError::Internal(e.into())))?
    .map_err(error_response)?;

    if let (Some(to), Some(subject)) = (&query.email_to, &query.email_subject) {
        queue_notification(&*state.store, &user, to, subject, &document)
            .await
            .map_err(error_response)?;
    } else {
        info!("Rendered template {} without e-mail delivery", template);
    }

    Ok(([(header::CONTENT_TYPE, rendered_content_type(&template))], document))
}
