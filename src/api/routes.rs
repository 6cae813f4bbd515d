use axum::{
    routing::{get, post},
    Router,
};

use crate::api::handlers::{self, AppState};
use crate::api::{lookup_handlers, notification_handlers};
use crate::store::traits::Store;

pub fn create_router<S: Store + ?Sized + 'static>() -> Router<AppState<S>> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // API Documentation
        .route("/docs", get(handlers::get_api_docs))
        .route("/docs/openapi.json", get(handlers::get_openapi_spec))
        // Lookup values
        .route("/lookup-values", post(lookup_handlers::add_lookup_value::<S>))
        .route(
            "/lookup-values/csv-upload",
            post(lookup_handlers::upload_csv_file::<S>),
        )
        .route(
            "/lookup-values/lookup-list-name/:name",
            get(lookup_handlers::get_lookup_values::<S>),
        )
        .route(
            "/lookup-values/:id",
            get(lookup_handlers::get_lookup_value::<S>)
                .put(lookup_handlers::update_lookup_value::<S>)
                .delete(lookup_handlers::delete_lookup_value::<S>),
        )
        .route(
            "/lookup-values/:id/revisions",
            get(lookup_handlers::get_lookup_value_revisions::<S>),
        )
        // Rendering
        .route(
            "/render-notification/:template",
            post(notification_handlers::render_notification::<S>),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::TemplateRenderService;
    use crate::store::MemoryStore;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> Router {
        create_router::<MemoryStore>().with_state(AppState::new(
            Arc::new(MemoryStore::new()),
            Arc::new(TemplateRenderService::new("email_templates")),
        ))
    }

    async fn send(request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = app().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn test_csv_route_is_not_an_id() {
        let (status, _) = send(
            Request::get("/lookup-values/csv-upload")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_unknown_list_has_no_content() {
        let (status, body) = send(
            Request::get("/lookup-values/lookup-list-name/vehicle-make")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_create_sets_location() {
        let response = app()
            .oneshot(
                Request::post("/lookup-values")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"lookup-list":"vehicle-make","display-value":"Ford","active":true}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()["location"], "/lookup-values/1");
    }
}
