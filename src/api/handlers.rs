use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Json},
};
use log::{error, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::logic::DocumentRenderer;
use crate::model::{AppError, ErrorCode, FieldError};

/// Shared handler state: the persistence backend and the template renderer.
pub struct AppState<S: ?Sized> {
    pub store: Arc<S>,
    pub renderer: Arc<dyn DocumentRenderer>,
}

impl<S: ?Sized> AppState<S> {
    pub fn new(store: Arc<S>, renderer: Arc<dyn DocumentRenderer>) -> Self {
        Self { store, renderer }
    }
}

// Derived Clone would require S: Clone.
impl<S: ?Sized> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            renderer: self.renderer.clone(),
        }
    }
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Simple health check endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Error body returned by every endpoint. Keys without content are omitted, so a
/// structural validation failure carries `field_errors` only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub field_errors: Vec<FieldError>,
}

impl ErrorResponse {
    pub fn new(message: &str) -> Self {
        Self {
            error_code: None,
            message: Some(message.to_string()),
            field_errors: Vec::new(),
        }
    }

    pub fn from_code(code: ErrorCode) -> Self {
        Self {
            error_code: Some(code.code().to_string()),
            message: Some(code.message().to_string()),
            field_errors: Vec::new(),
        }
    }

    pub fn validation(field_errors: Vec<FieldError>) -> Self {
        Self {
            error_code: None,
            message: None,
            field_errors,
        }
    }
}

/// Maps a service failure onto its HTTP status and body.
pub fn error_response(err: AppError) -> ApiError {
    match err {
        AppError::Business(ErrorCode::TemplateNotFound) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::from_code(ErrorCode::TemplateNotFound)),
        ),
        AppError::Business(code) => (StatusCode::BAD_REQUEST, Json(ErrorResponse::from_code(code))),
        AppError::Validation(field_errors) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::validation(field_errors)),
        ),
        other => {
            error!("Request failed: {:#}", anyhow::Error::new(other));
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("An unexpected error occurred")),
            )
        }
    }
}

pub fn not_found(message: &str) -> ApiError {
    (StatusCode::NOT_FOUND, Json(ErrorResponse::new(message)))
}

/// Re-shapes an extractor rejection (bad JSON, query or path) into the error body,
/// keeping the rejection's status.
pub fn rejected<R: IntoResponse + std::fmt::Display>(rejection: R) -> ApiError {
    let message = rejection.to_string();
    let status = rejection.into_response().status();
    warn!("Rejected request ({}): {}", status, message);
    (status, Json(ErrorResponse::new(&message)))
}

// API Documentation handlers
pub async fn get_api_docs() -> Html<String> {
    let html = r#"
<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Lookup Values API Documentation</title>
    <link rel="stylesheet" type="text/css" href="https://unpkg.com/swagger-ui-dist@5.9.0/swagger-ui.css" />
    <style>
        body {
            margin: 0;
            background: #fafafa;
        }
    </style>
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5.9.0/swagger-ui-bundle.js"></script>
    <script>
        window.onload = function() {
            SwaggerUIBundle({
                url: '/docs/openapi.json',
                dom_id: '#swagger-ui',
                deepLinking: true
            });
        };
    </script>
</body>
</html>
"#;
    Html(html.to_string())
}

pub async fn get_openapi_spec() -> Json<serde_json::Value> {
    let error = serde_json::json!({"$ref": "#/components/schemas/ErrorResponse"});
    let lookup_value = serde_json::json!({"$ref": "#/components/schemas/LookupValue"});
    let lookup_list = serde_json::json!({"type": "array", "items": lookup_value});
    let json_content = |schema: &serde_json::Value| serde_json::json!({"application/json": {"schema": schema}});
    let id_param = serde_json::json!({
        "name": "id", "in": "path", "required": true, "schema": {"type": "integer", "format": "int64"}
    });
    let parent_param = serde_json::json!({
        "name": "parent-id", "in": "query", "required": false, "schema": {"type": "integer", "format": "int64"}
    });

    let spec = serde_json::json!({
        "openapi": "3.0.3",
        "info": {
            "title": "Lookup Values API",
            "version": "1.0.0",
            "description": "Hierarchical, effective-dated lookup lists with audit history, CSV import and template rendering."
        },
        "servers": [{"url": "/", "description": "Current server"}],
        "tags": [
            {"name": "Lookup Values", "description": "Lookup list maintenance"},
            {"name": "Rendering", "description": "Template rendering and e-mail notification"},
            {"name": "Documentation", "description": "API documentation endpoints"}
        ],
        "paths": {
            "/health": {
                "get": {"tags": ["Documentation"], "summary": "Health check", "responses": {"200": {"description": "Service is up"}}}
            },
            "/lookup-values": {
                "post": {
                    "tags": ["Lookup Values"],
                    "summary": "Add a lookup value",
                    "parameters": [parent_param],
                    "requestBody": {"required": true, "content": json_content(&lookup_value)},
                    "responses": {
                        "201": {"description": "Created; Location names the new resource", "content": json_content(&lookup_value)},
                        "400": {"description": "Validation or business rule failure", "content": json_content(&error)}
                    }
                }
            },
            "/lookup-values/lookup-list-name/{name}": {
                "get": {
                    "tags": ["Lookup Values"],
                    "summary": "Values of a lookup list ordered by display value",
                    "parameters": [
                        {"name": "name", "in": "path", "required": true, "schema": {"type": "string"}},
                        parent_param,
                        {"name": "active", "in": "query", "required": false, "schema": {"type": "boolean"}},
                        {"name": "effective-date", "in": "query", "required": false, "schema": {"type": "string", "format": "date"}}
                    ],
                    "responses": {
                        "200": {"description": "Matching values", "content": json_content(&lookup_list)},
                        "204": {"description": "No matching values"},
                        "400": {"description": "Invalid effective date", "content": json_content(&error)}
                    }
                }
            },
            "/lookup-values/{id}": {
                "get": {
                    "tags": ["Lookup Values"],
                    "summary": "Get a lookup value",
                    "parameters": [id_param],
                    "responses": {
                        "200": {"description": "The value", "content": json_content(&lookup_value)},
                        "404": {"description": "Not found", "content": json_content(&error)}
                    }
                },
                "put": {
                    "tags": ["Lookup Values"],
                    "summary": "Update the display value, active flag and effective dates",
                    "parameters": [id_param],
                    "requestBody": {"required": true, "content": json_content(&lookup_value)},
                    "responses": {
                        "202": {"description": "Updated", "content": json_content(&lookup_value)},
                        "400": {"description": "Validation, concurrency or business rule failure", "content": json_content(&error)}
                    }
                },
                "delete": {
                    "tags": ["Lookup Values"],
                    "summary": "Delete a childless lookup value",
                    "parameters": [id_param],
                    "responses": {
                        "200": {"description": "Deleted"},
                        "400": {"description": "Unknown id or value has children", "content": json_content(&error)}
                    }
                }
            },
            "/lookup-values/{id}/revisions": {
                "get": {
                    "tags": ["Lookup Values"],
                    "summary": "Audit history ordered by revision number",
                    "parameters": [id_param],
                    "responses": {
                        "200": {"description": "Revisions", "content": json_content(&lookup_list)},
                        "204": {"description": "No revisions recorded"}
                    }
                }
            },
            "/lookup-values/csv-upload": {
                "post": {
                    "tags": ["Lookup Values"],
                    "summary": "Bulk import from a CSV file",
                    "requestBody": {
                        "required": true,
                        "content": {"multipart/form-data": {"schema": {
                            "type": "object",
                            "properties": {"file": {"type": "string", "format": "binary"}}
                        }}}
                    },
                    "responses": {
                        "200": {"description": "Imported values in file order", "content": json_content(&lookup_list)},
                        "400": {"description": "File missing, unreadable or rejected", "content": json_content(&error)}
                    }
                }
            },
            "/render-notification/{template}": {
                "post": {
                    "tags": ["Rendering"],
                    "summary": "Render a template with JSON, XML or text data and optionally queue it as an e-mail",
                    "parameters": [
                        {"name": "template", "in": "path", "required": true, "schema": {"type": "string"}},
                        {"name": "email_to", "in": "query", "required": false, "schema": {"type": "string"}},
                        {"name": "email_subject", "in": "query", "required": false, "schema": {"type": "string"}}
                    ],
                    "requestBody": {"required": true, "content": {
                        "application/json": {"schema": {"type": "object"}},
                        "application/xml": {"schema": {"type": "string"}},
                        "text/plain": {"schema": {"type": "string"}}
                    }},
                    "responses": {
                        "200": {"description": "Rendered document", "content": {"text/html": {"schema": {"type": "string"}}}},
                        "400": {"description": "Template or data failure", "content": json_content(&error)},
                        "404": {"description": "Template not found", "content": json_content(&error)}
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "LookupValue": {
                    "type": "object",
                    "properties": {
                        "id": {"type": "integer", "format": "int64"},
                        "version": {"type": "integer", "format": "int64"},
                        "lookup-list": {"type": "string", "minLength": 3, "maxLength": 100},
                        "display-value": {"type": "string"},
                        "active": {"type": "boolean"},
                        "effective-from": {"type": "string", "format": "date"},
                        "effective-to": {"type": "string", "format": "date"},
                        "parent-id": {"type": "integer", "format": "int64"},
                        "revision": {"$ref": "#/components/schemas/AuditRevision"}
                    }
                },
                "AuditRevision": {
                    "type": "object",
                    "properties": {
                        "rev": {"type": "integer"},
                        "date": {"type": "string"},
                        "user": {"type": "string"},
                        "type": {"type": "string", "enum": ["ADD", "MOD", "DEL"]}
                    }
                },
                "ErrorResponse": {
                    "type": "object",
                    "properties": {
                        "error_code": {"type": "string"},
                        "message": {"type": "string"},
                        "field_errors": {"type": "array", "items": {
                            "type": "object",
                            "properties": {"field": {"type": "string"}, "message": {"type": "string"}}
                        }}
                    }
                }
            }
        }
    });
    Json(spec)
}
