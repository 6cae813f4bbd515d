use std::fs;
use std::sync::Arc;

use lookup_db_rust::store::EmailOutboxStore;
use lookup_db_rust::{
    build_app, DocumentRenderer, EmailMessageSender, LogMailTransport, MemoryStore,
    TemplateRenderService,
};
use reqwest::{header, Client, StatusCode};
use serde_json::Value;
use tempfile::TempDir;
use tokio::net::TcpListener;

struct TestServer {
    client: Client,
    base_url: String,
    store: Arc<MemoryStore>,
    _templates: TempDir,
}

impl TestServer {
    async fn start() -> Self {
        let templates = tempfile::tempdir().unwrap();
        for (name, body) in [
            ("welcome.html", "<p>Welcome {{ data.user.name }}</p>"),
            ("order.txt", "Order {{ data.order['@id'] }}: {{ data.order.item | join(', ') }}"),
            ("echo.txt", "{{ data }}"),
            ("broken.txt", "{% for %}"),
        ] {
            fs::write(templates.path().join(name), body).unwrap();
        }

        let store = Arc::new(MemoryStore::new());
        let renderer: Arc<dyn DocumentRenderer> =
            Arc::new(TemplateRenderService::new(templates.path()));
        let app = build_app(store.clone(), renderer);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            client: Client::new(),
            base_url: format!("http://{}", address),
            store,
            _templates: templates,
        }
    }

    async fn render(&self, path: &str, content_type: &str, body: &str) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .header(header::CONTENT_TYPE, content_type)
            .header("X-User-Id", "mailer")
            .body(body.to_string())
            .send()
            .await
            .unwrap()
    }
}

async fn error_code(response: reqwest::Response) -> String {
    let body: Value = response.json().await.unwrap();
    body["error_code"].as_str().unwrap_or_default().to_string()
}

#[tokio::test]
async fn test_render_json_data_as_html() {
    let server = TestServer::start().await;
    let response = server
        .render(
            "/render-notification/welcome.html",
            "application/json",
            r#"{"user": {"name": "Ann"}}"#,
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/html"));
    assert_eq!(response.text().await.unwrap(), "<p>Welcome Ann</p>");
    assert!(server.store.pending_emails(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_render_xml_and_text_data() {
    let server = TestServer::start().await;

    let order = server
        .render(
            "/render-notification/order.txt",
            "application/xml",
            r#"<order id="42"><item>bell</item><item>lamp</item></order>"#,
        )
        .await;
    assert_eq!(order.status(), StatusCode::OK);
    assert_eq!(order.text().await.unwrap(), "Order 42: bell, lamp");

    let echo = server
        .render("/render-notification/echo.txt", "text/plain", "plain words")
        .await;
    assert!(echo.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
    assert_eq!(echo.text().await.unwrap(), "plain words");
}

#[tokio::test]
async fn test_render_failures() {
    let server = TestServer::start().await;

    let missing = server
        .render("/render-notification/nope.html", "application/json", "{}")
        .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    assert_eq!(error_code(missing).await, "FMR4");

    let undefined = server
        .render("/render-notification/welcome.html", "application/json", "{}")
        .await;
    assert_eq!(undefined.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(undefined).await, "FMR3");

    let syntax = server
        .render("/render-notification/broken.txt", "text/plain", "")
        .await;
    assert_eq!(error_code(syntax).await, "FMR2");

    let bad_json = server
        .render("/render-notification/welcome.html", "application/json", "{")
        .await;
    assert_eq!(error_code(bad_json).await, "FMR7");

    let bad_xml = server
        .render("/render-notification/order.txt", "text/xml", "<order>")
        .await;
    assert_eq!(error_code(bad_xml).await, "FMR6");
}

#[tokio::test]
async fn test_render_queues_email_for_delivery() {
    let server = TestServer::start().await;
    let response = server
        .render(
            "/render-notification/welcome.html?email_to=ann@example.com&email_subject=Hello",
            "application/json",
            r#"{"user": {"name": "Ann"}}"#,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let pending = server.store.pending_emails(10).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].message.to_address, "ann@example.com");
    assert_eq!(pending[0].message.subject, "Hello");
    assert_eq!(pending[0].message.user_name, "mailer");
    assert_eq!(pending[0].message.decoded_body().unwrap(), "<p>Welcome Ann</p>");

    let sender = EmailMessageSender::new(
        server.store.clone(),
        Arc::new(LogMailTransport),
        "noreply@example.com".to_string(),
        10,
    );
    let report = sender.deliver_pending().await.unwrap();
    assert_eq!(report.sent, 1);
    assert!(server.store.pending_emails(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_subject_without_recipient_only_renders() {
    let server = TestServer::start().await;
    let response = server
        .render(
            "/render-notification/echo.txt?email_subject=Hello",
            "text/plain",
            "hi",
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(server.store.pending_emails(10).await.unwrap().is_empty());
}
