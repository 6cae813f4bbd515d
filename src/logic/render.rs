use std::path::Path;

use log::warn;
use minijinja::{context, path_loader, Environment, ErrorKind, UndefinedBehavior};
use roxmltree::{Document, Node};
use serde_json::{Map, Value};

use crate::model::{AppError, ErrorCode};

/// Renders a named template against input data.
pub trait DocumentRenderer: Send + Sync {
    /// `data` is interpreted according to `content_type` and exposed to the template as `data`.
    fn render(&self, template_name: &str, content_type: &str, data: &str) -> Result<String, AppError>;
}

/// MiniJinja templates loaded from a directory, with strict undefined handling.
pub struct TemplateRenderService {
    env: Environment<'static>,
}

impl TemplateRenderService {
    pub fn new(template_dir: impl AsRef<Path>) -> Self {
        let mut env = Environment::new();
        env.set_loader(path_loader(template_dir));
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        Self { env }
    }
}

impl DocumentRenderer for TemplateRenderService {
    fn render(&self, template_name: &str, content_type: &str, data: &str) -> Result<String, AppError> {
        let data = bind_data(content_type, data)?;
        let template = self.env.get_template(template_name).map_err(template_error)?;
        template
            .render(context! { data => data })
            .map_err(template_error)
    }
}

/// `text/html` for `.html` templates, `text/plain` otherwise.
pub fn rendered_content_type(template_name: &str) -> &'static str {
    if template_name.ends_with(".html") || template_name.ends_with(".htm") {
        "text/html; charset=utf-8"
    } else {
        "text/plain; charset=utf-8"
    }
}

fn template_error(error: minijinja::Error) -> AppError {
    let code = match error.kind() {
        ErrorKind::TemplateNotFound => ErrorCode::TemplateNotFound,
        ErrorKind::SyntaxError => ErrorCode::TemplateSyntax,
        ErrorKind::UndefinedError => ErrorCode::TemplateUndefinedReference,
        _ if caused_by_io(&error) => ErrorCode::TemplateUnreadable,
        _ => ErrorCode::TemplateRuntime,
    };
    warn!("Template rendering failed with {}: {:#}", code.code(), error);
    code.into()
}

fn caused_by_io(error: &minijinja::Error) -> bool {
    let mut cause = std::error::Error::source(error);
    while let Some(current) = cause {
        if current.is::<std::io::Error>() {
            return true;
        }
        cause = current.source();
    }
    false
}

fn mime_essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn bind_data(content_type: &str, data: &str) -> Result<Value, AppError> {
    let mime = mime_essence(content_type);
    if mime == "application/json" || mime.ends_with("+json") {
        serde_json::from_str(data).map_err(|e| {
            warn!("Rejected JSON template data: {}", e);
            ErrorCode::InvalidJsonData.into()
        })
    } else if mime == "application/xml" || mime == "text/xml" || mime.ends_with("+xml") {
        xml_to_value(data).map_err(|e| {
            warn!("Rejected XML template data: {}", e);
            ErrorCode::InvalidXmlData.into()
        })
    } else {
        Ok(Value::String(data.to_string()))
    }
}

/// Converts an XML document into nested values keyed by element name.
///
/// Attributes appear as `@name`, mixed text as `#text`, and repeated child elements
/// as arrays. Leaf elements without attributes collapse to their text.
pub fn xml_to_value(text: &str) -> Result<Value, roxmltree::Error> {
    let document = Document::parse(text)?;
    let root = document.root_element();
    let mut map = Map::new();
    map.insert(root.tag_name().name().to_string(), element_to_value(root));
    Ok(Value::Object(map))
}

fn element_to_value(node: Node) -> Value {
    let text: String = node
        .children()
        .filter(|c| c.is_text())
        .filter_map(|c| c.text())
        .collect();
    let text = text.trim();

    let has_elements = node.children().any(|c| c.is_element());
    let has_attributes = node.attributes().next().is_some();
    if !has_elements && !has_attributes {
        return Value::String(text.to_string());
    }

    let mut map = Map::new();
    for attribute in node.attributes() {
        map.insert(
            format!("@{}", attribute.name()),
            Value::String(attribute.value().to_string()),
        );
    }
    for child in node.children().filter(|c| c.is_element()) {
        let name = child.tag_name().name().to_string();
        let value = element_to_value(child);
        match map.get_mut(&name) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                map.insert(name, value);
            }
        }
    }
    if !text.is_empty() {
        map.insert("#text".to_string(), Value::String(text.to_string()));
    }
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn service(templates: &[(&str, &str)]) -> (TempDir, TemplateRenderService) {
        let dir = tempfile::tempdir().unwrap();
        for (name, body) in templates {
            fs::write(dir.path().join(name), body).unwrap();
        }
        let service = TemplateRenderService::new(dir.path());
        (dir, service)
    }

    fn code(result: Result<String, AppError>) -> Option<ErrorCode> {
        result.unwrap_err().error_code()
    }

    #[test]
    fn test_json_data() {
        let (_dir, service) = service(&[("hello.txt", "Hello {{ data.name }}!")]);
        let out = service
            .render("hello.txt", "application/json; charset=utf-8", r#"{"name":"Ann"}"#)
            .unwrap();
        assert_eq!(out, "Hello Ann!");
    }

    #[test]
    fn test_xml_data() {
        let (_dir, service) = service(&[(
            "order.txt",
            "{{ data.order['@id'] }}:{% for item in data.order.item %}{{ item }};{% endfor %}",
        )]);
        let out = service
            .render(
                "order.txt",
                "application/xml",
                r#"<order id="7"><item>a</item><item>b</item></order>"#,
            )
            .unwrap();
        assert_eq!(out, "7:a;b;");
    }

    #[test]
    fn test_plain_text_data() {
        let (_dir, service) = service(&[("echo.txt", "[{{ data }}]")]);
        assert_eq!(service.render("echo.txt", "text/plain", "raw").unwrap(), "[raw]");
    }

    #[test]
    fn test_failure_codes() {
        let (_dir, service) = service(&[
            ("broken.txt", "{% if %}"),
            ("strict.txt", "{{ data.missing }}"),
            ("divide.txt", "{{ data.n // 0 }}"),
        ]);

        assert_eq!(
            code(service.render("nope.txt", "text/plain", "")),
            Some(ErrorCode::TemplateNotFound)
        );
        assert_eq!(
            code(service.render("broken.txt", "text/plain", "")),
            Some(ErrorCode::TemplateSyntax)
        );
        assert_eq!(
            code(service.render("strict.txt", "application/json", "{}")),
            Some(ErrorCode::TemplateUndefinedReference)
        );
        assert_eq!(
            code(service.render("divide.txt", "application/json", r#"{"n":1}"#)),
            Some(ErrorCode::TemplateRuntime)
        );
        assert_eq!(
            code(service.render("strict.txt", "application/json", "{")),
            Some(ErrorCode::InvalidJsonData)
        );
        assert_eq!(
            code(service.render("strict.txt", "text/xml", "<open>")),
            Some(ErrorCode::InvalidXmlData)
        );
    }

    #[test]
    fn test_xml_conversion_shape() {
        let value = xml_to_value(
            r#"<person title="Dr"><name>Ann</name><note lang="en">hi</note>tail</person>"#,
        )
        .unwrap();
        assert_eq!(
            value,
            json!({"person": {
                "@title": "Dr",
                "name": "Ann",
                "note": {"@lang": "en", "#text": "hi"},
                "#text": "tail"
            }})
        );
    }

    #[test]
    fn test_rendered_content_type() {
        assert!(rendered_content_type("welcome.html").starts_with("text/html"));
        assert!(rendered_content_type("welcome.txt").starts_with("text/plain"));
    }
}
