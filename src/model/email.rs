use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::MessageId;

#[derive(Debug, Error)]
pub enum EmailBodyError {
    #[error("e-mail body is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("e-mail body is not valid UTF-8: {0}")]
    Text(#[from] std::string::FromUtf8Error),
}

/// A notification e-mail waiting in the outbox. The body is kept base64-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub user_name: String,
    pub to_address: String,
    pub subject: String,
    pub body: String,
}

impl EmailMessage {
    pub fn new(user_name: &str, to_address: &str, subject: &str, document: &str) -> Self {
        Self {
            user_name: user_name.to_string(),
            to_address: to_address.to_string(),
            subject: subject.to_string(),
            body: STANDARD.encode(document.as_bytes()),
        }
    }

    pub fn decoded_body(&self) -> Result<String, EmailBodyError> {
        let bytes = STANDARD.decode(self.body.as_bytes())?;
        Ok(String::from_utf8(bytes)?)
    }
}

/// Outbox entry together with its delivery bookkeeping.
#[derive(Debug, Clone)]
pub struct QueuedEmail {
    pub id: MessageId,
    pub message: EmailMessage,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_is_base64_encoded() {
        let message = EmailMessage::new("alice", "bob@example.com", "Hi", "<p>Hello</p>");
        assert_eq!(message.body, "PHA+SGVsbG88L3A+");
        assert_eq!(message.decoded_body().unwrap(), "<p>Hello</p>");
    }

    #[test]
    fn test_corrupt_body_is_reported() {
        let mut message = EmailMessage::new("alice", "bob@example.com", "Hi", "x");
        message.body = "not base64!".to_string();
        assert!(matches!(
            message.decoded_body(),
            Err(EmailBodyError::Encoding(_))
        ));
    }
}
