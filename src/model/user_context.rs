use serde::{Deserialize, Serialize};

/// Acting user, taken from request headers and recorded on every audit revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserContext {
    pub user_id: String,
    pub user_email: Option<String>,
    pub user_name: Option<String>,
}

impl UserContext {
    pub fn new(user_id: String) -> Self {
        Self {
            user_id,
            user_email: None,
            user_name: None,
        }
    }

    pub fn with_details(user_id: String, email: Option<String>, name: Option<String>) -> Self {
        Self {
            user_id,
            user_email: email,
            user_name: name,
        }
    }

    /// Fallback identity when no user headers are present
    pub fn default_user() -> Self {
        Self {
            user_id: "dev-user".to_string(),
            user_email: Some("dev@localhost".to_string()),
            user_name: Some("Development User".to_string()),
        }
    }

    /// Name written to audit revisions.
    pub fn audit_name(&self) -> &str {
        &self.user_id
    }
}

impl Default for UserContext {
    fn default() -> Self {
        Self::default_user()
    }
}
