use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use std::convert::Infallible;

use crate::model::UserContext;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_EMAIL_HEADER: &str = "x-user-email";
pub const USER_NAME_HEADER: &str = "x-user-name";

/// Acting user from `X-User-Id`, `X-User-Email` and `X-User-Name`.
/// Requests without a user id act as the development user.
#[async_trait]
impl<S> FromRequestParts<S> for UserContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(user_from_headers(&parts.headers))
    }
}

pub fn user_from_headers(headers: &HeaderMap) -> UserContext {
    match header_text(headers, USER_ID_HEADER) {
        Some(user_id) => UserContext::with_details(
            user_id,
            header_text(headers, USER_EMAIL_HEADER),
            header_text(headers, USER_NAME_HEADER),
        ),
        None => UserContext::default_user(),
    }
}

/// Trimmed header text; blank or non-ASCII values count as absent.
fn header_text(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_user_from_all_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("jdoe"));
        headers.insert(USER_EMAIL_HEADER, HeaderValue::from_static("jdoe@example.com"));
        headers.insert(USER_NAME_HEADER, HeaderValue::from_static("Jane Doe"));

        let user = user_from_headers(&headers);
        assert_eq!(user.user_id, "jdoe");
        assert_eq!(user.user_email.as_deref(), Some("jdoe@example.com"));
        assert_eq!(user.user_name.as_deref(), Some("Jane Doe"));
        assert_eq!(user.audit_name(), "jdoe");
    }

    #[test]
    fn test_missing_or_blank_id_falls_back_to_default_user() {
        assert_eq!(user_from_headers(&HeaderMap::new()), UserContext::default_user());

        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("   "));
        headers.insert(USER_NAME_HEADER, HeaderValue::from_static("Nobody"));
        assert_eq!(user_from_headers(&headers), UserContext::default_user());
    }
}
