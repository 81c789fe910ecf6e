//! Explicit authentication context for one user.
//!
//! Passed to the HTTP clients instead of living in ambient global state.
//! Serializable so it can cross process boundaries (config files, handoff
//! between front-end and worker).

use serde::{Deserialize, Serialize};

/// Who is taking the test, and how to authenticate their requests.
///
/// Note: Custom Debug impl masks the token to prevent accidental exposure in logs.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    /// Platform user identifier.
    pub user_id: String,
    /// Bearer token for platform requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

impl SessionContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            access_token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.access_token = if token.is_empty() { None } else { Some(token) };
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    /// Value for the `Authorization` header, if a token is present.
    pub fn bearer(&self) -> Option<String> {
        self.access_token.as_ref().map(|t| format!("Bearer {t}"))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("user_id", &self.user_id)
            .field("access_token", &self.access_token.as_ref().map(|_| "***"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_masks_token() {
        let ctx = SessionContext::new("42").with_token("secret-token");
        let debug = format!("{ctx:?}");
        assert!(debug.contains("42"));
        assert!(!debug.contains("secret-token"));
    }

    #[test]
    fn empty_token_is_unauthenticated() {
        let ctx = SessionContext::new("1").with_token("");
        assert!(!ctx.is_authenticated());
        assert_eq!(ctx.bearer(), None);
    }

    #[test]
    fn survives_json_boundary() {
        let ctx = SessionContext::new("7").with_token("abc");
        let restored = SessionContext::from_json(&ctx.to_json().unwrap()).unwrap();
        assert_eq!(restored, ctx);
        assert_eq!(restored.bearer().as_deref(), Some("Bearer abc"));
    }
}
