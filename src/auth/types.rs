// Authentication types

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt;

/// A single credential artifact: the raw string sent on the wire and the
/// instant after which it must no longer be presented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    value: String,
    expires_at: DateTime<Utc>,
}

impl Token {
    pub fn new(value: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    /// Raw token string, as placed in an `authorization` header
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// A token is valid strictly before its expiry instant
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Token pair as returned by the auth service. Either member may be missing;
/// an empty string counts as missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TokenPair {
    #[serde(default)]
    pub access: Option<String>,
    #[serde(default)]
    pub refresh: Option<String>,
}

impl TokenPair {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: Some(access.into()),
            refresh: Some(refresh.into()),
        }
    }

    pub fn access(&self) -> Option<&str> {
        self.access.as_deref().filter(|s| !s.is_empty())
    }

    pub fn refresh(&self) -> Option<&str> {
        self.refresh.as_deref().filter(|s| !s.is_empty())
    }
}

/// Login response envelope
#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub tokens: Option<TokenPair>,
}

/// Primary username/password credential
#[derive(Clone, PartialEq, Eq)]
pub struct BasicCredential {
    username: String,
    password: String,
}

impl BasicCredential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// `Basic base64(username:password)`
    pub fn header_value(&self) -> String {
        let encoded = STANDARD.encode(format!("{}:{}", self.username, self.password));
        format!("Basic {}", encoded)
    }
}

impl fmt::Debug for BasicCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicCredential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_token_validity_is_strict() {
        let now = Utc::now();
        let token = Token::new("abc", now);
        assert!(!token.is_valid_at(now));
        assert!(token.is_valid_at(now - Duration::seconds(1)));
        assert!(!token.is_valid_at(now + Duration::seconds(1)));
    }

    #[test]
    fn test_basic_header_value() {
        let cred = BasicCredential::new("alice", "s3cret");
        // base64("alice:s3cret")
        assert_eq!(cred.header_value(), "Basic YWxpY2U6czNjcmV0");
    }

    #[test]
    fn test_basic_credential_debug_hides_password() {
        let cred = BasicCredential::new("alice", "s3cret");
        let rendered = format!("{:?}", cred);
        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("s3cret"));
    }

    #[test]
    fn test_token_pair_treats_empty_as_missing() {
        let pair = TokenPair {
            access: Some(String::new()),
            refresh: None,
        };
        assert_eq!(pair.access(), None);
        assert_eq!(pair.refresh(), None);

        let pair = TokenPair::new("a", "r");
        assert_eq!(pair.access(), Some("a"));
        assert_eq!(pair.refresh(), Some("r"));
    }

    #[test]
    fn test_login_response_without_tokens() {
        let resp: LoginResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.tokens.is_none());

        let resp: LoginResponse =
            serde_json::from_str(r#"{"tokens":{"access":"a"}}"#).unwrap();
        let tokens = resp.tokens.unwrap();
        assert_eq!(tokens.access(), Some("a"));
        assert_eq!(tokens.refresh(), None);
    }
}
