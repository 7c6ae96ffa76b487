// Token expiry extraction
//
// Tokens are opaque to the client except for the `exp` claim of a JWT-shaped
// payload, which tells us when to stop presenting them.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::fmt;

use super::types::Token;

/// Lifetime assumed for tokens whose expiry cannot be read
pub const FALLBACK_LIFETIME_SECS: i64 = 3600;

/// Token refused by signature verification
#[derive(Debug, Clone, thiserror::Error)]
#[error("token signature rejected: {0}")]
pub struct TokenRejected(pub String);

#[derive(Deserialize)]
struct Claims {
    #[serde(default)]
    exp: Option<serde_json::Value>,
}

/// Turns raw token strings into [`Token`]s.
///
/// Without a secret the payload is decoded but not authenticated. With an
/// HS256 secret, [`ExpiryParser::parse_verified`] also checks the signature.
#[derive(Clone, Default)]
pub struct ExpiryParser {
    secret: Option<DecodingKey>,
}

impl ExpiryParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Verify HS256 signatures against the given shared secret
    pub fn with_hs256_secret(secret: &[u8]) -> Self {
        Self {
            secret: Some(DecodingKey::from_secret(secret)),
        }
    }

    pub fn verifies_signatures(&self) -> bool {
        self.secret.is_some()
    }

    /// Parse a raw token. Empty input yields `None`; anything else yields a
    /// token, expiring one hour from now when no usable `exp` claim exists.
    pub fn parse(&self, raw: &str) -> Option<Token> {
        self.parse_at(raw, Utc::now())
    }

    /// Like [`parse`](Self::parse), but refuses tokens whose signature does not
    /// verify when a secret is configured.
    pub fn parse_verified(&self, raw: &str) -> Result<Option<Token>, TokenRejected> {
        if raw.is_empty() {
            return Ok(None);
        }

        if let Some(ref key) = self.secret {
            let mut validation = Validation::new(Algorithm::HS256);
            // Expiry is enforced by the credential manager, not here
            validation.validate_exp = false;
            validation.validate_aud = false;
            validation.required_spec_claims.clear();

            decode::<serde_json::Value>(raw, key, &validation)
                .map_err(|e| TokenRejected(e.to_string()))?;
        }

        Ok(self.parse(raw))
    }

    pub(crate) fn parse_at(&self, raw: &str, now: DateTime<Utc>) -> Option<Token> {
        if raw.is_empty() {
            return None;
        }

        let expires_at = read_exp_claim(raw).unwrap_or_else(|| {
            tracing::debug!("Token carries no readable exp claim, assuming one hour");
            now + Duration::seconds(FALLBACK_LIFETIME_SECS)
        });

        Some(Token::new(raw, expires_at))
    }
}

impl fmt::Debug for ExpiryParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpiryParser")
            .field("verifies_signatures", &self.verifies_signatures())
            .finish()
    }
}

/// Read `exp` from the payload segment of a `header.payload.signature` token
fn read_exp_claim(raw: &str) -> Option<DateTime<Utc>> {
    let segments: Vec<&str> = raw.split('.').collect();
    if segments.len() != 3 {
        return None;
    }

    let payload = URL_SAFE_NO_PAD.decode(segments[1]).ok()?;
    let claims: Claims = serde_json::from_slice(&payload).ok()?;
    let exp = claims.exp?.as_i64()?;

    DateTime::from_timestamp(exp, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use proptest::prelude::*;

    fn jwt_with_payload(payload: &str) -> String {
        format!(
            "{}.{}.{}",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#),
            URL_SAFE_NO_PAD.encode(payload),
            "c2lnbmF0dXJl"
        )
    }

    fn assert_about_one_hour(token: &Token, now: DateTime<Utc>) {
        let delta = token.expires_at() - now;
        assert!(
            (delta - Duration::hours(1)).num_seconds().abs() <= 5,
            "expected ~1h, got {}s",
            delta.num_seconds()
        );
    }

    #[test]
    fn test_empty_input_is_absent() {
        assert!(ExpiryParser::new().parse("").is_none());
    }

    #[test]
    fn test_exp_claim_is_used() {
        let raw = jwt_with_payload(r#"{"sub":"alice","exp":9999999999}"#);
        let token = ExpiryParser::new().parse(&raw).unwrap();
        assert_eq!(token.expires_at().timestamp(), 9_999_999_999);
        assert_eq!(token.value(), raw);
    }

    #[test]
    fn test_exp_as_last_claim() {
        let raw = jwt_with_payload(r#"{"exp":1700000000}"#);
        let token = ExpiryParser::new().parse(&raw).unwrap();
        assert_eq!(token.expires_at().timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_not_a_jwt_falls_back_to_one_hour() {
        let now = Utc::now();
        let token = ExpiryParser::new().parse("not-a-jwt").unwrap();
        assert_eq!(token.value(), "not-a-jwt");
        assert_about_one_hour(&token, now);
    }

    #[test]
    fn test_undecodable_payload_falls_back() {
        let now = Utc::now();
        let token = ExpiryParser::new().parse("a.!!!.c").unwrap();
        assert_about_one_hour(&token, now);
    }

    #[test]
    fn test_missing_or_non_integer_exp_falls_back() {
        let now = Utc::now();
        for payload in [
            r#"{"sub":"alice"}"#,
            r#"{"exp":"tomorrow"}"#,
            r#"{"exp":12.5}"#,
            r#"["exp",1]"#,
        ] {
            let token = ExpiryParser::new().parse(&jwt_with_payload(payload)).unwrap();
            assert_about_one_hour(&token, now);
        }
    }

    #[test]
    fn test_four_segments_falls_back() {
        let now = Utc::now();
        let raw = format!("{}.extra", jwt_with_payload(r#"{"exp":9999999999}"#));
        let token = ExpiryParser::new().parse(&raw).unwrap();
        assert_about_one_hour(&token, now);
    }

    #[test]
    fn test_verified_parse_accepts_good_signature() {
        let secret = b"shared-secret";
        let raw = encode(
            &Header::default(),
            &serde_json::json!({"sub": "alice", "exp": 9999999999i64}),
            &EncodingKey::from_secret(secret),
        )
        .unwrap();

        let parser = ExpiryParser::with_hs256_secret(secret);
        let token = parser.parse_verified(&raw).unwrap().unwrap();
        assert_eq!(token.expires_at().timestamp(), 9_999_999_999);
    }

    #[test]
    fn test_verified_parse_accepts_expired_token() {
        let secret = b"shared-secret";
        let raw = encode(
            &Header::default(),
            &serde_json::json!({"exp": 1000}),
            &EncodingKey::from_secret(secret),
        )
        .unwrap();

        let token = ExpiryParser::with_hs256_secret(secret)
            .parse_verified(&raw)
            .unwrap()
            .unwrap();
        assert_eq!(token.expires_at().timestamp(), 1000);
    }

    #[test]
    fn test_verified_parse_rejects_bad_signature() {
        let raw = encode(
            &Header::default(),
            &serde_json::json!({"exp": 9999999999i64}),
            &EncodingKey::from_secret(b"someone-else"),
        )
        .unwrap();

        let parser = ExpiryParser::with_hs256_secret(b"shared-secret");
        assert!(parser.parse_verified(&raw).is_err());
        assert!(parser.parse_verified("not-a-jwt").is_err());
    }

    #[test]
    fn test_unverified_parse_verified_matches_parse() {
        let parser = ExpiryParser::new();
        assert!(!parser.verifies_signatures());
        assert_eq!(parser.parse_verified("").unwrap(), None);
        let raw = jwt_with_payload(r#"{"exp":9999999999}"#);
        assert_eq!(parser.parse_verified(&raw).unwrap(), parser.parse(&raw));
    }

    proptest! {
        #[test]
        fn prop_dotless_input_always_gets_fallback(raw in "[A-Za-z0-9_-]{1,64}") {
            let now = Utc::now();
            let token = ExpiryParser::new().parse_at(&raw, now).unwrap();
            prop_assert_eq!(token.value(), raw.as_str());
            prop_assert_eq!(token.expires_at(), now + Duration::seconds(FALLBACK_LIFETIME_SECS));
        }
    }
}
