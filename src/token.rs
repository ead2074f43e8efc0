//! Stateless signed-token codec.
//!
//! Tokens are compact HS256 JWTs carrying a kind, an optional client id,
//! an optional user name, a scope set and an absolute expiry. There is no
//! server-side token state: issuance and verification are pure
//! computations over the signing secret.

use crate::config::{AuthorizationConfig, LifetimeConfig};
use crate::errors::ConfigReport;
use crate::routes::parse::parse_duration;
use crate::scope::ScopeSet;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

const GENERATED_SECRET_LEN: usize = 32;
const GENERATED_SECRET_ALPHABET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789-";

#[derive(Debug, Error)]
pub enum TokenError {
    /// All verification failures collapse to this one opaque error;
    /// callers cannot distinguish forged from expired from malformed.
    #[error("invalid token")]
    Invalid,
    #[error("token signing failed: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// The three token kinds the gateway issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenKind {
    #[serde(rename = "code")]
    Code,
    #[serde(rename = "access")]
    Access,
    #[serde(rename = "refresh")]
    Refresh,
}

/// Claims embedded in every issued token. Compact field names keep the
/// encoded token short.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    #[serde(rename = "t")]
    pub kind: TokenKind,
    #[serde(rename = "c", default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(rename = "u", default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(rename = "s", default, skip_serializing_if = "ScopeSet::is_empty")]
    pub scope: ScopeSet,
    /// Expiry as epoch seconds; 0 means the token never expires.
    #[serde(rename = "e", default)]
    pub expires_at: i64,
}

/// Per-kind token lifetimes.
#[derive(Debug, Clone)]
pub struct TokenLifetimes {
    pub code: Duration,
    pub access: Duration,
    pub refresh: Duration,
}

impl Default for TokenLifetimes {
    fn default() -> Self {
        Self {
            code: Duration::minutes(3),
            access: Duration::hours(1),
            refresh: Duration::days(90),
        }
    }
}

impl TokenLifetimes {
    /// Applies configured overrides onto the defaults, reporting invalid
    /// or negative duration strings.
    pub fn from_config(config: &LifetimeConfig, report: &mut ConfigReport) -> Self {
        let mut lifetimes = TokenLifetimes::default();
        let mut apply = |src: &Option<String>, name: &str, dest: &mut Duration| {
            let Some(src) = src.as_deref().filter(|s| !s.is_empty()) else {
                return;
            };
            match parse_duration(src) {
                Ok(duration) if duration >= Duration::zero() => *dest = duration,
                Ok(_) => report.push(format!(
                    "authorization.lifeTime.{name} is not valid: negative value not allowed"
                )),
                Err(e) => report.push(format!("authorization.lifeTime.{name} is not valid: {e}")),
            }
        };
        apply(&config.code_token, "codeToken", &mut lifetimes.code);
        apply(&config.access_token, "accessToken", &mut lifetimes.access);
        apply(&config.refresh_token, "refreshToken", &mut lifetimes.refresh);
        lifetimes
    }
}

/// Issues and verifies signed tokens with a single symmetric secret.
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetimes: TokenLifetimes,
}

impl TokenCodec {
    pub fn new(secret: &[u8], lifetimes: TokenLifetimes) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            lifetimes,
        }
    }

    /// Builds a codec from configuration; generates an in-memory random
    /// secret when none is configured. Tokens signed with a generated
    /// secret become unverifiable after a process restart.
    pub fn from_config(config: &AuthorizationConfig, report: &mut ConfigReport) -> Self {
        let lifetimes = TokenLifetimes::from_config(&config.life_time, report);
        let secret = match config.token_secret.as_deref().filter(|s| !s.is_empty()) {
            Some(secret) => secret.to_string(),
            None => generated_secret(),
        };
        Self::new(secret.as_bytes(), lifetimes)
    }

    fn lifetime(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Code => self.lifetimes.code,
            TokenKind::Access => self.lifetimes.access,
            TokenKind::Refresh => self.lifetimes.refresh,
        }
    }

    /// Access-token lifetime in whole seconds, for `expires_in` fields.
    pub fn access_lifetime_secs(&self) -> u64 {
        self.lifetimes.access.num_seconds().max(0) as u64
    }

    /// Issues a signed token of the given kind with the kind's lifetime.
    pub fn issue(
        &self,
        kind: TokenKind,
        client_id: Option<&str>,
        user_name: Option<&str>,
        scope: ScopeSet,
    ) -> Result<String, TokenError> {
        let claims = TokenClaims {
            kind,
            client_id: client_id.map(str::to_string),
            user_name: user_name.map(str::to_string),
            scope,
            expires_at: (Utc::now() + self.lifetime(kind)).timestamp(),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    /// Verifies a token string and returns its claims.
    ///
    /// Rejects on signature mismatch, malformed structure, unexpected
    /// algorithm, unknown kind, or past expiry; every failure is the same
    /// opaque [`TokenError::Invalid`].
    pub fn parse(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // expiry uses the claims' own `e` field, with 0 meaning never
        validation.required_spec_claims = HashSet::new();
        validation.validate_exp = false;
        let data = decode::<TokenClaims>(token, &self.decoding, &validation)
            .map_err(|_| TokenError::Invalid)?;
        let claims = data.claims;
        if claims.expires_at > 0 && claims.expires_at < Utc::now().timestamp() {
            return Err(TokenError::Invalid);
        }
        Ok(claims)
    }
}

fn generated_secret() -> String {
    let mut rng = rand::thread_rng();
    (0..GENERATED_SECRET_LEN)
        .map(|_| GENERATED_SECRET_ALPHABET[rng.gen_range(0..GENERATED_SECRET_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::Scope;

    fn codec() -> TokenCodec {
        TokenCodec::new(b"unit-test-secret", TokenLifetimes::default())
    }

    fn home_scope() -> ScopeSet {
        [Scope::YandexHome].into_iter().collect()
    }

    #[test]
    fn issue_then_parse_round_trips() {
        let codec = codec();
        let token = codec
            .issue(TokenKind::Access, Some("web"), Some("alice"), home_scope())
            .unwrap();
        let claims = codec.parse(&token).unwrap();
        assert_eq!(claims.kind, TokenKind::Access);
        assert_eq!(claims.client_id.as_deref(), Some("web"));
        assert_eq!(claims.user_name.as_deref(), Some("alice"));
        assert!(claims.scope.same(&home_scope()));
        assert!(claims.expires_at > Utc::now().timestamp());
    }

    #[test]
    fn optional_fields_stay_absent() {
        let codec = codec();
        let token = codec
            .issue(TokenKind::Access, None, None, ScopeSet::new())
            .unwrap();
        let claims = codec.parse(&token).unwrap();
        assert!(claims.client_id.is_none());
        assert!(claims.user_name.is_none());
        assert!(claims.scope.is_empty());
    }

    #[test]
    fn expired_token_is_rejected() {
        let lifetimes = TokenLifetimes {
            access: Duration::seconds(-10),
            ..TokenLifetimes::default()
        };
        let codec = TokenCodec::new(b"unit-test-secret", lifetimes);
        let token = codec
            .issue(TokenKind::Access, None, Some("alice"), home_scope())
            .unwrap();
        assert!(matches!(codec.parse(&token), Err(TokenError::Invalid)));
    }

    #[test]
    fn tampered_token_is_rejected() {
        let codec = codec();
        let token = codec
            .issue(TokenKind::Access, Some("web"), None, home_scope())
            .unwrap();
        let mut tampered = token.clone();
        tampered.pop();
        assert!(codec.parse(&tampered).is_err());
        assert!(codec.parse("not-a-token").is_err());
    }

    #[test]
    fn different_secret_is_rejected() {
        let token = codec()
            .issue(TokenKind::Refresh, Some("web"), None, home_scope())
            .unwrap();
        let other = TokenCodec::new(b"another-secret", TokenLifetimes::default());
        assert!(other.parse(&token).is_err());
    }

    #[test]
    fn lifetimes_from_config_apply_overrides() {
        let mut report = ConfigReport::new();
        let config = LifetimeConfig {
            code_token: Some("30s".to_string()),
            access_token: Some("2h".to_string()),
            refresh_token: None,
        };
        let lifetimes = TokenLifetimes::from_config(&config, &mut report);
        assert!(report.is_empty(), "got: {report}");
        assert_eq!(lifetimes.code, Duration::seconds(30));
        assert_eq!(lifetimes.access, Duration::hours(2));
        assert_eq!(lifetimes.refresh, Duration::days(90));
    }

    #[test]
    fn invalid_lifetime_strings_are_reported() {
        let mut report = ConfigReport::new();
        let config = LifetimeConfig {
            code_token: Some("soon".to_string()),
            access_token: Some("-5m".to_string()),
            refresh_token: None,
        };
        TokenLifetimes::from_config(&config, &mut report);
        assert_eq!(report.len(), 2, "got: {report}");
    }

    #[test]
    fn generated_secret_has_expected_shape() {
        let secret = generated_secret();
        assert_eq!(secret.len(), GENERATED_SECRET_LEN);
        assert!(secret.bytes().all(|b| GENERATED_SECRET_ALPHABET.contains(&b)));
        assert_ne!(secret, generated_secret());
    }
}
