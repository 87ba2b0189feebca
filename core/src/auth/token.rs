// core/src/auth/token.rs

use crate::model::Role;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use uuid::Uuid;

pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;
pub const DEFAULT_ISSUER: &str = "orderdesk";

/// Signed session claims. The server-side token record, not these claims,
/// decides whether a token is still good.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
  /// Principal id.
  pub sub: String,
  pub username: String,
  pub role: Role,
  /// Token record id.
  pub jti: String,
  pub iss: String,
  pub exp: i64,
  pub iat: i64,
  pub nbf: i64,
}

impl Claims {
  pub fn principal_id(&self) -> Option<Uuid> {
    Uuid::parse_str(&self.sub).ok()
  }

  pub fn token_id(&self) -> Option<Uuid> {
    Uuid::parse_str(&self.jti).ok()
  }
}

#[derive(Clone)]
pub struct TokenConfig {
  pub secret: String,
  pub issuer: String,
  pub ttl: Duration,
}

impl TokenConfig {
  pub fn new(secret: impl Into<String>) -> Self {
    TokenConfig {
      secret: secret.into(),
      issuer: DEFAULT_ISSUER.to_string(),
      ttl: Duration::hours(DEFAULT_TOKEN_TTL_HOURS),
    }
  }

  pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
    self.issuer = issuer.into();
    self
  }

  pub fn with_ttl(mut self, ttl: Duration) -> Self {
    self.ttl = ttl;
    self
  }
}

impl std::fmt::Debug for TokenConfig {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("TokenConfig")
      .field("secret", &"<redacted>")
      .field("issuer", &self.issuer)
      .field("ttl", &self.ttl)
      .finish()
  }
}

/// HS256 signing and verification keys built once from a `TokenConfig`.
pub(crate) struct TokenKeys {
  encoding: EncodingKey,
  decoding: DecodingKey,
  validation: Validation,
}

impl TokenKeys {
  pub(crate) fn new(config: &TokenConfig) -> Self {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.set_issuer(&[config.issuer.as_str()]);
    validation.set_required_spec_claims(&["exp", "nbf", "sub", "iss"]);

    TokenKeys {
      encoding: EncodingKey::from_secret(config.secret.as_bytes()),
      decoding: DecodingKey::from_secret(config.secret.as_bytes()),
      validation,
    }
  }

  pub(crate) fn sign(&self, claims: &Claims) -> jsonwebtoken::errors::Result<String> {
    jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
  }

  /// Signature, algorithm, issuer, `exp` and `nbf` checks only.
  pub(crate) fn verify(&self, token: &str) -> jsonwebtoken::errors::Result<Claims> {
    jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation).map(|data| data.claims)
  }
}

/// Hex SHA-256 of the signed token, the only form the server stores.
pub fn hash_token(token: &str) -> String {
  hex::encode(Sha256::digest(token.as_bytes()))
}

pub(crate) fn hashes_match(stored: &str, presented: &str) -> bool {
  stored.as_bytes().ct_eq(presented.as_bytes()).into()
}

/// A freshly issued token. `token` is shown to the client once.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
  pub token: String,
  pub token_id: Uuid,
  pub expires_at: DateTime<Utc>,
  pub principal_id: Uuid,
  pub username: String,
  pub role: Role,
}
