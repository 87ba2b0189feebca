// core/src/error.rs
use thiserror::Error;

/// Failures raised by the step engine itself rather than by a handler.
#[derive(Debug, Error)]
pub enum PipelineError {
  #[error("Handler missing for non-optional step: {step_name}")]
  HandlerMissing { step_name: String },

  #[error("Internal pipeline error: {0}")]
  Internal(String),
}

/// Token service failures. Callers outside `auth` only ever see these four;
/// the specific reason a token was refused is logged, never returned.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
  #[error("Invalid credentials")]
  InvalidCredentials,

  #[error("Authentication failed")]
  AuthenticationFailed,

  #[error("Invalid or expired token")]
  InvalidOrExpiredToken,

  #[error("Insufficient permissions")]
  Forbidden,
}

#[derive(Debug, Error)]
pub enum Error {
  /// Malformed input, rejected before any write.
  #[error("Validation error: {0}")]
  Validation(String),

  #[error(transparent)]
  Auth(#[from] AuthError),

  /// Illegal state transition or duplicate unique value.
  #[error("Conflict: {0}")]
  Conflict(String),

  #[error("Not found: {0}")]
  NotFound(String),

  /// A transaction could not be completed and was rolled back. The detail is
  /// for operators only.
  #[error("Integrity error: {0}")]
  Integrity(String),

  #[error("Invalid webhook signature")]
  UpstreamSignature,

  /// A webhook parsed fine but names no order we know.
  #[error("Unresolved order reference: {0}")]
  Resolution(String),

  #[error("Storage error: {0}")]
  Storage(#[source] sqlx::Error),

  #[error(transparent)]
  Pipeline(#[from] PipelineError),
}

impl Error {
  pub fn validation(msg: impl Into<String>) -> Self {
    Error::Validation(msg.into())
  }

  pub fn not_found(msg: impl Into<String>) -> Self {
    Error::NotFound(msg.into())
  }

  /// True for errors the caller can fix by changing the request.
  pub fn is_client_error(&self) -> bool {
    matches!(
      self,
      Error::Validation(_)
        | Error::Auth(_)
        | Error::Conflict(_)
        | Error::NotFound(_)
        | Error::UpstreamSignature
        | Error::Resolution(_)
    )
  }

  /// Stable machine-readable tag used in API error bodies.
  pub fn kind(&self) -> &'static str {
    match self {
      Error::Validation(_) => "validation",
      Error::Auth(AuthError::Forbidden) => "authorization",
      Error::Auth(_) => "authentication",
      Error::Conflict(_) => "conflict",
      Error::NotFound(_) => "not_found",
      Error::Integrity(_) => "integrity",
      Error::UpstreamSignature => "invalid_signature",
      Error::Resolution(_) => "resolution",
      Error::Storage(_) | Error::Pipeline(_) => "internal",
    }
  }
}

impl From<sqlx::Error> for Error {
  fn from(err: sqlx::Error) -> Self {
    match &err {
      sqlx::Error::RowNotFound => Error::NotFound("record".to_string()),
      sqlx::Error::Database(db) if db.is_unique_violation() => {
        Error::Conflict(format!("duplicate value ({})", db.constraint().unwrap_or("unique constraint")))
      }
      _ => Error::Storage(err),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
