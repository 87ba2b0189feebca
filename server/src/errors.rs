// server/src/errors.rs

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use orderdesk::{AuthError, Error as CoreError};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
  #[error(transparent)]
  Core(#[from] CoreError),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Internal Server Error: {0}")]
  Internal(String),
}

impl From<AuthError> for AppError {
  fn from(err: AuthError) -> Self {
    AppError::Core(CoreError::Auth(err))
  }
}

impl AppError {
  pub fn validation(msg: impl Into<String>) -> Self {
    AppError::Core(CoreError::validation(msg))
  }

  pub fn kind(&self) -> &'static str {
    match self {
      AppError::Core(e) => e.kind(),
      AppError::Config(_) | AppError::Internal(_) => "internal",
    }
  }

  /// What the caller gets to read. Server-side failures stay opaque; their
  /// cause is logged instead.
  fn public_message(&self) -> String {
    match self {
      AppError::Core(e) if e.is_client_error() => e.to_string(),
      _ => "An internal error occurred".to_string(),
    }
  }
}

impl ResponseError for AppError {
  fn status_code(&self) -> StatusCode {
    match self {
      AppError::Core(e) => match e {
        CoreError::Validation(_) => StatusCode::BAD_REQUEST,
        CoreError::Auth(AuthError::Forbidden) => StatusCode::FORBIDDEN,
        CoreError::Auth(_) | CoreError::UpstreamSignature => StatusCode::UNAUTHORIZED,
        CoreError::Conflict(_) => StatusCode::CONFLICT,
        CoreError::NotFound(_) => StatusCode::NOT_FOUND,
        CoreError::Resolution(_) => StatusCode::UNPROCESSABLE_ENTITY,
        CoreError::Integrity(_) | CoreError::Storage(_) | CoreError::Pipeline(_) => {
          StatusCode::INTERNAL_SERVER_ERROR
        }
      },
      AppError::Config(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn error_response(&self) -> HttpResponse {
    let status = self.status_code();
    if status.is_server_error() {
      tracing::error!(application_error = %self, "Responding with error");
    } else {
      tracing::debug!(application_error = %self, "Responding with client error");
    }
    HttpResponse::build(status).json(json!({
      "success": false,
      "error": {
        "kind": self.kind(),
        "message": self.public_message(),
      }
    }))
  }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn storage_details_stay_private() {
    let err = AppError::Core(CoreError::Integrity("deadlock on orders_pkey".into()));
    assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(err.kind(), "integrity");
    assert!(!err.public_message().contains("orders_pkey"));
  }

  #[test]
  fn auth_failures_map_to_401_and_403() {
    assert_eq!(
      AppError::from(AuthError::InvalidOrExpiredToken).status_code(),
      StatusCode::UNAUTHORIZED
    );
    assert_eq!(AppError::from(AuthError::Forbidden).status_code(), StatusCode::FORBIDDEN);
    assert_eq!(AppError::from(AuthError::Forbidden).kind(), "authorization");
  }
}
