// server/src/web/extractors.rs

use crate::errors::AppError;
use crate::state::AppState;
use actix_web::dev::Payload;
use actix_web::http::header::AUTHORIZATION;
use actix_web::{web, FromRequest, HttpRequest};
use futures_util::future::LocalBoxFuture;
use orderdesk::model::Role;
use orderdesk::{AuthError, Claims};
use serde::Deserialize;
use uuid::Uuid;

/// The caller behind a validated bearer token.
#[derive(Debug, Clone)]
pub struct AuthenticatedPrincipal {
  pub principal_id: Uuid,
  pub token_id: Uuid,
  pub username: String,
  pub role: Role,
}

impl AuthenticatedPrincipal {
  fn from_claims(claims: Claims) -> Result<Self, AppError> {
    let (Some(principal_id), Some(token_id)) = (claims.principal_id(), claims.token_id()) else {
      return Err(AuthError::InvalidOrExpiredToken.into());
    };
    Ok(AuthenticatedPrincipal {
      principal_id,
      token_id,
      username: claims.username,
      role: claims.role,
    })
  }

  pub fn require_order_mutation(&self) -> Result<(), AppError> {
    if self.role.can_mutate_orders() {
      Ok(())
    } else {
      Err(AuthError::Forbidden.into())
    }
  }

  /// Validates `token` against the token service.
  pub async fn authenticate(state: &AppState, token: Option<String>) -> Result<Self, AppError> {
    let token = token.ok_or(AuthError::InvalidOrExpiredToken)?;
    let claims = state.tokens.validate_token(&token).await?;
    Self::from_claims(claims)
  }
}

impl FromRequest for AuthenticatedPrincipal {
  type Error = AppError;
  type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
    let state = req.app_data::<web::Data<AppState>>().cloned();
    let token = bearer_token(req);
    Box::pin(async move {
      let state = state.ok_or_else(|| AppError::Internal("application state not configured".to_string()))?;
      AuthenticatedPrincipal::authenticate(&state, token).await
    })
  }
}

/// `Authorization: Bearer <token>`, scheme matched case-insensitively.
pub fn bearer_token(req: &HttpRequest) -> Option<String> {
  let value = req.headers().get(AUTHORIZATION)?.to_str().ok()?;
  let (scheme, token) = value.trim().split_once(' ')?;
  if !scheme.eq_ignore_ascii_case("bearer") {
    return None;
  }
  let token = token.trim();
  (!token.is_empty()).then(|| token.to_string())
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
  token: Option<String>,
}

/// Browsers cannot set headers on a WebSocket upgrade, so the live endpoint
/// also accepts `?token=`.
pub fn bearer_or_query_token(req: &HttpRequest) -> Option<String> {
  bearer_token(req).or_else(|| {
    web::Query::<TokenQuery>::from_query(req.query_string())
      .ok()
      .and_then(|q| q.into_inner().token)
      .filter(|t| !t.trim().is_empty())
  })
}
