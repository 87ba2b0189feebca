// server/src/web/handlers/session_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

use super::ok;
use crate::errors::AppError;
use crate::state::AppState;
use crate::web::extractors::AuthenticatedPrincipal;

#[derive(Deserialize)]
pub struct LoginRequest {
  pub username: String,
  pub password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
  pub current_password: String,
  pub new_password: String,
}

#[instrument(name = "handler::login", skip_all, fields(username = %payload.username))]
pub async fn login_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<LoginRequest>,
) -> Result<HttpResponse, AppError> {
  let LoginRequest { username, password } = payload.into_inner();
  let issued = app_state.tokens.authenticate(&username, &password).await?;
  info!(principal_id = %issued.principal_id, "login succeeded");

  Ok(ok(json!({
    "token": issued.token,
    "tokenType": "Bearer",
    "expiresAt": issued.expires_at,
    "user": {
      "id": issued.principal_id,
      "username": issued.username,
      "role": issued.role,
    }
  })))
}

/// Revokes the token the request was made with.
#[instrument(name = "handler::logout", skip_all, fields(principal_id = %principal.principal_id))]
pub async fn logout_handler(
  app_state: web::Data<AppState>,
  principal: AuthenticatedPrincipal,
) -> Result<HttpResponse, AppError> {
  app_state.tokens.revoke_token(principal.token_id).await?;
  Ok(ok(json!({ "revoked": true })))
}

/// Changes the caller's password and ends all of their sessions, this one included.
#[instrument(name = "handler::change_password", skip_all, fields(principal_id = %principal.principal_id))]
pub async fn change_password_handler(
  app_state: web::Data<AppState>,
  principal: AuthenticatedPrincipal,
  payload: web::Json<ChangePasswordRequest>,
) -> Result<HttpResponse, AppError> {
  let revoked = app_state
    .tokens
    .change_password(principal.principal_id, &payload.current_password, &payload.new_password)
    .await?;
  Ok(ok(json!({ "revokedTokens": revoked })))
}
