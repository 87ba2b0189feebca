// core/src/auth/service.rs

use super::password::{hash_password_blocking, verify_password_blocking, MIN_PASSWORD_LEN};
use super::token::{hash_token, hashes_match, Claims, IssuedToken, TokenConfig, TokenKeys};
use crate::error::{AuthError, Error, Result};
use crate::model::{Principal, Role, TokenRecord};
use crate::store::CredentialStore;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Issues, validates and revokes bearer tokens.
///
/// A token is a capability hint: its signature and `exp` are checked first,
/// then the stored record decides. Revocation therefore takes effect on the
/// very next request.
pub struct TokenService {
  store: Arc<dyn CredentialStore>,
  config: TokenConfig,
  keys: TokenKeys,
}

impl TokenService {
  pub fn new(store: Arc<dyn CredentialStore>, config: TokenConfig) -> Self {
    let keys = TokenKeys::new(&config);
    TokenService { store, config, keys }
  }

  pub fn config(&self) -> &TokenConfig {
    &self.config
  }

  /// Verifies `username`/`password` and issues a token.
  ///
  /// Unknown user, inactive user and wrong password all fail with
  /// `InvalidCredentials`.
  #[instrument(name = "auth::authenticate", skip(self, password), err(Display))]
  pub async fn authenticate(&self, username: &str, password: &str) -> Result<IssuedToken> {
    let principal = match self.store.find_active_principal(username).await {
      Ok(Some(p)) => p,
      Ok(None) => {
        debug!("no active principal with this username");
        return Err(AuthError::InvalidCredentials.into());
      }
      Err(e) => {
        error!(error = %e, "principal lookup failed");
        return Err(AuthError::AuthenticationFailed.into());
      }
    };

    if !verify_password_blocking(principal.password_hash.clone(), password.to_string()).await? {
      debug!(principal_id = %principal.id, "password mismatch");
      return Err(AuthError::InvalidCredentials.into());
    }

    if let Err(e) = self.store.touch_last_login(principal.id, Utc::now()).await {
      warn!(principal_id = %principal.id, error = %e, "failed to record last login");
    }

    self.issue_token(&principal).await
  }

  /// Signs fresh claims for `principal` and stores the token's hash.
  #[instrument(name = "auth::issue_token", skip_all, fields(principal_id = %principal.id), err(Display))]
  pub async fn issue_token(&self, principal: &Principal) -> Result<IssuedToken> {
    let now = Utc::now();
    let expires_at = now + self.config.ttl;
    let token_id = Uuid::new_v4();

    let claims = Claims {
      sub: principal.id.to_string(),
      username: principal.username.clone(),
      role: principal.role,
      jti: token_id.to_string(),
      iss: self.config.issuer.clone(),
      exp: expires_at.timestamp(),
      iat: now.timestamp(),
      nbf: now.timestamp(),
    };

    let token = self.keys.sign(&claims).map_err(|e| {
      error!(error = %e, "token signing failed");
      Error::Auth(AuthError::AuthenticationFailed)
    })?;

    let record = TokenRecord {
      id: token_id,
      principal_id: principal.id,
      token_hash: hash_token(&token),
      expires_at,
      revoked: false,
      created_at: now,
    };
    self.store.insert_token(&record).await.map_err(|e| {
      error!(error = %e, "token record insert failed");
      Error::Auth(AuthError::AuthenticationFailed)
    })?;

    info!(%token_id, "token issued");
    Ok(IssuedToken {
      token,
      token_id,
      expires_at,
      principal_id: principal.id,
      username: principal.username.clone(),
      role: principal.role,
    })
  }

  /// Returns the token's claims if it is correctly signed, unexpired, and its
  /// stored record exists, matches, is unexpired and is not revoked.
  ///
  /// Every refusal is `InvalidOrExpiredToken`. Storage failures propagate as
  /// they are.
  #[instrument(name = "auth::validate_token", skip_all, err(Display))]
  pub async fn validate_token(&self, token: &str) -> Result<Claims> {
    let refused = || Error::Auth(AuthError::InvalidOrExpiredToken);

    let claims = self.keys.verify(token).map_err(|e| {
      debug!(reason = %e, "token failed cryptographic verification");
      refused()
    })?;

    let (Some(token_id), Some(principal_id)) = (claims.token_id(), claims.principal_id()) else {
      debug!("token carries malformed ids");
      return Err(refused());
    };

    let Some(record) = self.store.find_token(token_id).await? else {
      debug!(%token_id, "no stored record for token");
      return Err(refused());
    };

    if record.principal_id != principal_id {
      warn!(%token_id, "token record belongs to a different principal");
      return Err(refused());
    }
    if record.revoked {
      debug!(%token_id, "token revoked");
      return Err(refused());
    }
    if record.expires_at <= Utc::now() {
      debug!(%token_id, "token record expired");
      return Err(refused());
    }
    if !hashes_match(&record.token_hash, &hash_token(token)) {
      warn!(%token_id, "token hash mismatch");
      return Err(refused());
    }

    Ok(claims)
  }

  #[instrument(name = "auth::revoke_token", skip(self), err(Display))]
  pub async fn revoke_token(&self, token_id: Uuid) -> Result<()> {
    if self.store.revoke_token(token_id).await? {
      info!("token revoked");
    }
    Ok(())
  }

  #[instrument(name = "auth::revoke_all", skip(self), err(Display))]
  pub async fn revoke_all_for_principal(&self, principal_id: Uuid) -> Result<u64> {
    let count = self.store.revoke_all_for_principal(principal_id).await?;
    info!(count, "tokens revoked");
    Ok(count)
  }

  /// Deletes expired and revoked token records.
  #[instrument(name = "auth::purge_expired", skip(self), err(Display))]
  pub async fn purge_expired(&self) -> Result<u64> {
    let purged = self.store.purge_expired(Utc::now()).await?;
    if purged > 0 {
      info!(purged, "token records purged");
    }
    Ok(purged)
  }

  /// Replaces the principal's password and revokes every token it holds.
  /// Returns how many tokens were revoked.
  #[instrument(name = "auth::change_password", skip(self, current, new_password), err(Display))]
  pub async fn change_password(&self, principal_id: Uuid, current: &str, new_password: &str) -> Result<u64> {
    if new_password.chars().count() < MIN_PASSWORD_LEN {
      return Err(Error::validation(format!(
        "new password must be at least {} characters",
        MIN_PASSWORD_LEN
      )));
    }

    let principal = self
      .store
      .find_principal(principal_id)
      .await?
      .filter(|p| p.is_active)
      .ok_or(AuthError::InvalidCredentials)?;

    if !verify_password_blocking(principal.password_hash, current.to_string()).await? {
      return Err(AuthError::InvalidCredentials.into());
    }

    let new_hash = hash_password_blocking(new_password.to_string()).await?;
    self.store.update_password_hash(principal_id, &new_hash).await?;
    self.revoke_all_for_principal(principal_id).await
  }

  /// Creates the principal if its username is free. Used for bootstrap seeding.
  pub async fn seed_principal(&self, username: &str, password: &str, role: Role) -> Result<Principal> {
    let hash = hash_password_blocking(password.to_string()).await?;
    self.store.seed_principal(username, &hash, role).await
  }

  /// Runs `purge_expired` every `every` until the returned handle is aborted.
  pub fn spawn_purge_task(self: Arc<Self>, every: StdDuration) -> JoinHandle<()> {
    tokio::spawn(async move {
      let mut ticker = tokio::time::interval(every);
      ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
      loop {
        ticker.tick().await;
        if let Err(e) = self.purge_expired().await {
          warn!(error = %e, "token purge failed, retrying next tick");
        }
      }
    })
  }
}
