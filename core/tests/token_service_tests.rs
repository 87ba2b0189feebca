// tests/token_service_tests.rs
mod common;

use common::*;
use orderdesk::model::Role;
use orderdesk::{AuthError, Error};
use serial_test::serial;

fn is_auth(err: &Error, expected: AuthError) -> bool {
  matches!(err, Error::Auth(e) if *e == expected)
}

#[tokio::test]
#[serial]
async fn authenticate_then_validate() {
  let system = build_system();
  let admin = seed_admin(&system).await;

  let issued = system.tokens.authenticate(ADMIN_USERNAME, ADMIN_PASSWORD).await.unwrap();
  assert_eq!(issued.principal_id, admin.id);
  assert_eq!(issued.role, Role::Admin);
  assert!(issued.expires_at > chrono::Utc::now());

  let claims = system.tokens.validate_token(&issued.token).await.unwrap();
  assert_eq!(claims.principal_id(), Some(admin.id));
  assert_eq!(claims.token_id(), Some(issued.token_id));
  assert_eq!(claims.username, ADMIN_USERNAME);
  assert_eq!(system.credentials.token_count(), 1);
}

#[tokio::test]
#[serial]
async fn bad_credentials_fail_uniformly() {
  let system = build_system();
  let admin = seed_admin(&system).await;

  let wrong_password = system.tokens.authenticate(ADMIN_USERNAME, "not-the-password").await.unwrap_err();
  let unknown_user = system.tokens.authenticate("nobody", ADMIN_PASSWORD).await.unwrap_err();
  system.credentials.set_active(admin.id, false);
  let inactive = system.tokens.authenticate(ADMIN_USERNAME, ADMIN_PASSWORD).await.unwrap_err();

  for err in [&wrong_password, &unknown_user, &inactive] {
    assert!(is_auth(err, AuthError::InvalidCredentials), "got {:?}", err);
    assert_eq!(err.to_string(), "Invalid credentials");
  }
  assert_eq!(system.credentials.token_count(), 0);
}

#[tokio::test]
#[serial]
async fn garbage_and_foreign_tokens_are_refused() {
  let system = build_system();
  seed_admin(&system).await;
  let issued = system.tokens.authenticate(ADMIN_USERNAME, ADMIN_PASSWORD).await.unwrap();

  let other = build_system_with(orderdesk::TokenConfig::new("a-completely-different-secret-value"));
  seed_admin(&other).await;
  let foreign = other.tokens.authenticate(ADMIN_USERNAME, ADMIN_PASSWORD).await.unwrap();

  let (unsigned, signature) = issued.token.rsplit_once('.').unwrap();
  let flipped = if signature.starts_with('A') { 'Q' } else { 'A' };
  let tampered = format!("{}.{}{}", unsigned, flipped, &signature[1..]);

  for token in ["", "not.a.jwt", tampered.as_str(), foreign.token.as_str()] {
    let err = system.tokens.validate_token(token).await.unwrap_err();
    assert!(is_auth(&err, AuthError::InvalidOrExpiredToken), "token {:?} gave {:?}", token, err);
  }
}

#[tokio::test]
#[serial]
async fn revocation_takes_effect_immediately() {
  let system = build_system();
  seed_admin(&system).await;
  let issued = system.tokens.authenticate(ADMIN_USERNAME, ADMIN_PASSWORD).await.unwrap();
  assert!(system.tokens.validate_token(&issued.token).await.is_ok());

  system.tokens.revoke_token(issued.token_id).await.unwrap();
  let err = system.tokens.validate_token(&issued.token).await.unwrap_err();
  assert!(is_auth(&err, AuthError::InvalidOrExpiredToken));

  // Revoking twice is harmless.
  system.tokens.revoke_token(issued.token_id).await.unwrap();
}

#[tokio::test]
#[serial]
async fn revoke_all_ends_every_session() {
  let system = build_system();
  let admin = seed_admin(&system).await;
  let first = system.tokens.authenticate(ADMIN_USERNAME, ADMIN_PASSWORD).await.unwrap();
  let second = system.tokens.authenticate(ADMIN_USERNAME, ADMIN_PASSWORD).await.unwrap();

  assert_eq!(system.tokens.revoke_all_for_principal(admin.id).await.unwrap(), 2);
  for token in [&first.token, &second.token] {
    assert!(system.tokens.validate_token(token).await.is_err());
  }
}

#[tokio::test]
#[serial]
async fn expired_tokens_are_refused_and_purged() {
  let system = build_system_with(short_lived(-30));
  seed_admin(&system).await;
  let issued = system.tokens.authenticate(ADMIN_USERNAME, ADMIN_PASSWORD).await.unwrap();

  let err = system.tokens.validate_token(&issued.token).await.unwrap_err();
  assert!(is_auth(&err, AuthError::InvalidOrExpiredToken));

  assert_eq!(system.credentials.token_count(), 1);
  assert_eq!(system.tokens.purge_expired().await.unwrap(), 1);
  assert_eq!(system.credentials.token_count(), 0);
}

#[tokio::test]
#[serial]
async fn purge_keeps_live_tokens() {
  let system = build_system();
  seed_admin(&system).await;
  let live = system.tokens.authenticate(ADMIN_USERNAME, ADMIN_PASSWORD).await.unwrap();
  let revoked = system.tokens.authenticate(ADMIN_USERNAME, ADMIN_PASSWORD).await.unwrap();
  system.tokens.revoke_token(revoked.token_id).await.unwrap();

  assert_eq!(system.tokens.purge_expired().await.unwrap(), 1);
  assert!(system.tokens.validate_token(&live.token).await.is_ok());
}

#[tokio::test]
#[serial]
async fn change_password_revokes_existing_tokens() {
  let system = build_system();
  let admin = seed_admin(&system).await;
  let before = system.tokens.authenticate(ADMIN_USERNAME, ADMIN_PASSWORD).await.unwrap();

  let too_short = system.tokens.change_password(admin.id, ADMIN_PASSWORD, "short").await.unwrap_err();
  assert!(matches!(too_short, Error::Validation(_)));

  let wrong_current = system
    .tokens
    .change_password(admin.id, "wrong-current-password", "brand-new-password")
    .await
    .unwrap_err();
  assert!(is_auth(&wrong_current, AuthError::InvalidCredentials));
  assert!(system.tokens.validate_token(&before.token).await.is_ok());

  let revoked = system
    .tokens
    .change_password(admin.id, ADMIN_PASSWORD, "brand-new-password")
    .await
    .unwrap();
  assert_eq!(revoked, 1);
  assert!(system.tokens.validate_token(&before.token).await.is_err());

  assert!(system.tokens.authenticate(ADMIN_USERNAME, ADMIN_PASSWORD).await.is_err());
  let after = system.tokens.authenticate(ADMIN_USERNAME, "brand-new-password").await.unwrap();
  assert!(system.tokens.validate_token(&after.token).await.is_ok());
}

#[tokio::test]
#[serial]
async fn seeding_is_idempotent() {
  let system = build_system();
  let first = seed_admin(&system).await;
  let again = system
    .tokens
    .seed_principal(ADMIN_USERNAME, "some-other-password", Role::Viewer)
    .await
    .unwrap();
  assert_eq!(first.id, again.id);
  assert_eq!(again.role, Role::Admin);
  assert!(system.tokens.authenticate(ADMIN_USERNAME, ADMIN_PASSWORD).await.is_ok());
}
