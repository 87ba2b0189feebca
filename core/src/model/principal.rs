// core/src/model/principal.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type as SqlxType};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "admin_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
  SuperAdmin,
  Admin,
  Viewer,
}

impl Role {
  pub fn as_str(&self) -> &'static str {
    match self {
      Role::SuperAdmin => "super_admin",
      Role::Admin => "admin",
      Role::Viewer => "viewer",
    }
  }

  /// Viewers may read orders and watch the live feed, nothing else.
  pub fn can_mutate_orders(&self) -> bool {
    matches!(self, Role::SuperAdmin | Role::Admin)
  }
}

/// An administrative user able to hold tokens.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Principal {
  pub id: Uuid,
  pub username: String,
  #[serde(skip_serializing)]
  pub password_hash: String,
  pub role: Role,
  pub is_active: bool,
  pub last_login_at: Option<DateTime<Utc>>,
  pub created_at: DateTime<Utc>,
}

/// Server-side record backing an issued token. Only the SHA-256 of the
/// signed token is kept.
#[derive(Debug, Clone, FromRow)]
pub struct TokenRecord {
  pub id: Uuid,
  pub principal_id: Uuid,
  pub token_hash: String,
  pub expires_at: DateTime<Utc>,
  pub revoked: bool,
  pub created_at: DateTime<Utc>,
}
