// server/src/config.rs

use crate::errors::{AppError, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;

pub const DEFAULT_SIGNATURE_HEADER: &str = "X-Webhook-Signature";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
  Postgres,
  /// In-process stores. Nothing survives a restart.
  Memory,
}

impl FromStr for StorageBackend {
  type Err = AppError;

  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
      "memory" => Ok(StorageBackend::Memory),
      other => Err(AppError::Config(format!("Invalid STORAGE value: '{}'", other))),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
  Pretty,
  Json,
}

#[derive(Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,
  pub storage: StorageBackend,
  pub database_url: Option<String>,
  pub database_max_connections: u32,

  pub jwt_secret: String,
  pub jwt_issuer: String,
  pub token_ttl_hours: i64,
  pub token_purge_interval_secs: u64,

  pub webhook_secret: String,
  pub webhook_signature_header: String,

  pub live_client_buffer: usize,
  /// Seconds between `dashboard_update` broadcasts; 0 disables them.
  pub dashboard_interval_secs: u64,

  // Optional bootstrap admin, created on startup if absent.
  pub seed_db: bool,
  pub seed_admin_username: Option<String>,
  pub seed_admin_password: Option<String>,

  pub log_format: LogFormat,
}

impl AppConfig {
  /// Loads `.env` if present, then reads the process environment.
  pub fn from_env() -> Result<Self> {
    dotenv().ok();
    Self::from_lookup(|key| env::var(key).ok())
  }

  /// Builds the config from any key lookup. Empty values count as unset.
  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
    let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    let required = |key: &str| get(key).ok_or_else(|| AppError::Config(format!("Missing environment variable '{}'", key)));

    let server_host = get("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
    let server_port = parse_or("SERVER_PORT", get("SERVER_PORT"), 8080u16)?;

    let storage = match get("STORAGE") {
      Some(s) => s.parse::<StorageBackend>()?,
      None => StorageBackend::Postgres,
    };
    let database_url = get("DATABASE_URL");
    if storage == StorageBackend::Postgres && database_url.is_none() {
      return Err(AppError::Config(
        "Missing environment variable 'DATABASE_URL' (required when STORAGE=postgres)".to_string(),
      ));
    }
    let database_max_connections = parse_or("DATABASE_MAX_CONNECTIONS", get("DATABASE_MAX_CONNECTIONS"), 10u32)?;

    let jwt_secret = required("JWT_SECRET")?;
    let jwt_issuer = get("JWT_ISSUER").unwrap_or_else(|| orderdesk::auth::token::DEFAULT_ISSUER.to_string());
    let token_ttl_hours = parse_or("TOKEN_TTL_HOURS", get("TOKEN_TTL_HOURS"), 24i64)?;
    if token_ttl_hours <= 0 {
      return Err(AppError::Config("TOKEN_TTL_HOURS must be positive".to_string()));
    }
    let token_purge_interval_secs = parse_or("TOKEN_PURGE_INTERVAL_SECS", get("TOKEN_PURGE_INTERVAL_SECS"), 3600u64)?.max(1);

    let webhook_secret = required("WEBHOOK_SECRET")?;
    let webhook_signature_header =
      get("WEBHOOK_SIGNATURE_HEADER").unwrap_or_else(|| DEFAULT_SIGNATURE_HEADER.to_string());

    let live_client_buffer = parse_or(
      "LIVE_CLIENT_BUFFER",
      get("LIVE_CLIENT_BUFFER"),
      orderdesk::hub::DEFAULT_CLIENT_BUFFER,
    )?
    .max(1);
    let dashboard_interval_secs = parse_or("DASHBOARD_INTERVAL_SECS", get("DASHBOARD_INTERVAL_SECS"), 30u64)?;

    let seed_db = parse_or("SEED_DB", get("SEED_DB"), false)?;
    let seed_admin_username = get("SEED_ADMIN_USERNAME");
    let seed_admin_password = get("SEED_ADMIN_PASSWORD");
    if seed_db && (seed_admin_username.is_none() || seed_admin_password.is_none()) {
      return Err(AppError::Config(
        "SEED_DB=true requires SEED_ADMIN_USERNAME and SEED_ADMIN_PASSWORD".to_string(),
      ));
    }

    let log_format = match get("LOG_FORMAT").as_deref().map(str::to_ascii_lowercase).as_deref() {
      Some("json") => LogFormat::Json,
      _ => LogFormat::Pretty,
    };

    Ok(Self {
      server_host,
      server_port,
      storage,
      database_url,
      database_max_connections,
      jwt_secret,
      jwt_issuer,
      token_ttl_hours,
      token_purge_interval_secs,
      webhook_secret,
      webhook_signature_header,
      live_client_buffer,
      dashboard_interval_secs,
      seed_db,
      seed_admin_username,
      seed_admin_password,
      log_format,
    })
  }

  pub fn bind_address(&self) -> String {
    format!("{}:{}", self.server_host, self.server_port)
  }

  pub fn token_config(&self) -> orderdesk::TokenConfig {
    orderdesk::TokenConfig::new(self.jwt_secret.clone())
      .with_issuer(self.jwt_issuer.clone())
      .with_ttl(chrono::Duration::hours(self.token_ttl_hours))
  }
}

fn parse_or<T: FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T>
where
  T::Err: std::fmt::Display,
{
  match raw {
    Some(v) => v
      .parse::<T>()
      .map_err(|e| AppError::Config(format!("Invalid {} value '{}': {}", key, v, e))),
    None => Ok(default),
  }
}

// Secrets never reach the logs.
impl std::fmt::Debug for AppConfig {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("AppConfig")
      .field("server_host", &self.server_host)
      .field("server_port", &self.server_port)
      .field("storage", &self.storage)
      .field("database_url", &self.database_url.as_ref().map(|_| "<redacted>"))
      .field("database_max_connections", &self.database_max_connections)
      .field("jwt_secret", &"<redacted>")
      .field("jwt_issuer", &self.jwt_issuer)
      .field("token_ttl_hours", &self.token_ttl_hours)
      .field("token_purge_interval_secs", &self.token_purge_interval_secs)
      .field("webhook_secret", &"<redacted>")
      .field("webhook_signature_header", &self.webhook_signature_header)
      .field("live_client_buffer", &self.live_client_buffer)
      .field("dashboard_interval_secs", &self.dashboard_interval_secs)
      .field("seed_db", &self.seed_db)
      .field("seed_admin_username", &self.seed_admin_username)
      .field("log_format", &self.log_format)
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;

  fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    move |key| map.get(key).cloned()
  }

  #[test]
  fn memory_storage_needs_only_secrets() {
    let config = AppConfig::from_lookup(lookup(&[
      ("STORAGE", "memory"),
      ("JWT_SECRET", "jwt"),
      ("WEBHOOK_SECRET", "hook"),
    ]))
    .unwrap();
    assert_eq!(config.storage, StorageBackend::Memory);
    assert_eq!(config.bind_address(), "127.0.0.1:8080");
    assert_eq!(config.webhook_signature_header, DEFAULT_SIGNATURE_HEADER);
    assert_eq!(config.token_ttl_hours, 24);
    assert_eq!(config.log_format, LogFormat::Pretty);
    assert_eq!(config.dashboard_interval_secs, 30);
  }

  #[test]
  fn missing_secrets_are_config_errors() {
    for pairs in [
      vec![("STORAGE", "memory"), ("WEBHOOK_SECRET", "hook")],
      vec![("STORAGE", "memory"), ("JWT_SECRET", "jwt"), ("WEBHOOK_SECRET", "  ")],
      vec![("JWT_SECRET", "jwt"), ("WEBHOOK_SECRET", "hook")],
    ] {
      assert!(matches!(AppConfig::from_lookup(lookup(&pairs)), Err(AppError::Config(_))));
    }
  }

  #[test]
  fn rejects_bad_numbers() {
    let err = AppConfig::from_lookup(lookup(&[
      ("STORAGE", "memory"),
      ("JWT_SECRET", "jwt"),
      ("WEBHOOK_SECRET", "hook"),
      ("SERVER_PORT", "eighty"),
    ]))
    .unwrap_err();
    assert!(err.to_string().contains("SERVER_PORT"));
  }

  #[test]
  fn debug_output_hides_secrets() {
    let config = AppConfig::from_lookup(lookup(&[
      ("DATABASE_URL", "postgres://user:pw@db/orders"),
      ("JWT_SECRET", "super-secret-jwt"),
      ("WEBHOOK_SECRET", "super-secret-hook"),
      ("LOG_FORMAT", "JSON"),
    ]))
    .unwrap();
    let rendered = format!("{:?}", config);
    assert!(!rendered.contains("super-secret"));
    assert!(!rendered.contains("pw@db"));
    assert_eq!(config.log_format, LogFormat::Json);
  }
}
