// server/src/state.rs

use crate::config::{AppConfig, StorageBackend};
use crate::errors::{AppError, Result};
use orderdesk::hub::HubHandle;
use orderdesk::model::Role;
use orderdesk::store::{
  Catalog, CredentialStore, MemoryCatalog, MemoryCredentialStore, MemoryOrderStore, OrderStore, PgStore,
};
use orderdesk::{OrderEngine, TokenService, WebhookGateway};
use std::sync::Arc;
use tracing::info;

/// The storage ports the services are built on.
#[derive(Clone)]
pub struct Stores {
  pub orders: Arc<dyn OrderStore>,
  pub catalog: Arc<dyn Catalog>,
  pub credentials: Arc<dyn CredentialStore>,
}

impl Stores {
  pub fn memory() -> Self {
    Stores {
      orders: Arc::new(MemoryOrderStore::new()),
      catalog: Arc::new(MemoryCatalog::new()),
      credentials: Arc::new(MemoryCredentialStore::new()),
    }
  }

  pub fn postgres(store: PgStore) -> Self {
    let store = Arc::new(store);
    Stores {
      orders: store.clone(),
      catalog: store.clone(),
      credentials: store,
    }
  }

  /// Connects and migrates when the configured backend is PostgreSQL.
  pub async fn from_config(config: &AppConfig) -> Result<Self> {
    match config.storage {
      StorageBackend::Memory => {
        info!("using in-memory storage");
        Ok(Stores::memory())
      }
      StorageBackend::Postgres => {
        let url = config
          .database_url
          .as_deref()
          .ok_or_else(|| AppError::Config("DATABASE_URL is not set".to_string()))?;
        let store = PgStore::connect(url, config.database_max_connections).await?;
        store.migrate().await?;
        info!("connected to PostgreSQL, migrations applied");
        Ok(Stores::postgres(store))
      }
    }
  }
}

#[derive(Clone)]
pub struct AppState {
  pub engine: Arc<OrderEngine>,
  pub tokens: Arc<TokenService>,
  pub gateway: Arc<WebhookGateway>,
  pub hub: HubHandle,
  pub config: Arc<AppConfig>,
}

impl AppState {
  pub fn new(config: Arc<AppConfig>, stores: Stores, hub: HubHandle) -> Self {
    let engine = Arc::new(OrderEngine::new(stores.orders, stores.catalog, hub.clone()));
    let gateway = Arc::new(WebhookGateway::new(config.webhook_secret.as_bytes().to_vec(), engine.clone()));
    let tokens = Arc::new(TokenService::new(stores.credentials, config.token_config()));
    AppState {
      engine,
      tokens,
      gateway,
      hub,
      config,
    }
  }

  /// Creates the bootstrap admin when `SEED_DB` is on. Existing users are left alone.
  pub async fn seed(&self) -> Result<()> {
    if !self.config.seed_db {
      return Ok(());
    }
    let (Some(username), Some(password)) = (
      self.config.seed_admin_username.as_deref(),
      self.config.seed_admin_password.as_deref(),
    ) else {
      return Err(AppError::Config("seed admin credentials missing".to_string()));
    };
    let principal = self.tokens.seed_principal(username, password, Role::SuperAdmin).await?;
    info!(principal_id = %principal.id, %username, "bootstrap admin ready");
    Ok(())
  }
}
