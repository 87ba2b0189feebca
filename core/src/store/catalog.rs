// core/src/store/catalog.rs

use crate::error::Result;
use crate::model::Money;
use async_trait::async_trait;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// What the order engine needs to know about a product.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CatalogProduct {
  pub id: Uuid,
  pub name: String,
  pub price: Money,
  pub is_active: bool,
}

/// Read-only view of the product catalog. Catalog management lives elsewhere.
#[async_trait]
pub trait Catalog: Send + Sync {
  async fn lookup_product(&self, id: Uuid) -> Result<Option<CatalogProduct>>;
}
