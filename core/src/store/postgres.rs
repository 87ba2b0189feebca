// core/src/store/postgres.rs

//! PostgreSQL adapter. Order rows are serialized per order with
//! `SELECT ... FOR UPDATE` inside the caller's transaction.

use super::{Catalog, CatalogProduct, CredentialStore, OrderStore, OrderTx, PaymentChange, UnresolvedWebhook};
use crate::error::{Error, Result};
use crate::model::{
  Money, Order, OrderAnalytics, OrderItem, OrderStatus, OrderStatusHistory, OrderWithItems, Page, Principal, Role, TokenRecord,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use tracing::{info, instrument};
use uuid::Uuid;

const ORDER_COLUMNS: &str = "id, order_number, customer_name, customer_email, customer_phone, customer_address, \
  notes, subtotal, discount_amount, handling_fee, total_amount, status, payment_status, payment_method, \
  payment_token, payment_url, paid_at, payment_updated_at, created_at, updated_at, completed_at, cancelled_at";

const ITEM_COLUMNS: &str = "id, order_id, product_id, item_name, item_description, quantity, unit_price, \
  total_price, brief_details, delivery_date, revision_count, max_revisions, created_at";

const PRINCIPAL_COLUMNS: &str = "id, username, password_hash, role, is_active, last_login_at, created_at";

const TOKEN_COLUMNS: &str = "id, principal_id, token_hash, expires_at, revoked, created_at";

#[derive(Debug, Clone)]
pub struct PgStore {
  pool: PgPool,
}

impl PgStore {
  pub fn new(pool: PgPool) -> Self {
    PgStore { pool }
  }

  pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
    let pool = PgPoolOptions::new()
      .max_connections(max_connections)
      .connect(database_url)
      .await?;
    Ok(PgStore { pool })
  }

  pub fn pool(&self) -> &PgPool {
    &self.pool
  }

  /// Applies the embedded migrations in `core/migrations`.
  pub async fn migrate(&self) -> Result<()> {
    sqlx::migrate!("./migrations")
      .run(&self.pool)
      .await
      .map_err(|e| Error::Integrity(format!("migration failed: {}", e)))?;
    info!("database migrations applied");
    Ok(())
  }
}

#[async_trait]
impl CredentialStore for PgStore {
  async fn find_active_principal(&self, username: &str) -> Result<Option<Principal>> {
    let sql = format!("SELECT {} FROM admin_users WHERE username = $1 AND is_active = TRUE", PRINCIPAL_COLUMNS);
    Ok(
      sqlx::query_as::<_, Principal>(&sql)
        .bind(username)
        .fetch_optional(&self.pool)
        .await?,
    )
  }

  async fn find_principal(&self, id: Uuid) -> Result<Option<Principal>> {
    let sql = format!("SELECT {} FROM admin_users WHERE id = $1", PRINCIPAL_COLUMNS);
    Ok(sqlx::query_as::<_, Principal>(&sql).bind(id).fetch_optional(&self.pool).await?)
  }

  async fn insert_token(&self, record: &TokenRecord) -> Result<()> {
    sqlx::query(
      "INSERT INTO admin_tokens (id, principal_id, token_hash, expires_at, revoked, created_at) \
       VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(record.id)
    .bind(record.principal_id)
    .bind(&record.token_hash)
    .bind(record.expires_at)
    .bind(record.revoked)
    .bind(record.created_at)
    .execute(&self.pool)
    .await?;
    Ok(())
  }

  async fn find_token(&self, id: Uuid) -> Result<Option<TokenRecord>> {
    let sql = format!("SELECT {} FROM admin_tokens WHERE id = $1", TOKEN_COLUMNS);
    Ok(sqlx::query_as::<_, TokenRecord>(&sql).bind(id).fetch_optional(&self.pool).await?)
  }

  async fn revoke_token(&self, id: Uuid) -> Result<bool> {
    let result = sqlx::query("UPDATE admin_tokens SET revoked = TRUE WHERE id = $1")
      .bind(id)
      .execute(&self.pool)
      .await?;
    Ok(result.rows_affected() > 0)
  }

  async fn revoke_all_for_principal(&self, principal_id: Uuid) -> Result<u64> {
    let result = sqlx::query("UPDATE admin_tokens SET revoked = TRUE WHERE principal_id = $1 AND revoked = FALSE")
      .bind(principal_id)
      .execute(&self.pool)
      .await?;
    Ok(result.rows_affected())
  }

  #[instrument(skip(self), err(Display))]
  async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
    let result = sqlx::query("DELETE FROM admin_tokens WHERE expires_at <= $1 OR revoked = TRUE")
      .bind(now)
      .execute(&self.pool)
      .await?;
    Ok(result.rows_affected())
  }

  async fn update_password_hash(&self, principal_id: Uuid, password_hash: &str) -> Result<()> {
    let result = sqlx::query("UPDATE admin_users SET password_hash = $2 WHERE id = $1")
      .bind(principal_id)
      .bind(password_hash)
      .execute(&self.pool)
      .await?;
    if result.rows_affected() == 0 {
      return Err(Error::not_found(format!("principal {}", principal_id)));
    }
    Ok(())
  }

  async fn touch_last_login(&self, principal_id: Uuid, at: DateTime<Utc>) -> Result<()> {
    sqlx::query("UPDATE admin_users SET last_login_at = $2 WHERE id = $1")
      .bind(principal_id)
      .bind(at)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  async fn seed_principal(&self, username: &str, password_hash: &str, role: Role) -> Result<Principal> {
    sqlx::query(
      "INSERT INTO admin_users (id, username, password_hash, role, is_active, created_at) \
       VALUES ($1, $2, $3, $4, TRUE, NOW()) ON CONFLICT (username) DO NOTHING",
    )
    .bind(Uuid::new_v4())
    .bind(username)
    .bind(password_hash)
    .bind(role)
    .execute(&self.pool)
    .await?;
    let sql = format!("SELECT {} FROM admin_users WHERE username = $1", PRINCIPAL_COLUMNS);
    Ok(sqlx::query_as::<_, Principal>(&sql).bind(username).fetch_one(&self.pool).await?)
  }
}

#[async_trait]
impl OrderStore for PgStore {
  async fn begin(&self) -> Result<Box<dyn OrderTx>> {
    let tx = self.pool.begin().await?;
    Ok(Box::new(PgOrderTx { tx }))
  }

  async fn get_order(&self, id: Uuid) -> Result<Option<OrderWithItems>> {
    let sql = format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS);
    let Some(order) = sqlx::query_as::<_, Order>(&sql).bind(id).fetch_optional(&self.pool).await? else {
      return Ok(None);
    };
    let sql = format!("SELECT {} FROM order_items WHERE order_id = $1 ORDER BY created_at, id", ITEM_COLUMNS);
    let items = sqlx::query_as::<_, OrderItem>(&sql).bind(id).fetch_all(&self.pool).await?;
    Ok(Some(OrderWithItems { order, items }))
  }

  async fn list_orders(&self, page: Page) -> Result<Vec<Order>> {
    let sql = format!(
      "SELECT {} FROM orders ORDER BY created_at DESC, order_number DESC LIMIT $1 OFFSET $2",
      ORDER_COLUMNS
    );
    Ok(
      sqlx::query_as::<_, Order>(&sql)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?,
    )
  }

  async fn list_by_status(&self, status: OrderStatus, page: Page) -> Result<Vec<Order>> {
    let sql = format!(
      "SELECT {} FROM orders WHERE status = $1 ORDER BY created_at DESC, order_number DESC LIMIT $2 OFFSET $3",
      ORDER_COLUMNS
    );
    Ok(
      sqlx::query_as::<_, Order>(&sql)
        .bind(status)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?,
    )
  }

  async fn history(&self, order_id: Uuid) -> Result<Vec<OrderStatusHistory>> {
    Ok(
      sqlx::query_as::<_, OrderStatusHistory>(
        "SELECT id, order_id, status, notes, changed_by, created_at FROM order_status_history \
         WHERE order_id = $1 ORDER BY seq",
      )
      .bind(order_id)
      .fetch_all(&self.pool)
      .await?,
    )
  }

  async fn resolve_reference(&self, reference: &str) -> Result<Option<Uuid>> {
    let id = match Uuid::parse_str(reference) {
      Ok(id) => {
        sqlx::query_scalar::<_, Uuid>("SELECT id FROM orders WHERE id = $1")
          .bind(id)
          .fetch_optional(&self.pool)
          .await?
      }
      Err(_) => None,
    };
    if id.is_some() {
      return Ok(id);
    }
    Ok(
      sqlx::query_scalar::<_, Uuid>("SELECT id FROM orders WHERE order_number = $1")
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?,
    )
  }

  async fn record_unresolved_webhook(&self, entry: &UnresolvedWebhook) -> Result<()> {
    sqlx::query(
      "INSERT INTO unresolved_webhooks (id, event_type, reference, reason, payload, received_at) \
       VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(entry.id)
    .bind(&entry.event_type)
    .bind(&entry.reference)
    .bind(&entry.reason)
    .bind(&entry.payload)
    .bind(entry.received_at)
    .execute(&self.pool)
    .await?;
    Ok(())
  }

  #[instrument(name = "store::order_analytics", skip(self), err(Display))]
  async fn order_analytics(&self, day_start: DateTime<Utc>) -> Result<OrderAnalytics> {
    let day_end = day_start + Duration::days(1);
    let mut tx = self.pool.begin().await?;
    let (total_orders, total_revenue, today_orders, today_revenue) = sqlx::query_as::<_, (i64, Money, i64, Money)>(
      "SELECT COUNT(*), \
         COALESCE(SUM(total_amount) FILTER (WHERE status = 'completed'), 0), \
         COUNT(*) FILTER (WHERE created_at >= $1 AND created_at < $2), \
         COALESCE(SUM(total_amount) FILTER (WHERE status = 'completed' AND created_at >= $1 AND created_at < $2), 0) \
       FROM orders",
    )
    .bind(day_start)
    .bind(day_end)
    .fetch_one(&mut *tx)
    .await?;
    let by_status = sqlx::query_as::<_, (OrderStatus, i64)>("SELECT status, COUNT(*) FROM orders GROUP BY status")
      .fetch_all(&mut *tx)
      .await?;
    tx.commit().await?;

    let mut analytics = OrderAnalytics::empty(Utc::now());
    analytics.total_orders = total_orders;
    analytics.total_revenue = total_revenue;
    analytics.today_orders = today_orders;
    analytics.today_revenue = today_revenue;
    for (status, count) in by_status {
      analytics.orders_by_status.insert(status.as_str().to_string(), count);
    }
    Ok(analytics)
  }
}

#[async_trait]
impl Catalog for PgStore {
  async fn lookup_product(&self, id: Uuid) -> Result<Option<CatalogProduct>> {
    Ok(
      sqlx::query_as::<_, CatalogProduct>("SELECT id, name, price, is_active FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(&self.pool)
        .await?,
    )
  }
}

/// Wraps a live sqlx transaction. sqlx rolls back a transaction that is
/// dropped without `commit`.
pub struct PgOrderTx {
  tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl OrderTx for PgOrderTx {
  async fn lock_order(&mut self, id: Uuid) -> Result<Option<Order>> {
    let sql = format!("SELECT {} FROM orders WHERE id = $1 FOR UPDATE", ORDER_COLUMNS);
    Ok(sqlx::query_as::<_, Order>(&sql).bind(id).fetch_optional(&mut *self.tx).await?)
  }

  async fn insert_order(&mut self, order: &Order) -> Result<()> {
    sqlx::query(
      "INSERT INTO orders (id, order_number, customer_name, customer_email, customer_phone, customer_address, \
       notes, subtotal, discount_amount, handling_fee, total_amount, status, payment_status, payment_method, \
       payment_token, payment_url, paid_at, payment_updated_at, created_at, updated_at, completed_at, cancelled_at) \
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22)",
    )
    .bind(order.id)
    .bind(&order.order_number)
    .bind(&order.customer_name)
    .bind(&order.customer_email)
    .bind(&order.customer_phone)
    .bind(&order.customer_address)
    .bind(&order.notes)
    .bind(order.subtotal)
    .bind(order.discount_amount)
    .bind(order.handling_fee)
    .bind(order.total_amount)
    .bind(order.status)
    .bind(order.payment_status)
    .bind(&order.payment_method)
    .bind(&order.payment_token)
    .bind(&order.payment_url)
    .bind(order.paid_at)
    .bind(order.payment_updated_at)
    .bind(order.created_at)
    .bind(order.updated_at)
    .bind(order.completed_at)
    .bind(order.cancelled_at)
    .execute(&mut *self.tx)
    .await?;
    Ok(())
  }

  async fn insert_item(&mut self, item: &OrderItem) -> Result<()> {
    sqlx::query(
      "INSERT INTO order_items (id, order_id, product_id, item_name, item_description, quantity, unit_price, \
       total_price, brief_details, delivery_date, revision_count, max_revisions, created_at) \
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
    )
    .bind(item.id)
    .bind(item.order_id)
    .bind(item.product_id)
    .bind(&item.item_name)
    .bind(&item.item_description)
    .bind(item.quantity)
    .bind(item.unit_price)
    .bind(item.total_price)
    .bind(&item.brief_details)
    .bind(item.delivery_date)
    .bind(item.revision_count)
    .bind(item.max_revisions)
    .bind(item.created_at)
    .execute(&mut *self.tx)
    .await?;
    Ok(())
  }

  async fn set_status(&mut self, id: Uuid, status: OrderStatus, at: DateTime<Utc>) -> Result<Order> {
    let sql = format!(
      "UPDATE orders SET status = $2, updated_at = $3, \
       completed_at = CASE WHEN $2 = 'completed'::order_status THEN COALESCE(completed_at, $3) ELSE completed_at END, \
       cancelled_at = CASE WHEN $2 = 'cancelled'::order_status THEN COALESCE(cancelled_at, $3) ELSE cancelled_at END \
       WHERE id = $1 RETURNING {}",
      ORDER_COLUMNS
    );
    sqlx::query_as::<_, Order>(&sql)
      .bind(id)
      .bind(status)
      .bind(at)
      .fetch_optional(&mut *self.tx)
      .await?
      .ok_or_else(|| Error::not_found(format!("order {}", id)))
  }

  async fn set_payment(&mut self, id: Uuid, change: &PaymentChange) -> Result<Order> {
    let sql = format!(
      "UPDATE orders SET payment_status = $2, payment_method = COALESCE($3, payment_method), \
       paid_at = CASE WHEN $2 = 'paid'::payment_status THEN COALESCE(paid_at, $4) ELSE paid_at END, \
       payment_updated_at = $4, updated_at = $5 \
       WHERE id = $1 RETURNING {}",
      ORDER_COLUMNS
    );
    sqlx::query_as::<_, Order>(&sql)
      .bind(id)
      .bind(change.status)
      .bind(&change.method)
      .bind(change.occurred_at)
      .bind(change.at)
      .fetch_optional(&mut *self.tx)
      .await?
      .ok_or_else(|| Error::not_found(format!("order {}", id)))
  }

  async fn append_history(&mut self, row: &OrderStatusHistory) -> Result<()> {
    sqlx::query(
      "INSERT INTO order_status_history (id, order_id, status, notes, changed_by, created_at) \
       VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(row.id)
    .bind(row.order_id)
    .bind(&row.status)
    .bind(&row.notes)
    .bind(&row.changed_by)
    .bind(row.created_at)
    .execute(&mut *self.tx)
    .await?;
    Ok(())
  }

  async fn commit(self: Box<Self>) -> Result<()> {
    self
      .tx
      .commit()
      .await
      .map_err(|e| Error::Integrity(format!("commit failed: {}", e)))
  }
}
