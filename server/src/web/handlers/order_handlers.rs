// server/src/web/handlers/order_handlers.rs

use actix_web::{web, HttpResponse};
use orderdesk::model::{NewOrder, OrderStatus, Page, PageQuery, UpdateStatusRequest};
use tracing::instrument;
use uuid::Uuid;

use super::{created, ok};
use crate::errors::AppError;
use crate::state::AppState;
use crate::web::extractors::AuthenticatedPrincipal;

fn parse_order_id(raw: &str) -> Result<Uuid, AppError> {
  Uuid::parse_str(raw.trim()).map_err(|_| AppError::validation(format!("invalid order id '{}'", raw)))
}

#[instrument(name = "handler::create_order", skip_all, fields(actor = %principal.username))]
pub async fn create_order_handler(
  app_state: web::Data<AppState>,
  principal: AuthenticatedPrincipal,
  payload: web::Json<NewOrder>,
) -> Result<HttpResponse, AppError> {
  principal.require_order_mutation()?;
  let order = app_state
    .engine
    .create_order(payload.into_inner(), Some(principal.username.clone()))
    .await?;
  Ok(created(order))
}

pub async fn list_orders_handler(
  app_state: web::Data<AppState>,
  _principal: AuthenticatedPrincipal,
  query: web::Query<PageQuery>,
) -> Result<HttpResponse, AppError> {
  let orders = app_state.engine.list_orders(Page::from(&*query)).await?;
  Ok(ok(orders))
}

pub async fn list_by_status_handler(
  app_state: web::Data<AppState>,
  _principal: AuthenticatedPrincipal,
  status: web::Path<String>,
  query: web::Query<PageQuery>,
) -> Result<HttpResponse, AppError> {
  let status: OrderStatus = status.parse()?;
  let orders = app_state.engine.list_by_status(status, Page::from(&*query)).await?;
  Ok(ok(orders))
}

pub async fn order_analytics_handler(
  app_state: web::Data<AppState>,
  _principal: AuthenticatedPrincipal,
) -> Result<HttpResponse, AppError> {
  let analytics = app_state.engine.analytics().await?;
  Ok(ok(analytics))
}

pub async fn get_order_handler(
  app_state: web::Data<AppState>,
  _principal: AuthenticatedPrincipal,
  order_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
  let order = app_state.engine.get_order(parse_order_id(&order_id)?).await?;
  Ok(ok(order))
}

pub async fn order_history_handler(
  app_state: web::Data<AppState>,
  _principal: AuthenticatedPrincipal,
  order_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
  let history = app_state.engine.order_history(parse_order_id(&order_id)?).await?;
  Ok(ok(history))
}

#[instrument(name = "handler::update_status", skip_all, fields(actor = %principal.username, order_id = %order_id))]
pub async fn update_status_handler(
  app_state: web::Data<AppState>,
  principal: AuthenticatedPrincipal,
  order_id: web::Path<String>,
  payload: web::Json<UpdateStatusRequest>,
) -> Result<HttpResponse, AppError> {
  principal.require_order_mutation()?;
  let order_id = parse_order_id(&order_id)?;
  let UpdateStatusRequest { status, notes } = payload.into_inner();
  let status: OrderStatus = status.parse()?;
  let order = app_state
    .engine
    .update_status(order_id, status, notes, Some(principal.username.clone()))
    .await?;
  Ok(ok(order))
}
