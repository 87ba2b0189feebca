// server/src/web/handlers/mod.rs

pub mod order_handlers;
pub mod session_handlers;
pub mod webhook_handlers;

use actix_web::HttpResponse;
use serde::Serialize;
use serde_json::json;

/// `{"success": true, "data": ...}` with status 200.
pub fn ok<T: Serialize>(data: T) -> HttpResponse {
  HttpResponse::Ok().json(json!({ "success": true, "data": data }))
}

pub fn created<T: Serialize>(data: T) -> HttpResponse {
  HttpResponse::Created().json(json!({ "success": true, "data": data }))
}
