// server/src/web/routes.rs

use actix_web::{error::JsonPayloadError, web, HttpRequest, HttpResponse};

use crate::errors::AppError;
use crate::web::handlers::{order_handlers, session_handlers, webhook_handlers};
use crate::web::live::live_handler;

async fn health_check_handler() -> HttpResponse {
  HttpResponse::Ok().json(serde_json::json!({ "success": true, "data": { "status": "ok" } }))
}

/// Malformed JSON bodies get the same error envelope as everything else.
fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
  AppError::validation(format!("invalid request body: {}", err)).into()
}

pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  cfg.app_data(web::JsonConfig::default().error_handler(json_error_handler));
  cfg.service(
    web::scope("/api/v1")
      .route("/health", web::get().to(health_check_handler))
      .service(
        web::scope("/sessions")
          .route("", web::post().to(session_handlers::login_handler))
          .route("", web::delete().to(session_handlers::logout_handler))
          .route("/password", web::put().to(session_handlers::change_password_handler)),
      )
      .service(
        web::scope("/orders")
          .route("", web::post().to(order_handlers::create_order_handler))
          .route("", web::get().to(order_handlers::list_orders_handler))
          .route("/analytics", web::get().to(order_handlers::order_analytics_handler))
          .route("/status/{status}", web::get().to(order_handlers::list_by_status_handler))
          .route("/{order_id}", web::get().to(order_handlers::get_order_handler))
          .route("/{order_id}/history", web::get().to(order_handlers::order_history_handler))
          .route("/{order_id}/status", web::put().to(order_handlers::update_status_handler)),
      )
      .service(web::scope("/webhooks").route("/payments", web::post().to(webhook_handlers::payment_webhook_handler)))
      .route("/live", web::get().to(live_handler)),
  );
}
