// server/src/main.rs

use actix_web::{web as actix_data, App, HttpServer};
use anyhow::Context;
use orderdesk::hub::NotificationHub;
use orderdesk_server::config::AppConfig;
use orderdesk_server::state::{AppState, Stores};
use orderdesk_server::web::configure_app_routes;
use std::sync::Arc;
use std::time::Duration;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
  let app_config = Arc::new(AppConfig::from_env().context("failed to load configuration")?);
  orderdesk_server::init_tracing(app_config.log_format);
  tracing::info!(config = ?app_config, "starting orderdesk server");

  let stores = Stores::from_config(&app_config)
    .await
    .context("failed to initialise storage")?;

  let (hub, hub_task) = NotificationHub::spawn(app_config.live_client_buffer);
  let app_state = AppState::new(app_config.clone(), stores, hub.clone());
  app_state.seed().await.context("failed to seed bootstrap admin")?;

  let purge_task = app_state
    .tokens
    .clone()
    .spawn_purge_task(Duration::from_secs(app_config.token_purge_interval_secs));
  let dashboard_task = (app_config.dashboard_interval_secs > 0).then(|| {
    app_state
      .engine
      .clone()
      .spawn_dashboard_task(Duration::from_secs(app_config.dashboard_interval_secs))
  });

  let server_address = app_config.bind_address();
  tracing::info!("binding server to {}", server_address);

  let state_for_server = app_state.clone();
  HttpServer::new(move || {
    App::new()
      .app_data(actix_data::Data::new(state_for_server.clone()))
      .wrap(tracing_actix_web::TracingLogger::default())
      .configure(configure_app_routes)
  })
  .bind(&server_address)
  .with_context(|| format!("failed to bind {}", server_address))?
  .run()
  .await
  .context("http server failed")?;

  tracing::info!("http server stopped, shutting down background tasks");
  purge_task.abort();
  if let Some(task) = dashboard_task {
    task.abort();
  }
  hub.shutdown().await;
  if tokio::time::timeout(Duration::from_secs(5), hub_task).await.is_err() {
    tracing::warn!("notification hub did not stop in time");
  }
  Ok(())
}
