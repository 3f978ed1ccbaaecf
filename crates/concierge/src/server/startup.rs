//! REST server startup and configuration

use anyhow::Result;
use axum::serve;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::context::AppContext;
use crate::server::routing::create_router;

/// Bind, start loading resources in the background, then serve until Ctrl-C.
///
/// Requests arriving before loading completes get `NotReady` answers.
pub async fn start_server(addr: SocketAddr, context: Arc<AppContext>) -> Result<()> {
  info!("Starting concierge REST server on {addr}");

  let app = create_router(context.clone())
    .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()));

  let listener = TcpListener::bind(addr).await?;
  info!("Server listening on {addr}");

  let loader = context.clone();
  tokio::spawn(async move {
    match loader.load_resources().await {
      Ok(()) => info!("All resources loaded, server ready"),
      Err(e) => error!("Resource loading incomplete: {e}"),
    }
  });

  match serve(listener, app).with_graceful_shutdown(shutdown_signal()).await {
    Ok(()) => {
      info!("Server shutdown gracefully");
      Ok(())
    }
    Err(e) => {
      error!("Server error: {e}");
      Err(anyhow::anyhow!("Server error: {e}"))
    }
  }
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    warn!("Failed to listen for shutdown signal: {e}");
    std::future::pending::<()>().await;
  }
}
