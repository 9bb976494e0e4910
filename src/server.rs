/// HTTP server setup and routing
use crate::{
    context::AppContext,
    error::{YggError, YggResult},
    rate_limit::rate_limit_middleware,
};
use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware,
    response::Json,
    routing::get,
    Router,
};
use serde_json::json;
use std::net::SocketAddr;
use tower_http::{compression::CompressionLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::info;

/// Build the main application router
pub fn build_router(ctx: AppContext) -> YggResult<Router> {
    let mut router = Router::new()
        .route("/health", get(health_check))
        .merge(crate::api::routes())
        .with_state(ctx.clone())
        .fallback(not_found);

    if let Some(limit) = ctx.config.body_size_limit()? {
        router = router
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(limit));
    }

    if let Some(limiter) = ctx.rate_limiter.clone() {
        router = router.layer(middleware::from_fn_with_state(limiter, rate_limit_middleware));
    }

    router = router.layer(CompressionLayer::new());

    if ctx.config.log_requests {
        router = router.layer(TraceLayer::new_for_http());
    }

    Ok(router)
}

/// Health check handler
async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// 404 handler
async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "NotFound",
            "message": "Endpoint not found"
        })),
    )
}

/// Start the HTTP server
pub async fn serve(ctx: AppContext) -> YggResult<()> {
    let addr = ctx.config.listen_address.clone();

    if ctx.config.hide_listen_address {
        info!("{} listening", ctx.config.instance_name);
    } else {
        info!("{} listening on {}", ctx.config.instance_name, addr);
    }
    info!("   Base URL: {}", ctx.config.base_url);

    if let Some(limiter) = &ctx.rate_limiter {
        limiter.spawn_pruner();
    }

    let app = build_router(ctx)?;

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| YggError::Internal(format!("Failed to bind to {}: {}", addr, e)))?;

    // Connect info feeds the per-client rate limiter
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|e| YggError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}
