/// API routes and handlers
pub mod front;
pub mod texture;

use crate::context::AppContext;
use axum::Router;

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(front::routes())
        .merge(texture::routes())
}
