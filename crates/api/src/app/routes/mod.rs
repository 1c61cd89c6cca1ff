use std::sync::Arc;

use axum::{routing::get, Router};

use crate::app::services::AppServices;

pub mod admin;
pub mod system;
pub mod wallet;

/// Router for all authenticated endpoints.
pub fn router(services: Arc<AppServices>) -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/wallet", wallet::router(services))
        .nest("/admin", admin::router())
}
