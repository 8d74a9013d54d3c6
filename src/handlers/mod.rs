mod files;
mod records;
mod service_info;

pub use files::get_file_info;
pub use records::{get_records, post_records};
pub use service_info::service_info;

use crate::catalog::Catalog;
use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<Catalog>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/records/{id}", get(get_records).post(post_records))
        .route("/files/{id}", get(get_file_info))
        .route("/", get(service_info))
        .route("/service-info", get(service_info))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Run blocking index work off the async executor.
async fn blocking<T, F>(f: F) -> crate::Result<T>
where
    F: FnOnce() -> crate::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| crate::Error::Internal(format!("blocking task failed: {}", e)))?
}
