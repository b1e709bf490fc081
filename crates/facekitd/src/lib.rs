//! facekitd — HTTP backend for face registration, AI-assisted recognition
//! and analysis, and text summarization.

pub mod config;
pub mod error;
pub mod gemini;
pub mod prompts;
pub mod routes;

use std::future::Future;
use std::sync::Arc;

pub use config::Config;
pub use routes::{router, AppState};

/// Serve the API on `listener` until `shutdown` resolves.
pub async fn serve<F>(
    listener: tokio::net::TcpListener,
    state: AppState,
    max_upload_bytes: usize,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(Arc::new(state), max_upload_bytes);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
