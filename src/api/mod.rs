//! HTTP surface of the relay

pub mod webhook;

use axum::{Router, routing};

use crate::SharedState;
pub use webhook::handle_webhook;

/// The webhook route accepts every method; the handler only lets POST through.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", routing::any(handle_webhook))
        .with_state(state)
}
