#![forbid(unsafe_code)]
#![allow(missing_docs)]

//! The HTTP request surface: `/add`, `/get`, `/del`, `/info`.

pub mod handlers;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the axum router exposing the four peer endpoints.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/add/:identifier", post(handlers::add))
        .route("/get/:identifier", get(handlers::get))
        .route("/del/:identifier", post(handlers::del))
        .route("/info", post(handlers::info))
        .with_state(state)
}
