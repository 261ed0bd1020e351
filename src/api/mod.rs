//! JSON HTTP API.
//!
//! Exposes the clinic workflows as HTTP endpoints nested under `/api/`.
//! The router is composable: `api_router()` returns a `Router` that can be
//! mounted on any axum server instance.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{start_server_on, ApiServer, ServerError};
pub use types::ApiContext;
