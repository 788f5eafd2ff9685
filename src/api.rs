//! HTTP control surface
//!
//! Thin operational layer over the engine: health, status, manual sync
//! triggers and service lifecycle. All state lives in the engine; handlers
//! only translate between HTTP and engine calls.

pub mod dto;
pub mod handlers;
pub mod routes;

pub use handlers::{AppContext, SharedContext};
pub use routes::create_router;
