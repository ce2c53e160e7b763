//! HTTP front for redirect traffic.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, timeout, trace)
//!     → request.rs (Host → site root)
//!     → ResolutionEngine::resolve
//!     → response.rs (301/302 + Location, or 404)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{SiteMap, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
