//! Redirect resolution service library.

pub mod admin;
pub mod config;
pub mod content;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod model;
pub mod observability;
pub mod routing;
pub mod store;

pub use config::RedirectsConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use routing::{Resolution, ResolutionEngine};
