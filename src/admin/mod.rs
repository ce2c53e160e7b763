//! Administrative API.
//!
//! # Endpoints
//! - `GET /admin/status`: index generation and stats
//! - `GET|POST /admin/redirects`: list / create rules
//! - `GET|PUT|DELETE /admin/redirects/{id}`: read / replace / delete a rule
//! - `POST /admin/rebuild`: force an index rebuild
//! - `GET /admin/resolve?path=&query=&host=`: dry-run resolution
//! - `POST /admin/outbound`: parse a node's outbound redirect property value
//!
//! Every route requires `Authorization: Bearer <api_key>`. Mutations return
//! only after the new index is installed.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::http::SiteMap;
use crate::routing::ResolutionEngine;
use crate::store::RuleRepository;

use self::auth::admin_auth_middleware;
use self::handlers::*;

/// State shared by admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub engine: Arc<ResolutionEngine>,
    pub repo: Arc<dyn RuleRepository>,
    pub sites: Arc<SiteMap>,
    pub api_key: Arc<str>,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/redirects", get(list_rules).post(create_rule))
        .route(
            "/admin/redirects/{id}",
            get(get_rule).put(update_rule).delete(delete_rule),
        )
        .route("/admin/rebuild", post(rebuild_index))
        .route("/admin/resolve", get(resolve))
        .route("/admin/outbound", post(preview_outbound))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}
