use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::admin::AdminState;
use crate::error::StoreError;
use crate::model::{OutboundRedirect, RedirectRule, RootNodeId, RuleDraft};
use crate::routing::{IndexStats, Resolution};

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub generation: u64,
    pub index: IndexStats,
}

/// Error body returned by the admin API.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
}

/// Admin failures mapped to status codes.
#[derive(Debug)]
pub enum AdminError {
    Store(StoreError),
    NotFound(String),
}

impl From<StoreError> for AdminError {
    fn from(err: StoreError) -> Self {
        AdminError::Store(err)
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AdminError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            AdminError::Store(err) => {
                let status = match &err {
                    StoreError::Invalid(_) => StatusCode::BAD_REQUEST,
                    StoreError::Duplicate { .. } => StatusCode::CONFLICT,
                    StoreError::NotFound(_) => StatusCode::NOT_FOUND,
                    StoreError::Io(_) | StoreError::Json(_) => {
                        tracing::error!(error = %err, "Rule store failure");
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, err.to_string())
            }
        };
        (status, Json(ApiError { error: message })).into_response()
    }
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        generation: state.engine.generation(),
        index: state.engine.snapshot().stats(),
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    /// Only rules of this root (global rules are listed with `root=0`).
    pub root: Option<i32>,
}

pub async fn list_rules(
    State(state): State<AdminState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<RedirectRule>>, AdminError> {
    let mut rules = state.repo.list_all()?;
    if let Some(raw) = params.root {
        let root = RootNodeId::from_raw(raw);
        rules.retain(|r| r.root_node_id() == root);
    }
    rules.sort_by_key(|r| (r.created_utc(), r.id()));
    Ok(Json(rules))
}

pub async fn get_rule(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RedirectRule>, AdminError> {
    state
        .repo
        .get(id)?
        .map(Json)
        .ok_or_else(|| AdminError::Store(StoreError::NotFound(id)))
}

pub async fn create_rule(
    State(state): State<AdminState>,
    Json(draft): Json<RuleDraft>,
) -> Result<(StatusCode, Json<RedirectRule>), AdminError> {
    let rule = state.repo.create(draft)?;
    state.engine.rebuild(state.repo.as_ref()).await?;
    Ok((StatusCode::CREATED, Json(rule)))
}

pub async fn update_rule(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
    Json(draft): Json<RuleDraft>,
) -> Result<Json<RedirectRule>, AdminError> {
    let rule = state.repo.update(id, draft)?;
    state.engine.rebuild(state.repo.as_ref()).await?;
    Ok(Json(rule))
}

pub async fn delete_rule(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AdminError> {
    if !state.repo.delete(id)? {
        return Err(StoreError::NotFound(id).into());
    }
    state.engine.rebuild(state.repo.as_ref()).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn rebuild_index(State(state): State<AdminState>) -> Result<Json<IndexStats>, AdminError> {
    let stats = state.engine.rebuild(state.repo.as_ref()).await?;
    Ok(Json(stats))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveParams {
    pub path: String,
    #[serde(default)]
    pub query: String,
    /// Resolve as if the request came to this host.
    pub host: Option<String>,
    /// Explicit root; takes precedence over `host`.
    pub root: Option<i32>,
}

/// Dry run: what would this request redirect to?
pub async fn resolve(
    State(state): State<AdminState>,
    Query(params): Query<ResolveParams>,
) -> Result<Json<Resolution>, AdminError> {
    let root = match params.root {
        Some(raw) => RootNodeId::from_raw(raw),
        None => state.sites.root_for(params.host.as_deref()),
    };
    state
        .engine
        .resolve(root, &params.path, &params.query)
        .await
        .map(Json)
        .ok_or_else(|| AdminError::NotFound(format!("no redirect for `{}`", params.path)))
}

/// How a node's outbound redirect property value would be applied.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundPreview {
    pub status_code: u16,
    pub url: String,
    pub kind: &'static str,
}

/// Parse a raw outbound redirect property value (the request body).
pub async fn preview_outbound(body: String) -> Result<Json<OutboundPreview>, AdminError> {
    let redirect = OutboundRedirect::parse(Some(&body));
    if !redirect.has_destination() {
        return Err(AdminError::NotFound("no outbound redirect in value".into()));
    }
    Ok(Json(OutboundPreview {
        status_code: redirect.status_code(),
        url: redirect.url().to_string(),
        kind: redirect.destination().kind().as_str(),
    }))
}
