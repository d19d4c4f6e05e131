//! I define the resource endpoints.
//!

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use super::{accept_header, require_content_type, resolve_id, slug_header};
use crate::{error::ApiError, state::AppState};

/// Methods served under `/resources/{id}`.
const RESOURCE_METHODS: &[&str] = &["GET", "HEAD", "POST", "PUT", "DELETE", "OPTIONS"];

/// `POST /resources`.
pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let content_type = require_content_type(&headers)?;
    let name = slug_header(&headers);

    let meta = state
        .storage
        .create_resource(None, body, &content_type, None, name)
        .await?;

    Ok((
        StatusCode::CREATED,
        [
            (header::LOCATION, format!("/resources/{}", meta.id)),
            (header::ETAG, meta.etag.clone()),
        ],
        Json(json!({
            "id": meta.id,
            "contentType": meta.content_type,
            "message": "resource created",
        })),
    )
        .into_response())
}

/// `GET /resources/{id}`.
pub async fn get(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let id = resolve_id(&raw_id)?;
    let content = state.storage.get_resource(id, accept_header(&headers)).await?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content.content_type.to_string()),
            (header::ETAG, content.meta.etag.clone()),
        ],
        content.body,
    )
        .into_response())
}

/// `HEAD /resources/{id}`: as `GET`, without the body.
pub async fn head(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let id = resolve_id(&raw_id)?;
    let content = state.storage.get_resource(id, accept_header(&headers)).await?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content.content_type.to_string()),
            (header::ETAG, content.meta.etag.clone()),
            (header::CONTENT_LENGTH, content.body.len().to_string()),
        ],
    )
        .into_response())
}

/// `PUT /resources/{id}`: create-or-replace.
pub async fn put(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let id = resolve_id(&raw_id)?;
    let content_type = require_content_type(&headers)?;

    let (meta, created) = state.storage.update_resource(id, body, &content_type).await?;

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        [(header::ETAG, meta.etag.clone())],
        Json(json!({
            "id": meta.id,
            "contentType": meta.content_type,
            "message": if created { "resource created" } else { "resource updated" },
        })),
    )
        .into_response())
}

/// `DELETE /resources/{id}`.
pub async fn delete(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Response, ApiError> {
    let id = resolve_id(&raw_id)?;
    state
        .storage
        .delete_resource(id, false, CancellationToken::new())
        .await?;

    Ok(Json(json!({ "message": "resource deleted" })).into_response())
}

/// `OPTIONS /resources/{id}` without a preflight header: the
/// supported method list. (Cors preflights are answered by
/// the cors middleware before reaching here.)
pub async fn options() -> Response {
    Json(json!({ "methods": RESOURCE_METHODS })).into_response()
}
