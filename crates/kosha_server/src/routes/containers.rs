//! I define the container endpoints.
//!

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::DateTime;
use kosha_index::{ListingOptions, MemberFilter, Pagination, SortDirection, SortField, SortSpec};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use super::{resolve_id, slug_header};
use crate::{error::ApiError, state::AppState};

/// `POST /containers`. An optional `parent` query parameter
/// nests the new container.
pub async fn create(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let parent_id = params
        .get("parent")
        .map(|raw| resolve_id(raw))
        .transpose()?;
    let name = slug_header(&headers);

    let meta = state
        .storage
        .create_container(parent_id, None, name)
        .await?;

    Ok((
        StatusCode::CREATED,
        [
            (header::LOCATION, format!("/containers/{}", meta.id)),
            (header::ETAG, meta.etag.clone()),
        ],
        Json(json!({
            "id": meta.id,
            "message": "container created",
        })),
    )
        .into_response())
}

/// `GET /containers/{id}`: one listing page, with aggregate
/// stats.
pub async fn list(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let id = resolve_id(&raw_id)?;
    let options = parse_listing_options(&params)?;

    let page = state.storage.list_container(id, &options).await?;

    let members: Vec<_> = page
        .members
        .iter()
        .map(|member| {
            json!({
                "id": member.member_id,
                "name": member.name,
                "type": member.member_kind.as_str(),
                "contentType": member.content_type,
                "sizeBytes": member.size_bytes,
                "joinedAt": member.joined_at,
            })
        })
        .collect();

    Ok(Json(json!({
        "id": page.container_id,
        "memberCount": page.member_count,
        "totalSizeBytes": page.total_size,
        "limit": options.pagination.limit,
        "offset": options.pagination.offset,
        "members": members,
    }))
    .into_response())
}

/// `DELETE /containers/{id}`. `?deep=true` opts into deep
/// deletion of all descendants.
pub async fn delete(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let id = resolve_id(&raw_id)?;
    let deep = params.get("deep").map(|v| v == "true").unwrap_or(false);

    state
        .storage
        .delete_resource(id, deep, CancellationToken::new())
        .await?;
    Ok(Json(json!({ "message": "container deleted" })).into_response())
}

/// Parse listing options out of the query string:
/// `limit`, `offset`, `sort=field:direction`, and the
/// `filter.*` family.
fn parse_listing_options(params: &HashMap<String, String>) -> Result<ListingOptions, ApiError> {
    let mut options = ListingOptions::default();

    if let Some(limit) = params.get("limit") {
        let limit: u32 = limit
            .parse()
            .map_err(|_| ApiError::invalid_argument("Invalid limit."))?;
        options.pagination = Pagination::new(limit, options.pagination.offset);
    }
    if let Some(offset) = params.get("offset") {
        let offset: u64 = offset
            .parse()
            .map_err(|_| ApiError::invalid_argument("Invalid offset."))?;
        options.pagination = Pagination::new(options.pagination.limit, offset);
    }

    if let Some(sort) = params.get("sort") {
        let (field, direction) = sort.split_once(':').unwrap_or((sort.as_str(), "asc"));
        options.sort = SortSpec {
            field: field
                .parse::<SortField>()
                .map_err(|e| ApiError::invalid_argument(e.to_string()))?,
            direction: direction
                .parse::<SortDirection>()
                .map_err(|e| ApiError::invalid_argument(e.to_string()))?,
        };
    }

    options.filter = parse_member_filter(params)?;
    Ok(options)
}

fn parse_member_filter(params: &HashMap<String, String>) -> Result<MemberFilter, ApiError> {
    let mut filter = MemberFilter::default();

    if let Some(kind) = params.get("filter.member_type") {
        filter.member_kind = Some(
            kind.parse()
                .map_err(|_| ApiError::invalid_argument(format!("Unknown member type: {kind}")))?,
        );
    }
    if let Some(prefix) = params.get("filter.content_type") {
        filter.content_type_prefix = Some(prefix.clone());
    }
    if let Some(pattern) = params.get("filter.name") {
        filter.name_pattern = Some(pattern.clone());
    }
    if let Some(after) = params.get("filter.created_after") {
        filter.created_after = Some(parse_timestamp(after)?);
    }
    if let Some(before) = params.get("filter.created_before") {
        filter.created_before = Some(parse_timestamp(before)?);
    }
    if let Some(min) = params.get("filter.min_size") {
        filter.min_size = Some(
            min.parse()
                .map_err(|_| ApiError::invalid_argument("Invalid filter.min_size."))?,
        );
    }
    if let Some(max) = params.get("filter.max_size") {
        filter.max_size = Some(
            max.parse()
                .map_err(|_| ApiError::invalid_argument("Invalid filter.max_size."))?,
        );
    }
    Ok(filter)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<chrono::Utc>, ApiError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&chrono::Utc))
        .map_err(|_| ApiError::invalid_argument(format!("Invalid timestamp: {raw}")))
}

#[cfg(test)]
mod tests {
    use claims::{assert_err, assert_ok};

    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn full_query_parses() {
        let options = assert_ok!(parse_listing_options(&params(&[
            ("limit", "100"),
            ("offset", "5000"),
            ("sort", "name:asc"),
            ("filter.member_type", "resource"),
            ("filter.content_type", "text/"),
            ("filter.name", "doc-*"),
            ("filter.min_size", "10"),
            ("filter.max_size", "1000"),
        ])));

        assert_eq!(options.pagination.limit, 100);
        assert_eq!(options.pagination.offset, 5000);
        assert_eq!(options.sort.field, SortField::Name);
        assert_eq!(options.sort.direction, SortDirection::Asc);
        assert_eq!(options.filter.name_pattern.as_deref(), Some("doc-*"));
        assert_eq!(options.filter.min_size, Some(10));
    }

    #[test]
    fn sort_defaults_direction_to_asc() {
        let options = assert_ok!(parse_listing_options(&params(&[("sort", "size")])));
        assert_eq!(options.sort.field, SortField::Size);
        assert_eq!(options.sort.direction, SortDirection::Asc);
    }

    #[test]
    fn bad_values_are_invalid_arguments() {
        assert_err!(parse_listing_options(&params(&[("limit", "lots")])));
        assert_err!(parse_listing_options(&params(&[("sort", "colour:asc")])));
        assert_err!(parse_listing_options(&params(&[(
            "filter.created_after",
            "yesterday"
        )])));
    }
}
