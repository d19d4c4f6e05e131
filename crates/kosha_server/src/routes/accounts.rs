//! I define the user, account, and invitation endpoints.
//!

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use kosha_accounts::{write::default_invitation_validity, NewAccount, NewUser};
use kosha_space::user::UserProfile;
use serde::Deserialize;
use serde_json::json;

use super::resolve_id;
use crate::{error::ApiError, state::AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RegisterUserBody {
    email: String,
    name: String,
    #[serde(default)]
    bio: String,
    #[serde(default)]
    avatar: String,
}

/// `POST /users`: register a user.
pub async fn create_user(
    State(state): State<AppState>,
    Json(body): Json<RegisterUserBody>,
) -> Result<Response, ApiError> {
    let user = state
        .users_write
        .create(NewUser {
            email: body.email,
            profile: UserProfile {
                name: body.name,
                bio: body.bio,
                avatar: body.avatar,
                ..Default::default()
            },
        })
        .await?;

    Ok((StatusCode::CREATED, Json(user_json(&user))).into_response())
}

/// `GET /users`: list users, filterable by `status` and
/// `email_prefix`.
pub async fn list_users(
    State(state): State<AppState>,
    axum::extract::Query(params): axum::extract::Query<std::collections::HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let mut filter = kosha_accounts::UserListFilter {
        limit: 50,
        ..Default::default()
    };
    if let Some(status) = params.get("status") {
        filter.status = Some(
            status
                .parse()
                .map_err(|_| ApiError::invalid_argument(format!("Unknown status: {status}")))?,
        );
    }
    if let Some(prefix) = params.get("email_prefix") {
        filter.email_prefix = Some(prefix.clone());
    }
    if let Some(limit) = params.get("limit") {
        filter.limit = limit
            .parse()
            .map_err(|_| ApiError::invalid_argument("Invalid limit."))?;
    }
    if let Some(offset) = params.get("offset") {
        filter.offset = offset
            .parse()
            .map_err(|_| ApiError::invalid_argument("Invalid offset."))?;
    }

    let users = state.users_read.list(&filter).await?;
    Ok(Json(json!({
        "users": users.iter().map(user_json).collect::<Vec<_>>(),
    }))
    .into_response())
}

/// `GET /users/{id}`.
pub async fn get_user(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Response, ApiError> {
    let id = resolve_id(&raw_id)?;
    let user = state
        .users_read
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("No user exists with id {raw_id}.")))?;
    Ok(Json(user_json(&user)).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UpdateProfileBody {
    name: String,
    #[serde(default)]
    bio: String,
    #[serde(default)]
    avatar: String,
}

/// `PATCH /users/{id}`: replace the profile.
pub async fn update_user(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    Json(body): Json<UpdateProfileBody>,
) -> Result<Response, ApiError> {
    let id = resolve_id(&raw_id)?;
    let user = state
        .users_write
        .update_profile(
            id,
            UserProfile {
                name: body.name,
                bio: body.bio,
                avatar: body.avatar,
                ..Default::default()
            },
        )
        .await?;
    Ok(Json(user_json(&user)).into_response())
}

/// `DELETE /users/{id}`: soft delete.
pub async fn delete_user(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Response, ApiError> {
    let id = resolve_id(&raw_id)?;
    state.users_write.delete(id).await?;
    Ok(Json(json!({ "message": "user deleted" })).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateAccountBody {
    owner_user_id: String,
    name: String,
    #[serde(default)]
    description: String,
}

/// `POST /accounts`.
pub async fn create_account(
    State(state): State<AppState>,
    Json(body): Json<CreateAccountBody>,
) -> Result<Response, ApiError> {
    let owner_user_id = resolve_id(&body.owner_user_id)?;
    let account = state
        .accounts_write
        .create(NewAccount {
            owner_user_id,
            name: body.name,
            description: body.description,
            settings: None,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "id": account.id,
            "ownerUserId": account.owner_user_id,
            "name": account.name,
            "description": account.description,
        })),
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateInvitationBody {
    email: String,
    role_id: String,
    invited_by: String,
}

/// `POST /accounts/{id}/invitations`.
pub async fn create_invitation(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    Json(body): Json<CreateInvitationBody>,
) -> Result<Response, ApiError> {
    let account_id = resolve_id(&raw_id)?;
    let invited_by = resolve_id(&body.invited_by)?;

    let invitation = state
        .invitations
        .create(
            account_id,
            &body.email,
            &body.role_id,
            invited_by,
            default_invitation_validity(),
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "id": invitation.id,
            "accountId": invitation.account_id,
            "email": invitation.email,
            "roleId": invitation.role_id,
            "token": invitation.token,
            "status": invitation.status.as_str(),
            "expiresAt": invitation.expires_at,
        })),
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AcceptInvitationBody {
    user_id: String,
}

/// `POST /invitations/{token}/accept`.
pub async fn accept_invitation(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(body): Json<AcceptInvitationBody>,
) -> Result<Response, ApiError> {
    let user_id = resolve_id(&body.user_id)?;
    let member = state.invitations.accept(&token, user_id).await?;

    Ok(Json(json!({
        "id": member.id,
        "accountId": member.account_id,
        "userId": member.user_id,
        "roleId": member.role_id,
        "joinedAt": member.joined_at,
    }))
    .into_response())
}

fn user_json(user: &kosha_space::user::User) -> serde_json::Value {
    json!({
        "id": user.id,
        "webid": user.webid,
        "email": user.email,
        "name": user.profile.name,
        "bio": user.profile.bio,
        "avatar": user.profile.avatar,
        "status": user.status.as_str(),
        "createdAt": user.created_at,
        "updatedAt": user.updated_at,
    })
}
