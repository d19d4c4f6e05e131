//! I define the relational schema of the accounts subsystem,
//! and its row decoders.
//!

use chrono::{DateTime, Utc};
use kosha_space::{
    account::{Account, AccountMember, AccountSettings, Role},
    invitation::{Invitation, InvitationStatus},
    user::{User, UserProfile, UserStatus},
};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use crate::error::AccountsError;

/// Idempotently create the backing tables, and seed the
/// immutable system roles.
pub async fn init_schema(pool: &SqlitePool) -> Result<(), AccountsError> {
    for ddl in [
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id         TEXT PRIMARY KEY,
            webid      TEXT NOT NULL UNIQUE,
            email      TEXT NOT NULL UNIQUE,
            profile    TEXT NOT NULL,
            status     TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS accounts (
            id            TEXT PRIMARY KEY,
            owner_user_id TEXT NOT NULL,
            name          TEXT NOT NULL,
            description   TEXT NOT NULL DEFAULT '',
            settings      TEXT NOT NULL,
            created_at    TEXT NOT NULL,
            updated_at    TEXT NOT NULL
        );
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS roles (
            id          TEXT PRIMARY KEY,
            name        TEXT NOT NULL,
            permissions TEXT NOT NULL
        );
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS account_members (
            id         TEXT PRIMARY KEY,
            account_id TEXT NOT NULL,
            user_id    TEXT NOT NULL,
            role_id    TEXT NOT NULL,
            invited_by TEXT,
            joined_at  TEXT NOT NULL,
            UNIQUE (account_id, user_id)
        );
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS invitations (
            id         TEXT PRIMARY KEY,
            account_id TEXT NOT NULL,
            email      TEXT NOT NULL,
            role_id    TEXT NOT NULL,
            token      TEXT NOT NULL UNIQUE,
            invited_by TEXT NOT NULL,
            status     TEXT NOT NULL,
            expires_at TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        "#,
        "CREATE INDEX IF NOT EXISTS idx_members_account ON account_members (account_id);",
        "CREATE INDEX IF NOT EXISTS idx_invitations_account ON invitations (account_id);",
    ] {
        sqlx::query(ddl).execute(pool).await?;
    }

    // Seed the immutable system role set.
    for role in kosha_space::account::system_roles() {
        sqlx::query("INSERT OR IGNORE INTO roles (id, name, permissions) VALUES (?1, ?2, ?3)")
            .bind(&role.id)
            .bind(&role.name)
            .bind(
                serde_json::to_string(&role.permissions)
                    .expect("Role serialization must not fail."),
            )
            .execute(pool)
            .await?;
    }
    Ok(())
}

pub(crate) fn decode_user(row: &SqliteRow) -> Result<User, AccountsError> {
    let id: String = row.get("id");
    Ok(User {
        id: id
            .parse()
            .map_err(|_| AccountsError::not_found("user", &id))?,
        webid: row.get("webid"),
        email: row.get("email"),
        profile: serde_json::from_str::<UserProfile>(&row.get::<String, _>("profile"))
            .map_err(AccountsError::internal)?,
        status: row
            .get::<String, _>("status")
            .parse::<UserStatus>()
            .map_err(AccountsError::internal)?,
        created_at: row.get::<DateTime<Utc>, _>("created_at"),
        updated_at: row.get::<DateTime<Utc>, _>("updated_at"),
    })
}

pub(crate) fn decode_account(row: &SqliteRow) -> Result<Account, AccountsError> {
    let id: String = row.get("id");
    Ok(Account {
        id: id
            .parse()
            .map_err(|_| AccountsError::not_found("account", &id))?,
        owner_user_id: row
            .get::<String, _>("owner_user_id")
            .parse()
            .map_err(|_| AccountsError::not_found("account", &id))?,
        name: row.get("name"),
        description: row.get("description"),
        settings: serde_json::from_str::<AccountSettings>(&row.get::<String, _>("settings"))
            .map_err(AccountsError::internal)?,
        created_at: row.get::<DateTime<Utc>, _>("created_at"),
        updated_at: row.get::<DateTime<Utc>, _>("updated_at"),
    })
}

pub(crate) fn decode_role(row: &SqliteRow) -> Result<Role, AccountsError> {
    Ok(Role {
        id: row.get("id"),
        name: row.get("name"),
        permissions: serde_json::from_str(&row.get::<String, _>("permissions"))
            .map_err(AccountsError::internal)?,
    })
}

pub(crate) fn decode_member(row: &SqliteRow) -> Result<AccountMember, AccountsError> {
    let id: String = row.get("id");
    let parse_id = |s: String| {
        s.parse()
            .map_err(|_| AccountsError::not_found("account member", &id))
    };
    Ok(AccountMember {
        id: parse_id(id.clone())?,
        account_id: parse_id(row.get("account_id"))?,
        user_id: parse_id(row.get("user_id"))?,
        role_id: row.get("role_id"),
        invited_by: row
            .get::<Option<String>, _>("invited_by")
            .map(parse_id)
            .transpose()?,
        joined_at: row.get::<DateTime<Utc>, _>("joined_at"),
    })
}

pub(crate) fn decode_invitation(row: &SqliteRow) -> Result<Invitation, AccountsError> {
    let id: String = row.get("id");
    let parse_id = |s: String| {
        s.parse()
            .map_err(|_| AccountsError::not_found("invitation", &id))
    };
    Ok(Invitation {
        id: parse_id(id.clone())?,
        account_id: parse_id(row.get("account_id"))?,
        email: row.get("email"),
        role_id: row.get("role_id"),
        token: row.get("token"),
        invited_by: parse_id(row.get("invited_by"))?,
        status: row
            .get::<String, _>("status")
            .parse::<InvitationStatus>()
            .map_err(AccountsError::internal)?,
        expires_at: row.get::<DateTime<Utc>, _>("expires_at"),
        created_at: row.get::<DateTime<Utc>, _>("created_at"),
    })
}
