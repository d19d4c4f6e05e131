//! I define the user model.
//!

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::OpaqueId;

/// Lifecycle status of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    /// User is active.
    Active,
    /// User is suspended.
    Suspended,
    /// User is soft-deleted.
    Deleted,
}

impl UserStatus {
    /// Stable string form, as persisted.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Deleted => "deleted",
        }
    }
}

impl std::str::FromStr for UserStatus {
    type Err = UnknownUserStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "suspended" => Ok(Self::Suspended),
            "deleted" => Ok(Self::Deleted),
            other => Err(UnknownUserStatusError(other.to_owned())),
        }
    }
}

/// An error for unknown user status discriminants.
#[derive(Debug, thiserror::Error)]
#[error("Unknown user status: {0}")]
pub struct UnknownUserStatusError(pub String);

/// Profile attributes of a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Display name.
    pub name: String,

    /// Short biography.
    #[serde(default)]
    pub bio: String,

    /// Avatar uri.
    #[serde(default)]
    pub avatar: String,

    /// Free-form preferences.
    #[serde(default)]
    pub preferences: BTreeMap<String, String>,
}

/// A user of the space.
///
/// Both `webid` and `email` are globally unique. Email
/// uniqueness is case-sensitive, exactly as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Id of the user.
    pub id: OpaqueId,

    /// The user's webid.
    pub webid: String,

    /// The user's email.
    pub email: String,

    /// Profile attributes.
    pub profile: UserProfile,

    /// Lifecycle status.
    pub status: UserStatus,

    /// Creation instant.
    pub created_at: DateTime<Utc>,

    /// Last update instant.
    pub updated_at: DateTime<Utc>,
}

/// An error in validating user attributes.
#[derive(Debug, thiserror::Error)]
pub enum InvalidUserError {
    /// Email is empty.
    #[error("User email must not be empty.")]
    EmptyEmail,

    /// Email has no `@`.
    #[error("User email must contain '@'.")]
    MalformedEmail,

    /// Name is empty.
    #[error("User name must not be empty.")]
    EmptyName,
}

impl User {
    /// Validate registration attributes.
    pub fn validate_registration(email: &str, name: &str) -> Result<(), InvalidUserError> {
        if email.is_empty() {
            return Err(InvalidUserError::EmptyEmail);
        }
        if !email.contains('@') {
            return Err(InvalidUserError::MalformedEmail);
        }
        if name.trim().is_empty() {
            return Err(InvalidUserError::EmptyName);
        }
        Ok(())
    }
}
