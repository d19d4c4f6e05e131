//! I define types for resource and container metadata, and for
//! container membership edges.
//!

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::OpaqueId;

/// Kind of a container member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemberKind {
    /// Member is itself a container.
    Container,
    /// Member is a plain resource.
    Resource,
}

impl MemberKind {
    /// Stable string form, as persisted in the index.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Container => "container",
            Self::Resource => "resource",
        }
    }
}

impl std::str::FromStr for MemberKind {
    type Err = UnknownMemberKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "container" => Ok(Self::Container),
            "resource" => Ok(Self::Resource),
            other => Err(UnknownMemberKindError(other.to_owned())),
        }
    }
}

/// An error for unknown member kind discriminants.
#[derive(Debug, thiserror::Error)]
#[error("Unknown member kind: {0}")]
pub struct UnknownMemberKindError(pub String);

/// Metadata of a stored resource, as kept in its sidecar
/// record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceMeta {
    /// Id of the resource.
    pub id: OpaqueId,

    /// Media type of the stored representation.
    pub content_type: String,

    /// Strong entity tag: quoted hex sha-256 of the stored
    /// bytes. Changes iff the stored bytes change.
    pub etag: String,

    /// Size of the stored bytes.
    pub size_bytes: u64,

    /// Creation instant.
    pub created_at: DateTime<Utc>,

    /// Last update instant. Never precedes `created_at`.
    pub updated_at: DateTime<Utc>,

    /// Id of the parent container, if the resource is
    /// contained.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_container_id: Option<OpaqueId>,

    /// Whether the resource is a container.
    #[serde(default)]
    pub is_container: bool,
}

impl ResourceMeta {
    /// Kind of this resource as a container member.
    #[inline]
    pub fn member_kind(&self) -> MemberKind {
        if self.is_container {
            MemberKind::Container
        } else {
            MemberKind::Resource
        }
    }
}

/// A membership edge: one row of the parent → member index.
/// An edge exists iff a member resource exists with the edge's
/// parent as its parent container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipEdge {
    /// Id of the parent container.
    pub parent_id: OpaqueId,

    /// Id of the member.
    pub member_id: OpaqueId,

    /// Kind of the member.
    pub member_kind: MemberKind,

    /// Instant at which the member joined the container.
    pub joined_at: DateTime<Utc>,

    /// Media type of the member representation.
    pub content_type: String,

    /// Size of the member representation.
    pub size_bytes: u64,

    /// Display name of the member.
    pub name: String,
}
