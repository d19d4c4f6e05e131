//! I define the domain events of a kosha space, and their
//! self-describing persisted record form.
//!

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::OpaqueId;

/// A domain event, as raised by the write models.
///
/// Events are the source of truth for write operations; the
/// relational and indexed projections are derivable caches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum DomainEvent {
    /// A resource was created.
    ResourceCreated {
        /// Id of the resource.
        id: OpaqueId,
        /// Parent container, if any.
        parent_id: Option<OpaqueId>,
        /// Media type of the representation.
        content_type: String,
        /// Size of the representation.
        size_bytes: u64,
        /// Entity tag of the representation.
        etag: String,
        /// Whether the resource is a container.
        is_container: bool,
    },

    /// A resource's representation was replaced.
    ResourceUpdated {
        /// Id of the resource.
        id: OpaqueId,
        /// New media type.
        content_type: String,
        /// New size.
        size_bytes: u64,
        /// New entity tag.
        etag: String,
    },

    /// A resource was deleted.
    ResourceDeleted {
        /// Id of the resource.
        id: OpaqueId,
        /// Parent container at the moment of deletion.
        parent_id: Option<OpaqueId>,
    },

    /// A user registered.
    UserRegistered {
        /// Id of the user.
        id: OpaqueId,
        /// Registered email.
        email: String,
        /// Minted webid.
        webid: String,
    },

    /// A user's profile was updated.
    UserProfileUpdated {
        /// Id of the user.
        id: OpaqueId,
    },

    /// A user was soft-deleted.
    UserDeleted {
        /// Id of the user.
        id: OpaqueId,
    },

    /// An account was created.
    AccountCreated {
        /// Id of the account.
        id: OpaqueId,
        /// Owning user.
        owner_user_id: OpaqueId,
    },

    /// An account was deleted, cascading to its members and
    /// invitations.
    AccountDeleted {
        /// Id of the account.
        id: OpaqueId,
    },

    /// A user became a member of an account.
    MemberAdded {
        /// Id of the account.
        account_id: OpaqueId,
        /// Id of the user.
        user_id: OpaqueId,
        /// Granted role.
        role_id: String,
    },

    /// A user was removed from an account.
    MemberRemoved {
        /// Id of the account.
        account_id: OpaqueId,
        /// Id of the user.
        user_id: OpaqueId,
    },

    /// An invitation was issued.
    InvitationCreated {
        /// Id of the invitation.
        id: OpaqueId,
        /// Id of the account.
        account_id: OpaqueId,
        /// Invited email.
        email: String,
    },

    /// An invitation was accepted.
    InvitationAccepted {
        /// Id of the invitation.
        id: OpaqueId,
    },

    /// An invitation was revoked.
    InvitationRevoked {
        /// Id of the invitation.
        id: OpaqueId,
    },
}

impl DomainEvent {
    /// Stable type name of this event, as recorded in the log.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ResourceCreated { .. } => "resource_created",
            Self::ResourceUpdated { .. } => "resource_updated",
            Self::ResourceDeleted { .. } => "resource_deleted",
            Self::UserRegistered { .. } => "user_registered",
            Self::UserProfileUpdated { .. } => "user_profile_updated",
            Self::UserDeleted { .. } => "user_deleted",
            Self::AccountCreated { .. } => "account_created",
            Self::AccountDeleted { .. } => "account_deleted",
            Self::MemberAdded { .. } => "member_added",
            Self::MemberRemoved { .. } => "member_removed",
            Self::InvitationCreated { .. } => "invitation_created",
            Self::InvitationAccepted { .. } => "invitation_accepted",
            Self::InvitationRevoked { .. } => "invitation_revoked",
        }
    }

    /// Id of the aggregate this event belongs to.
    pub fn aggregate_id(&self) -> OpaqueId {
        match self {
            Self::ResourceCreated { id, .. }
            | Self::ResourceUpdated { id, .. }
            | Self::ResourceDeleted { id, .. }
            | Self::UserRegistered { id, .. }
            | Self::UserProfileUpdated { id }
            | Self::UserDeleted { id }
            | Self::AccountCreated { id, .. }
            | Self::AccountDeleted { id }
            | Self::InvitationCreated { id, .. }
            | Self::InvitationAccepted { id }
            | Self::InvitationRevoked { id } => *id,
            Self::MemberAdded { account_id, .. } | Self::MemberRemoved { account_id, .. } => {
                *account_id
            }
        }
    }
}

/// A persisted event record: a self-describing envelope around
/// a [`DomainEvent`] payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Id of the event itself.
    pub event_id: OpaqueId,

    /// Id of the aggregate.
    pub aggregate_id: OpaqueId,

    /// Per-aggregate sequence number, strictly increasing.
    pub sequence: i64,

    /// Stable type name of the payload.
    pub event_type: String,

    /// Json payload.
    pub payload: serde_json::Value,

    /// Instant at which the event was recorded.
    pub recorded_at: DateTime<Utc>,
}

impl EventRecord {
    /// Create an unsequenced record (sequence 0) for given
    /// event. The store assigns the authoritative sequence at
    /// append time.
    pub fn new(event: &DomainEvent) -> Self {
        Self {
            event_id: OpaqueId::generate(),
            aggregate_id: event.aggregate_id(),
            sequence: 0,
            event_type: event.event_type().to_owned(),
            payload: serde_json::to_value(event).expect("Event serialization must not fail."),
            recorded_at: Utc::now(),
        }
    }

    /// Decode the typed payload back out of this record.
    pub fn decode(&self) -> Result<DomainEvent, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}
