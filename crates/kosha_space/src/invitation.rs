//! I define the invitation model and its state machine.
//!

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::OpaqueId;

/// Status of an invitation.
///
/// The only transitions are out of `Pending`:
/// `Pending → Accepted | Revoked | Expired`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    /// Awaiting a response.
    Pending,
    /// Accepted by the invited user.
    Accepted,
    /// Lapsed past its expiry.
    Expired,
    /// Withdrawn by the account.
    Revoked,
}

impl InvitationStatus {
    /// Stable string form, as persisted.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
        }
    }
}

impl std::str::FromStr for InvitationStatus {
    type Err = UnknownInvitationStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "expired" => Ok(Self::Expired),
            "revoked" => Ok(Self::Revoked),
            other => Err(UnknownInvitationStatusError(other.to_owned())),
        }
    }
}

/// An error for unknown invitation status discriminants.
#[derive(Debug, thiserror::Error)]
#[error("Unknown invitation status: {0}")]
pub struct UnknownInvitationStatusError(pub String);

/// An error for a disallowed invitation transition.
#[derive(Debug, thiserror::Error)]
#[error("Invitation cannot transition from {from:?} to {to:?}.")]
pub struct InvalidTransitionError {
    /// Current status.
    pub from: InvitationStatus,
    /// Requested status.
    pub to: InvitationStatus,
}

/// An invitation of an email address into an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invitation {
    /// Id of the invitation.
    pub id: OpaqueId,

    /// Id of the account.
    pub account_id: OpaqueId,

    /// Invited email.
    pub email: String,

    /// Role granted on acceptance.
    pub role_id: String,

    /// Globally unique opaque token, carried in the
    /// acceptance link.
    pub token: String,

    /// Inviting user.
    pub invited_by: OpaqueId,

    /// Current status.
    pub status: InvitationStatus,

    /// Expiry instant.
    pub expires_at: DateTime<Utc>,

    /// Creation instant.
    pub created_at: DateTime<Utc>,
}

impl Invitation {
    /// Accept the invitation. Only a pending invitation can be
    /// accepted, and only once.
    pub fn accept(&mut self) -> Result<(), InvalidTransitionError> {
        if self.status != InvitationStatus::Pending {
            return Err(InvalidTransitionError {
                from: self.status,
                to: InvitationStatus::Accepted,
            });
        }
        self.status = InvitationStatus::Accepted;
        Ok(())
    }

    /// Revoke the invitation. Anything but an accepted
    /// invitation can be revoked; revoking a revoked or
    /// expired invitation is a no-op.
    pub fn revoke(&mut self) -> Result<(), InvalidTransitionError> {
        if self.status == InvitationStatus::Accepted {
            return Err(InvalidTransitionError {
                from: self.status,
                to: InvitationStatus::Revoked,
            });
        }
        self.status = InvitationStatus::Revoked;
        Ok(())
    }

    /// Apply lapse-by-time: a pending invitation whose expiry
    /// has passed becomes expired. Returns whether the status
    /// changed.
    pub fn expire_if_due(&mut self, now: DateTime<Utc>) -> bool {
        if self.status == InvitationStatus::Pending && now >= self.expires_at {
            self.status = InvitationStatus::Expired;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use claims::{assert_err, assert_ok};

    use super::*;

    fn pending_invitation() -> Invitation {
        let now = Utc::now();
        Invitation {
            id: OpaqueId::generate(),
            account_id: OpaqueId::generate(),
            email: "bob@example.org".into(),
            role_id: "member".into(),
            token: "token".into(),
            invited_by: OpaqueId::generate(),
            status: InvitationStatus::Pending,
            expires_at: now + Duration::days(7),
            created_at: now,
        }
    }

    #[test]
    fn accept_succeeds_exactly_once() {
        let mut invitation = pending_invitation();
        assert_ok!(invitation.accept());
        assert_eq!(invitation.status, InvitationStatus::Accepted);
        assert_err!(invitation.accept());
    }

    #[test]
    fn accept_fails_from_every_non_pending_status() {
        for status in [
            InvitationStatus::Accepted,
            InvitationStatus::Expired,
            InvitationStatus::Revoked,
        ] {
            let mut invitation = pending_invitation();
            invitation.status = status;
            assert_err!(invitation.accept());
        }
    }

    #[test]
    fn revoke_fails_only_after_acceptance() {
        let mut invitation = pending_invitation();
        assert_ok!(invitation.revoke());

        let mut accepted = pending_invitation();
        accepted.accept().unwrap();
        assert_err!(accepted.revoke());
    }

    #[test]
    fn pending_expires_when_due() {
        let mut invitation = pending_invitation();
        let before = invitation.expires_at - Duration::seconds(1);
        assert!(!invitation.expire_if_due(before));
        assert_eq!(invitation.status, InvitationStatus::Pending);

        assert!(invitation.expire_if_due(invitation.expires_at));
        assert_eq!(invitation.status, InvitationStatus::Expired);

        // Already expired: no further change.
        assert!(!invitation.expire_if_due(invitation.expires_at));
    }
}
