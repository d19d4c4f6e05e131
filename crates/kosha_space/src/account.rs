//! I define the account, role, and membership model.
//!

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::OpaqueId;

/// Settings of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSettings {
    /// Whether members may be invited.
    pub allow_invitations: bool,

    /// Role granted to invited members by default.
    pub default_role_id: String,

    /// Maximum number of members, including the owner.
    pub max_members: u32,
}

impl Default for AccountSettings {
    fn default() -> Self {
        Self {
            allow_invitations: true,
            default_role_id: roles::MEMBER.into(),
            max_members: 100,
        }
    }
}

/// An account: a named grouping of users under one owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Id of the account.
    pub id: OpaqueId,

    /// Id of the owning user. Exactly one owner per account.
    pub owner_user_id: OpaqueId,

    /// Non-empty display name.
    pub name: String,

    /// Description.
    #[serde(default)]
    pub description: String,

    /// Settings.
    pub settings: AccountSettings,

    /// Creation instant.
    pub created_at: DateTime<Utc>,

    /// Last update instant.
    pub updated_at: DateTime<Utc>,
}

/// An error in validating account attributes.
#[derive(Debug, thiserror::Error)]
pub enum InvalidAccountError {
    /// Name is empty.
    #[error("Account name must not be empty.")]
    EmptyName,
}

impl Account {
    /// Validate creation attributes.
    pub fn validate_name(name: &str) -> Result<(), InvalidAccountError> {
        if name.trim().is_empty() {
            return Err(InvalidAccountError::EmptyName);
        }
        Ok(())
    }
}

/// A membership row binding a user to an account with a role.
/// `(account_id, user_id)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountMember {
    /// Id of the membership row.
    pub id: OpaqueId,

    /// Id of the account.
    pub account_id: OpaqueId,

    /// Id of the user.
    pub user_id: OpaqueId,

    /// Granted role.
    pub role_id: String,

    /// Inviting user, if the membership came from an
    /// invitation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invited_by: Option<OpaqueId>,

    /// Joining instant.
    pub joined_at: DateTime<Utc>,
}

/// A permission triple. `*` is a wildcard in any position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    /// Resource class the permission applies to.
    pub resource: String,

    /// Permitted action.
    pub action: String,

    /// Scope of the permission.
    pub scope: String,
}

impl Permission {
    /// Create a permission triple.
    pub fn new(
        resource: impl Into<String>,
        action: impl Into<String>,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            resource: resource.into(),
            action: action.into(),
            scope: scope.into(),
        }
    }

    fn component_matches(pattern: &str, value: &str) -> bool {
        pattern == "*" || pattern == value
    }

    /// Check whether this permission covers given triple.
    pub fn covers(&self, resource: &str, action: &str, scope: &str) -> bool {
        Self::component_matches(&self.resource, resource)
            && Self::component_matches(&self.action, action)
            && Self::component_matches(&self.scope, scope)
    }
}

/// A role: a named, immutable set of permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Id of the role. System role ids are well-known names.
    pub id: String,

    /// Display name.
    pub name: String,

    /// Permission set.
    pub permissions: Vec<Permission>,
}

impl Role {
    /// Check whether this role permits given triple.
    pub fn permits(&self, resource: &str, action: &str, scope: &str) -> bool {
        self.permissions
            .iter()
            .any(|p| p.covers(resource, action, scope))
    }
}

/// Well-known system role ids.
pub mod roles {
    /// The owner role id.
    pub const OWNER: &str = "owner";
    /// The admin role id.
    pub const ADMIN: &str = "admin";
    /// The member role id.
    pub const MEMBER: &str = "member";
    /// The viewer role id.
    pub const VIEWER: &str = "viewer";
}

/// The immutable system-provided role set.
pub fn system_roles() -> Vec<Role> {
    vec![
        Role {
            id: roles::OWNER.into(),
            name: "Owner".into(),
            permissions: vec![Permission::new("*", "*", "*")],
        },
        Role {
            id: roles::ADMIN.into(),
            name: "Administrator".into(),
            permissions: vec![
                Permission::new("account", "manage", "account"),
                Permission::new("member", "*", "account"),
                Permission::new("invitation", "*", "account"),
                Permission::new("resource", "*", "account"),
            ],
        },
        Role {
            id: roles::MEMBER.into(),
            name: "Member".into(),
            permissions: vec![
                Permission::new("resource", "read", "account"),
                Permission::new("resource", "write", "own"),
            ],
        },
        Role {
            id: roles::VIEWER.into(),
            name: "Viewer".into(),
            permissions: vec![Permission::new("resource", "read", "account")],
        },
    ]
}

#[cfg(test)]
mod tests {
    use claims::{assert_err, assert_ok};
    use rstest::rstest;

    use super::*;

    #[test]
    fn account_name_must_be_non_empty() {
        assert_ok!(Account::validate_name("research"));
        assert_err!(Account::validate_name(""));
        assert_err!(Account::validate_name("   "));
    }

    #[rstest]
    #[case(roles::OWNER, "anything", "whatever", "any", true)]
    #[case(roles::ADMIN, "member", "remove", "account", true)]
    #[case(roles::VIEWER, "resource", "read", "account", true)]
    #[case(roles::VIEWER, "resource", "write", "account", false)]
    #[case(roles::MEMBER, "resource", "write", "own", true)]
    #[case(roles::MEMBER, "resource", "write", "account", false)]
    fn system_role_permissions_evaluate(
        #[case] role_id: &str,
        #[case] resource: &str,
        #[case] action: &str,
        #[case] scope: &str,
        #[case] expected: bool,
    ) {
        let roles = system_roles();
        let role = roles.iter().find(|r| r.id == role_id).unwrap();
        assert_eq!(role.permits(resource, action, scope), expected);
    }

    #[test]
    fn system_role_set_is_complete() {
        let ids: Vec<_> = system_roles().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["owner", "admin", "member", "viewer"]);
    }
}
