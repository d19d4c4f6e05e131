//! I define the per-user file store.
//!

use std::{io, path::PathBuf};

use kosha_repo_fs::fs_util;
use kosha_space::{user::User, OpaqueId};
use tracing::debug;

use crate::error::AccountsError;

/// Name of the profile document in a user's directory.
const PROFILE_FILE: &str = "profile.json";

/// Name of the webid document in a user's directory.
const WEBID_FILE: &str = "webid.ttl";

/// A per-user directory store.
///
/// Each user owns `<base>/users/<user_id>/`, holding their
/// `profile.json` and `webid.ttl`. All writes are atomic
/// write-then-rename.
#[derive(Debug, Clone)]
pub struct UserFileStore {
    base: PathBuf,
}

impl UserFileStore {
    /// Create a new store rooted at given base directory.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    fn user_dir(&self, user_id: OpaqueId) -> PathBuf {
        self.base.join("users").join(user_id.to_string())
    }

    /// Write the profile document of given user.
    pub async fn write_profile(&self, user: &User) -> Result<(), AccountsError> {
        let dir = self.user_dir(user.id);
        fs_util::create_dir_all(&dir)
            .await
            .map_err(AccountsError::internal)?;

        let encoded =
            serde_json::to_vec_pretty(user).expect("Profile serialization must not fail.");
        fs_util::write_atomic(&dir.join(PROFILE_FILE), &encoded)
            .await
            .map_err(AccountsError::internal)
    }

    /// Write the webid turtle document of given user.
    pub async fn write_webid_document(
        &self,
        user_id: OpaqueId,
        document: &str,
    ) -> Result<(), AccountsError> {
        let dir = self.user_dir(user_id);
        fs_util::create_dir_all(&dir)
            .await
            .map_err(AccountsError::internal)?;
        fs_util::write_atomic(&dir.join(WEBID_FILE), document.as_bytes())
            .await
            .map_err(AccountsError::internal)
    }

    /// Load the stored profile of given user, if present.
    pub async fn load_profile(&self, user_id: OpaqueId) -> Result<Option<User>, AccountsError> {
        match tokio::fs::read(self.user_dir(user_id).join(PROFILE_FILE)).await {
            Ok(raw) => Ok(Some(
                serde_json::from_slice(&raw).map_err(AccountsError::internal)?,
            )),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AccountsError::internal(e)),
        }
    }

    /// Remove the whole directory of given user. Idempotent on
    /// a missing directory.
    pub async fn delete_user_data(&self, user_id: OpaqueId) -> Result<(), AccountsError> {
        match tokio::fs::remove_dir_all(self.user_dir(user_id)).await {
            Ok(()) => {
                debug!("Removed user data directory of {}.", user_id);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AccountsError::internal(e)),
        }
    }
}

// ----------------------------------------
//                                      tests
// ----------------------------------------

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use claims::assert_ok;
    use kosha_space::user::{UserProfile, UserStatus};

    use super::*;

    fn sample_user() -> User {
        let now = Utc::now();
        User {
            id: OpaqueId::generate(),
            webid: "https://pods.example.org/users/alice#me".into(),
            email: "alice@example.org".into(),
            profile: UserProfile {
                name: "Alice".into(),
                ..Default::default()
            },
            status: UserStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn profile_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let store = UserFileStore::new(dir.path());
        let user = sample_user();

        assert_ok!(store.write_profile(&user).await);
        let loaded = store.load_profile(user.id).await.unwrap();
        assert_eq!(loaded, Some(user));
    }

    #[tokio::test]
    async fn webid_document_lands_in_user_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = UserFileStore::new(dir.path());
        let user = sample_user();

        store
            .write_webid_document(user.id, "<#me> a <http://xmlns.com/foaf/0.1/Person>.")
            .await
            .unwrap();

        let path = dir
            .path()
            .join("users")
            .join(user.id.to_string())
            .join("webid.ttl");
        assert!(path.is_file());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = UserFileStore::new(dir.path());
        let user = sample_user();

        store.write_profile(&user).await.unwrap();
        assert_ok!(store.delete_user_data(user.id).await);
        assert_eq!(store.load_profile(user.id).await.unwrap(), None);
        // Second delete of the missing directory is fine.
        assert_ok!(store.delete_user_data(user.id).await);
    }
}
