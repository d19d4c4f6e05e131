//! I provide filesystem helpers shared by the stores: atomic
//! writes with tmp-file hygiene, and permission handling.
//!

use std::{io, path::Path};

use tracing::warn;

/// Permissions applied to written files, on unix.
pub const FILE_MODE: u32 = 0o644;

/// Permissions applied to created directories, on unix.
pub const DIR_MODE: u32 = 0o755;

/// A guard that unlinks a tmp file unless disarmed. Covers
/// every early-exit path of an atomic write, including task
/// cancellation.
struct TmpFileGuard<'p> {
    path: &'p Path,
    armed: bool,
}

impl Drop for TmpFileGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = std::fs::remove_file(self.path) {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!("Error in removing tmp file {:?}. {}", self.path, e);
                }
            }
        }
    }
}

/// Recursively create given directory with [`DIR_MODE`]
/// permissions.
pub async fn create_dir_all(dir: &Path) -> io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(dir, std::fs::Permissions::from_mode(DIR_MODE)).await?;
    }
    Ok(())
}

/// Write given bytes to given path atomically: write to a
/// sibling `.tmp` file, set [`FILE_MODE`] permissions, then
/// rename over the destination. The tmp file never survives an
/// error.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp_path = path.with_extension(format!(
        "{}tmp",
        path.extension()
            .map(|e| format!("{}.", e.to_string_lossy()))
            .unwrap_or_default()
    ));

    let mut guard = TmpFileGuard {
        path: &tmp_path,
        armed: true,
    };

    tokio::fs::write(&tmp_path, bytes).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(FILE_MODE)).await?;
    }

    tokio::fs::rename(&tmp_path, path).await?;
    guard.armed = false;
    Ok(())
}

// ----------------------------------------
//                                      tests
// ----------------------------------------

#[cfg(test)]
mod tests {
    use claims::assert_ok;

    use super::*;

    #[tokio::test]
    async fn atomic_write_lands_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        assert_ok!(write_atomic(&path, b"{\"a\":1}").await);
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"{\"a\":1}");
    }

    #[tokio::test]
    async fn atomic_write_replaces_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc");
        write_atomic(&path, b"one").await.unwrap();
        write_atomic(&path, b"two").await.unwrap();
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"two");
    }

    #[tokio::test]
    async fn no_tmp_file_survives() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        write_atomic(&path, b"x").await.unwrap();

        let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(names, vec!["doc.json"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn written_files_have_expected_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc");
        write_atomic(&path, b"x").await.unwrap();

        let mode = tokio::fs::metadata(&path).await.unwrap().permissions().mode();
        assert_eq!(mode & 0o777, FILE_MODE);
    }
}
