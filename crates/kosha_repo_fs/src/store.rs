//! I define the filesystem resource store.
//!

use std::{io, path::PathBuf, sync::Arc};

use bytes::Bytes;
use chrono::Utc;
use kosha_space::{resource::ResourceMeta, OpaqueId};
use sha2::{Digest, Sha256};
use tokio_util::io::ReaderStream;
use tracing::{debug, error};

use crate::{fs_util, locker::NameLocker};

/// An error from the resource store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No resource with given id exists.
    #[error("No resource exists with id {id}.")]
    NotFound {
        /// Requested id.
        id: OpaqueId,
    },

    /// A resource with given id already exists.
    #[error("A resource already exists with id {id}.")]
    AlreadyExists {
        /// Requested id.
        id: OpaqueId,
    },

    /// Metadata sidecar of the resource doesn't deserialize.
    #[error("Corrupt metadata sidecar for resource {id}.")]
    CorruptMeta {
        /// Id of the resource.
        id: OpaqueId,
        /// Deserialization error.
        #[source]
        source: serde_json::Error,
    },

    /// Unknown io error.
    #[error("Io error in accessing resource {id}.")]
    Io {
        /// Id of the resource.
        id: OpaqueId,
        /// Io error.
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    fn io(id: OpaqueId, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            Self::NotFound { id }
        } else {
            Self::Io { id, source }
        }
    }
}

/// Write-time attributes of a resource representation. The
/// store derives the rest of the metadata (etag, size,
/// timestamps) itself.
#[derive(Debug, Clone)]
pub struct PutRecord {
    /// Media type of the representation.
    pub content_type: String,

    /// Parent container, if the resource is contained.
    pub parent_container_id: Option<OpaqueId>,

    /// Whether the resource is a container.
    pub is_container: bool,
}

/// A filesystem-backed resource store.
///
/// Resource bytes live at `<base>/resources/<shard>/<id>`,
/// where the shard is the first two characters of the id, with
/// a `<id>.meta.json` sidecar next to them. All writes are
/// atomic (tmp file + rename), and all access to one id is
/// serialized through a per-id advisory lock; the last writer
/// wins and yields a fresh etag.
#[derive(Debug, Clone)]
pub struct FsResourceStore {
    base: PathBuf,
    locker: Arc<NameLocker<OpaqueId>>,
}

impl FsResourceStore {
    /// Create a new store rooted at given base directory.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            locker: Arc::new(NameLocker::new()),
        }
    }

    /// Get the advisory locker of this store.
    #[inline]
    pub fn locker(&self) -> &Arc<NameLocker<OpaqueId>> {
        &self.locker
    }

    /// Compute the strong etag of given bytes: quoted hex
    /// sha-256.
    pub fn etag_of(bytes: &[u8]) -> String {
        format!("\"{}\"", hex::encode(Sha256::digest(bytes)))
    }

    fn shard_dir(&self, id: &OpaqueId) -> PathBuf {
        self.base.join("resources").join(id.shard())
    }

    fn data_path(&self, id: &OpaqueId) -> PathBuf {
        self.shard_dir(id).join(id.to_string())
    }

    fn meta_path(&self, id: &OpaqueId) -> PathBuf {
        self.shard_dir(id).join(format!("{}.meta.json", id))
    }

    /// Read the metadata sidecar, outside any lock.
    async fn read_meta(&self, id: OpaqueId) -> Result<ResourceMeta, StoreError> {
        let raw = tokio::fs::read(self.meta_path(&id))
            .await
            .map_err(|e| StoreError::io(id, e))?;
        serde_json::from_slice(&raw).map_err(|e| {
            error!("Corrupt metadata sidecar for resource {}.", id);
            StoreError::CorruptMeta { id, source: e }
        })
    }

    /// Store given bytes as the representation of given id,
    /// creating or replacing it. Returns the stored metadata,
    /// carrying the fresh etag.
    #[tracing::instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn put(
        &self,
        id: OpaqueId,
        bytes: &[u8],
        record: PutRecord,
    ) -> Result<ResourceMeta, StoreError> {
        let _guard = self.locker.lock_exclusive(id).await;
        self.put_locked(id, bytes, record).await
    }

    /// Compare-and-create: store given bytes under given id
    /// only if no resource with the id exists yet.
    #[tracing::instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn put_if_absent(
        &self,
        id: OpaqueId,
        bytes: &[u8],
        record: PutRecord,
    ) -> Result<ResourceMeta, StoreError> {
        let _guard = self.locker.lock_exclusive(id).await;
        if tokio::fs::try_exists(self.meta_path(&id))
            .await
            .map_err(|e| StoreError::io(id, e))?
        {
            return Err(StoreError::AlreadyExists { id });
        }
        self.put_locked(id, bytes, record).await
    }

    /// Write body and sidecar, under an already-held exclusive
    /// lock on the id.
    async fn put_locked(
        &self,
        id: OpaqueId,
        bytes: &[u8],
        record: PutRecord,
    ) -> Result<ResourceMeta, StoreError> {

        // Preserve the creation instant across replacements.
        let existing = match self.read_meta(id).await {
            Ok(meta) => Some(meta),
            Err(StoreError::NotFound { .. }) => None,
            Err(e) => return Err(e),
        };

        fs_util::create_dir_all(&self.shard_dir(&id))
            .await
            .map_err(|e| StoreError::io(id, e))?;

        fs_util::write_atomic(&self.data_path(&id), bytes)
            .await
            .map_err(|e| StoreError::io(id, e))?;

        let now = Utc::now();
        let meta = ResourceMeta {
            id,
            content_type: record.content_type,
            etag: Self::etag_of(bytes),
            size_bytes: bytes.len() as u64,
            created_at: existing.as_ref().map(|m| m.created_at).unwrap_or(now),
            updated_at: now,
            parent_container_id: record
                .parent_container_id
                .or(existing.as_ref().and_then(|m| m.parent_container_id)),
            is_container: record.is_container,
        };

        let encoded =
            serde_json::to_vec_pretty(&meta).expect("Metadata serialization must not fail.");
        fs_util::write_atomic(&self.meta_path(&id), &encoded)
            .await
            .map_err(|e| StoreError::io(id, e))?;

        debug!("Stored resource {} with etag {}.", id, meta.etag);
        Ok(meta)
    }

    /// Get the representation bytes and metadata of given id.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, id: OpaqueId) -> Result<(Bytes, ResourceMeta), StoreError> {
        let _guard = self.locker.lock_shared(id).await;
        let meta = self.read_meta(id).await?;
        let bytes = tokio::fs::read(self.data_path(&id))
            .await
            .map_err(|e| StoreError::io(id, e))?;
        Ok((Bytes::from(bytes), meta))
    }

    /// Get only the metadata of given id.
    #[tracing::instrument(skip(self))]
    pub async fn get_meta(&self, id: OpaqueId) -> Result<ResourceMeta, StoreError> {
        let _guard = self.locker.lock_shared(id).await;
        self.read_meta(id).await
    }

    /// Open a byte stream over the representation of given id.
    /// The stream owns its file handle, and releases it when
    /// dropped.
    #[tracing::instrument(skip(self))]
    pub async fn stream(
        &self,
        id: OpaqueId,
    ) -> Result<(ResourceMeta, ReaderStream<tokio::fs::File>), StoreError> {
        let _guard = self.locker.lock_shared(id).await;
        let meta = self.read_meta(id).await?;
        let file = tokio::fs::File::open(self.data_path(&id))
            .await
            .map_err(|e| StoreError::io(id, e))?;
        Ok((meta, ReaderStream::new(file)))
    }

    /// Check whether a resource with given id exists.
    pub async fn exists(&self, id: OpaqueId) -> Result<bool, StoreError> {
        tokio::fs::try_exists(self.meta_path(&id))
            .await
            .map_err(|e| StoreError::io(id, e))
    }

    /// Delete the resource with given id, returning its last
    /// metadata. A repeated delete returns `NotFound`.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: OpaqueId) -> Result<ResourceMeta, StoreError> {
        let _guard = self.locker.lock_exclusive(id).await;
        let meta = self.read_meta(id).await?;

        match tokio::fs::remove_file(self.data_path(&id)).await {
            Ok(()) => {}
            // A missing data file is tolerated; the sidecar is
            // the existence marker.
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::io(id, e)),
        }
        tokio::fs::remove_file(self.meta_path(&id))
            .await
            .map_err(|e| StoreError::io(id, e))?;

        debug!("Deleted resource {}.", id);
        Ok(meta)
    }
}

// ----------------------------------------
//                                      tests
// ----------------------------------------
