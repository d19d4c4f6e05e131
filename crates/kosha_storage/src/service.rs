//! I define the storage service, with the resource and
//! container operations of the space.
//!

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use futures::{future::BoxFuture, stream::BoxStream, FutureExt, StreamExt, TryStreamExt};
use kosha_index::{ContainerStats, ListingOptions, MembershipIndex, Pagination, StatCache};
use kosha_journal::UnitOfWorkFactory;
use kosha_repo_fs::{FsResourceStore, PutRecord};
use kosha_space::{
    event::DomainEvent,
    resource::{MembershipEdge, ResourceMeta},
    OpaqueId,
};
use mime::Mime;
use rdf_codec::{conneg::Negotiator, convert::RdfConverter, media_type};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::StorageError;

/// A resource representation, as negotiated for one request.
#[derive(Debug, Clone)]
pub struct ResourceContent {
    /// Metadata of the resource.
    pub meta: ResourceMeta,

    /// Representation body, possibly converted from the stored
    /// syntax.
    pub body: Bytes,

    /// Media type of `body`.
    pub content_type: Mime,
}

/// One page of a container listing, with the container's
/// aggregate stats.
#[derive(Debug, Clone)]
pub struct ContainerPage {
    /// Id of the container.
    pub container_id: OpaqueId,

    /// Members of this page, with minimal metadata.
    pub members: Vec<MembershipEdge>,

    /// Total direct member count of the container.
    pub member_count: u64,

    /// Sum of direct member sizes.
    pub total_size: u64,
}

/// The storage service.
///
/// Orchestrates the codec, the filesystem repo, the membership
/// index, the stat cache, and the event journal into the
/// domain operations over resources and containers. All
/// operations are safe to invoke concurrently; writes to one
/// id serialize on the repo's per-id lock.
#[derive(Clone)]
pub struct StorageService {
    store: FsResourceStore,
    index: MembershipIndex,
    cache: Arc<dyn StatCache>,
    converter: RdfConverter,
    negotiator: Negotiator,
    uow_factory: UnitOfWorkFactory,
}

/// Page size used internally by deep deletion.
const DEEP_DELETE_PAGE: u32 = 100;

impl StorageService {
    /// Create a new service over given collaborators.
    pub fn new(
        store: FsResourceStore,
        index: MembershipIndex,
        cache: Arc<dyn StatCache>,
        uow_factory: UnitOfWorkFactory,
    ) -> Self {
        Self {
            store,
            index,
            cache,
            converter: RdfConverter::default(),
            negotiator: Negotiator::new(vec![
                media_type::APPLICATION_JSON_LD.clone(),
                media_type::TEXT_TURTLE.clone(),
                media_type::APPLICATION_RDF_XML.clone(),
            ]),
            uow_factory,
        }
    }

    /// Create a resource.
    ///
    /// Rdf bodies are parse-validated in their claimed syntax;
    /// other media types are stored opaquely. With a
    /// `requested_id`, creation is compare-and-create and
    /// fails on an occupied id. With a `parent_id`, the new
    /// resource is recorded as a member of that container.
    #[tracing::instrument(skip(self, body), fields(size = body.len()))]
    pub async fn create_resource(
        &self,
        parent_id: Option<OpaqueId>,
        body: Bytes,
        content_type: &Mime,
        requested_id: Option<OpaqueId>,
        name: Option<String>,
    ) -> Result<ResourceMeta, StorageError> {
        self.validate_body(&body, content_type).await?;

        if let Some(parent_id) = parent_id {
            self.ensure_container(parent_id).await?;
        }

        let id = requested_id.unwrap_or_else(OpaqueId::generate);
        let record = PutRecord {
            content_type: content_type.essence_str().to_owned(),
            parent_container_id: parent_id,
            is_container: false,
        };

        let meta = if requested_id.is_some() {
            self.store.put_if_absent(id, &body, record).await?
        } else {
            self.store.put(id, &body, record).await?
        };

        if let Some(parent_id) = parent_id {
            self.attach(parent_id, &meta, name).await?;
        }

        self.record(DomainEvent::ResourceCreated {
            id,
            parent_id,
            content_type: meta.content_type.clone(),
            size_bytes: meta.size_bytes,
            etag: meta.etag.clone(),
            is_container: false,
        })
        .await?;

        Ok(meta)
    }

    /// Create a container. A container's stored representation
    /// is a minimal json-ld document; its members live in the
    /// membership index only.
    #[tracing::instrument(skip(self))]
    pub async fn create_container(
        &self,
        parent_id: Option<OpaqueId>,
        requested_id: Option<OpaqueId>,
        name: Option<String>,
    ) -> Result<ResourceMeta, StorageError> {
        if let Some(parent_id) = parent_id {
            self.ensure_container(parent_id).await?;
        }

        let id = requested_id.unwrap_or_else(OpaqueId::generate);
        let body = container_representation(&id);
        let record = PutRecord {
            content_type: media_type::APPLICATION_JSON_LD.essence_str().to_owned(),
            parent_container_id: parent_id,
            is_container: true,
        };

        let meta = if requested_id.is_some() {
            self.store.put_if_absent(id, &body, record).await?
        } else {
            self.store.put(id, &body, record).await?
        };

        if let Some(parent_id) = parent_id {
            self.attach(parent_id, &meta, name).await?;
        }

        self.record(DomainEvent::ResourceCreated {
            id,
            parent_id,
            content_type: meta.content_type.clone(),
            size_bytes: meta.size_bytes,
            etag: meta.etag.clone(),
            is_container: true,
        })
        .await?;

        Ok(meta)
    }

    /// Get a resource representation, negotiated against given
    /// accept header.
    ///
    /// Rdf-stored resources are converted into the negotiated
    /// syntax; other resources are served as stored, ignoring
    /// accept.
    #[tracing::instrument(skip(self))]
    pub async fn get_resource(
        &self,
        id: OpaqueId,
        accept: Option<&str>,
    ) -> Result<ResourceContent, StorageError> {
        let (body, meta) = self.store.get(id).await?;

        let stored_type: Mime = meta
            .content_type
            .parse()
            .unwrap_or(mime::APPLICATION_OCTET_STREAM);

        if !self.converter.is_supported(&stored_type) {
            return Ok(ResourceContent {
                meta,
                body,
                content_type: stored_type,
            });
        }

        let chosen = self
            .negotiator
            .negotiate(accept)
            .map_err(|_| StorageError::NotAcceptable)?;

        let body = if chosen.essence_str() == stored_type.essence_str() {
            body
        } else {
            debug!("Converting {} from {} to {}.", id, stored_type, chosen);
            Bytes::from(
                self.converter
                    .convert_async(body.to_vec(), stored_type, chosen.clone())
                    .await?,
            )
        };

        Ok(ResourceContent {
            meta,
            body,
            content_type: chosen,
        })
    }

    /// Create-or-replace the representation of given id.
    /// Returns the stored metadata, and whether the resource
    /// was created (as opposed to replaced).
    #[tracing::instrument(skip(self, body), fields(size = body.len()))]
    pub async fn update_resource(
        &self,
        id: OpaqueId,
        body: Bytes,
        content_type: &Mime,
    ) -> Result<(ResourceMeta, bool), StorageError> {
        self.validate_body(&body, content_type).await?;

        let existing = match self.store.get_meta(id).await {
            Ok(meta) => Some(meta),
            Err(kosha_repo_fs::StoreError::NotFound { .. }) => None,
            Err(e) => return Err(e.into()),
        };
        let created = existing.is_none();

        let meta = self
            .store
            .put(
                id,
                &body,
                PutRecord {
                    content_type: content_type.essence_str().to_owned(),
                    parent_container_id: existing.as_ref().and_then(|m| m.parent_container_id),
                    is_container: existing.as_ref().map(|m| m.is_container).unwrap_or(false),
                },
            )
            .await?;

        // Refresh the parent's view of this member.
        if let Some(parent_id) = meta.parent_container_id {
            self.attach(parent_id, &meta, None).await?;
        }

        let event = if created {
            DomainEvent::ResourceCreated {
                id,
                parent_id: meta.parent_container_id,
                content_type: meta.content_type.clone(),
                size_bytes: meta.size_bytes,
                etag: meta.etag.clone(),
                is_container: meta.is_container,
            }
        } else {
            DomainEvent::ResourceUpdated {
                id,
                content_type: meta.content_type.clone(),
                size_bytes: meta.size_bytes,
                etag: meta.etag.clone(),
            }
        };
        self.record(event).await?;

        Ok((meta, created))
    }

    /// Delete given resource.
    ///
    /// A container with members fails with
    /// [`ContainerNotEmpty`](StorageError::ContainerNotEmpty)
    /// unless `deep` is set, in which case descendants are
    /// deleted bottom-up, best-effort, one event per
    /// descendant.
    #[tracing::instrument(skip(self))]
    pub async fn delete_resource(
        &self,
        id: OpaqueId,
        deep: bool,
        cancel: CancellationToken,
    ) -> Result<(), StorageError> {
        let meta = self.store.get_meta(id).await?;

        if meta.is_container {
            let (member_count, _) = self.index.stats(id).await?;
            if member_count > 0 {
                if !deep {
                    return Err(StorageError::ContainerNotEmpty { id });
                }
                self.delete_descendants(id, cancel).await?;
            }
        }

        self.delete_leaf(&meta).await
    }

    /// Delete a resource that has no members left.
    async fn delete_leaf(&self, meta: &ResourceMeta) -> Result<(), StorageError> {
        let id = meta.id;

        if let Some(parent_id) = meta.parent_container_id {
            self.index.remove_member(parent_id, id).await?;
            self.cache.invalidate(parent_id).await;
        }

        self.store.delete(id).await?;
        self.cache.invalidate(id).await;

        self.record(DomainEvent::ResourceDeleted {
            id,
            parent_id: meta.parent_container_id,
        })
        .await?;
        Ok(())
    }

    /// Delete all descendants of given container, bottom-up.
    fn delete_descendants(
        &self,
        container_id: OpaqueId,
        cancel: CancellationToken,
    ) -> BoxFuture<'_, Result<(), StorageError>> {
        async move {
            loop {
                if cancel.is_cancelled() {
                    warn!("Deep delete of {} cancelled.", container_id);
                    return Err(StorageError::Cancelled);
                }

                // Always re-fetch the first page: deletions
                // shift the listing under us.
                let page = self
                    .index
                    .list_members(
                        container_id,
                        &ListingOptions {
                            pagination: Pagination::new(DEEP_DELETE_PAGE, 0),
                            ..Default::default()
                        },
                    )
                    .await?;
                if page.is_empty() {
                    return Ok(());
                }

                for edge in page {
                    let member_meta = match self.store.get_meta(edge.member_id).await {
                        Ok(meta) => meta,
                        Err(kosha_repo_fs::StoreError::NotFound { .. }) => {
                            // Orphan edge: the log already has
                            // the deletion; drop the row.
                            self.index
                                .remove_member(container_id, edge.member_id)
                                .await?;
                            continue;
                        }
                        Err(e) => return Err(e.into()),
                    };

                    if member_meta.is_container {
                        self.delete_descendants(member_meta.id, cancel.clone())
                            .await?;
                    }
                    self.delete_leaf(&member_meta).await?;
                }
            }
        }
        .boxed()
    }

    /// List one page of given container, with aggregate stats.
    #[tracing::instrument(skip(self, options))]
    pub async fn list_container(
        &self,
        id: OpaqueId,
        options: &ListingOptions,
    ) -> Result<ContainerPage, StorageError> {
        self.ensure_container(id).await?;

        let members = self.index.list_members(id, options).await?;
        let stats = match self.cache.get(id).await {
            Some(stats) => stats,
            None => {
                let (member_count, total_size) = self.index.stats(id).await?;
                let stats = ContainerStats {
                    member_count,
                    total_size,
                    cached_at: Utc::now(),
                };
                self.cache.set(id, stats).await;
                stats
            }
        };

        Ok(ContainerPage {
            container_id: id,
            members,
            member_count: stats.member_count,
            total_size: stats.total_size,
        })
    }

    /// Stream the members of given container lazily.
    #[tracing::instrument(skip(self, options))]
    pub async fn stream_container(
        &self,
        id: OpaqueId,
        options: ListingOptions,
        cancel: CancellationToken,
    ) -> Result<BoxStream<'static, Result<MembershipEdge, StorageError>>, StorageError> {
        self.ensure_container(id).await?;
        Ok(self
            .index
            .stream_members(id, options, cancel)
            .map_err(StorageError::from)
            .boxed())
    }

    /// Check that an rdf-claimed body parses; opaque bodies
    /// pass through.
    async fn validate_body(&self, body: &Bytes, content_type: &Mime) -> Result<(), StorageError> {
        if self.converter.is_supported(content_type) {
            self.converter
                .check_async(body.to_vec(), content_type.clone())
                .await?;
        }
        Ok(())
    }

    /// Resolve given id, requiring it to be a container.
    async fn ensure_container(&self, id: OpaqueId) -> Result<ResourceMeta, StorageError> {
        let meta = self.store.get_meta(id).await?;
        if !meta.is_container {
            return Err(StorageError::InvalidArgument {
                message: format!("Resource {} is not a container.", id),
            });
        }
        Ok(meta)
    }

    /// Record given member under its parent, and invalidate
    /// the parent's cached stats.
    async fn attach(
        &self,
        parent_id: OpaqueId,
        meta: &ResourceMeta,
        name: Option<String>,
    ) -> Result<(), StorageError> {
        self.index
            .add_member(&MembershipEdge {
                parent_id,
                member_id: meta.id,
                member_kind: meta.member_kind(),
                joined_at: meta.updated_at,
                content_type: meta.content_type.clone(),
                size_bytes: meta.size_bytes,
                name: name.unwrap_or_else(|| meta.id.to_string()),
            })
            .await?;
        self.cache.invalidate(parent_id).await;
        Ok(())
    }

    /// Commit given event through a fresh unit of work.
    async fn record(&self, event: DomainEvent) -> Result<(), StorageError> {
        let mut uow = self.uow_factory.begin();
        uow.register(&event);
        uow.commit().await?;
        Ok(())
    }
}

/// Minimal stored representation of a container.
fn container_representation(id: &OpaqueId) -> Bytes {
    let doc = serde_json::json!({
        "@id": format!("urn:kosha:container:{}", id),
        "@type": ["http://www.w3.org/ns/ldp#BasicContainer"],
    });
    Bytes::from(serde_json::to_vec(&doc).expect("Container doc serialization must not fail."))
}

// ----------------------------------------
//                                      tests
// ----------------------------------------
