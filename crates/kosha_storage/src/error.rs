//! I define the error type of the storage service.
//!

use kosha_space::OpaqueId;

/// An error from the storage service.
///
/// Variants carry the offending id where one exists; the http
/// adapter maps each variant onto a stable wire code.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// No resource with given id.
    #[error("No resource exists with id {id}.")]
    ResourceNotFound {
        /// Requested id.
        id: OpaqueId,
    },

    /// A resource with the requested id already exists.
    #[error("A resource already exists with id {id}.")]
    AlreadyExists {
        /// Requested id.
        id: OpaqueId,
    },

    /// Container has members, and deep delete was not
    /// requested.
    #[error("Container {id} is not empty.")]
    ContainerNotEmpty {
        /// Id of the container.
        id: OpaqueId,
    },

    /// Body doesn't parse in its claimed rdf syntax.
    #[error("Invalid rdf body. {message}")]
    InvalidRdf {
        /// Parse failure detail.
        message: String,
    },

    /// Requested representation format is not supported.
    #[error("Unsupported format: {content_type}.")]
    UnsupportedFormat {
        /// The unsupported media type.
        content_type: String,
    },

    /// No acceptable representation for the request's accept
    /// header.
    #[error("No representation satisfies the accept header.")]
    NotAcceptable,

    /// Invalid operation argument.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Validation detail.
        message: String,
    },

    /// Operation abandoned on request cancellation.
    #[error("Operation cancelled.")]
    Cancelled,

    /// Unknown internal error.
    #[error("Internal storage error.")]
    Internal {
        /// Source error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

impl StorageError {
    /// Wrap an unknown error as internal.
    pub fn internal(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Internal {
            source: Box::new(source),
        }
    }
}

impl From<kosha_repo_fs::StoreError> for StorageError {
    fn from(e: kosha_repo_fs::StoreError) -> Self {
        match e {
            kosha_repo_fs::StoreError::NotFound { id } => Self::ResourceNotFound { id },
            kosha_repo_fs::StoreError::AlreadyExists { id } => Self::AlreadyExists { id },
            other => Self::internal(other),
        }
    }
}

impl From<kosha_index::IndexError> for StorageError {
    fn from(e: kosha_index::IndexError) -> Self {
        Self::internal(e)
    }
}

impl From<kosha_journal::EventStoreError> for StorageError {
    fn from(e: kosha_journal::EventStoreError) -> Self {
        Self::internal(e)
    }
}

impl From<rdf_codec::convert::ConvertError> for StorageError {
    fn from(e: rdf_codec::convert::ConvertError) -> Self {
        use rdf_codec::convert::ConvertError;
        match e {
            ConvertError::UnsupportedMediaType(e) => Self::UnsupportedFormat {
                content_type: e.0.to_string(),
            },
            ConvertError::InvalidRdf(e) => Self::InvalidRdf {
                message: e.to_string(),
            },
            ConvertError::Serialization(e) => Self::internal(e),
        }
    }
}
