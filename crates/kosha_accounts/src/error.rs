//! I define the error type of the accounts subsystem.
//!

use kosha_space::invitation::InvalidTransitionError;

/// An error from the accounts subsystem.
#[derive(Debug, thiserror::Error)]
pub enum AccountsError {
    /// No entity of given kind with given key.
    #[error("No {entity} exists for {key}.")]
    NotFound {
        /// Entity kind.
        entity: &'static str,
        /// Lookup key.
        key: String,
    },

    /// A uniqueness constraint would be violated.
    #[error("A {entity} already exists for {key}.")]
    AlreadyExists {
        /// Entity kind.
        entity: &'static str,
        /// Conflicting key.
        key: String,
    },

    /// Validation failure.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Validation detail.
        message: String,
    },

    /// Disallowed invitation transition.
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransitionError),

    /// No free webid could be minted.
    #[error("Webid space exhausted for {base}.")]
    WebIdSpaceExhausted {
        /// The contended webid base.
        base: String,
    },

    /// Underlying database error.
    #[error("Database error in accounts subsystem.")]
    Db(#[from] sqlx::Error),

    /// Unknown internal error.
    #[error("Internal accounts error.")]
    Internal {
        /// Source error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

impl AccountsError {
    /// Wrap an unknown error as internal.
    pub fn internal(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Internal {
            source: Box::new(source),
        }
    }

    pub(crate) fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub(crate) fn already_exists(entity: &'static str, key: impl ToString) -> Self {
        Self::AlreadyExists {
            entity,
            key: key.to_string(),
        }
    }

    pub(crate) fn invalid(message: impl ToString) -> Self {
        Self::InvalidArgument {
            message: message.to_string(),
        }
    }
}

impl From<kosha_journal::EventStoreError> for AccountsError {
    fn from(e: kosha_journal::EventStoreError) -> Self {
        Self::internal(e)
    }
}
