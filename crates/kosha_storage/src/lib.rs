//! This crate provides the storage service of kosha: the
//! domain operations over resources and containers.
//!
//! The service orchestrates the rdf codec (representation
//! validation and conversion), the filesystem repo (bytes and
//! metadata), the membership index and stat cache (container
//! listings), and the event journal (the authoritative write
//! log).
//!

#![warn(missing_docs)]
#![cfg_attr(doc_cfg, feature(doc_auto_cfg))]
#![deny(unused_qualifications)]

pub mod error;
pub mod projection;
pub mod service;

pub use error::StorageError;
pub use projection::StatCacheInvalidator;
pub use service::{ContainerPage, ResourceContent, StorageService};
