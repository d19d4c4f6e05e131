//! This crate provides the filesystem-backed resource repo of
//! kosha. Resource bytes live in a sharded directory layout
//! with json metadata sidecars; writes are atomic
//! (write-then-rename); reads can be streamed; and all access
//! to one resource id is serialized through an in-process
//! advisory locker.
//!

#![warn(missing_docs)]
#![cfg_attr(doc_cfg, feature(doc_auto_cfg))]
#![deny(unused_qualifications)]

pub mod fs_util;
pub mod locker;
pub mod store;

pub use store::{FsResourceStore, PutRecord, StoreError};
