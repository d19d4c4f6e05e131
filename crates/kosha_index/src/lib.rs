//! This crate provides the membership index of kosha.
//!
//! Container membership is never materialized as an in-memory
//! graph: it lives as rows in a sql edge table, resolved
//! lazily with pagination, filtering, sorting, and streaming.
//! A bounded ttl+lru cache keeps per-container member counts
//! and size sums, invalidated synchronously on every
//! mutation.
//!

#![warn(missing_docs)]
#![cfg_attr(doc_cfg, feature(doc_auto_cfg))]
#![deny(unused_qualifications)]

pub mod cache;
pub mod index;
pub mod options;

pub use cache::{ContainerStats, MokaStatCache, StatCache};
pub use index::{IndexError, MembershipIndex};
pub use options::{ListingOptions, MemberFilter, Pagination, SortDirection, SortField, SortSpec};
