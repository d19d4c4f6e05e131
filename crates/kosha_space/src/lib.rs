//! This crate defines the domain model of kosha storage
//! spaces: opaque sortable ids, resource and container
//! metadata, membership edges, domain events, and the
//! user/account model with its pure state machines.
//!

#![warn(missing_docs)]
#![cfg_attr(doc_cfg, feature(doc_auto_cfg))]
#![deny(unused_qualifications)]

pub mod account;
pub mod event;
pub mod id;
pub mod invitation;
pub mod resource;
pub mod user;

pub use id::OpaqueId;
