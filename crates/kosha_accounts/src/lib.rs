//! This crate provides the user and account subsystem of
//! kosha.
//!
//! Write models validate and emit domain events through the
//! journal; read models are relational projections fronted by
//! a bounded ttl+lru cache, invalidated by the write side
//! after each successful commit. Webids are minted and
//! serialized as turtle profile documents; each user also owns
//! an atomic per-user file directory.
//!

#![warn(missing_docs)]
#![cfg_attr(doc_cfg, feature(doc_auto_cfg))]
#![deny(unused_qualifications)]

pub mod error;
pub mod files;
pub mod read;
pub mod schema;
pub mod webid;
pub mod write;

pub use error::AccountsError;
pub use read::{AccountReadRepo, RoleRepo, UserListFilter, UserReadRepo};
pub use webid::{WebIdGenerator, WebIdOccupancy};
pub use write::{AccountWriteRepo, InvitationRepo, NewAccount, NewUser, UserWriteRepo};
