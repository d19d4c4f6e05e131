//! This crate provides the event journal of kosha.
//!
//! Domain events are the source of truth for write
//! operations. The [`EventStore`](store::EventStore) appends
//! self-describing records to an append-only sqlite log; a
//! [`UnitOfWork`](uow::UnitOfWork) collects the events of one
//! request and commits them under a single transaction; after
//! a successful commit, the
//! [`EventDispatcher`](dispatch::EventDispatcher) invokes the
//! registered projection handlers synchronously.
//!

#![warn(missing_docs)]
#![cfg_attr(doc_cfg, feature(doc_auto_cfg))]
#![deny(unused_qualifications)]

pub mod dispatch;
pub mod store;
pub mod uow;

pub use dispatch::{EventDispatcher, EventHandler};
pub use store::{EventStore, EventStoreError};
pub use uow::{UnitOfWork, UnitOfWorkFactory};
