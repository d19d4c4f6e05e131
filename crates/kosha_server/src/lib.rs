//! This crate provides the kosha server: the http adapter
//! over the storage and accounts services.
//!
//! The adapter translates http verbs, paths, and headers into
//! service calls, negotiates rdf representation formats, maps
//! domain errors onto a stable wire taxonomy, and carries the
//! cross-cutting middleware: cors, request timeout, request
//! tracing, and panic recovery.
//!

#![warn(missing_docs)]
#![cfg_attr(doc_cfg, feature(doc_auto_cfg))]
#![deny(unused_qualifications)]

pub mod app;
pub mod config;
pub mod error;
pub mod routes;
pub mod serve;
pub mod state;

pub use app::build_router;
pub use config::AppConfig;
pub use state::AppState;
