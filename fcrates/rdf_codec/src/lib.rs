//! This crate provides sophia-based rdf parsers and serializers
//! that can be instantiated against any of the supported concrete
//! syntaxes dynamically at run time.
//!
//! On top of them, it provides whole-document conversion between
//! syntaxes, and http content negotiation (RFC 7231) over the
//! corresponding media types.
//!

#![warn(missing_docs)]
#![cfg_attr(doc_cfg, feature(doc_auto_cfg))]
#![deny(unused_qualifications)]

pub mod conneg;
pub mod convert;
pub mod file_extension;
pub mod media_type;
pub mod parser;
pub mod serializer;
pub mod syntax;

use std::collections::HashSet;

use sophia_api::{quad::Spog, term::SimpleTerm};

/// Type of in-memory rdf graphs, as collected from any of the
/// dynsyn parsers.
pub type LightGraph = HashSet<[SimpleTerm<'static>; 3]>;

/// Type of in-memory rdf datasets, as collected from the
/// dataset-encoding parsers.
pub type LightDataset = HashSet<Spog<SimpleTerm<'static>>>;
