//! I define a struct for rdf concrete syntaxes, and export
//! constants for the syntaxes this crate can handle.
//!

use std::fmt::Display;

use mime::Mime;

use crate::media_type;

/// A concrete rdf syntax, in which rdf graphs can be
/// unambiguously serialized. See
/// [rdf documents](https://www.w3.org/TR/rdf11-concepts/#rdf-documents).
///
/// The inner identifier is the syntax's spec uri. The field is
/// private, so that values of this type can only be the constants
/// exported by [`syntax`](self) module, and matches over them can
/// treat the set as closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RdfSyntax(&'static str);

impl Display for RdfSyntax {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// RDF 1.1 Turtle: Terse RDF Triple Language
///
/// Spec: [http://www.w3.org/TR/turtle/](http://www.w3.org/TR/turtle/)
pub const TURTLE: RdfSyntax = RdfSyntax("http://www.w3.org/TR/turtle/");

/// RDF 1.1 XML Syntax
///
/// Spec: [https://www.w3.org/TR/rdf-syntax-grammar/](https://www.w3.org/TR/rdf-syntax-grammar/)
pub const RDF_XML: RdfSyntax = RdfSyntax("https://www.w3.org/TR/rdf-syntax-grammar/");

/// JSON-LD 1.1: A JSON-based Serialization for Linked Data
///
/// Spec: [https://www.w3.org/TR/json-ld/](https://www.w3.org/TR/json-ld/)
pub const JSON_LD: RdfSyntax = RdfSyntax("https://www.w3.org/TR/json-ld/");

/// All syntaxes this crate can parse and serialize, in server
/// preference order.
pub const ALL: [RdfSyntax; 3] = [JSON_LD, TURTLE, RDF_XML];

/// An error indicating, given media type doesn't correspond to
/// any supported rdf syntax.
#[derive(Debug, thiserror::Error)]
#[error("Unsupported media type: {0}")]
pub struct UnsupportedMediaTypeError(pub Mime);

impl RdfSyntax {
    /// Resolve the syntax corresponding to given media type.
    /// Media type parameters are not significant for the
    /// correspondence.
    pub fn resolve_for_media_type(media_type: &Mime) -> Result<Self, UnsupportedMediaTypeError> {
        let essence = media_type.essence_str();
        if essence == media_type::TEXT_TURTLE.essence_str() {
            Ok(TURTLE)
        } else if essence == media_type::APPLICATION_JSON_LD.essence_str() {
            Ok(JSON_LD)
        } else if essence == media_type::APPLICATION_RDF_XML.essence_str() {
            Ok(RDF_XML)
        } else {
            Err(UnsupportedMediaTypeError(media_type.clone()))
        }
    }

    /// Get the preferred media type for this syntax.
    pub fn media_type(&self) -> &'static Mime {
        match *self {
            TURTLE => &media_type::TEXT_TURTLE,
            JSON_LD => &media_type::APPLICATION_JSON_LD,
            RDF_XML => &media_type::APPLICATION_RDF_XML,
            // Constants are the only inhabitants.
            _ => unreachable!(),
        }
    }
}
