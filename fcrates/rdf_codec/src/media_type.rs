//! I export static constants for media types of supported rdf
//! syntaxes.
//!

use mime::Mime;
use once_cell::sync::Lazy;

/// `text/turtle` media type.
pub static TEXT_TURTLE: Lazy<Mime> =
    Lazy::new(|| "text/turtle".parse().expect("Must be valid mime."));

/// `application/ld+json` media type.
pub static APPLICATION_JSON_LD: Lazy<Mime> =
    Lazy::new(|| "application/ld+json".parse().expect("Must be valid mime."));

/// `application/rdf+xml` media type.
pub static APPLICATION_RDF_XML: Lazy<Mime> =
    Lazy::new(|| "application/rdf+xml".parse().expect("Must be valid mime."));

/// Check if given media type corresponds to a supported rdf
/// syntax. Parameters are ignored.
pub fn is_rdf_media_type(media_type: &Mime) -> bool {
    crate::syntax::RdfSyntax::resolve_for_media_type(media_type).is_ok()
}
