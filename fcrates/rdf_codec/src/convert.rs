//! I define a converter over whole rdf documents, between any
//! pair of supported syntaxes.
//!

use std::io;

use mime::Mime;
use sophia_api::{prelude::Iri, serializer::Stringifier};
use tracing::error;

use crate::{
    parser::{DynRdfParser, RdfParseError},
    serializer::DynRdfSerializer,
    syntax::{RdfSyntax, UnsupportedMediaTypeError},
};

/// An error in converting an rdf document.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    /// A media type doesn't correspond to a supported syntax.
    #[error(transparent)]
    UnsupportedMediaType(#[from] UnsupportedMediaTypeError),

    /// Source document is not valid in its claimed syntax.
    #[error("Invalid rdf document. {0}")]
    InvalidRdf(#[from] RdfParseError),

    /// Error in serializing the parsed graph.
    #[error("Error in serializing the graph. {0}")]
    Serialization(#[from] io::Error),
}

/// A converter over whole rdf documents.
///
/// Conversion parses the source document into an in-memory
/// graph, and serializes it in the target syntax. Every triple
/// is preserved, with blank node identity scoped to the
/// document. Namespace prefixes are chosen by the target
/// serializer.
#[derive(Debug, Clone, Default)]
pub struct RdfConverter {
    /// Base iri against which relative iris in documents are
    /// resolved.
    pub base_iri: Option<Iri<String>>,
}

impl RdfConverter {
    /// Create a new converter with given base iri.
    #[inline]
    pub fn new(base_iri: Option<Iri<String>>) -> Self {
        Self { base_iri }
    }

    /// Check if given media type corresponds to a supported
    /// rdf syntax.
    #[inline]
    pub fn is_supported(&self, media_type: &Mime) -> bool {
        RdfSyntax::resolve_for_media_type(media_type).is_ok()
    }

    /// Check that given document is valid in the syntax
    /// corresponding to given media type.
    pub fn check(&self, data: &[u8], media_type: &Mime) -> Result<(), ConvertError> {
        let syntax_ = RdfSyntax::resolve_for_media_type(media_type)?;
        DynRdfParser::new(syntax_, self.base_iri.clone())
            .parse_graph(data)
            .map_err(|e| {
                error!("Invalid {} document. {}", syntax_, e);
                ConvertError::InvalidRdf(e)
            })?;
        Ok(())
    }

    /// Convert given document from the syntax of `from` media
    /// type to that of `to` media type.
    pub fn convert(&self, data: &[u8], from: &Mime, to: &Mime) -> Result<Vec<u8>, ConvertError> {
        let from_syntax = RdfSyntax::resolve_for_media_type(from)?;
        let to_syntax = RdfSyntax::resolve_for_media_type(to)?;

        let graph = DynRdfParser::new(from_syntax, self.base_iri.clone())
            .parse_graph(data)
            .map_err(|e| {
                error!("Invalid {} document. {}", from_syntax, e);
                ConvertError::InvalidRdf(e)
            })?;

        if from_syntax == to_syntax {
            // Still a parse-validated pass-through.
            return Ok(data.to_vec());
        }

        let mut serializer = DynRdfSerializer::new_stringifier(to_syntax);
        serializer.serialize_graph(&graph)?;
        Ok(serializer.as_utf8().to_vec())
    }
}

/// Async wrappers, that route the blocking parse/serialize work
/// through the blocking thread pool.
#[cfg(feature = "async")]
mod async_ {
    use super::*;

    impl RdfConverter {
        /// Async counterpart of [`check`](Self::check).
        pub async fn check_async(
            &self,
            data: Vec<u8>,
            media_type: Mime,
        ) -> Result<(), ConvertError> {
            let this = self.clone();
            tokio::task::spawn_blocking(move || this.check(&data, &media_type))
                .await
                .expect("Conversion task must not panic.")
        }

        /// Async counterpart of [`convert`](Self::convert).
        pub async fn convert_async(
            &self,
            data: Vec<u8>,
            from: Mime,
            to: Mime,
        ) -> Result<Vec<u8>, ConvertError> {
            let this = self.clone();
            tokio::task::spawn_blocking(move || this.convert(&data, &from, &to))
                .await
                .expect("Conversion task must not panic.")
        }
    }
}

// ----------------------------------------
//                                      tests
// ----------------------------------------

#[cfg(test)]
mod tests {
    use claims::{assert_err, assert_ok};
    use once_cell::sync::Lazy;
    use rstest::rstest;
    use sophia_isomorphism::isomorphic_graphs;

    use super::*;
    use crate::{media_type, parser::DynRdfParser, syntax, tests::TRACING};

    static CONVERTER: Lazy<RdfConverter> = Lazy::new(RdfConverter::default);

    const DOC_TURTLE: &str = r#"
        @prefix foaf: <http://xmlns.com/foaf/0.1/>.

        <http://example.org/alice> foaf:name "Alice";
            foaf:knows [ foaf:name "Bob" ].
    "#;

    const DOC_JSON_LD: &str = r#"[
        {
            "@id": "http://example.org/note/1",
            "@type": ["https://www.w3.org/ns/activitystreams#Note"],
            "https://www.w3.org/ns/activitystreams#content": [{"@value": "hi"}]
        }
    ]"#;

    #[rstest]
    #[case(&media_type::TEXT_TURTLE, &media_type::APPLICATION_JSON_LD, DOC_TURTLE)]
    #[case(&media_type::TEXT_TURTLE, &media_type::APPLICATION_RDF_XML, DOC_TURTLE)]
    #[case(&media_type::APPLICATION_JSON_LD, &media_type::TEXT_TURTLE, DOC_JSON_LD)]
    #[case(&media_type::APPLICATION_JSON_LD, &media_type::APPLICATION_RDF_XML, DOC_JSON_LD)]
    fn conversion_preserves_graph(
        #[case] from: &Mime,
        #[case] to: &Mime,
        #[case] doc: &str,
    ) {
        Lazy::force(&TRACING);
        let converted = assert_ok!(CONVERTER.convert(doc.as_bytes(), from, to));

        let from_syntax = RdfSyntax::resolve_for_media_type(from).unwrap();
        let to_syntax = RdfSyntax::resolve_for_media_type(to).unwrap();

        let g1 = DynRdfParser::new(from_syntax, None)
            .parse_graph(doc.as_bytes())
            .unwrap();
        let g2 = DynRdfParser::new(to_syntax, None)
            .parse_graph(&converted)
            .unwrap();
        assert!(isomorphic_graphs(&g1, &g2).unwrap());
    }

    #[test]
    fn conversion_roundtrip_is_isomorphic() {
        Lazy::force(&TRACING);
        let there = CONVERTER
            .convert(
                DOC_TURTLE.as_bytes(),
                &media_type::TEXT_TURTLE,
                &media_type::APPLICATION_JSON_LD,
            )
            .unwrap();
        let back = CONVERTER
            .convert(
                &there,
                &media_type::APPLICATION_JSON_LD,
                &media_type::TEXT_TURTLE,
            )
            .unwrap();

        let g1 = DynRdfParser::new(syntax::TURTLE, None)
            .parse_graph(DOC_TURTLE.as_bytes())
            .unwrap();
        let g2 = DynRdfParser::new(syntax::TURTLE, None)
            .parse_graph(&back)
            .unwrap();
        assert!(isomorphic_graphs(&g1, &g2).unwrap());
    }

    #[test]
    fn invalid_source_doc_is_rejected() {
        Lazy::force(&TRACING);
        assert_err!(CONVERTER.convert(
            b"not really turtle @",
            &media_type::TEXT_TURTLE,
            &media_type::APPLICATION_JSON_LD,
        ));
    }

    #[test]
    fn unsupported_media_type_is_rejected() {
        Lazy::force(&TRACING);
        assert_err!(CONVERTER.convert(
            b"{}",
            &mime::APPLICATION_JSON,
            &media_type::TEXT_TURTLE,
        ));
    }
}
