//! I define a serializer that can be instantiated against any
//! of the supported rdf syntaxes at run time, and serializes
//! in-memory graphs into documents.
//!

use std::{fmt::Debug, io};

use sophia_api::{
    dataset::Dataset,
    graph::Graph,
    serializer::{QuadSerializer, Stringifier, TripleSerializer},
    source::StreamError,
};
use sophia_jsonld::JsonLdSerializer;
use sophia_turtle::serializer::turtle::{TurtleConfig, TurtleSerializer};
use sophia_xml::serializer::{RdfXmlConfig, RdfXmlSerializer};

use crate::{
    syntax::{self, RdfSyntax},
    LightGraph,
};

/// This is a sum-type that wraps around the specialized
/// serializers from sophia.
enum InnerSerializer<W: io::Write> {
    Turtle(TurtleSerializer<W>),
    RdfXml(RdfXmlSerializer<W>),
    JsonLd(JsonLdSerializer<W>),
}

impl<W: io::Write> Debug for InnerSerializer<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Turtle(_) => f.debug_tuple("Turtle").finish(),
            Self::RdfXml(_) => f.debug_tuple("RdfXml").finish(),
            Self::JsonLd(_) => f.debug_tuple("JsonLd").finish(),
        }
    }
}

/// A serializer that can be instantiated at run time against
/// any of the supported rdf syntaxes:
/// [`turtle`](crate::syntax::TURTLE),
/// [`rdf-xml`](crate::syntax::RDF_XML),
/// [`json-ld`](crate::syntax::JSON_LD).
///
/// Namespace prefixes in the output are chosen by the
/// underlying serializer, and are not semantically
/// significant.
#[derive(Debug)]
pub struct DynRdfSerializer<W: io::Write>(InnerSerializer<W>);

impl<W: io::Write> DynRdfSerializer<W> {
    /// Create a new serializer for given syntax, writing to
    /// given write.
    pub fn new(syntax_: RdfSyntax, write: W) -> Self {
        Self(match syntax_ {
            syntax::TURTLE => InnerSerializer::Turtle(TurtleSerializer::new_with_config(
                write,
                TurtleConfig::new().with_pretty(true),
            )),
            syntax::RDF_XML => InnerSerializer::RdfXml(RdfXmlSerializer::new_with_config(
                write,
                RdfXmlConfig::default(),
            )),
            syntax::JSON_LD => InnerSerializer::JsonLd(JsonLdSerializer::new(write)),
            // All supported syntaxes are addressed.
            _ => unreachable!(),
        })
    }

    /// Serialize given graph into the write. Json-ld output
    /// places all triples in the default graph.
    pub fn serialize_graph(&mut self, graph: &LightGraph) -> Result<&mut Self, io::Error> {
        match &mut self.0 {
            InnerSerializer::Turtle(s) => s
                .serialize_triples(graph.triples())
                .map_err(io_sink_error)
                .map(|_| ())?,
            InnerSerializer::RdfXml(s) => s
                .serialize_triples(graph.triples())
                .map_err(io_sink_error)
                .map(|_| ())?,
            InnerSerializer::JsonLd(s) => s
                .serialize_quads(graph.as_dataset().quads())
                .map_err(|e| match e {
                    StreamError::SourceError(e) => {
                        io::Error::new(io::ErrorKind::InvalidData, e.to_string())
                    }
                    StreamError::SinkError(e) => {
                        io::Error::new(io::ErrorKind::InvalidInput, e.to_string())
                    }
                })
                .map(|_| ())?,
        };
        Ok(self)
    }
}

/// Extract the sink-side io error of a stream error over an
/// in-memory source.
fn io_sink_error<SourceErr: std::error::Error>(
    e: StreamError<SourceErr, io::Error>,
) -> io::Error {
    match e {
        StreamError::SourceError(e) => io::Error::new(io::ErrorKind::InvalidData, e.to_string()),
        StreamError::SinkError(e) => e,
    }
}

impl Stringifier for DynRdfSerializer<Vec<u8>> {
    fn as_utf8(&self) -> &[u8] {
        match &self.0 {
            InnerSerializer::Turtle(s) => s.as_utf8(),
            InnerSerializer::RdfXml(s) => s.as_utf8(),
            InnerSerializer::JsonLd(s) => s.as_utf8(),
        }
    }
}

impl DynRdfSerializer<Vec<u8>> {
    /// Create a new serializer for given syntax, that can be
    /// stringified after serialization.
    #[inline]
    pub fn new_stringifier(syntax_: RdfSyntax) -> Self {
        Self::new(syntax_, Vec::new())
    }
}

// ----------------------------------------
//                                      tests
// ----------------------------------------

#[cfg(test)]
mod tests {
    use once_cell::sync::Lazy;
    use rstest::rstest;
    use sophia_isomorphism::isomorphic_graphs;

    use super::*;
    use crate::{parser::DynRdfParser, tests::TRACING};

    const GRAPH_STR_TURTLE: &str = r#"
        @prefix : <http://example.org/>.
        @prefix foaf: <http://xmlns.com/foaf/0.1/>.

        :alice foaf:name "Alice";
            foaf:mbox <mailto:alice@work.example> .

        :bob foaf:name "Bob";
            foaf:knows :alice.
    "#;

    #[rstest]
    #[case(syntax::TURTLE)]
    #[case(syntax::RDF_XML)]
    #[case(syntax::JSON_LD)]
    fn serialization_roundtrips_for_syntax(#[case] syntax_: RdfSyntax) {
        Lazy::force(&TRACING);
        let source_parser = DynRdfParser::new(syntax::TURTLE, None);
        let g1 = source_parser
            .parse_graph(GRAPH_STR_TURTLE.as_bytes())
            .unwrap();

        let mut serializer = DynRdfSerializer::new_stringifier(syntax_);
        let out = serializer
            .serialize_graph(&g1)
            .unwrap()
            .to_string();

        let back_parser = DynRdfParser::new(syntax_, None);
        let g2 = back_parser.parse_graph(out.as_bytes()).unwrap();
        assert!(isomorphic_graphs(&g1, &g2).unwrap());
    }
}
