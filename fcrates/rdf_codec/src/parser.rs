//! I define a parser that can be instantiated against any of
//! the supported rdf syntaxes at run time, and parses whole
//! documents into in-memory graphs.
//!

use std::fmt::Debug;

use sophia_api::{
    parser::{QuadParser, TripleParser},
    prelude::Iri,
    source::{QuadSource, TripleSource},
};
use sophia_jsonld::JsonLdParser;
use sophia_turtle::parser::turtle::TurtleParser;
use sophia_xml::parser::RdfXmlParser;

use crate::{
    syntax::{self, RdfSyntax},
    LightDataset, LightGraph,
};

/// An error that abstracts over the syntax-specific parsing
/// errors.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct RdfParseError(pub Box<dyn std::error::Error + Send + Sync + 'static>);

/// This is a sum-type that wraps around the specialized parsers
/// from sophia.
enum InnerParser {
    Turtle(TurtleParser),
    RdfXml(RdfXmlParser),
    JsonLd(JsonLdParser),
}

impl Debug for InnerParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Turtle(_) => f.debug_tuple("Turtle").finish(),
            Self::RdfXml(_) => f.debug_tuple("RdfXml").finish(),
            Self::JsonLd(_) => f.debug_tuple("JsonLd").finish(),
        }
    }
}

/// A document parser that can be instantiated at run time
/// against any of the supported rdf syntaxes:
/// [`turtle`](crate::syntax::TURTLE),
/// [`rdf-xml`](crate::syntax::RDF_XML),
/// [`json-ld`](crate::syntax::JSON_LD).
///
/// Documents are parsed whole into a [`LightGraph`]. For
/// json-ld, a dataset syntax, only default-graph triples are
/// retained.
#[derive(Debug)]
pub struct DynRdfParser(InnerParser);

impl DynRdfParser {
    /// Create a new parser for given syntax and base iri.
    ///
    /// The base iri applies to turtle and rdf-xml relative iri
    /// resolution. Json-ld documents are processed with a no-op
    /// remote context loader, and without base resolution.
    pub fn new(syntax_: RdfSyntax, base_iri: Option<Iri<String>>) -> Self {
        Self(match syntax_ {
            syntax::TURTLE => InnerParser::Turtle(TurtleParser { base: base_iri }),
            syntax::RDF_XML => InnerParser::RdfXml(RdfXmlParser { base: base_iri }),
            syntax::JSON_LD => InnerParser::JsonLd(JsonLdParser::new()),
            // All supported syntaxes are addressed.
            _ => unreachable!(),
        })
    }

    /// Parse given document bytes into a graph.
    pub fn parse_graph(&self, data: &[u8]) -> Result<LightGraph, RdfParseError> {
        match &self.0 {
            InnerParser::Turtle(p) => p
                .parse(data)
                .collect_triples()
                .map_err(|e| RdfParseError(Box::new(e))),
            InnerParser::RdfXml(p) => p
                .parse(data)
                .collect_triples()
                .map_err(|e| RdfParseError(Box::new(e))),
            InnerParser::JsonLd(p) => {
                let dataset: LightDataset = p
                    .parse(data)
                    .collect_quads()
                    .map_err(|e| RdfParseError(Box::new(e)))?;

                // Retain default graph triples.
                Ok(dataset
                    .into_iter()
                    .filter(|(_, g)| g.is_none())
                    .map(|(spo, _)| spo)
                    .collect())
            }
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
    use sophia_turtle::parser::turtle::TurtleParser;

    use super::*;
    use crate::tests::TRACING;

    pub static BASE_IRI1: Lazy<Iri<String>> =
        Lazy::new(|| Iri::new("http://example.org/base/".to_owned()).unwrap());

    pub const GRAPH_STR_TURTLE: &str = r#"
        @prefix : <http://example.org/>.
        @prefix foaf: <http://xmlns.com/foaf/0.1/>.

        :alice foaf:name "Alice";
            foaf:mbox <mailto:alice@work.example> .

        :bob foaf:name "Bob".
    "#;

    pub const GRAPH_STR_RDF_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
        <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
                 xmlns:foaf="http://xmlns.com/foaf/0.1/">
          <rdf:Description rdf:about="http://example.org/alice">
            <foaf:name>Alice</foaf:name>
          </rdf:Description>
        </rdf:RDF>
    "#;

    pub const GRAPH_STR_JSON_LD: &str = r#"[
        {
            "@id": "http://example.org/alice",
            "http://xmlns.com/foaf/0.1/name": [{"@value": "Alice"}]
        }
    ]"#;

    #[rstest]
    #[case(syntax::TURTLE, GRAPH_STR_TURTLE, 3)]
    #[case(syntax::RDF_XML, GRAPH_STR_RDF_XML, 1)]
    #[case(syntax::JSON_LD, GRAPH_STR_JSON_LD, 1)]
    fn valid_docs_parse_with_expected_cardinality(
        #[case] syntax_: RdfSyntax,
        #[case] doc: &str,
        #[case] expected_triple_count: usize,
    ) {
        Lazy::force(&TRACING);
        let parser = DynRdfParser::new(syntax_, Some(BASE_IRI1.clone()));
        let graph = assert_ok!(parser.parse_graph(doc.as_bytes()));
        assert_eq!(graph.len(), expected_triple_count);
    }

    #[rstest]
    #[case(syntax::TURTLE, "<http://example.org/a> <invalid .")]
    #[case(syntax::RDF_XML, "this is not xml at all <")]
    #[case(syntax::JSON_LD, "{ not json")]
    fn invalid_docs_are_rejected(#[case] syntax_: RdfSyntax, #[case] doc: &str) {
        Lazy::force(&TRACING);
        let parser = DynRdfParser::new(syntax_, Some(BASE_IRI1.clone()));
        assert_err!(parser.parse_graph(doc.as_bytes()));
    }

    #[test]
    fn parse_agrees_with_specialized_parser() {
        Lazy::force(&TRACING);
        let specialized: LightGraph = TurtleParser {
            base: Some(BASE_IRI1.clone()),
        }
        .parse_str(GRAPH_STR_TURTLE)
        .collect_triples()
        .unwrap();

        let dyn_parser = DynRdfParser::new(syntax::TURTLE, Some(BASE_IRI1.clone()));
        let parsed = dyn_parser.parse_graph(GRAPH_STR_TURTLE.as_bytes()).unwrap();

        assert!(sophia_isomorphism::isomorphic_graphs(&specialized, &parsed).unwrap());
    }
}
