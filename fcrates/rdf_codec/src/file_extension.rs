//! I define a struct for file extensions, with correspondence
//! to supported rdf syntaxes.
//!

use std::{borrow::Cow, fmt::Display};

use crate::syntax::{self, RdfSyntax};

/// A type for representing file extensions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileExtension(pub Cow<'static, str>);

impl Display for FileExtension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&'static str> for FileExtension {
    #[inline]
    fn from(value: &'static str) -> Self {
        Self(Cow::Borrowed(value))
    }
}

impl FileExtension {
    /// Get the customary file extension for given syntax.
    pub fn of(syntax_: RdfSyntax) -> Self {
        match syntax_ {
            syntax::TURTLE => "ttl".into(),
            syntax::JSON_LD => "jsonld".into(),
            syntax::RDF_XML => "rdf".into(),
            // Constants are the only inhabitants.
            _ => unreachable!(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions_are_customary() {
        assert_eq!(FileExtension::of(syntax::TURTLE).0, "ttl");
        assert_eq!(FileExtension::of(syntax::JSON_LD).0, "jsonld");
        assert_eq!(FileExtension::of(syntax::RDF_XML).0, "rdf");
    }
}
