//! I define webid minting and the turtle profile document
//! generator.
//!

use std::collections::HashSet;

use async_trait::async_trait;
use sophia_api::{
    graph::{Graph, MutableGraph},
    ns::{rdf, Namespace},
    prelude::Iri,
    serializer::{Stringifier, TripleSerializer},
    term::{SimpleTerm, Term},
};
use sophia_turtle::serializer::turtle::{TurtleConfig, TurtleSerializer};

use crate::{error::AccountsError, read::UserReadRepo};

/// Attempt bound of uniqueness probing.
const MAX_MINT_ATTEMPTS: u32 = 100;

/// A checker for whether a webid is already taken.
#[async_trait]
pub trait WebIdOccupancy: Send + Sync {
    /// Whether given webid is already taken.
    async fn is_occupied(&self, webid: &str) -> Result<bool, AccountsError>;
}

#[async_trait]
impl WebIdOccupancy for UserReadRepo {
    async fn is_occupied(&self, webid: &str) -> Result<bool, AccountsError> {
        Ok(self.get_by_webid(webid).await?.is_some())
    }
}

/// The webid generator.
///
/// Minted webids take the form
/// `https://<base>/users/<sanitized-id>#me`, and dereference to
/// a turtle profile document.
#[derive(Debug, Clone)]
pub struct WebIdGenerator {
    /// Base uri of the server, without a trailing slash.
    base_uri: String,
}

impl WebIdGenerator {
    /// Create a new generator over given base uri. The base
    /// must be an https uri.
    pub fn new(base_uri: impl Into<String>) -> Result<Self, AccountsError> {
        let base_uri: String = base_uri.into();
        if !base_uri.starts_with("https://") {
            return Err(AccountsError::invalid(
                "Webid base uri must have the https scheme.",
            ));
        }
        Ok(Self {
            base_uri: base_uri.trim_end_matches('/').to_owned(),
        })
    }

    /// Sanitize given raw string into a webid path segment:
    /// `@` becomes `-at-`, spaces become `-`, `+` becomes
    /// `-plus-`, anything outside `[A-Za-z0-9_-]` is dropped,
    /// and leading/trailing `-` are trimmed.
    pub fn sanitize_segment(raw: &str) -> String {
        let mut out = String::with_capacity(raw.len());
        for c in raw.chars() {
            match c {
                '@' => out.push_str("-at-"),
                ' ' => out.push('-'),
                '+' => out.push_str("-plus-"),
                c if c.is_ascii_alphanumeric() || c == '_' || c == '-' => out.push(c),
                _ => {}
            }
        }
        out.trim_matches('-').to_owned()
    }

    /// Mint the webid for given user id.
    pub fn generate(&self, user_id: &str) -> String {
        format!(
            "{}/users/{}#me",
            self.base_uri,
            Self::sanitize_segment(user_id)
        )
    }

    /// Check that given webid is well-formed: https scheme and
    /// a non-empty fragment.
    pub fn validate(webid: &str) -> Result<(), AccountsError> {
        if Iri::new(webid).is_err() {
            return Err(AccountsError::invalid(format!("Invalid webid iri: {webid}")));
        }
        if !webid.starts_with("https://") {
            return Err(AccountsError::invalid("Webid must have the https scheme."));
        }
        match webid.split_once('#') {
            Some((_, fragment)) if !fragment.is_empty() => Ok(()),
            _ => Err(AccountsError::invalid(
                "Webid must carry a non-empty fragment.",
            )),
        }
    }

    /// Resolve a free variant of given webid: the webid
    /// itself, or the first of `-1`, `-2`, … suffixed (before
    /// the fragment) variants that is unoccupied.
    pub async fn ensure_unique(
        &self,
        webid: &str,
        occupancy: &dyn WebIdOccupancy,
    ) -> Result<String, AccountsError> {
        if !occupancy.is_occupied(webid).await? {
            return Ok(webid.to_owned());
        }

        let (stem, fragment) = webid.split_once('#').unwrap_or((webid, "me"));
        for n in 1..=MAX_MINT_ATTEMPTS {
            let candidate = format!("{}-{}#{}", stem, n, fragment);
            if !occupancy.is_occupied(&candidate).await? {
                return Ok(candidate);
            }
        }
        Err(AccountsError::WebIdSpaceExhausted {
            base: stem.to_owned(),
        })
    }

    /// Produce the turtle profile document of given webid.
    ///
    /// The document declares the subject a `foaf:Person` with
    /// name and mailbox, and points at the pod resources
    /// derived from the webid minus its fragment. Literal
    /// escaping is the serializer's, not hand-rolled.
    pub fn generate_document(
        &self,
        webid: &str,
        email: &str,
        name: &str,
    ) -> Result<String, AccountsError> {
        Self::validate(webid)?;

        let doc_uri = webid.split_once('#').map(|(d, _)| d).unwrap_or(webid);

        let foaf = Namespace::new_unchecked("http://xmlns.com/foaf/0.1/");
        let solid = Namespace::new_unchecked("http://www.w3.org/ns/solid/terms#");
        let pim = Namespace::new_unchecked("http://www.w3.org/ns/pim/space#");

        let me: SimpleTerm<'static> = Iri::new(webid.to_owned())
            .map_err(AccountsError::internal)?
            .into_term();
        let mbox: SimpleTerm<'static> = Iri::new(format!("mailto:{}", email))
            .map_err(AccountsError::internal)?
            .into_term();
        let doc: SimpleTerm<'static> = Iri::new(doc_uri.to_owned())
            .map_err(AccountsError::internal)?
            .into_term();
        let issuer: SimpleTerm<'static> = Iri::new(self.base_uri.clone())
            .map_err(AccountsError::internal)?
            .into_term();

        let rdf_type: SimpleTerm<'static> = (&rdf::type_).into_term();
        let name_literal: SimpleTerm<'static> = name.into_term();
        let person: SimpleTerm<'static> = foaf
            .get("Person")
            .map_err(AccountsError::internal)?
            .into_term();
        let p_name: SimpleTerm<'static> = foaf
            .get("name")
            .map_err(AccountsError::internal)?
            .into_term();
        let p_mbox: SimpleTerm<'static> = foaf
            .get("mbox")
            .map_err(AccountsError::internal)?
            .into_term();
        let p_issuer: SimpleTerm<'static> = solid
            .get("oidcIssuer")
            .map_err(AccountsError::internal)?
            .into_term();
        let p_storage: SimpleTerm<'static> = pim
            .get("storage")
            .map_err(AccountsError::internal)?
            .into_term();

        let mut graph: HashSet<[SimpleTerm<'static>; 3]> = HashSet::new();
        // The sink is infallible; insertion cannot error.
        graph
            .insert_triple([me.clone(), rdf_type, person])
            .unwrap();
        graph
            .insert_triple([me.clone(), p_name, name_literal])
            .unwrap();
        graph.insert_triple([me.clone(), p_mbox, mbox]).unwrap();
        graph
            .insert_triple([me.clone(), p_issuer, issuer])
            .unwrap();
        graph.insert_triple([me, p_storage, doc]).unwrap();

        let mut serializer = TurtleSerializer::new_with_config(
            Vec::<u8>::new(),
            TurtleConfig::new().with_pretty(true),
        );
        serializer
            .serialize_triples(graph.triples())
            .map_err(|e| AccountsError::internal(std::io::Error::other(e.to_string())))?;
        Ok(serializer.to_string())
    }
}

// ----------------------------------------
//                                      tests
// ----------------------------------------
