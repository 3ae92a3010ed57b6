//! Literal datatypes
//!
//! Every literal carries an explicit datatype IRI. Well-known XSD and RDF
//! datatypes get interned constructors; anything else goes through
//! [`Datatype::custom`].

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Well-known datatype IRIs
pub mod iri {
    pub const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
    pub const XSD_BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
    pub const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
    pub const XSD_DOUBLE: &str = "http://www.w3.org/2001/XMLSchema#double";
    pub const XSD_DATE_TIME: &str = "http://www.w3.org/2001/XMLSchema#dateTime";
    pub const RDF_LANG_STRING: &str =
        "http://www.w3.org/1999/02/22-rdf-syntax-ns#langString";
}

/// A literal's datatype, stored as an expanded IRI.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Datatype(Arc<str>);

impl Datatype {
    /// Datatype with an arbitrary (expanded) IRI
    pub fn custom(iri: impl AsRef<str>) -> Self {
        Self(Arc::from(iri.as_ref()))
    }

    pub fn xsd_string() -> Self {
        Self::custom(iri::XSD_STRING)
    }

    pub fn xsd_boolean() -> Self {
        Self::custom(iri::XSD_BOOLEAN)
    }

    pub fn xsd_integer() -> Self {
        Self::custom(iri::XSD_INTEGER)
    }

    pub fn xsd_double() -> Self {
        Self::custom(iri::XSD_DOUBLE)
    }

    pub fn xsd_date_time() -> Self {
        Self::custom(iri::XSD_DATE_TIME)
    }

    pub fn rdf_lang_string() -> Self {
        Self::custom(iri::RDF_LANG_STRING)
    }

    /// The datatype IRI
    pub fn as_iri(&self) -> &str {
        &self.0
    }

    pub fn is_xsd_string(&self) -> bool {
        self.0.as_ref() == iri::XSD_STRING
    }

    pub fn is_lang_string(&self) -> bool {
        self.0.as_ref() == iri::RDF_LANG_STRING
    }

    /// True for the datatypes full-text indexing treats as plain text
    /// (`xsd:string` and `rdf:langString`).
    pub fn is_plain_text(&self) -> bool {
        self.is_xsd_string() || self.is_lang_string()
    }
}

impl std::fmt::Display for Datatype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_known() {
        assert!(Datatype::xsd_string().is_xsd_string());
        assert!(Datatype::rdf_lang_string().is_lang_string());
        assert!(Datatype::xsd_string().is_plain_text());
        assert!(Datatype::rdf_lang_string().is_plain_text());
        assert!(!Datatype::xsd_integer().is_plain_text());
    }

    #[test]
    fn test_custom_equality() {
        let a = Datatype::custom("http://example.org/dt");
        let b = Datatype::custom("http://example.org/dt");
        assert_eq!(a, b);
        assert_eq!(a.as_iri(), "http://example.org/dt");
    }
}
