use std::fmt;

use oxiri::{Iri, IriParseError};
use oxrdf::NamedNode;

/// Turns an `itemprop` token into a predicate IRI.
pub trait VocabularyResolver: fmt::Debug {
    /// `itemtypes` are the active types of the item the property belongs to,
    /// in document order. May be empty.
    fn resolve(&self, itemtypes: &[NamedNode], itemprop: &str) -> Result<NamedNode, IriParseError>;
}

/// Uses property names verbatim, so `itemprop="name"` becomes `<name>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityResolver;

impl VocabularyResolver for IdentityResolver {
    fn resolve(&self, _itemtypes: &[NamedNode], itemprop: &str) -> Result<NamedNode, IriParseError> {
        Ok(NamedNode::new_unchecked(itemprop))
    }
}

/// Resolves property names as relative references against the item's first
/// type, so `itemprop="name"` within `itemtype="http://schema.org/Person"`
/// becomes `<http://schema.org/name>`.
///
/// Absolute property IRIs are kept as they are. Without a type, only
/// absolute property IRIs resolve.
#[derive(Debug, Default, Clone, Copy)]
pub struct ItemtypeRelativeResolver;

impl VocabularyResolver for ItemtypeRelativeResolver {
    fn resolve(&self, itemtypes: &[NamedNode], itemprop: &str) -> Result<NamedNode, IriParseError> {
        match itemtypes.first() {
            Some(itemtype) => {
                let base = Iri::parse(itemtype.as_str())?;
                Ok(NamedNode::new_unchecked(base.resolve(itemprop)?.into_inner()))
            }
            None => NamedNode::new(itemprop),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types(iris: &[&str]) -> Vec<NamedNode> {
        iris.iter().copied().map(NamedNode::new_unchecked).collect()
    }

    #[test]
    fn identity_keeps_the_name() {
        let resolved = IdentityResolver
            .resolve(&types(&["http://schema.org/Person"]), "name")
            .unwrap();
        assert_eq!(resolved.as_str(), "name");
    }

    #[test]
    fn relative_to_first_itemtype() {
        let itemtypes = types(&["http://schema.org/Person", "http://example.org/Other"]);
        assert_eq!(
            ItemtypeRelativeResolver
                .resolve(&itemtypes, "name")
                .unwrap()
                .as_str(),
            "http://schema.org/name"
        );
        assert_eq!(
            ItemtypeRelativeResolver
                .resolve(&itemtypes, "http://purl.org/dc/terms/title")
                .unwrap()
                .as_str(),
            "http://purl.org/dc/terms/title"
        );
    }

    #[test]
    fn relative_without_itemtype_needs_an_absolute_iri() {
        assert!(ItemtypeRelativeResolver.resolve(&[], "name").is_err());
        assert!(
            ItemtypeRelativeResolver
                .resolve(&[], "http://schema.org/name")
                .is_ok()
        );
    }
}
