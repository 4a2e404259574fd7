use std::collections::BTreeMap;

use curie::PrefixMapping;

pub mod dc_vocab {
    pub static DESCRIPTION: oxrdf::NamedNodeRef =
        oxrdf::NamedNodeRef::new_unchecked("http://purl.org/dc/terms/description");
}

pub mod xhv_vocab {
    pub static NAMESPACE: &str = "http://www.w3.org/1999/xhtml/vocab#";

    pub static ROLE: oxrdf::NamedNodeRef =
        oxrdf::NamedNodeRef::new_unchecked("http://www.w3.org/1999/xhtml/vocab#role");
}

pub mod rdf_vocab {
    pub static HTML: oxrdf::NamedNodeRef =
        oxrdf::NamedNodeRef::new_unchecked("http://www.w3.org/1999/02/22-rdf-syntax-ns#HTML");
}

pub mod rdfa_vocab {
    pub static COPY: oxrdf::NamedNodeRef =
        oxrdf::NamedNodeRef::new_unchecked("http://www.w3.org/ns/rdfa#copy");

    pub static PATTERN: oxrdf::NamedNodeRef =
        oxrdf::NamedNodeRef::new_unchecked("http://www.w3.org/ns/rdfa#Pattern");

    pub static WARNING: oxrdf::NamedNodeRef =
        oxrdf::NamedNodeRef::new_unchecked("http://www.w3.org/ns/rdfa#Warning");

    pub static UNRESOLVED_CURIE: oxrdf::NamedNodeRef =
        oxrdf::NamedNodeRef::new_unchecked("http://www.w3.org/ns/rdfa#UnresolvedCurie");

    pub static UNRESOLVED_TERM: oxrdf::NamedNodeRef =
        oxrdf::NamedNodeRef::new_unchecked("http://www.w3.org/ns/rdfa#UnresolvedTerm");

    pub static PREFIX_REDEFINITION: oxrdf::NamedNodeRef =
        oxrdf::NamedNodeRef::new_unchecked("http://www.w3.org/ns/rdfa#PrefixRedefinition");

    pub static USES_VOCABULARY: oxrdf::NamedNodeRef =
        oxrdf::NamedNodeRef::new_unchecked("http://www.w3.org/ns/rdfa#usesVocabulary");
}

pub fn initial_context_terms() -> &'static BTreeMap<String, oxrdf::NamedNode> {
    // https://www.w3.org/2011/rdfa-context/rdfa-1.1
    // Vocabulary terms
    static INITIAL_CONTEXT: std::sync::OnceLock<BTreeMap<String, oxrdf::NamedNode>> =
        std::sync::OnceLock::new();
    INITIAL_CONTEXT.get_or_init(|| {
        [
            (
                "describedBy".to_string(),
                oxrdf::NamedNode::new_unchecked("http://www.w3.org/2007/05/powder-s#describedby"),
            ),
            (
                "license".to_string(),
                oxrdf::NamedNode::new_unchecked("http://www.w3.org/1999/xhtml/vocab#license"),
            ),
            (
                "role".to_string(),
                oxrdf::NamedNode::new_unchecked("http://www.w3.org/1999/xhtml/vocab#role"),
            ),
        ]
        .into_iter()
        .collect()
    })
}

/// The XHTML link types, which XHTML+RDFa documents may use as bare terms.
pub fn xhtml_terms() -> &'static BTreeMap<String, oxrdf::NamedNode> {
    // https://www.w3.org/2011/rdfa-context/xhtml-rdfa-1.1
    static XHTML_CONTEXT: std::sync::OnceLock<BTreeMap<String, oxrdf::NamedNode>> =
        std::sync::OnceLock::new();
    XHTML_CONTEXT.get_or_init(|| {
        [
            "alternate",
            "appendix",
            "bookmark",
            "cite",
            "chapter",
            "contents",
            "copyright",
            "first",
            "glossary",
            "help",
            "icon",
            "index",
            "itsRules",
            "last",
            "license",
            "meta",
            "next",
            "p3pv1",
            "prev",
            "previous",
            "role",
            "section",
            "start",
            "stylesheet",
            "subsection",
            "top",
            "up",
        ]
        .into_iter()
        .map(|term| {
            (
                term.to_string(),
                oxrdf::NamedNode::new_unchecked(format!("{}{term}", xhv_vocab::NAMESPACE)),
            )
        })
        .collect()
    })
}

pub fn initial_context_prefixes() -> &'static PrefixMapping {
    static INITIAL_CONTEXT: std::sync::OnceLock<PrefixMapping> = std::sync::OnceLock::new();
    // https://www.w3.org/2011/rdfa-context/rdfa-1.1
    // Vocabulary prefixes
    INITIAL_CONTEXT.get_or_init(|| {
        let mut mapping = PrefixMapping::default();
        for (prefix, iri) in [
            // Defined by [rdfa-core]
            ("", "http://www.w3.org/1999/xhtml/vocab#"),
            // W3C documents
            ("as", "https://www.w3.org/ns/activitystreams#"),
            ("csvw", "http://www.w3.org/ns/csvw#"),
            ("dcat", "http://www.w3.org/ns/dcat#"),
            ("dqv", "http://www.w3.org/ns/dqv#"),
            ("duv", "http://www.w3.org/ns/duv#"),
            ("grddl", "http://www.w3.org/2003/g/data-view#"),
            ("jsonld", "http://json-ld.org/vocab#"),
            ("ma", "http://www.w3.org/ns/ma-ont#"),
            ("org", "http://www.w3.org/ns/org#"),
            ("owl", "http://www.w3.org/2002/07/owl#"),
            ("prov", "http://www.w3.org/ns/prov#"),
            ("qb", "http://purl.org/linked-data/cube#"),
            ("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#"),
            ("rdfa", "http://www.w3.org/ns/rdfa#"),
            ("rdfs", "http://www.w3.org/2000/01/rdf-schema#"),
            ("rif", "http://www.w3.org/2007/rif#"),
            ("rr", "http://www.w3.org/ns/r2rml#"),
            ("sd", "http://www.w3.org/ns/sparql-service-description#"),
            ("skos", "http://www.w3.org/2004/02/skos/core#"),
            ("skosxl", "http://www.w3.org/2008/05/skos-xl#"),
            ("sosa", "http://www.w3.org/ns/sosa/"),
            ("ssn", "http://www.w3.org/ns/ssn/"),
            ("time", "http://www.w3.org/2006/time#"),
            ("void", "http://rdfs.org/ns/void#"),
            ("wdr", "http://www.w3.org/2007/05/powder#"),
            ("wdrs", "http://www.w3.org/2007/05/powder-s#"),
            ("xhv", "http://www.w3.org/1999/xhtml/vocab#"),
            ("xml", "http://www.w3.org/XML/1998/namespace"),
            ("xsd", "http://www.w3.org/2001/XMLSchema#"),
            // "widely used"
            ("cc", "http://creativecommons.org/ns#"),
            ("ctag", "http://commontag.org/ns#"),
            ("dc", "http://purl.org/dc/terms/"),
            ("dc11", "http://purl.org/dc/elements/1.1/"),
            ("dcterms", "http://purl.org/dc/terms/"),
            ("foaf", "http://xmlns.com/foaf/0.1/"),
            ("gr", "http://purl.org/goodrelations/v1#"),
            ("ical", "http://www.w3.org/2002/12/cal/icaltzd#"),
            ("og", "http://ogp.me/ns#"),
            ("rev", "http://purl.org/stuff/rev#"),
            ("schema", "http://schema.org/"),
            ("schemas", "https://schema.org/"),
            ("sioc", "http://rdfs.org/sioc/ns#"),
            ("v", "http://rdf.data-vocabulary.org/#"),
            ("vcard", "http://www.w3.org/2006/vcard/ns#"),
        ] {
            mapping.add_prefix(prefix, iri).unwrap();
        }
        mapping
    })
}

/// Link types that only describe how a browser should treat a link, and so
/// say nothing about the linked resource. Keyed by element name.
const NON_SEMANTIC_LINK_TYPES: &[(&str, &[&str])] = &[
    (
        "link",
        &[
            "stylesheet",
            "icon",
            "shortcut",
            "apple-touch-icon",
            "manifest",
            "preload",
            "prefetch",
            "preconnect",
            "dns-prefetch",
            "modulepreload",
            "pingback",
        ],
    ),
    ("a", &["nofollow", "noopener", "noreferrer", "external"]),
    ("area", &["nofollow", "noopener", "noreferrer", "external"]),
];

/// Whether the bare `@rel` term on `element` should be ignored.
pub fn is_non_semantic_link(element: &str, rel: &str) -> bool {
    NON_SEMANTIC_LINK_TYPES
        .iter()
        .filter(|(name, _)| *name == element)
        .any(|(_, rels)| rels.iter().any(|r| r.eq_ignore_ascii_case(rel)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_semantic_links_depend_on_element() {
        assert!(is_non_semantic_link("link", "stylesheet"));
        assert!(is_non_semantic_link("link", "StyleSheet"));
        assert!(!is_non_semantic_link("a", "stylesheet"));
        assert!(is_non_semantic_link("a", "nofollow"));
        assert!(!is_non_semantic_link("link", "license"));
    }
}
