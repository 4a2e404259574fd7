use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use curie::{Curie, ExpansionError, PrefixMapping};
use icu::locale::LanguageIdentifier;
use indexmap::IndexMap;
use oxiri::{Iri, IriParseError};
use oxrdf::{NamedNode, NamedOrBlankNode};

use crate::bnode::BlankNodeFactory;
use crate::document::resolve_reference;
use crate::statement::{Container, TextRange};
use crate::warning::WarningKind;

use super::HtmlProfile;

/// A term, and the source text it was written as (when offsets are captured).
#[derive(Clone, Debug)]
pub(crate) struct Located<T> {
    pub(crate) term: T,
    pub(crate) range: Option<TextRange>,
}

impl<T> Located<T> {
    pub(crate) fn new(term: T, range: Option<TextRange>) -> Self {
        Self { term, range }
    }
}

pub(crate) type Resource = Rc<Located<NamedOrBlankNode>>;

#[derive(Debug, Default)]
pub(crate) struct List {
    /// Where the predicate that created the list was written.
    pub(crate) predicate: Option<TextRange>,
    pub(crate) items: Vec<Located<oxrdf::Term>>,
}

pub(crate) type SharedList = RefCell<List>;

/// Lists are kept in the order they were first mentioned, which is the order
/// they are written out in.
#[derive(Default, Clone, Debug)]
pub(crate) struct ListMapping {
    pub(crate) lists: IndexMap<NamedNode, Rc<SharedList>>,
}

impl ListMapping {
    pub(crate) fn ensure_list(&mut self, predicate: &Located<NamedNode>) -> Rc<SharedList> {
        self.lists
            .entry(predicate.term.clone())
            .or_insert_with(|| {
                tracing::trace!(predicate = %predicate.term, "created new list");
                Rc::new(RefCell::new(List {
                    predicate: predicate.range,
                    items: Vec::new(),
                }))
            })
            .clone()
    }

    pub(crate) fn insert_value(
        &mut self,
        predicate: &Located<NamedNode>,
        item: Located<oxrdf::Term>,
    ) {
        tracing::trace!(predicate = %predicate.term, item = %item.term, "inserting into list");
        self.ensure_list(predicate).borrow_mut().items.push(item);
    }
}

pub(crate) enum Attr<T> {
    Missing,
    Empty,
    Value(T),
}

impl<T> Attr<T> {
    pub(crate) fn map<U>(self, f: impl FnOnce(T) -> U) -> Attr<U> {
        match self {
            Attr::Missing => Attr::Missing,
            Attr::Empty => Attr::Empty,
            Attr::Value(v) => Attr::Value(f(v)),
        }
    }

    pub(crate) fn is_present(&self) -> bool {
        !matches!(self, Attr::Missing)
    }

    pub(crate) fn value(&self) -> Option<&T> {
        match self {
            Attr::Value(v) => Some(v),
            Attr::Missing | Attr::Empty => None,
        }
    }

    pub(crate) fn into_value(self) -> Option<T> {
        match self {
            Attr::Value(v) => Some(v),
            Attr::Missing | Attr::Empty => None,
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) enum Relation {
    Forward(Located<NamedNode>),
    Reverse(Located<NamedNode>),
    List(Located<NamedNode>),
}

#[derive(Clone, Debug)]
pub(crate) enum IncompleteTriple {
    List(Rc<SharedList>),
    Forward(Located<NamedNode>),
    Reverse(Located<NamedNode>),
}

// “During processing, each rule is applied using information provided by an evaluation context.
//  An initial context is created when processing begins. That context has the following members:
#[derive(Clone)]
pub(crate) struct EvaluationContext {
    // “The base. This will usually be the IRI of the document being processed,
    //  but it could be some other IRI, set by some other mechanism, such as the (X)HTML base element.
    //  The important thing is that it establishes an IRI against which relative paths can be resolved.
    // NB: a document without any location has no base; relative references are then kept as written.
    pub(crate) base: Option<Iri<String>>,

    // “The parent subject. The initial value will be the same as the initial value of base,
    //  but it will usually change during the course of processing.
    pub(crate) parent_subject: Resource,

    // “The parent object. In some situations the object of a statement becomes the subject
    //  of any nested statements, and this member is used to convey this value.
    pub(crate) parent_object: Option<Resource>,

    // “A list of current, in-scope IRI mappings.
    pub(crate) iri_mappings: Rc<PrefixMapping>,

    // “A list of incomplete triples.
    pub(crate) incomplete_triples: Vec<IncompleteTriple>,

    // “A list mapping that associates IRIs with lists.
    pub(crate) list_mapping: Rc<RefCell<ListMapping>>,

    // “The language. Note that there is no default language.
    pub(crate) language: Option<Rc<LanguageIdentifier>>,

    // “The term mappings, a list of terms and their associated IRIs.
    pub(crate) term_mappings: Rc<BTreeMap<String, NamedNode>>,

    // “The default vocabulary, a value to use as the prefix IRI when a term unknown to the RDFa Processor
    //  is used.
    pub(crate) default_vocab: Option<NamedNode>,

    /// The item the statements made here belong to.
    pub(crate) container: Option<Container>,
}

impl EvaluationContext {
    pub(crate) fn new(
        base: Option<Iri<String>>,
        iri_mappings: PrefixMapping,
        term_mappings: BTreeMap<String, NamedNode>,
        default_vocab: Option<NamedNode>,
    ) -> Self {
        // resolve the base to remove any fragment,
        // so that it can be used directly as the "empty CURIE" value
        let base = base.map(|base| base.resolve("").unwrap_or(base));
        let parent_subject = NamedNode::new_unchecked(
            base.as_ref().map(|b| b.as_str()).unwrap_or_default(),
        );

        Self {
            base,
            parent_subject: Rc::new(Located::new(parent_subject.into(), None)),
            parent_object: None,
            iri_mappings: Rc::new(iri_mappings),
            incomplete_triples: Vec::new(),
            list_mapping: Default::default(),
            language: None,
            term_mappings: Rc::new(term_mappings),
            default_vocab,
            container: None,
        }
    }

    /// An empty CURIE (or `@about=""`) resolves to the base.
    pub(crate) fn empty_curie(&self) -> NamedNode {
        NamedNode::new_unchecked(self.base.as_ref().map(|b| b.as_str()).unwrap_or_default())
    }
}

pub(crate) type EmitWarning<'a> = dyn Fn(WarningKind, String) + 'a;

// “During the course of processing a number of locally scoped values are needed, as follows:
#[derive(Clone)]
pub(crate) struct LocalScope<'a> {
    pub(crate) emit_warning: &'a EmitWarning<'a>,
    pub(crate) bnodes: &'a RefCell<BlankNodeFactory>,
    pub(crate) profile: HtmlProfile,
    pub(crate) eval_context: &'a EvaluationContext,
    // “An initially empty list of IRI mappings, called the local list of IRI mappings.
    pub(crate) iri_mappings: Rc<PrefixMapping>,
    // “An initially empty list of incomplete triples, called the local list of incomplete triples.
    pub(crate) incomplete_triples: Vec<IncompleteTriple>,
    // “An initially empty language value.
    pub(crate) current_language: Option<Rc<LanguageIdentifier>>,
    // “A skip element flag, which indicates whether the current element can safely be ignored
    //  since it has no relevant RDFa attributes. Note that descendant elements will still be processed.
    pub(crate) skip_element: bool,
    // “A new subject value, which once calculated will set the parent subject in an evaluation context,
    //  as well as being used to complete any incomplete triples, as described in the next section.
    pub(crate) new_subject: Option<Resource>,
    // “A value for the current object resource, the resource to use when creating triples that have a resource object.
    pub(crate) current_object_resource: Option<Resource>,
    // “A value for the typed resource, the source for creating rdf:type relationships to types specified in @typeof.
    pub(crate) typed_resource: Option<Resource>,
    // “The local term mappings, a list of terms and their associated IRIs.
    pub(crate) term_mappings: Rc<BTreeMap<String, NamedNode>>,
    // “The local list mapping, mapping IRIs to lists
    pub(crate) list_mappings: Rc<RefCell<ListMapping>>,
    // “A local default vocabulary, an IRI to use as a prefix mapping when a term is used.
    pub(crate) default_vocab: Option<NamedNode>,
    pub(crate) base: Option<Iri<String>>,
}

enum CurieError {
    EmptyCurie,
    InvalidIri(String),
    Expansion(ExpansionError),
}

struct NotCurie;
struct NotTerm;

impl<'a> LocalScope<'a> {
    pub(crate) fn new(
        eval_context: &'a EvaluationContext,
        profile: HtmlProfile,
        bnodes: &'a RefCell<BlankNodeFactory>,
        emit_warning: &'a EmitWarning<'a>,
    ) -> Self {
        // “First, the local values are initialized, as follows:
        Self {
            emit_warning,
            bnodes,
            profile,
            eval_context,
            // “the skip element flag is set to 'false';
            skip_element: false,
            // “new subject is set to null;
            new_subject: None,
            // “current object resource is set to null;
            current_object_resource: None,
            // “typed resource is set to null;
            typed_resource: None,
            // “the local list of IRI mappings is set to the list of IRI mappings from the evaluation context;
            iri_mappings: eval_context.iri_mappings.clone(),
            // “the local list of incomplete triples is set to null;
            incomplete_triples: Vec::new(),
            // “the list mapping is set to (a reference of) the list mapping from the evaluation context;
            list_mappings: eval_context.list_mapping.clone(),
            // “the current language value is set to the language value from the evaluation context.
            current_language: eval_context.language.clone(),
            // “the local term mappings is set to the term mappings from the evaluation context.
            term_mappings: eval_context.term_mappings.clone(),
            // “the local default vocabulary is set to the default vocabulary from the evaluation context.
            default_vocab: eval_context.default_vocab.clone(),
            base: eval_context.base.clone(),
        }
    }

    fn warn(&self, kind: WarningKind, message: String) {
        (self.emit_warning)(kind, message);
    }

    pub(crate) fn fresh_bnode(&self) -> NamedOrBlankNode {
        self.bnodes.borrow_mut().fresh().into()
    }

    pub(crate) fn empty_curie(&self) -> NamedNode {
        NamedNode::new_unchecked(self.base.as_ref().map(|b| b.as_str()).unwrap_or_default())
    }

    // When resolving a term, the outcome might be that it _must_ be ignored.
    // This is indicated by returning [`None`].
    fn resolve_term(&self, term: &str) -> Result<Option<NamedNode>, NotTerm> {
        // [rdfa-core] 7.5.3
        // > term     ::=  NCNameStartChar termChar*
        // > termChar ::=  ( NameChar - ':' ) | '/'
        if term.is_empty()
            || term.starts_with('/')
            || !term
                .split('/')
                .all(|s| s.is_empty() || rxml_validation::validate_ncname(s).is_ok())
        {
            return Err(NotTerm);
        }

        // > If there is a local default vocabulary the IRI is obtained
        // > by concatenating that value and the term.
        if let Some(vocab) = &self.default_vocab {
            // an IRI followed by term characters is still an IRI
            return Ok(Some(NamedNode::new_unchecked(format!(
                "{}{term}",
                vocab.as_str()
            ))));
        }

        // > Otherwise, check if the term matches an item in the list of local term mappings.
        // > First compare against the list case-sensitively,
        if let Some(iri) = self.term_mappings.get(term) {
            return Ok(Some(iri.clone()));
        }

        // > and if there is no match then compare case-insensitively.
        Ok(self
            .term_mappings
            .iter()
            .find_map(|(key, iri)| key.eq_ignore_ascii_case(term).then(|| iri.clone())))
    }

    /// Resolves a (non-safe) CURIE to an IRI or bnode.
    fn resolve_curie(&self, value: &str) -> Result<NamedOrBlankNode, CurieError> {
        if value.is_empty() {
            return Err(CurieError::EmptyCurie);
        }

        let lowered;
        let curie = if let Some((prefix, suffix)) = value.split_once(':') {
            if prefix == "_" {
                // [_:] is permitted by RDFa, and refers to one node per document
                return Ok(self.bnodes.borrow_mut().declared(suffix).into());
            }

            lowered = prefix.to_ascii_lowercase();
            Curie::new(Some(lowered.as_str()), suffix)
        } else {
            Curie::new(None, value)
        };

        match self.iri_mappings.expand_curie(&curie) {
            // Usually this is an absolute IRI, but a relative IRI can be
            // used as a prefix, so resolve it in case.
            Ok(iri) => self
                .resolve_relative_iri(&iri)
                .map(NamedOrBlankNode::from)
                .map_err(|_| CurieError::InvalidIri(iri)),
            Err(err) => Err(CurieError::Expansion(err)),
        }
    }

    /// Resolves a SafeCURIE or CURIE to an IRI or bnode.
    fn resolve_safecurie_or_curie(
        &self,
        value: &str,
    ) -> Result<Option<NamedOrBlankNode>, NotCurie> {
        let Some(safe) = value.strip_prefix('[').and_then(|v| v.strip_suffix(']')) else {
            return self.resolve_curie(value).map(Some).map_err(|_| NotCurie);
        };

        match self.resolve_curie(safe) {
            Ok(iri) => Ok(Some(iri)),
            // a SafeCURIE that doesn't resolve MUST be ignored
            Err(CurieError::EmptyCurie | CurieError::Expansion(ExpansionError::MissingDefault)) => {
                Ok(None)
            }
            Err(CurieError::InvalidIri(iri)) => {
                self.warn(
                    WarningKind::UnresolvedCurie,
                    format!("Invalid CURIE: {value} (expanded to invalid IRI value <{iri}>)"),
                );
                Ok(None)
            }
            Err(CurieError::Expansion(ExpansionError::Invalid)) => {
                self.warn(
                    WarningKind::UnresolvedCurie,
                    format!("Invalid CURIE: {value} (no such prefix defined)"),
                );
                Ok(None)
            }
        }
    }

    /// Resolves an IRI-only attribute value.
    pub(crate) fn attribute_iri(&self, value: &str) -> Option<NamedNode> {
        match self.resolve_relative_iri(value) {
            Ok(iri) => Some(iri),
            Err(err) => {
                self.report_invalid_iri(err, value);
                None
            }
        }
    }

    /// Resolves an IRI against the base.
    pub(crate) fn resolve_relative_iri(&self, value: &str) -> Result<NamedNode, IriParseError> {
        resolve_reference(self.base.as_ref(), value)
    }

    pub(crate) fn safecurie_or_curie_or_iri(&self, value: &str) -> Option<NamedOrBlankNode> {
        match self.resolve_safecurie_or_curie(value) {
            Ok(val) => val, // value or MUST be ignored
            Err(NotCurie) => self.attribute_iri(value).map(NamedOrBlankNode::from),
        }
    }

    fn curie_or_absiri(&self, value: &str) -> Option<NamedOrBlankNode> {
        match self.resolve_curie(value) {
            Ok(val) => Some(val),
            Err(_) => match NamedNode::new(value) {
                Ok(iri) => Some(iri.into()),
                Err(iri_err) => {
                    self.report_invalid_iri(iri_err, value);
                    None
                }
            },
        }
    }

    fn report_invalid_iri(&self, iri_err: IriParseError, value: &str) {
        self.warn(
            WarningKind::InvalidIri,
            format!("Invalid IRI: <{value}> ({iri_err})"),
        );
    }

    pub(crate) fn term_or_curie_or_absiri(&self, value: &str) -> Option<NamedOrBlankNode> {
        match self.resolve_term(value) {
            Ok(Some(iri)) => Some(iri.into()),
            // MUST be ignored
            Ok(None) => {
                self.warn(
                    WarningKind::UnresolvedTerm,
                    format!("Unresolved term: {value}"),
                );
                None
            }
            Err(NotTerm) => self.curie_or_absiri(value),
        }
    }

    /// Non-CURIE, non-IRI values are dropped without a warning.
    pub(crate) fn curie_or_absiri_only(&self, value: &str) -> Option<NamedOrBlankNode> {
        if self.resolve_term(value).is_ok() {
            return None;
        }

        self.curie_or_absiri(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdfa::vocab::{initial_context_prefixes, initial_context_terms};

    fn context(vocab: Option<&str>) -> EvaluationContext {
        EvaluationContext::new(
            Some(Iri::parse("http://example.org/doc#frag".to_string()).unwrap()),
            initial_context_prefixes().clone(),
            initial_context_terms().clone(),
            vocab.map(NamedNode::new_unchecked),
        )
    }

    fn with_scope<R>(ctx: &EvaluationContext, f: impl FnOnce(&LocalScope) -> R) -> (R, Vec<WarningKind>) {
        let warnings = RefCell::new(Vec::new());
        let bnodes = RefCell::new(BlankNodeFactory::new());
        let emit = |kind: WarningKind, _message: String| warnings.borrow_mut().push(kind);
        let scope = LocalScope::new(ctx, HtmlProfile::Xhtml5Rdfa11, &bnodes, &emit);
        let result = f(&scope);
        drop(scope);
        (result, warnings.into_inner())
    }

    #[test]
    fn empty_curie_has_no_fragment() {
        let ctx = context(None);
        assert_eq!(ctx.empty_curie().as_str(), "http://example.org/doc");
    }

    #[test]
    fn terms_use_vocabulary_before_term_mappings() {
        let ctx = context(Some("http://schema.org/"));
        let (iri, warnings) = with_scope(&ctx, |s| s.term_or_curie_or_absiri("license"));
        assert_eq!(
            iri,
            Some(NamedNode::new_unchecked("http://schema.org/license").into())
        );
        assert!(warnings.is_empty());

        let ctx = context(None);
        let (iri, _) = with_scope(&ctx, |s| s.term_or_curie_or_absiri("LICENSE"));
        assert_eq!(
            iri,
            Some(NamedNode::new_unchecked("http://www.w3.org/1999/xhtml/vocab#license").into())
        );

        let (iri, warnings) = with_scope(&ctx, |s| s.term_or_curie_or_absiri("unknown"));
        assert_eq!(iri, None);
        assert_eq!(warnings, vec![WarningKind::UnresolvedTerm]);
    }

    #[test]
    fn curie_prefixes_are_case_insensitive() {
        let ctx = context(None);
        let (iri, _) = with_scope(&ctx, |s| s.term_or_curie_or_absiri("FOAF:name"));
        assert_eq!(
            iri,
            Some(NamedNode::new_unchecked("http://xmlns.com/foaf/0.1/name").into())
        );
    }

    #[test]
    fn unknown_safe_curies_are_ignored_with_a_warning() {
        let ctx = context(None);
        let (iri, warnings) = with_scope(&ctx, |s| s.safecurie_or_curie_or_iri("[nope:x]"));
        assert_eq!(iri, None);
        assert_eq!(warnings, vec![WarningKind::UnresolvedCurie]);

        // not safe, so this is an IRI with the scheme "nope"
        let (iri, _) = with_scope(&ctx, |s| s.safecurie_or_curie_or_iri("nope:x"));
        assert_eq!(iri, Some(NamedNode::new_unchecked("nope:x").into()));
    }

    #[test]
    fn blank_node_curies_are_shared() {
        let ctx = context(None);
        let ((a, b, c), _) = with_scope(&ctx, |s| {
            (
                s.safecurie_or_curie_or_iri("[_:x]"),
                s.safecurie_or_curie_or_iri("_:x"),
                s.safecurie_or_curie_or_iri("[_:]"),
            )
        });
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(matches!(c, Some(NamedOrBlankNode::BlankNode(_))));
    }

    #[test]
    fn relative_iris_resolve_against_base() {
        let ctx = context(None);
        let (iri, _) = with_scope(&ctx, |s| s.attribute_iri("other#x"));
        assert_eq!(iri, Some(NamedNode::new_unchecked("http://example.org/other#x")));
    }

    #[test]
    fn lists_keep_insertion_order() {
        let mut mapping = ListMapping::default();
        let b = Located::new(NamedNode::new_unchecked("http://example.org/b"), None);
        let a = Located::new(NamedNode::new_unchecked("http://example.org/a"), None);
        mapping.ensure_list(&b);
        mapping.insert_value(&a, Located::new(oxrdf::Literal::from("1").into(), None));
        mapping.insert_value(&a, Located::new(oxrdf::Literal::from("2").into(), None));

        let keys: Vec<_> = mapping.lists.keys().map(NamedNode::as_str).collect();
        assert_eq!(keys, ["http://example.org/b", "http://example.org/a"]);
        assert_eq!(mapping.lists[&a.term].borrow().items.len(), 2);
    }
}
