//! RDFa Core 1.1 processing, with the additional rules of HTML+RDFa.
//!
//! Comments quoting the processing rules are taken from
//! [rdfa-core](https://www.w3.org/TR/rdfa-core/) and
//! [html-rdfa](https://www.w3.org/TR/html-rdfa/).

mod context;
mod copying;
pub mod vocab;

use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::str::FromStr;

use curie::PrefixMapping;
use ego_tree::NodeId;
use icu::locale::LanguageIdentifier;
use itertools::Itertools;
use oxiri::Iri;
use oxrdf::vocab::rdf;
use oxrdf::{Literal, NamedNode, NamedNodeRef, NamedOrBlankNode, Term, TripleRef};
use scraper::ElementRef;
use vec1::{Size0Error, Vec1};

use crate::Error;
use crate::bnode::BlankNodeFactory;
use crate::datatypes::rdfa_temporal_datatype;
use crate::decoder::{Decoder, RDFA_CONTENT_TYPE, Replay};
use crate::document::{Document, qualified_name, serialize_children, split_tokens, text_content};
use crate::statement::{Container, Statement, TextOffsets, TextRange};
use crate::warning::{Warning, WarningKind, WarningSink, Warnings};

use context::{
    Attr, EvaluationContext, IncompleteTriple, ListMapping, LocalScope, Located, Relation,
    Resource,
};
use vocab::{rdf_vocab, rdfa_vocab, xhv_vocab};

/// Which flavour of RDFa a document is processed as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HtmlProfile {
    /// Plain RDFa Core, without any of the HTML-specific rules.
    Disabled,
    Xhtml1Rdfa10,
    Xhtml1Rdfa11,
    Xhtml5Rdfa11,
}

impl HtmlProfile {
    /// Picks a profile from the doctype, or failing that the `version`
    /// attribute of the root element. Defaults to [`HtmlProfile::Xhtml5Rdfa11`].
    pub fn detect(document: &Document) -> Self {
        let sniff = |text: &str| {
            if text.contains("XHTML+RDFa 1.0") {
                Some(HtmlProfile::Xhtml1Rdfa10)
            } else if text.contains("XHTML+RDFa 1.1") {
                Some(HtmlProfile::Xhtml1Rdfa11)
            } else {
                None
            }
        };

        document
            .doctype_public_id()
            .and_then(sniff)
            .or_else(|| document.root_element().value().attr("version").and_then(sniff))
            .unwrap_or(HtmlProfile::Xhtml5Rdfa11)
    }

    /// Whether the HTML+RDFa rules apply.
    pub fn is_active(self) -> bool {
        self != HtmlProfile::Disabled
    }

    fn is_xhtml1(self) -> bool {
        matches!(self, HtmlProfile::Xhtml1Rdfa10 | HtmlProfile::Xhtml1Rdfa11)
    }

    /// RDFa 1.0 has no initial context and no `@vocab`, `@prefix` or `@inlist`.
    fn is_rdfa10(self) -> bool {
        self == HtmlProfile::Xhtml1Rdfa10
    }
}

#[derive(Debug, Clone, Default)]
pub struct RdfaOptions {
    /// Overrides profile detection.
    pub profile: Option<HtmlProfile>,
    /// The host language's default vocabulary. HTML defines none.
    pub host_vocabulary: Option<NamedNode>,
    /// Prefixes defined in addition to the RDFa initial context.
    pub host_prefixes: Vec<(String, NamedNode)>,
}

/// Extracts RDFa statements from a [`Document`].
pub struct RdfaDecoder<'d, 'a> {
    document: &'d Document,
    options: RdfaOptions,
    sink: Option<WarningSink<'a>>,
    replay: Replay,
}

impl<'d, 'a> RdfaDecoder<'d, 'a> {
    pub fn new(document: &'d Document, options: RdfaOptions) -> Self {
        Self {
            document,
            options,
            sink: None,
            replay: Replay::default(),
        }
    }

    /// Installs a sink for [`Warning`]s. Without one, warnings are dropped.
    pub fn on_warning(mut self, sink: impl FnMut(Warning) + 'a) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }
}

impl Decoder for RdfaDecoder<'_, '_> {
    fn advance(&mut self) -> bool {
        self.replay
            .advance(|| extract(self.document, &self.options, self.sink.as_mut()))
    }

    fn current(&self) -> Option<&Statement> {
        self.replay.current()
    }

    fn error(&self) -> Option<&Error> {
        self.replay.error()
    }

    fn content_type(&self) -> &'static str {
        RDFA_CONTENT_TYPE
    }
}

impl Iterator for RdfaDecoder<'_, '_> {
    type Item = Result<Statement, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.replay
            .next(|| extract(self.document, &self.options, self.sink.as_mut()))
    }
}

fn extract(
    document: &Document,
    options: &RdfaOptions,
    sink: Option<&mut WarningSink<'_>>,
) -> Result<Vec<Statement>, Error> {
    let base = document.base_iri()?;
    let profile = options.profile.unwrap_or_else(|| HtmlProfile::detect(document));
    tracing::debug!(?profile, "extracting RDFa");

    let processor = RdfaProcessor {
        document,
        profile,
        host_vocabulary: options
            .host_vocabulary
            .clone()
            .filter(|_| profile.is_active()),
        bnodes: RefCell::new(BlankNodeFactory::new()),
        warnings: Warnings::new(sink),
        output: RefCell::new(Vec::new()),
    };

    let eval_context = processor.initial_context(base, options);
    processor.run(eval_context);

    let statements = processor.output.into_inner();
    if profile.is_active() {
        Ok(copying::copy_properties(statements))
    } else {
        Ok(statements)
    }
}

struct RdfaProcessor<'d, 's, 'a> {
    document: &'d Document,
    profile: HtmlProfile,
    host_vocabulary: Option<NamedNode>,
    bnodes: RefCell<BlankNodeFactory>,
    warnings: Warnings<'s, 'a>,
    output: RefCell<Vec<Statement>>,
}

impl<'d> RdfaProcessor<'d, '_, '_> {
    fn initial_context(&self, base: Option<Iri<String>>, options: &RdfaOptions) -> EvaluationContext {
        let mut iri_mappings = if self.profile.is_rdfa10() {
            PrefixMapping::default()
        } else {
            vocab::initial_context_prefixes().clone()
        };

        // [html-rdfa] 3.1
        // > HTML+RDFa uses an additional initial context by default,
        // > which must be applied after the initial context for [rdfa-core].
        // NB: that context is empty, so the only additions are the caller's.
        if self.profile.is_active() {
            for (prefix, iri) in &options.host_prefixes {
                if let Err(err) = iri_mappings.add_prefix(&prefix.to_ascii_lowercase(), iri.as_str())
                {
                    self.warnings.emit(
                        WarningKind::InvalidPrefix,
                        format!("Invalid host prefix '{prefix}': {err:?}"),
                        None,
                    );
                }
            }
        }

        let mut term_mappings = if self.profile.is_rdfa10() {
            BTreeMap::new()
        } else {
            vocab::initial_context_terms().clone()
        };

        if self.profile.is_xhtml1() {
            term_mappings.extend(
                vocab::xhtml_terms()
                    .iter()
                    .map(|(term, iri)| (term.clone(), iri.clone())),
            );
        }

        EvaluationContext::new(
            base,
            iri_mappings,
            term_mappings,
            self.host_vocabulary.clone(),
        )
    }

    fn run(&self, eval_context: EvaluationContext) {
        enum Frame<'a> {
            Element(ElementRef<'a>, Rc<EvaluationContext>),
            FlushLists {
                subject: Resource,
                lists: Rc<RefCell<ListMapping>>,
                container: Option<Container>,
            },
        }

        let root = self.document.root_element();
        let mut stack = vec![Frame::Element(root, Rc::new(eval_context))];

        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Element(element, base_ctx) => {
                    let is_root = element.id() == root.id();
                    let new_ctx = Rc::new(self.process_element(&base_ctx, element, is_root));
                    drop(base_ctx);

                    // lists are written out once all children have been processed
                    stack.push(Frame::FlushLists {
                        subject: new_ctx.parent_subject.clone(),
                        lists: new_ctx.list_mapping.clone(),
                        container: new_ctx.container.clone(),
                    });

                    for child in element.children().rev() {
                        if let Some(child) = ElementRef::wrap(child) {
                            stack.push(Frame::Element(child, new_ctx.clone()));
                        }
                    }
                }
                Frame::FlushLists {
                    subject,
                    lists,
                    container,
                } => {
                    // [rdfa-core] 7.5: 14.
                    // > For each IRI in the local list mapping, if the equivalent list does not
                    // > exist in the evaluation context, indicating that the list was originally
                    // > instantiated on the current element, use the list as follows:
                    //
                    // NB: the mapping is only uniquely owned here if it was created for this element
                    if let Ok(lists) = Rc::try_unwrap(lists) {
                        for (predicate, list) in lists.into_inner().lists {
                            self.flush_list(&subject, &predicate, &list.borrow(), container.as_ref());
                        }
                    }
                }
            }
        }
    }

    fn flush_list(
        &self,
        subject: &Located<NamedOrBlankNode>,
        predicate: &NamedNode,
        list: &context::List,
        container: Option<&Container>,
    ) {
        // > If there are zero items in the list associated with the IRI, generate the following triple:
        if list.items.is_empty() {
            self.emit(
                TripleRef::new(&subject.term, predicate, rdf::NIL),
                [subject.range, list.predicate, None],
                container,
            );
            return;
        }

        // > Otherwise,
        // > - Create a new array array of newly created bnodes, one for each element in the list
        let cells = {
            let mut bnodes = self.bnodes.borrow_mut();
            list.items.iter().map(|_| bnodes.fresh()).collect_vec()
        };

        // > - Finally, using the first bnode in array, generate the following triple:
        self.emit(
            TripleRef::new(&subject.term, predicate, &cells[0]),
            [subject.range, list.predicate, None],
            container,
        );

        // > - Using each bnode in array and each element in the list,
        // >   generate the following triples:
        for (index, (cell, item)) in cells.iter().zip(&list.items).enumerate() {
            self.emit(
                TripleRef::new(cell, rdf::FIRST, &item.term),
                [None, None, item.range],
                container,
            );

            match cells.get(index + 1) {
                Some(next) => self.emit(TripleRef::new(cell, rdf::REST, next), [None; 3], container),
                None => self.emit(TripleRef::new(cell, rdf::REST, rdf::NIL), [None; 3], container),
            }
        }
    }

    fn emit(
        &self,
        triple: TripleRef<'_>,
        [subject, predicate, object]: [Option<TextRange>; 3],
        container: Option<&Container>,
    ) {
        tracing::trace!(%triple, "emitting triple");
        let offsets = self.document.offsets_captured().then_some(TextOffsets {
            subject,
            predicate,
            object,
        });

        self.output.borrow_mut().push(Statement {
            triple: triple.into_owned(),
            offsets,
            container: container.cloned(),
        });
    }

    fn attribute_value_range(&self, node: NodeId, name: &str) -> Option<TextRange> {
        self.document.attribute_offsets(node, name)?.value
    }

    fn attribute_key_range(&self, node: NodeId, name: &str) -> Option<TextRange> {
        Some(self.document.attribute_offsets(node, name)?.key)
    }

    fn process_element(
        &self,
        eval_context: &EvaluationContext,
        element: ElementRef<'d>,
        is_root_element: bool,
    ) -> EvaluationContext {
        let el = element.value();
        let node = element.id();
        let profile = self.profile;
        let active = profile.is_active();

        let element_range = self.document.node_metadata(node).map(|m| m.node);
        let emit_warning =
            |kind: WarningKind, message: String| self.warnings.emit(kind, message, element_range);

        tracing::trace!(element = el.name(), attrs = ?el.attrs().collect_vec(), "processing element");

        // [rdfa-core] 7.5: 1.
        let mut local = LocalScope::new(eval_context, profile, &self.bnodes, &emit_warning);

        // [html-rdfa] extension #2
        // > If the @xml:base attribute is present, it is used to set the base.
        if active {
            if let Some(xml_base) = el.attr("xml:base") {
                let resolved = match &local.base {
                    Some(base) => base.resolve(xml_base),
                    None => Iri::parse(xml_base.to_string()),
                };

                match resolved {
                    Ok(base) => {
                        tracing::trace!(%base, "base is now");
                        local.base = Some(base.resolve("").unwrap_or(base));
                    }
                    Err(err) => emit_warning(
                        WarningKind::InvalidIri,
                        format!("Invalid @xml:base <{xml_base}> ({err})"),
                    ),
                }
            }
        }

        // [rdfa-core] 7.5: 2.
        // > Next the current element is examined for any change to the default vocabulary via @vocab.
        if let Some(vocab) = el.attr("vocab").filter(|_| !profile.is_rdfa10()) {
            if vocab.is_empty() {
                // > If the value is empty, then the local default vocabulary
                // > MUST be reset to the Host Language defined default (if any).
                local.default_vocab = self.host_vocabulary.clone();
            }
            // > If @vocab is present and contains a value,
            else if let Some(vocab_iri) = local.attribute_iri(vocab) {
                tracing::trace!(%vocab_iri, "default vocabulary is now");
                // > The value of @vocab is used to generate a triple as follows:
                self.emit(
                    TripleRef::new(
                        // >   subject = base
                        &local.empty_curie(),
                        // >   predicate = http://www.w3.org/ns/rdfa#usesVocabulary
                        rdfa_vocab::USES_VOCABULARY,
                        // >   object = value from @vocab
                        &vocab_iri,
                    ),
                    [
                        None,
                        self.attribute_key_range(node, "vocab"),
                        self.attribute_value_range(node, "vocab"),
                    ],
                    eval_context.container.as_ref(),
                );
                local.default_vocab = Some(vocab_iri);
            }
        }

        // [rdfa-core] 7.5: 3.
        // > Next, the current element is examined for IRI mappings and these are added to the local list of IRI mappings.
        // > Note that an IRI mapping will simply overwrite any current mapping in the list that has the same name;
        let mut prefixes: Vec<(String, &str)> = Vec::new();
        if profile != HtmlProfile::Disabled {
            for (qn, value) in el.attrs.iter() {
                let name = qualified_name(qn.prefix.as_deref(), &qn.local);
                if let Some(prefix) = name.strip_prefix("xmlns:") {
                    prefixes.push((prefix.to_ascii_lowercase(), &**value));
                }
            }
        }

        if let Some(prefix_attr) = el.attr("prefix").filter(|_| !profile.is_rdfa10()) {
            let tokens = prefix_attr.split_ascii_whitespace().collect_vec();
            if tokens.len() % 2 != 0 {
                emit_warning(
                    WarningKind::InvalidPrefix,
                    format!("@prefix has an odd number of values: '{prefix_attr}'"),
                );
            }

            for (prefix, iri) in tokens.into_iter().tuples() {
                match prefix.strip_suffix(':') {
                    Some(prefix) => prefixes.push((prefix.to_ascii_lowercase(), iri)),
                    None => emit_warning(
                        WarningKind::InvalidPrefix,
                        format!("@prefix syntax error: '{prefix}' must end with ':'"),
                    ),
                }
            }
        }

        if !prefixes.is_empty() {
            let mut mappings = Rc::unwrap_or_clone(local.iri_mappings);
            // note that we do not ever set_default,
            // this would define a "no prefix" mapping
            // which is MUST NOT in RDFa
            let mut seen: BTreeMap<&str, &str> = BTreeMap::new();
            for (prefix, iri) in &prefixes {
                if prefix == "_" {
                    emit_warning(
                        WarningKind::InvalidPrefix,
                        "Invalid prefix: the prefix '_' is reserved".to_string(),
                    );
                    continue;
                }

                if rxml_validation::validate_ncname(prefix).is_err() {
                    emit_warning(
                        WarningKind::InvalidPrefix,
                        format!("Invalid prefix: '{prefix}' is not an NCName"),
                    );
                    continue;
                }

                if let Some(previous) = seen.insert(prefix, iri) {
                    if previous != *iri {
                        emit_warning(
                            WarningKind::PrefixRedefinition,
                            format!("Prefix '{prefix}' redefined from <{previous}> to <{iri}>"),
                        );
                    }
                }

                if let Err(err) = mappings.add_prefix(prefix, iri) {
                    emit_warning(
                        WarningKind::InvalidPrefix,
                        format!("Invalid prefix '{prefix}': {err:?}"),
                    );
                }
            }

            local.iri_mappings = Rc::new(mappings);
        }

        // [rdfa-core] 7.5: 4.
        // > The current element is also parsed for any language information,
        // > and if present, current language is set accordingly;
        //
        // [html-rdfa] 3.1
        // > When the @lang attribute and the @xml:lang attribute are specified
        // > on the same element, the @xml:lang attribute takes precedence.
        let lang = if active {
            el.attr("xml:lang").or_else(|| el.attr("lang"))
        } else {
            el.attr("lang")
        };

        if let Some(lang) = lang {
            if lang.is_empty() {
                local.current_language = None;
            } else {
                match LanguageIdentifier::from_str(lang) {
                    Ok(lang) => {
                        tracing::trace!(%lang, "current language is now");
                        local.current_language = Some(Rc::new(lang));
                    }
                    Err(err) => emit_warning(
                        WarningKind::InvalidLanguage,
                        format!("Invalid language identifier ({lang}): {err}"),
                    ),
                }
            }
        }

        let locate = |name: &str, value: &str, offset: usize, len: usize| {
            self.attribute_value_range(node, name)
                .map(|range| self.document.narrow(range, value, offset, len))
        };

        let to_predicate = |name: &str, v: Located<NamedOrBlankNode>| match v.term {
            NamedOrBlankNode::NamedNode(term) => Some(Located::new(term, v.range)),
            NamedOrBlankNode::BlankNode(b) => {
                emit_warning(
                    WarningKind::BlankNodePredicate,
                    format!("@{name} cannot refer to a bnode: [{b}]"),
                );
                None
            }
        };

        let attr1 = |name: &str, proj: &dyn Fn(&str) -> Option<NamedOrBlankNode>| match el.attr(name)
        {
            None => Attr::Missing,
            Some(v) => match proj(v) {
                None => Attr::Empty,
                Some(term) => Attr::Value(Located::new(term, self.attribute_value_range(node, name))),
            },
        };

        let attr_iri = |name: &str| match el.attr(name) {
            None => Attr::Missing,
            Some(v) => match local.attribute_iri(v) {
                None => Attr::Empty,
                Some(iri) => Attr::Value(Located::new(iri, self.attribute_value_range(node, name))),
            },
        };

        let tokens = |name: &str, value: &str, proj: &dyn Fn(&str) -> Option<NamedOrBlankNode>| {
            split_tokens(value)
                .filter_map(|(offset, token)| {
                    Some(Located::new(proj(token)?, locate(name, value, offset, token.len())))
                })
                .collect_vec()
        };

        let attr_many = |name: &str, proj: &dyn Fn(&str) -> Option<NamedOrBlankNode>| match el.attr(name) {
            None => Attr::Missing,
            Some(v) => match Vec1::try_from_vec(tokens(name, v, proj)) {
                Err(Size0Error) => Attr::Empty,
                Ok(v) => Attr::Value(v),
            },
        };

        let attr_many_pred =
            |name: &str, proj: &dyn Fn(&str) -> Option<NamedOrBlankNode>| match el.attr(name) {
                None => Attr::Missing,
                Some(v) => {
                    let data = tokens(name, v, proj)
                        .into_iter()
                        .filter_map(|v| to_predicate(name, v))
                        .collect();
                    match Vec1::try_from_vec(data) {
                        Err(Size0Error) => Attr::Empty,
                        Ok(v) => Attr::Value(v),
                    }
                }
            };

        let property: Attr<Vec1<Located<NamedNode>>> =
            attr_many_pred("property", &|v| local.term_or_curie_or_absiri(v));

        let inlist = el.attr("inlist").is_some() && !profile.is_rdfa10();

        // [html-rdfa] 3.1
        // Link types that only instruct the browser say nothing about the linked resource.
        let is_excluded_link = |token: &str| {
            active && !token.contains(':') && vocab::is_non_semantic_link(el.name(), token)
        };
        let rel_attr = el
            .attr("rel")
            .filter(|v| v.trim().is_empty() || !v.split_ascii_whitespace().all(is_excluded_link));

        let rel_dir = if inlist {
            Relation::List
        } else {
            Relation::Forward
        };
        let rev_dir = Relation::Reverse;

        let rel_tokens = |proj: &dyn Fn(&str) -> Option<NamedOrBlankNode>| match rel_attr {
            None => Attr::Missing,
            Some(_) => attr_many_pred("rel", &|v| if is_excluded_link(v) { None } else { proj(v) }),
        };

        let rel: Option<Vec<Relation>>;
        let rev: Option<Vec<Relation>>;

        if property.is_present() {
            // [html-rdfa] extension #7
            // > if the @property attribute and the @rel and/or @rev attribute exists
            // > on the same element, the non-CURIE and non-URI @rel and @rev values
            // > are ignored. If, after this, the value of @rel and/or @rev becomes empty,
            // > then the processor MUST act as if the respective attribute is not present.
            rel = match rel_tokens(&|v| local.curie_or_absiri_only(v)) {
                Attr::Missing | Attr::Empty => None,
                Attr::Value(v) => Some(v.into_iter().map(rel_dir).collect()),
            };
            rev = match attr_many_pred("rev", &|v| local.curie_or_absiri_only(v)) {
                Attr::Missing | Attr::Empty => None,
                Attr::Value(v) => Some(v.into_iter().map(rev_dir).collect()),
            };
        } else {
            rel = match rel_tokens(&|v| local.term_or_curie_or_absiri(v)) {
                Attr::Missing => None,
                Attr::Empty => Some(Vec::new()),
                Attr::Value(v) => Some(v.into_iter().map(rel_dir).collect()),
            };
            rev = match attr_many_pred("rev", &|v| local.term_or_curie_or_absiri(v)) {
                Attr::Missing => None,
                Attr::Empty => Some(Vec::new()),
                Attr::Value(v) => Some(v.into_iter().map(rev_dir).collect()),
            };
        }

        let relations = match (rel, rev) {
            (None, None) => None,
            (Some(rel), None) => Some(rel),
            (None, Some(rev)) => Some(rev),
            (Some(mut rel), Some(rev)) => {
                rel.extend(rev);
                Some(rel)
            }
        };

        // [role-attribute]
        // > If a Host Language contains the @role attribute, then an
        // > RDFa processor processing a document written in that Host Language
        // > according to the rules of that Host Language MAY generate additional
        // > triples for role attributes.
        if let Some(role) = el.attr("role") {
            // > If @id is present, it is used to supply the subject by concatenating
            // > the document's 'base', a fragment separator '#', and the value of @id.
            // > Otherwise the subject is a unique newly created bnode.
            let role_subject = match el.attr("id") {
                Some(id) => local
                    .attribute_iri(&format!("#{id}"))
                    .map(|iri| Located::new(iri.into(), self.attribute_value_range(node, "id"))),
                None => Some(Located::new(local.fresh_bnode(), None)),
            };

            // > An RDFa Processor MUST behave as if there is an in-scope vocabulary
            // > of http://www.w3.org/1999/xhtml/vocab# for the value(s) of the @role attribute.
            let role_local = LocalScope {
                default_vocab: Some(NamedNode::new_unchecked(xhv_vocab::NAMESPACE)),
                ..local.clone()
            };

            if let Some(role_subject) = role_subject {
                // > Remember that @role values are defined using the datatype TERMorCURIEorAbsIRIs.
                for role in tokens("role", role, &|v| role_local.term_or_curie_or_absiri(v)) {
                    // > The predicate is the term `role` in the vocabulary
                    // > defined at http://www.w3.org/1999/xhtml/vocab.
                    self.emit(
                        TripleRef::new(&role_subject.term, xhv_vocab::ROLE, &role.term),
                        [
                            role_subject.range,
                            self.attribute_key_range(node, "role"),
                            role.range,
                        ],
                        eval_context.container.as_ref(),
                    );
                }
            }
        }

        let content = el.attr("content");

        let type_of: Attr<Vec1<Located<NamedOrBlankNode>>> =
            attr_many("typeof", &|v| local.term_or_curie_or_absiri(v));
        let typeof_range = self.attribute_value_range(node, "typeof");

        let about: Attr<Resource> =
            attr1("about", &|v| local.safecurie_or_curie_or_iri(v)).map(Rc::new);
        let resource: Attr<Resource> =
            attr1("resource", &|v| local.safecurie_or_curie_or_iri(v)).map(Rc::new);

        let href: Attr<Located<NamedNode>> = attr_iri("href");
        let src: Attr<Located<NamedNode>> = attr_iri("src");

        let datatype: Attr<Located<NamedNode>> = match el.attr("datatype") {
            None => Attr::Missing,
            Some(v) if v.trim().is_empty() => Attr::Empty,
            Some(_) => match attr1("datatype", &|v| local.term_or_curie_or_absiri(v.trim())) {
                Attr::Value(v) => to_predicate("datatype", v).map_or(Attr::Empty, Attr::Value),
                Attr::Missing => Attr::Missing,
                Attr::Empty => Attr::Empty,
            },
        };

        // read from the "resource attributes"
        let resource_present = resource.is_present() || href.is_present() || src.is_present();
        let resource_value: Option<Resource> = resource
            .value()
            .cloned()
            .or_else(|| {
                let href = href.value()?;
                Some(Rc::new(Located::new(href.term.clone().into(), href.range)))
            })
            .or_else(|| {
                let src = src.value()?;
                Some(Rc::new(Located::new(src.term.clone().into(), src.range)))
            });

        let fresh_typed_bnode = || -> Resource {
            Rc::new(Located::new(self.bnodes.borrow_mut().fresh().into(), typeof_range))
        };

        // [rdfa-core] 7.5: 5.
        // > If the current element contains no @rel or @rev attribute,
        if relations.is_none() {
            // > then the next step is to establish a value for new subject.
            // > This step has two possible alternatives.
            //
            // 5.1
            // > If the current element contains the @property attribute, but does
            // > not contain either the @content or @datatype attributes, then
            if property.is_present() && content.is_none() && !datatype.is_present() {
                // > new subject is set to the resource obtained from the first match from the following rule:
                // >
                // > - by using the resource from @about, if present,
                if let Some(about) = about.value() {
                    tracing::trace!("using @about as new subject");
                    local.new_subject = Some(about.clone());
                }
                // > - otherwise, if the element is the root element of the document,
                // >   then act as if there is an empty @about present,
                else if is_root_element {
                    local.new_subject = Some(Rc::new(Located::new(local.empty_curie().into(), None)));
                }
                // > - otherwise, if parent object is present, new subject is set to the value of parent object.
                else if let Some(parent_object) = &eval_context.parent_object {
                    tracing::trace!(parent_object = %parent_object.term, "using parent object as new subject");
                    local.new_subject = Some(parent_object.clone());
                }

                // > If @typeof is present then typed resource is set to the resource obtained from
                // > the first match from the following rules:
                if type_of.is_present() {
                    // > by using the resource from @about, if present,
                    if let Some(about) = about.value() {
                        local.typed_resource = Some(about.clone());
                    }
                    // > otherwise, if the element is the root element of the document,
                    // > then act as if there is an empty @about present
                    else if is_root_element {
                        local.typed_resource =
                            Some(Rc::new(Located::new(local.empty_curie().into(), None)));
                    }
                    // > otherwise,
                    else {
                        // > by using the resource from @resource, if present;
                        // > otherwise, by using the IRI from @href, if present;
                        // > otherwise, by using the IRI from @src, if present;
                        // > otherwise, the value of typed resource is set to a newly created bnode.
                        let typed_resource = resource_value.clone().unwrap_or_else(fresh_typed_bnode);

                        // > The value of the current object resource is then set to the value of typed resource.
                        local.typed_resource = Some(typed_resource.clone());
                        local.current_object_resource = Some(typed_resource);
                    }
                }
            }
            // 5.2: “otherwise:
            else {
                // [html-rdfa] extension #8
                let is_head_or_body = active && (el.name() == "head" || el.name() == "body");

                // > If the element contains an @about, @href, @src, or @resource attribute,
                // > new subject is set to the resource obtained as follows:
                if about.is_present() || resource_present {
                    // > by using the resource from @about, if present;
                    // > otherwise, by using the resource from @resource, if present;
                    // > otherwise, by using the IRI from @href, if present;
                    // > otherwise, by using the IRI from @src, if present.
                    local.new_subject = about.value().cloned().or_else(|| resource_value.clone());
                }

                // [html-rdfa] extension #8
                // > if no IRI is provided by a resource attribute, then first check to see if
                // > the element is the head or body element. If it is, then set new subject to parent object.
                if local.new_subject.is_none() && is_head_or_body {
                    local.new_subject = eval_context.parent_object.clone();
                }

                // > otherwise, if no resource is provided by a resource attribute,
                // > then the first match from the following rules will apply:
                if local.new_subject.is_none() {
                    // > if the element is the root element of the document,
                    // > then act as if there is an empty @about present,
                    if is_root_element {
                        local.new_subject =
                            Some(Rc::new(Located::new(local.empty_curie().into(), None)));
                    }
                    // > otherwise, if @typeof is present,
                    // > then new subject is set to be a newly created bnode;
                    else if type_of.is_present() {
                        local.new_subject = Some(fresh_typed_bnode());
                    }
                    // > otherwise, if parent object is present,
                    // > new subject is set to the value of parent object.
                    else if let Some(parent_object) = &eval_context.parent_object {
                        local.new_subject = Some(parent_object.clone());

                        // > Additionally, if @property is not present then the skip element flag is set to 'true'.
                        if !property.is_present() {
                            tracing::trace!("skipping element (no @property)");
                            local.skip_element = true;
                        }
                    }
                }

                // > Finally, if @typeof is present, set the typed resource to the value of new subject.
                if type_of.is_present() {
                    local.typed_resource = local.new_subject.clone();
                }
            }
        }
        // [rdfa-core] 7.5: 6.
        else {
            // > If the current element does contain a @rel or @rev attribute,
            // > then the next step is to establish both a value for new subject
            // > and a value for current object resource:
            //
            // > new subject is set to the resource obtained from the first match from the following rules:
            // > by using the resource from @about, if present,
            if let Some(about) = about.value() {
                local.new_subject = Some(about.clone());

                // > if the @typeof attribute is present, set typed resource to new subject.
                if type_of.is_present() {
                    local.typed_resource = local.new_subject.clone();
                }
            }

            // > If no resource is provided then the first match from the following rules will apply:
            if local.new_subject.is_none() {
                // > if the element is the root element of the document
                // > then act as if there is an empty @about present,
                if is_root_element {
                    local.new_subject = Some(Rc::new(Located::new(local.empty_curie().into(), None)));
                }
                // > otherwise, if parent object is present, new subject is set to that.
                else {
                    local.new_subject = eval_context.parent_object.clone();
                }
            }

            // > Then the current object resource is set to the resource obtained from the first match from the following rules:
            // > by using the resource from @resource, if present;
            // > otherwise, by using the IRI from @href, if present;
            // > otherwise, by using the IRI from @src, if present;
            if let Some(resource) = &resource_value {
                local.current_object_resource = Some(resource.clone());
            }
            // > otherwise, if @typeof is present and @about is not, use a newly created bnode.
            else if type_of.is_present() && !about.is_present() {
                local.current_object_resource = Some(fresh_typed_bnode());
            }

            // > If @typeof is present and @about is not, set typed resource to current object resource.
            if type_of.is_present() && !about.is_present() {
                local.typed_resource = local.current_object_resource.clone();
            }
        }

        // statements about a typed resource belong to it
        let container = match &local.typed_resource {
            Some(typed) => Some(Container(typed.term.clone())),
            None => eval_context.container.clone(),
        };

        // [rdfa-core] 7.5: 7.
        // > If in any of the previous steps a typed resource was set to a non-null value,
        // > it is now used to provide a subject for type values;
        if let (Some(typed_resource), Some(type_of)) = (&local.typed_resource, type_of.value()) {
            let type_predicate_range = self.attribute_key_range(node, "typeof");
            for type_iri in type_of {
                self.emit(
                    TripleRef::new(
                        // subject = typed resource
                        &typed_resource.term,
                        // predicate = http://www.w3.org/1999/02/22-rdf-syntax-ns#type
                        rdf::TYPE,
                        // object = current full IRI of 'type' from typed resource
                        &type_iri.term,
                    ),
                    [typed_resource.range, type_predicate_range, type_iri.range],
                    container.as_ref(),
                );
            }
        }

        // [rdfa-core] 7.5: 8.
        // > If in any of the previous steps a new subject was set to a non-null value different from the parent object;
        // > The list mapping taken from the evaluation context is set to a new, empty mapping.
        if let Some(new_subject) = &local.new_subject {
            if eval_context
                .parent_object
                .as_ref()
                .is_none_or(|parent| parent.term != new_subject.term)
            {
                local.list_mappings = Default::default();
            }
        }

        // [rdfa-core] 7.5: 9.
        // > If in any of the previous steps a current object resource was set to a non-null value,
        // > it is now used to generate triples and add entries to the local list mapping:
        if let Some(current_object_resource) = &local.current_object_resource {
            if let (Some(relations), Some(new_subject)) = (&relations, &local.new_subject) {
                for relation in relations {
                    match relation {
                        // > If the element contains both the @inlist and the @rel attributes the @rel may contain
                        // > one or more resources each of which is used to add an entry to the list mapping
                        Relation::List(predicate) => {
                            local.list_mappings.borrow_mut().insert_value(
                                predicate,
                                Located::new(
                                    current_object_resource.term.clone().into(),
                                    current_object_resource.range,
                                ),
                            );
                        }
                        // > If present, @rel may contain one or more resources each of which is used to
                        // > generate a triple as follows:
                        Relation::Forward(predicate) => self.emit(
                            TripleRef::new(
                                //  subject = new subject
                                &new_subject.term,
                                //  predicate = full IRI
                                &predicate.term,
                                //  object = current object resource
                                &current_object_resource.term,
                            ),
                            [new_subject.range, predicate.range, current_object_resource.range],
                            container.as_ref(),
                        ),
                        // > If present, @rev may contain one or more resources each of which is used to
                        // > generate a triple as follows:
                        Relation::Reverse(predicate) => self.emit(
                            TripleRef::new(
                                //  subject = current object resource
                                &current_object_resource.term,
                                //  predicate = full IRI
                                &predicate.term,
                                //  object = new subject
                                &new_subject.term,
                            ),
                            [current_object_resource.range, predicate.range, new_subject.range],
                            container.as_ref(),
                        ),
                    }
                }
            }
        }
        // [rdfa-core] 7.5: 10.
        // > If however current object resource was set to null, but there are predicates present,
        // > then they must be stored as incomplete triples, pending the discovery of a subject
        // > that can be used as the object.
        else if let Some(relations) = &relations {
            // > Also, current object resource should be set to a newly created bnode
            // > (so that the incomplete triples have a subject to connect to if they are ultimately turned into triples);
            local.current_object_resource = Some(Rc::new(Located::new(local.fresh_bnode(), None)));
            for relation in relations {
                let incomplete = match relation {
                    // > If the element contains the @inlist attribute,
                    // > then if the local list mapping does not contain a list associated with the IRI,
                    // > instantiate a new list and add to local list mappings.
                    Relation::List(predicate) => {
                        IncompleteTriple::List(local.list_mappings.borrow_mut().ensure_list(predicate))
                    }
                    // > - predicate = full IRI
                    // > - direction = forward
                    Relation::Forward(predicate) => IncompleteTriple::Forward(predicate.clone()),
                    // > - predicate = full IRI
                    // > - direction = reverse
                    Relation::Reverse(predicate) => IncompleteTriple::Reverse(predicate.clone()),
                };
                local.incomplete_triples.push(incomplete);
            }

            tracing::trace!(incomplete_triples = ?local.incomplete_triples, "stored incomplete triples");
        }

        // [rdfa-core] 7.5: 11.
        // > The next step of the iteration is to establish any current property value;
        if let Some(properties) = property.into_value() {
            let lang = local
                .current_language
                .as_ref()
                .map(|l| l.to_string().to_ascii_lowercase());
            let plain_literal = |value: &str| -> Term {
                match &lang {
                    Some(lang) => Literal::new_language_tagged_literal_unchecked(value, lang).into(),
                    None => Literal::new_simple_literal(value).into(),
                }
            };

            let text = || {
                let text = text_content(element);
                let range = self.document.text_range(node, &text);
                Located::new(Cow::Owned(text), range)
            };

            let mut otherwise_datatype: Option<NamedNodeRef<'static>> = None;
            let content_val: Located<Cow<str>> = if let Some(content) = content {
                Located::new(Cow::Borrowed(content), self.attribute_value_range(node, "content"))
            } else if active && (el.attr("datetime").is_some() || el.name() == "time") {
                // [html-rdfa] extension #9 & #10
                let value = match el.attr("datetime") {
                    Some(datetime) => Located::new(
                        Cow::Borrowed(datetime),
                        self.attribute_value_range(node, "datetime"),
                    ),
                    None => text(),
                };
                otherwise_datatype = rdfa_temporal_datatype(&value.term);
                value
            } else {
                text()
            };

            let current_property_value: Located<Term> = match &datatype {
                // > as a plain literal if @datatype is present but has an empty value
                Attr::Empty => Located::new(plain_literal(&content_val.term), content_val.range),
                Attr::Value(datatype)
                    if datatype.term.as_ref() == rdf::XML_LITERAL
                        || datatype.term.as_ref() == rdf_vocab::HTML =>
                {
                    // > otherwise, as an XML literal if @datatype is present and is set to
                    // > XMLLiteral in the vocabulary http://www.w3.org/1999/02/22-rdf-syntax-ns#.
                    // > The value of the XML literal is a string created by serializing to text,
                    // > all nodes that are descendants of the current element
                    Located::new(
                        Literal::new_typed_literal(serialize_children(element), datatype.term.clone())
                            .into(),
                        self.document.inner_range(node),
                    )
                }
                // > as a typed literal if @datatype is present, does not have an empty value,
                // > and is not set to XMLLiteral
                Attr::Value(datatype) => Located::new(
                    Literal::new_typed_literal(&*content_val.term, datatype.term.clone())
                        .into(),
                    content_val.range,
                ),
                Attr::Missing => {
                    // [html-rdfa] extension #9
                    // > if the value of @datetime lexically matches a valid xsd:date, xsd:time,
                    // > xsd:dateTime, xsd:duration, xsd:gYear, or xsd:gYearMonth a typed literal must be generated,
                    // > with its datatype set to the matching xsd datatype.
                    if let Some(otherwise_datatype) = otherwise_datatype {
                        Located::new(
                            Literal::new_typed_literal(&*content_val.term, otherwise_datatype)
                                .into(),
                            content_val.range,
                        )
                    }
                    // > otherwise, as a plain literal using the value of @content if @content is present.
                    else if content.is_some() {
                        Located::new(plain_literal(&content_val.term), content_val.range)
                    }
                    // > otherwise, if the @rel, @rev, and @content attributes are not present,
                    // > as a resource obtained from @resource, @href or @src
                    else if let Some(resource) = resource_value.as_ref().filter(|_| relations.is_none()) {
                        Located::new(resource.term.clone().into(), resource.range)
                    }
                    // > otherwise, if @typeof is present and @about is not, the value of typed resource.
                    else if let Some(typed) = local
                        .typed_resource
                        .as_ref()
                        .filter(|_| type_of.is_present() && !about.is_present())
                    {
                        Located::new(typed.term.clone().into(), typed.range)
                    }
                    // > otherwise as a plain literal.
                    else {
                        Located::new(plain_literal(&content_val.term), content_val.range)
                    }
                }
            };

            // > If the element also includes the @inlist attribute, the current property
            // > value is added to the local list mapping as follows:
            if inlist {
                for property in &properties {
                    local
                        .list_mappings
                        .borrow_mut()
                        .insert_value(property, current_property_value.clone());
                }
            }
            // > Otherwise the current property value is used to generate a triple as follows:
            else if let Some(new_subject) = &local.new_subject {
                for property in &properties {
                    self.emit(
                        TripleRef::new(
                            // subject = new subject
                            &new_subject.term,
                            // predicate = full IRI
                            &property.term,
                            // object = current property value
                            &current_property_value.term,
                        ),
                        [new_subject.range, property.range, current_property_value.range],
                        container.as_ref(),
                    );
                }
            }
        }

        // [rdfa-core] 7.5: 12.
        // > If the skip element flag is 'false', and new subject was set to a non-null value,
        // > then any incomplete triples within the current context should be completed:
        if let Some(new_subject) = local.new_subject.as_ref().filter(|_| !local.skip_element) {
            let parent_subject = &eval_context.parent_subject;
            for incomplete in &eval_context.incomplete_triples {
                match incomplete {
                    // > If direction is 'none',
                    // > the new subject is added to the list from the iterated incomplete triple.
                    IncompleteTriple::List(list) => list.borrow_mut().items.push(Located::new(
                        new_subject.term.clone().into(),
                        new_subject.range,
                    )),
                    // > If direction is 'forward' then the following triple is generated:
                    IncompleteTriple::Forward(predicate) => self.emit(
                        TripleRef::new(
                            // subject = parent subject
                            &parent_subject.term,
                            // predicate = the predicate from the iterated incomplete triple
                            &predicate.term,
                            // object = new subject
                            &new_subject.term,
                        ),
                        [parent_subject.range, predicate.range, new_subject.range],
                        container.as_ref(),
                    ),
                    // > If direction is 'reverse' then this is the triple generated:
                    IncompleteTriple::Reverse(predicate) => self.emit(
                        TripleRef::new(
                            // subject = new subject
                            &new_subject.term,
                            // predicate = the predicate from the iterated incomplete triple
                            &predicate.term,
                            // object = parent subject
                            &parent_subject.term,
                        ),
                        [new_subject.range, predicate.range, parent_subject.range],
                        container.as_ref(),
                    ),
                }
            }
        }

        // [rdfa-core] 7.5: 13.
        // > Next, all elements that are children of the current element are processed
        // > using the rules described here, using a new evaluation context, initialized as follows:
        //
        // > If the skip element flag is 'true' then the new evaluation context is a copy of the current
        // > context that was passed in to this level of processing, with the language and list of IRI
        // > mappings values replaced with the local values;
        if local.skip_element {
            return EvaluationContext {
                language: local.current_language,
                iri_mappings: local.iri_mappings,
                // ERRATA: this also needs to be copied
                default_vocab: local.default_vocab,
                ..eval_context.clone()
            };
        }

        // > the parent object is set to value of current object resource, if non-null,
        // > or the value of new subject, if non-null, or the value of the parent subject
        // > of the current evaluation context;
        let parent_object = local
            .current_object_resource
            .as_ref()
            .or(local.new_subject.as_ref())
            .cloned()
            .unwrap_or_else(|| eval_context.parent_subject.clone());

        // NB: whether this is the right boundary for an item is unclear;
        // an untyped element keeps its parent's item only while the parent object is unchanged.
        let container = if local.typed_resource.is_some() {
            container
        } else if eval_context
            .parent_object
            .as_ref()
            .is_some_and(|parent| parent.term == parent_object.term)
        {
            eval_context.container.clone()
        } else {
            None
        };

        // > Otherwise, the values are:
        EvaluationContext {
            // > the base is set to the base value of the current evaluation context;
            base: local.base,
            // > the parent subject is set to the value of new subject, if non-null,
            // > or the value of the parent subject of the current evaluation context;
            parent_subject: local
                .new_subject
                .unwrap_or_else(|| eval_context.parent_subject.clone()),
            parent_object: Some(parent_object),
            // > the list of IRI mappings is set to the local list of IRI mappings;
            iri_mappings: local.iri_mappings,
            // > the list of incomplete triples is set to the local list of incomplete triples;
            incomplete_triples: local.incomplete_triples,
            // > the list mapping is set to the local list mapping;
            list_mapping: local.list_mappings,
            // > language is set to the value of current language.
            language: local.current_language,
            // > the default vocabulary is set to the value of the local default vocabulary.
            default_vocab: local.default_vocab,
            // ERRATA: undocumented, but assumed
            term_mappings: local.term_mappings,
            container,
        }
    }
}
