//! HTML Microdata, as described by the
//! [WHATWG](https://html.spec.whatwg.org/multipage/microdata.html),
//! mapped onto RDF.

mod vocabulary;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use ego_tree::NodeId;
use itertools::Itertools;
use oxiri::Iri;
use oxrdf::vocab::rdf;
use oxrdf::{Literal, NamedNode, NamedOrBlankNode, Term, TripleRef};
use scraper::ElementRef;

use crate::Error;
use crate::bnode::BlankNodeFactory;
use crate::datatypes::{microdata_temporal_datatype, numeric_datatype};
use crate::decoder::{Decoder, MICRODATA_CONTENT_TYPE, Replay};
use crate::document::{Document, resolve_reference, split_tokens, text_content};
use crate::statement::{Container, Statement, TextOffsets, TextRange};
use crate::warning::{Warning, WarningKind, WarningSink, Warnings};

pub use vocabulary::{IdentityResolver, ItemtypeRelativeResolver, VocabularyResolver};

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

#[derive(Debug, Clone)]
pub struct MicrodataOptions {
    /// Maps `itemprop` names to predicates. Defaults to [`IdentityResolver`].
    pub resolver: Rc<dyn VocabularyResolver>,
}

impl Default for MicrodataOptions {
    fn default() -> Self {
        Self {
            resolver: Rc::new(IdentityResolver),
        }
    }
}

/// Extracts Microdata statements from a [`Document`].
pub struct MicrodataDecoder<'d, 'a> {
    document: &'d Document,
    options: MicrodataOptions,
    sink: Option<WarningSink<'a>>,
    replay: Replay,
}

impl<'d, 'a> MicrodataDecoder<'d, 'a> {
    pub fn new(document: &'d Document, options: MicrodataOptions) -> Self {
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

impl Decoder for MicrodataDecoder<'_, '_> {
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
        MICRODATA_CONTENT_TYPE
    }
}

impl Iterator for MicrodataDecoder<'_, '_> {
    type Item = Result<Statement, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.replay
            .next(|| extract(self.document, &self.options, self.sink.as_mut()))
    }
}

fn extract(
    document: &Document,
    options: &MicrodataOptions,
    sink: Option<&mut WarningSink<'_>>,
) -> Result<Vec<Statement>, Error> {
    let processor = MicrodataProcessor {
        document,
        base: document.base_iri()?,
        resolver: options.resolver.as_ref(),
        resolved: RefCell::new(HashMap::new()),
        bnodes: RefCell::new(BlankNodeFactory::new()),
        warnings: Warnings::new(sink),
        output: RefCell::new(Vec::new()),
    };

    processor.run();
    Ok(processor.output.into_inner())
}

/// The subject of an item, and where it was written.
#[derive(Debug, Clone)]
struct Item {
    subject: NamedOrBlankNode,
    range: Option<TextRange>,
}

#[derive(Debug, Clone, Default)]
struct EvaluationContext {
    /// The item that properties found here belong to.
    item: Option<Rc<Item>>,
    itemtypes: Rc<[NamedNode]>,
    container: Option<Container>,
    /// Ids followed via `itemref` to get here.
    itemref_chain: Rc<[String]>,
}

struct MicrodataProcessor<'d, 'r, 's, 'a> {
    document: &'d Document,
    base: Option<Iri<String>>,
    resolver: &'r dyn VocabularyResolver,
    /// Every `itemscope` element seen so far, and its subject.
    resolved: RefCell<HashMap<NodeId, Rc<Item>>>,
    bnodes: RefCell<BlankNodeFactory>,
    warnings: Warnings<'s, 'a>,
    output: RefCell<Vec<Statement>>,
}

type Frame<'d> = (ElementRef<'d>, Rc<EvaluationContext>);

impl<'d> MicrodataProcessor<'d, '_, '_, '_> {
    fn run(&self) {
        let mut stack: Vec<Frame<'d>> = vec![(
            self.document.root_element(),
            Rc::new(EvaluationContext::default()),
        )];

        while let Some((element, ctx)) = stack.pop() {
            self.process_element(&ctx, element, &mut stack);
        }
    }

    fn push_children(stack: &mut Vec<Frame<'d>>, element: ElementRef<'d>, ctx: &Rc<EvaluationContext>) {
        for child in element.children().rev() {
            if let Some(child) = ElementRef::wrap(child) {
                stack.push((child, ctx.clone()));
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

    fn warn(&self, node: NodeId, kind: WarningKind, message: String) {
        let range = self.document.node_metadata(node).map(|m| m.node);
        self.warnings.emit(kind, message, range);
    }

    fn attribute_value_range(&self, node: NodeId, name: &str) -> Option<TextRange> {
        self.document.attribute_offsets(node, name)?.value
    }

    /// Each distinct `itemprop` token, with its source range.
    fn itemprops(&self, element: ElementRef<'d>) -> Vec<(&'d str, Option<TextRange>)> {
        let Some(value) = element.value().attr("itemprop") else {
            return Vec::new();
        };

        let range = self.attribute_value_range(element.id(), "itemprop");
        split_tokens(value)
            .unique_by(|(_, token)| *token)
            .map(|(offset, token)| {
                (
                    token,
                    range.map(|r| self.document.narrow(r, value, offset, token.len())),
                )
            })
            .collect()
    }

    fn resolve_property(
        &self,
        node: NodeId,
        itemtypes: &[NamedNode],
        itemprop: &str,
    ) -> Option<NamedNode> {
        match self.resolver.resolve(itemtypes, itemprop) {
            Ok(predicate) => Some(predicate),
            Err(err) => {
                self.warn(
                    node,
                    WarningKind::UnresolvedProperty,
                    format!("Cannot resolve itemprop '{itemprop}': {err}"),
                );
                None
            }
        }
    }

    fn process_element(
        &self,
        ctx: &Rc<EvaluationContext>,
        element: ElementRef<'d>,
        stack: &mut Vec<Frame<'d>>,
    ) {
        let el = element.value();
        let node = element.id();

        if &*el.name.ns != HTML_NAMESPACE {
            tracing::trace!(element = el.name(), "skipping non-HTML element");
            Self::push_children(stack, element, ctx);
            return;
        }

        if el.attr("itemscope").is_some() {
            self.process_item(ctx, element, stack);
            return;
        }

        for misplaced in ["itemid", "itemref", "itemtype"] {
            if el.attr(misplaced).is_some() {
                self.warn(
                    node,
                    WarningKind::MisplacedItemAttribute,
                    format!("@{misplaced} is only allowed together with @itemscope"),
                );
            }
        }

        if let Some(item) = &ctx.item {
            let itemprops = self.itemprops(element);
            if !itemprops.is_empty() {
                let value = self.property_value(element);
                for (itemprop, range) in itemprops {
                    if let Some(predicate) = self.resolve_property(node, &ctx.itemtypes, itemprop) {
                        self.emit(
                            TripleRef::new(&item.subject, &predicate, &value.0),
                            [item.range, range, value.1],
                            ctx.container.as_ref(),
                        );
                    }
                }
            }
        }

        Self::push_children(stack, element, ctx);
    }

    fn process_item(
        &self,
        ctx: &Rc<EvaluationContext>,
        element: ElementRef<'d>,
        stack: &mut Vec<Frame<'d>>,
    ) {
        let el = element.value();
        let node = element.id();

        // an item reached a second time (through itemref) is only linked to
        let memoized = self.resolved.borrow().get(&node).cloned();
        if let Some(item) = memoized {
            tracing::trace!(subject = %item.subject, "item already resolved");
            self.link(ctx, element, &item);
            return;
        }

        let item = Rc::new(self.item_subject(element));
        self.resolved.borrow_mut().insert(node, item.clone());
        self.link(ctx, element, &item);

        let container = match &ctx.item {
            Some(_) => ctx.container.clone(),
            None => Some(Container(item.subject.clone())),
        };

        let itemtypes = self.itemtypes(element);
        let type_predicate_range = self
            .document
            .attribute_offsets(node, "itemtype")
            .map(|a| a.key);
        for (itemtype, range) in &itemtypes {
            self.emit(
                TripleRef::new(&item.subject, rdf::TYPE, itemtype),
                [item.range, type_predicate_range, *range],
                container.as_ref(),
            );
        }

        let child_ctx = Rc::new(EvaluationContext {
            item: Some(item),
            // an untyped item resolves its properties like its parent does
            itemtypes: if itemtypes.is_empty() {
                ctx.itemtypes.clone()
            } else {
                itemtypes.into_iter().map(|(itemtype, _)| itemtype).collect()
            },
            container,
            itemref_chain: ctx.itemref_chain.clone(),
        });

        Self::push_children(stack, element, &child_ctx);

        // referenced properties are visited before the item's own children
        let Some(itemref) = el.attr("itemref") else {
            return;
        };

        let mut referenced = Vec::new();
        for id in itemref.split_ascii_whitespace().unique() {
            let Some(&target) = self.document.nodes_by_id(id).first() else {
                self.warn(
                    node,
                    WarningKind::MissingItemref,
                    format!("@itemref refers to missing id '{id}'"),
                );
                continue;
            };

            if self.document.nodes_by_id(id).len() > 1 {
                self.warn(
                    node,
                    WarningKind::DuplicateId,
                    format!("id '{id}' is used more than once; using the first"),
                );
            }

            if target == node {
                self.warn(
                    node,
                    WarningKind::SelfItemref,
                    format!("@itemref '{id}' refers to the item itself"),
                );
                continue;
            }

            if child_ctx.itemref_chain.iter().any(|seen| seen == id) {
                self.warn(
                    node,
                    WarningKind::RecursiveItemref,
                    format!("@itemref '{id}' is already being followed"),
                );
                continue;
            }

            let Some(target) = self.document.element(target) else {
                continue;
            };

            // it will be reached through the item's children anyway
            if target.ancestors().any(|ancestor| ancestor.id() == node) {
                tracing::trace!(id, "skipping itemref to a descendant");
                continue;
            }

            let chain = child_ctx
                .itemref_chain
                .iter()
                .cloned()
                .chain([id.to_string()])
                .collect();

            referenced.push((
                target,
                Rc::new(EvaluationContext {
                    itemref_chain: chain,
                    ..EvaluationContext::clone(&child_ctx)
                }),
            ));
        }

        stack.extend(referenced.into_iter().rev());
    }

    fn item_subject(&self, element: ElementRef<'d>) -> Item {
        let node = element.id();
        let fresh = || Item {
            subject: self.bnodes.borrow_mut().fresh().into(),
            range: self.document.attribute_offsets(node, "itemscope").map(|a| a.key),
        };

        let Some(itemid) = element.value().attr("itemid") else {
            return fresh();
        };

        let range = self.attribute_value_range(node, "itemid");
        let itemid = itemid.trim();
        if itemid.is_empty() {
            return Item {
                subject: self.bnodes.borrow_mut().declared("").into(),
                range,
            };
        }

        match resolve_reference(self.base.as_ref(), itemid) {
            Ok(iri) => Item {
                subject: iri.into(),
                range,
            },
            Err(err) => {
                self.warn(
                    node,
                    WarningKind::InvalidIri,
                    format!("Invalid @itemid <{itemid}> ({err})"),
                );
                fresh()
            }
        }
    }

    /// Links a nested item to the item it is a property of, using the
    /// outer item's types to resolve the property.
    fn link(&self, ctx: &EvaluationContext, element: ElementRef<'d>, item: &Item) {
        let Some(parent) = &ctx.item else {
            return;
        };

        for (itemprop, range) in self.itemprops(element) {
            if let Some(predicate) = self.resolve_property(element.id(), &ctx.itemtypes, itemprop) {
                self.emit(
                    TripleRef::new(&parent.subject, &predicate, &item.subject),
                    [parent.range, range, item.range],
                    ctx.container.as_ref(),
                );
            }
        }
    }

    fn itemtypes(&self, element: ElementRef<'d>) -> Vec<(NamedNode, Option<TextRange>)> {
        let node = element.id();
        let Some(value) = element.value().attr("itemtype") else {
            return Vec::new();
        };

        let range = self.attribute_value_range(node, "itemtype");
        split_tokens(value)
            .unique_by(|(_, token)| *token)
            .filter_map(|(offset, token)| match resolve_reference(self.base.as_ref(), token) {
                Ok(itemtype) => Some((
                    itemtype,
                    range.map(|r| self.document.narrow(r, value, offset, token.len())),
                )),
                Err(err) => {
                    self.warn(
                        node,
                        WarningKind::InvalidItemtype,
                        format!("Invalid @itemtype <{token}> ({err})"),
                    );
                    None
                }
            })
            .collect()
    }

    /// An IRI-valued attribute; missing or invalid values become the empty string.
    fn url_value(&self, element: ElementRef<'d>, name: &str) -> (Term, Option<TextRange>) {
        let node = element.id();
        let range = self.attribute_value_range(node, name);
        let Some(value) = element.value().attr(name) else {
            return (Literal::new_simple_literal("").into(), None);
        };

        match resolve_reference(self.base.as_ref(), value.trim()) {
            Ok(iri) => (iri.into(), range),
            Err(err) => {
                self.warn(
                    node,
                    WarningKind::InvalidIri,
                    format!("Invalid @{name} <{value}> ({err})"),
                );
                (Literal::new_simple_literal("").into(), range)
            }
        }
    }

    /// The value of a property element, following its element type.
    fn property_value(&self, element: ElementRef<'d>) -> (Term, Option<TextRange>) {
        let el = element.value();
        let node = element.id();

        let attribute = |name: &str| {
            (
                el.attr(name).unwrap_or_default(),
                self.attribute_value_range(node, name),
            )
        };

        let typed = |(value, range): (&str, Option<TextRange>), datatype: Option<_>| {
            let literal = match datatype {
                Some(datatype) => Literal::new_typed_literal(value, datatype),
                None => Literal::new_simple_literal(value),
            };
            (Term::from(literal), range)
        };

        match el.name() {
            "meta" => typed(attribute("content"), None),
            "audio" | "embed" | "iframe" | "img" | "source" | "track" | "video" => {
                self.url_value(element, "src")
            }
            "a" | "area" | "link" => self.url_value(element, "href"),
            "object" => self.url_value(element, "data"),
            "data" => typed(attribute("value"), None),
            "meter" => {
                let value = attribute("value");
                let datatype = numeric_datatype(value.0);
                typed(value, datatype)
            }
            "time" => {
                let text;
                let value = match el.attr("datetime") {
                    Some(_) => attribute("datetime"),
                    None => {
                        text = text_content(element);
                        (text.as_str(), self.document.text_range(node, &text))
                    }
                };
                let datatype = microdata_temporal_datatype(value.0);
                typed(value, datatype)
            }
            _ => {
                let text = text_content(element);
                let range = self.document.text_range(node, &text);
                (Literal::new_simple_literal(text).into(), range)
            }
        }
    }
}
