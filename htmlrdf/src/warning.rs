//! Recoverable conditions found while extracting.
//!
//! Neither engine ever fails a document because of bad markup: the offending
//! statement is skipped and a [`Warning`] is handed to the sink installed on
//! the decoder. With no sink installed, warnings are dropped.

use std::cell::RefCell;
use std::fmt;

use oxrdf::{Graph, TripleRef};

use crate::bnode::BlankNodeFactory;
use crate::rdfa::vocab::{dc_vocab, rdfa_vocab};
use crate::statement::TextRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarningKind {
    UnresolvedCurie,
    UnresolvedTerm,
    PrefixRedefinition,
    InvalidPrefix,
    InvalidIri,
    InvalidLanguage,
    /// A blank node was used where only an IRI may appear.
    BlankNodePredicate,
    DuplicateId,
    MissingItemref,
    SelfItemref,
    RecursiveItemref,
    InvalidItemtype,
    /// `@itemid`, `@itemref` or `@itemtype` on an element without `@itemscope`.
    MisplacedItemAttribute,
    UnresolvedProperty,
}

impl WarningKind {
    /// The RDFa processor-graph class used to report this kind of warning.
    pub fn class(self) -> oxrdf::NamedNodeRef<'static> {
        match self {
            WarningKind::UnresolvedCurie => rdfa_vocab::UNRESOLVED_CURIE,
            WarningKind::UnresolvedTerm => rdfa_vocab::UNRESOLVED_TERM,
            WarningKind::PrefixRedefinition => rdfa_vocab::PREFIX_REDEFINITION,
            _ => rdfa_vocab::WARNING,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
    /// The source range that triggered the warning, when offsets were captured.
    pub range: Option<TextRange>,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.range {
            Some(range) => write!(f, "{}: {}", range.start, self.message),
            None => f.write_str(&self.message),
        }
    }
}

pub type WarningSink<'a> = Box<dyn FnMut(Warning) + 'a>;

/// Shared handle to the (optional) sink for the duration of one walk.
pub(crate) struct Warnings<'s, 'a> {
    sink: RefCell<Option<&'s mut WarningSink<'a>>>,
}

impl<'s, 'a> Warnings<'s, 'a> {
    pub(crate) fn new(sink: Option<&'s mut WarningSink<'a>>) -> Self {
        Self {
            sink: RefCell::new(sink),
        }
    }

    pub(crate) fn emit(&self, kind: WarningKind, message: String, range: Option<TextRange>) {
        tracing::debug!(?kind, "{message}");
        let mut sink = self.sink.borrow_mut();
        if let Some(sink) = sink.as_deref_mut() {
            sink(Warning {
                kind,
                message,
                range,
            });
        }
    }
}

/// Builds a sink that records warnings as RDFa processor-graph triples:
/// each warning becomes a fresh node typed with [`WarningKind::class`] and
/// carrying a `dcterms:description`.
pub fn processor_graph_sink(graph: &mut Graph) -> impl FnMut(Warning) + '_ {
    let mut bnodes = BlankNodeFactory::new();
    move |warning: Warning| {
        let subject = bnodes.fresh();
        graph.insert(TripleRef::new(
            &subject,
            oxrdf::vocab::rdf::TYPE,
            warning.kind.class(),
        ));
        graph.insert(TripleRef::new(
            &subject,
            dc_vocab::DESCRIPTION,
            oxrdf::LiteralRef::new_simple_literal(&warning.message),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processor_graph_uses_the_most_specific_class() {
        let mut graph = Graph::new();
        {
            let mut sink = processor_graph_sink(&mut graph);
            sink(Warning {
                kind: WarningKind::UnresolvedTerm,
                message: "Unresolved term: x".to_string(),
                range: None,
            });
            sink(Warning {
                kind: WarningKind::DuplicateId,
                message: "dup".to_string(),
                range: None,
            });
        }

        let classes = graph
            .triples_for_predicate(oxrdf::vocab::rdf::TYPE)
            .map(|t| t.object.to_string())
            .collect::<std::collections::BTreeSet<_>>();
        assert_eq!(
            classes.into_iter().collect::<Vec<_>>(),
            vec![
                "<http://www.w3.org/ns/rdfa#UnresolvedTerm>",
                "<http://www.w3.org/ns/rdfa#Warning>",
            ]
        );
        assert_eq!(graph.len(), 4);
    }
}
