use std::collections::HashMap;

use oxrdf::BlankNode;

/// Allocates blank nodes for a single extraction run.
///
/// Fresh nodes are labelled `b0`, `b1`, … in allocation order, so the same
/// input always produces the same labels. Labels that come from the document
/// itself (e.g. RDFa `_:name`) are mapped onto fresh nodes, so they can never
/// collide with allocated ones.
#[derive(Debug, Default)]
pub struct BlankNodeFactory {
    next: usize,
    declared: HashMap<String, BlankNode>,
}

impl BlankNodeFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh(&mut self) -> BlankNode {
        let node = BlankNode::new_unchecked(format!("b{}", self.next));
        self.next += 1;
        node
    }

    /// Returns the node for a document-declared label, allocating it on first use.
    ///
    /// The empty label is valid here: it is the single reserved node used for
    /// RDFa's `[_:]` and for Microdata's empty `itemid`.
    pub fn declared(&mut self, label: &str) -> BlankNode {
        if let Some(node) = self.declared.get(label) {
            return node.clone();
        }

        let node = self.fresh();
        self.declared.insert(label.to_string(), node.clone());
        node
    }
}
