//! [html-rdfa] 3.5 Property Copying
//!
//! > If the `rdfa:copy` predicate is used, the processor copies the
//! > properties of the referenced `rdfa:Pattern` onto the subject,
//! > and then removes the pattern and the `rdfa:copy` triples.

use std::collections::{HashMap, HashSet};

use oxrdf::vocab::rdf;
use oxrdf::{Subject, Term, Triple};

use crate::statement::{Statement, TextOffsets};

use super::vocab::rdfa_vocab;

fn as_subject(term: &Term) -> Option<Subject> {
    match term {
        Term::NamedNode(n) => Some(n.clone().into()),
        Term::BlankNode(b) => Some(b.clone().into()),
        _ => None,
    }
}

fn is_copy(statement: &Statement) -> bool {
    statement.triple.predicate.as_ref() == rdfa_vocab::COPY
}

fn is_pattern_type(statement: &Statement) -> bool {
    statement.triple.predicate.as_ref() == rdf::TYPE
        && statement.triple.object == Term::from(rdfa_vocab::PATTERN.into_owned())
}

pub(crate) fn copy_properties(mut statements: Vec<Statement>) -> Vec<Statement> {
    if !statements.iter().any(is_copy) {
        return statements;
    }

    let mut by_subject: HashMap<&Subject, Vec<&Statement>> = HashMap::new();
    for statement in &statements {
        by_subject
            .entry(&statement.triple.subject)
            .or_default()
            .push(statement);
    }

    let is_pattern = |subject: &Subject| {
        by_subject
            .get(subject)
            .is_some_and(|properties| properties.iter().any(|s| is_pattern_type(s)))
    };

    let existing: HashSet<&Triple> = statements.iter().map(|s| &s.triple).collect();
    let mut used_patterns: HashSet<Subject> = HashSet::new();
    let mut added: Vec<Statement> = Vec::new();

    for copy in statements.iter().filter(|s| is_copy(s)) {
        // patterns may themselves copy other patterns
        let mut visited = HashSet::new();
        let mut pending = vec![copy];
        while let Some(link) = pending.pop() {
            let Some(target) = as_subject(&link.triple.object) else {
                tracing::debug!(copy = %link, "ignoring rdfa:copy of a literal");
                continue;
            };

            if !is_pattern(&target) {
                tracing::debug!(copy = %link, "ignoring rdfa:copy of something that is not an rdfa:Pattern");
                continue;
            }

            if !visited.insert(target.clone()) {
                continue;
            }

            for source in by_subject[&target].iter().copied().filter(|s| !is_pattern_type(s)) {
                if is_copy(source) {
                    pending.push(source);
                    continue;
                }

                let triple = Triple::new(
                    copy.triple.subject.clone(),
                    source.triple.predicate.clone(),
                    source.triple.object.clone(),
                );

                if existing.contains(&triple) || added.iter().any(|s| s.triple == triple) {
                    continue;
                }

                added.push(Statement {
                    triple,
                    offsets: source.offsets.map(|offsets| TextOffsets {
                        subject: copy.offsets.and_then(|o| o.subject),
                        ..offsets
                    }),
                    container: copy.container.clone(),
                });
            }

            used_patterns.insert(target);
        }
    }

    statements.retain(|s| !is_copy(s) && !used_patterns.contains(&s.triple.subject));
    // patterns that copy other patterns are removed along with their copies
    added.retain(|s| !used_patterns.contains(&s.triple.subject));
    statements.extend(added);
    statements
}
