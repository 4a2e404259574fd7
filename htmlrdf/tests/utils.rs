use std::collections::HashSet;

use htmlrdf::warning::processor_graph_sink;
use htmlrdf::{
    Document, MicrodataDecoder, MicrodataOptions, ParseOptions, RdfaDecoder, RdfaOptions,
    Statement,
};
use itertools::Itertools;
use oxrdf::Graph;

#[allow(unused)]
pub const BASE: &str = "http://example.org/";

#[allow(unused)]
pub fn parse(html: &str, location: &str) -> Document {
    Document::parse(
        html.as_bytes(),
        ParseOptions {
            location: Some(location.to_string()),
            ..Default::default()
        },
    )
    .unwrap()
}

#[allow(unused)]
pub fn parse_with_offsets(html: &str) -> Document {
    Document::parse(
        html.as_bytes(),
        ParseOptions {
            location: Some(BASE.to_string()),
            capture_offsets: true,
            ..Default::default()
        },
    )
    .unwrap()
}

#[allow(unused)]
pub fn rdfa_statements(document: &Document, options: RdfaOptions) -> Vec<Statement> {
    RdfaDecoder::new(document, options)
        .collect::<Result<_, _>>()
        .unwrap()
}

#[allow(unused)]
pub fn microdata_statements(document: &Document, options: MicrodataOptions) -> Vec<Statement> {
    MicrodataDecoder::new(document, options)
        .collect::<Result<_, _>>()
        .unwrap()
}

/// Runs RDFa over `html`, returning the output graph and the processor graph.
#[allow(unused)]
pub fn rdfa_graphs(html: &str, location: &str, options: RdfaOptions) -> (Graph, Graph) {
    let document = parse(html, location);
    let mut output_graph = Graph::new();
    let mut processor_graph = Graph::new();

    let decoder =
        RdfaDecoder::new(&document, options).on_warning(processor_graph_sink(&mut processor_graph));
    for statement in decoder {
        output_graph.insert(&statement.unwrap().triple);
    }

    (output_graph, processor_graph)
}

#[allow(unused)]
pub fn serialize_graph(graph: Graph, base: &str) -> String {
    // NB: we use rdf_canon here because the one provided by oxrdf hangs
    let idents = rdf_canon::issue_graph_with::<sha2::Sha256>(&graph, &Default::default()).unwrap();
    let graph = rdf_canon::relabel_graph(&graph, &idents).unwrap();

    let mut output = Vec::new();
    let mut ttl = oxttl::TurtleSerializer::new().with_base_iri(base).unwrap();

    // slow but makes test output nicer
    let mut prefixes_to_use = HashSet::new();
    let mut add_prefix = |full_iri: &str| {
        if let Some((known_prefix, iri)) = htmlrdf::initial_context_prefixes()
            .mappings()
            .find(|(prefix, iri)| !prefix.is_empty() && full_iri.starts_with(*iri))
        {
            prefixes_to_use.insert((known_prefix, iri));
        }
    };

    for triple in graph.iter() {
        if let oxrdf::SubjectRef::NamedNode(n) = triple.subject {
            add_prefix(n.as_str());
        }

        add_prefix(triple.predicate.as_str());

        if let oxrdf::TermRef::NamedNode(n) = triple.object {
            add_prefix(n.as_str());
        } else if let oxrdf::TermRef::Literal(l) = triple.object {
            if !l.is_plain() {
                add_prefix(l.datatype().as_str());
            }
        }
    }

    for (prefix, iri) in prefixes_to_use {
        ttl = ttl.with_prefix(prefix, iri).unwrap();
    }

    let mut ttl = ttl.for_writer(&mut output);
    for triple in graph.iter().sorted_by_cached_key(|t| {
        (
            t.subject.to_string(),
            if t.predicate.as_str() == "http://www.w3.org/1999/02/22-rdf-syntax-ns#type" {
                // make "a" come first
                None
            } else {
                Some(t.predicate.to_string())
            },
            t.object.to_string(),
        )
    }) {
        ttl.serialize_triple(triple).unwrap();
    }

    ttl.finish().unwrap();

    String::from_utf8_lossy(&output).into_owned()
}

#[allow(unused)]
fn parse_turtle(ttl: &str) -> Graph {
    let mut graph = Graph::new();
    for triple in oxttl::TurtleParser::new()
        .with_base_iri(BASE)
        .unwrap()
        .for_slice(ttl.as_bytes()) {
        graph.insert(&triple.unwrap());
    }
    graph
}

#[allow(unused)]
fn assert_same_graph(actual: Graph, expected_ttl: &str) {
    let output = serialize_graph(actual, BASE);
    let expected = serialize_graph(parse_turtle(expected_ttl), BASE);

    pretty_assertions::assert_eq!(output, expected);
}

#[allow(unused)]
pub fn assert_graph(html: &str, ttl: &str) {
    let (output_graph, _) = rdfa_graphs(html, BASE, Default::default());
    assert_same_graph(output_graph, ttl);
}

#[allow(unused)]
pub fn assert_microdata_graph(html: &str, options: MicrodataOptions, ttl: &str) {
    let document = parse(html, BASE);
    let mut output_graph = Graph::new();
    for statement in microdata_statements(&document, options) {
        output_graph.insert(&statement.triple);
    }

    assert_same_graph(output_graph, ttl);
}
