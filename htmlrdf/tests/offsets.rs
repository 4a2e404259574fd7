use htmlrdf::{Document, ParseOptions, Position, Statement, TextRange};
use pretty_assertions::assert_eq;

mod utils;

type Texts<'a> = [Option<&'a str>; 3];

fn texts<'a>(document: &'a Document, statement: &Statement) -> Texts<'a> {
    let offsets = statement.offsets.expect("offsets were captured");
    let text = |range: Option<TextRange>| range.and_then(|r| document.source_text(r));
    [
        text(offsets.subject),
        text(offsets.predicate),
        text(offsets.object),
    ]
}

fn find<'s>(statements: &'s [Statement], predicate: &str) -> &'s Statement {
    statements
        .iter()
        .find(|s| s.triple.predicate.as_str() == predicate)
        .unwrap()
}

#[test]
fn rdfa_terms_point_at_their_markup() {
    let document = utils::parse_with_offsets(
        r#"<html><body vocab="http://schema.org/"><p typeof="Person"><span property="name">Alice</span> <a property="url" href="http://a.example/">x</a></p></body></html>"#,
    );
    let statements = utils::rdfa_statements(&document, Default::default());

    assert_eq!(
        texts(&document, find(&statements, "http://www.w3.org/ns/rdfa#usesVocabulary")),
        [None, Some("vocab"), Some("http://schema.org/")]
    );
    assert_eq!(
        texts(
            &document,
            find(&statements, "http://www.w3.org/1999/02/22-rdf-syntax-ns#type")
        ),
        [Some("Person"), Some("typeof"), Some("Person")]
    );
    assert_eq!(
        texts(&document, find(&statements, "http://schema.org/name")),
        [Some("Person"), Some("name"), Some("Alice")]
    );
    assert_eq!(
        texts(&document, find(&statements, "http://schema.org/url")),
        [Some("Person"), Some("url"), Some("http://a.example/")]
    );
}

#[test]
fn multiple_tokens_are_located_individually() {
    let document = utils::parse_with_offsets(
        r#"<html><body><p about="http://example.org/a" property="dc:title  dc:alternative">T</p></body></html>"#,
    );
    let statements = utils::rdfa_statements(&document, Default::default());

    assert_eq!(
        texts(&document, find(&statements, "http://purl.org/dc/terms/title")),
        [Some("http://example.org/a"), Some("dc:title"), Some("T")]
    );
    assert_eq!(
        texts(
            &document,
            find(&statements, "http://purl.org/dc/terms/alternative")
        ),
        [Some("http://example.org/a"), Some("dc:alternative"), Some("T")]
    );
}

#[test]
fn microdata_terms_point_at_their_markup() {
    let document = utils::parse_with_offsets(
        r#"<html><body><div itemscope><span itemprop="name">Bob</span></div></body></html>"#,
    );
    let statements = utils::microdata_statements(&document, Default::default());

    assert_eq!(statements.len(), 1);
    assert_eq!(
        texts(&document, &statements[0]),
        [Some("itemscope"), Some("name"), Some("Bob")]
    );
}

#[test]
fn offsets_are_absent_unless_captured() {
    let document = utils::parse(
        r#"<html><body><div itemscope><span itemprop="name">Bob</span></div></body></html>"#,
        utils::BASE,
    );

    let statements = utils::microdata_statements(&document, Default::default());
    assert!(statements.iter().all(|s| s.offsets.is_none()));
}

#[test]
fn initial_offset_shifts_positions() {
    let html = "<html><body>\n<div itemscope><span itemprop=\"name\">Bob</span></div></body></html>";
    let document = Document::parse(
        html.as_bytes(),
        ParseOptions {
            location: Some(utils::BASE.to_string()),
            capture_offsets: true,
            initial_offset: Some(Position::new(1000, 10, 5)),
        },
    )
    .unwrap();

    let statements = utils::microdata_statements(&document, Default::default());
    let offsets = statements[0].offsets.unwrap();
    let object = offsets.object.unwrap();

    let byte = html.find("Bob").unwrap();
    assert_eq!(object.start, Position::new(1000 + byte, 11, byte - html.find('\n').unwrap() - 1));
    assert_eq!(document.source_text(object), Some("Bob"));
}

#[test]
fn text_literals_cover_their_text() {
    let document = utils::parse_with_offsets(
        r#"<html><body>
        <p about="http://example.org/a" property="http://example.org/nested"><b>Alice</b></p>
        <p about="http://example.org/a" property="http://example.org/mixed">A <b>B</b> &amp; C</p>
        </body></html>"#,
    );
    let statements = utils::rdfa_statements(&document, Default::default());

    let nested = find(&statements, "http://example.org/nested");
    assert_eq!(texts(&document, nested)[2], Some("Alice"));

    // assembled from several nodes, so the whole markup is covered
    let mixed = find(&statements, "http://example.org/mixed");
    assert_eq!(mixed.triple.object.to_string(), r#""A B & C""#);
    assert_eq!(texts(&document, mixed)[2], Some("A <b>B</b> &amp; C"));
}
