use std::rc::Rc;

use htmlrdf::microdata::ItemtypeRelativeResolver;
use htmlrdf::{MicrodataDecoder, MicrodataOptions, Statement, Warning};
use itertools::Itertools;
use pretty_assertions::assert_eq;

mod utils;

fn sorted_triples(statements: &[Statement]) -> Vec<String> {
    statements.iter().map(|s| s.triple.to_string()).sorted().collect()
}

#[test]
fn schema_org_person() {
    let html = r#"<!DOCTYPE html>
    <html><body>
      <div itemscope itemtype="http://schema.org/Person">
        <span itemprop="name">Jane Doe</span>
        <img itemprop="image" src="janedoe.jpg" alt="">
        <div itemprop="address" itemscope itemtype="http://schema.org/PostalAddress">
          <span itemprop="addressLocality">Seattle</span>
        </div>
        <a itemprop="url" href="http://www.janedoe.com">www.janedoe.com</a>
        <time itemprop="birthDate" datetime="1979-10-12">October 12</time>
      </div>
    </body></html>"#;

    let ttl = r#"
    @base <http://example.org/> .
    @prefix schema: <http://schema.org/> .
    @prefix xsd: <http://www.w3.org/2001/XMLSchema#> .
    [] a schema:Person ;
        schema:name "Jane Doe" ;
        schema:image <janedoe.jpg> ;
        schema:address [
            a schema:PostalAddress ;
            schema:addressLocality "Seattle"
        ] ;
        schema:url <http://www.janedoe.com> ;
        schema:birthDate "1979-10-12"^^xsd:date .
    "#;

    let options = MicrodataOptions {
        resolver: Rc::new(ItemtypeRelativeResolver),
    };
    utils::assert_microdata_graph(html, options, ttl);
}

#[test]
fn itemref_reaches_outside_the_item() {
    let document = utils::parse(
        r#"<html><body>
          <div itemscope itemref="extra"><p itemprop="a">1</p></div>
          <p id="extra" itemprop="b">2</p>
        </body></html>"#,
        utils::BASE,
    );

    let statements = utils::microdata_statements(&document, Default::default());
    assert_eq!(
        sorted_triples(&statements),
        vec![r#"_:b0 <a> "1""#, r#"_:b0 <b> "2""#]
    );
}

#[test]
fn nested_items_share_a_container() {
    let document = utils::parse(
        r#"<html><body>
          <div itemscope itemid="http://example.org/outer">
            <div itemprop="part" itemscope><span itemprop="name">inner</span></div>
          </div>
          <div itemscope itemid="http://example.org/other"><span itemprop="name">other</span></div>
        </body></html>"#,
        utils::BASE,
    );

    let statements = utils::microdata_statements(&document, Default::default());
    let containers = statements
        .iter()
        .map(|s| s.container.as_ref().map(|c| c.to_string()))
        .unique()
        .collect_vec();

    assert_eq!(
        containers,
        vec![
            Some("<http://example.org/outer>".to_string()),
            Some("<http://example.org/other>".to_string()),
        ]
    );
}

#[test]
fn problems_are_reported_as_warnings() {
    let document = utils::parse(
        r#"<html><body>
          <div itemscope itemref="missing"></div>
          <p itemtype="http://schema.org/Thing">x</p>
        </body></html>"#,
        utils::BASE,
    );

    let mut warnings = Vec::new();
    let _: Vec<Statement> = MicrodataDecoder::new(&document, Default::default())
        .on_warning(|warning: Warning| warnings.push(warning.to_string()))
        .collect::<Result<_, _>>()
        .unwrap();

    insta::assert_snapshot!(warnings.into_iter().sorted().join("\n"), @r"
    @itemref refers to missing id 'missing'
    @itemtype is only allowed together with @itemscope
    ");
}
