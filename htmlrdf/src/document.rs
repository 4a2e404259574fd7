//! The parsed HTML document shared by both extraction engines.

use std::borrow::Cow;
use std::cell::OnceCell;
use std::collections::HashMap;

use ego_tree::NodeId;
use oxiri::{Iri, IriParseError, IriRef};
use oxrdf::NamedNode;
use scraper::node::Element;
use scraper::{ElementRef, Html, Node};

use crate::Error;
use crate::offsets::{self, INSTRUMENTATION_ATTRIBUTE, LineIndex, RawTag};
use crate::statement::{Position, TextRange};

/// Options for [`Document::parse`].
#[derive(Debug, Default, Clone)]
pub struct ParseOptions {
    /// The IRI the document was retrieved from. Must be absolute.
    pub location: Option<String>,
    /// Record the source range of every tag and attribute. Defaults to `false`.
    pub capture_offsets: bool,
    /// Position of the first byte of the input within some enclosing text,
    /// for documents that were themselves embedded in another. Defaults to zero.
    pub initial_offset: Option<Position>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeOffsets {
    pub key: TextRange,
    /// `None` when the attribute was written without a value.
    pub value: Option<TextRange>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeMetadata {
    /// The start tag.
    pub node: TextRange,
    pub end_tag: Option<TextRange>,
    /// Parallel to the element's attribute list.
    pub attributes: Vec<Option<AttributeOffsets>>,
}

#[derive(Debug)]
struct Offsets {
    lines: LineIndex,
    nodes: HashMap<NodeId, NodeMetadata>,
}

#[derive(Debug)]
pub struct Document {
    html: Html,
    source: String,
    location: Option<Iri<String>>,
    base_url: String,
    offsets: Option<Offsets>,
    ids: OnceCell<HashMap<String, Vec<NodeId>>>,
}

impl Document {
    /// Parses a document. HTML parsing itself never fails; the only errors are
    /// an invalid `location`, or a `<base>` that cannot be resolved against it.
    pub fn parse(input: &[u8], options: ParseOptions) -> Result<Self, Error> {
        let location = match options.location {
            Some(location) => match Iri::parse(location.clone()) {
                Ok(iri) => Some(iri),
                Err(source) => return Err(Error::InvalidLocation { source, location }),
            },
            None => None,
        };

        let source = String::from_utf8_lossy(input).into_owned();
        let (html, offsets) = if options.capture_offsets {
            let instrumented = offsets::instrument(&source);
            let mut html = Html::parse_document(&instrumented.text);
            let lines = LineIndex::new(&source, options.initial_offset.unwrap_or_default());
            let nodes = attach_metadata(&mut html, &source, &lines, &instrumented.tags);
            (html, Some(Offsets { lines, nodes }))
        } else {
            (Html::parse_document(&source), None)
        };

        for err in html.errors.iter() {
            tracing::trace!("HTML parse error: {err}");
        }

        let base_url = find_base_url(&html, location.as_ref())?;
        tracing::debug!(%base_url, "parsed document");

        Ok(Self {
            html,
            source,
            location,
            base_url,
            offsets,
            ids: OnceCell::new(),
        })
    }

    pub fn html(&self) -> &Html {
        &self.html
    }

    pub fn location(&self) -> Option<&Iri<String>> {
        self.location.as_ref()
    }

    /// The base URL as an IRI; `None` when the document has no base at all.
    ///
    /// Fails when the base is a relative reference that could not be
    /// resolved because no location was given.
    pub fn base_iri(&self) -> Result<Option<Iri<String>>, Error> {
        if self.base_url.is_empty() {
            return Ok(None);
        }

        Iri::parse(self.base_url.clone())
            .map(Some)
            .map_err(|source| Error::InvalidBase {
                source,
                base: self.base_url.clone(),
            })
    }

    /// The document's effective base URL, or the empty string if it has none.
    ///
    /// This is the first `<base href>` (resolved against the location, if
    /// relative and a location is known), else the location.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn root_element(&self) -> ElementRef<'_> {
        self.html.root_element()
    }

    pub fn element(&self, node: NodeId) -> Option<ElementRef<'_>> {
        self.html.tree.get(node).and_then(ElementRef::wrap)
    }

    pub fn doctype_public_id(&self) -> Option<&str> {
        self.html
            .tree
            .root()
            .children()
            .find_map(|child| match child.value() {
                Node::Doctype(doctype) => Some(doctype.public_id()),
                _ => None,
            })
    }

    pub fn offsets_captured(&self) -> bool {
        self.offsets.is_some()
    }

    pub fn node_metadata(&self, node: NodeId) -> Option<&NodeMetadata> {
        self.offsets.as_ref()?.nodes.get(&node)
    }

    pub fn attribute_offsets(&self, node: NodeId, name: &str) -> Option<&AttributeOffsets> {
        let metadata = self.node_metadata(node)?;
        let element = self.element(node)?;
        let index = element
            .value()
            .attrs
            .iter()
            .position(|(qn, _)| qualified_name(qn.prefix.as_deref(), &qn.local) == name)?;
        metadata.attributes.get(index)?.as_ref()
    }

    /// The range between the end of the start tag and the start of the end tag.
    pub fn inner_range(&self, node: NodeId) -> Option<TextRange> {
        let metadata = self.node_metadata(node)?;
        let end_tag = metadata.end_tag?;
        Some(TextRange {
            start: metadata.node.end,
            end: end_tag.start,
        })
    }

    /// The range of `text`, the text content of `node`. Narrowed to the text
    /// itself when it appears verbatim outside of any tag; otherwise the whole
    /// inner range, since the text was assembled from several nodes or
    /// decoded from character references.
    pub fn text_range(&self, node: NodeId, text: &str) -> Option<TextRange> {
        let inner = self.inner_range(node)?;
        let source = self.source_text(inner)?;
        if text.is_empty() {
            return Some(inner);
        }

        let outside_tags = |offset: usize| {
            let before = &source[..offset];
            before.rfind('<') <= before.rfind('>') && !text.contains(['<', '>'])
        };

        match source.match_indices(text).map(|(offset, _)| offset).find(|&o| outside_tags(o)) {
            Some(offset) => Some(self.narrow(inner, source, offset, text.len())),
            None => Some(inner),
        }
    }

    /// The raw source text covered by `range`.
    pub fn source_text(&self, range: TextRange) -> Option<&str> {
        let origin = self.offsets.as_ref()?.lines.origin();
        let start = range.start.byte.checked_sub(origin.byte)?;
        let end = range.end.byte.checked_sub(origin.byte)?;
        self.source.get(start..end)
    }

    /// Narrows the range of an attribute value down to `len` bytes starting at
    /// `offset` in the decoded `value`. Only possible when the source text
    /// is identical to the decoded value (no character references); otherwise
    /// the whole range is returned.
    pub fn narrow(&self, range: TextRange, value: &str, offset: usize, len: usize) -> TextRange {
        let Some(offsets) = &self.offsets else {
            return range;
        };

        if self.source_text(range) != Some(value) || offset + len > value.len() {
            return range;
        }

        let start = range.start.byte - offsets.lines.origin().byte + offset;
        offsets.lines.range(
            &self.source,
            offsets::Span {
                start,
                end: start + len,
            },
        )
    }

    /// Every element with the given `id`, in document order. The first is the
    /// one that should be used; any more indicate a duplicated id.
    pub fn nodes_by_id(&self, id: &str) -> &[NodeId] {
        let index = self.ids.get_or_init(|| {
            let mut ids: HashMap<String, Vec<NodeId>> = HashMap::new();
            for node in self.html.tree.root().descendants() {
                if let Some(id) = node.value().as_element().and_then(|e| e.attr("id")) {
                    ids.entry(id.to_string()).or_default().push(node.id());
                }
            }
            ids
        });

        index.get(id).map(Vec::as_slice).unwrap_or_default()
    }
}

/// Resolves a reference against `base`. Without a base, relative references
/// are kept as written.
pub(crate) fn resolve_reference(
    base: Option<&Iri<String>>,
    value: &str,
) -> Result<NamedNode, IriParseError> {
    match base {
        Some(base) => Ok(NamedNode::new_unchecked(base.resolve(value)?.into_inner())),
        None => {
            IriRef::parse(value)?;
            Ok(NamedNode::new_unchecked(value))
        }
    }
}

/// Splits an attribute value on ASCII whitespace, keeping the byte offset
/// of each token.
pub(crate) fn split_tokens(value: &str) -> impl Iterator<Item = (usize, &str)> {
    value
        .split_ascii_whitespace()
        .map(move |token| (token.as_ptr() as usize - value.as_ptr() as usize, token))
}

/// Concatenates all descendant text nodes.
pub fn text_content(element: ElementRef<'_>) -> String {
    element.text().collect()
}

/// Serializes the children of `element` back to markup.
pub fn serialize_children(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    for child in element.children() {
        serialize_node(child, &mut out);
    }
    out
}

fn serialize_node(node: ego_tree::NodeRef<'_, Node>, out: &mut String) {
    match node.value() {
        Node::Text(text) => escape(text, false, out),
        Node::Comment(comment) => {
            out.push_str("<!--");
            out.push_str(comment);
            out.push_str("-->");
        }
        Node::Element(element) => {
            out.push('<');
            out.push_str(element.name());
            for (qn, value) in element.attrs.iter() {
                out.push(' ');
                out.push_str(&qualified_name(qn.prefix.as_deref(), &qn.local));
                out.push_str("=\"");
                escape(value, true, out);
                out.push('"');
            }
            out.push('>');
            if is_void(element) {
                return;
            }
            for child in node.children() {
                serialize_node(child, out);
            }
            out.push_str("</");
            out.push_str(element.name());
            out.push('>');
        }
        _ => {}
    }
}

fn is_void(element: &Element) -> bool {
    matches!(
        element.name(),
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}

fn escape(text: &str, attribute: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
}

/// `prefix:local`, as attribute names are written in the source.
pub(crate) fn qualified_name<'a>(prefix: Option<&str>, local: &'a str) -> Cow<'a, str> {
    match prefix {
        Some(prefix) => Cow::Owned(format!("{prefix}:{local}")),
        None => Cow::Borrowed(local),
    }
}

fn find_base_url(html: &Html, location: Option<&Iri<String>>) -> Result<String, Error> {
    let href = html
        .tree
        .root()
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "base")
        .find_map(|el| el.value().attr("href"))
        .map(str::trim);

    match (href, location) {
        (Some(href), _) if Iri::parse(href).is_ok() => Ok(href.to_string()),
        (Some(href), Some(location)) => location
            .resolve(href)
            .map(Iri::into_inner)
            .map_err(|source| Error::InvalidBase {
                source,
                base: href.to_string(),
            }),
        // best effort: keep the relative value
        (Some(href), None) => Ok(href.to_string()),
        (None, Some(location)) => Ok(location.as_str().to_string()),
        (None, None) => Ok(String::new()),
    }
}

fn attach_metadata(
    html: &mut Html,
    source: &str,
    lines: &LineIndex,
    tags: &[RawTag],
) -> HashMap<NodeId, NodeMetadata> {
    let tagged: Vec<(NodeId, usize)> = html
        .tree
        .nodes()
        .filter_map(|node| {
            let index = node
                .value()
                .as_element()?
                .attr(INSTRUMENTATION_ATTRIBUTE)?
                .parse()
                .ok()?;
            Some((node.id(), index))
        })
        .collect();

    let mut nodes = HashMap::with_capacity(tagged.len());
    for (id, index) in tagged {
        let Some(raw) = tags.get(index) else {
            continue;
        };
        let Some(mut node) = html.tree.get_mut(id) else {
            continue;
        };
        let Node::Element(element) = node.value() else {
            continue;
        };

        element
            .attrs
            .retain(|(qn, _)| &*qn.local != INSTRUMENTATION_ATTRIBUTE);

        let attributes = element
            .attrs
            .iter()
            .map(|(qn, _)| {
                let name = qualified_name(qn.prefix.as_deref(), &qn.local);
                raw.attributes
                    .iter()
                    .find(|attr| attr.name == name)
                    .map(|attr| AttributeOffsets {
                        key: lines.range(source, attr.key),
                        value: attr.value.map(|v| lines.range(source, v)),
                    })
            })
            .collect();

        nodes.insert(
            id,
            NodeMetadata {
                node: lines.range(source, raw.tag),
                end_tag: raw.end_tag.map(|span| lines.range(source, span)),
                attributes,
            },
        );
    }

    nodes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(html: &str, location: Option<&str>) -> Document {
        Document::parse(
            html.as_bytes(),
            ParseOptions {
                location: location.map(str::to_string),
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn base_url_resolution_order() {
        let with_base = r#"<head><base href="/sub/"><base href="http://other/"></head>"#;
        assert_eq!(
            parse(with_base, Some("http://example.com/a/b")).base_url(),
            "http://example.com/sub/"
        );
        assert_eq!(parse(with_base, None).base_url(), "/sub/");
        assert_eq!(
            parse(r#"<base href="http://abs.example/">"#, Some("http://example.com/")).base_url(),
            "http://abs.example/"
        );
        assert_eq!(
            parse("<p>", Some("http://example.com/x")).base_url(),
            "http://example.com/x"
        );
        assert_eq!(parse("<p>", None).base_url(), "");
    }

    #[test]
    fn invalid_location_is_fatal() {
        let err = Document::parse(
            b"<p>",
            ParseOptions {
                location: Some("not an iri".into()),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidLocation { .. }));
    }

    #[test]
    fn ids_are_indexed_in_document_order() {
        let doc = parse(r#"<div id="a"><p id="b"></p></div><span id="a"></span>"#, None);
        let a = doc.nodes_by_id("a");
        assert_eq!(a.len(), 2);
        assert_eq!(doc.element(a[0]).unwrap().value().name(), "div");
        assert_eq!(doc.element(a[1]).unwrap().value().name(), "span");
        assert_eq!(doc.nodes_by_id("b").len(), 1);
        assert!(doc.nodes_by_id("missing").is_empty());
    }

    #[test]
    fn metadata_is_absent_without_capture() {
        let doc = parse(r#"<p id="x">hi</p>"#, None);
        let p = doc.nodes_by_id("x")[0];
        assert!(doc.node_metadata(p).is_none());
    }

    #[test]
    fn captured_metadata_points_into_the_source() {
        let source = "<html><body>\n<p class=\"c\" id=\"x\">hi</p></body></html>";
        let doc = Document::parse(
            source.as_bytes(),
            ParseOptions {
                capture_offsets: true,
                ..Default::default()
            },
        )
        .unwrap();
        let p = doc.nodes_by_id("x")[0];
        let element = doc.element(p).unwrap();
        // instrumentation is not visible
        assert_eq!(element.value().attrs().count(), 2);

        let metadata = doc.node_metadata(p).unwrap();
        assert_eq!(
            doc.source_text(metadata.node),
            Some("<p class=\"c\" id=\"x\">")
        );
        assert_eq!(metadata.node.start.line, 1);
        assert_eq!(metadata.node.start.column, 0);
        assert_eq!(doc.source_text(metadata.end_tag.unwrap()), Some("</p>"));
        assert_eq!(doc.source_text(doc.inner_range(p).unwrap()), Some("hi"));

        let id = doc.attribute_offsets(p, "id").unwrap();
        assert_eq!(doc.source_text(id.key), Some("id"));
        assert_eq!(doc.source_text(id.value.unwrap()), Some("x"));
    }

    #[test]
    fn narrow_only_applies_to_verbatim_values() {
        let source = r#"<p id="x" class="aa bb" title="a&amp;b c">"#;
        let doc = Document::parse(
            source.as_bytes(),
            ParseOptions {
                capture_offsets: true,
                ..Default::default()
            },
        )
        .unwrap();
        let p = doc.nodes_by_id("x")[0];

        let class = doc.attribute_offsets(p, "class").unwrap().value.unwrap();
        let bb = doc.narrow(class, "aa bb", 3, 2);
        assert_eq!(doc.source_text(bb), Some("bb"));

        let title = doc.attribute_offsets(p, "title").unwrap().value.unwrap();
        assert_eq!(doc.narrow(title, "a&b c", 4, 1), title);
    }

    #[test]
    fn tokens_keep_their_offsets() {
        let tokens: Vec<_> = split_tokens("  foo bar\tbaz ").collect();
        assert_eq!(tokens, vec![(2, "foo"), (6, "bar"), (10, "baz")]);
    }

    #[test]
    fn relative_references_without_base() {
        assert_eq!(
            resolve_reference(None, "a/b").unwrap().as_str(),
            "a/b"
        );
        let base = Iri::parse("http://example.org/x/".to_string()).unwrap();
        assert_eq!(
            resolve_reference(Some(&base), "a/b").unwrap().as_str(),
            "http://example.org/x/a/b"
        );
        assert!(resolve_reference(None, "a b").is_err());
    }

    #[test]
    fn serializes_children_without_instrumentation() {
        let doc = Document::parse(
            br#"<div id="x">a <b class="q">b&amp;</b><br></div>"#,
            ParseOptions {
                capture_offsets: true,
                ..Default::default()
            },
        )
        .unwrap();
        let div = doc.element(doc.nodes_by_id("x")[0]).unwrap();
        assert_eq!(
            serialize_children(div),
            r#"a <b class="q">b&amp;</b><br>"#
        );
        assert_eq!(text_content(div), "a b&");
    }
}
