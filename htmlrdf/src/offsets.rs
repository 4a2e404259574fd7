//! Source offsets for tags and attributes.
//!
//! The HTML tree builder does not report where in the input each node came
//! from, so when offsets are requested the input is first scanned for tags.
//! Every start tag found is tagged with an instrumentation attribute holding
//! its index in the scan results; after tree construction the attribute is
//! mapped back onto the node that carries it and then removed.
//!
//! The scanner follows the HTML tokenizer closely enough for well-formed
//! documents. Where the two disagree the only effect is missing metadata.

use memchr::{memchr, memmem};

use crate::statement::{Position, TextRange};

pub(crate) const INSTRUMENTATION_ATTRIBUTE: &str = "data-htmlrdf-node";

/// Elements whose content is text up to the matching end tag.
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "script", "style", "textarea", "title", "xmp", "iframe", "noembed", "noframes", "noscript",
];

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "keygen", "link", "meta", "param",
    "source", "track", "wbr",
];

/// A byte range of the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Span {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct RawAttribute {
    /// Lowercased, as the tree builder stores it.
    pub name: String,
    pub key: Span,
    /// Excludes any quotes. `None` for attributes written without `=`.
    pub value: Option<Span>,
}

#[derive(Debug, Clone)]
pub(crate) struct RawTag {
    pub name: String,
    pub tag: Span,
    pub end_tag: Option<Span>,
    /// Only the first occurrence of each name; later duplicates are dropped by the parser.
    pub attributes: Vec<RawAttribute>,
    name_end: usize,
}

pub(crate) struct Instrumented {
    pub text: String,
    pub tags: Vec<RawTag>,
}

/// Scans `source` and returns a copy with every start tag instrumented.
pub(crate) fn instrument(source: &str) -> Instrumented {
    let tags = scan(source);
    let mut text = String::with_capacity(source.len() + tags.len() * 32);
    let mut copied = 0;
    for (index, tag) in tags.iter().enumerate() {
        text.push_str(&source[copied..tag.name_end]);
        text.push(' ');
        text.push_str(INSTRUMENTATION_ATTRIBUTE);
        text.push_str("=\"");
        text.push_str(&index.to_string());
        text.push('"');
        copied = tag.name_end;
    }
    text.push_str(&source[copied..]);

    Instrumented { text, tags }
}

struct Scanner<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(input: &'a [u8]) -> Self {
        Scanner { input, pos: 0 }
    }

    fn position(&self) -> usize {
        self.pos
    }

    fn set_position(&mut self, pos: usize) {
        self.pos = pos.min(self.input.len());
    }

    fn remaining(&self) -> &'a [u8] {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.get(self.pos + offset).copied()
    }

    fn advance(&mut self, n: usize) {
        self.set_position(self.pos + n);
    }

    fn skip_whitespace(&mut self) {
        while let Some(b' ' | b'\t' | b'\n' | b'\r' | b'\x0C') = self.peek() {
            self.pos += 1;
        }
    }

    fn find_byte(&self, byte: u8) -> Option<usize> {
        memchr(byte, self.remaining()).map(|i| self.pos + i)
    }

    /// Moves past the next occurrence of `needle`, or to the end of input.
    fn skip_past(&mut self, needle: &[u8]) {
        match memmem::find(self.remaining(), needle) {
            Some(i) => self.advance(i + needle.len()),
            None => self.set_position(self.input.len()),
        }
    }

    /// Reads until whitespace, `/`, `>` or (for attributes) `=`.
    /// The first byte is always consumed.
    fn read_name(&mut self, stop_at_equals: bool) -> Span {
        let start = self.pos;
        self.advance(1);
        while let Some(b) = self.peek() {
            match b {
                b' ' | b'\t' | b'\n' | b'\r' | b'\x0C' | b'/' | b'>' => break,
                b'=' if stop_at_equals => break,
                _ => self.pos += 1,
            }
        }
        Span {
            start,
            end: self.pos,
        }
    }

    /// Reads the attributes of a tag and consumes the closing `>`.
    /// Returns the attributes and whether the tag was self-closing.
    fn read_attributes(&mut self) -> (Vec<RawAttribute>, bool) {
        let mut attributes: Vec<RawAttribute> = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return (attributes, false),
                Some(b'>') => {
                    self.advance(1);
                    return (attributes, false);
                }
                Some(b'/') => {
                    if self.peek_at(1) == Some(b'>') {
                        self.advance(2);
                        return (attributes, true);
                    }
                    self.advance(1);
                }
                Some(_) => {
                    let key = self.read_name(true);
                    self.skip_whitespace();
                    let value = if self.peek() == Some(b'=') {
                        self.advance(1);
                        self.skip_whitespace();
                        Some(self.read_value())
                    } else {
                        None
                    };

                    let name = String::from_utf8_lossy(&self.input[key.start..key.end])
                        .to_ascii_lowercase();
                    if !attributes.iter().any(|a| a.name == name) {
                        attributes.push(RawAttribute { name, key, value });
                    }
                }
            }
        }
    }

    fn read_value(&mut self) -> Span {
        match self.peek() {
            Some(quote @ (b'"' | b'\'')) => {
                self.advance(1);
                let start = self.pos;
                let end = self.find_byte(quote).unwrap_or(self.input.len());
                self.set_position(end + 1);
                Span { start, end }
            }
            _ => {
                let start = self.pos;
                while let Some(b) = self.peek() {
                    match b {
                        b' ' | b'\t' | b'\n' | b'\r' | b'\x0C' | b'>' => break,
                        _ => self.pos += 1,
                    }
                }
                Span {
                    start,
                    end: self.pos,
                }
            }
        }
    }

    /// Skips the body of a comment; positioned just after `<!--`.
    fn skip_comment(&mut self) {
        // abruptly closed: <!--> and <!--->
        if self.remaining().starts_with(b">") {
            return self.advance(1);
        }
        if self.remaining().starts_with(b"->") {
            return self.advance(2);
        }

        while let Some(i) = memmem::find(self.remaining(), b"--") {
            self.advance(i + 2);
            if self.remaining().starts_with(b">") {
                return self.advance(1);
            }
            if self.remaining().starts_with(b"!>") {
                return self.advance(2);
            }
            // allow for runs of dashes
            self.set_position(self.pos - 1);
        }
        self.set_position(self.input.len());
    }

    /// Finds the start of the end tag that closes raw text element `name`.
    fn find_end_tag(&self, name: &str) -> Option<usize> {
        let mut from = self.pos;
        while let Some(i) = memmem::find(&self.input[from..], b"</") {
            let at = from + i;
            let after = at + 2 + name.len();
            let matches = self
                .input
                .get(at + 2..after)
                .is_some_and(|n| n.eq_ignore_ascii_case(name.as_bytes()))
                && matches!(
                    self.input.get(after),
                    None | Some(b' ' | b'\t' | b'\n' | b'\r' | b'\x0C' | b'/' | b'>')
                );
            if matches {
                return Some(at);
            }
            from = at + 2;
        }
        None
    }
}

/// Records every start tag, its attributes and (where it can be matched) its end tag.
fn scan(source: &str) -> Vec<RawTag> {
    let mut s = Scanner::new(source.as_bytes());
    let mut tags: Vec<RawTag> = Vec::new();
    let mut open: Vec<usize> = Vec::new();

    while let Some(lt) = s.find_byte(b'<') {
        s.set_position(lt);
        let rest = s.remaining();
        if rest.starts_with(b"<!--") {
            s.advance(4);
            s.skip_comment();
        } else if rest.starts_with(b"<![CDATA[") {
            s.skip_past(b"]]>");
        } else if rest.starts_with(b"<!") || rest.starts_with(b"<?") {
            s.skip_past(b">");
        } else if rest.starts_with(b"</") {
            match s.peek_at(2) {
                Some(c) if c.is_ascii_alphabetic() => {
                    s.advance(2);
                    let name = s.read_name(false);
                    let name = source[name.start..name.end].to_ascii_lowercase();
                    // end tags may carry (ignored) attributes
                    s.read_attributes();
                    close(
                        &mut tags,
                        &mut open,
                        &name,
                        Span {
                            start: lt,
                            end: s.position(),
                        },
                    );
                }
                Some(b'>') => s.advance(3),
                // bogus comment
                _ => s.skip_past(b">"),
            }
        } else if s.peek_at(1).is_some_and(|c| c.is_ascii_alphabetic()) {
            s.advance(1);
            let name = s.read_name(false);
            let name_end = name.end;
            let name = source[name.start..name.end].to_ascii_lowercase();
            let (attributes, _self_closing) = s.read_attributes();
            let index = tags.len();
            tags.push(RawTag {
                tag: Span {
                    start: lt,
                    end: s.position(),
                },
                end_tag: None,
                attributes,
                name_end,
                name: name.clone(),
            });

            if name == "plaintext" {
                break;
            }

            if RAW_TEXT_ELEMENTS.contains(&name.as_str()) {
                match s.find_end_tag(&name) {
                    Some(end_start) => {
                        s.set_position(end_start);
                        s.advance(2 + name.len());
                        s.read_attributes();
                        tags[index].end_tag = Some(Span {
                            start: end_start,
                            end: s.position(),
                        });
                    }
                    None => break,
                }
            } else if !VOID_ELEMENTS.contains(&name.as_str()) {
                open.push(index);
            }
        } else {
            s.advance(1);
        }
    }

    tags
}

fn close(tags: &mut [RawTag], open: &mut Vec<usize>, name: &str, span: Span) {
    if let Some(depth) = open.iter().rposition(|&ix| tags[ix].name == name) {
        tags[open[depth]].end_tag = Some(span);
        open.truncate(depth);
    }
}

/// Converts byte offsets into [`Position`]s.
#[derive(Debug)]
pub(crate) struct LineIndex {
    line_starts: Vec<usize>,
    origin: Position,
}

impl LineIndex {
    pub fn new(source: &str, origin: Position) -> Self {
        let line_starts = std::iter::once(0)
            .chain(memchr::memchr_iter(b'\n', source.as_bytes()).map(|i| i + 1))
            .collect();
        Self {
            line_starts,
            origin,
        }
    }

    pub fn origin(&self) -> Position {
        self.origin
    }

    pub fn position(&self, source: &str, byte: usize) -> Position {
        let line = self.line_starts.partition_point(|&start| start <= byte) - 1;
        let line_start = self.line_starts[line];
        let column = source
            .get(line_start..byte)
            .map_or(byte - line_start, |s| s.chars().count());
        Position::new(byte, line, column).offset_by(self.origin)
    }

    pub fn range(&self, source: &str, span: Span) -> TextRange {
        TextRange {
            start: self.position(source, span.start),
            end: self.position(source, span.end),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(source: &str, span: Span) -> &str {
        &source[span.start..span.end]
    }

    #[test]
    fn records_tags_and_attributes() {
        let source = r#"<p class=x id='y' hidden>hi</p>"#;
        let tags = scan(source);
        assert_eq!(tags.len(), 1);
        let p = &tags[0];
        assert_eq!(p.name, "p");
        assert_eq!(text(source, p.tag), "<p class=x id='y' hidden>");
        assert_eq!(text(source, p.end_tag.unwrap()), "</p>");

        let names: Vec<_> = p.attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["class", "id", "hidden"]);
        assert_eq!(text(source, p.attributes[0].value.unwrap()), "x");
        assert_eq!(text(source, p.attributes[1].value.unwrap()), "y");
        assert_eq!(text(source, p.attributes[1].key), "id");
        assert_eq!(p.attributes[2].value, None);
    }

    #[test]
    fn first_duplicate_attribute_wins() {
        let tags = scan(r#"<a HREF="1" href="2">"#);
        assert_eq!(tags[0].attributes.len(), 1);
        assert_eq!(tags[0].attributes[0].name, "href");
        assert_eq!(tags[0].attributes[0].value.unwrap().start, 9);
    }

    #[test]
    fn skips_comments_and_raw_text() {
        let source = "<!-- <b> --><script>if (a<b) { '<i>' }</script><em>x</em>";
        let tags = scan(source);
        let names: Vec<_> = tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["script", "em"]);
        assert_eq!(text(source, tags[0].end_tag.unwrap()), "</script>");
    }

    #[test]
    fn quoted_greater_than_does_not_end_tag() {
        let source = r#"<meta content="a > b"><p>"#;
        let tags = scan(source);
        assert_eq!(tags.len(), 2);
        assert_eq!(text(source, tags[0].attributes[0].value.unwrap()), "a > b");
    }

    #[test]
    fn end_tags_close_nearest_open_element() {
        let source = "<div><span><br></span></div>";
        let tags = scan(source);
        assert_eq!(text(source, tags[0].end_tag.unwrap()), "</div>");
        assert_eq!(text(source, tags[1].end_tag.unwrap()), "</span>");
        assert_eq!(tags[2].end_tag, None);
    }

    #[test]
    fn instrumentation_is_inserted_after_the_tag_name() {
        let out = instrument("<p a=1><br/></p>");
        assert_eq!(
            out.text,
            r#"<p data-htmlrdf-node="0" a=1><br data-htmlrdf-node="1"/></p>"#
        );
    }

    #[test]
    fn positions_count_lines_and_characters() {
        let source = "ab\nçd<x>";
        let index = LineIndex::new(source, Position::default());
        // 'ç' is two bytes
        assert_eq!(index.position(source, 6), Position::new(6, 1, 2));
        let shifted = LineIndex::new(source, Position::new(10, 2, 5));
        assert_eq!(shifted.position(source, 1), Position::new(11, 2, 6));
        assert_eq!(shifted.position(source, 6), Position::new(16, 3, 2));
    }
}
