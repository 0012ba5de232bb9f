//! Small owned element tree built from quick-xml events.
//!
//! Change documents are tiny, so the parser reads them fully into memory
//! and then queries the tree the way a path expression would
//! (`.//add-attr[@attr-name='Login']/value`).

use crate::error::{ParseError, ParseResult};
use quick_xml::Reader;
use quick_xml::encoding::Decoder;
use quick_xml::events::{BytesStart, Event};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Element {
    pub name: String,
    attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
    text: String,
}

impl Element {
    fn from_start(start: &BytesStart<'_>, decoder: Decoder) -> ParseResult<Self> {
        let name = decoder
            .decode(start.local_name().as_ref())
            .map_err(|e| ParseError::syntax(format!("bad element name: {e}")))?
            .into_owned();
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| ParseError::syntax(format!("bad attribute on <{name}>: {e}")))?;
            let key = decoder
                .decode(attr.key.local_name().as_ref())
                .map_err(|e| ParseError::syntax(format!("bad attribute name on <{name}>: {e}")))?
                .into_owned();
            let value = attr
                .decode_and_unescape_value(decoder)
                .map_err(|e| ParseError::syntax(format!("bad attribute value on <{name}>: {e}")))?;
            attributes.push((key, value.into_owned()));
        }
        Ok(Self {
            name,
            attributes,
            ..Self::default()
        })
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Text content with surrounding whitespace removed.
    pub fn text(&self) -> &str {
        self.text.trim()
    }

    /// Direct children with the given name, in document order.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |child| child.name == name)
    }

    /// All descendants with the given name, depth-first in document order.
    pub fn descendants_named<'a>(&'a self, name: &str) -> Vec<&'a Element> {
        let mut found = Vec::new();
        self.collect_descendants(name, &mut found);
        found
    }

    fn collect_descendants<'a>(&'a self, name: &str, found: &mut Vec<&'a Element>) {
        for child in &self.children {
            if child.name == name {
                found.push(child);
            }
            child.collect_descendants(name, found);
        }
    }
}

/// Read a whole document held as text into an element tree. Any encoding
/// declaration is ignored since the text is already decoded.
pub(crate) fn parse_tree(xml: &str) -> ParseResult<Element> {
    build_tree(Reader::from_str(xml))
}

/// Read a whole document from raw bytes, decoding per its BOM or
/// `<?xml encoding="..."?>` declaration (UTF-8 when neither is present).
pub(crate) fn parse_tree_bytes(xml: &[u8]) -> ParseResult<Element> {
    build_tree(Reader::from_reader(xml))
}

fn build_tree(mut reader: Reader<&[u8]>) -> ParseResult<Element> {
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = reader.read_event().map_err(|e| {
            ParseError::syntax(format!("{e} at byte {}", reader.buffer_position()))
        })?;

        match event {
            Event::Start(start) => {
                if root.is_some() {
                    return Err(ParseError::syntax("content after the root element"));
                }
                stack.push(Element::from_start(&start, reader.decoder())?);
            }
            Event::Empty(start) => {
                let element = Element::from_start(&start, reader.decoder())?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| ParseError::syntax("unexpected closing tag"))?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                let text = text
                    .unescape()
                    .map_err(|e| ParseError::syntax(format!("bad text: {e}")))?;
                append_text(&mut stack, &text)?;
            }
            Event::CData(cdata) => {
                let text = cdata
                    .decode()
                    .map_err(|e| ParseError::syntax(format!("bad CDATA: {e}")))?;
                append_text(&mut stack, &text)?;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(ParseError::syntax(format!("unclosed element <{}>", open.name)));
    }
    root.ok_or(ParseError::MissingRoot)
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> ParseResult<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => return Err(ParseError::syntax("content after the root element")),
    }
    Ok(())
}

fn append_text(stack: &mut [Element], text: &str) -> ParseResult<()> {
    match stack.last_mut() {
        Some(current) => {
            current.text.push_str(text);
            Ok(())
        }
        None => Err(ParseError::syntax("text outside the root element")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builds_tree_in_document_order() {
        let root = parse_tree(
            r#"<input><a k="1"><value> x </value></a><b/><a k="2"><c><value>y</value></c></a></input>"#,
        )
        .unwrap();

        assert_eq!(root.name, "input");
        let a: Vec<_> = root.children_named("a").collect();
        assert_eq!(a.len(), 2);
        assert_eq!(a[1].attribute("k"), Some("2"));

        let values: Vec<_> = root.descendants_named("value").into_iter().map(|v| v.text()).collect();
        assert_eq!(values, vec!["x", "y"]);
    }

    #[test]
    fn test_unescapes_text_and_attributes() {
        let root = parse_tree(r#"<r n="a &amp; b"><![CDATA[<raw>]]> &lt;t&gt;</r>"#).unwrap();
        assert_eq!(root.attribute("n"), Some("a & b"));
        assert_eq!(root.text(), "<raw><t>");
    }

    #[test]
    fn test_decodes_declared_latin1() {
        let mut xml = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><g n=\"Gest".to_vec();
        xml.extend_from_slice(&[0xE3]);
        xml.extend_from_slice(b"o\"><value>Jo");
        xml.extend_from_slice(&[0xE3]);
        xml.extend_from_slice(b"o</value></g>");

        let root = parse_tree_bytes(&xml).unwrap();
        assert_eq!(root.attribute("n"), Some("Gestão"));
        let values: Vec<_> = root.descendants_named("value").into_iter().map(|v| v.text()).collect();
        assert_eq!(values, vec!["João"]);
    }

    #[test]
    fn test_bytes_without_declaration_are_utf8() {
        let root = parse_tree_bytes("<g><value>Gestão</value></g>".as_bytes()).unwrap();
        assert_eq!(root.descendants_named("value")[0].text(), "Gestão");
    }

    #[test]
    fn test_rejects_malformed_documents() {
        assert!(matches!(parse_tree("<a><b></a>"), Err(ParseError::Syntax { .. })));
        assert!(matches!(parse_tree("<a><b>"), Err(ParseError::Syntax { .. })));
        assert!(matches!(parse_tree("<a/><b/>"), Err(ParseError::Syntax { .. })));
        assert_eq!(parse_tree("   "), Err(ParseError::MissingRoot));
    }
}
