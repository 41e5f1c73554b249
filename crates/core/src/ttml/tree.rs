//! Owned element tree built from the quick-xml event stream.
//!
//! Names are stored by local name only, so `tt:p`, `p` and `x:p` are the same
//! element. Namespace declarations are kept apart for dialect probing.

use std::str;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{debug, trace};

use crate::ConvertError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Element {
    pub(crate) name: String,
    pub(crate) attributes: Vec<(String, String)>,
    /// URIs of the `xmlns` declarations made on this element.
    pub(crate) namespaces: Vec<String>,
    pub(crate) children: Vec<Node>,
}

impl Element {
    /// Attribute value by local name.
    pub(crate) fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Attribute value by local name, `None` when absent or blank.
    pub(crate) fn attr_non_empty(&self, name: &str) -> Option<&str> {
        self.attr(name).map(str::trim).filter(|v| !v.is_empty())
    }

    pub(crate) fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    pub(crate) fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|e| e.name == name)
    }

    pub(crate) fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.elements().filter(move |e| e.name == name)
    }

    /// All descendants called `name` in document order.
    /// The search does not descend into a match.
    pub(crate) fn descendants_named<'a>(&'a self, name: &str) -> Vec<&'a Element> {
        fn walk<'a>(element: &'a Element, name: &str, found: &mut Vec<&'a Element>) {
            for child in element.elements() {
                if child.name == name {
                    found.push(child);
                } else {
                    walk(child, name, found);
                }
            }
        }
        let mut found = Vec::new();
        walk(self, name, &mut found);
        found
    }

    /// Concatenated text of the whole subtree.
    pub(crate) fn text_content(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            match node {
                Node::Text(t) => out.push_str(t),
                Node::Element(e) => out.push_str(&e.text_content()),
            }
        }
        out
    }

    fn push_text(&mut self, text: &str) {
        if let Some(Node::Text(last)) = self.children.last_mut() {
            last.push_str(text);
        } else {
            self.children.push(Node::Text(text.to_string()));
        }
    }
}

/// Decode raw bytes as UTF-8, ignoring whatever the XML prolog declares.
///
/// Documents in the wild declare `utf-16` while being stored as UTF-8, so the
/// declaration is never trusted. Only a leading UTF-8 BOM is removed.
pub(crate) fn decode_utf8(content: &[u8]) -> Result<&str, ConvertError> {
    let content = content.strip_prefix(b"\xef\xbb\xbf").unwrap_or(content);
    let text = str::from_utf8(content)?;
    if let Some(declared) = declared_encoding(text) {
        if !declared.eq_ignore_ascii_case("utf-8") && !declared.eq_ignore_ascii_case("utf8") {
            debug!("ignoring declared encoding {declared}, decoding as utf-8");
        }
    }
    Ok(text)
}

/// The `encoding` pseudo-attribute of the XML declaration, if any.
fn declared_encoding(text: &str) -> Option<&str> {
    let decl = text.trim_start().strip_prefix("<?xml")?;
    let decl = &decl[..decl.find("?>")?];
    let rest = &decl[decl.find("encoding")? + "encoding".len()..];
    let rest = rest.trim_start().strip_prefix('=')?.trim_start();
    let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let value = &rest[1..];
    Some(&value[..value.find(quote)?])
}

/// Local name of the first element, or `None` when the content is not XML.
pub(crate) fn root_name(content: &[u8]) -> Option<String> {
    let text = decode_utf8(content).ok()?;
    let mut reader = Reader::from_str(text);
    loop {
        match reader.read_event().ok()? {
            Event::Start(e) | Event::Empty(e) => {
                return str::from_utf8(e.local_name().as_ref())
                    .ok()
                    .map(str::to_string);
            }
            Event::Text(e) if e.iter().any(|b| !b.is_ascii_whitespace()) => return None,
            Event::Eof => return None,
            _ => {}
        }
    }
}

/// Parse a whole document into its root element.
pub(crate) fn parse(content: &[u8]) -> Result<Element, ConvertError> {
    let text = decode_utf8(content)?;
    trace!("tree::parse(len={})", text.len());
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(false);
    reader.config_mut().expand_empty_elements = true;

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;
    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                if root.is_some() {
                    return Err(ConvertError::malformed("content after the root element"));
                }
                stack.push(open_element(&e, &reader)?);
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| ConvertError::malformed("unbalanced end tag"))?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(Node::Element(element)),
                    None => root = Some(element),
                }
            }
            Event::Text(e) => {
                if let Some(current) = stack.last_mut() {
                    current.push_text(&e.xml_content()?);
                }
            }
            Event::CData(e) => {
                if let Some(current) = stack.last_mut() {
                    current.push_text(&e.decode()?);
                }
            }
            Event::GeneralRef(e) => {
                if let Some(current) = stack.last_mut() {
                    let name = str::from_utf8(e.as_ref())?;
                    current.push_text(&resolve_entity(name));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    if let Some(open) = stack.last() {
        return Err(ConvertError::malformed(format!("unclosed element <{}>", open.name)));
    }
    root.ok_or_else(|| ConvertError::malformed("document has no root element"))
}

fn open_element(e: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Result<Element, ConvertError> {
    let decoder = reader.decoder();
    let mut element = Element {
        name: decoder.decode(e.local_name().as_ref())?.into_owned(),
        ..Default::default()
    };
    for attr in e.attributes() {
        let attr = attr?;
        let value = attr.decode_and_unescape_value(decoder)?.into_owned();
        if attr.key.as_namespace_binding().is_some() {
            element.namespaces.push(value);
            continue;
        }
        let key = decoder.decode(attr.key.local_name().as_ref())?.into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

/// Expand a predefined or numeric entity. Unknown entities are kept verbatim.
fn resolve_entity(name: &str) -> String {
    let resolved = if let Some(num) = name.strip_prefix('#') {
        let (radix, digits) = num
            .strip_prefix(['x', 'X'])
            .map_or((10, num), |hex| (16, hex));
        u32::from_str_radix(digits, radix)
            .ok()
            .and_then(char::from_u32)
    } else {
        match name {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => None,
        }
    };
    match resolved {
        Some(c) => c.to_string(),
        None => {
            debug!("keeping unknown entity &{name};");
            format!("&{name};")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_prefix_agnostic_tree() {
        let root = parse(
            br#"<tt:tt xmlns:tt="http://www.w3.org/ns/ttml" xmlns:ttp="p" ttp:frameRate="25">
<tt:body><tt:div><tt:p xml:id="c1" begin="1s">a<tt:br/>b</tt:p></tt:div></tt:body></tt:tt>"#,
        )
        .unwrap();
        assert_eq!(root.name, "tt");
        assert_eq!(root.attr("frameRate"), Some("25"));
        assert_eq!(root.namespaces, vec!["http://www.w3.org/ns/ttml", "p"]);
        let ps = root.descendants_named("p");
        assert_eq!(ps.len(), 1);
        assert_eq!(ps[0].attr("id"), Some("c1"));
        assert_eq!(ps[0].elements().next().map(|e| e.name.as_str()), Some("br"));
    }

    #[test]
    fn resolves_entities_into_one_text_node() {
        let root = parse(b"<t>a &amp; b &#233;&#x41;<![CDATA[<x>]]></t>").unwrap();
        assert_eq!(root.children, vec![Node::Text("a & b \u{e9}A<x>".into())]);
    }

    #[test]
    fn ignores_declared_encoding() {
        let doc = "<?xml version=\"1.0\" encoding=\"utf-16\"?><a>é</a>";
        assert_eq!(declared_encoding(doc), Some("utf-16"));
        let root = parse(doc.as_bytes()).unwrap();
        assert_eq!(root.text_content(), "é");
    }

    #[test]
    fn strips_bom() {
        let root = parse(b"\xef\xbb\xbf<a/>").unwrap();
        assert_eq!(root.name, "a");
    }

    #[test]
    fn rejects_broken_documents() {
        assert!(matches!(parse(b"<a><b></a>"), Err(ConvertError::Xml(_))));
        assert!(parse(b"<a><b>").is_err());
        assert!(matches!(
            parse(b"no markup"),
            Err(ConvertError::MalformedStructure { .. })
        ));
        assert!(matches!(
            parse(b"\xff\xfe<\x00a\x00/\x00>\x00"),
            Err(ConvertError::InvalidUtf8(_))
        ));
    }

    #[test]
    fn sniffs_root_name() {
        assert_eq!(
            root_name(b"<?xml version=\"1.0\"?>\n<!-- c -->\n<x:tt xmlns:x=\"n\"/>").as_deref(),
            Some("tt")
        );
        assert_eq!(root_name(b"1\n00:00:01,000 --> 00:00:02,000\n"), None);
    }
}
