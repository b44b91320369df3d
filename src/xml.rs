//! XML Tree Adapter
//!
//! A small owned element tree over a parsed document. Everything tied to the
//! underlying tokenizer (`quick-xml`) stays inside this module: callers see
//! tag names, ordered attributes, ordered children, text and byte offsets.
//!
//! The same types double as the construction API used by the serializer:
//! create an element, set attributes, append children, set text, then render
//! with stable indentation and attribute order equal to insertion order.

use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};

use crate::error::MalformedXmlError;

const INDENT: &str = "    ";

/// The `<?xml ...?>` declaration of a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDeclaration {
    pub version: String,
    pub encoding: Option<String>,
    pub standalone: Option<String>,
}

impl Default for XmlDeclaration {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            encoding: Some("UTF-8".to_string()),
            standalone: Some("yes".to_string()),
        }
    }
}

impl XmlDeclaration {
    fn render(&self, out: &mut String) {
        out.push_str("<?xml version=\"");
        out.push_str(&escape(self.version.as_str()));
        out.push('"');
        if let Some(encoding) = &self.encoding {
            out.push_str(" encoding=\"");
            out.push_str(&escape(encoding.as_str()));
            out.push('"');
        }
        if let Some(standalone) = &self.standalone {
            out.push_str(" standalone=\"");
            out.push_str(&escape(standalone.as_str()));
            out.push('"');
        }
        out.push_str("?>\n");
    }
}

/// A single element node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<XmlElement>,
    text: String,
    offset: Option<usize>,
}

impl XmlElement {
    /// Create an element with no attributes, children or text
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
            text: String::new(),
            offset: None,
        }
    }

    /// Builder-style variant of [`XmlElement::set_attribute`]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Set an attribute. An existing attribute keeps its position.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(key, _)| *key == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    /// Append a child and return a mutable reference to it
    pub fn append_child(&mut self, child: XmlElement) -> &mut XmlElement {
        self.children.push(child);
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn children(&self) -> &[XmlElement] {
        &self.children
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |child| child.name == name)
    }

    pub fn first_child_named(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|child| child.name == name)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Byte offset of the start tag in the source document, if parsed
    pub fn offset(&self) -> Option<usize> {
        self.offset
    }

    fn render(&self, depth: usize, out: &mut String) {
        for _ in 0..depth {
            out.push_str(INDENT);
        }
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attributes {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&escape(value.as_str()));
            out.push('"');
        }

        if self.children.is_empty() && self.text.is_empty() {
            out.push_str("/>\n");
            return;
        }

        if self.children.is_empty() {
            out.push('>');
            out.push_str(&escape(self.text.as_str()));
        } else {
            out.push_str(">\n");
            if !self.text.is_empty() {
                for _ in 0..=depth {
                    out.push_str(INDENT);
                }
                out.push_str(&escape(self.text.as_str()));
                out.push('\n');
            }
            for child in &self.children {
                child.render(depth + 1, out);
            }
            for _ in 0..depth {
                out.push_str(INDENT);
            }
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push_str(">\n");
    }
}

/// A parsed or constructed document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    pub declaration: XmlDeclaration,
    pub root: XmlElement,
}

impl XmlDocument {
    /// Wrap a root element with the default declaration
    pub fn new(root: XmlElement) -> Self {
        Self {
            declaration: XmlDeclaration::default(),
            root,
        }
    }

    /// Parse UTF-8 document bytes into an element tree
    pub fn parse(bytes: &[u8]) -> Result<Self, MalformedXmlError> {
        let text = std::str::from_utf8(bytes).map_err(|e| {
            MalformedXmlError::new(e.valid_up_to(), format!("invalid UTF-8: {}", e))
        })?;
        let (text, base) = match text.strip_prefix('\u{feff}') {
            Some(rest) => (rest, '\u{feff}'.len_utf8()),
            None => (text, 0),
        };

        let mut reader = Reader::from_str(text);
        reader.config_mut().trim_text(true);

        let mut declaration = None;
        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            let offset = base + markup_start(text, reader.buffer_position() as usize);
            let event = reader.read_event().map_err(|e| {
                MalformedXmlError::new(base + reader.error_position() as usize, e.to_string())
            })?;

            match event {
                Event::Decl(decl) => {
                    let version = decl
                        .version()
                        .map(|v| String::from_utf8_lossy(&v).into_owned())
                        .map_err(|e| MalformedXmlError::new(offset, e.to_string()))?;
                    let encoding = decl
                        .encoding()
                        .and_then(|r| r.ok())
                        .map(|v| String::from_utf8_lossy(&v).into_owned());
                    let standalone = decl
                        .standalone()
                        .and_then(|r| r.ok())
                        .map(|v| String::from_utf8_lossy(&v).into_owned());
                    declaration = Some(XmlDeclaration {
                        version,
                        encoding,
                        standalone,
                    });
                }
                Event::Start(start) => {
                    let element = element_from_start(&start, offset)?;
                    if stack.is_empty() && root.is_some() {
                        return Err(MalformedXmlError::new(
                            offset,
                            "content after the root element",
                        ));
                    }
                    stack.push(element);
                }
                Event::Empty(start) => {
                    let element = element_from_start(&start, offset)?;
                    attach(&mut stack, &mut root, element, offset)?;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| MalformedXmlError::new(offset, "unmatched end tag"))?;
                    attach(&mut stack, &mut root, element, offset)?;
                }
                Event::Text(raw) => {
                    let content = raw
                        .unescape()
                        .map_err(|e| MalformedXmlError::new(offset, e.to_string()))?;
                    append_text(&mut stack, &content, offset)?;
                }
                Event::CData(raw) => {
                    let content = String::from_utf8(raw.into_inner().into_owned())
                        .map_err(|e| MalformedXmlError::new(offset, e.to_string()))?;
                    append_text(&mut stack, &content, offset)?;
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(MalformedXmlError::new(
                base + text.len(),
                format!("unclosed element <{}>", open.name),
            ));
        }

        let root = root.ok_or_else(|| {
            MalformedXmlError::new(base + text.len(), "document has no root element")
        })?;

        Ok(Self {
            declaration: declaration.unwrap_or_default(),
            root,
        })
    }

    /// Render the document with four-space indentation
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.declaration.render(&mut out);
        self.root.render(0, &mut out);
        out
    }
}

fn element_from_start(
    start: &BytesStart<'_>,
    offset: usize,
) -> Result<XmlElement, MalformedXmlError> {
    let name = decode_name(start.name().as_ref(), offset)?;
    let mut element = XmlElement::new(name);
    element.offset = Some(offset);

    for attr in start.attributes() {
        let attr = attr.map_err(|e| MalformedXmlError::new(offset, e.to_string()))?;
        let key = decode_name(attr.key.as_ref(), offset)?;
        let value = attr
            .unescape_value()
            .map_err(|e| MalformedXmlError::new(offset, e.to_string()))?;
        element.attributes.push((key, value.into_owned()));
    }

    Ok(element)
}

/// First non-whitespace byte at or after `position`; trimmed whitespace precedes every event
fn markup_start(text: &str, position: usize) -> usize {
    let skipped = text.as_bytes().get(position..).map_or(0, |rest| {
        rest.iter().take_while(|b| b.is_ascii_whitespace()).count()
    });
    position + skipped
}

fn decode_name(raw: &[u8], offset: usize) -> Result<String, MalformedXmlError> {
    std::str::from_utf8(raw)
        .map(str::to_string)
        .map_err(|e| MalformedXmlError::new(offset, format!("invalid UTF-8 in name: {}", e)))
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
    offset: usize,
) -> Result<(), MalformedXmlError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
        return Ok(());
    }
    if root.is_some() {
        return Err(MalformedXmlError::new(
            offset,
            "content after the root element",
        ));
    }
    *root = Some(element);
    Ok(())
}

fn append_text(
    stack: &mut [XmlElement],
    content: &str,
    offset: usize,
) -> Result<(), MalformedXmlError> {
    match stack.last_mut() {
        Some(current) => {
            current.text.push_str(content);
            Ok(())
        }
        None if content.trim().is_empty() => Ok(()),
        None => Err(MalformedXmlError::new(
            offset,
            "text outside the root element",
        )),
    }
}
