//! Exclusive XML Canonicalization (without comments).

use std::borrow::Cow;
use std::collections::BTreeMap;

use quick_xml::Reader;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};

use crate::soap::wsse::{Error, Result};

const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// Perform Exclusive XML Canonicalization with optional inclusive namespaces
pub fn canonicalize(xml: impl AsRef<str>, inclusive_ns: Option<&[&str]>) -> Result<String> {
    Canonicalizer::new(inclusive_ns.unwrap_or_default()).run(xml.as_ref())
}

/// Namespace bindings at one element depth.
#[derive(Debug, Clone, Default)]
struct Scope {
    /// Every binding in scope, declared here or by an ancestor
    declared: BTreeMap<String, String>,
    /// Bindings already written to the output by an ancestor
    rendered: BTreeMap<String, String>,
}

struct Canonicalizer<'a> {
    inclusive: &'a [&'a str],
    scopes: Vec<Scope>,
    out: String,
}

impl<'a> Canonicalizer<'a> {
    fn new(inclusive: &'a [&'a str]) -> Self {
        Self {
            inclusive,
            scopes: vec![Scope::default()],
            out: String::new(),
        }
    }

    fn run(mut self, xml: &str) -> Result<String> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(false);
        reader.config_mut().expand_empty_elements = true;

        loop {
            match reader.read_event()? {
                Event::Start(e) => self.start(&e)?,
                Event::End(e) => {
                    let name = e.name();
                    self.out.push_str("</");
                    self.out.push_str(std::str::from_utf8(name.as_ref())?);
                    self.out.push('>');
                    self.scopes.pop();
                }
                Event::Text(e) if self.scopes.len() > 1 => {
                    // Line endings are normalized before references are
                    // expanded so that `&#xD;` survives as a carriage return.
                    let raw = normalize_line_endings(std::str::from_utf8(&e)?).into_owned();
                    let text = unescape(&raw).map_err(|e| Error::Xml(e.to_string()))?;
                    escape_text(&mut self.out, &text);
                }
                Event::CData(e) if self.scopes.len() > 1 => {
                    let raw = e.into_inner();
                    let text = std::str::from_utf8(&raw)?;
                    escape_text(&mut self.out, &normalize_line_endings(text));
                }
                Event::Eof => break,
                // Declarations, comments, processing instructions and
                // whitespace outside the document element are dropped.
                _ => {}
            }
        }

        if self.scopes.len() != 1 {
            return Err(Error::Xml("unbalanced element nesting".into()));
        }
        Ok(self.out)
    }

    fn start(&mut self, e: &BytesStart) -> Result<()> {
        let parent = self.scopes.last().cloned().unwrap_or_default();
        let mut scope = parent.clone();

        let name = std::str::from_utf8(e.name().as_ref())?.to_string();
        let mut attrs = Vec::new();

        for attr in e.attributes().with_checks(false) {
            let attr = attr?;
            let key = std::str::from_utf8(attr.key.as_ref())?.to_string();
            let value = attr.unescape_value()?.into_owned();

            if key == "xmlns" {
                scope.declared.insert(String::new(), value);
            } else if let Some(prefix) = key.strip_prefix("xmlns:") {
                scope.declared.insert(prefix.to_string(), value);
            } else {
                attrs.push((key, value));
            }
        }

        // Prefixes visibly utilized by the element name and its attributes
        let mut utilized = vec![prefix_of(&name).unwrap_or_default().to_string()];
        for (key, _) in &attrs {
            if let Some(prefix) = prefix_of(key) {
                utilized.push(prefix.to_string());
            }
        }
        for prefix in self.inclusive {
            let prefix = if *prefix == "#default" { "" } else { prefix };
            if scope.declared.contains_key(prefix) {
                utilized.push(prefix.to_string());
            }
        }
        utilized.sort();
        utilized.dedup();

        let mut render = Vec::new();
        for prefix in utilized.iter().filter(|p| p.as_str() != "xml") {
            let uri = scope.declared.get(prefix).map(String::as_str).unwrap_or("");
            let rendered = parent.rendered.get(prefix).map(String::as_str).unwrap_or("");
            if uri != rendered {
                render.push((prefix.clone(), uri.to_string()));
            }
        }

        // Attributes sort by namespace URI, then local name
        let mut sorted: Vec<_> = attrs
            .iter()
            .map(|(key, value)| {
                let (uri, local) = match key.split_once(':') {
                    Some(("xml", local)) => (XML_NS, local),
                    Some((prefix, local)) => (
                        scope.declared.get(prefix).map(String::as_str).unwrap_or(""),
                        local,
                    ),
                    None => ("", key.as_str()),
                };
                (uri, local, key, value)
            })
            .collect();
        sorted.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

        self.out.push('<');
        self.out.push_str(&name);
        for (prefix, uri) in &render {
            if prefix.is_empty() {
                self.out.push_str(" xmlns=\"");
            } else {
                self.out.push_str(" xmlns:");
                self.out.push_str(prefix);
                self.out.push_str("=\"");
            }
            escape_attr(&mut self.out, uri);
            self.out.push('"');
        }
        for (_, _, key, value) in sorted {
            self.out.push(' ');
            self.out.push_str(key);
            self.out.push_str("=\"");
            escape_attr(&mut self.out, value);
            self.out.push('"');
        }
        self.out.push('>');

        for (prefix, uri) in render {
            scope.rendered.insert(prefix, uri);
        }
        self.scopes.push(scope);
        Ok(())
    }
}

fn prefix_of(qname: &str) -> Option<&str> {
    qname.split_once(':').map(|(prefix, _)| prefix)
}

/// Normalize line endings to LF
fn normalize_line_endings(text: &str) -> Cow<'_, str> {
    if text.contains('\r') {
        Cow::Owned(text.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(text)
    }
}

fn escape_attr(out: &mut String, value: &str) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(ch),
        }
    }
}

fn escape_text(out: &mut String, value: &str) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(ch),
        }
    }
}
