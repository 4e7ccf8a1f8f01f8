use std::collections::BTreeMap;

use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};

use crate::soap::wsse::{Error, Result};

/// Extract element by ID attribute
///
/// Namespace declarations inherited from ancestors are copied onto the
/// extracted start tag so that the fragment can be canonicalized on its own.
pub fn extract_element_by_id(xml: &str, id: &str) -> Result<String> {
    extract_with_predicate(xml, |e| {
        e.attributes().with_checks(false).flatten().any(|attr| {
            matches!(attr.key.local_name().as_ref(), b"Id" | b"ID" | b"id")
                && attr.unescape_value().ok().as_deref() == Some(id)
        })
    })?
    .ok_or_else(|| Error::Xml(format!("Element with Id='{id}' not found in document")))
}

/// Extract the first element with the given local name
pub fn extract_element(xml: &str, name: &str) -> Result<String> {
    let target = name.as_bytes();
    extract_with_predicate(xml, |e| e.name().local_name().as_ref() == target)?
        .ok_or_else(|| Error::Xml(format!("Element '{name}' not found in document")))
}

fn extract_with_predicate<F>(xml: &str, predicate: F) -> Result<Option<String>>
where
    F: Fn(&BytesStart) -> bool,
{
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    // In-scope namespace declarations, one map per open element
    let mut scopes: Vec<BTreeMap<String, String>> = vec![BTreeMap::new()];

    loop {
        let offset = reader.buffer_position() as usize;
        match reader.read_event()? {
            Event::Start(e) => {
                if predicate(&e) {
                    let inherited = scopes.last().cloned().unwrap_or_default();
                    let start_tag = &xml[offset..reader.buffer_position() as usize];
                    let end = skip_to_matching_end(&mut reader)?;
                    let rest = &xml[offset + start_tag.len()..end];
                    return Ok(Some(format!(
                        "{}{rest}",
                        with_inherited_namespaces(start_tag, &e, &inherited)?
                    )));
                }
                let mut scope = scopes.last().cloned().unwrap_or_default();
                scope.extend(namespace_declarations(&e)?);
                scopes.push(scope);
            }
            Event::Empty(e) if predicate(&e) => {
                let inherited = scopes.last().cloned().unwrap_or_default();
                let tag = &xml[offset..reader.buffer_position() as usize];
                return Ok(Some(with_inherited_namespaces(tag, &e, &inherited)?));
            }
            Event::End(_) => {
                scopes.pop();
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

/// Consume events up to the end tag closing the current element and return
/// the byte offset just past it.
fn skip_to_matching_end(reader: &mut Reader<&[u8]>) -> Result<usize> {
    let mut depth = 1usize;
    loop {
        match reader.read_event()? {
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                depth -= 1;
                if depth == 0 {
                    return Ok(reader.buffer_position() as usize);
                }
            }
            Event::Eof => return Err(Error::Xml("unexpected end of document".into())),
            _ => {}
        }
    }
}

fn namespace_declarations(e: &BytesStart) -> Result<Vec<(String, String)>> {
    let mut declarations = Vec::new();
    for attr in e.attributes().with_checks(false) {
        let attr = attr?;
        let key = std::str::from_utf8(attr.key.as_ref())?;
        let prefix = match key {
            "xmlns" => "",
            _ => match key.strip_prefix("xmlns:") {
                Some(prefix) => prefix,
                None => continue,
            },
        };
        declarations.push((prefix.to_string(), attr.unescape_value()?.into_owned()));
    }
    Ok(declarations)
}

/// Re-open `tag` with the inherited declarations it does not redeclare itself.
fn with_inherited_namespaces(
    tag: &str,
    e: &BytesStart,
    inherited: &BTreeMap<String, String>,
) -> Result<String> {
    let own: Vec<String> = namespace_declarations(e)?
        .into_iter()
        .map(|(prefix, _)| prefix)
        .collect();

    let mut extra = String::new();
    for (prefix, uri) in inherited {
        if own.contains(prefix) || uri.is_empty() {
            continue;
        }
        if prefix.is_empty() {
            extra.push_str(" xmlns=\"");
        } else {
            extra.push_str(" xmlns:");
            extra.push_str(prefix);
            extra.push_str("=\"");
        }
        extra.push_str(&escape(uri.as_str()));
        extra.push('"');
    }

    let name_end = 1 + e.name().as_ref().len();
    Ok(format!("{}{extra}{}", &tag[..name_end], &tag[name_end..]))
}

/// Replace the text of every `local_name` element found inside the first
/// `within` element, in document order, with the given values.
///
/// Elements of the same name outside `within` are left untouched. Fails if
/// the number of matches differs from the number of values.
pub fn fill_element_text(
    xml: &str,
    within: &str,
    local_name: &str,
    values: &[String],
) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut out = String::with_capacity(xml.len() + values.iter().map(String::len).sum::<usize>());
    let mut copied = 0usize;
    let mut within_depth: Option<usize> = None;
    let mut depth = 0usize;
    let mut filled = 0usize;
    let mut done = false;

    loop {
        let offset = reader.buffer_position() as usize;
        match reader.read_event()? {
            Event::Start(e) => {
                depth += 1;
                let local = e.name().local_name();
                if !done && within_depth.is_none() && local.as_ref() == within.as_bytes() {
                    within_depth = Some(depth);
                } else if within_depth.is_some() && local.as_ref() == local_name.as_bytes() {
                    let value = values.get(filled).ok_or_else(|| {
                        Error::Invalid(format!("more `{local_name}` elements than values"))
                    })?;
                    let qname = e.name();
                    let close_len = "</>".len() + qname.as_ref().len();
                    let content_start = reader.buffer_position() as usize;
                    let content_end = skip_to_matching_end(&mut reader)? - close_len;
                    depth -= 1;

                    out.push_str(&xml[copied..content_start]);
                    out.push_str(&escape(value.as_str()));
                    copied = content_end;
                    filled += 1;
                }
            }
            Event::Empty(e)
                if within_depth.is_some()
                    && e.name().local_name().as_ref() == local_name.as_bytes() =>
            {
                let value = values.get(filled).ok_or_else(|| {
                    Error::Invalid(format!("more `{local_name}` elements than values"))
                })?;
                let qname = e.name();
                let name = std::str::from_utf8(qname.as_ref())?;
                let tag_end = reader.buffer_position() as usize;
                let open = xml[offset..tag_end]
                    .strip_suffix("/>")
                    .map(str::trim_end)
                    .ok_or_else(|| Error::Xml(format!("malformed empty element `{name}`")))?;

                out.push_str(&xml[copied..offset]);
                out.push_str(open);
                out.push('>');
                out.push_str(&escape(value.as_str()));
                out.push_str(&format!("</{name}>"));
                copied = tag_end;
                filled += 1;
            }
            Event::End(_) => {
                if within_depth == Some(depth) {
                    within_depth = None;
                    done = true;
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !done {
        return Err(Error::Xml(format!("Element '{within}' not found in document")));
    }
    if filled != values.len() {
        return Err(Error::Invalid(format!(
            "expected {} `{local_name}` elements, found {filled}",
            values.len()
        )));
    }
    out.push_str(&xml[copied..]);
    Ok(out)
}
