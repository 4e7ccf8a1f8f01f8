use std::io::{self, Write};

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::soap::config::XmlConfig;
use crate::soap::payload::EncodeError;

const XML_VERSION: &str = "1.0";

/// Types that write themselves as a fixed XML layout.
///
/// Element and attribute order are part of the wire contract, so the model
/// writes tokens explicitly instead of going through serde.
pub trait WriteXml {
    fn write_xml<W: Write>(&self, writer: &mut Writer<W>) -> Result<(), EncodeError>;
}

/// Serializes a value to an XML string with the given configuration
pub fn to_string<T>(config: &XmlConfig, value: &T) -> Result<String, EncodeError>
where
    T: WriteXml + ?Sized,
{
    let mut writer = if config.pretty {
        let (indent_char, indent_size) = config.indent;
        let indent_byte = u8::try_from(indent_char)
            .ok()
            .filter(u8::is_ascii)
            .ok_or(EncodeError::InvalidIndent(indent_char))?;
        Writer::new_with_indent(Vec::new(), indent_byte, indent_size)
    } else {
        Writer::new(Vec::new())
    };

    if config.xml_decl {
        let decl = BytesDecl::new(XML_VERSION, Some(&config.encoding), None);
        writer.write_event(Event::Decl(decl))?;
    }

    value.write_xml(&mut writer)?;
    Ok(String::from_utf8(writer.into_inner())?)
}

/// Writes `<name attrs...>`. Attribute values are escaped.
pub(crate) fn start<W: Write>(
    writer: &mut Writer<W>,
    name: &str,
    attrs: &[(&str, &str)],
) -> Result<(), EncodeError> {
    let mut elem = BytesStart::new(name);
    for &(key, value) in attrs {
        check_chars(value)?;
        elem.push_attribute((key, value));
    }
    writer.write_event(Event::Start(elem))?;
    Ok(())
}

pub(crate) fn end<W: Write>(writer: &mut Writer<W>, name: &str) -> io::Result<()> {
    writer.write_event(Event::End(BytesEnd::new(name)))
}

/// Writes a complete element holding `text`.
///
/// An empty text still produces a start/end pair, never a self-closing tag.
pub(crate) fn text_element<W: Write>(
    writer: &mut Writer<W>,
    name: &str,
    attrs: &[(&str, &str)],
    text: &str,
) -> Result<(), EncodeError> {
    check_chars(text)?;
    start(writer, name, attrs)?;
    if !text.is_empty() {
        writer.write_event(Event::Text(BytesText::new(text)))?;
    }
    end(writer, name)?;
    Ok(())
}

/// Escaping cannot represent characters outside the XML 1.0 `Char` production.
fn check_chars(value: &str) -> Result<(), EncodeError> {
    match value.chars().find(|&c| !is_xml_char(c)) {
        Some(c) => Err(EncodeError::InvalidChar(c)),
        None => Ok(()),
    }
}

fn is_xml_char(c: char) -> bool {
    matches!(
        c,
        '\u{9}'
            | '\u{A}'
            | '\u{D}'
            | '\u{20}'..='\u{D7FF}'
            | '\u{E000}'..='\u{FFFD}'
            | '\u{10000}'..='\u{10FFFF}'
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Greeting(&'static str);

    impl WriteXml for Greeting {
        fn write_xml<W: Write>(&self, writer: &mut Writer<W>) -> Result<(), EncodeError> {
            start(writer, "g:Greeting", &[("xmlns:g", "urn:greeting"), ("lang", "en")])?;
            text_element(writer, "g:Text", &[], self.0)?;
            text_element(writer, "g:Empty", &[], "")?;
            end(writer, "g:Greeting")?;
            Ok(())
        }
    }

    #[test]
    fn test_compact_output() {
        let xml = to_string(&XmlConfig::default(), &Greeting("hi & bye")).unwrap();
        assert_eq!(
            xml,
            r#"<g:Greeting xmlns:g="urn:greeting" lang="en"><g:Text>hi &amp; bye</g:Text><g:Empty></g:Empty></g:Greeting>"#
        );
    }

    #[test]
    fn test_control_characters_are_rejected() {
        for bad in ["a\u{1}b", "\u{0}", "tab\u{B}", "\u{FFFE}"] {
            let err = to_string(&XmlConfig::default(), &Greeting(bad)).unwrap_err();
            assert!(matches!(err, EncodeError::InvalidChar(_)), "{bad:?}: {err}");
        }
        let xml = to_string(&XmlConfig::default(), &Greeting("line\r\n\tend \u{10348}")).unwrap();
        assert!(xml.contains("<g:Text>line\r\n\tend \u{10348}</g:Text>"));
    }

    #[test]
    fn test_control_character_in_attribute_is_rejected() {
        let mut writer = Writer::new(Vec::new());
        let err = start(&mut writer, "a", &[("v", "x\u{1F}")]).unwrap_err();
        assert!(matches!(err, EncodeError::InvalidChar('\u{1F}')));
    }

    #[test]
    fn test_non_ascii_indent_is_rejected() {
        let config = XmlConfig::new().pretty(true).indent('\u{3000}', 1);
        let err = to_string(&config, &Greeting("hi")).unwrap_err();
        assert!(matches!(err, EncodeError::InvalidIndent('\u{3000}')));

        let config = XmlConfig::new().pretty(true).indent('\t', 1);
        assert!(to_string(&config, &Greeting("hi")).unwrap().contains("\n\t<g:Text>"));
    }

    #[test]
    fn test_declaration_and_pretty_printing() {
        let config = XmlConfig::new().xml_decl(true).pretty(true);
        let xml = to_string(&config, &Greeting("hi")).unwrap();
        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(xml.contains("\n  <g:Text>hi</g:Text>"));
    }
}
