//! Operation discovery from a WSDL 1.1 document.

use xmltree::{Element, ParseError, XMLNode};

use crate::soap::{ns, prefix};

/// Names of every `binding/operation` in document order.
///
/// Duplicates are kept and nothing is sorted. A document without bindings
/// yields an empty list.
pub fn operation_names(wsdl: &[u8]) -> Result<Vec<String>, ParseError> {
    let root = Element::parse(wsdl)?;
    let mut names = Vec::new();
    collect(&root, &mut names);
    Ok(names)
}

fn collect(element: &Element, names: &mut Vec<String>) {
    let is_binding = is_wsdl(element, "binding");

    for child in element.children.iter().filter_map(XMLNode::as_element) {
        if is_binding && is_wsdl(child, "operation") {
            if let Some(name) = child.attributes.get("name") {
                names.push(name.clone());
            }
        }
        collect(child, names);
    }
}

fn is_wsdl(element: &Element, local_name: &str) -> bool {
    element.name == local_name
        && (element.namespace.as_deref() == Some(ns::WSDL)
            || element.prefix.as_deref() == Some(prefix::WSDL))
}

#[cfg(test)]
mod tests {
    use super::*;

    const WSDL: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<wsdl:definitions xmlns:wsdl="http://schemas.xmlsoap.org/wsdl/"
                  xmlns:soap="http://schemas.xmlsoap.org/wsdl/soap/"
                  xmlns:tns="http://ws.example.com/v1"
                  targetNamespace="http://ws.example.com/v1">
  <wsdl:portType name="LookupPort">
    <wsdl:operation name="PortTypeOnly"/>
  </wsdl:portType>
  <wsdl:binding name="LookupBinding" type="tns:LookupPort">
    <soap:binding transport="http://schemas.xmlsoap.org/soap/http"/>
    <wsdl:operation name="Ping">
      <soap:operation soapAction=""/>
    </wsdl:operation>
    <wsdl:operation name="Lookup">
      <soap:operation soapAction=""/>
    </wsdl:operation>
  </wsdl:binding>
</wsdl:definitions>"#;

    #[test]
    fn test_binding_operations_in_order() {
        let names = operation_names(WSDL.as_bytes()).unwrap();
        assert_eq!(names, ["Ping", "Lookup"]);
    }

    #[test]
    fn test_namespace_matched_under_other_prefix() {
        let wsdl = r#"<d:definitions xmlns:d="http://schemas.xmlsoap.org/wsdl/">
            <d:binding name="A"><d:operation name="One"/><d:operation name="One"/></d:binding>
            <d:binding name="B"><d:operation name="Two"/></d:binding>
        </d:definitions>"#;
        assert_eq!(operation_names(wsdl.as_bytes()).unwrap(), ["One", "One", "Two"]);
    }

    #[test]
    fn test_no_operations_is_empty() {
        let wsdl = r#"<wsdl:definitions xmlns:wsdl="http://schemas.xmlsoap.org/wsdl/"/>"#;
        assert!(operation_names(wsdl.as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_document_fails() {
        assert!(operation_names(b"<wsdl:definitions").is_err());
        assert!(operation_names(b"not xml at all").is_err());
    }
}
