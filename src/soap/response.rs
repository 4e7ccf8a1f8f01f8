//! Helpers for reading a parsed SOAP 1.1 response.

use xmltree::{Element, XMLNode};

/// A SOAP 1.1 `Fault`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub code: String,
    pub message: String,
}

impl std::fmt::Display for Fault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// The `Body` element of an envelope
pub fn body(envelope: &Element) -> Option<&Element> {
    envelope.get_child("Body")
}

/// First element inside the `Body`, i.e. the operation response or a fault
pub fn body_payload(envelope: &Element) -> Option<&Element> {
    body(envelope)?
        .children
        .iter()
        .find_map(XMLNode::as_element)
}

/// The fault carried by the response, if any
pub fn fault(envelope: &Element) -> Option<Fault> {
    let payload = body_payload(envelope)?;
    if payload.name != "Fault" {
        return None;
    }

    let text = |name: &str| {
        payload
            .get_child(name)
            .and_then(|e| e.get_text())
            .map(|t| t.trim().to_string())
            .unwrap_or_default()
    };
    Some(Fault {
        code: text("faultcode"),
        message: text("faultstring"),
    })
}
