//! Operation payloads.
//!
//! An [`Operation`] becomes `<prefix:Name xmlns:prefix="namespace">` with one
//! child element per data entry. Entries are written in ascending byte order
//! of their keys at every level, which [`Data`] being a `BTreeMap` enforces:
//! the same logical payload always produces the same bytes, and the body
//! digest is computed over exactly those bytes.

use std::collections::BTreeMap;
use std::io::Write;

use quick_xml::Writer;
use serde::Deserialize;
use thiserror::Error;

use crate::soap::config::XmlConfig;
use crate::soap::ser::{self, WriteXml};

/// Field name to value, always iterated in ascending key order.
pub type Data = BTreeMap<String, Value>;

/// A payload value: character data or a nested mapping.
///
/// Deserializes from JSON strings and objects only; numbers, booleans,
/// arrays and null are rejected rather than coerced.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Text(String),
    Map(Data),
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<Data> for Value {
    fn from(value: Data) -> Self {
        Value::Map(value)
    }
}

impl<K: Into<String>, V: Into<Value>, const N: usize> From<[(K, V); N]> for Value {
    fn from(entries: [(K, V); N]) -> Self {
        Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("operation name is required")]
    MissingName,

    #[error("`{0}` is not a valid XML element name")]
    InvalidName(String),

    #[error("character U+{:04X} cannot appear in an XML document", u32::from(*.0))]
    InvalidChar(char),

    #[error("indent character {0:?} is not ASCII")]
    InvalidIndent(char),

    #[error("XML write error: {0}")]
    Io(#[from] std::io::Error),

    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// A single request to the service. Built per call and never mutated by the client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Operation {
    name: String,
    data: Data,
    validate: bool,
    verbose: Option<bool>,
    namespace: Option<String>,
}

impl Operation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Replace the whole data mapping
    pub fn with_data(mut self, data: Data) -> Self {
        self.data = data;
        self
    }

    /// Add a single top-level field
    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Re-verify the signature references locally before sending
    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    /// Override the client-wide request/response logging for this call
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = Some(verbose);
        self
    }

    /// Override the client's operation namespace for this call
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &Data {
        &self.data
    }

    pub fn validate(&self) -> bool {
        self.validate
    }

    pub fn verbose(&self) -> Option<bool> {
        self.verbose
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }
}

/// An operation bound to the prefix and namespace it is written under.
pub(crate) struct OperationElement<'a> {
    pub operation: &'a Operation,
    pub prefix: &'a str,
    pub namespace: &'a str,
}

impl WriteXml for OperationElement<'_> {
    fn write_xml<W: Write>(&self, writer: &mut Writer<W>) -> Result<(), EncodeError> {
        let name = self.operation.name();
        if name.is_empty() {
            return Err(EncodeError::MissingName);
        }
        let qname = qualified(self.prefix, name)?;
        let xmlns = format!("xmlns:{}", self.prefix);

        ser::start(writer, &qname, &[(xmlns.as_str(), self.namespace)])?;
        write_entries(writer, self.prefix, &self.operation.data)?;
        ser::end(writer, &qname)?;
        Ok(())
    }
}

fn write_entries<W: Write>(
    writer: &mut Writer<W>,
    prefix: &str,
    data: &Data,
) -> Result<(), EncodeError> {
    for (key, value) in data {
        let qname = qualified(prefix, key)?;
        match value {
            Value::Text(text) => ser::text_element(writer, &qname, &[], text)?,
            Value::Map(children) => {
                ser::start(writer, &qname, &[])?;
                write_entries(writer, prefix, children)?;
                ser::end(writer, &qname)?;
            }
        }
    }
    Ok(())
}

fn qualified(prefix: &str, local: &str) -> Result<String, EncodeError> {
    if !is_ncname(local) {
        return Err(EncodeError::InvalidName(local.to_string()));
    }
    Ok(format!("{prefix}:{local}"))
}

/// Encode just the operation element, e.g. for inspection or logging.
pub fn encode_operation(
    operation: &Operation,
    prefix: &str,
    namespace: &str,
) -> Result<String, EncodeError> {
    let element = OperationElement {
        operation,
        prefix,
        namespace,
    };
    ser::to_string(&XmlConfig::default(), &element)
}

/// XML name without a colon: a letter or `_`, then letters, digits, `-`, `_` or `.`
pub(crate) fn is_ncname(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_alphabetic() || first == '_')
        && chars.all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
}
