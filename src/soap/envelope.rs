//! The unsigned request envelope.
//!
//! ```text
//! soap-env:Envelope
//! ├── soap-env:Header
//! │   └── wsse:Security
//! │       ├── Signature        (Id = SIG-…, Reference URI = #id-…)
//! │       └── wsse:UsernameToken
//! └── soap-env:Body           (ns1:ID = id-…)
//!     └── v1:<Operation>
//! ```

use std::fmt;
use std::io::Write;

use quick_xml::Writer;
use secrecy::{ExposeSecret, SecretString};

use crate::id::{IdError, IdGenerator};
use crate::pki::{CertificateInfo, CertificateMaterial, PkiError};
use crate::soap::config::XmlConfig;
use crate::soap::payload::{EncodeError, Operation, OperationElement};
use crate::soap::ser::{self, WriteXml};
use crate::soap::wsse::{self, Signature, X509IssuerSerial};
use crate::soap::{ns, prefix};

/// Username and clear-text password for the `UsernameToken`.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<SecretString>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// What the `KeyInfo` block says about the signing certificate.
///
/// Parsed once from the certificate material so that building an envelope
/// never has to touch the DER again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningIdentity {
    pub info: CertificateInfo,
    /// Base64 DER of the leaf certificate
    pub certificate_b64: String,
}

impl SigningIdentity {
    pub fn from_material(material: &CertificateMaterial) -> Result<Self, PkiError> {
        Ok(Self {
            info: material.info()?,
            certificate_b64: material.leaf_base64()?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Envelope<'a> {
    pub header: Header,
    pub body: Body<'a>,
    /// Operation namespace bound to `prefix`
    pub namespace: String,
    pub prefix: String,
}

#[derive(Debug, Clone)]
pub struct Header {
    pub security: Security,
}

#[derive(Debug, Clone)]
pub struct Security {
    pub signature: Signature,
    pub username_token: UsernameToken,
}

#[derive(Clone)]
pub struct UsernameToken {
    pub username: String,
    pub password: SecretString,
}

impl fmt::Debug for UsernameToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UsernameToken")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct Body<'a> {
    /// Value of `ns1:ID`, referenced by the signature
    pub id: String,
    pub operation: &'a Operation,
}

impl<'a> Envelope<'a> {
    /// Assemble a fresh envelope for one call.
    ///
    /// Three identifiers are drawn per envelope: the body ID, the signature
    /// ID and the key info ID. The signature reference points at the body ID.
    pub fn build(
        credentials: &Credentials,
        identity: &SigningIdentity,
        namespace: &str,
        prefix: &str,
        operation: &'a Operation,
        ids: &IdGenerator,
    ) -> Result<Self, IdError> {
        let body_id = ids.generate("id")?;
        let signature_id = ids.generate("SIG")?;
        let key_info_id = ids.generate("KI")?;

        let issuer_serial = X509IssuerSerial {
            issuer_name: identity.info.issuer.clone(),
            serial_number: identity.info.serial_number.clone(),
        };
        let signature = Signature::skeleton(
            signature_id,
            key_info_id,
            &body_id,
            issuer_serial,
            identity.certificate_b64.clone(),
        );

        Ok(Self {
            header: Header {
                security: Security {
                    signature,
                    username_token: UsernameToken {
                        username: credentials.username.clone(),
                        password: credentials.password.clone(),
                    },
                },
            },
            body: Body {
                id: body_id,
                operation,
            },
            namespace: namespace.to_string(),
            prefix: prefix.to_string(),
        })
    }

    /// Compact wire form
    pub fn to_xml(&self) -> Result<String, EncodeError> {
        self.to_xml_with(&XmlConfig::default())
    }

    pub fn to_xml_with(&self, config: &XmlConfig) -> Result<String, EncodeError> {
        ser::to_string(config, self)
    }
}

impl WriteXml for Envelope<'_> {
    fn write_xml<W: Write>(&self, writer: &mut Writer<W>) -> Result<(), EncodeError> {
        let envelope = format!("{}:Envelope", prefix::SOAP_ENV);
        let header = format!("{}:Header", prefix::SOAP_ENV);
        let xmlns_env = format!("xmlns:{}", prefix::SOAP_ENV);
        let xmlns_op = format!("xmlns:{}", self.prefix);

        ser::start(
            writer,
            &envelope,
            &[
                (xmlns_env.as_str(), ns::SOAP_ENV),
                (xmlns_op.as_str(), self.namespace.as_str()),
            ],
        )?;
        ser::start(writer, &header, &[])?;
        self.header.security.write_xml(writer)?;
        ser::end(writer, &header)?;

        OperationBody {
            body: &self.body,
            prefix: &self.prefix,
            namespace: &self.namespace,
        }
        .write_xml(writer)?;

        ser::end(writer, &envelope)?;
        Ok(())
    }
}

impl WriteXml for Security {
    fn write_xml<W: Write>(&self, writer: &mut Writer<W>) -> Result<(), EncodeError> {
        let security = format!("{}:Security", prefix::WSSE);
        let xmlns = format!("xmlns:{}", prefix::WSSE);

        ser::start(writer, &security, &[(xmlns.as_str(), wsse::ns::WSSE)])?;
        self.signature.write_xml(writer)?;
        self.username_token.write_xml(writer)?;
        ser::end(writer, &security)?;
        Ok(())
    }
}

impl WriteXml for UsernameToken {
    fn write_xml<W: Write>(&self, writer: &mut Writer<W>) -> Result<(), EncodeError> {
        let token = format!("{}:UsernameToken", prefix::WSSE);

        ser::start(writer, &token, &[])?;
        ser::text_element(
            writer,
            &format!("{}:Username", prefix::WSSE),
            &[],
            &self.username,
        )?;
        ser::text_element(
            writer,
            &format!("{}:Password", prefix::WSSE),
            &[("Type", wsse::ns::PASSWORD_TEXT)],
            self.password.expose_secret(),
        )?;
        ser::end(writer, &token)?;
        Ok(())
    }
}

struct OperationBody<'a, 'b> {
    body: &'a Body<'b>,
    prefix: &'a str,
    namespace: &'a str,
}

impl WriteXml for OperationBody<'_, '_> {
    fn write_xml<W: Write>(&self, writer: &mut Writer<W>) -> Result<(), EncodeError> {
        let body = format!("{}:Body", prefix::SOAP_ENV);
        let id_attr = format!("{}:ID", prefix::WSU);
        let xmlns_env = format!("xmlns:{}", prefix::SOAP_ENV);
        let xmlns_wsu = format!("xmlns:{}", prefix::WSU);

        ser::start(
            writer,
            &body,
            &[
                (id_attr.as_str(), self.body.id.as_str()),
                (xmlns_env.as_str(), ns::SOAP_ENV),
                (xmlns_wsu.as_str(), wsse::ns::WSU),
            ],
        )?;
        OperationElement {
            operation: self.body.operation,
            prefix: self.prefix,
            namespace: self.namespace,
        }
        .write_xml(writer)?;
        ser::end(writer, &body)?;
        Ok(())
    }
}
