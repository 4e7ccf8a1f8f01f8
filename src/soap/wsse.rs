//! WS-Security header model and the XML-DSig signing/validation gateways.

pub mod c14n;
mod error;
mod signer;
mod utils;
mod validator;

pub use error::Error;
pub use signer::XmlDsigSigner;
pub use validator::{XmlDsigValidator, validate_references};

use std::io::Write;

use quick_xml::Writer;
use serde::Deserialize;

use crate::crypto::{HashAlg, rsa::RsaPrivateKey};
use crate::soap::payload::EncodeError;
use crate::soap::prefix;
use crate::soap::ser::{self, WriteXml};

pub type Result<T> = std::result::Result<T, Error>;

pub mod algorithms {
    // The only digest and signature algorithms this client produces or accepts
    pub const SHA1: &str = "http://www.w3.org/2000/09/xmldsig#sha1";
    pub const RSA_SHA1: &str = "http://www.w3.org/2000/09/xmldsig#rsa-sha1";

    // Canonicalization and transform algorithms
    pub const EXCLUSIVE_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";
}

// Namespaces
pub mod ns {
    pub const WSSE: &str =
        "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd";
    pub const WSU: &str =
        "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd";
    pub const DS: &str = "http://www.w3.org/2000/09/xmldsig#";
    pub const PASSWORD_TEXT: &str = "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-username-token-profile-1.0#PasswordText";
}

/// Produces a signed document from an envelope carrying an unsigned `Signature` skeleton.
pub trait SigningGateway: Send + Sync {
    /// Fill every `DigestValue` and the `SignatureValue` of `unsigned_xml`.
    fn sign(&self, unsigned_xml: &str, private_key: &RsaPrivateKey) -> Result<String>;
}

/// Re-checks a signed document before it leaves the process.
pub trait ValidationGateway: Send + Sync {
    fn validate(&self, signed_xml: &str) -> Result<()>;
}

/// Digest algorithm named by a `DigestMethod`
pub(crate) fn digest_hash(uri: &str) -> Result<HashAlg> {
    match uri {
        algorithms::SHA1 => Ok(HashAlg::Sha1),
        other => Err(Error::UnsupportedAlgorithm(other.to_string())),
    }
}

/// Hash behind the RSA algorithm named by a `SignatureMethod`
pub(crate) fn signature_hash(uri: &str) -> Result<HashAlg> {
    match uri {
        algorithms::RSA_SHA1 => Ok(HashAlg::Sha1),
        other => Err(Error::UnsupportedAlgorithm(other.to_string())),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Signature {
    #[serde(rename = "@Id", default)]
    pub id: String,

    #[serde(rename = "SignedInfo")]
    pub signed_info: SignedInfo,

    #[serde(rename = "SignatureValue", default)]
    pub signature_value: String,

    #[serde(rename = "KeyInfo")]
    pub key_info: KeyInfo,
}

impl Signature {
    /// An unsigned signature over the element identified by `body_id`.
    ///
    /// Exclusive C14N, RSA-SHA1 and SHA-1 are fixed; the digest and the
    /// signature value stay empty for the signing gateway to fill in.
    pub fn skeleton(
        id: String,
        key_info_id: String,
        body_id: &str,
        issuer_serial: X509IssuerSerial,
        certificate: String,
    ) -> Self {
        let reference = Reference {
            uri: format!("#{body_id}"),
            transforms: Some(Transforms {
                transform: vec![Transform {
                    algorithm: algorithms::EXCLUSIVE_C14N.into(),
                    inclusive_ns: None,
                }],
            }),
            digest_method: DigestMethod {
                algorithm: algorithms::SHA1.into(),
            },
            digest_value: String::new(),
        };

        Self {
            id,
            signed_info: SignedInfo {
                canon_method: CanonicalizationMethod {
                    algorithm: algorithms::EXCLUSIVE_C14N.into(),
                },
                signature_method: SignatureMethod {
                    algorithm: algorithms::RSA_SHA1.into(),
                },
                references: vec![reference],
            },
            signature_value: String::new(),
            key_info: KeyInfo {
                id: key_info_id,
                security_token_ref: SecurityTokenReference {
                    x509_data: X509Data {
                        issuer_serial,
                        certificate,
                    },
                },
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SignedInfo {
    #[serde(rename = "CanonicalizationMethod")]
    pub canon_method: CanonicalizationMethod,

    #[serde(rename = "SignatureMethod")]
    pub signature_method: SignatureMethod,

    #[serde(rename = "Reference", default)]
    pub references: Vec<Reference>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CanonicalizationMethod {
    #[serde(rename = "@Algorithm")]
    pub algorithm: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SignatureMethod {
    #[serde(rename = "@Algorithm")]
    pub algorithm: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Reference {
    #[serde(rename = "@URI")]
    pub uri: String,

    #[serde(rename = "Transforms", default)]
    pub transforms: Option<Transforms>,

    #[serde(rename = "DigestMethod")]
    pub digest_method: DigestMethod,

    #[serde(rename = "DigestValue", default)]
    pub digest_value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Transforms {
    #[serde(rename = "Transform", default)]
    pub transform: Vec<Transform>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Transform {
    #[serde(rename = "@Algorithm")]
    pub algorithm: String,

    #[serde(rename = "InclusiveNamespaces", default)]
    pub inclusive_ns: Option<InclusiveNamespaces>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InclusiveNamespaces {
    #[serde(rename = "@PrefixList", default)]
    pub prefix_list: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DigestMethod {
    #[serde(rename = "@Algorithm")]
    pub algorithm: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KeyInfo {
    #[serde(rename = "@Id", default)]
    pub id: String,

    #[serde(rename = "SecurityTokenReference")]
    pub security_token_ref: SecurityTokenReference,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SecurityTokenReference {
    #[serde(rename = "X509Data")]
    pub x509_data: X509Data,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct X509Data {
    #[serde(rename = "X509IssuerSerial")]
    pub issuer_serial: X509IssuerSerial,

    /// Base64 DER of the signing certificate
    #[serde(rename = "X509Certificate", default)]
    pub certificate: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct X509IssuerSerial {
    #[serde(rename = "X509IssuerName")]
    pub issuer_name: String,

    #[serde(rename = "X509SerialNumber")]
    pub serial_number: String,
}

// The DSig elements live in the default namespace declared on `Signature`,
// so only the security token reference carries a prefix.

impl WriteXml for Signature {
    fn write_xml<W: Write>(&self, writer: &mut Writer<W>) -> std::result::Result<(), EncodeError> {
        ser::start(writer, "Signature", &[("Id", self.id.as_str()), ("xmlns", ns::DS)])?;
        self.signed_info.write_xml(writer)?;
        ser::text_element(writer, "SignatureValue", &[], &self.signature_value)?;
        self.key_info.write_xml(writer)?;
        ser::end(writer, "Signature")?;
        Ok(())
    }
}

impl WriteXml for SignedInfo {
    fn write_xml<W: Write>(&self, writer: &mut Writer<W>) -> std::result::Result<(), EncodeError> {
        ser::start(writer, "SignedInfo", &[])?;
        ser::text_element(
            writer,
            "CanonicalizationMethod",
            &[("Algorithm", self.canon_method.algorithm.as_str())],
            "",
        )?;
        ser::text_element(
            writer,
            "SignatureMethod",
            &[("Algorithm", self.signature_method.algorithm.as_str())],
            "",
        )?;
        for reference in &self.references {
            reference.write_xml(writer)?;
        }
        ser::end(writer, "SignedInfo")?;
        Ok(())
    }
}

impl WriteXml for Reference {
    fn write_xml<W: Write>(&self, writer: &mut Writer<W>) -> std::result::Result<(), EncodeError> {
        ser::start(writer, "Reference", &[("URI", self.uri.as_str())])?;
        if let Some(transforms) = &self.transforms {
            ser::start(writer, "Transforms", &[])?;
            for transform in &transforms.transform {
                ser::text_element(writer, "Transform", &[("Algorithm", transform.algorithm.as_str())], "")?;
            }
            ser::end(writer, "Transforms")?;
        }
        ser::text_element(
            writer,
            "DigestMethod",
            &[("Algorithm", self.digest_method.algorithm.as_str())],
            "",
        )?;
        ser::text_element(writer, "DigestValue", &[], &self.digest_value)?;
        ser::end(writer, "Reference")?;
        Ok(())
    }
}

impl WriteXml for KeyInfo {
    fn write_xml<W: Write>(&self, writer: &mut Writer<W>) -> std::result::Result<(), EncodeError> {
        let token_ref = format!("{}:SecurityTokenReference", prefix::WSSE);
        let x509_data = &self.security_token_ref.x509_data;

        ser::start(writer, "KeyInfo", &[("Id", self.id.as_str())])?;
        ser::start(writer, &token_ref, &[])?;
        ser::start(writer, "X509Data", &[])?;
        ser::start(writer, "X509IssuerSerial", &[])?;
        ser::text_element(writer, "X509IssuerName", &[], &x509_data.issuer_serial.issuer_name)?;
        ser::text_element(
            writer,
            "X509SerialNumber",
            &[],
            &x509_data.issuer_serial.serial_number,
        )?;
        ser::end(writer, "X509IssuerSerial")?;
        ser::text_element(writer, "X509Certificate", &[], &x509_data.certificate)?;
        ser::end(writer, "X509Data")?;
        ser::end(writer, &token_ref)?;
        ser::end(writer, "KeyInfo")?;
        Ok(())
    }
}
