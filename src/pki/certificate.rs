use std::fmt;
use std::path::Path;
use std::sync::Arc;

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use openssl::x509::X509;
use x509_parser::objects::{oid_registry, oid2abbrev};
use x509_parser::prelude::*;

use crate::crypto::rsa::RsaPrivateKey;
use crate::pki::PkiError;

/// Issuer, serial number and subject of a certificate as they appear in `KeyInfo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    /// Issuer distinguished name, RFC 2253 ordering (most significant RDN last)
    pub issuer: String,
    /// Serial number in decimal
    pub serial_number: String,
    pub subject: String,
}

impl CertificateInfo {
    /// Parse the issuer/serial information out of a DER-encoded certificate
    pub fn from_der(der: impl AsRef<[u8]>) -> Result<Self, PkiError> {
        let (_, cert) =
            X509Certificate::from_der(der.as_ref()).map_err(|e| PkiError::X509(e.into()))?;

        Ok(Self {
            issuer: rfc2253(cert.issuer()),
            serial_number: cert.tbs_certificate.serial.to_string(),
            subject: rfc2253(cert.subject()),
        })
    }
}

/// The client's certificate chain (leaf first) and the matching private key.
///
/// The same material authenticates the TLS connection and signs the request
/// body. Construction does not validate the chain; [`CertificateMaterial::leaf`]
/// reports a missing certificate.
#[derive(Clone)]
pub struct CertificateMaterial {
    chain: Arc<Vec<Vec<u8>>>,
    private_key: RsaPrivateKey,
}

impl CertificateMaterial {
    /// Create from DER-encoded certificates (leaf first) and a private key
    pub fn new(chain: Vec<Vec<u8>>, private_key: RsaPrivateKey) -> Self {
        Self {
            chain: Arc::new(chain),
            private_key,
        }
    }

    /// Load a PEM certificate chain and a PEM private key
    pub fn from_pem(
        cert_chain_pem: impl AsRef<[u8]>,
        key_pem: impl AsRef<[u8]>,
    ) -> Result<Self, PkiError> {
        let chain = X509::stack_from_pem(cert_chain_pem.as_ref())?
            .iter()
            .map(|cert| cert.to_der())
            .collect::<Result<Vec<_>, _>>()?;
        let private_key = RsaPrivateKey::from_pem(key_pem)?;
        Ok(Self::new(chain, private_key))
    }

    /// Read [`CertificateMaterial::from_pem`] input from files
    pub fn from_pem_files(
        cert_chain_path: impl AsRef<Path>,
        key_path: impl AsRef<Path>,
    ) -> Result<Self, PkiError> {
        let cert_chain_pem = std::fs::read(cert_chain_path)?;
        let key_pem = std::fs::read(key_path)?;
        Self::from_pem(cert_chain_pem, key_pem)
    }

    /// DER bytes of the leaf certificate
    pub fn leaf(&self) -> Result<&[u8], PkiError> {
        self.chain
            .first()
            .map(Vec::as_slice)
            .ok_or(PkiError::MissingCertificate)
    }

    /// Base64 of the leaf certificate, as embedded in `X509Certificate`
    pub fn leaf_base64(&self) -> Result<String, PkiError> {
        Ok(BASE64.encode(self.leaf()?))
    }

    /// Issuer and serial number of the leaf certificate
    pub fn info(&self) -> Result<CertificateInfo, PkiError> {
        CertificateInfo::from_der(self.leaf()?)
    }

    pub fn chain(&self) -> &[Vec<u8>] {
        &self.chain
    }

    pub fn private_key(&self) -> &RsaPrivateKey {
        &self.private_key
    }

    /// Certificate chain followed by the private key, all PEM encoded.
    ///
    /// This is the layout expected for a TLS client identity.
    pub fn identity_pem(&self) -> Result<Vec<u8>, PkiError> {
        self.leaf()?;
        let mut pem = Vec::new();
        for der in self.chain.iter() {
            pem.extend_from_slice(&X509::from_der(der)?.to_pem()?);
        }
        pem.extend_from_slice(b"\n");
        pem.extend_from_slice(self.private_key.to_pem()?.as_bytes());
        Ok(pem)
    }
}

impl fmt::Debug for CertificateMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateMaterial")
            .field("chain_len", &self.chain.len())
            .field("private_key", &self.private_key)
            .finish()
    }
}

/// Render a distinguished name the way RFC 2253 orders it
fn rfc2253(name: &X509Name<'_>) -> String {
    let registry = oid_registry();
    let rdns: Vec<_> = name.iter_rdn().collect();

    rdns.iter()
        .rev()
        .map(|rdn| {
            rdn.iter()
                .map(|atv| {
                    let key = oid2abbrev(atv.attr_type(), registry)
                        .map(str::to_string)
                        .unwrap_or_else(|_| atv.attr_type().to_id_string());
                    let value = match atv.as_str() {
                        Ok(s) => escape_dn_value(s),
                        Err(_) => format!("#{}", hex::encode(atv.attr_value().data)),
                    };
                    format!("{key}={value}")
                })
                .collect::<Vec<_>>()
                .join("+")
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn escape_dn_value(value: &str) -> String {
    let last = value.chars().count().saturating_sub(1);
    let mut out = String::with_capacity(value.len());
    for (i, ch) in value.chars().enumerate() {
        let edge_space = ch == ' ' && (i == 0 || i == last);
        if matches!(ch, ',' | '+' | '"' | '\\' | '<' | '>' | ';')
            || edge_space
            || (ch == '#' && i == 0)
        {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}
