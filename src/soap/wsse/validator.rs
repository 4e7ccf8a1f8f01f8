use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use tracing::{debug, warn};

use crate::crypto::rsa::{self, RsaPublicKey};
use crate::soap::wsse::signer::{canonical_signed_info, read_signature, reference_digest};
use crate::soap::wsse::*;

/// Checks a signed document against its own `Signature`.
///
/// Every reference digest is recomputed, then the `SignatureValue` is
/// verified with the public key of the embedded `X509Certificate`. Trust in
/// that certificate is not evaluated.
#[derive(Debug, Default, Clone, Copy)]
pub struct XmlDsigValidator;

impl XmlDsigValidator {
    pub fn new() -> Self {
        Self
    }
}

impl ValidationGateway for XmlDsigValidator {
    fn validate(&self, signed_xml: &str) -> Result<()> {
        let signature = validate_references(signed_xml)?;

        let certificate = BASE64.decode(signature.key_info.security_token_ref.x509_data.certificate.trim())?;
        if certificate.is_empty() {
            return Err(Error::Invalid("Signature carries no X509Certificate".into()));
        }
        let public_key = RsaPublicKey::from_certificate_der(&certificate)?;

        let signed_info = canonical_signed_info(signed_xml, &signature.signed_info)?;
        let hash_alg = signature_hash(&signature.signed_info.signature_method.algorithm)?;
        let signature_value = BASE64.decode(signature.signature_value.trim())?;

        if !rsa::verify(&public_key, signed_info.as_bytes(), &signature_value, hash_alg)? {
            warn!(signature_id = %signature.id, "Signature value verification failed");
            return Err(Error::BadSignature);
        }
        debug!(signature_id = %signature.id, "Signature verified");
        Ok(())
    }
}

/// Recompute every reference digest of `signed_xml` and compare it with the
/// stored `DigestValue`. Returns the parsed signature on success.
pub fn validate_references(signed_xml: &str) -> Result<Signature> {
    let signature = read_signature(signed_xml)?;
    if signature.signed_info.references.is_empty() {
        return Err(Error::Invalid("SignedInfo has no Reference".into()));
    }

    for reference in &signature.signed_info.references {
        let computed = reference_digest(signed_xml, reference)?;
        let expected = BASE64
            .decode(reference.digest_value.trim())
            .map_err(|_| Error::DigestMismatch(reference.uri.clone()))?;

        if computed != expected {
            warn!(uri = %reference.uri, "Reference digest mismatch");
            return Err(Error::DigestMismatch(reference.uri.clone()));
        }
    }
    Ok(signature)
}
