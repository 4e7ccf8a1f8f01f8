use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use quick_xml::de::from_str as xml_from_str;
use tracing::debug;

use crate::crypto::{rsa, rsa::RsaPrivateKey};
use crate::soap::wsse::*;

/// XML-DSig signer for envelopes carrying a `Signature` skeleton.
///
/// Reference digests are computed over the referenced elements exactly as
/// they appear in the input, so the input must already be in its final
/// wire form.
#[derive(Debug, Default, Clone, Copy)]
pub struct XmlDsigSigner;

impl XmlDsigSigner {
    pub fn new() -> Self {
        Self
    }
}

impl SigningGateway for XmlDsigSigner {
    fn sign(&self, unsigned_xml: &str, private_key: &RsaPrivateKey) -> Result<String> {
        let signature = read_signature(unsigned_xml)?;

        let digests = signature
            .signed_info
            .references
            .iter()
            .map(|reference| {
                let digest = reference_digest(unsigned_xml, reference)?;
                debug!(uri = %reference.uri, "Computed reference digest");
                Ok(BASE64.encode(digest))
            })
            .collect::<Result<Vec<_>>>()?;

        let with_digests = utils::fill_element_text(unsigned_xml, "Signature", "DigestValue", &digests)?;

        let signed_info = canonical_signed_info(&with_digests, &signature.signed_info)?;
        let hash_alg = signature_hash(&signature.signed_info.signature_method.algorithm)?;
        let signature_value = rsa::sign(private_key, signed_info.as_bytes(), hash_alg)?;
        debug!(%hash_alg, bytes = signature_value.len(), "Signed SignedInfo");

        utils::fill_element_text(
            &with_digests,
            "Signature",
            "SignatureValue",
            &[BASE64.encode(signature_value.as_bytes())],
        )
    }
}

/// Parse the first `Signature` element of a document
pub(super) fn read_signature(xml: &str) -> Result<Signature> {
    let signature_xml = utils::extract_element(xml, "Signature")?;
    xml_from_str(&signature_xml).map_err(Error::from)
}

/// Canonical form of `SignedInfo` as found in `xml`
pub(super) fn canonical_signed_info(xml: &str, signed_info: &SignedInfo) -> Result<String> {
    let algorithm = signed_info.canon_method.algorithm.as_str();
    if algorithm != algorithms::EXCLUSIVE_C14N {
        return Err(Error::UnsupportedAlgorithm(algorithm.to_string()));
    }
    let signed_info_xml = utils::extract_element(xml, "SignedInfo")?;
    c14n::canonicalize(&signed_info_xml, None)
}

/// Digest of the element a `Reference` points at, after its transforms
pub(super) fn reference_digest(xml: &str, reference: &Reference) -> Result<Vec<u8>> {
    let id = reference
        .uri
        .strip_prefix('#')
        .filter(|id| !id.is_empty())
        .ok_or_else(|| Error::Invalid(format!("Invalid reference URI: {}", reference.uri)))?;

    let element_xml = utils::extract_element_by_id(xml, id)?;
    let transformed = apply_transforms(&element_xml, reference.transforms.as_ref())?;
    let hash_alg = digest_hash(&reference.digest_method.algorithm)?;
    Ok(hash_alg.hash(transformed.as_bytes())?)
}

fn apply_transforms(data: &str, transforms: Option<&Transforms>) -> Result<String> {
    let Some(transforms) = transforms.filter(|t| !t.transform.is_empty()) else {
        return c14n::canonicalize(data, None);
    };

    let mut result = data.to_string();
    for transform in &transforms.transform {
        result = match transform.algorithm.as_str() {
            algorithms::EXCLUSIVE_C14N => {
                let prefixes: Vec<&str> = transform
                    .inclusive_ns
                    .as_ref()
                    .map(|ns| ns.prefix_list.split_whitespace().collect())
                    .unwrap_or_default();
                c14n::canonicalize(&result, Some(prefixes.as_slice()))?
            }
            alg => return Err(Error::UnsupportedAlgorithm(alg.to_string())),
        };
    }
    Ok(result)
}
