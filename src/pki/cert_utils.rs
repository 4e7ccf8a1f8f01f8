use openssl::asn1::{Asn1Integer, Asn1Time};
use openssl::bn::{BigNum, MsbOption};
use openssl::error::ErrorStack;
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::x509::extension::{BasicConstraints, KeyUsage, SubjectAlternativeName};
use openssl::x509::{X509, X509Builder, X509Name, X509NameBuilder};

use crate::crypto::rsa::RsaPrivateKey;
use crate::pki::{CertificateMaterial, PkiError};

/// A throwaway client identity issued by a throwaway CA, for tests and demos.
#[derive(Debug, Clone)]
pub struct TestIdentity {
    /// Leaf certificate first, then the issuing CA
    pub material: CertificateMaterial,
    /// PEM encoded CA certificate
    pub ca_cert: Vec<u8>,
}

/// Generate a CA and a client certificate for `common_name` signed by it.
pub fn generate_test_identity(common_name: &str) -> Result<TestIdentity, PkiError> {
    let (ca_cert, ca_key) = generate_ca_certificate()?;
    let (leaf_cert, leaf_key) = generate_leaf_certificate(&ca_cert, &ca_key, common_name)?;

    let private_key = RsaPrivateKey::from_der(leaf_key.private_key_to_pkcs8()?)?;
    let material = CertificateMaterial::new(vec![leaf_cert.to_der()?, ca_cert.to_der()?], private_key);

    Ok(TestIdentity {
        material,
        ca_cert: ca_cert.to_pem()?,
    })
}

pub fn generate_ca_certificate() -> Result<(X509, PKey<Private>), ErrorStack> {
    let key_pair = PKey::from_rsa(Rsa::generate(2048)?)?;

    let mut cert_builder = X509Builder::new()?;
    cert_builder.set_version(2)?;
    let serial_number = generate_serial_number()?;
    cert_builder.set_serial_number(&serial_number)?;

    let subject_name = create_x509_name(&[
        ("C", "CM"),
        ("L", "Douala"),
        ("O", "Test Organization"),
        ("OU", "Test CA"),
        ("CN", "Test Root CA"),
    ])?;
    cert_builder.set_subject_name(&subject_name)?;
    cert_builder.set_issuer_name(&subject_name)?;
    cert_builder.set_pubkey(&key_pair)?;

    // Set validity period (1 year)
    let not_before = Asn1Time::days_from_now(0)?;
    let not_after = Asn1Time::days_from_now(365)?;
    cert_builder.set_not_before(&not_before)?;
    cert_builder.set_not_after(&not_after)?;

    cert_builder.append_extension(BasicConstraints::new().critical().ca().build()?)?;
    cert_builder.append_extension(
        KeyUsage::new()
            .critical()
            .key_cert_sign()
            .crl_sign()
            .build()?,
    )?;

    cert_builder.sign(&key_pair, MessageDigest::sha256())?;
    Ok((cert_builder.build(), key_pair))
}

pub fn generate_leaf_certificate(
    ca_cert: &X509,
    ca_key: &PKey<Private>,
    common_name: &str,
) -> Result<(X509, PKey<Private>), ErrorStack> {
    let key_pair = PKey::from_rsa(Rsa::generate(2048)?)?;

    let mut cert_builder = X509Builder::new()?;
    cert_builder.set_version(2)?;
    let serial_number = generate_serial_number()?;
    cert_builder.set_serial_number(&serial_number)?;

    let subject_name = create_x509_name(&[
        ("C", "CM"),
        ("L", "Yaounde"),
        ("O", "Test"),
        ("CN", common_name),
    ])?;
    cert_builder.set_subject_name(&subject_name)?;
    cert_builder.set_issuer_name(ca_cert.subject_name())?;
    cert_builder.set_pubkey(&key_pair)?;

    let not_before = Asn1Time::days_from_now(0)?;
    let not_after = Asn1Time::days_from_now(365)?;
    cert_builder.set_not_before(&not_before)?;
    cert_builder.set_not_after(&not_after)?;

    cert_builder.append_extension(BasicConstraints::new().build()?)?;
    cert_builder.append_extension(
        KeyUsage::new()
            .critical()
            .digital_signature()
            .key_encipherment()
            .build()?,
    )?;
    let san = SubjectAlternativeName::new()
        .dns(common_name)
        .build(&cert_builder.x509v3_context(Some(ca_cert), None))?;
    cert_builder.append_extension(san)?;

    // Sign with CA private key
    cert_builder.sign(ca_key, MessageDigest::sha256())?;
    Ok((cert_builder.build(), key_pair))
}

fn generate_serial_number() -> Result<Asn1Integer, ErrorStack> {
    let mut serial = BigNum::new()?;
    serial.rand(128, MsbOption::MAYBE_ZERO, false)?;
    serial.to_asn1_integer()
}

fn create_x509_name(entries: &[(&str, &str)]) -> Result<X509Name, ErrorStack> {
    let mut name_builder = X509NameBuilder::new()?;
    for (key, value) in entries {
        name_builder.append_entry_by_text(key, value)?;
    }
    Ok(name_builder.build())
}
