use openssl::error::ErrorStack;
use thiserror::Error;
use x509_parser::prelude::X509Error;

/// Errors raised while loading or inspecting the client certificate material.
#[derive(Debug, Error)]
pub enum PkiError {
    #[error("client certificate is required")]
    MissingCertificate,

    #[error("X.509 error: {0}")]
    X509(#[from] X509Error),

    #[error("Crypto error: {0}")]
    Crypto(#[from] crate::crypto::Error),

    #[error("OpenSSL error: {0}")]
    OpenSsl(#[from] ErrorStack),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
