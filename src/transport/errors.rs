use crate::pki::PkiError;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Client identity error: {0}")]
    Identity(#[from] PkiError),
}
