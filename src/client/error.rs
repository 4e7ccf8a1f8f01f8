use crate::id::IdError;
use crate::pki::PkiError;
use crate::soap::EncodeError;
use crate::soap::wsse;
use crate::transport::TransportError;

/// Why a client could not be built from its options
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("client certificate: {0}")]
    Certificate(#[from] PkiError),

    #[error("invalid service URL `{url}`: {reason}")]
    Url { url: String, reason: String },

    #[error("`{0}` cannot be used as the operation namespace prefix")]
    Prefix(String),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("could not generate a reference ID: {0}")]
    Identifier(#[from] IdError),

    #[error("could not encode the request: {0}")]
    Encoding(#[from] EncodeError),

    #[error("signing failed: {0}")]
    Signing(#[source] wsse::Error),

    #[error("signature validation failed: {0}")]
    Validation(#[source] wsse::Error),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("response is not well-formed XML: {0}")]
    Parse(#[from] xmltree::ParseError),
}

impl From<PkiError> for Error {
    fn from(err: PkiError) -> Self {
        Error::Config(ConfigError::Certificate(err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
