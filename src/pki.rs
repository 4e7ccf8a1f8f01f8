mod cert_utils;
mod certificate;
mod errors;

pub use cert_utils::*;
pub use certificate::{CertificateInfo, CertificateMaterial};
pub use errors::PkiError;
