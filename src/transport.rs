//! HTTPS transport authenticated with the client certificate.

mod errors;

pub use errors::TransportError;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Certificate, Client, Identity, Response, Url};
use tracing::{debug, warn};

use crate::pki::CertificateMaterial;

const SOAP_CONTENT_TYPE: &str = "text/xml; charset=utf-8";

/// Moves bytes to and from the service.
///
/// Both calls read the whole response body. Non-success statuses are not
/// errors: the body is returned as is and left to the caller to interpret.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &Url) -> Result<Vec<u8>, TransportError>;

    async fn post(&self, url: &Url, body: String) -> Result<Vec<u8>, TransportError>;
}

/// Options for building an [`HttpsTransport`]
#[derive(Debug, Clone, Default)]
pub struct TransportOptions {
    /// Extra PEM encoded root certificate trusted for the server
    pub ca_cert_pem: Option<Vec<u8>>,
    /// Timeout for a whole request, connect through body
    pub timeout: Option<Duration>,
}

/// `reqwest` transport presenting the client certificate chain on every TLS handshake
#[derive(Debug, Clone)]
pub struct HttpsTransport {
    client: Client,
}

impl HttpsTransport {
    pub fn new(
        material: &CertificateMaterial,
        options: &TransportOptions,
    ) -> Result<Self, TransportError> {
        let identity = Identity::from_pem(&material.identity_pem()?)?;

        let mut builder = Client::builder().use_rustls_tls().identity(identity);
        if let Some(ca_cert) = &options.ca_cert_pem {
            builder = builder.add_root_certificate(Certificate::from_pem(ca_cert)?);
        }
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }

    async fn read(response: Response) -> Result<Vec<u8>, TransportError> {
        let status = response.status();
        let url = response.url().clone();
        let body = response.bytes().await?.to_vec();

        if status.is_success() {
            debug!(%url, %status, bytes = body.len(), "Response received");
        } else {
            warn!(%url, %status, bytes = body.len(), "Service answered with a non-success status");
        }
        Ok(body)
    }
}

#[async_trait]
impl Transport for HttpsTransport {
    async fn get(&self, url: &Url) -> Result<Vec<u8>, TransportError> {
        let response = self.client.get(url.clone()).send().await?;
        Self::read(response).await
    }

    async fn post(&self, url: &Url, body: String) -> Result<Vec<u8>, TransportError> {
        let response = self
            .client
            .post(url.clone())
            .header(CONTENT_TYPE, SOAP_CONTENT_TYPE)
            .body(body)
            .send()
            .await?;
        Self::read(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pki::generate_test_identity;

    #[test]
    fn test_builds_with_generated_identity() {
        let identity = generate_test_identity("client.example").unwrap();
        let options = TransportOptions {
            ca_cert_pem: Some(identity.ca_cert.clone()),
            timeout: Some(Duration::from_secs(5)),
        };
        assert!(HttpsTransport::new(&identity.material, &options).is_ok());
    }

    #[test]
    fn test_empty_chain_is_rejected() {
        let identity = generate_test_identity("client.example").unwrap();
        let material = CertificateMaterial::new(vec![], identity.material.private_key().clone());
        assert!(HttpsTransport::new(&material, &TransportOptions::default()).is_err());
    }
}
