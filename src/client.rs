//! Request orchestration: build, sign, optionally validate, send.

mod error;
#[cfg(test)]
mod tests;

pub use error::{ConfigError, Error, Result};

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Url;
use secrecy::SecretString;
use tracing::{debug, info, instrument};
use xmltree::Element;

use crate::crypto::rsa::RsaPrivateKey;
use crate::id::IdGenerator;
use crate::pki::CertificateMaterial;
use crate::soap::payload::is_ncname;
use crate::soap::wsse::{SigningGateway, ValidationGateway, XmlDsigSigner, XmlDsigValidator};
use crate::soap::{Credentials, Envelope, Operation, SigningIdentity, ns, prefix, wsdl};
use crate::transport::{HttpsTransport, Transport, TransportOptions};

/// The capabilities a SOAP service client offers, for mocking.
#[async_trait]
pub trait SoapClient: Send + Sync {
    /// Operation names advertised by the service WSDL, in document order
    async fn list_operations(&self) -> Result<Vec<String>>;

    /// Send `operation` and return the response body untouched
    async fn raw_query(&self, operation: &Operation) -> Result<Vec<u8>>;

    /// Send `operation` and parse the response body
    async fn query(&self, operation: &Operation) -> Result<Element>;
}

/// Everything needed to construct a [`Client`]
#[derive(Clone)]
pub struct ClientOptions {
    /// Client certificate chain and key. Mandatory; used for TLS and for signing.
    pub certificate: CertificateMaterial,
    pub username: String,
    pub password: SecretString,
    /// Log signed requests and raw responses
    pub debug: bool,
    /// Operation namespace; defaults to [`ns::DEFAULT_OPERATION`]
    pub namespace: Option<String>,
    /// Prefix bound to the operation namespace; defaults to `v1`
    pub prefix: Option<String>,
    pub transport: TransportOptions,
}

impl ClientOptions {
    pub fn new(certificate: CertificateMaterial) -> Self {
        Self {
            certificate,
            username: String::new(),
            password: SecretString::from(String::new()),
            debug: false,
            namespace: None,
            prefix: None,
            transport: TransportOptions::default(),
        }
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<SecretString>,
    ) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_transport_options(mut self, transport: TransportOptions) -> Self {
        self.transport = transport;
        self
    }
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("certificate", &self.certificate)
            .field("username", &self.username)
            .field("debug", &self.debug)
            .field("namespace", &self.namespace)
            .field("prefix", &self.prefix)
            .field("transport", &self.transport)
            .finish_non_exhaustive()
    }
}

/// WS-Security SOAP client.
///
/// Construct once and share: all state is read-only after construction and
/// every call builds its own envelope, so concurrent calls need no locking.
#[derive(Clone)]
pub struct Client {
    url: Url,
    wsdl_url: Url,
    credentials: Credentials,
    identity: Arc<SigningIdentity>,
    private_key: RsaPrivateKey,
    namespace: String,
    prefix: String,
    debug: bool,
    ids: IdGenerator,
    transport: Arc<dyn Transport>,
    signer: Arc<dyn SigningGateway>,
    validator: Arc<dyn ValidationGateway>,
}

impl Client {
    /// Validate `options` and build the HTTPS transport.
    ///
    /// Fails before any network activity if the URL does not parse, the
    /// certificate chain is empty or its leaf cannot be parsed, or the prefix
    /// is unusable.
    pub fn new(url: &str, options: ClientOptions) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| ConfigError::Url {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let identity = SigningIdentity::from_material(&options.certificate)?;

        let prefix = options
            .prefix
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| prefix::DEFAULT_OPERATION.to_string());
        if !is_usable_prefix(&prefix) {
            return Err(ConfigError::Prefix(prefix).into());
        }
        let namespace = options
            .namespace
            .filter(|ns| !ns.is_empty())
            .unwrap_or_else(|| ns::DEFAULT_OPERATION.to_string());

        let transport = HttpsTransport::new(&options.certificate, &options.transport)?;

        let mut wsdl_url = url.clone();
        wsdl_url.set_query(Some("wsdl"));

        debug!(
            %url,
            issuer = %identity.info.issuer,
            serial = %identity.info.serial_number,
            "Client configured"
        );

        Ok(Self {
            url,
            wsdl_url,
            credentials: Credentials::new(options.username, options.password),
            identity: Arc::new(identity),
            private_key: options.certificate.private_key().clone(),
            namespace,
            prefix,
            debug: options.debug,
            ids: IdGenerator::default(),
            transport: Arc::new(transport),
            signer: Arc::new(XmlDsigSigner::new()),
            validator: Arc::new(XmlDsigValidator::new()),
        })
    }

    /// Replace the HTTPS transport
    pub fn with_transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Arc::new(transport);
        self
    }

    /// Replace the XML-DSig signer
    pub fn with_signer(mut self, signer: impl SigningGateway + 'static) -> Self {
        self.signer = Arc::new(signer);
        self
    }

    /// Replace the validator used for operations that ask for validation
    pub fn with_validator(mut self, validator: impl ValidationGateway + 'static) -> Self {
        self.validator = Arc::new(validator);
        self
    }

    pub fn with_id_generator(mut self, ids: IdGenerator) -> Self {
        self.ids = ids;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn wsdl_url(&self) -> &Url {
        &self.wsdl_url
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Build and sign the request for `operation` without sending it
    pub fn signed_request(&self, operation: &Operation) -> Result<String> {
        let namespace = operation
            .namespace()
            .filter(|ns| !ns.is_empty())
            .unwrap_or(&self.namespace);

        let envelope = Envelope::build(
            &self.credentials,
            &self.identity,
            namespace,
            &self.prefix,
            operation,
            &self.ids,
        )?;
        let unsigned = envelope.to_xml()?;

        let signed = self
            .signer
            .sign(&unsigned, &self.private_key)
            .map_err(Error::Signing)?;
        debug!(body_id = %envelope.body.id, "Envelope signed");

        if operation.validate() {
            self.validator.validate(&signed).map_err(Error::Validation)?;
            debug!(body_id = %envelope.body.id, "Signature validated");
        }
        Ok(signed)
    }

    fn verbose(&self, operation: &Operation) -> bool {
        operation.verbose().unwrap_or(self.debug)
    }
}

#[async_trait]
impl SoapClient for Client {
    #[instrument(skip(self))]
    async fn list_operations(&self) -> Result<Vec<String>> {
        debug!(url = %self.wsdl_url, "Fetching WSDL");
        let wsdl = self.transport.get(&self.wsdl_url).await?;
        if self.debug {
            info!(response = %String::from_utf8_lossy(&wsdl), "WSDL");
        }

        let names = wsdl::operation_names(&wsdl)?;
        debug!(count = names.len(), "Operations discovered");
        Ok(names)
    }

    #[instrument(skip_all, fields(operation = operation.name()))]
    async fn raw_query(&self, operation: &Operation) -> Result<Vec<u8>> {
        let verbose = self.verbose(operation);
        let signed = self.signed_request(operation)?;
        if verbose {
            info!(request = %signed, "REQUEST");
        }

        let response = self.transport.post(&self.url, signed).await?;
        if verbose {
            info!(response = %String::from_utf8_lossy(&response), "RESPONSE");
        }
        Ok(response)
    }

    async fn query(&self, operation: &Operation) -> Result<Element> {
        let response = self.raw_query(operation).await?;
        Ok(Element::parse(response.as_slice())?)
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("url", &self.url.as_str())
            .field("credentials", &self.credentials)
            .field("identity", &self.identity)
            .field("namespace", &self.namespace)
            .field("prefix", &self.prefix)
            .field("debug", &self.debug)
            .finish_non_exhaustive()
    }
}

/// The operation prefix must be a plain XML name that does not shadow the
/// envelope's own prefixes.
fn is_usable_prefix(candidate: &str) -> bool {
    is_ncname(candidate)
        && ![prefix::SOAP_ENV, prefix::WSSE, prefix::WSU].contains(&candidate)
        && !candidate.to_ascii_lowercase().starts_with("xml")
}
