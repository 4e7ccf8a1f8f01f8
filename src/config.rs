use std::{collections::HashMap, path::PathBuf, time::Duration};

use config::{Config as ConfigLib, ConfigError, Environment, File};
use secrecy::SecretString;
use serde::Deserialize;

use crate::client::ClientOptions;
use crate::pki::{CertificateMaterial, PkiError};
use crate::transport::TransportOptions;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub credentials: CredentialsConfig,
    pub tls: TlsConfig,
    #[serde(default)]
    pub debug: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub url: String,
    #[serde(default)]
    pub namespace: Option<String>,
    pub prefix: String,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CredentialsConfig {
    pub username: String,
    pub password: SecretString,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TlsConfig {
    /// PEM certificate chain, leaf first
    pub cert_path: PathBuf,
    /// PEM private key of the leaf certificate
    pub key_path: PathBuf,
    /// Extra PEM root certificate trusted for the service
    #[serde(default)]
    pub ca_path: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_sources(None)
    }

    pub fn load_with_sources(
        env_vars: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = ConfigLib::builder()
            .set_default("service.prefix", "v1")?
            .set_default("debug", false)?
            .add_source(File::with_name("config/settings").required(false));

        // An explicit map replaces the process environment so tests stay isolated
        if let Some(vars) = env_vars {
            for (key, value) in vars {
                builder = builder.set_override(&key, value)?;
            }
        } else {
            // WSSE_SERVICE__URL, WSSE_CREDENTIALS__PASSWORD, WSSE_TLS__CERT_PATH, ...
            builder = builder.add_source(
                Environment::with_prefix("WSSE")
                    .prefix_separator("_")
                    .separator("__"),
            );
        }

        builder.build()?.try_deserialize()
    }

    /// Read the certificate files and turn the settings into [`ClientOptions`].
    ///
    /// # Errors
    /// Returns an error if a PEM file cannot be read or parsed.
    pub fn client_options(&self) -> Result<ClientOptions, PkiError> {
        let material = CertificateMaterial::from_pem_files(&self.tls.cert_path, &self.tls.key_path)?;
        let ca_cert_pem = self
            .tls
            .ca_path
            .as_ref()
            .map(std::fs::read)
            .transpose()?;

        let mut options = ClientOptions::new(material)
            .with_credentials(self.credentials.username.clone(), self.credentials.password.clone())
            .with_debug(self.debug)
            .with_prefix(self.service.prefix.clone())
            .with_transport_options(TransportOptions {
                ca_cert_pem,
                timeout: self.service.timeout_secs.map(Duration::from_secs),
            });
        if let Some(namespace) = &self.service.namespace {
            options = options.with_namespace(namespace.clone());
        }
        Ok(options)
    }
}
