use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::Url;

use super::*;
use crate::crypto::rsa::RsaPrivateKey;
use crate::id::{RandomError, RandomSource};
use crate::pki::{PkiError, TestIdentity, generate_test_identity};
use crate::soap::{EncodeError, wsse};
use crate::transport::TransportError;

const WSDL: &str = r#"<wsdl:definitions xmlns:wsdl="http://schemas.xmlsoap.org/wsdl/">
  <wsdl:binding name="B">
    <wsdl:operation name="Ping"/>
    <wsdl:operation name="Lookup"/>
  </wsdl:binding>
</wsdl:definitions>"#;

const RESPONSE: &str = r#"<soap-env:Envelope xmlns:soap-env="http://schemas.xmlsoap.org/soap/envelope/"><soap-env:Body><v1:LookupResponse xmlns:v1="http://ws.hc2.dc.com/v1"><v1:city>Douala</v1:city></v1:LookupResponse></soap-env:Body></soap-env:Envelope>"#;

/// Records every request and answers with canned bodies.
#[derive(Default)]
struct RecordingTransport {
    gets: Mutex<Vec<Url>>,
    posts: Mutex<Vec<(Url, String)>>,
    response: Vec<u8>,
}

impl RecordingTransport {
    fn answering(response: &str) -> Arc<Self> {
        Arc::new(Self {
            response: response.as_bytes().to_vec(),
            ..Default::default()
        })
    }
}

#[async_trait]
impl Transport for Arc<RecordingTransport> {
    async fn get(&self, url: &Url) -> std::result::Result<Vec<u8>, TransportError> {
        self.gets.lock().unwrap().push(url.clone());
        Ok(WSDL.as_bytes().to_vec())
    }

    async fn post(&self, url: &Url, body: String) -> std::result::Result<Vec<u8>, TransportError> {
        self.posts.lock().unwrap().push((url.clone(), body));
        Ok(self.response.clone())
    }
}

/// Signs correctly, then zeroes the first digest value.
struct CorruptingSigner;

impl SigningGateway for CorruptingSigner {
    fn sign(&self, unsigned_xml: &str, private_key: &RsaPrivateKey) -> wsse::Result<String> {
        let signed = XmlDsigSigner::new().sign(unsigned_xml, private_key)?;
        let start = signed.find("<DigestValue>").unwrap() + "<DigestValue>".len();
        let end = start + signed[start..].find('<').unwrap();
        Ok(format!("{}AAAAAAAAAAAAAAAAAAAAAAAAAAA={}", &signed[..start], &signed[end..]))
    }
}

struct FailingSigner;

impl SigningGateway for FailingSigner {
    fn sign(&self, _: &str, _: &RsaPrivateKey) -> wsse::Result<String> {
        Err(wsse::Error::Invalid("key not usable".into()))
    }
}

struct DeadRandom;

impl RandomSource for DeadRandom {
    fn try_fill(&self, _: &mut [u8]) -> std::result::Result<(), RandomError> {
        Err(RandomError("no entropy".into()))
    }
}

fn options(identity: &TestIdentity) -> ClientOptions {
    ClientOptions::new(identity.material.clone()).with_credentials("alice", "s3cret".to_string())
}

fn client_with(transport: Arc<RecordingTransport>) -> Client {
    let identity = generate_test_identity("client.example").unwrap();
    Client::new("https://service.example/ws", options(&identity))
        .unwrap()
        .with_transport(transport)
}

#[test]
fn test_missing_certificate_fails_construction() {
    let identity = generate_test_identity("client.example").unwrap();
    let material = CertificateMaterial::new(vec![], identity.material.private_key().clone());

    let err = Client::new("https://service.example/ws", ClientOptions::new(material)).unwrap_err();
    assert!(
        matches!(
            err,
            Error::Config(ConfigError::Certificate(PkiError::MissingCertificate))
        ),
        "{err}"
    );
}

#[test]
fn test_unparsable_certificate_fails_construction() {
    let identity = generate_test_identity("client.example").unwrap();
    let material = CertificateMaterial::new(
        vec![b"not a certificate".to_vec()],
        identity.material.private_key().clone(),
    );

    let err = Client::new("https://service.example/ws", ClientOptions::new(material)).unwrap_err();
    assert!(matches!(err, Error::Config(ConfigError::Certificate(_))), "{err}");
}

#[test]
fn test_invalid_url_and_prefix() {
    let identity = generate_test_identity("client.example").unwrap();

    let err = Client::new("not a url", options(&identity)).unwrap_err();
    assert!(matches!(err, Error::Config(ConfigError::Url { .. })), "{err}");

    for prefix in ["wsse", "ns1", "soap-env", "xmlfoo", "9v", "a:b"] {
        let err = Client::new(
            "https://service.example/ws",
            options(&identity).with_prefix(prefix),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::Prefix(_))), "{prefix}: {err}");
    }
}

#[test]
fn test_defaults() {
    let identity = generate_test_identity("client.example").unwrap();
    let client = Client::new("https://service.example/ws", options(&identity)).unwrap();

    assert_eq!(client.namespace(), "http://ws.hc2.dc.com/v1");
    assert_eq!(client.prefix(), "v1");
    assert_eq!(client.wsdl_url().as_str(), "https://service.example/ws?wsdl");

    let client = Client::new(
        "https://service.example/ws",
        options(&identity).with_namespace("").with_prefix(""),
    )
    .unwrap();
    assert_eq!(client.namespace(), "http://ws.hc2.dc.com/v1");
    assert_eq!(client.prefix(), "v1");
}

#[tokio::test]
async fn test_list_operations() {
    let transport = RecordingTransport::answering(RESPONSE);
    let client = client_with(transport.clone());

    let names = client.list_operations().await.unwrap();
    assert_eq!(names, ["Ping", "Lookup"]);
    assert_eq!(
        transport.gets.lock().unwrap().as_slice(),
        [Url::parse("https://service.example/ws?wsdl").unwrap()]
    );
}

#[tokio::test]
async fn test_raw_query_posts_signed_envelope() {
    let transport = RecordingTransport::answering(RESPONSE);
    let client = client_with(transport.clone());
    let operation = Operation::new("Lookup")
        .field("name", "alice")
        .with_validation(true);

    let response = client.raw_query(&operation).await.unwrap();
    assert_eq!(response, RESPONSE.as_bytes());

    let posts = transport.posts.lock().unwrap();
    assert_eq!(posts.len(), 1);
    let (url, body) = &posts[0];
    assert_eq!(url.as_str(), "https://service.example/ws");
    assert!(body.starts_with("<soap-env:Envelope"));
    assert!(body.contains(r#"<v1:Lookup xmlns:v1="http://ws.hc2.dc.com/v1"><v1:name>alice</v1:name></v1:Lookup>"#));
    assert!(body.contains("<wsse:Username>alice</wsse:Username>"));
    XmlDsigValidator::new().validate(body).unwrap();
}

#[tokio::test]
async fn test_operation_namespace_override() {
    let transport = RecordingTransport::answering(RESPONSE);
    let client = client_with(transport.clone());
    let operation = Operation::new("Ping").with_namespace("urn:other");

    client.raw_query(&operation).await.unwrap();

    let posts = transport.posts.lock().unwrap();
    assert!(posts[0].1.contains(r#"<v1:Ping xmlns:v1="urn:other"></v1:Ping>"#));
}

#[tokio::test]
async fn test_corrupted_digest_is_not_sent() {
    let transport = RecordingTransport::answering(RESPONSE);
    let client = client_with(transport.clone()).with_signer(CorruptingSigner);
    let operation = Operation::new("Lookup").with_validation(true);

    let err = client.raw_query(&operation).await.unwrap_err();
    assert!(matches!(err, Error::Validation(wsse::Error::DigestMismatch(_))), "{err}");
    assert!(transport.posts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_validation_is_opt_in() {
    let transport = RecordingTransport::answering(RESPONSE);
    let client = client_with(transport.clone()).with_signer(CorruptingSigner);

    client.raw_query(&Operation::new("Lookup")).await.unwrap();
    assert_eq!(transport.posts.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_signing_failure_is_not_sent() {
    let transport = RecordingTransport::answering(RESPONSE);
    let client = client_with(transport.clone()).with_signer(FailingSigner);

    let err = client.raw_query(&Operation::new("Lookup")).await.unwrap_err();
    assert!(matches!(err, Error::Signing(_)), "{err}");
    assert!(transport.posts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_encoding_failure_is_not_sent() {
    let transport = RecordingTransport::answering(RESPONSE);
    let client = client_with(transport.clone());
    let operation = Operation::new("Lookup").field("bad name", "x");

    let err = client.raw_query(&operation).await.unwrap_err();
    assert!(matches!(err, Error::Encoding(_)), "{err}");
    assert!(transport.posts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_unencodable_characters_are_not_sent() {
    let transport = RecordingTransport::answering(RESPONSE);
    let client = client_with(transport.clone());

    let operation = Operation::new("Lookup").field("name", "a\u{1}b");
    let err = client.raw_query(&operation).await.unwrap_err();
    assert!(matches!(err, Error::Encoding(EncodeError::InvalidChar('\u{1}'))), "{err}");

    let identity = generate_test_identity("client.example").unwrap();
    let options = ClientOptions::new(identity.material.clone())
        .with_credentials("alice", "pass\u{1B}word".to_string());
    let client = Client::new("https://service.example/ws", options)
        .unwrap()
        .with_transport(transport.clone());
    let err = client.raw_query(&Operation::new("Ping")).await.unwrap_err();
    assert!(matches!(err, Error::Encoding(EncodeError::InvalidChar('\u{1B}'))), "{err}");

    assert!(transport.posts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_exhausted_randomness_is_an_error() {
    let transport = RecordingTransport::answering(RESPONSE);
    let client = client_with(transport.clone()).with_id_generator(IdGenerator::new(DeadRandom));

    let err = client.raw_query(&Operation::new("Ping")).await.unwrap_err();
    assert!(matches!(err, Error::Identifier(_)), "{err}");
    assert!(transport.posts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_query_parses_response() {
    let client = client_with(RecordingTransport::answering(RESPONSE));

    let document = client.query(&Operation::new("Lookup")).await.unwrap();
    let payload = crate::soap::response::body_payload(&document).unwrap();
    assert_eq!(payload.name, "LookupResponse");
}

#[tokio::test]
async fn test_query_surfaces_parse_errors() {
    let client = client_with(RecordingTransport::answering("<unterminated"));

    let err = client.query(&Operation::new("Lookup")).await.unwrap_err();
    assert!(matches!(err, Error::Parse(_)), "{err}");
}

#[tokio::test]
async fn test_shared_between_tasks() {
    let transport = RecordingTransport::answering(RESPONSE);
    let client = Arc::new(client_with(transport.clone()));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let client = Arc::clone(&client);
            tokio::spawn(async move {
                let operation = Operation::new("Lookup").field("n", i.to_string());
                client.raw_query(&operation).await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let posts = transport.posts.lock().unwrap();
    assert_eq!(posts.len(), 8);
    let mut body_ids: Vec<&str> = posts
        .iter()
        .map(|(_, body)| {
            let start = body.find("ns1:ID=\"").unwrap() + "ns1:ID=\"".len();
            &body[start..start + 35]
        })
        .collect();
    body_ids.sort();
    body_ids.dedup();
    assert_eq!(body_ids.len(), 8);
}
