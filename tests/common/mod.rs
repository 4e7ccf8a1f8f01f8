use std::sync::{Arc, Mutex};

use axum::{
    Router,
    extract::{RawQuery, State},
    http::{HeaderMap, HeaderName, StatusCode, header::CONTENT_TYPE},
    routing::get,
};
use wsse_soap_client::soap::{
    response,
    wsse::{ValidationGateway, XmlDsigValidator},
};
use xmltree::Element;

pub const WSDL: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<wsdl:definitions xmlns:wsdl="http://schemas.xmlsoap.org/wsdl/" xmlns:soap="http://schemas.xmlsoap.org/wsdl/soap/" name="Directory">
  <wsdl:portType name="DirectoryPort">
    <wsdl:operation name="NotABindingOperation"/>
  </wsdl:portType>
  <wsdl:binding name="DirectoryBinding" type="DirectoryPort">
    <soap:binding transport="http://schemas.xmlsoap.org/soap/http"/>
    <wsdl:operation name="Ping"><soap:operation soapAction=""/></wsdl:operation>
    <wsdl:operation name="Lookup"><soap:operation soapAction=""/></wsdl:operation>
  </wsdl:binding>
</wsdl:definitions>"#;

type Reply = (StatusCode, [(HeaderName, &'static str); 1], String);

/// Request bodies posted to the service, in arrival order.
#[derive(Clone, Default)]
pub struct Received(Arc<Mutex<Vec<String>>>);

impl Received {
    pub fn bodies(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// Spawn a plain HTTP SOAP service on a random port.
///
/// `GET /ws?wsdl` serves [`WSDL`]. `POST /ws` checks the signature and
/// answers `<Name>Response` echoing the username, or a SOAP fault with
/// status 500.
pub async fn spawn_service() -> (String, Received) {
    let received = Received::default();
    let app = Router::new()
        .route("/ws", get(wsdl).post(invoke))
        .with_state(received.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("failed to run server");
    });

    (format!("http://{addr}/ws"), received)
}

async fn wsdl(RawQuery(query): RawQuery) -> Reply {
    match query.as_deref() {
        Some("wsdl") => (StatusCode::OK, [(CONTENT_TYPE, "text/xml")], WSDL.to_string()),
        _ => (StatusCode::NOT_FOUND, [(CONTENT_TYPE, "text/plain")], String::new()),
    }
}

async fn invoke(
    State(received): State<Received>,
    headers: HeaderMap,
    body: String,
) -> Reply {
    received.0.lock().unwrap().push(body.clone());

    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if content_type != "text/xml; charset=utf-8" {
        return fault(StatusCode::UNSUPPORTED_MEDIA_TYPE, "unexpected content type");
    }
    if let Err(e) = XmlDsigValidator::new().validate(&body) {
        return fault(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string());
    }

    let Ok(envelope) = Element::parse(body.as_bytes()) else {
        return fault(StatusCode::BAD_REQUEST, "malformed envelope");
    };
    let Some(operation) = response::body_payload(&envelope) else {
        return fault(StatusCode::BAD_REQUEST, "empty body");
    };
    let username = envelope
        .get_child("Header")
        .and_then(|h| h.get_child("Security"))
        .and_then(|s| s.get_child("UsernameToken"))
        .and_then(|t| t.get_child("Username"))
        .and_then(|u| u.get_text())
        .unwrap_or_default();

    let xml = format!(
        r#"<soap-env:Envelope xmlns:soap-env="http://schemas.xmlsoap.org/soap/envelope/"><soap-env:Body><r:{name}Response xmlns:r="{namespace}"><r:user>{username}</r:user><r:fields>{fields}</r:fields></r:{name}Response></soap-env:Body></soap-env:Envelope>"#,
        name = operation.name,
        namespace = operation.namespace.as_deref().unwrap_or_default(),
        fields = operation.children.len(),
    );
    (StatusCode::OK, [(CONTENT_TYPE, "text/xml")], xml)
}

fn fault(status: StatusCode, message: &str) -> Reply {
    let xml = format!(
        r#"<soap-env:Envelope xmlns:soap-env="http://schemas.xmlsoap.org/soap/envelope/"><soap-env:Body><soap-env:Fault><faultcode>soap-env:Client</faultcode><faultstring>{}</faultstring></soap-env:Fault></soap-env:Body></soap-env:Envelope>"#,
        quick_xml::escape::escape(message)
    );
    (status, [(CONTENT_TYPE, "text/xml")], xml)
}
