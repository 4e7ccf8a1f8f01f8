mod config;
mod envelope;
pub mod payload;
pub mod response;
mod ser;
pub mod wsdl;
pub mod wsse;

pub use config::XmlConfig;
pub use envelope::{Body, Credentials, Envelope, Header, Security, SigningIdentity, UsernameToken};
pub use payload::{Data, EncodeError, Operation, Value, encode_operation};
pub use ser::to_string;

pub mod ns {
    pub const SOAP_ENV: &str = "http://schemas.xmlsoap.org/soap/envelope/";
    pub const WSDL: &str = "http://schemas.xmlsoap.org/wsdl/";
    /// Operation namespace used when neither the client nor the operation sets one
    pub const DEFAULT_OPERATION: &str = "http://ws.hc2.dc.com/v1";
}

pub mod prefix {
    pub const SOAP_ENV: &str = "soap-env";
    pub const WSSE: &str = "wsse";
    pub const WSU: &str = "ns1";
    pub const WSDL: &str = "wsdl";
    pub const DEFAULT_OPERATION: &str = "v1";
}
