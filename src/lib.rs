pub mod client;
pub mod config;
pub mod crypto;
pub mod id;
pub mod pki;
pub mod soap;
pub mod telemetry;
pub mod transport;

pub use client::{Client, ClientOptions, SoapClient};
pub use soap::{Data, Operation, Value};
