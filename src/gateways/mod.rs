//! Submission gateways of the three provincial tax authorities.
//!
//! Every zone speaks a different protocol. Araba and Gipuzkoa take the
//! signed XML as-is over REST; Bizkaia wraps it in an LROE envelope, gzips it
//! and reports the outcome through response headers. All three sit behind
//! the [`Connection`] trait.

mod araba;
mod ebizkaia;
mod gipuzkoa;
mod rest;

pub use araba::Araba;
pub use ebizkaia::{EBizkaia, N3Response, check_response, lroe};
pub use gipuzkoa::Gipuzkoa;
pub use rest::{RestOutput, RestResponse, RestValidationResult, parse_rest_response};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::core::{TbaiError, Zone};
use crate::doc::{CancelTicketBai, ChainData, Issuer, Locale, TicketBai};

/// Which deployment of the gateways to talk to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    #[default]
    Sandbox,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Production => "production",
            Self::Sandbox => "sandbox",
        })
    }
}

impl FromStr for Environment {
    type Err = TbaiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "sandbox" | "test" | "testing" => Ok(Self::Sandbox),
            other => Err(TbaiError::validation(format!("unknown environment '{other}'"))),
        }
    }
}

/// Outcome of a gateway call that did not succeed.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GatewayError {
    /// Transport failure or a technical error on the server side.
    #[error("connection: {}", join(.code, .message))]
    Connection {
        code: Option<String>,
        message: String,
    },
    /// The request was understood and rejected.
    #[error("invalid: {}", join(.code, .message))]
    Invalid {
        code: Option<String>,
        message: String,
    },
    /// The record already exists on the server.
    #[error("duplicate: {}", join(.code, .message))]
    Duplicate {
        code: Option<String>,
        message: String,
    },
    /// The gateway does not offer this operation.
    #[error("{0} not supported by this gateway")]
    NotSupported(&'static str),
    /// Building the request or reading the response failed.
    #[error("encoding: {0}")]
    Encoding(String),
}

fn join(code: &Option<String>, message: &str) -> String {
    match code {
        Some(code) if message.is_empty() => code.clone(),
        Some(code) => format!("{code}: {message}"),
        None => message.to_string(),
    }
}

impl GatewayError {
    pub(crate) fn transport(e: reqwest::Error) -> Self {
        Self::Connection {
            code: None,
            message: e.to_string(),
        }
    }

    pub(crate) fn encoding(e: impl fmt::Display) -> Self {
        Self::Encoding(e.to_string())
    }
}

impl From<GatewayError> for TbaiError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Connection { code, message } => TbaiError::Connection { code, message },
            GatewayError::Invalid { code, message } => TbaiError::Validation { code, message },
            GatewayError::Duplicate { code, message } => TbaiError::Duplicate { code, message },
            e @ GatewayError::NotSupported(_) => TbaiError::Internal(e.to_string()),
            GatewayError::Encoding(message) => TbaiError::Xml(message),
        }
    }
}

/// Restrict a fetch to documents with this header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadFilter {
    pub series: String,
    pub code: String,
    /// `dd-mm-yyyy`
    pub issue_date: String,
}

impl HeadFilter {
    pub fn for_document(doc: &TicketBai) -> Self {
        let h = &doc.invoice.header;
        Self {
            series: h.series.clone(),
            code: h.code.clone(),
            issue_date: h.issue_date.clone(),
        }
    }
}

/// Query for previously submitted documents of one taxpayer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchQuery {
    pub nif: String,
    pub name: String,
    pub year: i32,
    /// Starts at 1.
    pub page: u32,
    pub head: Option<HeadFilter>,
}

/// A document as reported back by a gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedDocument {
    pub issuer: Issuer,
    pub series: String,
    pub code: String,
    pub issue_date: String,
    pub issue_time: String,
    pub total: String,
    /// Full `SignatureValue`.
    pub signature: String,
}

impl IssuedDocument {
    pub fn chain_data(&self) -> ChainData {
        ChainData {
            series: self.series.clone(),
            code: self.code.clone(),
            issue_date: self.issue_date.clone(),
            signature: self.signature.clone(),
        }
        .truncated()
    }
}

/// Contract shared by every zone gateway. Documents are expected to be
/// fingerprinted and signed.
#[async_trait]
pub trait Connection: Send + Sync {
    async fn post(&self, doc: &TicketBai) -> Result<(), GatewayError>;

    async fn cancel(&self, doc: &CancelTicketBai) -> Result<(), GatewayError>;

    async fn fetch(&self, _query: &FetchQuery) -> Result<Vec<IssuedDocument>, GatewayError> {
        Err(GatewayError::NotSupported("fetch"))
    }
}

/// TLS and transport settings shared by all gateway connections.
#[derive(Debug)]
pub struct GatewayOptions {
    pub timeout: Duration,
    /// Client certificate presented to the gateways.
    pub identity: Option<reqwest::Identity>,
    /// Extra trust roots, on top of the built-in ones.
    pub root_certificates: Vec<reqwest::Certificate>,
    pub locale: Locale,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            identity: None,
            root_certificates: Vec::new(),
            locale: Locale::Es,
        }
    }
}

impl GatewayOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_identity(mut self, identity: reqwest::Identity) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Client identity from a PEM bundle holding both key and certificate.
    pub fn with_identity_pem(self, pem: &[u8]) -> Result<Self, GatewayError> {
        let identity = reqwest::Identity::from_pem(pem).map_err(GatewayError::encoding)?;
        Ok(self.with_identity(identity))
    }

    pub fn with_root_certificate(mut self, cert: reqwest::Certificate) -> Self {
        self.root_certificates.push(cert);
        self
    }

    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = locale;
        self
    }

    /// Build the HTTP client. It is cheap to clone and shared by all
    /// connections built from these options.
    pub fn http_client(self) -> Result<reqwest::Client, GatewayError> {
        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(self.timeout);
        if let Some(identity) = self.identity {
            builder = builder.identity(identity);
        }
        for cert in self.root_certificates {
            builder = builder.add_root_certificate(cert);
        }
        builder.build().map_err(GatewayError::transport)
    }
}

/// Gateway connection per zone.
#[derive(Clone, Default)]
pub struct Gateways {
    connections: HashMap<Zone, Arc<dyn Connection>>,
}

impl fmt::Debug for Gateways {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gateways")
            .field("zones", &self.connections.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Gateways {
    /// Connections to all three zones in the given environment.
    pub fn new(env: Environment, options: GatewayOptions) -> Result<Self, GatewayError> {
        let locale = options.locale;
        let client = options.http_client()?;
        Ok(Self::empty()
            .register(Zone::Bizkaia, EBizkaia::new(env, client.clone()))
            .register(Zone::Gipuzkoa, Gipuzkoa::new(env, client.clone(), locale))
            .register(Zone::Araba, Araba::new(env, client, locale)))
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Add or replace the connection for a zone.
    pub fn register(mut self, zone: Zone, conn: impl Connection + 'static) -> Self {
        self.connections.insert(zone, Arc::new(conn));
        self
    }

    pub fn register_arc(mut self, zone: Zone, conn: Arc<dyn Connection>) -> Self {
        self.connections.insert(zone, conn);
        self
    }

    pub fn get(&self, zone: Zone) -> Option<Arc<dyn Connection>> {
        self.connections.get(&zone).cloned()
    }
}

/// Header text is not always UTF-8; fall back to Windows-1252.
pub fn decode_header_text(raw: &[u8]) -> String {
    match std::str::from_utf8(raw) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (text, _, _) = encoding_rs::WINDOWS_1252.decode(raw);
            text.into_owned()
        }
    }
}
