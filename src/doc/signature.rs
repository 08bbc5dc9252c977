//! Seam to the XAdES signing engine.
//!
//! The crate never touches key material. It canonicalizes the document and
//! hands the bytes, together with the per-zone signing policy, to a [`Signer`].

use chrono::{DateTime, Utc};
use std::error::Error;

use super::parties::IssuerRole;
use crate::core::{Clock, Zone};

/// `http://www.w3.org/2001/04/xmldsig-more#rsa-sha256`
pub const ALGORITHM_RSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";

/// Error type returned by a [`Signer`]. Passed through to the caller unchanged.
pub type SignerError = Box<dyn Error + Send + Sync>;

/// XAdES signer role tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignerRole {
    Supplier,
    Customer,
    ThirdParty,
}

impl SignerRole {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Supplier => "Supplier",
            Self::Customer => "Customer",
            Self::ThirdParty => "Thirdparty",
        }
    }
}

impl From<IssuerRole> for SignerRole {
    fn from(role: IssuerRole) -> Self {
        match role {
            IssuerRole::Supplier => Self::Supplier,
            IssuerRole::Customer => Self::Customer,
            IssuerRole::ThirdParty => Self::ThirdParty,
        }
    }
}

/// Signature policy each zone requires in the XAdES envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningPolicy {
    pub url: &'static str,
    pub description: &'static str,
    /// Base64 SHA-256 digest of the policy document.
    pub hash: &'static str,
    pub algorithm: &'static str,
}

impl SigningPolicy {
    pub fn for_zone(zone: Zone) -> Self {
        let (url, hash) = match zone {
            Zone::Bizkaia => (
                "https://www.batuz.eus/fitxategiak/batuz/ticketbai/sinadura_elektronikoaren_zehaztapenak_especificaciones_de_la_firma_electronica_v1_0.pdf",
                "Quzn98x3PMbSHwbUzaj5f5KOpiH0u8bvmwbbbNkO9Es=",
            ),
            Zone::Gipuzkoa => (
                "https://www.gipuzkoa.eus/ticketbai/sinadura",
                "vSe1CH7eAFVkGN0X2Y7Nl9XGUoBnziDA5BGUSsyt8mg=",
            ),
            Zone::Araba => (
                "https://ticketbai.araba.eus/tbai/sinadura/",
                "4Vk3uExj7tGn9DyUCPDsV9HRmK6KZfYdRiW3StOjcQA=",
            ),
        };
        Self {
            url,
            description: "",
            hash,
            algorithm: ALGORITHM_RSA_SHA256,
        }
    }
}

/// Everything a signer needs for one document.
pub struct SignRequest<'a> {
    /// Canonical document bytes.
    pub data: &'a [u8],
    /// Unique ID of the signed envelope.
    pub doc_id: &'a str,
    pub role: SignerRole,
    pub policy: SigningPolicy,
    /// Namespace prefix and URI of the document root.
    pub namespace: (&'static str, &'static str),
    pub clock: &'a dyn Clock,
}

impl SignRequest<'_> {
    /// Signing time as reported by the request's clock.
    pub fn signing_time(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

/// Result of signing: the final signature value plus the complete
/// `ds:Signature` element to embed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureEnvelope {
    pub id: String,
    /// Base64 `SignatureValue`.
    pub value: String,
    /// Rendered `ds:Signature` element.
    pub xml: String,
}

/// External XAdES signing collaborator.
pub trait Signer: Send + Sync {
    fn sign(&self, request: &SignRequest<'_>) -> Result<SignatureEnvelope, SignerError>;
}

impl<S: Signer + ?Sized> Signer for &S {
    fn sign(&self, request: &SignRequest<'_>) -> Result<SignatureEnvelope, SignerError> {
        (**self).sign(request)
    }
}

impl<S: Signer + ?Sized> Signer for std::sync::Arc<S> {
    fn sign(&self, request: &SignRequest<'_>) -> Result<SignatureEnvelope, SignerError> {
        (**self).sign(request)
    }
}
