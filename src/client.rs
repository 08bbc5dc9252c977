//! Document lifecycle for one taxpayer configuration: convert, fingerprint,
//! sign, submit and cancel.
//!
//! The client is safe to share between tasks. Submissions for the same
//! taxpayer and zone must still be serialized by the caller, since each
//! document is chained to the previous one.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::{Clock, Invoice, SystemClock, TbaiError, Zone};
use crate::doc::{
    CHAIN_SIGNATURE_LEN, CancelTicketBai, ChainData, Codes, Formatting, IssuerRole, Locale,
    Signer, Software, TicketBai, truncate,
};
use crate::gateways::{
    Connection, Environment, FetchQuery, GatewayError, GatewayOptions, Gateways, HeadFilter,
    IssuedDocument,
};

/// Everything that stays fixed for a client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub software: Software,
    pub zone: Zone,
    pub issuer_role: IssuerRole,
    pub environment: Environment,
    pub formatting: Formatting,
    pub clock: Arc<dyn Clock>,
}

impl ClientConfig {
    /// Sandbox environment, supplier-issued, Europe/Madrid, wall clock.
    pub fn new(software: Software, zone: Zone) -> Self {
        Self {
            software,
            zone,
            issuer_role: IssuerRole::Supplier,
            environment: Environment::Sandbox,
            formatting: Formatting::default(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_issuer_role(mut self, role: IssuerRole) -> Self {
        self.issuer_role = role;
        self
    }

    pub fn with_environment(mut self, env: Environment) -> Self {
        self.environment = env;
        self
    }

    pub fn with_formatting(mut self, formatting: Formatting) -> Self {
        self.formatting = formatting;
        self
    }

    pub fn with_timezone(mut self, tz: Tz) -> Self {
        self.formatting.timezone = tz;
        self
    }

    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.formatting.locale = locale;
        self
    }

    /// Override the time source, e.g. with a [`FixedClock`](crate::core::FixedClock).
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn validate(&self) -> Result<(), TbaiError> {
        let errors = self.software.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.into())
        }
    }
}

/// Orchestrates the TicketBAI pipeline for one zone.
pub struct Client {
    config: ClientConfig,
    signer: Arc<dyn Signer>,
    gateway: Arc<dyn Connection>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client").field("config", &self.config).finish_non_exhaustive()
    }
}

impl Client {
    /// Client using the connection registered for the configured zone.
    pub fn new(
        config: ClientConfig,
        signer: impl Signer + 'static,
        gateways: &Gateways,
    ) -> Result<Self, TbaiError> {
        config.validate()?;
        let gateway = gateways.get(config.zone).ok_or_else(|| {
            TbaiError::Internal(format!("no gateway registered for zone {}", config.zone))
        })?;
        Ok(Self {
            config,
            signer: Arc::new(signer),
            gateway,
        })
    }

    /// Client talking to the real gateways of the configured environment.
    pub fn connect(
        config: ClientConfig,
        signer: impl Signer + 'static,
        options: GatewayOptions,
    ) -> Result<Self, TbaiError> {
        let options = options.with_locale(config.formatting.locale);
        let gateways = Gateways::new(config.environment, options)?;
        Self::new(config, signer, &gateways)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn current_time(&self) -> DateTime<Utc> {
        self.config.clock.now()
    }

    /// Assemble the document for an invoice, issued now.
    pub fn convert(&self, invoice: &Invoice) -> Result<TicketBai, TbaiError> {
        TicketBai::new(
            invoice,
            self.current_time(),
            self.config.issuer_role,
            self.config.zone,
            &self.config.formatting,
        )
    }

    /// `previous` is the chain data of the last document accepted for this
    /// taxpayer and zone, `None` for the first one.
    pub fn fingerprint(&self, doc: &mut TicketBai, previous: Option<&ChainData>) {
        doc.fingerprint(&self.config.software, previous);
    }

    /// Sign the document and derive its codes.
    pub fn sign(&self, doc: &mut TicketBai, doc_id: &str) -> Result<Codes, TbaiError> {
        doc.sign(
            self.signer.as_ref(),
            doc_id,
            self.config.issuer_role,
            self.config.zone,
            self.config.clock.as_ref(),
        )?;
        doc.codes(self.config.zone)
            .ok_or_else(|| TbaiError::Internal("signed document has no signature".into()))
    }

    /// Submit a signed document.
    ///
    /// When the gateway reports a duplicate, the stored document is fetched
    /// back. If its signature matches this one the call succeeds; otherwise
    /// [`TbaiError::AlreadyProcessed`] is returned.
    pub async fn post(&self, doc: &TicketBai) -> Result<(), TbaiError> {
        match self.gateway.post(doc).await {
            Ok(()) => {
                info!(zone = %self.config.zone, code = %doc.invoice.header.code, "document submitted");
                Ok(())
            }
            Err(GatewayError::Duplicate { code, .. }) => {
                info!(zone = %self.config.zone, code = ?code, "duplicate reported, checking stored document");
                self.recover_duplicate(doc).await
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn recover_duplicate(&self, doc: &TicketBai) -> Result<(), TbaiError> {
        let issuer = doc.issuer();
        let query = FetchQuery {
            nif: issuer.nif.clone(),
            name: issuer.name.clone(),
            year: doc.issue_year()?,
            page: 1,
            head: Some(HeadFilter::for_document(doc)),
        };

        let stored = match self.gateway.fetch(&query).await {
            Ok(docs) => docs,
            Err(e) => {
                warn!(zone = %self.config.zone, error = %e, "cannot fetch stored document");
                return Err(TbaiError::AlreadyProcessed);
            }
        };

        let ours = truncate(doc.signature_value(), CHAIN_SIGNATURE_LEN);
        let header = &doc.invoice.header;
        let matches = !ours.is_empty()
            && stored.iter().any(|d| {
                d.series == header.series
                    && d.code == header.code
                    && truncate(&d.signature, CHAIN_SIGNATURE_LEN) == ours
            });

        if matches {
            info!(zone = %self.config.zone, code = %header.code, "stored document matches, duplicate ignored");
            Ok(())
        } else {
            warn!(zone = %self.config.zone, code = %header.code, "stored document differs");
            Err(TbaiError::AlreadyProcessed)
        }
    }

    /// Documents previously submitted by a taxpayer.
    pub async fn fetch(
        &self,
        nif: &str,
        name: &str,
        year: i32,
        page: u32,
        head: Option<HeadFilter>,
    ) -> Result<Vec<IssuedDocument>, TbaiError> {
        let query = FetchQuery {
            nif: nif.to_string(),
            name: name.to_string(),
            year,
            page,
            head,
        };
        Ok(self.gateway.fetch(&query).await?)
    }

    pub fn generate_cancel(&self, doc: &TicketBai) -> CancelTicketBai {
        CancelTicketBai::for_document(doc)
    }

    /// Cancellation from the original invoice and the TBAI code printed on it.
    pub fn generate_cancel_for_invoice(
        &self,
        invoice: &Invoice,
        tbai_code: &str,
    ) -> Result<CancelTicketBai, TbaiError> {
        CancelTicketBai::for_invoice(invoice, tbai_code)
    }

    pub fn fingerprint_cancel(&self, cancel: &mut CancelTicketBai) {
        cancel.fingerprint(&self.config.software);
    }

    pub fn sign_cancel(&self, cancel: &mut CancelTicketBai, doc_id: &str) -> Result<(), TbaiError> {
        cancel.sign(
            self.signer.as_ref(),
            doc_id,
            self.config.issuer_role,
            self.config.zone,
            self.config.clock.as_ref(),
        )
    }

    pub async fn cancel(&self, cancel: &CancelTicketBai) -> Result<(), TbaiError> {
        self.gateway.cancel(cancel).await?;
        info!(zone = %self.config.zone, code = %cancel.invoice.code, "document cancelled");
        Ok(())
    }
}
