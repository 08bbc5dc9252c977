//! TicketBAI compliance documents.
//!
//! A [`TicketBai`] goes through four steps, always in this order:
//!
//! 1. [`TicketBai::new`] assembles header, subjects, invoice body and tax
//!    breakdown from an [`Invoice`](crate::core::Invoice).
//! 2. [`TicketBai::fingerprint`] attaches the software identity and the link
//!    to the previous document.
//! 3. [`TicketBai::sign`] canonicalizes the document and hands it to a
//!    [`Signer`].
//! 4. [`TicketBai::codes`] derives the TBAI code and the QR verification URL.
//!
//! [`CancelTicketBai`] is the cancellation counterpart.

mod breakdown;
mod cancel;
mod codes;
mod fingerprint;
mod invoice;
mod parties;
mod signature;
pub(crate) mod xml_utils;

pub use breakdown::*;
pub use cancel::*;
pub use codes::*;
pub use fingerprint::*;
pub use invoice::*;
pub use parties::*;
pub use signature::*;
pub use xml_utils::Layout;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::{
    Clock, Invoice, InvoiceType, TbaiError, Zone, calculate_totals, invert, supplier_zone,
    validate_ticketbai,
};
use xml_utils::{XmlWriter, format_amount};

/// `IDVersionTBAI`
pub const TICKETBAI_VERSION: &str = "1.2";
pub const NAMESPACE_ISSUE: &str = "urn:ticketbai:emision";
pub const NAMESPACE_CANCEL: &str = "urn:ticketbai:anulacion";

/// Language for human-readable gateway messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    /// Spanish.
    #[default]
    Es,
    /// Basque.
    Eu,
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Es => "es",
            Self::Eu => "eu",
        })
    }
}

impl FromStr for Locale {
    type Err = TbaiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "es" => Ok(Self::Es),
            "eu" => Ok(Self::Eu),
            other => Err(TbaiError::validation(format!("unknown locale '{other}'"))),
        }
    }
}

/// Time zone and language used when rendering documents and messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Formatting {
    pub timezone: Tz,
    pub locale: Locale,
}

impl Default for Formatting {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::Europe::Madrid,
            locale: Locale::Es,
        }
    }
}

/// A TicketBAI invoice document (`T:TicketBai`).
#[derive(Debug, Clone, PartialEq)]
pub struct TicketBai {
    pub version: &'static str,
    pub subjects: Subjects,
    pub invoice: InvoiceBody,
    pub fingerprint: Option<Fingerprint>,
    pub signature: Option<SignatureEnvelope>,
}

impl TicketBai {
    /// Assemble the document for `invoice`, issued at `ts`.
    ///
    /// The invoice is checked against the TicketBAI preconditions and its
    /// supplier zone must be `zone`. Credit notes are inverted on a copy so
    /// the emitted amounts are negative.
    pub fn new(
        invoice: &Invoice,
        ts: DateTime<Utc>,
        role: IssuerRole,
        zone: Zone,
        formatting: &Formatting,
    ) -> Result<Self, TbaiError> {
        let errors = validate_ticketbai(invoice);
        if !errors.is_empty() {
            return Err(errors.into());
        }

        match supplier_zone(invoice) {
            Some(z) if z == zone => {}
            other => {
                return Err(TbaiError::Validation {
                    code: None,
                    message: format!(
                        "supplier.tax_id.zone: invoice zone {} does not match {zone}",
                        other.map_or("none", |z| z.code())
                    ),
                });
            }
        }

        let mut inv = invoice.clone();
        if inv.invoice_type == InvoiceType::CreditNote {
            invert(&mut inv);
        } else if inv.totals.is_none() {
            calculate_totals(&mut inv);
        }

        Ok(Self {
            version: TICKETBAI_VERSION,
            subjects: Subjects::new(&inv.supplier, inv.customer.as_ref(), role),
            invoice: InvoiceBody::new(&inv, ts, formatting)?,
            fingerprint: None,
            signature: None,
        })
    }

    /// Attach the software identity and, unless this is the first document
    /// of the sequence, the link to the previous one.
    pub fn fingerprint(&mut self, software: &Software, previous: Option<&ChainData>) {
        self.fingerprint = Some(Fingerprint::new(software, previous));
    }

    /// Sign the canonical form of the document. Signing again replaces the
    /// previous signature.
    pub fn sign(
        &mut self,
        signer: &dyn Signer,
        doc_id: &str,
        role: IssuerRole,
        zone: Zone,
        clock: &dyn Clock,
    ) -> Result<(), TbaiError> {
        self.signature = None;
        let data = self.canonical()?;
        self.signature = Some(sign_document(
            signer,
            &data,
            doc_id,
            role,
            zone,
            NAMESPACE_ISSUE,
            clock,
        )?);
        Ok(())
    }

    /// TBAI code and QR URL. `None` until the document is signed.
    pub fn codes(&self, zone: Zone) -> Option<Codes> {
        self.codes_for(zone.code())
    }

    /// Like [`codes`](Self::codes) for a raw zone code. An unknown code gives
    /// an empty QR URL.
    pub fn codes_for(&self, zone_code: &str) -> Option<Codes> {
        let signature = self.signature.as_ref()?;
        let header = &self.invoice.header;
        let tbai_code = tbai_code(&self.subjects.issuer.nif, &header.issue_date, &signature.value);
        let qr_url = qr_url(
            zone_code,
            &tbai_code,
            &header.series,
            &header.code,
            &format_amount(self.invoice.data.total),
        );
        Some(Codes { tbai_code, qr_url })
    }

    /// Final `SignatureValue`, empty before signing.
    pub fn signature_value(&self) -> &str {
        self.signature.as_ref().map_or("", |s| s.value.as_str())
    }

    /// Data the caller persists to chain the next document to this one.
    pub fn chain_data(&self) -> ChainData {
        let header = &self.invoice.header;
        ChainData {
            series: header.series.clone(),
            code: header.code.clone(),
            issue_date: header.issue_date.clone(),
            signature: truncate(self.signature_value(), CHAIN_SIGNATURE_LEN).to_string(),
        }
    }

    pub fn issuer(&self) -> &Issuer {
        &self.subjects.issuer
    }

    /// Fiscal year of the issue date.
    pub fn issue_year(&self) -> Result<i32, TbaiError> {
        year_of(&self.invoice.header.issue_date)
    }

    /// XML with declaration.
    pub fn bytes(&self) -> Result<Vec<u8>, TbaiError> {
        self.render(Layout::Compact)
    }

    /// Indented XML with declaration.
    pub fn bytes_indent(&self) -> Result<Vec<u8>, TbaiError> {
        self.render(Layout::Indented)
    }

    /// Form handed to the signer: no declaration, no whitespace.
    pub fn canonical(&self) -> Result<Vec<u8>, TbaiError> {
        self.render(Layout::Canonical)
    }

    fn render(&self, layout: Layout) -> Result<Vec<u8>, TbaiError> {
        let mut w = XmlWriter::new(layout)?;
        w.start_element_with_attrs("T:TicketBai", &[("xmlns:T", NAMESPACE_ISSUE)])?;
        write_version(&mut w, self.version)?;
        self.subjects.write(&mut w)?;
        self.invoice.write(&mut w)?;
        if let Some(fp) = &self.fingerprint {
            fp.write(&mut w)?;
        }
        if let Some(sig) = &self.signature {
            w.raw(&sig.xml)?;
        }
        w.end_element("T:TicketBai")?;
        Ok(w.into_bytes())
    }
}

fn write_version(w: &mut XmlWriter, version: &str) -> Result<(), TbaiError> {
    w.start_element("Cabecera")?;
    w.text_element("IDVersionTBAI", version)?;
    w.end_element("Cabecera")?;
    Ok(())
}

pub(crate) fn sign_document(
    signer: &dyn Signer,
    data: &[u8],
    doc_id: &str,
    role: IssuerRole,
    zone: Zone,
    namespace: &'static str,
    clock: &dyn Clock,
) -> Result<SignatureEnvelope, TbaiError> {
    let request = SignRequest {
        data,
        doc_id,
        role: role.into(),
        policy: SigningPolicy::for_zone(zone),
        namespace: ("T", namespace),
        clock,
    };
    tracing::debug!(%zone, doc_id, role = request.role.tag(), "signing document");
    signer.sign(&request).map_err(TbaiError::Signing)
}

/// Year of a `dd-mm-yyyy` date.
fn year_of(date: &str) -> Result<i32, TbaiError> {
    date.rsplit('-')
        .next()
        .and_then(|y| y.parse().ok())
        .ok_or_else(|| TbaiError::Internal(format!("malformed issue date '{date}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::*;
    use chrono::{NaiveDate, TimeZone};
    use rust_decimal_macros::dec;

    struct StaticSigner;

    impl Signer for StaticSigner {
        fn sign(&self, req: &SignRequest<'_>) -> Result<SignatureEnvelope, SignerError> {
            let value = format!("SIG{}xyz", req.data.len());
            Ok(SignatureEnvelope {
                id: format!("Signature-{}", req.doc_id),
                xml: format!("<ds:Signature Id=\"Signature-{}\"/>", req.doc_id),
                value,
            })
        }
    }

    fn invoice(zone: &str) -> Invoice {
        InvoiceBuilder::new("SAMPLE-001", NaiveDate::from_ymd_opt(2022, 2, 1).unwrap())
            .series("TEST")
            .supplier(
                PartyBuilder::new("Provide One S.L.")
                    .tax_id("ES", "B98602642", Some(zone))
                    .build(),
            )
            .add_line(
                LineBuilder::new("Development services", dec!(20), dec!(90))
                    .vat(dec!(21))
                    .build(),
            )
            .note(NoteKey::General, "Web shop")
            .build()
            .unwrap()
    }

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 2, 1, 10, 0, 0).unwrap()
    }

    fn doc() -> TicketBai {
        TicketBai::new(
            &invoice("BI"),
            ts(),
            IssuerRole::Supplier,
            Zone::Bizkaia,
            &Formatting::default(),
        )
        .unwrap()
    }

    #[test]
    fn zone_mismatch_rejected() {
        let err = TicketBai::new(
            &invoice("BI"),
            ts(),
            IssuerRole::Supplier,
            Zone::Araba,
            &Formatting::default(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("does not match"));
    }

    #[test]
    fn canonical_structure() {
        let mut d = doc();
        d.fingerprint(&Software::new("LIC", "12345678A", "My Software", "1.0"), None);
        let xml = String::from_utf8(d.canonical().unwrap()).unwrap();
        assert!(xml.starts_with(
            "<T:TicketBai xmlns:T=\"urn:ticketbai:emision\"><Cabecera><IDVersionTBAI>1.2</IDVersionTBAI></Cabecera><Sujetos>"
        ));
        assert!(xml.contains("<HuellaTBAI>"));
        assert!(xml.ends_with("</HuellaTBAI></T:TicketBai>"));
        assert!(!xml.contains('\n'));
    }

    #[test]
    fn bytes_have_declaration() {
        let d = doc();
        let xml = String::from_utf8(d.bytes().unwrap()).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        let indented = String::from_utf8(d.bytes_indent().unwrap()).unwrap();
        assert!(indented.contains("\n  <Cabecera>"));
    }

    #[test]
    fn codes_need_signature() {
        let mut d = doc();
        assert!(d.codes(Zone::Bizkaia).is_none());

        d.sign(&StaticSigner, "doc-1", IssuerRole::Supplier, Zone::Bizkaia, &FixedClock(ts()))
            .unwrap();
        let codes = d.codes(Zone::Bizkaia).unwrap();
        assert!(codes.tbai_code.starts_with("TBAI-B98602642-010222-SIG"));
        assert!(codes.qr_url.contains("&nf=SAMPLE-001&i=2178.00&cr="));
        assert_eq!(d.codes_for("XX").unwrap().qr_url, "");

        let xml = String::from_utf8(d.canonical().unwrap()).unwrap();
        assert!(xml.ends_with("<ds:Signature Id=\"Signature-doc-1\"/></T:TicketBai>"));
    }

    #[test]
    fn resigning_is_deterministic() {
        let mut d = doc();
        let clock = FixedClock(ts());
        d.sign(&StaticSigner, "a", IssuerRole::Supplier, Zone::Bizkaia, &clock).unwrap();
        let first = d.signature_value().to_string();
        d.sign(&StaticSigner, "a", IssuerRole::Supplier, Zone::Bizkaia, &clock).unwrap();
        assert_eq!(first, d.signature_value());
    }

    #[test]
    fn chain_data_from_signed() {
        let mut d = doc();
        d.sign(&StaticSigner, "a", IssuerRole::Supplier, Zone::Bizkaia, &FixedClock(ts()))
            .unwrap();
        let chain = d.chain_data();
        assert_eq!(chain.series, "TEST");
        assert_eq!(chain.code, "SAMPLE-001");
        assert_eq!(chain.issue_date, "01-02-2022");
        assert_eq!(chain.signature, d.signature_value());
        assert_eq!(d.issue_year().unwrap(), 2022);
    }

    #[test]
    fn credit_note_amounts_negative() {
        let inv = InvoiceBuilder::new("R-1", NaiveDate::from_ymd_opt(2022, 2, 1).unwrap())
            .invoice_type(InvoiceType::CreditNote)
            .supplier(
                PartyBuilder::new("Provide One S.L.")
                    .tax_id("ES", "B98602642", Some("BI"))
                    .build(),
            )
            .add_line(LineBuilder::new("Refund", dec!(1), dec!(100)).vat(dec!(21)).build())
            .preceding(None, "SAMPLE-001", NaiveDate::from_ymd_opt(2022, 1, 10).unwrap(), None)
            .note(NoteKey::General, "Refund")
            .build()
            .unwrap();
        let d = TicketBai::new(&inv, ts(), IssuerRole::Supplier, Zone::Bizkaia, &Formatting::default())
            .unwrap();
        assert_eq!(d.invoice.data.total, dec!(-121));
        // the caller's invoice is left untouched
        assert_eq!(inv.lines[0].quantity, dec!(1));
    }

    #[test]
    fn locale_parse() {
        assert_eq!("EU".parse::<Locale>().unwrap(), Locale::Eu);
        assert!("fr".parse::<Locale>().is_err());
    }
}
