use chrono::NaiveDate;

use super::fingerprint::{Fingerprint, Software};
use super::invoice::format_date;
use super::parties::{Issuer, IssuerRole};
use super::signature::{SignatureEnvelope, Signer};
use super::xml_utils::{Layout, XmlWriter};
use super::{NAMESPACE_CANCEL, TICKETBAI_VERSION, TicketBai, sign_document, write_version, year_of};
use crate::core::{Clock, Invoice, TbaiError, Zone, supplier_zone};

/// Identifies the document being cancelled (`IDFactura`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelledInvoice {
    pub issuer: Issuer,
    pub series: String,
    pub code: String,
    /// `dd-mm-yyyy`, exactly as in the original document.
    pub issue_date: String,
}

/// Cancellation document (`T:AnulaTicketBai`).
#[derive(Debug, Clone, PartialEq)]
pub struct CancelTicketBai {
    pub version: &'static str,
    pub invoice: CancelledInvoice,
    pub fingerprint: Option<Fingerprint>,
    pub signature: Option<SignatureEnvelope>,
}

impl CancelTicketBai {
    /// Cancellation for a document issued earlier. Identifiers are copied
    /// verbatim.
    pub fn for_document(doc: &TicketBai) -> Self {
        let header = &doc.invoice.header;
        Self::new(CancelledInvoice {
            issuer: doc.subjects.issuer.clone(),
            series: header.series.clone(),
            code: header.code.clone(),
            issue_date: header.issue_date.clone(),
        })
    }

    /// Cancellation when only the invoice and its stamped TBAI code are at
    /// hand. The issue date is recovered from the code's date segment.
    pub fn for_invoice(invoice: &Invoice, tbai_code: &str) -> Result<Self, TbaiError> {
        let issuer = Issuer::from_party(&invoice.supplier);
        let (nif, date) = parse_tbai_code(tbai_code)?;
        if nif != issuer.nif {
            return Err(TbaiError::validation(format!(
                "TBAI code issuer {nif} does not match supplier {}",
                issuer.nif
            )));
        }
        if supplier_zone(invoice).is_none() {
            return Err(TbaiError::validation(
                "supplier tax identity locality not supported by TicketBAI",
            ));
        }

        Ok(Self::new(CancelledInvoice {
            issuer,
            series: invoice.series.clone().unwrap_or_default(),
            code: invoice.code.clone(),
            issue_date: format_date(date),
        }))
    }

    fn new(invoice: CancelledInvoice) -> Self {
        Self {
            version: TICKETBAI_VERSION,
            invoice,
            fingerprint: None,
            signature: None,
        }
    }

    /// Cancellations are never chained, only the software is recorded.
    pub fn fingerprint(&mut self, software: &Software) {
        self.fingerprint = Some(Fingerprint::software_only(software));
    }

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
            NAMESPACE_CANCEL,
            clock,
        )?);
        Ok(())
    }

    pub fn signature_value(&self) -> &str {
        self.signature.as_ref().map_or("", |s| s.value.as_str())
    }

    pub fn issue_year(&self) -> Result<i32, TbaiError> {
        year_of(&self.invoice.issue_date)
    }

    pub fn bytes(&self) -> Result<Vec<u8>, TbaiError> {
        self.render(Layout::Compact)
    }

    pub fn bytes_indent(&self) -> Result<Vec<u8>, TbaiError> {
        self.render(Layout::Indented)
    }

    pub fn canonical(&self) -> Result<Vec<u8>, TbaiError> {
        self.render(Layout::Canonical)
    }

    fn render(&self, layout: Layout) -> Result<Vec<u8>, TbaiError> {
        let mut w = XmlWriter::new(layout)?;
        w.start_element_with_attrs("T:AnulaTicketBai", &[("xmlns:T", NAMESPACE_CANCEL)])?;
        write_version(&mut w, self.version)?;

        let inv = &self.invoice;
        w.start_element("IDFactura")?;
        inv.issuer.write(&mut w, "Emisor")?;
        w.start_element("CabeceraFactura")?;
        w.text_element_opt("SerieFactura", &inv.series)?;
        w.text_element("NumFactura", &inv.code)?;
        w.text_element("FechaExpedicionFactura", &inv.issue_date)?;
        w.end_element("CabeceraFactura")?;
        w.end_element("IDFactura")?;

        if let Some(fp) = &self.fingerprint {
            fp.write(&mut w)?;
        }
        if let Some(sig) = &self.signature {
            w.raw(&sig.xml)?;
        }
        w.end_element("T:AnulaTicketBai")?;
        Ok(w.into_bytes())
    }
}

/// Issuer NIF and issue date of a `TBAI-{nif}-{ddmmyy}-{sig}-{crc}` code.
fn parse_tbai_code(code: &str) -> Result<(&str, NaiveDate), TbaiError> {
    let mut parts = code.split('-');
    let (Some("TBAI"), Some(nif), Some(date)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(TbaiError::validation(format!("malformed TBAI code '{code}'")));
    };
    let date = NaiveDate::parse_from_str(date, "%d%m%y")
        .map_err(|e| TbaiError::validation(format!("invalid date in TBAI code '{code}': {e}")))?;
    Ok((nif, date))
}
