use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use super::Formatting;
use super::breakdown::Breakdown;
use super::xml_utils::{XmlWriter, format_amount};
use crate::core::{Invoice, Tag, TbaiError, line_tax};

/// Date format used throughout the documents.
pub const DATE_FORMAT: &str = "%d-%m-%Y";
const TIME_FORMAT: &str = "%H:%M:%S";

/// Default rectification reason: error founded in law.
const DEFAULT_CORRECTION_CODE: &str = "R1";
/// Rectification by differences.
const CORRECTION_TYPE_DIFFERENCES: &str = "I";

/// `Factura`
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceBody {
    pub header: InvoiceHeader,
    pub data: InvoiceData,
    pub breakdown: Breakdown,
}

/// `CabeceraFactura`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceHeader {
    pub series: String,
    pub code: String,
    /// `dd-mm-yyyy` in the configured time zone.
    pub issue_date: String,
    /// `HH:MM:SS` in the configured time zone.
    pub issue_time: String,
    pub simplified: bool,
    pub rectification: Option<Rectification>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rectification {
    pub code: String,
    pub kind: &'static str,
    pub corrected: Vec<CorrectedInvoice>,
}

/// `IDFacturaRectificadaSustituida`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrectedInvoice {
    pub series: String,
    pub code: String,
    pub issue_date: String,
}

/// `DatosFactura`
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceData {
    pub operation_date: String,
    pub description: String,
    pub details: Vec<DetailLine>,
    /// Net total plus non-retained taxes.
    pub total: Decimal,
    pub retained: Decimal,
    /// `ClaveRegimenIvaOpTrascendencia` values, one to three.
    pub regime_keys: Vec<&'static str>,
}

/// `IDDetalleFactura`
#[derive(Debug, Clone, PartialEq)]
pub struct DetailLine {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub discount: Decimal,
    /// Line total with non-retained taxes.
    pub total: Decimal,
}

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

impl InvoiceBody {
    /// Expects an invoice with totals calculated (and already inverted for
    /// credit notes).
    pub fn new(
        invoice: &Invoice,
        ts: DateTime<Utc>,
        formatting: &Formatting,
    ) -> Result<Self, TbaiError> {
        Ok(Self {
            header: InvoiceHeader::new(invoice, ts, formatting),
            data: InvoiceData::new(invoice)?,
            breakdown: Breakdown::from_invoice(invoice)?,
        })
    }

    pub(crate) fn write(&self, w: &mut XmlWriter) -> Result<(), TbaiError> {
        w.start_element("Factura")?;
        self.header.write(w)?;
        self.data.write(w)?;
        self.breakdown.write(w)?;
        w.end_element("Factura")?;
        Ok(())
    }
}

impl InvoiceHeader {
    fn new(invoice: &Invoice, ts: DateTime<Utc>, formatting: &Formatting) -> Self {
        let local = ts.with_timezone(&formatting.timezone);

        let rectification = invoice.invoice_type.is_rectification().then(|| Rectification {
            code: invoice
                .preceding
                .first()
                .and_then(|p| p.correction_code.clone())
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| DEFAULT_CORRECTION_CODE.to_string()),
            kind: CORRECTION_TYPE_DIFFERENCES,
            corrected: invoice
                .preceding
                .iter()
                .map(|p| CorrectedInvoice {
                    series: p.series.clone().unwrap_or_default(),
                    code: p.code.clone(),
                    issue_date: format_date(p.issue_date),
                })
                .collect(),
        });

        Self {
            series: invoice.series.clone().unwrap_or_default(),
            code: invoice.code.clone(),
            issue_date: local.format(DATE_FORMAT).to_string(),
            issue_time: local.format(TIME_FORMAT).to_string(),
            simplified: invoice.has_tag(Tag::SimplifiedInvoice),
            rectification,
        }
    }

    fn write(&self, w: &mut XmlWriter) -> Result<(), TbaiError> {
        w.start_element("CabeceraFactura")?;
        w.text_element_opt("SerieFactura", &self.series)?;
        w.text_element("NumFactura", &self.code)?;
        w.text_element("FechaExpedicionFactura", &self.issue_date)?;
        w.text_element("HoraExpedicionFactura", &self.issue_time)?;
        w.text_element("FacturaSimplificada", if self.simplified { "S" } else { "N" })?;
        if let Some(r) = &self.rectification {
            w.start_element("FacturaRectificativa")?;
            w.text_element("Codigo", &r.code)?;
            w.text_element("Tipo", r.kind)?;
            w.end_element("FacturaRectificativa")?;
            if !r.corrected.is_empty() {
                w.start_element("FacturasRectificadasSustituidas")?;
                for c in &r.corrected {
                    w.start_element("IDFacturaRectificadaSustituida")?;
                    w.text_element_opt("SerieFactura", &c.series)?;
                    w.text_element("NumFactura", &c.code)?;
                    w.text_element("FechaExpedicionFactura", &c.issue_date)?;
                    w.end_element("IDFacturaRectificadaSustituida")?;
                }
                w.end_element("FacturasRectificadasSustituidas")?;
            }
        }
        w.end_element("CabeceraFactura")?;
        Ok(())
    }
}

impl InvoiceData {
    fn new(invoice: &Invoice) -> Result<Self, TbaiError> {
        let description = invoice
            .general_note()
            .ok_or_else(|| TbaiError::validation("missing general description of invoice"))?
            .to_string();
        let totals = invoice
            .totals
            .as_ref()
            .ok_or_else(|| TbaiError::Internal("invoice totals not calculated".into()))?;

        let details = invoice
            .lines
            .iter()
            .map(|line| DetailLine {
                description: line.item.name.clone(),
                quantity: line.quantity,
                unit_price: line.item.price,
                discount: line.discount_total(),
                total: line.total.unwrap_or(Decimal::ZERO) + line_tax(line),
            })
            .collect();

        Ok(Self {
            operation_date: format_date(invoice.operation_date.unwrap_or(invoice.issue_date)),
            description,
            details,
            total: totals.total_with_tax,
            retained: totals.retained,
            regime_keys: regime_keys(invoice),
        })
    }

    fn write(&self, w: &mut XmlWriter) -> Result<(), TbaiError> {
        w.start_element("DatosFactura")?;
        w.text_element("FechaOperacion", &self.operation_date)?;
        w.text_element("DescripcionFactura", &self.description)?;
        w.start_element("DetallesFactura")?;
        for d in &self.details {
            w.start_element("IDDetalleFactura")?;
            w.text_element("DescripcionDetalle", &d.description)?;
            w.text_element("Cantidad", &d.quantity.normalize().to_string())?;
            w.text_element("ImporteUnitario", &format_amount(d.unit_price))?;
            w.text_element("Descuento", &format_amount(d.discount))?;
            w.text_element("ImporteTotal", &format_amount(d.total))?;
            w.end_element("IDDetalleFactura")?;
        }
        w.end_element("DetallesFactura")?;
        w.text_element("ImporteTotalFactura", &format_amount(self.total))?;
        w.text_element("RetencionSoportada", &format_amount(self.retained))?;
        w.start_element("Claves")?;
        for key in &self.regime_keys {
            w.start_element("IDClave")?;
            w.text_element("ClaveRegimenIvaOpTrascendencia", key)?;
            w.end_element("IDClave")?;
        }
        w.end_element("Claves")?;
        w.end_element("DatosFactura")?;
        Ok(())
    }
}

/// Regime keys: `02` foreign customer, `51` resale lines, `52` simplified
/// scheme. `01` only when none of those apply.
pub fn regime_keys(invoice: &Invoice) -> Vec<&'static str> {
    let mut keys = Vec::with_capacity(3);
    if invoice.has_foreign_customer() {
        keys.push("02");
    }
    if invoice.lines.iter().any(|l| l.item.resale) {
        keys.push("51");
    }
    if invoice.has_tag(Tag::SimplifiedScheme) {
        keys.push("52");
    }
    if keys.is_empty() {
        keys.push("01");
    }
    keys
}
