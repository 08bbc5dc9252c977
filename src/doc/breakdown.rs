//! Tax breakdown (`TipoDesglose`): maps invoice tax lines onto the
//! regulator's subject / exempt / not-subject taxonomy.
//!
//! The tree has two shapes. When there is no customer, or the customer is
//! Spanish, everything goes into a single `DesgloseFactura` branch. For
//! foreign customers the lines are split by product kind into services
//! (`PrestacionServicios`) and goods (`Entrega`), each an independent
//! branch of the same shape.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::xml_utils::{XmlWriter, format_amount, format_percent};
use crate::core::{Invoice, ProductKind, Tag, TaxCategory, TaxCombo, TbaiError, round_half_up};

/// Exemption codes that mean "not subject to VAT" rather than "exempt".
pub const NOT_SUBJECT_CAUSES: [&str; 2] = ["OT", "RL"];

/// Cause used when the customer's rates apply (localization rules).
pub const CUSTOMER_RATES_CAUSE: &str = "RL";

const DEFAULT_NOT_SUBJECT_CAUSE: &str = "OT";

/// Root of the breakdown tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Breakdown {
    /// `DesgloseFactura`: customer absent or Spanish.
    Invoice(Branch),
    /// `DesgloseTipoOperacion`: foreign customer, split by product kind.
    ByOperation {
        services: Option<Branch>,
        goods: Option<Branch>,
    },
}

/// One breakdown branch (`DesgloseFactura` shape).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Branch {
    /// `Sujeta`, present when anything is subject to VAT.
    pub subject: Option<Subject>,
    /// `NoSujeta/DetalleNoSujeta`, one row per cause.
    pub not_subject: Vec<NotSubjectDetail>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Subject {
    /// `Exenta/DetalleExenta`, one row per source line.
    pub exempt: Vec<ExemptDetail>,
    /// `NoExenta/DetalleNoExenta`.
    pub non_exempt: Option<NonExempt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotSubjectDetail {
    pub cause: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExemptDetail {
    pub cause: String,
    pub base: Decimal,
}

/// Non-exempt bucket, labelled S1 (regular) or S2 (reverse charge).
#[derive(Debug, Clone, PartialEq)]
pub struct NonExempt {
    pub kind: NonExemptKind,
    pub rows: Vec<VatDetail>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonExemptKind {
    S1,
    S2,
}

impl NonExemptKind {
    pub fn code(&self) -> &'static str {
        match self {
            Self::S1 => "S1",
            Self::S2 => "S2",
        }
    }
}

/// `DetalleIVA` row. Rows sharing (percent, surcharge, resale) are merged.
#[derive(Debug, Clone, PartialEq)]
pub struct VatDetail {
    pub base: Decimal,
    pub percent: Decimal,
    pub surcharge_percent: Option<Decimal>,
    /// Row comes from resale lines.
    pub resale: bool,
    /// `OperacionEnRecargoDeEquivalenciaORegimenSimplificado` = "S".
    pub simplified_or_surcharge: bool,
}

impl VatDetail {
    pub fn amount(&self) -> Decimal {
        round_half_up(self.base * self.percent / dec!(100), 2)
    }

    pub fn surcharge_amount(&self) -> Option<Decimal> {
        self.surcharge_percent
            .map(|s| round_half_up(self.base * s / dec!(100), 2))
    }
}

/// Invoice tags that influence the breakdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaxTags {
    pub simplified_regime: bool,
    pub reverse_charge: bool,
    pub customer_rates: bool,
}

impl TaxTags {
    pub fn from_invoice(invoice: &Invoice) -> Self {
        Self {
            simplified_regime: invoice.has_tag(Tag::SimplifiedScheme),
            reverse_charge: invoice.has_tag(Tag::ReverseCharge),
            customer_rates: invoice.has_tag(Tag::CustomerRates),
        }
    }
}

/// One taxable amount with its resolved VAT combo.
#[derive(Debug, Clone)]
pub struct TaxableEntry<'a> {
    pub base: Decimal,
    pub vat: &'a TaxCombo,
    pub kind: ProductKind,
    pub resale: bool,
}

enum Class<'a> {
    NotSubject(&'a str),
    Exempt(&'a str),
    NonExempt(Decimal),
}

fn classify<'a>(tags: TaxTags, combo: &'a TaxCombo) -> Class<'a> {
    if tags.customer_rates {
        return Class::NotSubject(CUSTOMER_RATES_CAUSE);
    }
    match (combo.percent, combo.exemption.as_deref()) {
        (Some(percent), _) => Class::NonExempt(percent),
        (None, None) => Class::NotSubject(DEFAULT_NOT_SUBJECT_CAUSE),
        (None, Some(cause)) if NOT_SUBJECT_CAUSES.contains(&cause) => Class::NotSubject(cause),
        (None, Some(cause)) => Class::Exempt(cause),
    }
}

impl Breakdown {
    /// Build the breakdown for an invoice whose totals have been calculated.
    ///
    /// Every line must carry a VAT combo. Document-level discounts with VAT
    /// are folded in as negative services amounts.
    pub fn from_invoice(invoice: &Invoice) -> Result<Self, TbaiError> {
        let mut entries = Vec::with_capacity(invoice.lines.len());
        for (i, line) in invoice.lines.iter().enumerate() {
            let vat = line.vat().ok_or_else(|| {
                TbaiError::validation(format!("lines[{i}]: missing VAT tax combo"))
            })?;
            entries.push(TaxableEntry {
                base: line.total.unwrap_or(line.quantity * line.item.price),
                vat,
                kind: line.item.kind,
                resale: line.item.resale,
            });
        }
        for discount in &invoice.discounts {
            if let Some(vat) = discount
                .taxes
                .iter()
                .find(|t| t.category == TaxCategory::Vat)
            {
                entries.push(TaxableEntry {
                    base: -discount.amount,
                    vat,
                    kind: ProductKind::Services,
                    resale: false,
                });
            }
        }

        Ok(Self::build(
            &entries,
            TaxTags::from_invoice(invoice),
            invoice.has_foreign_customer(),
        ))
    }

    /// Build from resolved entries. `split` selects the by-operation shape.
    pub fn build(entries: &[TaxableEntry<'_>], tags: TaxTags, split: bool) -> Self {
        if !split {
            return Breakdown::Invoice(Branch::build(entries.iter(), tags));
        }

        let branch_for = |kind: ProductKind| {
            let mut it = entries.iter().filter(|e| e.kind == kind).peekable();
            it.peek()?;
            Some(Branch::build(it, tags)).filter(|b| !b.is_empty())
        };

        Breakdown::ByOperation {
            services: branch_for(ProductKind::Services),
            goods: branch_for(ProductKind::Goods),
        }
    }

    pub(crate) fn write(&self, w: &mut XmlWriter) -> Result<(), TbaiError> {
        w.start_element("TipoDesglose")?;
        match self {
            Breakdown::Invoice(branch) => branch.write(w, "DesgloseFactura")?,
            Breakdown::ByOperation { services, goods } => {
                w.start_element("DesgloseTipoOperacion")?;
                if let Some(b) = services {
                    b.write(w, "PrestacionServicios")?;
                }
                if let Some(b) = goods {
                    b.write(w, "Entrega")?;
                }
                w.end_element("DesgloseTipoOperacion")?;
            }
        }
        w.end_element("TipoDesglose")?;
        Ok(())
    }
}

impl Branch {
    fn build<'a, 'b: 'a>(entries: impl Iterator<Item = &'a TaxableEntry<'b>>, tags: TaxTags) -> Self {
        let mut branch = Branch::default();
        let mut subject = Subject::default();
        let kind = if tags.reverse_charge {
            NonExemptKind::S2
        } else {
            NonExemptKind::S1
        };

        for entry in entries {
            match classify(tags, entry.vat) {
                Class::NotSubject(cause) => {
                    match branch.not_subject.iter_mut().find(|d| d.cause == cause) {
                        Some(existing) => existing.amount += entry.base,
                        None => branch.not_subject.push(NotSubjectDetail {
                            cause: cause.to_string(),
                            amount: entry.base,
                        }),
                    }
                }
                Class::Exempt(cause) => subject.exempt.push(ExemptDetail {
                    cause: cause.to_string(),
                    base: entry.base,
                }),
                Class::NonExempt(percent) => {
                    let rows = &mut subject
                        .non_exempt
                        .get_or_insert_with(|| NonExempt {
                            kind,
                            rows: Vec::new(),
                        })
                        .rows;
                    let surcharge = entry.vat.surcharge;
                    match rows.iter_mut().find(|r| {
                        r.percent == percent
                            && r.surcharge_percent == surcharge
                            && r.resale == entry.resale
                    }) {
                        Some(existing) => existing.base += entry.base,
                        None => rows.push(VatDetail {
                            base: entry.base,
                            percent,
                            surcharge_percent: surcharge,
                            resale: entry.resale,
                            simplified_or_surcharge: tags.simplified_regime || entry.resale,
                        }),
                    }
                }
            }
        }

        if !subject.exempt.is_empty() || subject.non_exempt.is_some() {
            branch.subject = Some(subject);
        }
        branch
    }

    pub fn is_empty(&self) -> bool {
        self.subject.is_none() && self.not_subject.is_empty()
    }

    /// Sum of every base amount in the branch.
    pub fn total_base(&self) -> Decimal {
        let not_subject: Decimal = self.not_subject.iter().map(|d| d.amount).sum();
        let subject: Decimal = self.subject.as_ref().map_or(Decimal::ZERO, |s| {
            let exempt: Decimal = s.exempt.iter().map(|d| d.base).sum();
            let non_exempt: Decimal = s
                .non_exempt
                .as_ref()
                .map_or(Decimal::ZERO, |ne| ne.rows.iter().map(|r| r.base).sum());
            exempt + non_exempt
        });
        not_subject + subject
    }

    fn write(&self, w: &mut XmlWriter, name: &str) -> Result<(), TbaiError> {
        w.start_element(name)?;

        if let Some(subject) = &self.subject {
            w.start_element("Sujeta")?;
            if !subject.exempt.is_empty() {
                w.start_element("Exenta")?;
                for d in &subject.exempt {
                    w.start_element("DetalleExenta")?;
                    w.text_element("CausaExencion", &d.cause)?;
                    w.text_element("BaseImponible", &format_amount(d.base))?;
                    w.end_element("DetalleExenta")?;
                }
                w.end_element("Exenta")?;
            }
            if let Some(ne) = &subject.non_exempt {
                w.start_element("NoExenta")?;
                w.start_element("DetalleNoExenta")?;
                w.text_element("TipoNoExenta", ne.kind.code())?;
                w.start_element("DesgloseIVA")?;
                for row in &ne.rows {
                    write_vat_row(w, row)?;
                }
                w.end_element("DesgloseIVA")?;
                w.end_element("DetalleNoExenta")?;
                w.end_element("NoExenta")?;
            }
            w.end_element("Sujeta")?;
        }

        if !self.not_subject.is_empty() {
            w.start_element("NoSujeta")?;
            for d in &self.not_subject {
                w.start_element("DetalleNoSujeta")?;
                w.text_element("Causa", &d.cause)?;
                w.text_element("Importe", &format_amount(d.amount))?;
                w.end_element("DetalleNoSujeta")?;
            }
            w.end_element("NoSujeta")?;
        }

        w.end_element(name)?;
        Ok(())
    }
}

fn write_vat_row(w: &mut XmlWriter, row: &VatDetail) -> Result<(), TbaiError> {
    w.start_element("DetalleIVA")?;
    w.text_element("BaseImponible", &format_amount(row.base))?;
    w.text_element("TipoImpositivo", &format_percent(row.percent))?;
    w.text_element("CuotaImpuesto", &format_amount(row.amount()))?;
    if let (Some(percent), Some(amount)) = (row.surcharge_percent, row.surcharge_amount()) {
        w.text_element("TipoRecargoEquivalencia", &format_percent(percent))?;
        w.text_element("CuotaRecargoEquivalencia", &format_amount(amount))?;
    }
    if row.simplified_or_surcharge {
        w.text_element("OperacionEnRecargoDeEquivalenciaORegimenSimplificado", "S")?;
    }
    w.end_element("DetalleIVA")?;
    Ok(())
}
