use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An invoice as supplied by the invoicing system, before conversion into a
/// TicketBAI document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    /// Invoice series (optional prefix of the numbering sequence).
    pub series: Option<String>,
    /// Invoice code (number within the series).
    pub code: String,
    /// Issue date as stated on the invoice.
    pub issue_date: NaiveDate,
    /// Date the operation took place, if different from the issue date.
    pub operation_date: Option<NaiveDate>,
    pub invoice_type: InvoiceType,
    /// ISO 4217 currency code.
    pub currency: String,
    pub supplier: Party,
    /// Absent for B2C tickets.
    pub customer: Option<Party>,
    pub lines: Vec<Line>,
    /// Document-level discounts.
    pub discounts: Vec<AllowanceCharge>,
    /// Document-level charges.
    pub charges: Vec<AllowanceCharge>,
    pub tags: Vec<Tag>,
    /// Invoices corrected by this one (credit and debit notes).
    pub preceding: Vec<DocumentRef>,
    pub notes: Vec<Note>,
    /// Calculated totals (set by `calculate_totals()`).
    pub totals: Option<Totals>,
}

impl Invoice {
    pub fn has_tag(&self, tag: Tag) -> bool {
        self.tags.contains(&tag)
    }

    /// Tax country of the customer, if there is one.
    pub fn customer_country(&self) -> Option<&str> {
        self.customer
            .as_ref()
            .and_then(|c| c.tax_id.as_ref())
            .map(|t| t.country.as_str())
    }

    /// True when there is a customer whose tax country is not Spain.
    pub fn has_foreign_customer(&self) -> bool {
        self.customer
            .as_ref()
            .is_some_and(|_| self.customer_country() != Some("ES"))
    }

    /// Text of the first note with the general key.
    pub fn general_note(&self) -> Option<&str> {
        self.notes
            .iter()
            .find(|n| n.key == NoteKey::General)
            .map(|n| n.text.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceType {
    Standard,
    /// Amounts are stated positive and inverted on conversion.
    CreditNote,
    DebitNote,
    /// Explicit correction. Not accepted: corrections must arrive as
    /// credit or debit notes.
    Corrective,
}

impl InvoiceType {
    pub fn is_rectification(&self) -> bool {
        matches!(self, Self::CreditNote | Self::DebitNote)
    }
}

/// Invoice-level tags that change how taxes are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tag {
    /// Supplier operates under the simplified VAT scheme.
    SimplifiedScheme,
    /// VAT is paid by the customer (inversión del sujeto pasivo).
    ReverseCharge,
    /// Taxes follow the customer's rates (e.g. distance sales), so nothing
    /// is subject to Spanish VAT.
    CustomerRates,
    /// Simplified invoice (ticket).
    SimplifiedInvoice,
}

/// Supplier or customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Party {
    /// Legal name, or surname and name for individuals.
    pub name: String,
    pub tax_id: Option<TaxIdentity>,
    pub addresses: Vec<Address>,
    /// Alternative identities used when there is no tax code.
    pub identities: Vec<Identity>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxIdentity {
    /// ISO 3166-1 alpha-2 tax country.
    pub country: String,
    /// Tax code without the country prefix (NIF for Spain). May be empty.
    pub code: String,
    /// Regional zone code, e.g. "BI".
    pub zone: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Address {
    pub po_box: Option<String>,
    pub street: Option<String>,
    pub number: Option<String>,
    pub block: Option<String>,
    pub floor: Option<String>,
    pub door: Option<String>,
    pub street_extra: Option<String>,
    pub locality: Option<String>,
    pub region: Option<String>,
    /// Postal code.
    pub code: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub kind: IdentityKind,
    pub code: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdentityKind {
    Passport,
    /// Official identity document issued by the country of residence.
    Foreign,
    /// Residence certificate.
    Resident,
    Other,
}

/// Invoice line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Line {
    pub quantity: Decimal,
    pub item: Item,
    pub discounts: Vec<AllowanceCharge>,
    pub charges: Vec<AllowanceCharge>,
    pub taxes: Vec<TaxCombo>,
    /// quantity * price. Set by `calculate_totals()`.
    pub sum: Option<Decimal>,
    /// sum - discounts + charges. Set by `calculate_totals()`.
    pub total: Option<Decimal>,
}

impl Line {
    pub fn vat(&self) -> Option<&TaxCombo> {
        self.taxes.iter().find(|t| t.category == TaxCategory::Vat)
    }

    pub fn discount_total(&self) -> Decimal {
        self.discounts.iter().map(|d| d.amount).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    /// Unit price without taxes.
    pub price: Decimal,
    pub kind: ProductKind,
    /// Goods bought for resale under the equivalence surcharge scheme.
    pub resale: bool,
}

/// Item classification used to split foreign-customer breakdowns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProductKind {
    #[default]
    Services,
    Goods,
}

/// A discount or a charge, at line or document level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllowanceCharge {
    /// True = charge, false = discount.
    pub is_charge: bool,
    pub amount: Decimal,
    pub percent: Option<Decimal>,
    pub reason: Option<String>,
    /// Taxes applied to a document-level discount or charge. Empty at line level.
    pub taxes: Vec<TaxCombo>,
}

/// One tax applied to a line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxCombo {
    pub category: TaxCategory,
    /// Rate percentage. None for exempt or not-subject operations.
    pub percent: Option<Decimal>,
    /// Equivalence surcharge percentage.
    pub surcharge: Option<Decimal>,
    /// TicketBAI exemption or not-subject cause (E1..E6, OT, RL).
    pub exemption: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaxCategory {
    /// IVA.
    Vat,
    /// IRPF withholding. Retained from the payable amount.
    Irpf,
    /// Any other non-retained tax.
    Other,
}

impl TaxCategory {
    pub fn is_retained(&self) -> bool {
        matches!(self, Self::Irpf)
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Vat => "VAT",
            Self::Irpf => "IRPF",
            Self::Other => "OTHER",
        }
    }
}

/// Reference to a previously issued invoice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRef {
    pub series: Option<String>,
    pub code: String,
    pub issue_date: NaiveDate,
    /// Rectification reason code (R1..R5). Defaults to R1.
    pub correction_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub key: NoteKey,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteKey {
    /// Free-text description of the invoice as a whole.
    General,
    Legal,
    Other,
}

/// Document totals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Totals {
    /// Sum of all line totals.
    pub sum: Decimal,
    pub discounts_total: Decimal,
    pub charges_total: Decimal,
    /// sum - discounts + charges.
    pub total: Decimal,
    pub taxes: Vec<CategoryTotal>,
    /// Sum of non-retained tax amounts, equivalence surcharge included.
    pub tax: Decimal,
    /// Sum of retained (withheld) tax amounts.
    pub retained: Decimal,
    /// total + tax.
    pub total_with_tax: Decimal,
    /// total_with_tax - retained.
    pub payable: Decimal,
}

/// Tax totals for one category/rate pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category: TaxCategory,
    pub percent: Option<Decimal>,
    pub surcharge_percent: Option<Decimal>,
    pub retained: bool,
    pub base: Decimal,
    pub amount: Decimal,
    /// Equivalence surcharge amount, VAT only.
    pub surcharge: Decimal,
}
