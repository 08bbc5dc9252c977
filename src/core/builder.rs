use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::error::TbaiError;
use super::types::*;
use super::validation;

/// Builder for constructing invoices.
///
/// ```
/// use ticketbai::core::*;
/// use rust_decimal_macros::dec;
/// use chrono::NaiveDate;
///
/// let invoice = InvoiceBuilder::new("SAMPLE-001", NaiveDate::from_ymd_opt(2022, 2, 1).unwrap())
///     .series("TEST")
///     .supplier(PartyBuilder::new("Provide One S.L.")
///         .tax_id("ES", "B98602642", Some("BI"))
///         .build())
///     .add_line(LineBuilder::new("Development services", dec!(20), dec!(90))
///         .vat(dec!(21))
///         .build())
///     .note(NoteKey::General, "Development of the web shop")
///     .build()
///     .unwrap();
///
/// assert_eq!(invoice.totals.unwrap().total_with_tax, dec!(2178));
/// ```
pub struct InvoiceBuilder {
    series: Option<String>,
    code: String,
    issue_date: NaiveDate,
    operation_date: Option<NaiveDate>,
    invoice_type: InvoiceType,
    currency: String,
    supplier: Option<Party>,
    customer: Option<Party>,
    lines: Vec<Line>,
    discounts: Vec<AllowanceCharge>,
    charges: Vec<AllowanceCharge>,
    tags: Vec<Tag>,
    preceding: Vec<DocumentRef>,
    notes: Vec<Note>,
}

impl InvoiceBuilder {
    pub fn new(code: impl Into<String>, issue_date: NaiveDate) -> Self {
        Self {
            series: None,
            code: code.into(),
            issue_date,
            operation_date: None,
            invoice_type: InvoiceType::Standard,
            currency: "EUR".to_string(),
            supplier: None,
            customer: None,
            lines: Vec::new(),
            discounts: Vec::new(),
            charges: Vec::new(),
            tags: Vec::new(),
            preceding: Vec::new(),
            notes: Vec::new(),
        }
    }

    pub fn series(mut self, series: impl Into<String>) -> Self {
        self.series = Some(series.into());
        self
    }

    pub fn operation_date(mut self, date: NaiveDate) -> Self {
        self.operation_date = Some(date);
        self
    }

    pub fn invoice_type(mut self, invoice_type: InvoiceType) -> Self {
        self.invoice_type = invoice_type;
        self
    }

    pub fn currency(mut self, code: impl Into<String>) -> Self {
        self.currency = code.into();
        self
    }

    pub fn supplier(mut self, party: Party) -> Self {
        self.supplier = Some(party);
        self
    }

    pub fn customer(mut self, party: Party) -> Self {
        self.customer = Some(party);
        self
    }

    pub fn add_line(mut self, line: Line) -> Self {
        self.lines.push(line);
        self
    }

    pub fn add_discount(mut self, discount: AllowanceCharge) -> Self {
        self.discounts.push(AllowanceCharge {
            is_charge: false,
            ..discount
        });
        self
    }

    pub fn add_charge(mut self, charge: AllowanceCharge) -> Self {
        self.charges.push(AllowanceCharge {
            is_charge: true,
            ..charge
        });
        self
    }

    pub fn tag(mut self, tag: Tag) -> Self {
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
        self
    }

    /// Reference an invoice corrected by this credit or debit note.
    pub fn preceding(
        mut self,
        series: Option<&str>,
        code: impl Into<String>,
        issue_date: NaiveDate,
        correction_code: Option<&str>,
    ) -> Self {
        self.preceding.push(DocumentRef {
            series: series.map(String::from),
            code: code.into(),
            issue_date,
            correction_code: correction_code.map(String::from),
        });
        self
    }

    pub fn note(mut self, key: NoteKey, text: impl Into<String>) -> Self {
        self.notes.push(Note {
            key,
            text: text.into(),
        });
        self
    }

    /// Build the invoice, calculating totals and checking TicketBAI
    /// preconditions. Returns all validation errors (not just the first).
    pub fn build(self) -> Result<Invoice, TbaiError> {
        if self.lines.is_empty() {
            return Err(TbaiError::validation("at least one line is required"));
        }

        let invoice = self.build_unchecked()?;

        let errors = validation::validate_ticketbai(&invoice);
        if !errors.is_empty() {
            return Err(errors.into());
        }

        Ok(invoice)
    }

    /// Build without precondition checks. Totals are still calculated.
    pub fn build_unchecked(self) -> Result<Invoice, TbaiError> {
        let supplier = self
            .supplier
            .ok_or_else(|| TbaiError::validation("supplier is required"))?;

        let mut invoice = Invoice {
            series: self.series,
            code: self.code,
            issue_date: self.issue_date,
            operation_date: self.operation_date,
            invoice_type: self.invoice_type,
            currency: self.currency,
            supplier,
            customer: self.customer,
            lines: self.lines,
            discounts: self.discounts,
            charges: self.charges,
            tags: self.tags,
            preceding: self.preceding,
            notes: self.notes,
            totals: None,
        };

        validation::calculate_totals(&mut invoice);
        Ok(invoice)
    }
}

/// Builder for Party (supplier/customer).
pub struct PartyBuilder {
    name: String,
    tax_id: Option<TaxIdentity>,
    addresses: Vec<Address>,
    identities: Vec<Identity>,
}

impl PartyBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tax_id: None,
            addresses: Vec::new(),
            identities: Vec::new(),
        }
    }

    pub fn tax_id(
        mut self,
        country: impl Into<String>,
        code: impl Into<String>,
        zone: Option<&str>,
    ) -> Self {
        self.tax_id = Some(TaxIdentity {
            country: country.into(),
            code: code.into(),
            zone: zone.map(String::from),
        });
        self
    }

    pub fn address(mut self, address: Address) -> Self {
        self.addresses.push(address);
        self
    }

    pub fn identity(mut self, kind: IdentityKind, code: impl Into<String>) -> Self {
        self.identities.push(Identity {
            kind,
            code: code.into(),
        });
        self
    }

    pub fn build(self) -> Party {
        Party {
            name: self.name,
            tax_id: self.tax_id,
            addresses: self.addresses,
            identities: self.identities,
        }
    }
}

/// Builder for Address.
#[derive(Default)]
pub struct AddressBuilder {
    address: Address,
}

impl AddressBuilder {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            address: Address {
                code: Some(code.into()),
                ..Address::default()
            },
        }
    }

    pub fn street(mut self, street: impl Into<String>, number: impl Into<String>) -> Self {
        self.address.street = Some(street.into());
        self.address.number = Some(number.into());
        self
    }

    pub fn block(mut self, block: impl Into<String>) -> Self {
        self.address.block = Some(block.into());
        self
    }

    pub fn floor(mut self, floor: impl Into<String>) -> Self {
        self.address.floor = Some(floor.into());
        self
    }

    pub fn door(mut self, door: impl Into<String>) -> Self {
        self.address.door = Some(door.into());
        self
    }

    pub fn street_extra(mut self, extra: impl Into<String>) -> Self {
        self.address.street_extra = Some(extra.into());
        self
    }

    pub fn po_box(mut self, po_box: impl Into<String>) -> Self {
        self.address.po_box = Some(po_box.into());
        self
    }

    pub fn locality(mut self, locality: impl Into<String>) -> Self {
        self.address.locality = Some(locality.into());
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.address.region = Some(region.into());
        self
    }

    pub fn country(mut self, country: impl Into<String>) -> Self {
        self.address.country = Some(country.into());
        self
    }

    pub fn build(self) -> Address {
        self.address
    }
}

/// Builder for invoice lines.
pub struct LineBuilder {
    quantity: Decimal,
    item: Item,
    discounts: Vec<AllowanceCharge>,
    charges: Vec<AllowanceCharge>,
    taxes: Vec<TaxCombo>,
}

impl LineBuilder {
    pub fn new(name: impl Into<String>, quantity: Decimal, price: Decimal) -> Self {
        Self {
            quantity,
            item: Item {
                name: name.into(),
                price,
                kind: ProductKind::Services,
                resale: false,
            },
            discounts: Vec::new(),
            charges: Vec::new(),
            taxes: Vec::new(),
        }
    }

    /// VAT at the given rate.
    pub fn vat(self, percent: Decimal) -> Self {
        self.tax(TaxCombo {
            category: TaxCategory::Vat,
            percent: Some(percent),
            surcharge: None,
            exemption: None,
        })
    }

    /// VAT plus equivalence surcharge.
    pub fn vat_with_surcharge(self, percent: Decimal, surcharge: Decimal) -> Self {
        self.tax(TaxCombo {
            category: TaxCategory::Vat,
            percent: Some(percent),
            surcharge: Some(surcharge),
            exemption: None,
        })
    }

    /// VAT without a rate, with an exemption or not-subject cause code.
    pub fn vat_exempt(self, cause: impl Into<String>) -> Self {
        self.tax(TaxCombo {
            category: TaxCategory::Vat,
            percent: None,
            surcharge: None,
            exemption: Some(cause.into()),
        })
    }

    pub fn tax(mut self, combo: TaxCombo) -> Self {
        self.taxes.push(combo);
        self
    }

    pub fn goods(mut self) -> Self {
        self.item.kind = ProductKind::Goods;
        self
    }

    pub fn resale(mut self) -> Self {
        self.item.resale = true;
        self
    }

    pub fn discount(mut self, amount: Decimal, reason: impl Into<String>) -> Self {
        self.discounts.push(AllowanceCharge {
            is_charge: false,
            amount,
            percent: None,
            reason: Some(reason.into()),
            taxes: Vec::new(),
        });
        self
    }

    pub fn charge(mut self, amount: Decimal, reason: impl Into<String>) -> Self {
        self.charges.push(AllowanceCharge {
            is_charge: true,
            amount,
            percent: None,
            reason: Some(reason.into()),
            taxes: Vec::new(),
        });
        self
    }

    pub fn build(self) -> Line {
        Line {
            quantity: self.quantity,
            item: self.item,
            discounts: self.discounts,
            charges: self.charges,
            taxes: self.taxes,
            sum: None,
            total: None,
        }
    }
}
