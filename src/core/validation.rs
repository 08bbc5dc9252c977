use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::error::ValidationError;
use super::types::*;
use super::zone::Zone;

/// Check the preconditions an invoice must meet before it can be turned into
/// a TicketBAI document. Returns all errors (not just the first).
pub fn validate_ticketbai(invoice: &Invoice) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if invoice.code.trim().is_empty() {
        errors.push(ValidationError::new("code", "invoice code is required"));
    }

    let zone = validate_supplier(&invoice.supplier, &mut errors);

    if invoice.invoice_type == InvoiceType::Corrective {
        errors.push(ValidationError::new(
            "invoice_type",
            "corrective invoices are not supported, use a credit or debit note",
        ));
    }

    if invoice.invoice_type.is_rectification() && invoice.preceding.is_empty() {
        errors.push(ValidationError::new(
            "preceding",
            "credit and debit notes must reference the corrected invoice",
        ));
    }

    if invoice.general_note().is_none() {
        errors.push(ValidationError::with_rule(
            "notes",
            "missing general description of invoice",
            "TBAI-DESC",
        ));
    }

    if let Some(zone) = zone {
        let rules = zone.rules();

        if let Some(max) = rules.max_lines {
            if invoice.lines.len() > max {
                errors.push(ValidationError::new(
                    "lines",
                    format!("line count over limit ({max}) for tax locality {zone}"),
                ));
            }
        }

        if rules.customer_address_required {
            if let Some(customer) = &invoice.customer {
                if customer.addresses.is_empty() {
                    errors.push(ValidationError::new(
                        "customer.addresses",
                        "customer address required",
                    ));
                }
            }
        }

        if !rules.charges_allowed {
            if !invoice.charges.is_empty() {
                errors.push(ValidationError::new("charges", "charges are not supported"));
            }
            for (i, line) in invoice.lines.iter().enumerate() {
                if !line.charges.is_empty() {
                    errors.push(ValidationError::new(
                        format!("lines[{i}].charges"),
                        "charges are not supported",
                    ));
                }
            }
        }
    }

    errors
}

fn validate_supplier(supplier: &Party, errors: &mut Vec<ValidationError>) -> Option<Zone> {
    let Some(tax_id) = &supplier.tax_id else {
        errors.push(ValidationError::new(
            "supplier.tax_id",
            "supplier tax identity is required",
        ));
        return None;
    };

    if tax_id.country != "ES" {
        errors.push(ValidationError::new(
            "supplier.tax_id.country",
            "only spanish suppliers are supported",
        ));
    }
    if tax_id.code.is_empty() {
        errors.push(ValidationError::new(
            "supplier.tax_id.code",
            "supplier NIF is required",
        ));
    }

    match tax_id.zone.as_deref() {
        None | Some("") => {
            errors.push(ValidationError::new(
                "supplier.tax_id.zone",
                "supplier tax identity locality is required",
            ));
            None
        }
        Some(code) => {
            let zone = Zone::from_code(code);
            if zone.is_none() {
                errors.push(ValidationError::new(
                    "supplier.tax_id.zone",
                    format!("supplier tax identity locality '{code}' not supported by TicketBAI"),
                ));
            }
            zone
        }
    }
}

/// Zone declared in the supplier's tax identity, if it is a TicketBAI zone.
pub fn supplier_zone(invoice: &Invoice) -> Option<Zone> {
    invoice
        .supplier
        .tax_id
        .as_ref()
        .and_then(|t| t.zone.as_deref())
        .and_then(Zone::from_code)
}

/// Calculate line and document totals (mutates in place).
pub fn calculate_totals(invoice: &mut Invoice) {
    for line in &mut invoice.lines {
        let sum = line.quantity * line.item.price;
        let discounts: Decimal = line.discounts.iter().map(|d| d.amount).sum();
        let charges: Decimal = line.charges.iter().map(|c| c.amount).sum();
        line.sum = Some(sum);
        line.total = Some(sum - discounts + charges);
    }

    let sum: Decimal = invoice.lines.iter().filter_map(|l| l.total).sum();
    let discounts_total: Decimal = invoice.discounts.iter().map(|d| d.amount).sum();
    let charges_total: Decimal = invoice.charges.iter().map(|c| c.amount).sum();
    let total = sum - discounts_total + charges_total;

    // Group by (category, percent, surcharge) keeping first-seen order
    let mut taxes: Vec<CategoryTotal> = Vec::new();
    let mut add = |combo: &TaxCombo, base: Decimal| {
        match taxes.iter_mut().find(|t| {
            t.category == combo.category
                && t.percent == combo.percent
                && t.surcharge_percent == combo.surcharge
        }) {
            Some(existing) => existing.base += base,
            None => taxes.push(CategoryTotal {
                category: combo.category,
                percent: combo.percent,
                surcharge_percent: combo.surcharge,
                retained: combo.category.is_retained(),
                base,
                amount: Decimal::ZERO,
                surcharge: Decimal::ZERO,
            }),
        }
    };

    for line in &invoice.lines {
        let base = line.total.unwrap_or(Decimal::ZERO);
        for combo in &line.taxes {
            add(combo, base);
        }
    }
    for discount in &invoice.discounts {
        for combo in &discount.taxes {
            add(combo, -discount.amount);
        }
    }
    for charge in &invoice.charges {
        for combo in &charge.taxes {
            add(combo, charge.amount);
        }
    }

    for t in &mut taxes {
        t.amount = percent_of(t.base, t.percent);
        t.surcharge = percent_of(t.base, t.surcharge_percent);
    }

    let tax: Decimal = taxes
        .iter()
        .filter(|t| !t.retained)
        .map(|t| t.amount + t.surcharge)
        .sum();
    let retained: Decimal = taxes.iter().filter(|t| t.retained).map(|t| t.amount).sum();
    let total_with_tax = total + tax;

    invoice.totals = Some(Totals {
        sum,
        discounts_total,
        charges_total,
        total,
        taxes,
        tax,
        retained,
        total_with_tax,
        payable: total_with_tax - retained,
    });
}

fn percent_of(base: Decimal, percent: Option<Decimal>) -> Decimal {
    match percent {
        Some(percent) => round_half_up(base * percent / dec!(100), 2),
        None => Decimal::ZERO,
    }
}

/// Negate quantities and amounts so that a credit note cancels the original,
/// then recalculate totals.
pub fn invert(invoice: &mut Invoice) {
    for line in &mut invoice.lines {
        line.quantity = -line.quantity;
        for d in line.discounts.iter_mut().chain(line.charges.iter_mut()) {
            d.amount = -d.amount;
        }
    }
    for d in invoice
        .discounts
        .iter_mut()
        .chain(invoice.charges.iter_mut())
    {
        d.amount = -d.amount;
    }
    calculate_totals(invoice);
}

/// Tax on a single line: non-retained taxes plus equivalence surcharge.
pub fn line_tax(line: &Line) -> Decimal {
    let base = line.total.unwrap_or(Decimal::ZERO);
    line.taxes
        .iter()
        .filter(|t| !t.category.is_retained())
        .map(|t| percent_of(base, t.percent) + percent_of(base, t.surcharge))
        .sum()
}

/// Round a Decimal to `dp` decimal places using half-up (commercial rounding).
pub fn round_half_up(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
}
