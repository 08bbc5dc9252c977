#![no_main]

use chrono::NaiveDate;
use libfuzzer_sys::fuzz_target;
use rust_decimal::Decimal;
use ticketbai::core::*;
use ticketbai::doc::CancelTicketBai;

fuzz_target!(|data: &[u8]| {
    let Ok(code) = std::str::from_utf8(data) else {
        return;
    };
    let Some(date) = NaiveDate::from_ymd_opt(2022, 2, 1) else {
        return;
    };
    let Ok(invoice) = InvoiceBuilder::new("1", date)
        .supplier(PartyBuilder::new("Fuzz S.L.").tax_id("ES", "B98602642", Some("BI")).build())
        .add_line(LineBuilder::new("x", Decimal::ONE, Decimal::ONE).vat(Decimal::TEN).build())
        .build_unchecked()
    else {
        return;
    };
    if let Ok(cancel) = CancelTicketBai::for_invoice(&invoice, code) {
        let _ = cancel.bytes();
    }
});
