#![allow(dead_code)]

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal_macros::dec;
use ticketbai::core::*;
use ticketbai::doc::*;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// 2022-02-01 10:00 UTC, 11:00 in Madrid.
pub fn ts() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2022, 2, 1, 10, 0, 0).unwrap()
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn software() -> Software {
    Software::new("TBAIBI00000000PRUEBA", "12345678A", "My Software", "1.0")
}

pub fn supplier(zone: &str) -> Party {
    PartyBuilder::new("Provide One S.L.")
        .tax_id("ES", "B98602642", Some(zone))
        .address(
            AddressBuilder::new("48001")
                .street("Calle Mayor", "12")
                .locality("Bilbao")
                .build(),
        )
        .build()
}

pub fn spanish_customer() -> Party {
    PartyBuilder::new("Sample Consumer")
        .tax_id("ES", "54387763P", None)
        .address(
            AddressBuilder::new("48010")
                .street("Gran Vía", "1")
                .floor("3")
                .door("B")
                .build(),
        )
        .build()
}

pub fn foreign_customer() -> Party {
    PartyBuilder::new("Kunde AG")
        .tax_id("DE", "DE123456789", None)
        .address(AddressBuilder::new("80331").street("Marienplatz", "1").build())
        .build()
}

/// 20 hours at 90.00 with 21% VAT: total 2178.00.
pub fn sample_invoice(zone: &str) -> Invoice {
    InvoiceBuilder::new("SAMPLE-001", date(2022, 2, 1))
        .series("TEST")
        .supplier(supplier(zone))
        .customer(spanish_customer())
        .add_line(
            LineBuilder::new("Development services", dec!(20), dec!(90))
                .vat(dec!(21))
                .build(),
        )
        .note(NoteKey::General, "Development of the web shop")
        .build()
        .unwrap()
}

/// Deterministic stand-in for a XAdES signer. The value is long enough
/// to exercise the 100 character truncation.
#[derive(Debug, Clone)]
pub struct FakeSigner {
    pub seed: &'static str,
}

impl Default for FakeSigner {
    fn default() -> Self {
        Self {
            seed: "TW9ja1NpZ25hdHVyZVZhbHVl",
        }
    }
}

impl Signer for FakeSigner {
    fn sign(&self, req: &SignRequest<'_>) -> Result<SignatureEnvelope, SignerError> {
        let mut value = format!("{}{:08}", self.seed, req.data.len());
        while value.len() < 172 {
            value.push('Q');
        }
        let id = format!("Signature-{}", req.doc_id);
        let xml = format!(
            "<ds:Signature xmlns:ds=\"http://www.w3.org/2000/09/xmldsig#\" Id=\"{id}\"><ds:SignatureValue>{value}</ds:SignatureValue><ds:Object><xades:SigPolicyHash>{}</xades:SigPolicyHash><xades:SignerRole>{}</xades:SignerRole></ds:Object></ds:Signature>",
            req.policy.hash,
            req.role.tag(),
        );
        Ok(SignatureEnvelope { id, value, xml })
    }
}

pub struct FailingSigner;

impl Signer for FailingSigner {
    fn sign(&self, _req: &SignRequest<'_>) -> Result<SignatureEnvelope, SignerError> {
        Err("certificate expired".into())
    }
}

/// Converted, fingerprinted and signed document for `zone`.
pub fn signed_document(zone: Zone) -> TicketBai {
    let mut doc = TicketBai::new(
        &sample_invoice(zone.code()),
        ts(),
        IssuerRole::Supplier,
        zone,
        &Formatting::default(),
    )
    .unwrap();
    doc.fingerprint(&software(), None);
    doc.sign(
        &FakeSigner::default(),
        "doc-1",
        IssuerRole::Supplier,
        zone,
        &FixedClock(ts()),
    )
    .unwrap();
    doc
}
