//! Convert, sign and print a TicketBAI invoice for Bizkaia.
//!
//! Submits it to the sandbox when `TBAI_IDENTITY_PEM` points at a PEM file
//! holding the client certificate and key:
//!
//! ```sh
//! RUST_LOG=ticketbai=debug TBAI_IDENTITY_PEM=cert.pem cargo run --example issue_invoice
//! ```
//!
//! The signer here only produces a placeholder signature; the gateways will
//! reject it. Plug in a real XAdES signer for actual submissions.

use chrono::NaiveDate;
use rust_decimal_macros::dec;
use ticketbai::doc::{SignRequest, SignatureEnvelope, Signer, SignerError, Software};
use ticketbai::gateways::{Environment, GatewayOptions};
use ticketbai::*;
use tracing_subscriber::EnvFilter;

struct PlaceholderSigner;

impl Signer for PlaceholderSigner {
    fn sign(&self, req: &SignRequest<'_>) -> Result<SignatureEnvelope, SignerError> {
        let value = format!("UGxhY2Vob2xkZXJTaWduYXR1cmU{:0>100}", req.data.len());
        Ok(SignatureEnvelope {
            id: format!("Signature-{}", req.doc_id),
            xml: format!(
                "<ds:Signature xmlns:ds=\"http://www.w3.org/2000/09/xmldsig#\" Id=\"Signature-{}\"><ds:SignatureValue>{value}</ds:SignatureValue></ds:Signature>",
                req.doc_id
            ),
            value,
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let invoice = InvoiceBuilder::new("SAMPLE-001", NaiveDate::from_ymd_opt(2022, 2, 1).ok_or("bad date")?)
        .series("TEST")
        .supplier(
            PartyBuilder::new("Provide One S.L.")
                .tax_id("ES", "B98602642", Some("BI"))
                .build(),
        )
        .customer(
            PartyBuilder::new("Sample Consumer")
                .tax_id("ES", "54387763P", None)
                .address(AddressBuilder::new("48010").street("Gran Vía", "1").build())
                .build(),
        )
        .add_line(
            LineBuilder::new("Development services", dec!(20), dec!(90))
                .vat(dec!(21))
                .build(),
        )
        .note(NoteKey::General, "Development of the web shop")
        .build()?;

    let software = Software::new("TBAIBI00000000PRUEBA", "12345678A", "My Software", "1.0");
    let config = ClientConfig::new(software, Zone::Bizkaia).with_environment(Environment::Sandbox);

    let mut options = GatewayOptions::default();
    let submit = match std::env::var("TBAI_IDENTITY_PEM") {
        Ok(path) => {
            options = options.with_identity_pem(&std::fs::read(path)?)?;
            true
        }
        Err(_) => false,
    };
    let client = Client::connect(config, PlaceholderSigner, options)?;

    let mut doc = client.convert(&invoice)?;
    client.fingerprint(&mut doc, None);
    let codes = client.sign(&mut doc, "SAMPLE-001")?;

    println!("{}", String::from_utf8(doc.bytes_indent()?)?);
    println!("TBAI code: {}", codes.tbai_code);
    println!("QR URL:    {}", codes.qr_url);
    println!(
        "Chain:     {}",
        serde_json::to_string(&doc.chain_data())?
    );

    if submit {
        match client.post(&doc).await {
            Ok(()) => println!("submitted"),
            Err(e) => println!("submission failed ({:?}): {e}", e.kind()),
        }
    }

    Ok(())
}
