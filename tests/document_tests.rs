#![cfg(feature = "core")]

mod common;

use common::*;
use rust_decimal_macros::dec;
use ticketbai::core::*;
use ticketbai::doc::*;

fn xml(doc: &TicketBai) -> String {
    String::from_utf8(doc.canonical().unwrap()).unwrap()
}

fn convert(invoice: &Invoice, zone: Zone) -> TicketBai {
    TicketBai::new(invoice, ts(), IssuerRole::Supplier, zone, &Formatting::default()).unwrap()
}

// --- Domestic invoice ---

#[test]
fn domestic_invoice_document() {
    let doc = convert(&sample_invoice("BI"), Zone::Bizkaia);
    let xml = xml(&doc);

    assert!(xml.contains(
        "<Emisor><NIF>B98602642</NIF><ApellidosNombreRazonSocial>Provide One S.L.</ApellidosNombreRazonSocial></Emisor>"
    ));
    assert!(xml.contains("<IDDestinatario><NIF>54387763P</NIF>"));
    assert!(xml.contains("<CodigoPostal>48010</CodigoPostal>"));
    assert!(xml.contains("<EmitidaPorTercerosODestinatario>N</EmitidaPorTercerosODestinatario>"));

    assert!(xml.contains("<SerieFactura>TEST</SerieFactura><NumFactura>SAMPLE-001</NumFactura>"));
    assert!(xml.contains("<FechaExpedicionFactura>01-02-2022</FechaExpedicionFactura>"));
    // 10:00 UTC is 11:00 in Madrid during winter
    assert!(xml.contains("<HoraExpedicionFactura>11:00:00</HoraExpedicionFactura>"));
    assert!(xml.contains("<FacturaSimplificada>N</FacturaSimplificada>"));

    assert!(xml.contains("<DescripcionFactura>Development of the web shop</DescripcionFactura>"));
    assert!(xml.contains(
        "<IDDetalleFactura><DescripcionDetalle>Development services</DescripcionDetalle><Cantidad>20</Cantidad><ImporteUnitario>90.00</ImporteUnitario><Descuento>0.00</Descuento><ImporteTotal>2178.00</ImporteTotal></IDDetalleFactura>"
    ));
    assert!(xml.contains("<ImporteTotalFactura>2178.00</ImporteTotalFactura>"));
    assert!(xml.contains("<ClaveRegimenIvaOpTrascendencia>01</ClaveRegimenIvaOpTrascendencia>"));

    assert!(xml.contains(
        "<TipoDesglose><DesgloseFactura><Sujeta><NoExenta><DetalleNoExenta><TipoNoExenta>S1</TipoNoExenta><DesgloseIVA><DetalleIVA><BaseImponible>1800.00</BaseImponible><TipoImpositivo>21.00</TipoImpositivo><CuotaImpuesto>378.00</CuotaImpuesto></DetalleIVA></DesgloseIVA></DetalleNoExenta></NoExenta></Sujeta></DesgloseFactura></TipoDesglose>"
    ));
}

#[test]
fn b2c_ticket_has_no_recipients() {
    let invoice = InvoiceBuilder::new("T-1", date(2022, 2, 1))
        .supplier(supplier("SS"))
        .add_line(LineBuilder::new("Coffee", dec!(2), dec!(1.50)).vat(dec!(10)).build())
        .tag(Tag::SimplifiedInvoice)
        .note(NoteKey::General, "Bar ticket")
        .build()
        .unwrap();
    let doc = convert(&invoice, Zone::Gipuzkoa);
    let xml = xml(&doc);

    assert!(!xml.contains("<Destinatarios>"));
    assert!(!xml.contains("<SerieFactura>"));
    assert!(xml.contains("<FacturaSimplificada>S</FacturaSimplificada>"));
    assert_eq!(doc.invoice.data.total, dec!(3.30));
}

#[test]
fn invalid_invoice_rejected_with_all_errors() {
    let invoice = InvoiceBuilder::new("", date(2022, 2, 1))
        .supplier(PartyBuilder::new("No Zone S.L.").tax_id("ES", "B98602642", None).build())
        .add_line(LineBuilder::new("Item", dec!(1), dec!(10)).vat(dec!(21)).build())
        .build_unchecked()
        .unwrap();

    let err = TicketBai::new(&invoice, ts(), IssuerRole::Supplier, Zone::Bizkaia, &Formatting::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    let msg = err.to_string();
    assert!(msg.contains("code"));
    assert!(msg.contains("supplier.tax_id.zone"));
    assert!(msg.contains("missing general description of invoice"));
}

#[test]
fn customer_address_required_in_southern_zones() {
    let customer = PartyBuilder::new("Sample Consumer")
        .tax_id("ES", "54387763P", None)
        .build();
    let build = |zone: &str| {
        InvoiceBuilder::new("A-1", date(2022, 2, 1))
            .supplier(supplier(zone))
            .customer(customer.clone())
            .add_line(LineBuilder::new("Item", dec!(1), dec!(10)).vat(dec!(21)).build())
            .note(NoteKey::General, "Sale")
            .build()
    };

    assert!(build("BI").is_ok());
    for zone in ["SS", "VI"] {
        let err = build(zone).unwrap_err();
        assert!(err.to_string().contains("customer address required"), "{zone}");
    }
}

// --- Foreign customers ---

#[test]
fn foreign_customer_split_by_operation() {
    let invoice = InvoiceBuilder::new("EX-1", date(2022, 2, 1))
        .supplier(supplier("BI"))
        .customer(foreign_customer())
        .add_line(LineBuilder::new("Consulting", dec!(1), dec!(100)).vat(dec!(21)).build())
        .add_line(
            LineBuilder::new("Hardware", dec!(2), dec!(100))
                .vat(dec!(21))
                .goods()
                .build(),
        )
        .note(NoteKey::General, "Export")
        .build()
        .unwrap();
    let doc = convert(&invoice, Zone::Bizkaia);

    let Breakdown::ByOperation { services, goods } = &doc.invoice.breakdown else {
        panic!("expected operation breakdown");
    };
    assert_eq!(services.as_ref().unwrap().total_base(), dec!(100));
    assert_eq!(goods.as_ref().unwrap().total_base(), dec!(200));
    assert_eq!(doc.invoice.data.regime_keys, vec!["02"]);

    let xml = xml(&doc);
    assert!(xml.contains("<DesgloseTipoOperacion><PrestacionServicios>"));
    assert!(xml.contains("</PrestacionServicios><Entrega>"));
    assert!(xml.contains(
        "<IDOtro><CodigoPais>DE</CodigoPais><IDType>02</IDType><ID>DE123456789</ID></IDOtro>"
    ));
}

#[test]
fn foreign_services_only_omits_goods_branch() {
    let invoice = InvoiceBuilder::new("EX-2", date(2022, 2, 1))
        .supplier(supplier("BI"))
        .customer(foreign_customer())
        .add_line(LineBuilder::new("Consulting", dec!(1), dec!(100)).vat(dec!(21)).build())
        .note(NoteKey::General, "Export")
        .build()
        .unwrap();
    let xml = xml(&convert(&invoice, Zone::Bizkaia));
    assert!(xml.contains("<PrestacionServicios>"));
    assert!(!xml.contains("<Entrega>"));
}

#[test]
fn customer_rates_are_not_subject() {
    let invoice = InvoiceBuilder::new("DS-1", date(2022, 2, 1))
        .supplier(supplier("BI"))
        .customer(foreign_customer())
        .add_line(LineBuilder::new("Online course", dec!(1), dec!(50)).vat(dec!(19)).build())
        .tag(Tag::CustomerRates)
        .note(NoteKey::General, "Distance sale")
        .build()
        .unwrap();
    let xml = xml(&convert(&invoice, Zone::Bizkaia));
    assert!(xml.contains(
        "<PrestacionServicios><NoSujeta><DetalleNoSujeta><Causa>RL</Causa><Importe>50.00</Importe></DetalleNoSujeta></NoSujeta></PrestacionServicios>"
    ));
    assert!(!xml.contains("<Sujeta>"));
}

// --- Regimes and special cases ---

#[test]
fn exempt_and_not_subject_lines() {
    let invoice = InvoiceBuilder::new("E-1", date(2022, 2, 1))
        .supplier(supplier("BI"))
        .add_line(LineBuilder::new("Training", dec!(1), dec!(300)).vat_exempt("E1").build())
        .add_line(LineBuilder::new("Deposit", dec!(1), dec!(20)).vat_exempt("OT").build())
        .add_line(LineBuilder::new("Consulting", dec!(1), dec!(100)).vat(dec!(21)).build())
        .note(NoteKey::General, "Mixed")
        .build()
        .unwrap();
    let doc = convert(&invoice, Zone::Bizkaia);
    let xml = xml(&doc);

    assert!(xml.contains(
        "<Exenta><DetalleExenta><CausaExencion>E1</CausaExencion><BaseImponible>300.00</BaseImponible></DetalleExenta></Exenta>"
    ));
    assert!(xml.contains(
        "<NoSujeta><DetalleNoSujeta><Causa>OT</Causa><Importe>20.00</Importe></DetalleNoSujeta></NoSujeta>"
    ));
    assert_eq!(doc.invoice.data.total, dec!(441));
}

#[test]
fn reverse_charge_is_s2() {
    let invoice = InvoiceBuilder::new("RC-1", date(2022, 2, 1))
        .supplier(supplier("VI"))
        .customer(spanish_customer())
        .add_line(LineBuilder::new("Scrap metal", dec!(1), dec!(1000)).vat(dec!(21)).build())
        .tag(Tag::ReverseCharge)
        .note(NoteKey::General, "Reverse charge")
        .build()
        .unwrap();
    let xml = xml(&convert(&invoice, Zone::Araba));
    assert!(xml.contains("<TipoNoExenta>S2</TipoNoExenta>"));
}

#[test]
fn simplified_scheme_marks_rows() {
    let invoice = InvoiceBuilder::new("RS-1", date(2022, 2, 1))
        .supplier(supplier("BI"))
        .add_line(LineBuilder::new("Taxi ride", dec!(1), dec!(20)).vat(dec!(10)).build())
        .tag(Tag::SimplifiedScheme)
        .note(NoteKey::General, "Ride")
        .build()
        .unwrap();
    let doc = convert(&invoice, Zone::Bizkaia);
    assert_eq!(doc.invoice.data.regime_keys, vec!["52"]);
    assert!(xml(&doc).contains(
        "<OperacionEnRecargoDeEquivalenciaORegimenSimplificado>S</OperacionEnRecargoDeEquivalenciaORegimenSimplificado>"
    ));
}

#[test]
fn resale_with_surcharge() {
    let invoice = InvoiceBuilder::new("RE-1", date(2022, 2, 1))
        .supplier(supplier("BI"))
        .add_line(
            LineBuilder::new("Shoes", dec!(1), dec!(100))
                .vat_with_surcharge(dec!(21), dec!(5.2))
                .resale()
                .build(),
        )
        .add_line(LineBuilder::new("Repair", dec!(1), dec!(100)).vat(dec!(21)).build())
        .note(NoteKey::General, "Shop")
        .build()
        .unwrap();
    let doc = convert(&invoice, Zone::Bizkaia);
    assert_eq!(doc.invoice.data.regime_keys, vec!["51"]);
    assert_eq!(doc.invoice.data.total, dec!(247.20));

    let xml = xml(&doc);
    assert!(xml.contains(
        "<DetalleIVA><BaseImponible>100.00</BaseImponible><TipoImpositivo>21.00</TipoImpositivo><CuotaImpuesto>21.00</CuotaImpuesto><TipoRecargoEquivalencia>5.20</TipoRecargoEquivalencia><CuotaRecargoEquivalencia>5.20</CuotaRecargoEquivalencia><OperacionEnRecargoDeEquivalenciaORegimenSimplificado>S</OperacionEnRecargoDeEquivalenciaORegimenSimplificado></DetalleIVA>"
    ));
    // the plain line keeps its own row
    assert!(xml.contains(
        "<DetalleIVA><BaseImponible>100.00</BaseImponible><TipoImpositivo>21.00</TipoImpositivo><CuotaImpuesto>21.00</CuotaImpuesto></DetalleIVA>"
    ));
}

#[test]
fn credit_note_references_corrected_invoice() {
    let invoice = InvoiceBuilder::new("R-1", date(2022, 2, 3))
        .series("RECT")
        .invoice_type(InvoiceType::CreditNote)
        .supplier(supplier("BI"))
        .add_line(LineBuilder::new("Refund", dec!(1), dec!(100)).vat(dec!(21)).build())
        .preceding(Some("TEST"), "SAMPLE-001", date(2022, 2, 1), Some("R2"))
        .note(NoteKey::General, "Refund")
        .build()
        .unwrap();
    let xml = xml(&convert(&invoice, Zone::Bizkaia));

    assert!(xml.contains("<FacturaRectificativa><Codigo>R2</Codigo><Tipo>I</Tipo></FacturaRectificativa>"));
    assert!(xml.contains(
        "<IDFacturaRectificadaSustituida><SerieFactura>TEST</SerieFactura><NumFactura>SAMPLE-001</NumFactura><FechaExpedicionFactura>01-02-2022</FechaExpedicionFactura></IDFacturaRectificadaSustituida>"
    ));
    assert!(xml.contains("<ImporteTotalFactura>-121.00</ImporteTotalFactura>"));
    assert!(xml.contains("<BaseImponible>-100.00</BaseImponible><TipoImpositivo>21.00</TipoImpositivo>"));
}

// --- Chaining and signing ---

#[test]
fn chained_documents() {
    let first = signed_document(Zone::Bizkaia);
    let previous = first.chain_data();
    assert_eq!(previous.signature.chars().count(), 100);

    let invoice = InvoiceBuilder::new("SAMPLE-002", date(2022, 2, 1))
        .series("TEST")
        .supplier(supplier("BI"))
        .add_line(LineBuilder::new("Support", dec!(1), dec!(10)).vat(dec!(21)).build())
        .note(NoteKey::General, "Support")
        .build()
        .unwrap();
    let mut second = convert(&invoice, Zone::Bizkaia);
    second.fingerprint(&software(), Some(&previous));
    let xml = xml(&second);

    assert!(xml.contains(&format!(
        "<EncadenamientoFacturaAnterior><SerieFacturaAnterior>TEST</SerieFacturaAnterior><NumFacturaAnterior>SAMPLE-001</NumFacturaAnterior><FechaExpedicionFacturaAnterior>01-02-2022</FechaExpedicionFacturaAnterior><SignatureValueFirmaFacturaAnterior>{}</SignatureValueFirmaFacturaAnterior></EncadenamientoFacturaAnterior>",
        previous.signature
    )));
    assert!(xml.contains(
        "<Software><LicenciaTBAI>TBAIBI00000000PRUEBA</LicenciaTBAI><EntidadDesarrolladora><NIF>12345678A</NIF></EntidadDesarrolladora><Nombre>My Software</Nombre><Version>1.0</Version></Software>"
    ));
}

#[test]
fn first_document_has_no_chain_link() {
    let doc = signed_document(Zone::Gipuzkoa);
    assert!(!xml(&doc).contains("EncadenamientoFacturaAnterior"));
}

#[test]
fn signature_embedded_with_zone_policy() {
    let doc = signed_document(Zone::Araba);
    let xml = xml(&doc);
    let policy = SigningPolicy::for_zone(Zone::Araba);
    assert!(xml.contains(&format!("<xades:SigPolicyHash>{}</xades:SigPolicyHash>", policy.hash)));
    assert!(xml.contains("<xades:SignerRole>Supplier</xades:SignerRole>"));
    assert!(xml.ends_with("</ds:Signature></T:TicketBai>"));
}

#[test]
fn signer_failure_is_reported() {
    let mut doc = convert(&sample_invoice("BI"), Zone::Bizkaia);
    doc.fingerprint(&software(), None);
    let err = doc
        .sign(&FailingSigner, "doc-1", IssuerRole::Supplier, Zone::Bizkaia, &FixedClock(ts()))
        .unwrap_err();
    assert!(matches!(err, TbaiError::Signing(_)));
    assert!(err.to_string().contains("certificate expired"));
    assert!(doc.signature.is_none());
}

// --- Cancellation ---

#[test]
fn cancel_from_document_and_from_code_agree() {
    let doc = signed_document(Zone::Bizkaia);
    let codes = doc.codes(Zone::Bizkaia).unwrap();

    let from_doc = CancelTicketBai::for_document(&doc);
    let from_code = CancelTicketBai::for_invoice(&sample_invoice("BI"), &codes.tbai_code).unwrap();
    assert_eq!(from_doc.invoice, from_code.invoice);
}

#[test]
fn cancel_document_xml() {
    let doc = signed_document(Zone::Gipuzkoa);
    let mut cancel = CancelTicketBai::for_document(&doc);
    cancel.fingerprint(&software());
    cancel
        .sign(
            &FakeSigner::default(),
            "cancel-1",
            IssuerRole::Supplier,
            Zone::Gipuzkoa,
            &FixedClock(ts()),
        )
        .unwrap();

    let xml = String::from_utf8(cancel.canonical().unwrap()).unwrap();
    assert!(xml.starts_with("<T:AnulaTicketBai xmlns:T=\"urn:ticketbai:anulacion\">"));
    assert!(xml.contains(
        "<IDFactura><Emisor><NIF>B98602642</NIF><ApellidosNombreRazonSocial>Provide One S.L.</ApellidosNombreRazonSocial></Emisor><CabeceraFactura><SerieFactura>TEST</SerieFactura><NumFactura>SAMPLE-001</NumFactura><FechaExpedicionFactura>01-02-2022</FechaExpedicionFactura></CabeceraFactura></IDFactura>"
    ));
    assert!(!xml.contains("EncadenamientoFacturaAnterior"));
    assert!(xml.contains("Id=\"Signature-cancel-1\""));
    assert_eq!(cancel.issue_year().unwrap(), 2022);
}

#[test]
fn cancel_rejects_foreign_code() {
    let err = CancelTicketBai::for_invoice(
        &sample_invoice("BI"),
        "TBAI-A99800005-010222-TW9ja1NpZ25hd-123",
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    assert!(CancelTicketBai::for_invoice(&sample_invoice("BI"), "not-a-code").is_err());
}
