//! LROE (Libro Registro de Operaciones Económicas) envelopes used by the
//! Bizkaia gateway, model 240, chapter 1.1: issued invoices with a
//! guarantor software.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::core::TbaiError;
use crate::doc::Issuer;
use crate::doc::xml_utils::{Layout, XmlWriter};
use crate::gateways::{GatewayError, HeadFilter, IssuedDocument};

const CONCEPT: &str = "LROE";
const CHAPTER: &str = "1";
const SUBCHAPTER: &str = "1.1";
const MODEL: &str = "240";
const VERSION: &str = "1.0";

const SCHEMA_CREATE: &str = "https://www.batuz.eus/fitxategiak/batuz/LROE/esquemas/LROE_PJ_240_1_1_FacturasEmitidas_ConSG_AltaPeticion_V1_0_2.xsd";
const SCHEMA_QUERY: &str = "https://www.batuz.eus/fitxategiak/batuz/LROE/esquemas/LROE_PJ_240_1_1_FacturasEmitidas_ConSG_ConsultaPeticion_V1_0_0.xsd";
const SCHEMA_CANCEL: &str = "https://www.batuz.eus/fitxategiak/batuz/LROE/esquemas/LROE_PJ_240_1_1_FacturasEmitidas_ConSG_AnulacionPeticion_V1_0_0.xsd";

/// LROE operation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// A00
    Create,
    /// AN0
    Cancel,
    /// C00
    Query,
}

impl Operation {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Create => "A00",
            Self::Cancel => "AN0",
            Self::Query => "C00",
        }
    }
}

/// Taxpayer on whose behalf a request is made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Taxpayer {
    pub nif: String,
    pub name: String,
    /// Fiscal year of the invoices concerned.
    pub year: i32,
}

impl Taxpayer {
    pub fn new(issuer: &Issuer, year: i32) -> Self {
        Self {
            nif: issuer.nif.clone(),
            name: issuer.name.clone(),
            year,
        }
    }
}

/// A request ready to send: JSON for the `eus-bizkaia-n3-data` header and
/// the gzipped XML body.
#[derive(Debug, Clone)]
pub struct LroeRequest {
    pub header: String,
    pub payload: Vec<u8>,
}

#[derive(Debug, Serialize)]
struct N3Header<'a> {
    con: &'static str,
    apa: &'static str,
    inte: N3Party<'a>,
    drs: N3Data,
}

#[derive(Debug, Serialize)]
struct N3Party<'a> {
    nif: &'a str,
    nrs: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    ap1: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ap2: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct N3Data {
    mode: &'static str,
    ejer: String,
}

/// JSON value of the `eus-bizkaia-n3-data` header.
pub fn n3_header(taxpayer: &Taxpayer) -> Result<String, GatewayError> {
    let head = N3Header {
        con: CONCEPT,
        apa: SUBCHAPTER,
        inte: N3Party {
            nif: &taxpayer.nif,
            nrs: &taxpayer.name,
            ap1: None,
            ap2: None,
        },
        drs: N3Data {
            mode: MODEL,
            ejer: taxpayer.year.to_string(),
        },
    };
    serde_json::to_string(&head).map_err(GatewayError::encoding)
}

/// Upload of one signed TicketBAI document.
pub fn create_request(taxpayer: &Taxpayer, doc: &[u8]) -> Result<LroeRequest, GatewayError> {
    let body = envelope(
        "lrpjfecsgap:LROEPJ240FacturasEmitidasConSGAltaPeticion",
        ("xmlns:lrpjfecsgap", SCHEMA_CREATE),
        Operation::Create,
        taxpayer,
        |w| {
            w.start_element("FacturasEmitidas")?;
            w.start_element("FacturaEmitida")?;
            w.text_element("TicketBai", &STANDARD.encode(doc))?;
            w.end_element("FacturaEmitida")?;
            w.end_element("FacturasEmitidas")?;
            Ok(())
        },
    )?;
    finish(taxpayer, &body)
}

/// Cancellation of one signed document.
pub fn cancel_request(taxpayer: &Taxpayer, doc: &[u8]) -> Result<LroeRequest, GatewayError> {
    let body = envelope(
        "lrpjfecsgap:LROEPJ240FacturasEmitidasConSGAnulacionPeticion",
        ("xmlns:lrpjfecsgap", SCHEMA_CANCEL),
        Operation::Cancel,
        taxpayer,
        |w| {
            w.start_element("FacturasEmitidas")?;
            w.start_element("FacturaEmitida")?;
            w.text_element("AnulacionTicketBai", &STANDARD.encode(doc))?;
            w.end_element("FacturaEmitida")?;
            w.end_element("FacturasEmitidas")?;
            Ok(())
        },
    )?;
    finish(taxpayer, &body)
}

/// Query of issued documents, one page at a time.
pub fn fetch_request(
    taxpayer: &Taxpayer,
    page: u32,
    head: Option<&HeadFilter>,
) -> Result<LroeRequest, GatewayError> {
    let body = envelope(
        "lrpjfecsgcp:LROEPJ240FacturasEmitidasConSGConsultaPeticion",
        ("xmlns:lrpjfecsgcp", SCHEMA_QUERY),
        Operation::Query,
        taxpayer,
        |w| {
            w.start_element("FiltroConsultaFacturasEmitidasConSG")?;
            if let Some(head) = head {
                w.start_element("CabeceraFactura")?;
                w.text_element_opt("SerieFactura", &head.series)?;
                w.text_element_opt("NumFactura", &head.code)?;
                w.start_element("FechaExpedicionFactura")?;
                w.text_element_opt("Desde", &head.issue_date)?;
                w.text_element_opt("Hasta", &head.issue_date)?;
                w.end_element("FechaExpedicionFactura")?;
                w.end_element("CabeceraFactura")?;
            }
            w.text_element("NumPaginaConsulta", &page.to_string())?;
            w.end_element("FiltroConsultaFacturasEmitidasConSG")?;
            Ok(())
        },
    )?;
    finish(taxpayer, &body)
}

/// Render an envelope without XML declaration.
fn envelope(
    root: &str,
    namespace: (&str, &str),
    op: Operation,
    taxpayer: &Taxpayer,
    content: impl FnOnce(&mut XmlWriter) -> Result<(), TbaiError>,
) -> Result<Vec<u8>, GatewayError> {
    let render = || -> Result<Vec<u8>, TbaiError> {
        let mut w = XmlWriter::new(Layout::Canonical)?;
        w.start_element_with_attrs(root, &[namespace])?;
        w.start_element("Cabecera")?;
        w.text_element("Modelo", MODEL)?;
        w.text_element("Capitulo", CHAPTER)?;
        w.text_element("Subcapitulo", SUBCHAPTER)?;
        w.text_element("Operacion", op.code())?;
        w.text_element("Version", VERSION)?;
        w.text_element("Ejercicio", &taxpayer.year.to_string())?;
        w.start_element("ObligadoTributario")?;
        w.text_element("NIF", &taxpayer.nif)?;
        w.text_element("ApellidosNombreRazonSocial", &taxpayer.name)?;
        w.end_element("ObligadoTributario")?;
        w.end_element("Cabecera")?;
        content(&mut w)?;
        w.end_element(root)?;
        Ok(w.into_bytes())
    };
    render().map_err(GatewayError::encoding)
}

fn finish(taxpayer: &Taxpayer, body: &[u8]) -> Result<LroeRequest, GatewayError> {
    Ok(LroeRequest {
        header: n3_header(taxpayer)?,
        payload: gzip(body)?,
    })
}

pub fn gzip(data: &[u8]) -> Result<Vec<u8>, GatewayError> {
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data).map_err(GatewayError::encoding)?;
    enc.finish().map_err(GatewayError::encoding)
}

// Responses

/// Body of a create or cancel response. Only the per-record outcome is of
/// interest.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordsResponse {
    #[serde(rename = "Registros", default)]
    pub records: Records,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Records {
    #[serde(rename = "Registro", default)]
    pub items: Vec<Record>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Record {
    #[serde(rename = "SituacionRegistro", default)]
    pub status: RecordStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordStatus {
    #[serde(rename = "EstadoRegistro", default)]
    pub state: String,
    #[serde(rename = "CodigoErrorRegistro", default)]
    pub error_code: String,
    #[serde(rename = "DescripcionErrorRegistroES", default)]
    pub error_description: String,
}

impl RecordsResponse {
    /// Lenient parse: anything unreadable is treated as an empty response.
    pub fn parse(body: &[u8]) -> Self {
        std::str::from_utf8(body)
            .ok()
            .and_then(|s| quick_xml::de::from_str(s).ok())
            .unwrap_or_default()
    }

    pub fn first_error_code(&self) -> Option<&str> {
        self.records
            .items
            .first()
            .map(|r| r.status.error_code.as_str())
            .filter(|c| !c.is_empty())
    }

    pub fn first_error_description(&self) -> Option<&str> {
        self.records
            .items
            .first()
            .map(|r| r.status.error_description.as_str())
            .filter(|c| !c.is_empty())
    }
}

#[derive(Debug, Default, Deserialize)]
struct QueryResponse {
    #[serde(rename = "FacturasEmitidas", default)]
    invoices: QueryInvoices,
}

#[derive(Debug, Default, Deserialize)]
struct QueryInvoices {
    #[serde(rename = "FacturaEmitida", default)]
    items: Vec<QueryInvoice>,
}

#[derive(Debug, Deserialize)]
struct QueryInvoice {
    #[serde(rename = "TicketBai")]
    doc: FetchedDoc,
}

#[derive(Debug, Deserialize)]
struct FetchedDoc {
    #[serde(rename = "Sujetos")]
    subjects: FetchedSubjects,
    #[serde(rename = "Factura")]
    invoice: FetchedInvoice,
    #[serde(rename = "Signature", default)]
    signature: String,
}

#[derive(Debug, Deserialize)]
struct FetchedSubjects {
    #[serde(rename = "Emisor")]
    issuer: FetchedIssuer,
}

#[derive(Debug, Deserialize)]
struct FetchedIssuer {
    #[serde(rename = "NIF", default)]
    nif: String,
    #[serde(rename = "ApellidosNombreRazonSocial", default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct FetchedInvoice {
    #[serde(rename = "CabeceraFactura")]
    header: FetchedHeader,
    #[serde(rename = "DatosFactura", default)]
    data: FetchedData,
}

#[derive(Debug, Deserialize)]
struct FetchedHeader {
    #[serde(rename = "SerieFactura", default)]
    series: String,
    #[serde(rename = "NumFactura", default)]
    code: String,
    #[serde(rename = "FechaExpedicionFactura", default)]
    issue_date: String,
    #[serde(rename = "HoraExpedicionFactura", default)]
    issue_time: String,
}

#[derive(Debug, Default, Deserialize)]
struct FetchedData {
    #[serde(rename = "ImporteTotalFactura", default)]
    total: String,
}

/// Documents listed in a query response.
pub fn parse_query_response(body: &str) -> Result<Vec<IssuedDocument>, GatewayError> {
    let resp: QueryResponse = quick_xml::de::from_str(body)
        .map_err(|e| GatewayError::encoding(format!("reading query response: {e}")))?;

    Ok(resp
        .invoices
        .items
        .into_iter()
        .map(|item| {
            let d = item.doc;
            IssuedDocument {
                issuer: Issuer {
                    nif: d.subjects.issuer.nif,
                    name: d.subjects.issuer.name,
                },
                series: d.invoice.header.series,
                code: d.invoice.header.code,
                issue_date: d.invoice.header.issue_date,
                issue_time: d.invoice.header.issue_time,
                total: d.invoice.data.total,
                signature: d.signature,
            }
        })
        .collect())
}
