//! Plain XML-over-HTTP protocol shared by Araba and Gipuzkoa.

use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::GatewayError;
use crate::doc::Locale;

/// Document received and registered.
pub const STATUS_RECEIVED: &str = "00";
/// Document rejected, see the validation results.
pub const STATUS_REJECTED: &str = "01";

/// Response body. The root element name differs between the zones and is
/// not checked.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RestResponse {
    #[serde(rename = "Salida", default)]
    pub output: RestOutput,
}

/// `Salida`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RestOutput {
    #[serde(rename = "IdentificadorTBAI", alias = "IdentificadoTBAI", default)]
    pub id: String,
    #[serde(rename = "FechaRecepcion", default)]
    pub received_at: String,
    #[serde(rename = "Estado", default)]
    pub status: String,
    #[serde(rename = "Descripcion", default)]
    pub description: String,
    /// Description in Basque.
    #[serde(rename = "Azalpena", default)]
    pub description_eu: String,
    #[serde(rename = "ResultadosValidacion", default)]
    pub errors: Vec<RestValidationResult>,
    /// Secure verification code.
    #[serde(rename = "CSV", default)]
    pub csv: String,
}

/// `ResultadosValidacion`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RestValidationResult {
    #[serde(rename = "Codigo", default)]
    pub code: String,
    #[serde(rename = "Descripcion", default)]
    pub description: String,
    #[serde(rename = "Azalpena", default)]
    pub description_eu: String,
}

fn localized(es: &str, eu: &str, locale: Locale) -> String {
    match locale {
        Locale::Eu if !eu.is_empty() => eu.to_string(),
        _ => es.to_string(),
    }
}

/// Interpret an HTTP status and body returned by a REST gateway.
pub fn parse_rest_response(
    status: u16,
    body: &str,
    locale: Locale,
) -> Result<RestResponse, GatewayError> {
    if status != 200 {
        return Err(GatewayError::Invalid {
            code: Some(status.to_string()),
            message: String::new(),
        });
    }

    let resp: RestResponse = quick_xml::de::from_str(body)
        .map_err(|e| GatewayError::encoding(format!("reading response: {e}")))?;

    let out = &resp.output;
    if out.status != STATUS_RECEIVED {
        return Err(match out.errors.first() {
            Some(first) => GatewayError::Invalid {
                code: Some(first.code.clone()).filter(|c| !c.is_empty()),
                message: localized(&first.description, &first.description_eu, locale),
            },
            None => GatewayError::Invalid {
                code: Some(out.status.clone()).filter(|c| !c.is_empty()),
                message: localized(&out.description, &out.description_eu, locale),
            },
        });
    }

    Ok(resp)
}

/// Connection details of one REST gateway.
#[derive(Debug, Clone)]
pub(crate) struct RestConnection {
    pub name: &'static str,
    pub client: reqwest::Client,
    pub base_url: String,
    pub locale: Locale,
}

impl RestConnection {
    pub async fn send(&self, path: &str, payload: Vec<u8>) -> Result<RestResponse, GatewayError> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), path);
        debug!(gateway = self.name, %url, bytes = payload.len(), "posting document");

        let resp = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/xml")
            .body(payload)
            .send()
            .await
            .map_err(GatewayError::transport)?;

        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(GatewayError::transport)?;

        match parse_rest_response(status, &body, self.locale) {
            Ok(out) => {
                info!(
                    gateway = self.name,
                    id = %out.output.id,
                    csv = %out.output.csv,
                    "document accepted"
                );
                Ok(out)
            }
            Err(e) => {
                warn!(gateway = self.name, status, error = %e, "document rejected");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCEPTED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<TicketBaiResponse xmlns="urn:ticketbai:emision">
  <Salida>
    <IdentificadorTBAI>TBAI-B98602642-010222-TW9ja1NpZ25hd-123</IdentificadorTBAI>
    <FechaRecepcion>01-02-2022 10:00:05</FechaRecepcion>
    <Estado>00</Estado>
    <Descripcion>Recibido</Descripcion>
    <Azalpena>Jasota</Azalpena>
    <CSV>ABC123</CSV>
  </Salida>
</TicketBaiResponse>"#;

    const REJECTED: &str = r#"<TicketBaiResponse>
  <Salida>
    <IdentificadoTBAI>TBAI-X</IdentificadoTBAI>
    <Estado>01</Estado>
    <Descripcion>Rechazado</Descripcion>
    <Azalpena>Baztertua</Azalpena>
    <ResultadosValidacion>
      <Codigo>005</Codigo>
      <Descripcion>NIF no identificado</Descripcion>
      <Azalpena>IFZ ez dago identifikatuta</Azalpena>
    </ResultadosValidacion>
    <ResultadosValidacion>
      <Codigo>011</Codigo>
      <Descripcion>Otro</Descripcion>
    </ResultadosValidacion>
  </Salida>
</TicketBaiResponse>"#;

    #[test]
    fn accepted() {
        let resp = parse_rest_response(200, ACCEPTED, Locale::Es).unwrap();
        assert_eq!(resp.output.status, STATUS_RECEIVED);
        assert_eq!(resp.output.csv, "ABC123");
        assert!(resp.output.id.starts_with("TBAI-"));
    }

    #[test]
    fn rejected_reports_first_error() {
        match parse_rest_response(200, REJECTED, Locale::Es).unwrap_err() {
            GatewayError::Invalid { code, message } => {
                assert_eq!(code.as_deref(), Some("005"));
                assert_eq!(message, "NIF no identificado");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rejected_in_basque() {
        let err = parse_rest_response(200, REJECTED, Locale::Eu).unwrap_err();
        assert!(err.to_string().contains("IFZ ez dago identifikatuta"));
    }

    #[test]
    fn rejected_without_details() {
        let body = "<R><Salida><Estado>01</Estado><Descripcion>Error</Descripcion></Salida></R>";
        match parse_rest_response(200, body, Locale::Es).unwrap_err() {
            GatewayError::Invalid { code, message } => {
                assert_eq!(code.as_deref(), Some(STATUS_REJECTED));
                assert_eq!(message, "Error");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn http_status_is_invalid() {
        match parse_rest_response(500, "oops", Locale::Es).unwrap_err() {
            GatewayError::Invalid { code, .. } => assert_eq!(code.as_deref(), Some("500")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn garbage_body() {
        assert!(matches!(
            parse_rest_response(200, "<<<", Locale::Es),
            Err(GatewayError::Encoding(_))
        ));
    }
}
