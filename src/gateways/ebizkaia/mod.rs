//! Bizkaia (Batuz) gateway.
//!
//! Requests are LROE envelopes, gzipped and sent as an opaque octet stream,
//! with a JSON metadata block in the `eus-bizkaia-n3-data` header. The
//! outcome comes back in `Eus-Bizkaia-N3-*` response headers.

pub mod lroe;

use async_trait::async_trait;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE, HeaderMap};
use tracing::{debug, info, warn};

use super::{Connection, Environment, FetchQuery, GatewayError, IssuedDocument, decode_header_text};
use crate::doc::{CancelTicketBai, TicketBai};
use lroe::{LroeRequest, RecordsResponse, Taxpayer};

const PRODUCTION_URL: &str = "https://sarrerak.bizkaia.eus";
const SANDBOX_URL: &str = "https://pruesarrerak.bizkaia.eus";

const EXECUTE_PATH: &str = "/N3B4000M/aurkezpena";
const QUERY_PATH: &str = "/N3B4001M/kontsulta";

const N3_VERSION: &str = "eus-bizkaia-n3-version";
const N3_CONTENT_TYPE: &str = "eus-bizkaia-n3-content-type";
const N3_DATA: &str = "eus-bizkaia-n3-data";

const N3_RESPONSE_TYPE: &str = "eus-bizkaia-n3-tipo-respuesta";
const N3_RESPONSE_CODE: &str = "eus-bizkaia-n3-codigo-respuesta";
const N3_RESPONSE_MESSAGE: &str = "eus-bizkaia-n3-mensaje-respuesta";
const N3_REGISTRATION_NUMBER: &str = "eus-bizkaia-n3-numero-registro";

const RESPONSE_INVALID: &str = "Incorrecto";

/// "Error técnico"
pub const CODE_TECHNICAL: &str = "B4_1000004";
/// "El registro no puede existir en el sistema"
pub const CODE_DUPLICATE: &str = "B4_2000003";
/// "Otros, consulte el mensaje recibido"
pub const CODE_OTHER: &str = "N3_0000011";

/// Response codes that point at the server rather than the request.
const SERVER_ERRORS: [&str; 2] = [CODE_TECHNICAL, CODE_OTHER];

/// Outcome headers of a Bizkaia response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct N3Response {
    pub kind: Option<String>,
    pub code: Option<String>,
    /// Already transcoded to UTF-8.
    pub message: Option<String>,
    pub registration_number: Option<String>,
}

impl N3Response {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let text = |name: &str| {
            headers
                .get(name)
                .map(|v| decode_header_text(v.as_bytes()))
                .filter(|s| !s.is_empty())
        };
        Self {
            kind: text(N3_RESPONSE_TYPE),
            code: text(N3_RESPONSE_CODE),
            message: text(N3_RESPONSE_MESSAGE),
            registration_number: text(N3_REGISTRATION_NUMBER),
        }
    }

    pub fn is_invalid(&self) -> bool {
        self.kind.as_deref() == Some(RESPONSE_INVALID)
    }
}

/// Classify a Bizkaia response. `body` is the decompressed response body.
pub fn check_response(status: u16, n3: &N3Response, body: &[u8]) -> Result<(), GatewayError> {
    if status != 200 {
        let code = Some(status.to_string());
        let message = n3.message.clone().unwrap_or_default();
        return Err(if (500..600).contains(&status) {
            GatewayError::Connection { code, message }
        } else {
            GatewayError::Invalid { code, message }
        });
    }

    if !n3.is_invalid() {
        return Ok(());
    }

    let code = n3.code.clone();
    let message = n3.message.clone().unwrap_or_default();

    if code.as_deref().is_some_and(|c| SERVER_ERRORS.contains(&c)) {
        return Err(GatewayError::Connection { code, message });
    }

    let records = RecordsResponse::parse(body);
    if code.as_deref() == Some(CODE_DUPLICATE) || records.first_error_code() == Some(CODE_DUPLICATE) {
        return Err(GatewayError::Duplicate {
            code: Some(CODE_DUPLICATE.to_string()),
            message,
        });
    }

    Err(GatewayError::Invalid {
        code: records.first_error_code().map(String::from).or(code),
        message: records
            .first_error_description()
            .map(String::from)
            .unwrap_or(message),
    })
}

/// Gateway of the Bizkaia provincial tax authority.
#[derive(Debug, Clone)]
pub struct EBizkaia {
    client: reqwest::Client,
    base_url: String,
}

impl EBizkaia {
    pub fn new(env: Environment, client: reqwest::Client) -> Self {
        let base_url = match env {
            Environment::Production => PRODUCTION_URL,
            Environment::Sandbox => SANDBOX_URL,
        };
        Self::with_base_url(base_url, client)
    }

    pub fn with_base_url(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    async fn send(&self, path: &str, req: LroeRequest) -> Result<Vec<u8>, GatewayError> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), path);
        debug!(%url, n3 = %req.header, bytes = req.payload.len(), "sending LROE request");

        let resp = self
            .client
            .post(&url)
            .header(CONTENT_ENCODING, "gzip")
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(N3_CONTENT_TYPE, "application/xml")
            .header(N3_DATA, req.header)
            .header(N3_VERSION, "1.0")
            .body(req.payload)
            .send()
            .await
            .map_err(GatewayError::transport)?;

        let status = resp.status().as_u16();
        let n3 = N3Response::from_headers(resp.headers());
        let body = resp.bytes().await.map_err(GatewayError::transport)?;

        match check_response(status, &n3, &body) {
            Ok(()) => {
                info!(
                    registration = n3.registration_number.as_deref().unwrap_or_default(),
                    "LROE request accepted"
                );
                Ok(body.to_vec())
            }
            Err(e) => {
                warn!(status, code = ?n3.code, error = %e, "LROE request failed");
                Err(e)
            }
        }
    }
}

#[async_trait]
impl Connection for EBizkaia {
    async fn post(&self, doc: &TicketBai) -> Result<(), GatewayError> {
        let year = doc.issue_year().map_err(GatewayError::encoding)?;
        let payload = doc.bytes().map_err(GatewayError::encoding)?;
        let req = lroe::create_request(&Taxpayer::new(doc.issuer(), year), &payload)?;
        self.send(EXECUTE_PATH, req).await.map(|_| ())
    }

    async fn cancel(&self, doc: &CancelTicketBai) -> Result<(), GatewayError> {
        let year = doc.issue_year().map_err(GatewayError::encoding)?;
        let payload = doc.bytes().map_err(GatewayError::encoding)?;
        let req = lroe::cancel_request(&Taxpayer::new(&doc.invoice.issuer, year), &payload)?;
        self.send(EXECUTE_PATH, req).await.map(|_| ())
    }

    async fn fetch(&self, query: &FetchQuery) -> Result<Vec<IssuedDocument>, GatewayError> {
        let taxpayer = Taxpayer {
            nif: query.nif.clone(),
            name: query.name.clone(),
            year: query.year,
        };
        let req = lroe::fetch_request(&taxpayer, query.page, query.head.as_ref())?;
        let body = self.send(QUERY_PATH, req).await?;
        let body = String::from_utf8(body).map_err(GatewayError::encoding)?;
        lroe::parse_query_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invalid(code: &str) -> N3Response {
        N3Response {
            kind: Some(RESPONSE_INVALID.into()),
            code: Some(code.into()),
            message: Some("mensaje".into()),
            registration_number: None,
        }
    }

    #[test]
    fn ok_when_not_invalid() {
        let n3 = N3Response {
            kind: Some("Correcto".into()),
            ..Default::default()
        };
        assert!(check_response(200, &n3, b"").is_ok());
        assert!(check_response(200, &N3Response::default(), b"").is_ok());
    }

    #[test]
    fn server_errors_are_connection() {
        for code in SERVER_ERRORS {
            assert!(matches!(
                check_response(200, &invalid(code), b""),
                Err(GatewayError::Connection { .. })
            ));
        }
    }

    #[test]
    fn duplicate_from_header() {
        assert!(matches!(
            check_response(200, &invalid(CODE_DUPLICATE), b""),
            Err(GatewayError::Duplicate { .. })
        ));
    }

    #[test]
    fn duplicate_from_body() {
        let body = b"<R><Registros><Registro><SituacionRegistro><CodigoErrorRegistro>B4_2000003</CodigoErrorRegistro></SituacionRegistro></Registro></Registros></R>";
        assert!(matches!(
            check_response(200, &invalid("B4_2000002"), body),
            Err(GatewayError::Duplicate { .. })
        ));
    }

    #[test]
    fn other_codes_are_invalid() {
        let body = b"<R><Registros><Registro><SituacionRegistro><CodigoErrorRegistro>B4_2000010</CodigoErrorRegistro><DescripcionErrorRegistroES>NIF incorrecto</DescripcionErrorRegistroES></SituacionRegistro></Registro></Registros></R>";
        match check_response(200, &invalid("B4_2000002"), body).unwrap_err() {
            GatewayError::Invalid { code, message } => {
                assert_eq!(code.as_deref(), Some("B4_2000010"));
                assert_eq!(message, "NIF incorrecto");
            }
            other => panic!("unexpected {other:?}"),
        }

        match check_response(200, &invalid("B4_2000002"), b"").unwrap_err() {
            GatewayError::Invalid { code, message } => {
                assert_eq!(code.as_deref(), Some("B4_2000002"));
                assert_eq!(message, "mensaje");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn http_status() {
        let n3 = N3Response::default();
        assert!(matches!(
            check_response(503, &n3, b""),
            Err(GatewayError::Connection { .. })
        ));
        assert!(matches!(
            check_response(400, &n3, b""),
            Err(GatewayError::Invalid { .. })
        ));
    }

    #[test]
    fn headers_transcoded() {
        let mut headers = HeaderMap::new();
        headers.insert(N3_RESPONSE_TYPE, "Incorrecto".parse().unwrap());
        headers.insert(
            N3_RESPONSE_MESSAGE,
            reqwest::header::HeaderValue::from_bytes(&[0x45, 0x72, 0x72, 0x6F, 0x72, 0x20, 0x74, 0xE9, 0x63, 0x6E, 0x69, 0x63, 0x6F]).unwrap(),
        );
        let n3 = N3Response::from_headers(&headers);
        assert!(n3.is_invalid());
        assert_eq!(n3.message.as_deref(), Some("Error técnico"));
        assert!(n3.code.is_none());
    }
}
