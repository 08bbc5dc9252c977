use async_trait::async_trait;

use super::rest::RestConnection;
use super::{Connection, Environment, GatewayError};
use crate::doc::{CancelTicketBai, Locale, TicketBai};

const PRODUCTION_URL: &str = "https://tbai-z.gipuzkoa.eus";
const SANDBOX_URL: &str = "https://tbai-z.prep.gipuzkoa.eus";

const EXECUTE_PATH: &str = "/sarrerak/alta";
const CANCEL_PATH: &str = "/sarrerak/baja";

/// Gateway of the Gipuzkoa (Guipúzcoa) provincial tax authority.
#[derive(Debug, Clone)]
pub struct Gipuzkoa {
    conn: RestConnection,
}

impl Gipuzkoa {
    pub fn new(env: Environment, client: reqwest::Client, locale: Locale) -> Self {
        let base_url = match env {
            Environment::Production => PRODUCTION_URL,
            Environment::Sandbox => SANDBOX_URL,
        };
        Self::with_base_url(base_url, client, locale)
    }

    /// Point at a custom host, e.g. a local mock server.
    pub fn with_base_url(base_url: impl Into<String>, client: reqwest::Client, locale: Locale) -> Self {
        Self {
            conn: RestConnection {
                name: "gipuzkoa",
                client,
                base_url: base_url.into(),
                locale,
            },
        }
    }
}

#[async_trait]
impl Connection for Gipuzkoa {
    async fn post(&self, doc: &TicketBai) -> Result<(), GatewayError> {
        let payload = doc.bytes().map_err(GatewayError::encoding)?;
        self.conn.send(EXECUTE_PATH, payload).await.map(|_| ())
    }

    async fn cancel(&self, doc: &CancelTicketBai) -> Result<(), GatewayError> {
        let payload = doc.bytes().map_err(GatewayError::encoding)?;
        self.conn.send(CANCEL_PATH, payload).await.map(|_| ())
    }
}
