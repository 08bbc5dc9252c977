use crc::{CRC_8_SMBUS, Crc};
use url::form_urlencoded;

use super::fingerprint::truncate;
use crate::core::Zone;

/// CRC-8, polynomial 0x07, initial value 0.
const CRC8: Crc<u8> = Crc::<u8>::new(&CRC_8_SMBUS);

/// Length of a well-formed TBAI code.
pub const TBAI_CODE_LEN: usize = 39;

/// Identifiers printed on a signed invoice: the TBAI code for manual lookup
/// and the verification URL encoded as a QR code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Codes {
    pub tbai_code: String,
    /// Empty when the zone has no verification service.
    pub qr_url: String,
}

/// Base verification URL for a zone code.
pub fn qr_base_url(zone_code: &str) -> Option<&'static str> {
    match Zone::from_code(zone_code)? {
        Zone::Bizkaia => Some("https://batuz.eus/QRTBAI/"),
        Zone::Gipuzkoa => Some("https://tbai.egoitza.gipuzkoa.eus/qr/"),
        Zone::Araba => Some("https://ticketbai.araba.eus/tbai/qrtbai/"),
    }
}

pub fn checksum(data: &str) -> u8 {
    CRC8.checksum(data.as_bytes())
}

/// `TBAI-{nif}-{ddmmyy}-{signature[..13]}-{crc}`
///
/// `issue_date` is the document's `dd-mm-yyyy` issue date.
pub fn tbai_code(nif: &str, issue_date: &str, signature: &str) -> String {
    let info = format!(
        "TBAI-{nif}-{}-{}-",
        short_date(issue_date),
        truncate(signature, 13)
    );
    let crc = checksum(&info);
    format!("{info}{crc:03}")
}

/// Verification URL. Empty for an unknown zone code.
pub fn qr_url(zone_code: &str, tbai_code: &str, series: &str, code: &str, total: &str) -> String {
    let Some(base) = qr_base_url(zone_code) else {
        return String::new();
    };

    let mut url = format!("{base}?id={}", encode(tbai_code));
    if !series.is_empty() {
        url.push_str("&s=");
        url.push_str(&encode(series));
    }
    url.push_str("&nf=");
    url.push_str(&encode(code));
    url.push_str("&i=");
    url.push_str(&encode(total));

    let crc = checksum(&url);
    format!("{url}&cr={crc:03}")
}

fn encode(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// `dd-mm-yyyy` to `ddmmyy`.
fn short_date(date: &str) -> String {
    let mut parts = date.splitn(3, '-');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(d), Some(m), Some(y)) => {
            let yy = y.get(y.len().saturating_sub(2)..).unwrap_or(y);
            format!("{d}{m}{yy}")
        }
        _ => date.replace('-', ""),
    }
}
