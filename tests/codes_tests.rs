#![cfg(feature = "core")]

mod common;

use common::*;
use ticketbai::core::*;
use ticketbai::doc::*;

#[test]
fn crc8_check_value() {
    assert_eq!(checksum("123456789"), 0xF4);
    assert_eq!(checksum(""), 0);
}

#[test]
fn tbai_code_layout() {
    let code = tbai_code("B98602642", "01-02-2022", "TW9ja1NpZ25hdHVyZVZhbHVl00001234");
    assert_eq!(code.len(), TBAI_CODE_LEN);
    assert!(code.starts_with("TBAI-B98602642-010222-TW9ja1NpZ25hd-"));

    let (info, crc) = code.split_at(TBAI_CODE_LEN - 3);
    assert_eq!(crc, format!("{:03}", checksum(info)));
}

#[test]
fn tbai_code_is_deterministic() {
    let a = tbai_code("B98602642", "01-02-2022", "abcdefghijklmnopqrstuvwxyz");
    let b = tbai_code("B98602642", "01-02-2022", "abcdefghijklmnopqrstuvwxyz");
    assert_eq!(a, b);
    let c = tbai_code("B98602642", "02-02-2022", "abcdefghijklmnopqrstuvwxyz");
    assert_ne!(a, c);
}

#[test]
fn signed_document_codes_per_zone() {
    let bases = [
        (Zone::Bizkaia, "https://batuz.eus/QRTBAI/"),
        (Zone::Gipuzkoa, "https://tbai.egoitza.gipuzkoa.eus/qr/"),
        (Zone::Araba, "https://ticketbai.araba.eus/tbai/qrtbai/"),
    ];
    for (zone, base) in bases {
        let doc = signed_document(zone);
        let codes = doc.codes(zone).unwrap();
        assert_eq!(codes.tbai_code.len(), TBAI_CODE_LEN, "{zone}");
        assert!(codes.tbai_code.starts_with("TBAI-B98602642-010222-"));

        let expected = format!(
            "{base}?id={}&s=TEST&nf=SAMPLE-001&i=2178.00",
            codes.tbai_code
        );
        assert!(codes.qr_url.starts_with(&expected), "{}", codes.qr_url);

        let (url, crc) = codes.qr_url.rsplit_once("&cr=").unwrap();
        assert_eq!(crc, format!("{:03}", checksum(url)));
    }
}

#[test]
fn qr_url_encodes_values() {
    let url = qr_url("BI", "TBAI-X", "A B", "1/2&3", "10.00");
    assert!(url.starts_with("https://batuz.eus/QRTBAI/?id=TBAI-X&s=A+B&nf=1%2F2%263&i=10.00&cr="));
}

#[test]
fn qr_url_without_series() {
    let url = qr_url("SS", "TBAI-X", "", "7", "1.00");
    assert!(url.starts_with("https://tbai.egoitza.gipuzkoa.eus/qr/?id=TBAI-X&nf=7&i=1.00&cr="));
    assert!(!url.contains("&s="));
}

#[test]
fn unknown_zone_has_no_qr() {
    assert_eq!(qr_url("MD", "TBAI-X", "A", "1", "1.00"), "");
    assert!(qr_base_url("NA").is_none());
}

#[test]
fn codes_follow_resigning() {
    let mut doc = signed_document(Zone::Bizkaia);
    let before = doc.codes(Zone::Bizkaia).unwrap();
    doc.sign(
        &FakeSigner { seed: "ZGlmZmVyZW50U2lnbmF0dXJl" },
        "doc-2",
        IssuerRole::Supplier,
        Zone::Bizkaia,
        &FixedClock(ts()),
    )
    .unwrap();
    let after = doc.codes(Zone::Bizkaia).unwrap();
    assert_ne!(before.tbai_code, after.tbai_code);
    assert!(after.tbai_code.contains("-ZGlmZmVyZW50U-"));
}
