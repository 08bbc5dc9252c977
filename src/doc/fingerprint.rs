use serde::{Deserialize, Serialize};

use super::xml_utils::XmlWriter;
use crate::core::{TbaiError, ValidationError};

/// Number of signature characters kept in a chain link.
pub const CHAIN_SIGNATURE_LEN: usize = 100;

/// Identity of the invoicing software, registered with the tax agency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Software {
    /// TicketBAI license number.
    pub license: String,
    /// Tax ID of the developer.
    pub nif: String,
    pub name: String,
    pub version: String,
}

impl Software {
    pub fn new(
        license: impl Into<String>,
        nif: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            license: license.into(),
            nif: nif.into(),
            name: name.into(),
            version: version.into(),
        }
    }

    /// Every field is mandatory in the fingerprint block.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        for (field, value) in [
            ("software.license", &self.license),
            ("software.nif", &self.nif),
            ("software.name", &self.name),
            ("software.version", &self.version),
        ] {
            if value.trim().is_empty() {
                errors.push(ValidationError::new(field, "must not be empty"));
            }
        }
        errors
    }

    fn write(&self, w: &mut XmlWriter) -> Result<(), TbaiError> {
        w.start_element("Software")?;
        w.text_element("LicenciaTBAI", &self.license)?;
        w.start_element("EntidadDesarrolladora")?;
        w.text_element("NIF", &self.nif)?;
        w.end_element("EntidadDesarrolladora")?;
        w.text_element("Nombre", &self.name)?;
        w.text_element("Version", &self.version)?;
        w.end_element("Software")?;
        Ok(())
    }
}

/// What the caller persists between two consecutive documents of the same
/// taxpayer and zone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainData {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub series: String,
    pub code: String,
    /// Issue date as it appears in the document, `dd-mm-yyyy`.
    pub issue_date: String,
    pub signature: String,
}

impl ChainData {
    /// Copy with the signature cut down to the chained length.
    pub fn truncated(&self) -> Self {
        Self {
            signature: truncate(&self.signature, CHAIN_SIGNATURE_LEN).to_string(),
            ..self.clone()
        }
    }
}

/// `HuellaTBAI`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    /// `EncadenamientoFacturaAnterior`; absent for the first document.
    pub previous: Option<ChainData>,
    pub software: Software,
}

impl Fingerprint {
    pub fn new(software: &Software, previous: Option<&ChainData>) -> Self {
        Self {
            previous: previous.map(ChainData::truncated),
            software: software.clone(),
        }
    }

    /// Cancellations carry no chain link.
    pub fn software_only(software: &Software) -> Self {
        Self::new(software, None)
    }

    pub(crate) fn write(&self, w: &mut XmlWriter) -> Result<(), TbaiError> {
        w.start_element("HuellaTBAI")?;
        if let Some(prev) = &self.previous {
            w.start_element("EncadenamientoFacturaAnterior")?;
            w.text_element_opt("SerieFacturaAnterior", &prev.series)?;
            w.text_element("NumFacturaAnterior", &prev.code)?;
            w.text_element("FechaExpedicionFacturaAnterior", &prev.issue_date)?;
            w.text_element("SignatureValueFirmaFacturaAnterior", &prev.signature)?;
            w.end_element("EncadenamientoFacturaAnterior")?;
        }
        self.software.write(w)?;
        w.end_element("HuellaTBAI")?;
        Ok(())
    }
}

/// First `n` characters of `s`.
pub fn truncate(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
