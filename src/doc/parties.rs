use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::xml_utils::XmlWriter;
use crate::core::{Address, IdentityKind, Party, TbaiError};

/// ID type for a foreign tax code (NIF-IVA).
const ID_TYPE_TAX_CODE: &str = "02";

fn id_type_for(kind: IdentityKind) -> &'static str {
    match kind {
        IdentityKind::Passport => "03",
        IdentityKind::Foreign => "04",
        IdentityKind::Resident => "05",
        IdentityKind::Other => "06",
    }
}

/// Who issued the invoice (`EmitidaPorTercerosODestinatario`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum IssuerRole {
    /// N: issued by the supplier.
    #[default]
    #[serde(rename = "N")]
    Supplier,
    /// D: issued by the customer.
    #[serde(rename = "D")]
    Customer,
    /// T: issued by a third party.
    #[serde(rename = "T")]
    ThirdParty,
}

impl IssuerRole {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Supplier => "N",
            Self::Customer => "D",
            Self::ThirdParty => "T",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "N" => Some(Self::Supplier),
            "D" => Some(Self::Customer),
            "T" => Some(Self::ThirdParty),
            _ => None,
        }
    }
}

impl fmt::Display for IssuerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for IssuerRole {
    type Err = TbaiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_code(s).ok_or_else(|| TbaiError::validation(format!("unknown issuer role '{s}'")))
    }
}

/// `Sujetos`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subjects {
    pub issuer: Issuer,
    /// At most one recipient is ever produced.
    pub recipients: Vec<Recipient>,
    pub role: IssuerRole,
}

/// `Emisor`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issuer {
    pub nif: String,
    pub name: String,
}

/// `IDDestinatario`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub id: RecipientId,
    pub name: String,
    pub postal_code: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipientId {
    /// Spanish NIF.
    Nif(String),
    /// `IDOtro`
    Other {
        country: Option<String>,
        id_type: &'static str,
        id: String,
    },
}

impl Issuer {
    pub fn from_party(party: &Party) -> Self {
        Self {
            nif: party
                .tax_id
                .as_ref()
                .map(|t| t.code.clone())
                .unwrap_or_default(),
            name: party.name.clone(),
        }
    }

    pub(crate) fn write(&self, w: &mut XmlWriter, name: &str) -> Result<(), TbaiError> {
        w.start_element(name)?;
        w.text_element("NIF", &self.nif)?;
        w.text_element("ApellidosNombreRazonSocial", &self.name)?;
        w.end_element(name)?;
        Ok(())
    }
}

impl Recipient {
    /// Build the recipient for a customer. Returns `None` when the customer
    /// has no usable identity, which is treated as a B2C operation.
    pub fn from_party(party: &Party) -> Option<Self> {
        let tax_id = party.tax_id.as_ref();
        let id = if tax_id.is_some_and(|t| t.country == "ES") {
            let code = tax_id.map(|t| t.code.clone()).unwrap_or_default();
            if code.is_empty() {
                return None;
            }
            RecipientId::Nif(code)
        } else {
            other_identity(party)?
        };

        let (postal_code, address) = match party.addresses.first() {
            Some(a) if a.code.as_deref().is_some_and(|c| !c.is_empty()) => {
                (a.code.clone(), Some(format_address(a)))
            }
            _ => (None, None),
        };

        Some(Self {
            id,
            name: party.name.clone(),
            postal_code,
            address,
        })
    }

    fn write(&self, w: &mut XmlWriter) -> Result<(), TbaiError> {
        w.start_element("IDDestinatario")?;
        match &self.id {
            RecipientId::Nif(nif) => {
                w.text_element("NIF", nif)?;
            }
            RecipientId::Other {
                country,
                id_type,
                id,
            } => {
                w.start_element("IDOtro")?;
                if let Some(country) = country {
                    w.text_element_opt("CodigoPais", country)?;
                }
                w.text_element("IDType", id_type)?;
                w.text_element("ID", id)?;
                w.end_element("IDOtro")?;
            }
        }
        w.text_element("ApellidosNombreRazonSocial", &self.name)?;
        if let Some(code) = &self.postal_code {
            w.text_element("CodigoPostal", code)?;
        }
        if let Some(address) = &self.address {
            w.text_element("Direccion", address)?;
        }
        w.end_element("IDDestinatario")?;
        Ok(())
    }
}

fn other_identity(party: &Party) -> Option<RecipientId> {
    let country = party.tax_id.as_ref().map(|t| t.country.clone());

    if let Some(tax_id) = party.tax_id.as_ref().filter(|t| !t.code.is_empty()) {
        return Some(RecipientId::Other {
            country,
            id_type: ID_TYPE_TAX_CODE,
            id: tax_id.code.clone(),
        });
    }

    party.identities.first().map(|identity| RecipientId::Other {
        country,
        id_type: id_type_for(identity.kind),
        id: identity.code.clone(),
    })
}

/// Single-line postal address as expected in `Direccion`.
pub fn format_address(address: &Address) -> String {
    if let Some(po_box) = address.po_box.as_deref().filter(|p| !p.is_empty()) {
        return format!("PO Box / Apdo {po_box}");
    }

    let mut out = format!(
        "{}, {}",
        address.street.as_deref().unwrap_or_default(),
        address.number.as_deref().unwrap_or_default()
    );
    if let Some(block) = address.block.as_deref().filter(|s| !s.is_empty()) {
        out.push_str(", ");
        out.push_str(block);
    }
    if let Some(floor) = address.floor.as_deref().filter(|s| !s.is_empty()) {
        out.push_str(", ");
        out.push_str(floor);
    }
    if let Some(door) = address.door.as_deref().filter(|s| !s.is_empty()) {
        out.push(' ');
        out.push_str(door);
    }
    if let Some(extra) = address.street_extra.as_deref().filter(|s| !s.is_empty()) {
        out.push('\n');
        out.push_str(extra);
    }
    out
}

impl Subjects {
    pub fn new(supplier: &Party, customer: Option<&Party>, role: IssuerRole) -> Self {
        Self {
            issuer: Issuer::from_party(supplier),
            recipients: customer.and_then(Recipient::from_party).into_iter().collect(),
            role,
        }
    }

    pub(crate) fn write(&self, w: &mut XmlWriter) -> Result<(), TbaiError> {
        w.start_element("Sujetos")?;
        self.issuer.write(w, "Emisor")?;
        if !self.recipients.is_empty() {
            w.start_element("Destinatarios")?;
            for r in &self.recipients {
                r.write(w)?;
            }
            w.end_element("Destinatarios")?;
        }
        w.text_element("EmitidaPorTercerosODestinatario", self.role.code())?;
        w.end_element("Sujetos")?;
        Ok(())
    }
}
