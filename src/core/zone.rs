//! The three Basque provinces and their per-zone rule table.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::TbaiError;

/// A TicketBAI zone: one of the three provincial tax authorities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Zone {
    /// BI: Bizkaia (Vizcaya). Submissions go through the LROE/Batuz gateway.
    #[serde(rename = "BI")]
    Bizkaia,
    /// SS: Gipuzkoa (Guipúzcoa).
    #[serde(rename = "SS")]
    Gipuzkoa,
    /// VI: Araba (Álava).
    #[serde(rename = "VI")]
    Araba,
}

/// Invoice limits that differ between zones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneRules {
    /// Maximum number of invoice lines, if limited.
    pub max_lines: Option<usize>,
    /// A recipient, when present, must carry at least one postal address.
    pub customer_address_required: bool,
    /// Line-level or invoice-level charges are accepted.
    pub charges_allowed: bool,
}

const BIZKAIA_RULES: ZoneRules = ZoneRules {
    max_lines: None,
    customer_address_required: false,
    charges_allowed: false,
};

const SOUTHERN_RULES: ZoneRules = ZoneRules {
    max_lines: Some(1000),
    customer_address_required: true,
    charges_allowed: false,
};

impl Zone {
    pub const ALL: [Zone; 3] = [Zone::Bizkaia, Zone::Gipuzkoa, Zone::Araba];

    /// Two-letter code used in tax identities.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Bizkaia => "BI",
            Self::Gipuzkoa => "SS",
            Self::Araba => "VI",
        }
    }

    /// Parse from the two-letter code.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "BI" => Some(Self::Bizkaia),
            "SS" => Some(Self::Gipuzkoa),
            "VI" => Some(Self::Araba),
            _ => None,
        }
    }

    pub fn rules(&self) -> ZoneRules {
        match self {
            Self::Bizkaia => BIZKAIA_RULES,
            Self::Gipuzkoa | Self::Araba => SOUTHERN_RULES,
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Zone {
    type Err = TbaiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_code(s)
            .ok_or_else(|| TbaiError::validation(format!("zone '{s}' not supported by TicketBAI")))
    }
}
