//! # ticketbai
//!
//! TicketBAI compliance for invoices issued in the Basque Country: tax
//! breakdown, document chaining, signing, TBAI code and QR URL, and
//! submission to the Bizkaia, Gipuzkoa and Araba gateways.
//!
//! All monetary values use [`rust_decimal::Decimal`], never floating point.
//! Signing is delegated to a caller-provided [`doc::Signer`].
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::{NaiveDate, TimeZone, Utc};
//! use rust_decimal_macros::dec;
//! use ticketbai::core::*;
//! use ticketbai::doc::*;
//!
//! let invoice = InvoiceBuilder::new("SAMPLE-001", NaiveDate::from_ymd_opt(2022, 2, 1).unwrap())
//!     .series("TEST")
//!     .supplier(PartyBuilder::new("Provide One S.L.").tax_id("ES", "B98602642", Some("BI")).build())
//!     .add_line(LineBuilder::new("Development services", dec!(20), dec!(90)).vat(dec!(21)).build())
//!     .note(NoteKey::General, "Development of the web shop")
//!     .build()
//!     .unwrap();
//!
//! let ts = Utc.with_ymd_and_hms(2022, 2, 1, 10, 0, 0).unwrap();
//! let mut doc = TicketBai::new(&invoice, ts, IssuerRole::Supplier, Zone::Bizkaia, &Formatting::default())
//!     .unwrap();
//! doc.fingerprint(&Software::new("LIC", "12345678A", "My Software", "1.0"), None);
//!
//! assert_eq!(doc.invoice.data.total, dec!(2178));
//! assert!(doc.codes(Zone::Bizkaia).is_none()); // not signed yet
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `core` (default) | Invoice model, zone rules, documents, codes |
//! | `gateways` (default) | HTTP gateways and the [`Client`] pipeline |
//! | `all` | Everything |

#[cfg(feature = "core")]
pub mod core;

#[cfg(feature = "core")]
pub mod doc;

#[cfg(feature = "gateways")]
pub mod gateways;

#[cfg(feature = "gateways")]
mod client;

#[cfg(feature = "gateways")]
pub use client::*;

// Re-export core types at crate root for convenience
#[cfg(feature = "core")]
pub use crate::core::*;
