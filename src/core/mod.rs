//! Core invoice types, totals, zone rules and TicketBAI preconditions.
//!
//! The [`Invoice`] model is the input to document conversion: it carries the
//! parties, lines, tax combos, tags and notes the Basque authorities need.

mod builder;
mod clock;
mod error;
mod types;
mod validation;
mod zone;

pub use builder::*;
pub use clock::*;
pub use error::*;
pub use types::*;
pub use validation::*;
pub use zone::*;
