//! Core POS invoice types, rounding, unit codes, and the ZATCA state record.
//!
//! This module has no I/O: everything here is deterministic and usable
//! without the XML, signer, or reporting layers.

mod error;
mod numbering;
pub mod rounding;
mod state;
mod types;
pub mod units;

pub use error::*;
pub use numbering::*;
pub use rounding::{round2, round4, round8};
pub use state::*;
pub use types::*;
pub use units::unit_code;
