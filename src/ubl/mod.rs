//! ZATCA UBL 2.1 invoices: draft generation, PIH hash chain, and signature
//! artifact extraction from cleared invoices.
//!
//! # Example
//!
//! ```no_run
//! use zatca_pos::core::*;
//! use zatca_pos::config::ZatcaConfig;
//! use zatca_pos::ubl::{self, DraftContext};
//!
//! let (invoice, store): (Invoice, Store) = todo!();
//! let draft = DraftContext {
//!     is_simplified: true,
//!     prev_hash: ubl::seed_hash(),
//! };
//! let path = ubl::write_draft(&invoice, &store, None, &draft, &ZatcaConfig::default()).unwrap();
//! ```

mod builder;
mod extract;
mod hash;
mod template;
pub(crate) mod xml_utils;

pub use builder::{DraftContext, build_invoice_xml, draft_path, write_draft};
pub use extract::{archive_cleared_invoice, archive_path, extract_signature_artifacts, parse_signing_time};
pub use hash::{INITIAL_PREVIOUS_HASH, canonical_invoice_hash, previous_hash, seed_hash};
pub use template::InvoiceTemplate;

/// `cbc:ProfileID` for ZATCA reporting.
pub const PROFILE_ID: &str = "reporting:1.0";

/// Every amount is invoiced in Saudi riyal.
pub const CURRENCY: &str = "SAR";

/// `InvoiceTypeCode/@name` for B2C (simplified) invoices.
pub const SIMPLIFIED_TYPE_NAME: &str = "0200000";

/// `InvoiceTypeCode/@name` for B2B (standard) invoices.
pub const STANDARD_TYPE_NAME: &str = "0100000";

/// Note and payment instruction carried by every return.
pub const RETURN_REASON: &str = "Return goods or services";

/// UBL 2.1 namespace URIs.
pub mod ubl_ns {
    pub const INVOICE: &str = "urn:oasis:names:specification:ubl:schema:xsd:Invoice-2";
    pub const CAC: &str =
        "urn:oasis:names:specification:ubl:schema:xsd:CommonAggregateComponents-2";
    pub const CBC: &str = "urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2";
    pub const EXT: &str =
        "urn:oasis:names:specification:ubl:schema:xsd:CommonExtensionComponents-2";
}
