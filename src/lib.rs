//! # zatca-pos
//!
//! ZATCA (Saudi e-invoicing, "Fatoora") phase-2 core for a multi-store POS
//! back-end: UBL 2.1 drafts for sales and returns, the per-store previous
//! invoice hash (PIH) chain, submission through an external signer, and
//! signature artifacts harvested from cleared invoices.
//!
//! All monetary values use [`rust_decimal::Decimal`], never floating point.
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::{FixedOffset, TimeZone, Utc};
//! use rust_decimal_macros::dec;
//! use zatca_pos::core::*;
//! use zatca_pos::ubl::{self, DraftContext, InvoiceTemplate};
//!
//! let store = Store { id: "s1".into(), name: "Main Store".into(), ..Default::default() };
//! let date = Utc.with_ymd_and_hms(2024, 6, 15, 9, 0, 0).unwrap();
//! let mut invoice = Invoice::sale("1", "STORE-100001", "s1", date, 1, dec!(15));
//! invoice.lines.push(LineItem::new("Pen", dec!(2), "PCE", dec!(10.00)));
//! invoice.calculate_totals();
//!
//! let draft = DraftContext { is_simplified: true, prev_hash: ubl::seed_hash() };
//! let riyadh = FixedOffset::east_opt(3 * 3600).unwrap();
//! let xml = ubl::build_invoice_xml(&invoice, &store, None, &draft, &InvoiceTemplate::default(), riyadh)
//!     .unwrap();
//!
//! assert!(xml.contains(r#"<cbc:InvoiceTypeCode name="0200000">388</cbc:InvoiceTypeCode>"#));
//! assert_eq!(invoice.net_total, dec!(23.00));
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `core` | Invoice types, rounding, unit codes, ZATCA state, configuration |
//! | `ubl` | UBL 2.1 draft generation, PIH hashing, signature extraction |
//! | `signer` | Signer trait and the child-process signer |
//! | `reporting` (default) | Reporting pipeline with per-store locking |
//! | `all` | Everything |

#[cfg(feature = "core")]
pub mod core;

#[cfg(feature = "core")]
pub mod config;

#[cfg(feature = "ubl")]
pub mod ubl;

#[cfg(feature = "signer")]
pub mod signer;

#[cfg(feature = "reporting")]
pub mod reporting;

// Re-export core types at crate root for convenience
#[cfg(feature = "core")]
pub use crate::core::*;
