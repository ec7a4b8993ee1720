use async_trait::async_trait;

use crate::core::{Customer, Invoice, Store, ZatcaError};

/// The most recent reported invoice of a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastReported {
    /// `hash` of that invoice; the PIH of the next one.
    pub hash: String,
    pub invoice_count_value: u64,
}

/// Persistence seam of the reporting pipeline.
///
/// Lookups that find nothing return `Ok(None)`; `Err` is reserved for
/// storage failures.
#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    async fn find_store_by_id(&self, id: &str) -> Result<Option<Store>, ZatcaError>;

    async fn find_customer_by_id(&self, id: &str) -> Result<Option<Customer>, ZatcaError>;

    /// Hash and ICV of the store's reported invoice with the highest ICV.
    async fn find_last_reported(&self, store_id: &str) -> Result<Option<LastReported>, ZatcaError>;

    /// Whether a return to this customer is a standard (B2B) invoice.
    fn is_b2b(&self, customer: &Customer) -> bool {
        customer.has_vat_number()
    }

    /// Persist `invoice.zatca`.
    async fn save_zatca_state(&self, invoice: &Invoice) -> Result<(), ZatcaError>;
}
