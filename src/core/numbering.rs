use super::error::ZatcaError;

/// First sequence number handed out to a store, as in `STORE-100001`.
pub const FIRST_SEQUENCE_NUMBER: u64 = 100_001;

/// Store-scoped invoice code and invoice counter (ICV) generator.
///
/// Codes look like `{prefix}-{sequential}` (e.g. "STORE-100001"). The ICV is
/// a separate counter starting at 1: ZATCA requires it to increase by one for
/// every invoice the store reports, sales and returns alike.
#[derive(Debug, Clone)]
pub struct InvoiceSequence {
    prefix: String,
    next_number: u64,
    next_counter: u64,
}

/// One issued code/ICV pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedNumber {
    pub code: String,
    pub invoice_count_value: u64,
}

impl InvoiceSequence {
    /// Create a new sequence for a store with no invoices yet.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next_number: FIRST_SEQUENCE_NUMBER,
            next_counter: 1,
        }
    }

    /// Continue a sequence from the last issued code number and ICV.
    pub fn resume(
        prefix: impl Into<String>,
        last_number: u64,
        last_counter: u64,
    ) -> Result<Self, ZatcaError> {
        if last_number < FIRST_SEQUENCE_NUMBER - 1 {
            return Err(ZatcaError::Config(format!(
                "last invoice number {last_number} is below the first sequence number {FIRST_SEQUENCE_NUMBER}"
            )));
        }
        Ok(Self {
            prefix: prefix.into(),
            next_number: last_number + 1,
            next_counter: last_counter + 1,
        })
    }

    /// Issue the next code and ICV.
    pub fn next_number(&mut self) -> IssuedNumber {
        let issued = self.peek();
        self.next_number += 1;
        self.next_counter += 1;
        issued
    }

    /// Preview the next code and ICV without consuming them.
    pub fn peek(&self) -> IssuedNumber {
        IssuedNumber {
            code: format!("{}-{}", self.prefix, self.next_number),
            invoice_count_value: self.next_counter,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}
