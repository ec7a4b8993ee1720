use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors raised while building, submitting, or recording a ZATCA invoice.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ZatcaError {
    /// The issuing store could not be resolved.
    #[error("store lookup failed: {0}")]
    StoreLookup(String),

    /// The customer lookup failed for a reason other than "not found".
    #[error("customer lookup failed: {0}")]
    CustomerLookup(String),

    /// The UBL template file is missing or has no root element.
    #[error("invoice template {} is unusable: {reason}", path.display())]
    TemplateMissing { path: PathBuf, reason: String },

    /// The configured timezone could not be resolved.
    #[error("timezone error: {0}")]
    Timezone(String),

    /// Writing the draft or archive XML failed.
    #[error("XML write error: {0}")]
    XmlWrite(String),

    /// Parsing XML (template or cleared invoice) failed.
    #[error("XML error: {0}")]
    Xml(String),

    /// Computing the canonical invoice hash failed.
    #[error("hash error: {0}")]
    Hash(String),

    /// The signer rejected the invoice at the compliance stage.
    #[error("compliance check failed: {0}")]
    ComplianceCheck(String),

    /// The signer rejected the invoice at the reporting stage.
    #[error("reporting failed: {0}")]
    Reporting(String),

    /// The cleared invoice was signed over a different hash than the one reported.
    #[error("invoice hash mismatch: reported {expected}, signed {actual}")]
    HashMismatch { expected: String, actual: String },

    /// The store already reported an invoice with the same or a higher ICV.
    #[error("invoice counter {icv} of store '{store_id}' is not above the last reported counter {last_reported}")]
    IcvOutOfOrder {
        store_id: String,
        icv: u64,
        last_reported: u64,
    },

    /// The signer process did not answer in time and was killed.
    #[error("signer timed out after {0:?}")]
    Timeout(Duration),

    /// The signer process could not be run or produced no usable response.
    #[error("signer error: {0}")]
    Signer(String),

    /// Configuration could not be loaded or parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// The repository failed to load or persist data.
    #[error("repository error: {0}")]
    Repository(String),
}

impl ZatcaError {
    /// Message recorded on the invoice's ZATCA state when this error fails a stage.
    ///
    /// Business rejections keep the signer's own wording; everything else
    /// uses the display form.
    pub fn failure_message(&self) -> String {
        match self {
            Self::ComplianceCheck(msg) | Self::Reporting(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}
