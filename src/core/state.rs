//! Per-invoice ZATCA reporting state.
//!
//! ```text
//!  Unreported ──compliance ok──▶ CompliancePassed ──reporting ok──▶ Reported
//!      │                              │
//!      └─compliance err─▶ ComplianceFailed   └─reporting err─▶ ReportingFailed
//! ```
//!
//! Failed states stay retryable. The record operations below are the only
//! way the orchestrator mutates this record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reporting progress derived from a [`ZatcaState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportingStatus {
    Unreported,
    ComplianceFailed,
    CompliancePassed,
    ReportingFailed,
    Reported,
}

/// Signature artifacts harvested from a cleared invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureArtifacts {
    /// `ds:Reference[0]/ds:DigestValue`, the hash the invoice was signed as.
    pub reporting_invoice_hash: String,
    /// `ds:Reference[1]/ds:DigestValue`.
    pub xades_signed_properties_hash: String,
    pub ecdsa_signature: String,
    pub x509_digital_certificate: String,
    pub signing_certificate_hash: String,
    pub x509_issuer_name: String,
    pub x509_serial_number: String,
    pub signing_time: DateTime<Utc>,
    /// Base64 TLV payload of the `QR` document reference.
    pub qr_code: String,
}

/// ZATCA sub-record attached to every sale and sales return.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZatcaState {
    pub compliance_passed: bool,
    pub compliance_passed_at: Option<DateTime<Utc>>,
    pub compliance_check_failed_count: u32,
    pub compliance_check_errors: Vec<String>,
    pub compliance_check_last_failed_at: Option<DateTime<Utc>>,
    pub compliance_invoice_hash: Option<String>,

    pub reporting_passed: bool,
    pub reported_at: Option<DateTime<Utc>>,
    pub reporting_failed_count: u32,
    pub reporting_errors: Vec<String>,
    pub reporting_last_failed_at: Option<DateTime<Utc>>,
    pub reporting_invoice_hash: Option<String>,

    pub signing_time: Option<DateTime<Utc>>,
    pub signing_certificate_hash: Option<String>,
    pub x509_issuer_name: Option<String>,
    pub x509_serial_number: Option<String>,
    pub xades_signed_properties_hash: Option<String>,
    pub ecdsa_signature: Option<String>,
    pub x509_digital_certificate: Option<String>,
    pub qr_code: Option<String>,
    pub is_simplified: bool,

    /// PIH the invoice was submitted with.
    pub prev_hash: Option<String>,
    /// Reporting hash of this invoice; the next invoice's PIH.
    pub hash: Option<String>,
}

impl ZatcaState {
    pub fn status(&self) -> ReportingStatus {
        if self.is_reported() {
            ReportingStatus::Reported
        } else if self.reporting_failed_count > 0 {
            ReportingStatus::ReportingFailed
        } else if self.compliance_passed {
            ReportingStatus::CompliancePassed
        } else if self.compliance_check_failed_count > 0 {
            ReportingStatus::ComplianceFailed
        } else {
            ReportingStatus::Unreported
        }
    }

    /// Reported and chained: `reported_at` and `hash` are both set.
    pub fn is_reported(&self) -> bool {
        self.reporting_passed && self.reported_at.is_some() && self.hash.is_some()
    }

    pub fn record_compliance_check_success(&mut self, invoice_hash: &str, now: DateTime<Utc>) {
        self.compliance_passed = true;
        self.compliance_passed_at = Some(now);
        self.compliance_invoice_hash = Some(invoice_hash.to_string());
    }

    pub fn record_compliance_check_failure(&mut self, message: impl Into<String>, now: DateTime<Utc>) {
        self.compliance_check_failed_count += 1;
        self.compliance_check_errors.push(message.into());
        self.compliance_check_last_failed_at = Some(now);
    }

    /// Mark the invoice reported. `invoice_hash` becomes the next PIH.
    pub fn record_reporting_success(&mut self, invoice_hash: &str, now: DateTime<Utc>) {
        self.reporting_passed = true;
        self.reported_at = Some(now);
        self.reporting_invoice_hash = Some(invoice_hash.to_string());
        self.hash = Some(invoice_hash.to_string());
    }

    pub fn record_reporting_failure(&mut self, message: impl Into<String>, now: DateTime<Utc>) {
        self.reporting_failed_count += 1;
        self.reporting_errors.push(message.into());
        self.reporting_last_failed_at = Some(now);
    }

    pub fn apply_artifacts(&mut self, artifacts: SignatureArtifacts) {
        self.signing_time = Some(artifacts.signing_time);
        self.signing_certificate_hash = Some(artifacts.signing_certificate_hash);
        self.x509_issuer_name = Some(artifacts.x509_issuer_name);
        self.x509_serial_number = Some(artifacts.x509_serial_number);
        self.xades_signed_properties_hash = Some(artifacts.xades_signed_properties_hash);
        self.ecdsa_signature = Some(artifacts.ecdsa_signature);
        self.x509_digital_certificate = Some(artifacts.x509_digital_certificate);
        self.qr_code = Some(artifacts.qr_code);
    }
}
