//! Signing and clearance client.
//!
//! The external signer holds the ZATCA credentials flow: it signs the draft,
//! runs the compliance check and reports (or clears) the invoice. Each call
//! is one request/response exchange of JSON documents; [`ProcessSigner`]
//! runs the configured command per call.

mod process;

use std::path::PathBuf;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use crate::config::Environment;
use crate::core::{Store, ZatcaError};

pub use process::ProcessSigner;

/// Compliance-check request (compliance CSID credentials).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceRequest {
    pub env: Environment,
    pub private_key: String,
    pub binary_security_token: String,
    pub secret: String,
    pub xml_file_path: PathBuf,
    pub is_simplified: bool,
}

impl ComplianceRequest {
    pub fn new(env: Environment, store: &Store, xml_file_path: PathBuf, is_simplified: bool) -> Self {
        Self {
            env,
            private_key: store.zatca.private_key.clone(),
            binary_security_token: store.zatca.binary_security_token.clone(),
            secret: store.zatca.secret.clone(),
            xml_file_path,
            is_simplified,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplianceResponse {
    pub invoice_hash: String,
    pub compliance_passed: bool,
    pub error: String,
}

impl ComplianceResponse {
    /// Turn a rejection carried in the response body into an error.
    pub fn into_result(self) -> Result<Self, ZatcaError> {
        if !self.error.is_empty() {
            return Err(ZatcaError::ComplianceCheck(self.error));
        }
        if !self.compliance_passed {
            return Err(ZatcaError::ComplianceCheck("compliance check not passed".into()));
        }
        Ok(self)
    }
}

/// Reporting/clearance request (production CSID credentials).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportingRequest {
    pub env: Environment,
    pub private_key: String,
    pub production_binary_security_token: String,
    pub production_secret: String,
    pub xml_file_path: PathBuf,
    pub is_simplified: bool,
}

impl ReportingRequest {
    pub fn new(env: Environment, store: &Store, xml_file_path: PathBuf, is_simplified: bool) -> Self {
        Self {
            env,
            private_key: store.zatca.private_key.clone(),
            production_binary_security_token: store.zatca.production_binary_security_token.clone(),
            production_secret: store.zatca.production_secret.clone(),
            xml_file_path,
            is_simplified,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportingResponse {
    pub invoice_hash: String,
    pub reporting_passed: bool,
    pub error: String,
    /// Base64 cleared invoice; standard invoices only.
    pub cleared_invoice: Option<String>,
    pub is_simplified: bool,
    pub traceback: Option<String>,
}

impl ReportingResponse {
    /// Turn a rejection carried in the response body into an error.
    pub fn into_result(self) -> Result<Self, ZatcaError> {
        if !self.error.is_empty() {
            return Err(ZatcaError::Reporting(self.error));
        }
        if !self.reporting_passed {
            return Err(ZatcaError::Reporting("reporting not passed".into()));
        }
        Ok(self)
    }

    /// Decoded cleared invoice, if the response carries one.
    pub fn cleared_xml(&self) -> Result<Option<String>, ZatcaError> {
        let Some(encoded) = self.cleared_invoice.as_deref().filter(|s| !s.is_empty()) else {
            return Ok(None);
        };
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|e| ZatcaError::Xml(format!("cleared invoice is not base64: {e}")))?;
        String::from_utf8(bytes)
            .map(Some)
            .map_err(|e| ZatcaError::Xml(format!("cleared invoice is not UTF-8: {e}")))
    }
}

/// The signing/clearance seam.
///
/// Implementations return `Ok` only for accepted invoices; rejections come
/// back as [`ZatcaError::ComplianceCheck`] or [`ZatcaError::Reporting`].
#[async_trait]
pub trait Signer: Send + Sync {
    async fn check_compliance(&self, request: ComplianceRequest) -> Result<ComplianceResponse, ZatcaError>;

    async fn report(&self, request: ReportingRequest) -> Result<ReportingResponse, ZatcaError>;
}
