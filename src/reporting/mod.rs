//! # Invoice reporting
//!
//! Drives one invoice through the ZATCA pipeline and records the outcome on
//! its [`ZatcaState`](crate::core::ZatcaState).
//!
//! ```text
//!  lock issuer ─► store/customer ─► ICV check + PIH ─► draft XML
//!                                                          │
//!        ┌─────────────────────────────────────────────────┘
//!        ▼
//!  compliance check ──fail──► record, persist, Err(ComplianceCheck)
//!        │
//!        ▼
//!  report/clear ──fail──► record, persist, Err(Reporting | Timeout | Signer)
//!        │
//!        ▼
//!  extract + verify ──fail──► undo reporting success, persist, Err
//!        │
//!        ▼
//!  apply artifacts, persist, archive, delete draft
//! ```
//!
//! The issuer lock is held from the PIH lookup until the new hash is
//! persisted, so the chain of a store can never fork. An invoice whose ICV
//! is not above the store's last reported ICV is rejected before its draft
//! is written, so PIH order always follows ICV order.

mod locks;
mod repository;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{FixedOffset, Utc};
use tracing::{debug, info, warn};

use crate::config::ZatcaConfig;
use crate::core::*;
use crate::signer::{ComplianceRequest, ReportingRequest, ReportingResponse, Signer};
use crate::ubl::{self, DraftContext};

pub use locks::IssuerLocks;
pub use repository::{InvoiceRepository, LastReported};

/// Result of a successful [`Reporter::report`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    /// The invoice was reported now.
    Reported {
        invoice_hash: String,
        is_simplified: bool,
        archive_path: PathBuf,
    },
    /// The invoice had already been reported; nothing was sent.
    AlreadyReported { invoice_hash: Option<String> },
}

/// Per-invoice result of [`Reporter::report_batch`].
#[derive(Debug)]
pub enum BatchItem {
    Reported { code: String, outcome: ReportOutcome },
    Failed { code: String, error: ZatcaError },
    /// Not submitted because an earlier invoice of the same store failed.
    Skipped { code: String },
}

impl BatchItem {
    pub fn code(&self) -> &str {
        match self {
            Self::Reported { code, .. } | Self::Failed { code, .. } | Self::Skipped { code } => code,
        }
    }

    pub fn is_reported(&self) -> bool {
        matches!(self, Self::Reported { .. })
    }
}

/// Reports invoices through a [`Signer`] and records the outcome through an
/// [`InvoiceRepository`].
pub struct Reporter<R, S> {
    config: ZatcaConfig,
    offset: FixedOffset,
    repository: R,
    signer: S,
    locks: IssuerLocks,
}

impl<R: InvoiceRepository, S: Signer> Reporter<R, S> {
    /// Fails with [`ZatcaError::Timezone`] if the configured zone is unknown.
    pub fn new(config: ZatcaConfig, repository: R, signer: S) -> Result<Self, ZatcaError> {
        let offset = config.utc_offset()?;
        Ok(Self {
            config,
            offset,
            repository,
            signer,
            locks: IssuerLocks::new(),
        })
    }

    pub fn config(&self) -> &ZatcaConfig {
        &self.config
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn signer(&self) -> &S {
        &self.signer
    }

    /// Report one invoice.
    ///
    /// `invoice.zatca` is only replaced once the new state has been
    /// persisted; on a persistence error it keeps its previous value.
    pub async fn report(&self, invoice: &mut Invoice) -> Result<ReportOutcome, ZatcaError> {
        let _issuer = self.locks.lock(&invoice.store_id).await;

        if invoice.zatca.is_reported() {
            info!(code = %invoice.code, store_id = %invoice.store_id, "invoice already reported");
            return Ok(ReportOutcome::AlreadyReported {
                invoice_hash: invoice.zatca.hash.clone(),
            });
        }

        let store = self
            .repository
            .find_store_by_id(&invoice.store_id)
            .await?
            .ok_or_else(|| ZatcaError::StoreLookup(format!("store '{}' not found", invoice.store_id)))?;
        let customer = match invoice.customer_id.as_deref() {
            Some(id) => self.repository.find_customer_by_id(id).await?,
            None => None,
        };
        let is_simplified = self.is_simplified(invoice, customer.as_ref());

        let last = self.repository.find_last_reported(&store.id).await?;
        if let Some(last) = &last {
            if invoice.invoice_count_value <= last.invoice_count_value {
                warn!(
                    code = %invoice.code,
                    store_id = %store.id,
                    icv = invoice.invoice_count_value,
                    last_icv = last.invoice_count_value,
                    "invoice counter is behind the store's chain"
                );
                return Err(ZatcaError::IcvOutOfOrder {
                    store_id: store.id.clone(),
                    icv: invoice.invoice_count_value,
                    last_reported: last.invoice_count_value,
                });
            }
        }
        let prev_hash = ubl::previous_hash(last.as_ref().map(|l| l.hash.as_str()));
        let draft = DraftContext {
            is_simplified,
            prev_hash: prev_hash.clone(),
        };
        let draft_path = ubl::write_draft(invoice, &store, customer.as_ref(), &draft, &self.config)?;

        info!(
            code = %invoice.code,
            store_id = %store.id,
            icv = invoice.invoice_count_value,
            kind = invoice.kind.label(),
            is_simplified,
            "reporting invoice"
        );

        let mut state = invoice.zatca.clone();
        state.is_simplified = is_simplified;
        state.prev_hash = Some(prev_hash);

        if !invoice.is_return() || self.config.compliance_check_returns {
            let request =
                ComplianceRequest::new(self.config.environment, &store, draft_path.clone(), is_simplified);
            match self.signer.check_compliance(request).await {
                Ok(response) => {
                    debug!(code = %invoice.code, "compliance check passed");
                    state.record_compliance_check_success(&response.invoice_hash, Utc::now());
                }
                Err(err) => {
                    warn!(code = %invoice.code, error = %err, "compliance check failed");
                    state.record_compliance_check_failure(err.failure_message(), Utc::now());
                    self.commit(invoice, state).await?;
                    return Err(err);
                }
            }
        }

        let request = ReportingRequest::new(self.config.environment, &store, draft_path.clone(), is_simplified);
        let response = match self.signer.report(request).await {
            Ok(response) => response,
            Err(err) => {
                warn!(code = %invoice.code, error = %err, "reporting failed");
                state.record_reporting_failure(err.failure_message(), Utc::now());
                self.commit(invoice, state).await?;
                return Err(err);
            }
        };

        let before_success = state.clone();
        state.record_reporting_success(&response.invoice_hash, Utc::now());

        let signed = match self.signed_artifacts(invoice, &draft_path, &response) {
            Ok(signed) => signed,
            Err(err) => {
                warn!(code = %invoice.code, error = %err, "signed invoice rejected, rolling back");
                self.commit(invoice, before_success).await?;
                return Err(err);
            }
        };
        let (artifacts, archive_path) = signed;
        state.apply_artifacts(artifacts);
        self.commit(invoice, state).await?;

        if let Err(e) = std::fs::remove_file(&draft_path) {
            warn!(path = %draft_path.display(), error = %e, "cannot delete invoice draft");
        }

        info!(
            code = %invoice.code,
            store_id = %store.id,
            icv = invoice.invoice_count_value,
            hash = %response.invoice_hash,
            "invoice reported"
        );
        Ok(ReportOutcome::Reported {
            invoice_hash: response.invoice_hash,
            is_simplified,
            archive_path,
        })
    }

    /// Report invoices in `(store_id, invoice_count_value)` order.
    ///
    /// After a failure, the remaining invoices of that store are skipped so
    /// the store's ICV order is never broken. Other stores carry on.
    pub async fn report_batch(&self, invoices: &mut [Invoice]) -> Vec<BatchItem> {
        invoices.sort_by(|a, b| {
            (a.store_id.as_str(), a.invoice_count_value).cmp(&(b.store_id.as_str(), b.invoice_count_value))
        });

        let mut failed_stores: HashSet<String> = HashSet::new();
        let mut results = Vec::with_capacity(invoices.len());
        for invoice in invoices.iter_mut() {
            let code = invoice.code.clone();
            if failed_stores.contains(&invoice.store_id) {
                debug!(code = %code, store_id = %invoice.store_id, "skipped after earlier failure");
                results.push(BatchItem::Skipped { code });
                continue;
            }
            match self.report(invoice).await {
                Ok(outcome) => results.push(BatchItem::Reported { code, outcome }),
                Err(error) => {
                    failed_stores.insert(invoice.store_id.clone());
                    results.push(BatchItem::Failed { code, error });
                }
            }
        }

        let reported = results.iter().filter(|r| r.is_reported()).count();
        info!(total = results.len(), reported, failed_stores = failed_stores.len(), "batch reported");
        results
    }

    fn is_simplified(&self, invoice: &Invoice, customer: Option<&Customer>) -> bool {
        match invoice.kind {
            InvoiceKind::Sale => customer.is_none_or(|c| !c.has_vat_number()),
            InvoiceKind::Return(_) => customer.is_none_or(|c| !self.repository.is_b2b(c)),
        }
    }

    /// Read the signed invoice, check it against the reported hash and archive it.
    fn signed_artifacts(
        &self,
        invoice: &Invoice,
        draft_path: &Path,
        response: &ReportingResponse,
    ) -> Result<(SignatureArtifacts, PathBuf), ZatcaError> {
        // Simplified invoices come back signed in place of the draft.
        let xml = match response.cleared_xml()? {
            Some(xml) => xml,
            None => {
                let xml = std::fs::read_to_string(draft_path).map_err(|e| {
                    ZatcaError::Xml(format!("cannot read signed invoice {}: {e}", draft_path.display()))
                })?;
                if !xml.contains("UBLExtensions") {
                    warn!(
                        code = %invoice.code,
                        path = %draft_path.display(),
                        "signer reported the invoice but left the draft unsigned"
                    );
                }
                xml
            }
        };
        let artifacts = ubl::extract_signature_artifacts(&xml, self.offset)?;
        artifacts.verify(&response.invoice_hash)?;
        let archive_path = ubl::archive_cleared_invoice(&self.config, invoice, &xml)?;
        Ok((artifacts, archive_path))
    }

    /// Persist `state`, then make it the invoice's state.
    async fn commit(&self, invoice: &mut Invoice, state: ZatcaState) -> Result<(), ZatcaError> {
        let previous = std::mem::replace(&mut invoice.zatca, state);
        if let Err(err) = self.repository.save_zatca_state(invoice).await {
            warn!(code = %invoice.code, error = %err, "cannot persist ZATCA state");
            invoice.zatca = previous;
            return Err(err);
        }
        Ok(())
    }
}
