use std::path::PathBuf;

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::debug;

use crate::config::ZatcaConfig;
use crate::core::*;

const SIGNING_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

impl SignatureArtifacts {
    /// Check that the invoice was signed with the hash we recorded.
    pub fn verify(&self, expected_hash: &str) -> Result<(), ZatcaError> {
        if self.reporting_invoice_hash == expected_hash {
            Ok(())
        } else {
            Err(ZatcaError::HashMismatch {
                expected: expected_hash.to_string(),
                actual: self.reporting_invoice_hash.clone(),
            })
        }
    }
}

/// Archive path of a cleared invoice.
pub fn archive_path(config: &ZatcaConfig, invoice: &Invoice) -> PathBuf {
    let dir = match invoice.kind {
        InvoiceKind::Sale => config.archive_dir.join("xml"),
        InvoiceKind::Return(_) => config.archive_dir.join("returns").join("xml"),
    };
    dir.join(format!("{}.xml", invoice.code))
}

/// Write the cleared invoice to the archive and return its path.
pub fn archive_cleared_invoice(
    config: &ZatcaConfig,
    invoice: &Invoice,
    xml: &str,
) -> Result<PathBuf, ZatcaError> {
    let path = archive_path(config, invoice);
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .map_err(|e| ZatcaError::XmlWrite(format!("cannot create {}: {e}", dir.display())))?;
    }
    std::fs::write(&path, xml)
        .map_err(|e| ZatcaError::XmlWrite(format!("cannot write {}: {e}", path.display())))?;
    debug!(code = %invoice.code, path = %path.display(), "archived cleared invoice");
    Ok(path)
}

/// Parse `xades:SigningTime`.
///
/// Signers write local time without an offset; a trailing `Z` or an explicit
/// offset takes precedence over `offset`.
pub fn parse_signing_time(value: &str, offset: FixedOffset) -> Result<DateTime<Utc>, ZatcaError> {
    let value = value.trim();
    let invalid = || ZatcaError::Xml(format!("invalid SigningTime '{value}'"));

    if let Some(utc) = value.strip_suffix('Z') {
        let naive = NaiveDateTime::parse_from_str(utc, SIGNING_TIME_FORMAT).map_err(|_| invalid())?;
        return Ok(Utc.from_utc_datetime(&naive));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, SIGNING_TIME_FORMAT) {
        return offset
            .from_local_datetime(&naive)
            .single()
            .map(|t| t.with_timezone(&Utc))
            .ok_or_else(invalid);
    }
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| invalid())
}

/// Harvest the XAdES signature artifacts and the QR code from a signed invoice.
///
/// Elements are matched by local name since signers differ in the prefixes
/// they bind. The QR code is taken from the first root-level
/// `AdditionalDocumentReference` whose `ID` is `QR`, wherever it appears.
pub fn extract_signature_artifacts(
    xml: &str,
    offset: FixedOffset,
) -> Result<SignatureArtifacts, ZatcaError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut parsed = ParsedSignature::default();
    let mut path: Vec<String> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let name = std::str::from_utf8(e.local_name().as_ref())
                    .unwrap_or("")
                    .to_string();
                if name == "Reference" && path.last().is_some_and(|p| p == "SignedInfo") {
                    parsed.reference_digests.push(String::new());
                }
                if name == "AdditionalDocumentReference" && path.len() == 1 {
                    parsed.current_reference = Some(DocumentReference::default());
                }
                path.push(name);
            }
            Ok(Event::Text(ref e)) => {
                let text = e
                    .unescape()
                    .map_err(|e| ZatcaError::Xml(format!("XML parse error: {e}")))?;
                if !text.is_empty() {
                    parsed.handle_text(&path, &text);
                }
            }
            Ok(Event::End(_)) => {
                let ended = path.pop().unwrap_or_default();
                if ended == "AdditionalDocumentReference" && path.len() == 1 {
                    if let Some(reference) = parsed.current_reference.take() {
                        if parsed.qr_code.is_none() && reference.id == "QR" {
                            parsed.qr_code = Some(reference.payload);
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ZatcaError::Xml(format!("XML parse error: {e}"))),
            _ => {}
        }
    }

    parsed.into_artifacts(offset)
}

#[derive(Default)]
struct DocumentReference {
    id: String,
    payload: String,
}

#[derive(Default)]
struct ParsedSignature {
    reference_digests: Vec<String>,
    signature_value: Option<String>,
    certificate: Option<String>,
    cert_digest: Option<String>,
    issuer_name: Option<String>,
    serial_number: Option<String>,
    signing_time: Option<String>,
    current_reference: Option<DocumentReference>,
    qr_code: Option<String>,
}

fn ends_with(path: &[String], suffix: &[&str]) -> bool {
    path.len() >= suffix.len()
        && path[path.len() - suffix.len()..]
            .iter()
            .zip(suffix)
            .all(|(a, b)| a == b)
}

impl ParsedSignature {
    fn handle_text(&mut self, path: &[String], text: &str) {
        let in_signature = path.iter().any(|p| p == "Signature");

        if in_signature {
            if ends_with(path, &["SignedInfo", "Reference", "DigestValue"]) {
                if let Some(digest) = self.reference_digests.last_mut() {
                    digest.push_str(text);
                }
            } else if ends_with(path, &["Signature", "SignatureValue"]) {
                self.signature_value = Some(text.to_string());
            } else if ends_with(path, &["X509Data", "X509Certificate"]) {
                self.certificate = Some(text.to_string());
            } else if ends_with(path, &["CertDigest", "DigestValue"]) {
                self.cert_digest = Some(text.to_string());
            } else if ends_with(path, &["IssuerSerial", "X509IssuerName"]) {
                self.issuer_name = Some(text.to_string());
            } else if ends_with(path, &["IssuerSerial", "X509SerialNumber"]) {
                self.serial_number = Some(text.to_string());
            } else if ends_with(path, &["SignedSignatureProperties", "SigningTime"]) {
                self.signing_time = Some(text.to_string());
            }
            return;
        }

        if let Some(reference) = self.current_reference.as_mut() {
            match path.get(1..).unwrap_or_default() {
                [adr, id] if adr == "AdditionalDocumentReference" && id == "ID" => {
                    reference.id = text.trim().to_string();
                }
                [adr, att, obj]
                    if adr == "AdditionalDocumentReference"
                        && att == "Attachment"
                        && obj == "EmbeddedDocumentBinaryObject" =>
                {
                    reference.payload = text.to_string();
                }
                _ => {}
            }
        }
    }

    fn into_artifacts(self, offset: FixedOffset) -> Result<SignatureArtifacts, ZatcaError> {
        fn required(value: Option<String>, what: &str) -> Result<String, ZatcaError> {
            value
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ZatcaError::Xml(format!("signed invoice has no {what}")))
        }

        let mut digests = self.reference_digests.into_iter();
        let invoice_hash = required(digests.next(), "invoice digest (Reference[0])")?;
        let properties_hash = required(digests.next(), "signed properties digest (Reference[1])")?;
        let signing_time = required(self.signing_time, "SigningTime")?;

        Ok(SignatureArtifacts {
            reporting_invoice_hash: invoice_hash,
            xades_signed_properties_hash: properties_hash,
            ecdsa_signature: required(self.signature_value, "SignatureValue")?,
            x509_digital_certificate: required(self.certificate, "X509Certificate")?,
            signing_certificate_hash: required(self.cert_digest, "CertDigest")?,
            x509_issuer_name: required(self.issuer_name, "X509IssuerName")?,
            x509_serial_number: required(self.serial_number, "X509SerialNumber")?,
            signing_time: parse_signing_time(&signing_time, offset)?,
            qr_code: required(self.qr_code, "QR document reference")?,
        })
    }
}
