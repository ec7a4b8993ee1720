//! Shared fixtures: a signing stand-in, a scripted signer and an in-memory repository.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal_macros::dec;
use zatca_pos::config::ZatcaConfig;
use zatca_pos::core::*;
use zatca_pos::reporting::{InvoiceRepository, LastReported};
use zatca_pos::signer::{ComplianceRequest, ComplianceResponse, ReportingRequest, ReportingResponse, Signer};
use zatca_pos::ubl;

pub const SIGNING_TIME: &str = "2024-06-15T12:00:00";
pub const PROPERTIES_HASH: &str = "ZGVhZGJlZWZwcm9wZXJ0aWVz";
pub const SIGNATURE_VALUE: &str = "MEUCIQDsignaturevalue==";
pub const CERTIFICATE: &str = "MIID3jCCA4SgAwIBAgITEQAAOAPF90Ajs/xcXwABAAA4AzAKBggqhkjOPQQDAjBi";
pub const CERT_HASH: &str = "ZDMwMmI0MTE1NzVjOTU2NTk4YzVlODhhYmI0ODU2NDUyNTU2YTVhYjhhMDFmN2FjYjk1YTA2OWQ0NjY2MjQ4NQ==";
pub const ISSUER_NAME: &str = "CN=PRZEINVOICESCA4-CA, DC=extgazt, DC=gov, DC=local";
pub const SERIAL_NUMBER: &str = "379112742831380471835263969587287663520528387";
pub const QR: &str = "AQxNYWluIFN0b3JlAg8zOTk5OTk5OTk5MDAwMDM=";

pub fn riyadh_noon_utc() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 15, 9, 0, 0).unwrap()
}

pub fn template_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("zatca/standard_invoice.xml")
}

pub fn config_in(dir: &std::path::Path) -> ZatcaConfig {
    ZatcaConfig {
        template_path: template_path(),
        staging_dir: dir.join("staging"),
        archive_dir: dir.join("archive"),
        ..Default::default()
    }
}

pub fn store() -> Store {
    Store {
        id: "s1".into(),
        name: "Main Store".into(),
        name_in_arabic: "المتجر الرئيسي".into(),
        code: "STORE".into(),
        registration_number: "1010010000".into(),
        vat_no: "399999999900003".into(),
        vat_percent: dec!(15),
        national_address: NationalAddress {
            building_no: "1234".into(),
            street_name: "King Fahd Road".into(),
            street_name_arabic: "طريق الملك فهد".into(),
            district_name: "Olaya".into(),
            city_name: "Riyadh".into(),
            city_name_arabic: "الرياض".into(),
            zipcode: "12211".into(),
            additional_no: "5678".into(),
            ..Default::default()
        },
        zatca: ZatcaCredentials {
            private_key: "key".into(),
            binary_security_token: "compliance-token".into(),
            secret: "compliance-secret".into(),
            production_binary_security_token: "production-token".into(),
            production_secret: "production-secret".into(),
        },
    }
}

pub fn b2b_customer() -> Customer {
    Customer {
        id: "c1".into(),
        name: "Acme Trading".into(),
        vat_no: "300000000000003".into(),
        registration_number: "2020020000".into(),
        national_address: NationalAddress {
            building_no: "4321".into(),
            street_name: "Tahlia Street".into(),
            district_name: "Al Andalus".into(),
            city_name: "Jeddah".into(),
            zipcode: "23326".into(),
            additional_no: "8765".into(),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// E1: two pens, cash, no customer.
pub fn pen_sale(id: &str, icv: u64) -> Invoice {
    let mut inv = Invoice::sale(id, format!("STORE-{}", 100_000 + icv), "s1", riyadh_noon_utc(), icv, dec!(15));
    inv.lines.push(LineItem::new("Pen", dec!(2), "PCE", dec!(10.00)));
    inv.payment_methods.push(PaymentMethod::Cash);
    inv.calculate_totals();
    inv
}

/// E2: three lines summing to 1000.00, discount 50, shipping 25.
pub fn b2b_sale(id: &str, icv: u64) -> Invoice {
    let mut inv = Invoice::sale(id, format!("STORE-{}", 100_000 + icv), "s1", riyadh_noon_utc(), icv, dec!(15));
    inv.customer_id = Some("c1".into());
    inv.lines.push(LineItem::new("Desk", dec!(1), "PCE", dec!(600.00)));
    inv.lines.push(LineItem::new("Chair", dec!(2), "set", dec!(150.00)));
    inv.lines.push(LineItem::new("Cable", dec!(4), "Meter", dec!(25.00)));
    inv.discount = dec!(50.00);
    inv.shipping_handling_fees = dec!(25.00);
    inv.payment_methods.push(PaymentMethod::BankTransfer);
    inv.calculate_totals();
    inv
}

/// E3: return of `original`, all lines.
pub fn return_of(original: &Invoice, id: &str, icv: u64) -> Invoice {
    let date = Utc.with_ymd_and_hms(2024, 6, 20, 9, 0, 0).unwrap();
    let mut ret = Invoice::sales_return(id, format!("STORE-R-{}", 100_000 + icv), original, date, icv);
    ret.lines = original.lines.clone();
    ret.discount = original.discount;
    ret.shipping_handling_fees = original.shipping_handling_fees;
    ret.rounding_amount = dec!(0.01);
    ret.calculate_totals();
    ret
}

/// Sign a draft the way a XAdES signer lays it out, with `digest` as the
/// invoice reference digest.
///
/// The blocks are spliced in without touching the whitespace around them,
/// so the signed invoice canonicalizes like its draft.
pub fn sign_with_digest(draft: &str, digest: &str, signing_time: &str) -> String {
    let root_start = draft.find("<Invoice").expect("root element");
    let root_end = root_start + draft[root_start..].find('>').expect("root start tag end") + 1;
    let supplier = draft.find("<cac:AccountingSupplierParty>").expect("supplier party");

    let extensions = format!(
        r##"<ext:UBLExtensions>
    <ext:UBLExtension>
      <ext:ExtensionURI>urn:oasis:names:specification:ubl:dsig:enveloped:xades</ext:ExtensionURI>
      <ext:ExtensionContent>
        <sig:UBLDocumentSignatures xmlns:sig="urn:oasis:names:specification:ubl:schema:xsd:CommonSignatureComponents-2" xmlns:sac="urn:oasis:names:specification:ubl:schema:xsd:SignatureAggregateComponents-2" xmlns:sbc="urn:oasis:names:specification:ubl:schema:xsd:SignatureBasicComponents-2">
          <sac:SignatureInformation>
            <cbc:ID>urn:oasis:names:specification:ubl:signature:1</cbc:ID>
            <sbc:ReferencedSignatureID>urn:oasis:names:specification:ubl:signature:Invoice</sbc:ReferencedSignatureID>
            <ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#" Id="signature">
              <ds:SignedInfo>
                <ds:CanonicalizationMethod Algorithm="http://www.w3.org/2006/12/xml-c14n11"/>
                <ds:SignatureMethod Algorithm="http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha256"/>
                <ds:Reference Id="invoiceSignedData" URI="">
                  <ds:Transforms>
                    <ds:Transform Algorithm="http://www.w3.org/TR/1999/REC-xpath-19991116">
                      <ds:XPath>not(//ancestor-or-self::ext:UBLExtensions)</ds:XPath>
                    </ds:Transform>
                  </ds:Transforms>
                  <ds:DigestMethod Algorithm="http://www.w3.org/2001/04/xmlenc#sha256"/>
                  <ds:DigestValue>{digest}</ds:DigestValue>
                </ds:Reference>
                <ds:Reference Type="http://www.w3.org/2000/09/xmldsig#SignatureProperties" URI="#xadesSignedProperties">
                  <ds:DigestMethod Algorithm="http://www.w3.org/2001/04/xmlenc#sha256"/>
                  <ds:DigestValue>{PROPERTIES_HASH}</ds:DigestValue>
                </ds:Reference>
              </ds:SignedInfo>
              <ds:SignatureValue>{SIGNATURE_VALUE}</ds:SignatureValue>
              <ds:KeyInfo>
                <ds:X509Data>
                  <ds:X509Certificate>{CERTIFICATE}</ds:X509Certificate>
                </ds:X509Data>
              </ds:KeyInfo>
              <ds:Object>
                <xades:QualifyingProperties xmlns:xades="http://uri.etsi.org/01903/v1.3.2#" Target="signature">
                  <xades:SignedProperties Id="xadesSignedProperties">
                    <xades:SignedSignatureProperties>
                      <xades:SigningTime>{signing_time}</xades:SigningTime>
                      <xades:SigningCertificate>
                        <xades:Cert>
                          <xades:CertDigest>
                            <ds:DigestMethod Algorithm="http://www.w3.org/2001/04/xmlenc#sha256"/>
                            <ds:DigestValue>{CERT_HASH}</ds:DigestValue>
                          </xades:CertDigest>
                          <xades:IssuerSerial>
                            <ds:X509IssuerName>{ISSUER_NAME}</ds:X509IssuerName>
                            <ds:X509SerialNumber>{SERIAL_NUMBER}</ds:X509SerialNumber>
                          </xades:IssuerSerial>
                        </xades:Cert>
                      </xades:SigningCertificate>
                    </xades:SignedSignatureProperties>
                  </xades:SignedProperties>
                </xades:QualifyingProperties>
              </ds:Object>
            </ds:Signature>
          </sac:SignatureInformation>
        </sig:UBLDocumentSignatures>
      </ext:ExtensionContent>
    </ext:UBLExtension>
  </ext:UBLExtensions>"##
    );
    let qr_and_signature = format!(
        r#"<cac:AdditionalDocumentReference>
    <cbc:ID>QR</cbc:ID>
    <cac:Attachment>
      <cbc:EmbeddedDocumentBinaryObject mimeCode="text/plain">{QR}</cbc:EmbeddedDocumentBinaryObject>
    </cac:Attachment>
  </cac:AdditionalDocumentReference><cac:Signature>
    <cbc:ID>urn:oasis:names:specification:ubl:signature:Invoice</cbc:ID>
    <cbc:SignatureMethod>urn:oasis:names:specification:ubl:dsig:enveloped:xades</cbc:SignatureMethod>
  </cac:Signature>"#
    );
    let mut signed = String::with_capacity(draft.len() + extensions.len() + qr_and_signature.len());
    signed.push_str(&draft[..root_end]);
    signed.push_str(&extensions);
    signed.push_str(&draft[root_end..supplier]);
    signed.push_str(&qr_and_signature);
    signed.push_str(&draft[supplier..]);
    signed
}

/// Sign a draft over its canonical hash.
pub fn sign(draft: &str) -> String {
    let digest = ubl::canonical_invoice_hash(draft).expect("draft hashes");
    sign_with_digest(draft, &digest, SIGNING_TIME)
}

/// Signer stand-in: signs drafts in-process, with scripted rejections.
#[derive(Default)]
pub struct FakeSigner {
    compliance_errors: Mutex<VecDeque<ZatcaError>>,
    reporting_errors: Mutex<VecDeque<ZatcaError>>,
    tamper: AtomicBool,
    keep_draft_unsigned: AtomicBool,
    pub compliance_calls: AtomicUsize,
    pub reporting_calls: AtomicUsize,
    pub reporting_requests: Mutex<Vec<ReportingRequest>>,
}

impl FakeSigner {
    pub fn fail_compliance_once(&self, error: ZatcaError) {
        self.compliance_errors.lock().unwrap().push_back(error);
    }

    pub fn fail_reporting_once(&self, error: ZatcaError) {
        self.reporting_errors.lock().unwrap().push_back(error);
    }

    /// Sign the next invoices over a digest that is not theirs.
    pub fn tamper(&self, on: bool) {
        self.tamper.store(on, Ordering::SeqCst);
    }

    /// Accept simplified invoices without writing the signed copy back.
    pub fn keep_draft_unsigned(&self, on: bool) {
        self.keep_draft_unsigned.store(on, Ordering::SeqCst);
    }
}

#[async_trait]
impl Signer for FakeSigner {
    async fn check_compliance(&self, request: ComplianceRequest) -> Result<ComplianceResponse, ZatcaError> {
        self.compliance_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.compliance_errors.lock().unwrap().pop_front() {
            return Err(err);
        }
        let draft = std::fs::read_to_string(&request.xml_file_path).map_err(|e| ZatcaError::Signer(e.to_string()))?;
        ComplianceResponse {
            invoice_hash: ubl::canonical_invoice_hash(&draft)?,
            compliance_passed: true,
            error: String::new(),
        }
        .into_result()
    }

    async fn report(&self, request: ReportingRequest) -> Result<ReportingResponse, ZatcaError> {
        self.reporting_calls.fetch_add(1, Ordering::SeqCst);
        self.reporting_requests.lock().unwrap().push(request.clone());
        if let Some(err) = self.reporting_errors.lock().unwrap().pop_front() {
            return Err(err);
        }
        let draft = std::fs::read_to_string(&request.xml_file_path).map_err(|e| ZatcaError::Signer(e.to_string()))?;
        let hash = ubl::canonical_invoice_hash(&draft)?;
        let digest = if self.tamper.load(Ordering::SeqCst) {
            "dGFtcGVyZWQ=".to_string()
        } else {
            hash.clone()
        };
        let signed = sign_with_digest(&draft, &digest, SIGNING_TIME);

        let cleared_invoice = if request.is_simplified {
            if self.keep_draft_unsigned.load(Ordering::SeqCst) {
                return ReportingResponse {
                    invoice_hash: hash,
                    reporting_passed: true,
                    error: String::new(),
                    cleared_invoice: None,
                    is_simplified: true,
                    traceback: None,
                }
                .into_result();
            }
            std::fs::write(&request.xml_file_path, &signed).map_err(|e| ZatcaError::Signer(e.to_string()))?;
            None
        } else {
            Some(BASE64.encode(&signed))
        };
        ReportingResponse {
            invoice_hash: hash,
            reporting_passed: true,
            error: String::new(),
            cleared_invoice,
            is_simplified: request.is_simplified,
            traceback: None,
        }
        .into_result()
    }
}

/// Repository over in-memory maps.
#[derive(Default)]
pub struct MemoryRepository {
    pub stores: HashMap<String, Store>,
    pub customers: HashMap<String, Customer>,
    /// Latest persisted copy of every invoice, by id.
    pub invoices: Mutex<HashMap<String, Invoice>>,
    pub saves: AtomicUsize,
    pub fail_saves: AtomicBool,
}

impl MemoryRepository {
    pub fn with_defaults() -> Self {
        let mut repo = Self::default();
        repo.stores.insert("s1".into(), store());
        repo.customers.insert("c1".into(), b2b_customer());
        repo
    }

    pub fn saved(&self, id: &str) -> Option<Invoice> {
        self.invoices.lock().unwrap().get(id).cloned()
    }
}

#[async_trait]
impl InvoiceRepository for MemoryRepository {
    async fn find_store_by_id(&self, id: &str) -> Result<Option<Store>, ZatcaError> {
        Ok(self.stores.get(id).cloned())
    }

    async fn find_customer_by_id(&self, id: &str) -> Result<Option<Customer>, ZatcaError> {
        Ok(self.customers.get(id).cloned())
    }

    async fn find_last_reported(&self, store_id: &str) -> Result<Option<LastReported>, ZatcaError> {
        Ok(self
            .invoices
            .lock()
            .unwrap()
            .values()
            .filter(|inv| inv.store_id == store_id && inv.zatca.is_reported())
            .max_by_key(|inv| inv.invoice_count_value)
            .and_then(|inv| {
                Some(LastReported {
                    hash: inv.zatca.hash.clone()?,
                    invoice_count_value: inv.invoice_count_value,
                })
            }))
    }

    async fn save_zatca_state(&self, invoice: &Invoice) -> Result<(), ZatcaError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(ZatcaError::Repository("database is read-only".into()));
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.invoices.lock().unwrap().insert(invoice.id.clone(), invoice.clone());
        Ok(())
    }
}
