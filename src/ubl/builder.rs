use std::path::PathBuf;

use chrono::FixedOffset;
use rust_decimal::Decimal;
use tracing::debug;

use super::template::InvoiceTemplate;
use super::xml_utils::{XmlResult, XmlWriter};
use super::{PROFILE_ID, CURRENCY, RETURN_REASON, SIMPLIFIED_TYPE_NAME, STANDARD_TYPE_NAME};
use crate::config::ZatcaConfig;
use crate::core::rounding::{format_amount, round2, round4, round8};
use crate::core::*;

/// Party name used on simplified invoices without a named customer.
const CASH_CUSTOMER: &str = "Cash Customer";

/// Per-submission inputs that are not part of the invoice record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftContext {
    /// B2C invoice (`InvoiceTypeCode/@name = 0200000`).
    pub is_simplified: bool,
    /// PIH: hash of the issuer's last reported invoice, or the seed.
    pub prev_hash: String,
}

/// Staging path of an invoice draft.
pub fn draft_path(config: &ZatcaConfig, invoice: &Invoice) -> PathBuf {
    let file = match invoice.kind {
        InvoiceKind::Sale => format!("invoice_{}.xml", invoice.code),
        InvoiceKind::Return(_) => format!("return_invoice_{}.xml", invoice.code),
    };
    config.staging_dir.join(file)
}

/// Build the draft, write it to the staging directory and return its absolute path.
pub fn write_draft(
    invoice: &Invoice,
    store: &Store,
    customer: Option<&Customer>,
    draft: &DraftContext,
    config: &ZatcaConfig,
) -> Result<PathBuf, ZatcaError> {
    let template = InvoiceTemplate::load(&config.template_path)?;
    let offset = config.utc_offset()?;
    let xml = build_invoice_xml(invoice, store, customer, draft, &template, offset)?;

    let path = draft_path(config, invoice);
    std::fs::create_dir_all(&config.staging_dir).map_err(|e| {
        ZatcaError::XmlWrite(format!("cannot create {}: {e}", config.staging_dir.display()))
    })?;
    std::fs::write(&path, xml)
        .map_err(|e| ZatcaError::XmlWrite(format!("cannot write {}: {e}", path.display())))?;
    let path = path
        .canonicalize()
        .map_err(|e| ZatcaError::XmlWrite(format!("cannot resolve {}: {e}", path.display())))?;

    debug!(code = %invoice.code, path = %path.display(), "wrote invoice draft");
    Ok(path)
}

/// Generate the ZATCA UBL 2.1 draft of an invoice.
///
/// Dates are rendered in `offset`. The root element and its namespace
/// declarations come from `template`; everything below it is generated.
pub fn build_invoice_xml(
    invoice: &Invoice,
    store: &Store,
    customer: Option<&Customer>,
    draft: &DraftContext,
    template: &InvoiceTemplate,
    offset: FixedOffset,
) -> XmlResult {
    let is_return = invoice.is_return();
    let vat = invoice.vat_percent;
    let issued = invoice.date.with_timezone(&offset);
    let issue_date = issued.format("%Y-%m-%d").to_string();

    let mut w = XmlWriter::new()?;
    w.start_element_with_attrs(&template.root, &template.root_attrs())?;

    w.text_element("cbc:ProfileID", PROFILE_ID)?;
    w.text_element("cbc:ID", &invoice.code)?;
    w.text_element("cbc:UUID", &invoice.uuid.to_string())?;
    w.text_element("cbc:IssueDate", &issue_date)?;
    w.text_element("cbc:IssueTime", &issued.format("%H:%M:%S").to_string())?;

    let type_name = if draft.is_simplified {
        SIMPLIFIED_TYPE_NAME
    } else {
        STANDARD_TYPE_NAME
    };
    w.text_element_with_attrs("cbc:InvoiceTypeCode", invoice.kind.type_code(), &[("name", type_name)])?;
    if is_return {
        w.text_element_with_attrs("cbc:Note", RETURN_REASON, &[("languageID", "en")])?;
    }
    w.text_element("cbc:DocumentCurrencyCode", CURRENCY)?;
    w.text_element("cbc:TaxCurrencyCode", CURRENCY)?;

    if let InvoiceKind::Return(original) = &invoice.kind {
        let original_date = original.order_date.with_timezone(&offset).format("%Y-%m-%d");
        w.start_element("cac:BillingReference")?;
        w.start_element("cac:InvoiceDocumentReference")?;
        w.text_element(
            "cbc:ID",
            &format!(
                "Invoice Number: {}; Invoice Issue Date: {original_date}",
                original.original_invoice_count
            ),
        )?;
        w.end_element("cac:InvoiceDocumentReference")?;
        w.end_element("cac:BillingReference")?;
    }

    // ICV
    w.start_element("cac:AdditionalDocumentReference")?;
    w.text_element("cbc:ID", "ICV")?;
    w.text_element("cbc:UUID", &invoice.invoice_count_value.to_string())?;
    w.end_element("cac:AdditionalDocumentReference")?;
    // PIH
    w.start_element("cac:AdditionalDocumentReference")?;
    w.text_element("cbc:ID", "PIH")?;
    w.start_element("cac:Attachment")?;
    w.text_element_with_attrs(
        "cbc:EmbeddedDocumentBinaryObject",
        &draft.prev_hash,
        &[("mimeCode", "text/plain")],
    )?;
    w.end_element("cac:Attachment")?;
    w.end_element("cac:AdditionalDocumentReference")?;

    write_supplier(&mut w, store)?;
    write_customer(&mut w, invoice, customer, draft.is_simplified)?;

    w.start_element("cac:Delivery")?;
    w.text_element("cbc:ActualDeliveryDate", &issue_date)?;
    w.end_element("cac:Delivery")?;

    for code in payment_means_codes(&invoice.payment_methods) {
        w.start_element("cac:PaymentMeans")?;
        w.text_element("cbc:PaymentMeansCode", code)?;
        if is_return {
            w.text_element("cbc:InstructionNote", RETURN_REASON)?;
        }
        w.end_element("cac:PaymentMeans")?;
    }

    if invoice.discount > Decimal::ZERO {
        write_document_allowance_charge(&mut w, false, None, "discount", invoice.discount, vat)?;
    }
    if invoice.shipping_handling_fees > Decimal::ZERO {
        write_document_allowance_charge(
            &mut w,
            true,
            Some("SAA"),
            "Shipping and handling",
            invoice.shipping_handling_fees,
            vat,
        )?;
    }

    let taxable = invoice.taxable_amount();
    w.start_element("cac:TaxTotal")?;
    w.amount_element("cbc:TaxAmount", invoice.vat_price)?;
    w.end_element("cac:TaxTotal")?;
    w.start_element("cac:TaxTotal")?;
    w.amount_element("cbc:TaxAmount", invoice.vat_price)?;
    w.start_element("cac:TaxSubtotal")?;
    w.amount_element("cbc:TaxableAmount", taxable)?;
    w.amount_element("cbc:TaxAmount", invoice.vat_price)?;
    write_tax_category(&mut w, "cac:TaxCategory", vat)?;
    w.end_element("cac:TaxSubtotal")?;
    w.end_element("cac:TaxTotal")?;

    w.start_element("cac:LegalMonetaryTotal")?;
    w.amount_element("cbc:LineExtensionAmount", invoice.total)?;
    w.amount_element("cbc:TaxExclusiveAmount", taxable)?;
    w.amount_element("cbc:TaxInclusiveAmount", invoice.tax_inclusive_amount())?;
    w.amount_element("cbc:AllowanceTotalAmount", invoice.discount)?;
    w.amount_element("cbc:ChargeTotalAmount", invoice.shipping_handling_fees)?;
    w.amount_element("cbc:PrepaidAmount", Decimal::ZERO)?;
    if is_return {
        w.amount_element("cbc:PayableRoundingAmount", invoice.rounding_amount)?;
    }
    w.amount_element("cbc:PayableAmount", invoice.net_total)?;
    w.end_element("cac:LegalMonetaryTotal")?;

    for (idx, line) in invoice.invoiced_lines().enumerate() {
        write_line(&mut w, idx + 1, line, vat, is_return)?;
    }

    w.end_element(&template.root)?;
    w.into_string()
}

fn write_supplier(w: &mut XmlWriter, store: &Store) -> Result<(), ZatcaError> {
    w.start_element("cac:AccountingSupplierParty")?;
    w.start_element("cac:Party")?;
    write_party_identification(w, "CRN", &store.registration_number)?;
    write_postal_address(w, &store.national_address)?;
    write_party_tax_scheme(w, &store.vat_no)?;
    write_legal_entity(w, &store.legal_name())?;
    w.end_element("cac:Party")?;
    w.end_element("cac:AccountingSupplierParty")?;
    Ok(())
}

fn write_customer(
    w: &mut XmlWriter,
    invoice: &Invoice,
    customer: Option<&Customer>,
    is_simplified: bool,
) -> Result<(), ZatcaError> {
    w.start_element("cac:AccountingCustomerParty")?;
    w.start_element("cac:Party")?;

    let crn = customer.map(|c| c.registration_number.trim()).unwrap_or("");
    if is_simplified || (invoice.is_return() && crn.is_empty()) {
        write_party_identification(w, "OTH", "CASH")?;
    } else {
        write_party_identification(w, "CRN", crn)?;
    }

    let mut name = String::new();
    if let Some(c) = customer {
        write_postal_address(w, &c.national_address)?;
        if c.has_vat_number() {
            write_party_tax_scheme(w, c.vat_no.trim())?;
        }
        name = c.legal_name();
    }
    if name.is_empty() && is_simplified {
        name = CASH_CUSTOMER.to_string();
    }
    write_legal_entity(w, &name)?;

    w.end_element("cac:Party")?;
    w.end_element("cac:AccountingCustomerParty")?;
    Ok(())
}

fn write_party_identification(w: &mut XmlWriter, scheme: &str, id: &str) -> Result<(), ZatcaError> {
    w.start_element("cac:PartyIdentification")?;
    w.text_element_with_attrs("cbc:ID", id, &[("schemeID", scheme)])?;
    w.end_element("cac:PartyIdentification")?;
    Ok(())
}

fn write_postal_address(w: &mut XmlWriter, addr: &NationalAddress) -> Result<(), ZatcaError> {
    w.start_element("cac:PostalAddress")?;
    w.text_element("cbc:StreetName", &addr.street())?;
    w.text_element("cbc:BuildingNumber", &addr.building_no)?;
    w.text_element("cbc:PlotIdentification", &addr.additional_no)?;
    w.text_element("cbc:CitySubdivisionName", &addr.district())?;
    w.text_element("cbc:CityName", &addr.city())?;
    w.text_element("cbc:PostalZone", &addr.zipcode)?;
    w.start_element("cac:Country")?;
    w.text_element("cbc:IdentificationCode", addr.country_code())?;
    w.end_element("cac:Country")?;
    w.end_element("cac:PostalAddress")?;
    Ok(())
}

fn write_party_tax_scheme(w: &mut XmlWriter, vat_no: &str) -> Result<(), ZatcaError> {
    w.start_element("cac:PartyTaxScheme")?;
    w.text_element("cbc:CompanyID", vat_no)?;
    w.start_element("cac:TaxScheme")?;
    w.text_element("cbc:ID", "VAT")?;
    w.end_element("cac:TaxScheme")?;
    w.end_element("cac:PartyTaxScheme")?;
    Ok(())
}

fn write_legal_entity(w: &mut XmlWriter, name: &str) -> Result<(), ZatcaError> {
    w.start_element("cac:PartyLegalEntity")?;
    w.text_element("cbc:RegistrationName", name)?;
    w.end_element("cac:PartyLegalEntity")?;
    Ok(())
}

/// Standard-rated VAT category (`S`) with its percent.
fn write_tax_category(w: &mut XmlWriter, element: &str, vat_percent: Decimal) -> Result<(), ZatcaError> {
    w.start_element(element)?;
    w.text_element_with_attrs("cbc:ID", "S", &[("schemeID", "UN/ECE 5305"), ("schemeAgencyID", "6")])?;
    w.text_element("cbc:Percent", &format_amount(vat_percent))?;
    w.start_element("cac:TaxScheme")?;
    w.text_element_with_attrs("cbc:ID", "VAT", &[("schemeID", "UN/ECE 5153"), ("schemeAgencyID", "6")])?;
    w.end_element("cac:TaxScheme")?;
    w.end_element(element)?;
    Ok(())
}

fn write_document_allowance_charge(
    w: &mut XmlWriter,
    is_charge: bool,
    reason_code: Option<&str>,
    reason: &str,
    amount: Decimal,
    vat_percent: Decimal,
) -> Result<(), ZatcaError> {
    w.start_element("cac:AllowanceCharge")?;
    w.text_element("cbc:ChargeIndicator", if is_charge { "true" } else { "false" })?;
    if let Some(code) = reason_code {
        w.text_element("cbc:AllowanceChargeReasonCode", code)?;
    }
    w.text_element("cbc:AllowanceChargeReason", reason)?;
    w.amount_element("cbc:Amount", amount)?;
    write_tax_category(w, "cac:TaxCategory", vat_percent)?;
    w.end_element("cac:AllowanceCharge")?;
    Ok(())
}

fn write_line(
    w: &mut XmlWriter,
    id: usize,
    line: &LineItem,
    vat_percent: Decimal,
    is_return: bool,
) -> Result<(), ZatcaError> {
    w.start_element("cac:InvoiceLine")?;
    w.text_element("cbc:ID", &id.to_string())?;
    w.quantity_element("cbc:InvoicedQuantity", round2(line.quantity), line.unit_code())?;
    w.amount_element("cbc:LineExtensionAmount", line.line_extension())?;

    w.start_element("cac:TaxTotal")?;
    w.amount_element("cbc:TaxAmount", line.tax(vat_percent))?;
    w.amount_element("cbc:RoundingAmount", line.rounding_amount(vat_percent))?;
    w.end_element("cac:TaxTotal")?;

    w.start_element("cac:Item")?;
    w.text_element("cbc:Name", &line.name)?;
    write_tax_category(w, "cac:ClassifiedTaxCategory", vat_percent)?;
    w.end_element("cac:Item")?;

    // Returns carry 8 decimals on price and discount, sales 4 and 2.
    let (price_dp, discount_dp) = if is_return { (8, 8) } else { (4, 2) };
    let net_price = if is_return {
        round8(line.net_unit_price())
    } else {
        round4(line.net_unit_price())
    };

    w.start_element("cac:Price")?;
    w.price_element("cbc:PriceAmount", net_price, price_dp)?;
    w.quantity_element("cbc:BaseQuantity", Decimal::ONE, line.unit_code())?;
    if line.unit_discount > Decimal::ZERO {
        w.start_element("cac:AllowanceCharge")?;
        w.text_element("cbc:ChargeIndicator", "false")?;
        w.text_element("cbc:AllowanceChargeReason", "discount")?;
        w.price_element("cbc:Amount", line.unit_discount, discount_dp)?;
        w.price_element("cbc:BaseAmount", line.unit_price, price_dp)?;
        w.end_element("cac:AllowanceCharge")?;
    }
    w.end_element("cac:Price")?;

    w.end_element("cac:InvoiceLine")?;
    Ok(())
}
