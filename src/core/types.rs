use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::rounding::round2;
use super::state::ZatcaState;
use super::units::unit_code;

/// Country code used when a national address does not name one.
pub const DEFAULT_COUNTRY_CODE: &str = "SA";

/// Saudi national address with optional Arabic variants.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NationalAddress {
    pub building_no: String,
    pub street_name: String,
    pub street_name_arabic: String,
    pub district_name: String,
    pub district_name_arabic: String,
    pub city_name: String,
    pub city_name_arabic: String,
    pub zipcode: String,
    /// Four-digit additional number (`cbc:PlotIdentification`).
    pub additional_no: String,
    pub country_code: Option<String>,
}

impl NationalAddress {
    /// ISO 3166-1 alpha-2 country code, defaulting to Saudi Arabia.
    pub fn country_code(&self) -> &str {
        match self.country_code.as_deref() {
            Some(code) if !code.trim().is_empty() => code,
            _ => DEFAULT_COUNTRY_CODE,
        }
    }

    pub fn street(&self) -> String {
        bilingual(&self.street_name, &self.street_name_arabic)
    }

    pub fn district(&self) -> String {
        bilingual(&self.district_name, &self.district_name_arabic)
    }

    pub fn city(&self) -> String {
        bilingual(&self.city_name, &self.city_name_arabic)
    }
}

/// Join an English and an Arabic label as `"english | arabic"`.
///
/// Falls back to whichever side is present.
pub fn bilingual(english: &str, arabic: &str) -> String {
    let english = english.trim();
    let arabic = arabic.trim();
    match (english.is_empty(), arabic.is_empty()) {
        (false, false) => format!("{english} | {arabic}"),
        (true, false) => arabic.to_string(),
        _ => english.to_string(),
    }
}

/// Credentials the signer needs to sign and clear an invoice for a store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ZatcaCredentials {
    pub private_key: String,
    /// Compliance CSID token.
    pub binary_security_token: String,
    pub secret: String,
    /// Production CSID token.
    pub production_binary_security_token: String,
    pub production_secret: String,
}

/// The issuer of an invoice.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Store {
    pub id: String,
    pub name: String,
    pub name_in_arabic: String,
    /// Short code used as invoice code prefix (e.g. "STORE").
    pub code: String,
    /// Commercial registration number.
    pub registration_number: String,
    pub vat_no: String,
    pub vat_percent: Decimal,
    pub national_address: NationalAddress,
    pub zatca: ZatcaCredentials,
}

impl Store {
    pub fn legal_name(&self) -> String {
        bilingual(&self.name, &self.name_in_arabic)
    }
}

/// The counterparty of an invoice.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub name_in_arabic: String,
    pub vat_no: String,
    /// Commercial registration number.
    pub registration_number: String,
    pub national_address: NationalAddress,
}

impl Customer {
    pub fn legal_name(&self) -> String {
        bilingual(&self.name, &self.name_in_arabic)
    }

    pub fn has_vat_number(&self) -> bool {
        !self.vat_no.trim().is_empty()
    }
}

/// How a sale was paid. Unknown methods deserialize to `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    DebitCard,
    CreditCard,
    BankCard,
    BankTransfer,
    BankCheque,
    CustomerAccount,
    #[serde(other)]
    Other,
}

impl PaymentMethod {
    /// UNTDID 4461 payment means code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Cash => "10",
            Self::DebitCard => "55",
            Self::CreditCard => "54",
            Self::BankCard => "48",
            Self::BankTransfer => "30",
            Self::BankCheque => "20",
            Self::CustomerAccount | Self::Other => "1",
        }
    }
}

/// Payment means codes for a list of methods; an empty list is invoiced as `1`.
pub fn payment_means_codes(methods: &[PaymentMethod]) -> Vec<&'static str> {
    if methods.is_empty() {
        vec!["1"]
    } else {
        methods.iter().map(PaymentMethod::code).collect()
    }
}

/// A product line on a sale or return.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    pub quantity: Decimal,
    /// Free-text unit as entered at the till.
    #[serde(default)]
    pub unit: String,
    pub unit_price: Decimal,
    #[serde(default)]
    pub unit_discount: Decimal,
    /// Returns only invoice the lines the cashier selected.
    #[serde(default = "default_selected")]
    pub selected: bool,
}

fn default_selected() -> bool {
    true
}

impl LineItem {
    pub fn new(name: impl Into<String>, quantity: Decimal, unit: impl Into<String>, unit_price: Decimal) -> Self {
        Self {
            name: name.into(),
            quantity,
            unit: unit.into(),
            unit_price,
            unit_discount: Decimal::ZERO,
            selected: true,
        }
    }

    pub fn discount(mut self, unit_discount: Decimal) -> Self {
        self.unit_discount = unit_discount;
        self
    }

    pub fn deselected(mut self) -> Self {
        self.selected = false;
        self
    }

    pub fn unit_code(&self) -> &'static str {
        unit_code(&self.unit)
    }

    /// Net price per unit after the unit discount.
    pub fn net_unit_price(&self) -> Decimal {
        self.unit_price - self.unit_discount
    }

    /// `round2((unit_price − unit_discount) · quantity)`.
    pub fn line_extension(&self) -> Decimal {
        round2(self.net_unit_price() * self.quantity)
    }

    /// `round2(line_extension · vat_percent / 100)`.
    pub fn tax(&self, vat_percent: Decimal) -> Decimal {
        round2(self.line_extension() * vat_percent / Decimal::ONE_HUNDRED)
    }

    /// Line amount including VAT (`cbc:RoundingAmount`).
    pub fn rounding_amount(&self, vat_percent: Decimal) -> Decimal {
        self.line_extension() + self.tax(vat_percent)
    }
}

/// The original sale a return refers to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnReference {
    pub order_id: String,
    pub order_code: String,
    /// ICV of the original sale.
    pub original_invoice_count: u64,
    pub order_date: DateTime<Utc>,
}

/// Sale or sales return.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InvoiceKind {
    Sale,
    Return(ReturnReference),
}

impl InvoiceKind {
    pub fn is_return(&self) -> bool {
        matches!(self, Self::Return(_))
    }

    /// UNTDID 1001 type code: 388 (tax invoice) or 383 (debit/credit note for returns).
    pub fn type_code(&self) -> &'static str {
        match self {
            Self::Sale => "388",
            Self::Return(_) => "383",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Sale => "sale",
            Self::Return(_) => "sales_return",
        }
    }
}

/// A tax-relevant POS document: a sale or a sales return.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    /// Store-scoped sequential code, e.g. `STORE-100001`.
    pub code: String,
    pub uuid: Uuid,
    pub kind: InvoiceKind,
    pub store_id: String,
    pub customer_id: Option<String>,
    /// Issue instant; rendered in the configured local zone.
    pub date: DateTime<Utc>,
    /// Invoice counter value (ICV), monotone per store.
    pub invoice_count_value: u64,
    #[serde(default)]
    pub payment_methods: Vec<PaymentMethod>,
    pub lines: Vec<LineItem>,
    #[serde(default)]
    pub discount: Decimal,
    #[serde(default)]
    pub shipping_handling_fees: Decimal,
    pub vat_percent: Decimal,
    /// Sum of line extensions.
    #[serde(default)]
    pub total: Decimal,
    #[serde(default)]
    pub vat_price: Decimal,
    #[serde(default)]
    pub net_total: Decimal,
    #[serde(default)]
    pub rounding_amount: Decimal,
    #[serde(default)]
    pub zatca: ZatcaState,
}

impl Invoice {
    /// New sale with an empty ZATCA state and a fresh UUID.
    pub fn sale(
        id: impl Into<String>,
        code: impl Into<String>,
        store_id: impl Into<String>,
        date: DateTime<Utc>,
        invoice_count_value: u64,
        vat_percent: Decimal,
    ) -> Self {
        Self {
            id: id.into(),
            code: code.into(),
            uuid: Uuid::new_v4(),
            kind: InvoiceKind::Sale,
            store_id: store_id.into(),
            customer_id: None,
            date,
            invoice_count_value,
            payment_methods: Vec::new(),
            lines: Vec::new(),
            discount: Decimal::ZERO,
            shipping_handling_fees: Decimal::ZERO,
            vat_percent,
            total: Decimal::ZERO,
            vat_price: Decimal::ZERO,
            net_total: Decimal::ZERO,
            rounding_amount: Decimal::ZERO,
            zatca: ZatcaState::default(),
        }
    }

    /// New return of `original`, issued by the same store.
    pub fn sales_return(
        id: impl Into<String>,
        code: impl Into<String>,
        original: &Invoice,
        date: DateTime<Utc>,
        invoice_count_value: u64,
    ) -> Self {
        let mut ret = Self::sale(
            id,
            code,
            original.store_id.clone(),
            date,
            invoice_count_value,
            original.vat_percent,
        );
        ret.kind = InvoiceKind::Return(ReturnReference {
            order_id: original.id.clone(),
            order_code: original.code.clone(),
            original_invoice_count: original.invoice_count_value,
            order_date: original.date,
        });
        ret.customer_id = original.customer_id.clone();
        ret.payment_methods = original.payment_methods.clone();
        ret
    }

    pub fn is_return(&self) -> bool {
        self.kind.is_return()
    }

    /// Lines that appear on the XML: all lines of a sale, selected lines of a return.
    pub fn invoiced_lines(&self) -> impl Iterator<Item = &LineItem> {
        let is_return = self.is_return();
        self.lines.iter().filter(move |l| !is_return || l.selected)
    }

    /// Taxable amount (`TaxExclusiveAmount`).
    pub fn taxable_amount(&self) -> Decimal {
        match self.kind {
            InvoiceKind::Sale => self.net_total - self.vat_price,
            InvoiceKind::Return(_) => (self.net_total - self.rounding_amount) - self.vat_price,
        }
    }

    /// Amount including VAT (`TaxInclusiveAmount`).
    pub fn tax_inclusive_amount(&self) -> Decimal {
        match self.kind {
            InvoiceKind::Sale => self.net_total,
            InvoiceKind::Return(_) => self.net_total - self.rounding_amount,
        }
    }

    /// Recompute `total`, `vat_price` and `net_total` from the lines.
    pub fn calculate_totals(&mut self) {
        self.total = self.invoiced_lines().map(LineItem::line_extension).sum();
        let taxable = self.total - self.discount + self.shipping_handling_fees;
        self.vat_price = round2(taxable * self.vat_percent / Decimal::ONE_HUNDRED);
        self.net_total = taxable + self.vat_price + self.rounding_amount;
    }
}
