use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use rust_decimal::Decimal;
use std::io::Cursor;

use crate::core::ZatcaError;
use crate::core::rounding::{format_amount, format_price};

use super::CURRENCY;

pub type XmlResult = Result<String, ZatcaError>;

fn xml_io(e: std::io::Error) -> ZatcaError {
    ZatcaError::XmlWrite(format!("XML write error: {e}"))
}

/// Two-space indented UBL writer with an XML declaration.
pub struct XmlWriter {
    writer: Writer<Cursor<Vec<u8>>>,
}

impl XmlWriter {
    pub fn new() -> Result<Self, ZatcaError> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_io)?;
        Ok(Self { writer })
    }

    pub fn into_string(self) -> XmlResult {
        let buf = self.writer.into_inner().into_inner();
        String::from_utf8(buf).map_err(|e| ZatcaError::XmlWrite(format!("XML UTF-8 error: {e}")))
    }

    pub fn start_element(&mut self, name: &str) -> Result<&mut Self, ZatcaError> {
        self.writer
            .write_event(Event::Start(BytesStart::new(name)))
            .map_err(xml_io)?;
        Ok(self)
    }

    pub fn start_element_with_attrs(
        &mut self,
        name: &str,
        attrs: &[(&str, &str)],
    ) -> Result<&mut Self, ZatcaError> {
        let mut elem = BytesStart::new(name);
        for (k, v) in attrs {
            elem.push_attribute((*k, *v));
        }
        self.writer
            .write_event(Event::Start(elem))
            .map_err(xml_io)?;
        Ok(self)
    }

    pub fn end_element(&mut self, name: &str) -> Result<&mut Self, ZatcaError> {
        self.writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(xml_io)?;
        Ok(self)
    }

    pub fn text_element(&mut self, name: &str, text: &str) -> Result<&mut Self, ZatcaError> {
        self.text_element_with_attrs(name, text, &[])
    }

    pub fn text_element_with_attrs(
        &mut self,
        name: &str,
        text: &str,
        attrs: &[(&str, &str)],
    ) -> Result<&mut Self, ZatcaError> {
        self.start_element_with_attrs(name, attrs)?;
        self.writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(xml_io)?;
        self.end_element(name)
    }

    /// Write a SAR amount with exactly two decimals.
    pub fn amount_element(&mut self, name: &str, amount: Decimal) -> Result<&mut Self, ZatcaError> {
        self.text_element_with_attrs(name, &format_amount(amount), &[("currencyID", CURRENCY)])
    }

    /// Write a SAR price rounded to `dp` decimals.
    pub fn price_element(
        &mut self,
        name: &str,
        price: Decimal,
        dp: u32,
    ) -> Result<&mut Self, ZatcaError> {
        self.text_element_with_attrs(name, &format_price(price, dp), &[("currencyID", CURRENCY)])
    }

    /// Write a quantity (two decimals) with unitCode attribute.
    pub fn quantity_element(
        &mut self,
        name: &str,
        qty: Decimal,
        unit: &str,
    ) -> Result<&mut Self, ZatcaError> {
        self.text_element_with_attrs(name, &format_amount(qty), &[("unitCode", unit)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn writes_declaration_and_indents_two_spaces() {
        let mut w = XmlWriter::new().unwrap();
        w.start_element("Invoice").unwrap();
        w.amount_element("cbc:TaxAmount", dec!(3)).unwrap();
        w.end_element("Invoice").unwrap();
        let xml = w.into_string().unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Invoice>"));
        assert!(xml.contains("\n  <cbc:TaxAmount currencyID=\"SAR\">3.00</cbc:TaxAmount>"));
    }

    #[test]
    fn escapes_text() {
        let mut w = XmlWriter::new().unwrap();
        w.text_element("cbc:Name", "Tom & Jerry <Ltd>").unwrap();
        let xml = w.into_string().unwrap();
        assert!(xml.contains("Tom &amp; Jerry &lt;Ltd&gt;"));
    }

    #[test]
    fn quantity_and_price_formats() {
        let mut w = XmlWriter::new().unwrap();
        w.quantity_element("cbc:InvoicedQuantity", dec!(1.5), "KGM").unwrap();
        w.price_element("cbc:PriceAmount", dec!(3.333333333), 8).unwrap();
        let xml = w.into_string().unwrap();
        assert!(xml.contains("<cbc:InvoicedQuantity unitCode=\"KGM\">1.50</cbc:InvoicedQuantity>"));
        assert!(xml.contains("<cbc:PriceAmount currencyID=\"SAR\">3.33333333</cbc:PriceAmount>"));
    }
}
