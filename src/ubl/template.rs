use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::core::ZatcaError;

/// Root element and namespace declarations taken from the UBL skeleton.
///
/// Only the root survives: business fields of the skeleton are always
/// regenerated, but the namespace declarations are copied verbatim so that
/// the draft matches what the signer's XSLT expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceTemplate {
    pub root: String,
    pub namespaces: Vec<(String, String)>,
}

impl InvoiceTemplate {
    pub fn load(path: &Path) -> Result<Self, ZatcaError> {
        let content = std::fs::read_to_string(path).map_err(|e| ZatcaError::TemplateMissing {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::parse(&content).map_err(|reason| ZatcaError::TemplateMissing {
            path: path.to_path_buf(),
            reason,
        })
    }

    pub fn parse(xml: &str) -> Result<Self, String> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);
        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                    let root = std::str::from_utf8(e.name().as_ref())
                        .map_err(|e| format!("root element name is not UTF-8: {e}"))?
                        .to_string();
                    let mut namespaces = Vec::new();
                    for attr in e.attributes() {
                        let attr = attr.map_err(|e| format!("bad root attribute: {e}"))?;
                        let key = std::str::from_utf8(attr.key.as_ref()).unwrap_or("");
                        if key == "xmlns" || key.starts_with("xmlns:") {
                            let value = attr
                                .unescape_value()
                                .map_err(|e| format!("bad namespace value: {e}"))?;
                            namespaces.push((key.to_string(), value.into_owned()));
                        }
                    }
                    return Ok(Self { root, namespaces });
                }
                Ok(Event::Eof) => return Err("template has no root element".into()),
                Err(e) => return Err(format!("XML parse error: {e}")),
                _ => {}
            }
        }
    }

    pub fn root_attrs(&self) -> Vec<(&str, &str)> {
        self.namespaces
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }
}

impl Default for InvoiceTemplate {
    /// The ZATCA standard invoice namespaces.
    fn default() -> Self {
        use super::ubl_ns;
        Self {
            root: "Invoice".into(),
            namespaces: vec![
                ("xmlns".into(), ubl_ns::INVOICE.into()),
                ("xmlns:cac".into(), ubl_ns::CAC.into()),
                ("xmlns:cbc".into(), ubl_ns::CBC.into()),
                ("xmlns:ext".into(), ubl_ns::EXT.into()),
            ],
        }
    }
}
