use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use libxml::parser::{Parser, ParserOptions};
use libxml::tree::Document;
use libxml::tree::c14n::{CanonicalizationMode, CanonicalizationOptions};
use libxml::xpath;
use sha2::{Digest, Sha256};

use super::ubl_ns;
use crate::core::ZatcaError;

/// PIH of an issuer's first invoice: `base64(hex(sha256("0")))`.
pub const INITIAL_PREVIOUS_HASH: &str =
    "NWZlY2ViNjZmZmM4NmYzOGQ5NTI3ODZjNmQ2OTZjNzljMmRiYzIzOWRkNGU5MWI0NjcyOWQ3M2EyN2ZiNTdlOQ==";

/// Subtrees the invoice hash does not cover.
const HASH_EXCLUSIONS: [&str; 3] = [
    "/*//*[local-name()='UBLExtensions']",
    "//*[local-name()='AdditionalDocumentReference'][cbc:ID[normalize-space(text())='QR']]",
    "/*//*[local-name()='Signature']",
];

/// Hash of the ASCII seed `"0"` in ZATCA's published form.
pub fn seed_hash() -> String {
    let hex_digest = hex::encode(Sha256::digest(b"0"));
    BASE64.encode(hex_digest)
}

/// PIH for the next invoice of an issuer.
pub fn previous_hash(last_reported: Option<&str>) -> String {
    match last_reported {
        Some(hash) if !hash.trim().is_empty() => hash.to_string(),
        _ => seed_hash(),
    }
}

/// `base64(sha256(c14n11(invoice)))`.
///
/// The invoice is canonicalized with XML Canonicalization 1.1 (no comments)
/// after unlinking `ext:UBLExtensions`, `cac:Signature` and the `QR`
/// document reference. Whitespace between elements is significant, as in
/// any C14N form, so a signer must not reformat the invoice it signs.
pub fn canonical_invoice_hash(xml: &str) -> Result<String, ZatcaError> {
    let canonical = canonicalize(xml)?;
    Ok(BASE64.encode(Sha256::digest(canonical.as_bytes())))
}

fn hash_err(context: &str, e: impl std::fmt::Debug) -> ZatcaError {
    ZatcaError::Hash(format!("{context}: {e:?}"))
}

fn canonicalize(xml: &str) -> Result<String, ZatcaError> {
    let options = ParserOptions {
        recover: false,
        no_net: true,
        ..Default::default()
    };
    let doc = Parser::default()
        .parse_string_with_options(xml, options)
        .map_err(|e| hash_err("cannot parse invoice", e))?;
    remove_hash_exclusions(&doc)?;

    let options = CanonicalizationOptions {
        mode: CanonicalizationMode::Canonical1_1,
        inclusive_ns_prefixes: vec![],
        with_comments: false,
    };
    doc.canonicalize(options, None)
        .map_err(|e| hash_err("cannot canonicalize invoice", e))
}

fn remove_hash_exclusions(doc: &Document) -> Result<(), ZatcaError> {
    let ctx = xpath::Context::new(doc).map_err(|e| hash_err("XPath context error", e))?;
    ctx.register_namespace("cbc", ubl_ns::CBC)
        .map_err(|e| hash_err("XPath context error", e))?;

    for expr in HASH_EXCLUSIONS {
        let nodes = ctx
            .evaluate(expr)
            .map_err(|e| hash_err("XPath error", e))?
            .get_nodes_as_vec();
        for mut node in nodes {
            node.unlink();
        }
    }
    Ok(())
}
