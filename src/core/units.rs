//! UN/ECE Recommendation 20 unit codes for POS product units.
//!
//! Products carry a free-text unit as entered at the till ("Kg", "L", ...).
//! ZATCA expects a Rec 20 code on `cbc:InvoicedQuantity/@unitCode`; anything
//! the table does not know is invoiced as pieces.

/// Unit code used when the free-text unit is not recognised.
pub const DEFAULT_UNIT_CODE: &str = "PCE";

/// Free-text unit → Rec 20 code. Keys are matched exactly.
static UNIT_CODES: &[(&str, &str)] = &[
    ("drum", "DRM"),
    ("Kg", "KGM"),
    ("Meter", "MTR"),
    ("Meters", "MTR"),
    ("Gm", "GRM"),
    ("L", "LTR"),
    ("Mg", "MG"),
    ("set", "SET"),
    ("MMT", "MMT"),
    ("CMT", "CMT"),
];

/// Translate a product's free-text unit into its ZATCA unit code.
pub fn unit_code(unit: &str) -> &'static str {
    let unit = unit.trim();
    UNIT_CODES
        .iter()
        .find(|(text, _)| *text == unit)
        .map(|(_, code)| *code)
        .unwrap_or(DEFAULT_UNIT_CODE)
}

/// Known free-text units, in table order.
pub fn known_units() -> impl Iterator<Item = (&'static str, &'static str)> {
    UNIT_CODES.iter().copied()
}
