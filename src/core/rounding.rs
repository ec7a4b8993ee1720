//! Half-away-from-zero rounding on `Decimal`.
//!
//! Amounts never pass through binary floating point, so `1.005` rounds to
//! `1.01` rather than drifting down to `1.00`.

use rust_decimal::{Decimal, RoundingStrategy};

/// Round to `dp` decimal places, ties away from zero.
pub fn round_to(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}

pub fn round2(value: Decimal) -> Decimal {
    round_to(value, 2)
}

pub fn round4(value: Decimal) -> Decimal {
    round_to(value, 4)
}

pub fn round8(value: Decimal) -> Decimal {
    round_to(value, 8)
}

/// Render a monetary amount with exactly two decimals.
pub fn format_amount(value: Decimal) -> String {
    let mut rounded = round2(value);
    rounded.rescale(2);
    rounded.to_string()
}

/// Render a price rounded to `dp` places, keeping at least two decimals and
/// dropping trailing zeros beyond that.
pub fn format_price(value: Decimal, dp: u32) -> String {
    let s = round_to(value, dp).normalize().to_string();
    match s.find('.') {
        Some(dot) => {
            let decimals = s.len() - dot - 1;
            if decimals < 2 {
                format!("{s}{}", "0".repeat(2 - decimals))
            } else {
                s
            }
        }
        None => format!("{s}.00"),
    }
}
