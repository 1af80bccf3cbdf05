use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};

/// `AED 5M`, `AED 1.25M`, `AED 850K`, `AED 900`.
pub fn format_compact_aed(amount: Decimal) -> String {
    let million = Decimal::from(1_000_000);
    let thousand = Decimal::from(1_000);
    let magnitude = amount.abs();
    let sign = if amount.is_sign_negative() && !amount.is_zero() { "-" } else { "" };

    if magnitude >= million {
        format!("{sign}AED {}M", (magnitude / million).round_dp(2).normalize())
    } else if magnitude >= thousand {
        format!("{sign}AED {}K", (magnitude / thousand).round_dp(1).normalize())
    } else {
        format!("{sign}AED {}", magnitude.round_dp(0).normalize())
    }
}

pub fn format_compact_aed_f64(amount: f64) -> Option<String> {
    Decimal::from_f64(amount).map(format_compact_aed)
}

/// Whole number with thousands separators: `1,250`.
pub fn group_thousands(value: f64) -> String {
    let rounded = Decimal::from_f64(value)
        .map(|amount| amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|amount| amount.to_i64())
        .unwrap_or_default();

    let digits = rounded.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    if rounded < 0 {
        grouped.insert(0, '-');
    }
    grouped
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{format_compact_aed, group_thousands};

    #[test]
    fn compact_amounts_drop_trailing_zeros() {
        assert_eq!(format_compact_aed(Decimal::new(5_000_000, 0)), "AED 5M");
        assert_eq!(format_compact_aed(Decimal::new(1_250_000, 0)), "AED 1.25M");
        assert_eq!(format_compact_aed(Decimal::new(850_000, 0)), "AED 850K");
        assert_eq!(format_compact_aed(Decimal::new(900, 0)), "AED 900");
        assert_eq!(format_compact_aed(Decimal::new(-1_000_000, 0)), "-AED 1M");
    }

    #[test]
    fn groups_thousands() {
        assert_eq!(group_thousands(1_250.4), "1,250");
        assert_eq!(group_thousands(950.0), "950");
        assert_eq!(group_thousands(1_234_567.0), "1,234,567");
    }
}
