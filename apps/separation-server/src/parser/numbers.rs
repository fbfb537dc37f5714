//! Brazilian-convention numeric and date parsing.
//!
//! Currency uses `,` as the decimal separator and `.` for thousands; a `R$`
//! prefix and surrounding spaces are tolerated. Dates arrive as `DD/MM/YY`
//! with two-digit years promoted into the 2000s.

use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Parse a Brazilian-formatted currency value.
///
/// `"1.234,56"` → `1234.56`; `"R$ 2.380,00"` → `2380.00`. A dot-only value
/// whose final group is longer than two digits is a thousands separator
/// without cents (`"1.234.567"` → `1234567`).
#[must_use]
pub fn parse_currency(raw: &str) -> Option<Decimal> {
    let value = raw.replace("R$", "");
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    let normalized = if value.contains(',') {
        value.replace('.', "").replace(',', ".")
    } else if value.contains('.') {
        let last_group_len = value.rsplit('.').next().map_or(0, str::len);
        if last_group_len > 2 {
            value.replace('.', "")
        } else {
            value.to_string()
        }
    } else {
        value.to_string()
    };

    normalized.parse::<Decimal>().ok()
}

/// Parse a `DD/MM/YY` (or `DD/MM/YYYY`) date, promoting years below 100 by
/// adding 2000.
#[must_use]
pub fn parse_short_date(raw: &str) -> Option<NaiveDate> {
    let mut parts = raw.trim().splitn(3, '/');
    let day: u32 = parts.next()?.trim().parse().ok()?;
    let month: u32 = parts.next()?.trim().parse().ok()?;
    let mut year: i32 = parts.next()?.trim().parse().ok()?;
    if year < 100 {
        year += 2000;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Parse a positive integer quantity.
#[must_use]
pub fn parse_quantity(raw: &str) -> Option<u32> {
    match raw.trim().parse::<u32>() {
        Ok(q) if q > 0 => Some(q),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use test_case::test_case;

    use super::*;

    #[test_case("1.234,56", dec!(1234.56); "thousands and cents")]
    #[test_case("R$ 2.380,00", dec!(2380.00); "currency prefix")]
    #[test_case("0,99", dec!(0.99); "cents only")]
    #[test_case("1234.56", dec!(1234.56); "american fallback")]
    #[test_case("1.234.567", dec!(1234567); "thousands without cents")]
    #[test_case("15", dec!(15); "plain integer")]
    fn currency_formats(raw: &str, expected: Decimal) {
        assert_eq!(parse_currency(raw), Some(expected));
    }

    #[test]
    fn currency_rejects_garbage() {
        assert_eq!(parse_currency(""), None);
        assert_eq!(parse_currency("R$"), None);
        assert_eq!(parse_currency("abc"), None);
    }

    #[test]
    fn short_date_promotes_two_digit_year() {
        assert_eq!(
            parse_short_date("11/07/25"),
            NaiveDate::from_ymd_opt(2025, 7, 11)
        );
        assert_eq!(
            parse_short_date("12/07/2024"),
            NaiveDate::from_ymd_opt(2024, 7, 12)
        );
    }

    #[test]
    fn short_date_rejects_invalid() {
        assert_eq!(parse_short_date("32/01/25"), None);
        assert_eq!(parse_short_date("12-07-25"), None);
        assert_eq!(parse_short_date(""), None);
    }

    #[test]
    fn quantity_must_be_positive() {
        assert_eq!(parse_quantity("10"), Some(10));
        assert_eq!(parse_quantity("0"), None);
        assert_eq!(parse_quantity("-3"), None);
        assert_eq!(parse_quantity("1,5"), None);
    }
}
