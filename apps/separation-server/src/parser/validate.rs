//! Arithmetic validation of a parsed quotation.
//!
//! Per-item mismatches are fatal (a misparsed numeric column); a document
//! total mismatch may be a legitimate discount and is surfaced as a
//! non-fatal validation record for the seller to confirm or abort.

use rust_decimal::Decimal;
use serde::Serialize;

use super::{ParseError, ParsedItem};

/// One-cent absolute tolerance for all arithmetic checks.
pub const CENT_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Non-fatal document summary attached to the parse preview.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationInfo {
    /// Sum of item totals.
    pub calculated_total: Decimal,
    /// Total printed on the document.
    pub pdf_total: Decimal,
    /// Sum of item quantities.
    pub items_count: u32,
    /// Distinct product codes.
    pub models_count: u32,
    /// Whether the two totals agree (any visible cent of difference is
    /// reported for seller confirmation).
    pub totals_match: bool,
    /// Absolute difference between the totals.
    pub difference: Decimal,
}

/// Enforce `total = quantity × unit_price` for every item.
///
/// # Errors
///
/// Returns [`ParseError::ItemArithmetic`] for the first violating item.
pub fn check_item_arithmetic(items: &[ParsedItem]) -> Result<(), ParseError> {
    for item in items {
        let expected = Decimal::from(item.quantity) * item.unit_price;
        if (item.total_price - expected).abs() > CENT_TOLERANCE {
            return Err(ParseError::ItemArithmetic {
                product_code: item.product_code.clone(),
                expected,
                actual: item.total_price,
            });
        }
    }
    Ok(())
}

/// Build the document-level validation record.
#[must_use]
pub fn document_summary(items: &[ParsedItem], pdf_total: Decimal) -> ValidationInfo {
    let calculated_total: Decimal = items.iter().map(|i| i.total_price).sum();
    let difference = (calculated_total - pdf_total).abs();
    ValidationInfo {
        calculated_total,
        pdf_total,
        items_count: items.iter().map(|i| i.quantity).sum(),
        models_count: items.len() as u32,
        totals_match: difference < CENT_TOLERANCE,
        difference,
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn item(code: &str, quantity: u32, unit: Decimal, total: Decimal) -> ParsedItem {
        ParsedItem {
            product_code: code.to_string(),
            product_reference: "REF".to_string(),
            product_name: "PRODUTO".to_string(),
            quantity,
            unit_price: unit,
            total_price: total,
        }
    }

    #[test]
    fn exact_arithmetic_passes() {
        let items = vec![item("00815", 10, dec!(2.00), dec!(20.00))];
        assert!(check_item_arithmetic(&items).is_ok());
    }

    #[test]
    fn one_cent_off_is_tolerated() {
        let items = vec![item("00815", 10, dec!(2.00), dec!(20.01))];
        assert!(check_item_arithmetic(&items).is_ok());
    }

    #[test]
    fn larger_mismatch_is_fatal() {
        let items = vec![item("00815", 10, dec!(2.00), dec!(25.00))];
        let err = check_item_arithmetic(&items).unwrap_err();
        match err {
            ParseError::ItemArithmetic {
                product_code,
                expected,
                actual,
            } => {
                assert_eq!(product_code, "00815");
                assert_eq!(expected, dec!(20.00));
                assert_eq!(actual, dec!(25.00));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn summary_matches_within_tolerance() {
        let items = vec![
            item("00815", 2, dec!(100.00), dec!(200.00)),
            item("00267", 1, dec!(1050.00), dec!(1050.00)),
        ];
        let info = document_summary(&items, dec!(1250.00));
        assert!(info.totals_match);
        assert_eq!(info.calculated_total, dec!(1250.00));
        assert_eq!(info.items_count, 3);
        assert_eq!(info.models_count, 2);
        assert_eq!(info.difference, dec!(0.00));
    }

    #[test]
    fn summary_reports_discount_difference() {
        let items = vec![item("00815", 1, dec!(1250.01), dec!(1250.01))];
        let info = document_summary(&items, dec!(1250.00));
        assert!(!info.totals_match);
        assert_eq!(info.difference, dec!(0.01));
    }
}
