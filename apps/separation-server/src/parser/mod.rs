//! Quotation PDF parser.
//!
//! A forgiving, pattern-layered pipeline that turns Brazilian-Portuguese
//! quotation PDFs into a validated structured order:
//!
//! ```text
//! bytes → extractor → normalize → sieve → {fields, items} → validate
//! ```
//!
//! The regex layer is intentional: the patterns have accreted against real
//! PDFs (page artifacts, line wrap, per-library quirks) and a hand-written
//! grammar would lose those adjustments. Keep the ranked lists; extend them,
//! don't rewrite them.

pub mod extractor;
pub mod fields;
pub mod items;
pub mod normalize;
pub mod numbers;
pub mod sieve;
pub mod validate;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use validate::ValidationInfo;

/// Parse failure taxonomy. Everything here is recoverable and reported to
/// the caller; nothing creates an order.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Not a PDF, or over the size limit.
    #[error("invalid file: {0}")]
    InvalidFile(String),

    /// Both extraction backends produced no text.
    #[error("could not extract any text from the document")]
    ExtractionEmpty,

    /// A required header field matched no pattern.
    #[error("no pattern matched required field '{0}'")]
    PatternMiss(&'static str),

    /// An item total disagrees with quantity × unit price.
    #[error("item {product_code}: total {actual} does not match quantity × unit price {expected}")]
    ItemArithmetic {
        /// Code of the offending item.
        product_code: String,
        /// Quantity × unit price.
        expected: Decimal,
        /// Total printed on the line.
        actual: Decimal,
    },
}

impl ParseError {
    /// Stable machine-readable code for REST payloads.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidFile(_) => "INVALID_FILE",
            Self::ExtractionEmpty => "EXTRACTION_EMPTY",
            Self::PatternMiss(_) => "PATTERN_MISS",
            Self::ItemArithmetic { .. } => "ITEM_ARITHMETIC",
        }
    }
}

/// One extracted item line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedItem {
    /// 3-to-5-digit product code.
    pub product_code: String,
    /// Supplier reference.
    pub product_reference: String,
    /// Display name (falls back to the reference).
    pub product_name: String,
    /// Positive quantity.
    pub quantity: u32,
    /// Unit price.
    pub unit_price: Decimal,
    /// Line total.
    pub total_price: Decimal,
}

/// A fully parsed quotation, ready for seller confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedOrder {
    /// Quotation number.
    pub order_number: String,
    /// Client name from the header.
    pub client_name: String,
    /// Seller name from the header.
    pub seller_name: String,
    /// Quotation date.
    pub order_date: NaiveDate,
    /// Document total from the header.
    pub total_value: Decimal,
    /// Items in document order, one per product code.
    pub items: Vec<ParsedItem>,
}

/// Parse a quotation from PDF bytes.
///
/// CPU-bound; callers on an async runtime should wrap this in
/// `spawn_blocking`.
///
/// # Errors
///
/// Returns the [`ParseError`] taxonomy; a document-total mismatch is not an
/// error and lands in the returned [`ValidationInfo`] instead.
pub fn parse_quotation(bytes: &[u8]) -> Result<(ParsedOrder, ValidationInfo), ParseError> {
    let text = extractor::extract_text(bytes)?;
    parse_text(&text)
}

/// Parse a quotation from already-extracted text.
///
/// # Errors
///
/// Same taxonomy as [`parse_quotation`], minus the extraction step.
pub fn parse_text(text: &str) -> Result<(ParsedOrder, ValidationInfo), ParseError> {
    let normalized = normalize::normalize(text);
    let sieved = sieve::sieve(&normalized);
    let header = fields::extract_header(&sieved.header);

    let order_number = header.order_number.ok_or(ParseError::PatternMiss("order_number"))?;
    let client_name = header.client_name.ok_or(ParseError::PatternMiss("client_name"))?;
    let seller_name = header.seller_name.ok_or(ParseError::PatternMiss("seller_name"))?;
    let order_date = header.order_date.ok_or(ParseError::PatternMiss("order_date"))?;
    let total_value = header.total_value.ok_or(ParseError::PatternMiss("total_value"))?;

    let items = items::extract_items(&sieved.item_lines);
    if items.is_empty() {
        return Err(ParseError::PatternMiss("items"));
    }
    validate::check_item_arithmetic(&items)?;

    let info = validate::document_summary(&items, total_value);
    let order = ParsedOrder {
        order_number,
        client_name,
        seller_name,
        order_date,
        total_value,
        items,
    };
    Ok((order, info))
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    const DOCUMENT: &str = "\
Orçamento Nº: 27820
Cliente: MARCIO APARECIDO DE SANTANA Forma de Pagto: PIX
Vendedor: NYCOLAS HENDRIGO MANCINI Validade do Orçamento: 7 dias
Data: 11/07/25
Cód. / Produto / UN / Qtd / Unit / Total
00815 / CB-20 --> CABO USB 2M / UN / 100 / 5,95 / 595,00
03242 / FO-11 --> FONE DE OUVIDO / UN / 25 / 23,80 / 595,00
00852 / PE-3D --> PELICULA 3D / UN / 200 / 2,975 / 595,00
00267 / SU-05 --> SUPORTE VEICULAR / UN / 50 / 11,90 / 595,00
VALOR A PAGAR R$ 2.380,00
";

    #[test]
    fn full_document_parses() {
        let (order, info) = parse_text(DOCUMENT).unwrap();
        assert_eq!(order.order_number, "27820");
        assert_eq!(order.client_name, "MARCIO APARECIDO DE SANTANA");
        assert_eq!(order.seller_name, "NYCOLAS HENDRIGO MANCINI");
        assert_eq!(
            order.order_date,
            chrono::NaiveDate::from_ymd_opt(2025, 7, 11).unwrap()
        );
        assert_eq!(order.total_value, dec!(2380.00));
        assert_eq!(order.items.len(), 4);
        assert!(info.totals_match);
        assert_eq!(info.calculated_total, dec!(2380.00));
    }

    #[test]
    fn product_codes_are_unique() {
        let (order, _) = parse_text(DOCUMENT).unwrap();
        let mut codes: Vec<_> = order.items.iter().map(|i| &i.product_code).collect();
        codes.dedup();
        assert_eq!(codes.len(), order.items.len());
    }

    #[test]
    fn missing_order_number_is_pattern_miss() {
        let text = DOCUMENT.replace("Orçamento Nº: 27820\n", "");
        let err = parse_text(&text).unwrap_err();
        assert!(matches!(err, ParseError::PatternMiss("order_number")));
    }

    #[test]
    fn zero_items_never_creates_an_order() {
        let text = "\
Orçamento Nº: 11111
Cliente: FULANO
Vendedor: BELTRANO
Data: 01/01/25
VALOR A PAGAR R$ 10,00
";
        let err = parse_text(text).unwrap_err();
        assert!(matches!(err, ParseError::PatternMiss("items")));
    }

    #[test]
    fn unit_total_mismatch_is_fatal() {
        let text = "\
Orçamento Nº: 22222
Cliente: FULANO
Vendedor: BELTRANO
Data: 01/01/25
01000 / RE-10 --> REGUA / UN / 10 / 2,00 / 25,00
VALOR A PAGAR R$ 25,00
";
        let err = parse_text(text).unwrap_err();
        assert_eq!(err.code(), "ITEM_ARITHMETIC");
    }

    #[test]
    fn document_total_mismatch_is_non_fatal() {
        let text = "\
Orçamento Nº: 33333
Cliente: FULANO
Vendedor: BELTRANO
Data: 01/01/25
01000 / RE-10 --> REGUA / UN / 1 / 1.250,01 / 1.250,01
VALOR A PAGAR R$ 1.250,00
";
        let (order, info) = parse_text(text).unwrap();
        assert_eq!(order.items.len(), 1);
        assert!(!info.totals_match);
        assert_eq!(info.difference, dec!(0.01));
    }

    #[test]
    fn wrapped_and_artifact_heavy_document() {
        let text = "\
Orçamento Nº: 44444
CNPJ: 00.000.000/0001-00
Cliente: EMPRESA DE TESTE LTDA
Vendedor: BELTRANO
Data: 02/03/25
00815 / CB-20 --> CABO USB REFORÇADO
Página: 2
/ UN / 10 / 5,00 / 50,00
VALOR A PAGAR R$ 50,00
";
        let (order, info) = parse_text(text).unwrap();
        assert_eq!(order.items.len(), 1);
        assert!(order.items[0].product_name.contains("REFORÇADO"));
        assert!(info.totals_match);
    }
}
