//! Header field extraction.
//!
//! Each field holds a ranked list of regular expressions: a strict primary
//! pattern plus fallbacks that accept looser punctuation around the colon.
//! The first non-empty capture of the first matching pattern wins. These
//! patterns have accreted against real quotation PDFs; keep additions at the
//! end of a list so earlier, stricter shapes keep priority.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::Decimal;

use super::numbers::{parse_currency, parse_short_date};

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid field pattern {pattern:?}: {e}"))
}

static ORDER_NUMBER: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)Or[çc]amento\s*N[ºo°]?\.?\s*:?\s*(\d+)",
        r"(?i)Or[çc]amento\s+(\d{3,})",
    ]
    .iter()
    .map(|p| compile(p))
    .collect()
});

static CLIENT: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)Cliente\s*:\s*([^\n]+)",
        r"(?i)Cliente\s*[-–]\s*([^\n]+)",
    ]
    .iter()
    .map(|p| compile(p))
    .collect()
});

static SELLER: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)Vendedor\s*:\s*([^\n]+)",
        r"(?i)Vendedor\s*[-–]\s*([^\n]+)",
    ]
    .iter()
    .map(|p| compile(p))
    .collect()
});

static ORDER_DATE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)Data\s*:\s*(\d{2}/\d{2}/\d{2,4})",
        r"(?i)Data\s+(\d{2}/\d{2}/\d{2,4})",
    ]
    .iter()
    .map(|p| compile(p))
    .collect()
});

static TOTAL_VALUE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)VALOR\s+A\s+PAGAR\s*R?\$?\s*([\d.,]+)",
        r"(?i)VALOR\s+TOTAL\s*R?\$?\s*([\d.,]+)",
    ]
    .iter()
    .map(|p| compile(p))
    .collect()
});

/// Prefixes that may recur inside a captured group.
const STRIP_PREFIXES: [&str; 4] = ["Cliente:", "CLIENTE:", "Vendedor:", "VENDEDOR:"];

/// Right-boundary phrases that cut a capture.
const CUT_SUFFIXES: [&str; 2] = ["Forma", "Validade"];

/// Raw header captures before type conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderCaptures {
    /// Raw quotation number.
    pub order_number: Option<String>,
    /// Cleaned client capture.
    pub client_name: Option<String>,
    /// Cleaned seller capture.
    pub seller_name: Option<String>,
    /// Raw date capture.
    pub order_date: Option<String>,
    /// Raw total capture.
    pub total_value: Option<String>,
}

/// Typed header fields.
#[derive(Debug, Clone, Default)]
pub struct HeaderFields {
    /// Quotation number.
    pub order_number: Option<String>,
    /// Client name.
    pub client_name: Option<String>,
    /// Seller name.
    pub seller_name: Option<String>,
    /// Parsed quotation date.
    pub order_date: Option<NaiveDate>,
    /// Parsed document total.
    pub total_value: Option<Decimal>,
}

/// First capture group of the first matching pattern, or `None`.
fn first_match(patterns: &[Regex], text: &str) -> Option<String> {
    patterns.iter().find_map(|p| {
        p.captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| !s.is_empty())
    })
}

/// Strip recurring prefixes, cut at right-boundary phrases, and collapse any
/// embedded newlines to spaces.
#[must_use]
pub fn clean_capture(raw: &str) -> String {
    let mut text = raw.trim().replace('\n', " ");
    for prefix in STRIP_PREFIXES {
        if let Some(rest) = text.strip_prefix(prefix) {
            text = rest.trim().to_string();
        }
    }
    for suffix in CUT_SUFFIXES {
        if let Some(idx) = text.find(suffix) {
            text.truncate(idx);
        }
    }
    text.trim().to_string()
}

/// Run the ranked patterns over the header block.
#[must_use]
pub fn extract_captures(text: &str) -> HeaderCaptures {
    HeaderCaptures {
        order_number: first_match(&ORDER_NUMBER, text),
        client_name: first_match(&CLIENT, text).map(|s| clean_capture(&s)),
        seller_name: first_match(&SELLER, text).map(|s| clean_capture(&s)),
        order_date: first_match(&ORDER_DATE, text),
        total_value: first_match(&TOTAL_VALUE, text),
    }
}

/// Extract and convert the header fields.
#[must_use]
pub fn extract_header(text: &str) -> HeaderFields {
    let captures = extract_captures(text);
    HeaderFields {
        order_number: captures.order_number,
        client_name: captures.client_name.filter(|s| !s.is_empty()),
        seller_name: captures.seller_name.filter(|s| !s.is_empty()),
        order_date: captures.order_date.as_deref().and_then(parse_short_date),
        total_value: captures.total_value.as_deref().and_then(parse_currency),
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    const HEADER: &str = "Orçamento Nº: 27820\n\
        Cliente: MARCIO APARECIDO DE SANTANA Forma de Pagto: PIX\n\
        Vendedor: NYCOLAS HENDRIGO MANCINI Validade do Orçamento: 7 dias\n\
        Data: 11/07/25\n\
        VALOR A PAGAR R$ 2.380,00\n";

    #[test]
    fn extracts_all_fields() {
        let fields = extract_header(HEADER);
        assert_eq!(fields.order_number.as_deref(), Some("27820"));
        assert_eq!(
            fields.client_name.as_deref(),
            Some("MARCIO APARECIDO DE SANTANA")
        );
        assert_eq!(
            fields.seller_name.as_deref(),
            Some("NYCOLAS HENDRIGO MANCINI")
        );
        assert_eq!(
            fields.order_date,
            chrono::NaiveDate::from_ymd_opt(2025, 7, 11)
        );
        assert_eq!(fields.total_value, Some(dec!(2380.00)));
    }

    #[test]
    fn fallback_accepts_missing_colon() {
        let fields = extract_header("Orçamento 99123\nData 01/02/25\n");
        assert_eq!(fields.order_number.as_deref(), Some("99123"));
        assert!(fields.order_date.is_some());
    }

    #[test]
    fn ordinal_variants_of_order_number() {
        for header in [
            "Orçamento Nº: 123",
            "Orçamento No: 123",
            "ORÇAMENTO N° 123",
            "Orcamento N 123",
        ] {
            let fields = extract_header(header);
            assert_eq!(fields.order_number.as_deref(), Some("123"), "for {header}");
        }
    }

    #[test]
    fn cleaner_cuts_boundary_and_prefix() {
        assert_eq!(clean_capture("Cliente: FULANO Forma de Pagto"), "FULANO");
        assert_eq!(clean_capture("BELTRANO\nDA SILVA"), "BELTRANO DA SILVA");
    }

    #[test]
    fn missing_fields_are_none() {
        let fields = extract_header("texto qualquer sem cabeçalho\n");
        assert!(fields.order_number.is_none());
        assert!(fields.client_name.is_none());
        assert!(fields.total_value.is_none());
    }

    #[test]
    fn total_falls_back_to_valor_total() {
        let fields = extract_header("VALOR TOTAL R$ 150,00\n");
        assert_eq!(fields.total_value, Some(dec!(150.00)));
    }
}
