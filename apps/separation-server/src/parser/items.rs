//! Item extraction from sieved whole-item strings.
//!
//! A ranked list of shapes is tried per line; the first that yields a
//! well-formed tuple wins. Matches then pass a suspicion filter (fabricated
//! or artifact-contaminated captures) and a validity check before they count.
//! De-duplication keeps the first occurrence of each product code.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use rust_decimal::Decimal;

use super::ParsedItem;
use super::numbers::{parse_currency, parse_quantity};

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid item pattern {pattern:?}: {e}"))
}

/// Separator before the unit marker. The slash is optional: the normalizer
/// repairs bracket artifacts (`</<UN`) into a bare space-surrounded `UN`.
const UN_SEP: &str = r"(?:/\s*)?\bUN\b\s*/";

/// Numeric tail: `QTY / UNIT / TOTAL`.
const TAIL: &str = r"\s*(\d+)\s*/\s*([\d.,]+)\s*/\s*([\d.,]+)";

/// Canonical: `CODE / REFERENCE --> DESCRIPTION / UN / QTY / UNIT / TOTAL`.
static CANONICAL: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(
        r"^(\d{{4,5}})\s*/\s*(.+?)\s*-->\s*(.+?)\s*{UN_SEP}{TAIL}"
    ))
});

/// Canonical with an additional filler field between description and `UN`.
static WITH_FILLER: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(
        r"^(\d{{4,5}})\s*/\s*(.+?)\s*-->\s*(.+?)\s*/\s*([^/]+?)\s*{UN_SEP}{TAIL}"
    ))
});

/// No `--> DESCRIPTION` segment; the reference is the whole name.
static NO_DESCRIPTION: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(r"^(\d{{4,5}})\s*/\s*([^/]+?)\s*{UN_SEP}{TAIL}"))
});

/// Legacy shape accepting 3-to-5-digit codes.
static LEGACY: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(
        r"^(\d{{3,5}})\s*/\s*([^/]+?)\s*(?:-->\s*([^/]+?)\s*)?{UN_SEP}{TAIL}"
    ))
});

/// Product codes that show up in totals blocks and must never become items.
const CODE_BLOCKLIST: [&str; 3] = ["000", "0000", "00000"];

/// Catalogue words that betray an artifact line captured as a reference.
const ARTIFACT_WORDS: [&str; 8] = [
    "CNPJ",
    "VALOR",
    "TOTAL",
    "PAGAR",
    "DESCONTO",
    "ORÇAMENTO",
    "CLIENTE",
    "VENDEDOR",
];

/// Intermediate capture before validation.
#[derive(Debug, Clone)]
struct Candidate {
    code: String,
    reference: String,
    description: Option<String>,
    filler: Option<String>,
    quantity: String,
    unit_price: String,
    total_price: String,
}

fn group(caps: &Captures<'_>, idx: usize) -> String {
    caps.get(idx).map_or_else(String::new, |m| m.as_str().trim().to_string())
}

fn opt_group(caps: &Captures<'_>, idx: usize) -> Option<String> {
    caps.get(idx)
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Try the ranked shapes against one line.
fn capture_candidate(line: &str) -> Option<Candidate> {
    // The filler shape is checked before the canonical one: the canonical
    // pattern also matches filler lines by swallowing the filler into the
    // description, so rank order here is strictest-first.
    if let Some(caps) = WITH_FILLER.captures(line) {
        return Some(Candidate {
            code: group(&caps, 1),
            reference: group(&caps, 2),
            description: opt_group(&caps, 3),
            filler: opt_group(&caps, 4),
            quantity: group(&caps, 5),
            unit_price: group(&caps, 6),
            total_price: group(&caps, 7),
        });
    }
    if let Some(caps) = CANONICAL.captures(line) {
        return Some(Candidate {
            code: group(&caps, 1),
            reference: group(&caps, 2),
            description: opt_group(&caps, 3),
            filler: None,
            quantity: group(&caps, 4),
            unit_price: group(&caps, 5),
            total_price: group(&caps, 6),
        });
    }
    if let Some(caps) = NO_DESCRIPTION.captures(line) {
        return Some(Candidate {
            code: group(&caps, 1),
            reference: group(&caps, 2),
            description: None,
            filler: None,
            quantity: group(&caps, 3),
            unit_price: group(&caps, 4),
            total_price: group(&caps, 5),
        });
    }
    if let Some(caps) = LEGACY.captures(line) {
        return Some(Candidate {
            code: group(&caps, 1),
            reference: group(&caps, 2),
            description: opt_group(&caps, 3),
            filler: None,
            quantity: group(&caps, 4),
            unit_price: group(&caps, 5),
            total_price: group(&caps, 6),
        });
    }
    None
}

/// Reject captures that look fabricated rather than parsed.
fn is_suspicious_match(candidate: &Candidate) -> bool {
    if candidate.code.len() < 3 || CODE_BLOCKLIST.contains(&candidate.code.as_str()) {
        return true;
    }
    if candidate.reference.contains('\n') {
        return true;
    }
    let upper = candidate.reference.to_uppercase();
    ARTIFACT_WORDS.iter().any(|w| upper.contains(w))
}

/// Structural validity of the captured tuple.
fn is_valid_item_data(
    candidate: &Candidate,
    quantity: u32,
    unit_price: Decimal,
    total_price: Decimal,
) -> bool {
    let code_ok =
        (3..=5).contains(&candidate.code.len()) && candidate.code.bytes().all(|b| b.is_ascii_digit());
    code_ok
        && candidate.reference.len() >= 2
        && quantity > 0
        && unit_price > Decimal::ZERO
        && total_price > Decimal::ZERO
}

/// Extract one item from an assembled line.
#[must_use]
pub fn extract_item(line: &str) -> Option<ParsedItem> {
    let candidate = capture_candidate(line)?;
    if is_suspicious_match(&candidate) {
        return None;
    }

    let quantity = parse_quantity(&candidate.quantity)?;
    let unit_price = parse_currency(&candidate.unit_price)?;
    let total_price = parse_currency(&candidate.total_price)?;
    if !is_valid_item_data(&candidate, quantity, unit_price, total_price) {
        return None;
    }

    let mut name = candidate
        .description
        .clone()
        .unwrap_or_else(|| candidate.reference.clone());
    if let Some(filler) = &candidate.filler {
        name = format!("{name} ({filler})");
    }

    Some(ParsedItem {
        product_code: candidate.code,
        product_reference: candidate.reference,
        product_name: name,
        quantity,
        unit_price,
        total_price,
    })
}

/// Extract items from sieved lines, de-duplicating by product code while
/// preserving insertion order.
#[must_use]
pub fn extract_items(lines: &[String]) -> Vec<ParsedItem> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut items = Vec::new();
    for line in lines {
        if let Some(item) = extract_item(line) {
            if seen.insert(item.product_code.clone()) {
                items.push(item);
            }
        }
    }
    items
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn canonical_shape() {
        let item =
            extract_item("00815 / CB-20 --> CABO USB 2M / UN / 10 / 5,00 / 50,00").unwrap();
        assert_eq!(item.product_code, "00815");
        assert_eq!(item.product_reference, "CB-20");
        assert_eq!(item.product_name, "CABO USB 2M");
        assert_eq!(item.quantity, 10);
        assert_eq!(item.unit_price, dec!(5.00));
        assert_eq!(item.total_price, dec!(50.00));
    }

    #[test]
    fn filler_shape_appends_to_name() {
        let item = extract_item(
            "03242 / FO-11 --> FONE DE OUVIDO / ATACADO / UN / 5 / 20,00 / 100,00",
        )
        .unwrap();
        assert_eq!(item.product_name, "FONE DE OUVIDO (ATACADO)");
        assert_eq!(item.quantity, 5);
    }

    #[test]
    fn missing_description_falls_back_to_reference() {
        let item = extract_item("00852 / PELICULA 3D / UN / 30 / 2,50 / 75,00").unwrap();
        assert_eq!(item.product_reference, "PELICULA 3D");
        assert_eq!(item.product_name, "PELICULA 3D");
    }

    #[test]
    fn normalized_bracket_artifact_without_slash() {
        // After `</<UN` repair the separator slash is gone.
        let item = extract_item(
            "00815 / CB-20 --> CABO USB REFORÇADO 2 METROS UN / 100 / 5,95 / 595,00",
        )
        .unwrap();
        assert_eq!(item.product_name, "CABO USB REFORÇADO 2 METROS");
        assert_eq!(item.quantity, 100);
    }

    #[test]
    fn legacy_three_digit_code() {
        let item = extract_item("815 / CB-20 --> CABO USB / UN / 10 / 5,00 / 50,00").unwrap();
        assert_eq!(item.product_code, "815");
        assert_eq!(item.product_name, "CABO USB");
    }

    #[test]
    fn blocklisted_code_is_rejected() {
        assert!(extract_item("00000 / REF-X --> NOME / UN / 1 / 1,00 / 1,00").is_none());
    }

    #[test]
    fn artifact_reference_is_rejected() {
        assert!(
            extract_item("12345 / VALOR TOTAL R$ --> X / UN / 1 / 1,00 / 1,00").is_none()
        );
    }

    #[test]
    fn zero_quantity_is_rejected() {
        assert!(extract_item("00815 / CB-20 --> CABO / UN / 0 / 5,00 / 0,00").is_none());
    }

    #[test]
    fn short_reference_is_rejected() {
        assert!(extract_item("00815 / X --> CABO / UN / 1 / 5,00 / 5,00").is_none());
    }

    #[test]
    fn duplicate_codes_keep_first_occurrence() {
        let lines = vec![
            "00815 / CB-20 --> CABO CURTO / UN / 10 / 5,00 / 50,00".to_string(),
            "00267 / SU-05 --> SUPORTE / UN / 4 / 10,00 / 40,00".to_string(),
            "00815 / CB-20 --> CABO LONGO / UN / 2 / 8,00 / 16,00".to_string(),
        ];
        let items = extract_items(&lines);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].product_code, "00815");
        assert_eq!(items[0].product_name, "CABO CURTO");
        assert_eq!(items[1].product_code, "00267");
    }

    #[test]
    fn thousands_separator_in_prices() {
        let item =
            extract_item("01999 / TV-55 --> TELEVISOR / UN / 2 / 1.250,00 / 2.500,00").unwrap();
        assert_eq!(item.unit_price, dec!(1250.00));
        assert_eq!(item.total_price, dec!(2500.00));
    }
}
