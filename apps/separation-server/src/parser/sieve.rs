//! Line sieve: segments normalized text into a header block and whole-item
//! strings.
//!
//! Item descriptions wrap onto multiple lines and page artifacts can appear
//! mid-item, so this is the only place the cross-line join happens. Two
//! artifact classes behave differently: hard artifacts (letterhead, column
//! headers, page markers) are skipped without disturbing an open item
//! accumulator, while terminators (totals footers, day-count footers)
//! finalize the accumulator before being dropped.

use std::sync::LazyLock;

use regex::Regex;

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid sieve pattern {pattern:?}: {e}"))
}

/// Letterhead, registration, address and layout noise. Skipped outright.
static SKIP_ARTIFACTS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)CNPJ[.:\s]",
        r"(?i)INSCRI[ÇC][ÃA]O\s+ESTADUAL",
        r"(?i)^(RUA|AV\.?|AVENIDA|TRAVESSA|ALAMEDA)\s",
        r"(?i)^CEP[.:\s]",
        r"(?i)^(FONE|TELEFONE|TEL)[.:\s]",
        r"(?i)FORMA\s+DE\s+PAGTO",
        r"(?i)CONDI[ÇC][ÃA]O\s+DE\s+PAGAMENTO",
        r"(?i)C[ÓO]D\.?\s*/\s*PRODUTO",
        r"(?i)^PRODUTO\s*/\s*UN\s*/\s*QTDE?",
        r"(?i)P[ÁA]G(INA)?\.?\s*:?\s*\d+",
        r"(?i)^PAGE\s+\d+",
    ]
    .iter()
    .map(|p| compile(p))
    .collect()
});

/// Footers and header-field restatements that signal the end of an item.
static TERMINATOR_ARTIFACTS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)^\d+\s+DIAS\b",
        r"(?i)VALIDADE\s+DO\s+OR[ÇC]AMENTO",
        r"(?i)^TOTAL\s+DE\s+ITENS",
        r"(?i)^QUANTIDADE\s+DE\s+VOLUMES",
    ]
    .iter()
    .map(|p| compile(p))
    .collect()
});

/// Header lines preserved for the field extractor.
static HEADER_WHITELIST: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)OR[ÇC]AMENTO\s*N",
        r"(?i)^CLIENTE\s*[:\-]",
        r"(?i)^VENDEDOR\s*[:\-]",
        r"(?i)^DATA\s*[:\-]",
        r"(?i)VALOR\s+TOTAL\s+R\$",
        r"(?i)VALOR\s+A\s+PAGAR",
        r"(?i)DESCONTO\s+R\$",
    ]
    .iter()
    .map(|p| compile(p))
    .collect()
});

/// A 4-to-5-digit code followed by a slash opens a new item.
static ITEM_OPEN: LazyLock<Regex> = LazyLock::new(|| compile(r"^\d{4,5}\s*/"));

/// Continuation of a wrapped item: the unit marker or the price tail. The
/// slash before `UN` is optional because the normalizer turns bracket
/// artifacts into a bare space-surrounded marker.
static CONTINUATION_UN: LazyLock<Regex> = LazyLock::new(|| compile(r"(?:/\s*)?\bUN\b\s*/"));
static CONTINUATION_TAIL: LazyLock<Regex> =
    LazyLock::new(|| compile(r"/\s*\d+\s*/\s*[\d.,]+\s*/\s*[\d.,]+"));

/// Numeric fields inside an assembled item string.
static NUMERIC_FIELD: LazyLock<Regex> = LazyLock::new(|| compile(r"/\s*[\d][\d.,]*"));

/// Sieve output: the retained header block plus assembled item strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SievedDocument {
    /// Whitelisted header lines, joined with newlines.
    pub header: String,
    /// Whole-item candidate strings, in document order.
    pub item_lines: Vec<String>,
}

fn matches_any(patterns: &[Regex], line: &str) -> bool {
    patterns.iter().any(|p| p.is_match(line))
}

/// An assembled item string must have the item-open shape, contain a `UN`
/// marker, and present at least three numeric fields.
#[must_use]
pub fn is_valid_item_line(line: &str) -> bool {
    ITEM_OPEN.is_match(line)
        && CONTINUATION_UN.is_match(line)
        && NUMERIC_FIELD.find_iter(line).count() >= 3
}

/// Run the sieve over normalized text.
#[must_use]
pub fn sieve(text: &str) -> SievedDocument {
    let mut header_lines: Vec<&str> = Vec::new();
    let mut item_lines: Vec<String> = Vec::new();
    let mut accumulator: Option<String> = None;

    let mut finalize = |acc: &mut Option<String>, out: &mut Vec<String>| {
        if let Some(line) = acc.take() {
            if is_valid_item_line(&line) {
                out.push(line);
            }
        }
    };

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if matches_any(&HEADER_WHITELIST, line) {
            header_lines.push(line);
            continue;
        }
        if matches_any(&SKIP_ARTIFACTS, line) {
            continue;
        }
        if matches_any(&TERMINATOR_ARTIFACTS, line) {
            finalize(&mut accumulator, &mut item_lines);
            continue;
        }

        if ITEM_OPEN.is_match(line) {
            finalize(&mut accumulator, &mut item_lines);
            accumulator = Some(line.to_string());
        } else if CONTINUATION_UN.is_match(line) || CONTINUATION_TAIL.is_match(line) {
            if let Some(acc) = accumulator.as_mut() {
                acc.push(' ');
                acc.push_str(line);
            }
        } else if let Some(acc) = accumulator.as_mut() {
            // Assumed description wrap.
            acc.push(' ');
            acc.push_str(line);
        }
    }
    finalize(&mut accumulator, &mut item_lines);

    SievedDocument {
        header: header_lines.join("\n"),
        item_lines,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_item_passes_through() {
        let doc = sieve("00815 / CB-20 --> CABO USB / UN / 10 / 5,00 / 50,00\n");
        assert_eq!(
            doc.item_lines,
            vec!["00815 / CB-20 --> CABO USB / UN / 10 / 5,00 / 50,00"]
        );
    }

    #[test]
    fn wrapped_tail_is_joined() {
        let text = "00815 / CB-20 --> CABO USB TIPO C\n/ UN / 10 / 5,00 / 50,00\n";
        let doc = sieve(text);
        assert_eq!(doc.item_lines.len(), 1);
        assert!(doc.item_lines[0].contains("TIPO C / UN / 10"));
    }

    #[test]
    fn description_wrap_without_markers_is_joined() {
        let text = "00815 / CB-20 --> CABO USB\nREFORÇADO 2 METROS / UN / 10 / 5,00 / 50,00\n";
        let doc = sieve(text);
        assert_eq!(doc.item_lines.len(), 1);
        assert!(doc.item_lines[0].contains("REFORÇADO 2 METROS"));
    }

    #[test]
    fn skip_artifact_does_not_break_an_open_item() {
        let text = "00815 / CB-20 --> CABO USB\nPágina: 2\n/ UN / 10 / 5,00 / 50,00\n";
        let doc = sieve(text);
        assert_eq!(doc.item_lines.len(), 1);
        assert!(!doc.item_lines[0].contains("Página"));
    }

    #[test]
    fn terminator_finalizes_the_open_item() {
        let text = "00815 / CB-20 --> CABO / UN / 10 / 5,00 / 50,00\n30 DIAS\nlixo / UN / extra\n";
        let doc = sieve(text);
        assert_eq!(doc.item_lines.len(), 1);
        assert!(!doc.item_lines[0].contains("lixo"));
    }

    #[test]
    fn incomplete_accumulator_is_discarded() {
        // Item opened but never received its numeric tail.
        let doc = sieve("00815 / CB-20 --> CABO USB SOLTO\n");
        assert!(doc.item_lines.is_empty());
    }

    #[test]
    fn header_lines_are_collected_separately() {
        let text = "Orçamento Nº: 27820\nCliente: FULANO\nCNPJ: 00.000.000/0001-00\n\
                    00815 / CB-20 --> CABO / UN / 10 / 5,00 / 50,00\n";
        let doc = sieve(text);
        assert!(doc.header.contains("27820"));
        assert!(doc.header.contains("FULANO"));
        assert!(!doc.header.contains("CNPJ"));
        assert_eq!(doc.item_lines.len(), 1);
    }

    #[test]
    fn artifact_catalogue_drops_letterhead() {
        let text = "CNPJ: 00.000.000/0001-00\nRua das Flores, 123\nForma de Pagto: PIX\n\
                    Cód. / Produto / UN / Qtd / Unit / Total\n";
        let doc = sieve(text);
        assert!(doc.item_lines.is_empty());
        assert!(doc.header.is_empty());
    }

    #[test]
    fn three_digit_code_does_not_open_an_item_here() {
        // Legacy 3-digit codes are handled by the item patterns, not by the
        // accumulator opener; a lone 3-digit line is treated as a wrap.
        let doc = sieve("815 / CB-20 / UN / 10 / 5,00 / 50,00\n");
        assert!(doc.item_lines.is_empty());
    }

    #[test]
    fn valid_item_line_requires_three_numeric_fields() {
        assert!(is_valid_item_line("00815 / REF / UN / 10 / 5,00 / 50,00"));
        assert!(!is_valid_item_line("00815 / REF / UN / 10 / 5,00"));
        assert!(!is_valid_item_line("00815 / REF / 10 / 5,00 / 50,00"));
    }
}
