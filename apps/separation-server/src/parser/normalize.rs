//! Text normalization for raw PDF extraction output.
//!
//! The rasterizer occasionally emits stray angle brackets glued to the `UN`
//! unit marker (`</<UN`, `<</UN`, `/<<UN`, …) and triple slashes where a
//! field separator wrapped. Normalization repairs those, collapses runs of
//! spaces and tabs, and touches nothing else — newlines pass through verbatim.

use std::sync::LazyLock;

use regex::Regex;

/// Any bracket cluster containing at least one `<` directly before `UN`.
static BRACKETED_UN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[/<]*<[/<]*\s*UN\b").unwrap_or_else(|e| panic!("invalid UN pattern: {e}"))
});

static TRIPLE_SLASH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/\s*/\s*/").unwrap_or_else(|e| panic!("invalid slash pattern: {e}"))
});

static SPACE_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[ \t]+").unwrap_or_else(|e| panic!("invalid space pattern: {e}"))
});

/// Normalize extracted text. Pure; line boundaries are preserved.
#[must_use]
pub fn normalize(text: &str) -> String {
    let text = BRACKETED_UN.replace_all(text, " UN ");
    let text = TRIPLE_SLASH.replace_all(&text, " / ");
    let text = SPACE_RUN.replace_all(&text, " ");
    text.into_owned()
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("CABO </<UN / 10"; "double bracket slash")]
    #[test_case("CABO <</UN / 10"; "bracket bracket slash")]
    #[test_case("CABO /<<UN / 10"; "slash double bracket")]
    #[test_case("CABO </UN / 10"; "bracket slash")]
    #[test_case("CABO <UN / 10"; "single bracket")]
    #[test_case("CABO <</ UN / 10"; "spaced variant")]
    fn bracket_artifacts_become_un(line: &str) {
        let out = normalize(line);
        assert!(out.contains(" UN "), "got: {out}");
        assert!(!out.contains('<'), "got: {out}");
    }

    #[test]
    fn plain_un_separator_is_untouched() {
        assert_eq!(
            normalize("00815 / CB-20 / UN / 10 / 5,00 / 50,00"),
            "00815 / CB-20 / UN / 10 / 5,00 / 50,00"
        );
    }

    #[test]
    fn triple_slash_collapses() {
        assert_eq!(normalize("A / / / B"), "A / B");
        assert_eq!(normalize("A /// B"), "A / B");
    }

    #[test]
    fn spaces_collapse_but_newlines_survive() {
        assert_eq!(normalize("a  \t b\nc   d"), "a b\nc d");
    }

    #[test]
    fn unrelated_characters_are_preserved() {
        assert_eq!(normalize("Orçamento Nº: 27820"), "Orçamento Nº: 27820");
    }
}
