//! Whitespace normalization for scraped text.
//!
//! Portal pages pad their markup with newlines and indentation, so every
//! text field leaving the crate goes through [`normalize`] first. The
//! collapse is idempotent: normalizing already-clean text changes nothing.

/// Trim the edges and collapse every internal whitespace run (spaces,
/// newlines, tabs) into a single space.
pub fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// [`normalize`] lifted over an optional value; `None` passes through.
pub fn normalize_opt(text: Option<&str>) -> Option<String> {
    text.map(normalize)
}

/// Normalize and turn an all-whitespace result into `None`.
pub(crate) fn normalize_non_empty(text: &str) -> Option<String> {
    let cleaned = normalize(text);
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_runs_and_trims_edges() {
        assert_eq!(normalize("  Пн 26 авг.  "), "Пн 26 авг.");
        assert_eq!(normalize("a\n b\t\tc"), "a b c");
        assert_eq!(normalize("Математическая\n            логика"), "Математическая логика");
    }

    #[test]
    fn is_idempotent() {
        let once = normalize("  a \n b  ");
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn empty_and_blank_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize(" \n\t "), "");
        assert_eq!(normalize_non_empty(" \n "), None);
        assert_eq!(normalize_non_empty(" x "), Some("x".to_string()));
    }

    #[test]
    fn optional_passthrough() {
        assert_eq!(normalize_opt(None), None);
        assert_eq!(normalize_opt(Some(" a  b ")), Some("a b".to_string()));
    }
}
