//! Plate text normalization for gate matching.

/// Normalizes a plate string: uppercase, all non-alphanumerics stripped.
pub fn normalize_plate(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// True when both sides normalize to the same non-empty plate.
pub fn plates_match(a: &str, b: &str) -> bool {
    let norm = normalize_plate(a);
    !norm.is_empty() && norm == normalize_plate(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_separators_and_uppercases() {
        assert_eq!(normalize_plate("ka-01 ab 1234"), "KA01AB1234");
        assert_eq!(normalize_plate(" MH12·DE·1433 "), "MH12DE1433");
    }

    #[test]
    fn empty_plates_never_match() {
        assert!(!plates_match("", ""));
        assert!(!plates_match("---", "---"));
        assert!(plates_match("KA01AB1234", "ka 01 ab 1234"));
        assert!(!plates_match("KA01AB1234", "KA01AB1235"));
    }
}
