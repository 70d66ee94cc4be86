//! Natural (numeric-aware) ordering of file names.
//!
//! Pages are numbered inconsistently in the wild (`1.jpg`, `02.jpg`, `010.jpg`), so plain string
//! ordering puts `10.jpg` before `2.jpg`. The comparers here pick the last run of digits that sits
//! right before the file extension and compare it by value. Names without such a run fall back to
//! ordinal byte comparison of the full string.

use std::cmp::Ordering;
use std::path::Path;

use lazy_static::lazy_static;
use rayon::prelude::*;
use regex::Regex;

lazy_static! {
    /// Digits immediately followed by an extension of three or more word characters and the end
    /// of the name (e.g. the `07` in `page_07.jpeg`).
    pub static ref TRAILING_NUMBER_REGEX: Regex = Regex::new(r"([0-9]+)\.\w{3,}$").unwrap();
    /// Digits at the very end of a file stem (e.g. the `07` in `page_07`).
    pub static ref STEM_NUMBER_REGEX: Regex = Regex::new(r"([0-9]+)$").unwrap();
}

/// Extracts the digit run right before the extension, if any.
pub fn trailing_number(name: &str) -> Option<&str> {
    TRAILING_NUMBER_REGEX
        .captures(name)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str())
}

/// Compares two ASCII digit runs by numeric value, of any length.
///
/// Leading zeros are ignored and no integer parsing happens, so runs longer than any
/// machine integer still compare correctly.
pub fn compare_digit_runs(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Compares two file names (or in-container paths) in natural order.
///
/// Both names carry a number before the extension: compare by value, ties broken ordinally.
/// Otherwise: ordinal comparison of the full strings.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    match (trailing_number(a), trailing_number(b)) {
        (Some(x), Some(y)) => compare_digit_runs(x, y).then_with(|| a.cmp(b)),
        _ => a.cmp(b),
    }
}

/// Natural comparison where a missing name sorts after every present one.
pub fn compare_optional(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => compare_names(a, b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn stem(name: &str) -> &str {
    Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name)
}

fn stem_number(stem: &str) -> Option<&str> {
    STEM_NUMBER_REGEX
        .captures(stem)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str())
}

/// Compares two file names by their stems (extension stripped) in natural order.
///
/// Used when renumbering, where `3.png` and `10.jpg` must order by `3` and `10` regardless of the
/// extension.
pub fn compare_stems(a: &str, b: &str) -> Ordering {
    let (a, b) = (stem(a), stem(b));
    match (stem_number(a), stem_number(b)) {
        (Some(x), Some(y)) => compare_digit_runs(x, y).then_with(|| a.cmp(b)),
        _ => a.cmp(b),
    }
}

/// Sorts names in natural order, in parallel for large listings.
pub fn sort_names(names: &mut [String]) {
    names.par_sort_by(|a, b| compare_names(a, b));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_number() {
        assert_eq!(trailing_number("page_07.jpeg"), Some("07"));
        assert_eq!(trailing_number("vol2/12.jpg"), Some("12"));
        assert_eq!(trailing_number("1.5.jpg"), Some("5"));
        assert_eq!(trailing_number("12a.jpg"), None);
        assert_eq!(trailing_number("cover.jpg"), None);
        // extension shorter than three characters
        assert_eq!(trailing_number("archive1.7z"), None);
    }

    #[test]
    fn test_huge_runs_do_not_overflow() {
        let big = format!("{}.jpg", "9".repeat(60));
        let bigger = format!("1{}.jpg", "0".repeat(60));
        assert_eq!(compare_names(&big, &bigger), Ordering::Less);
        assert_eq!(compare_digit_runs("0000", "0"), Ordering::Equal);
    }

    #[test]
    fn test_compare_stems() {
        assert_eq!(compare_stems("3.png", "10.jpg"), Ordering::Less);
        assert_eq!(compare_stems("p9.jpg", "p09.jpg"), Ordering::Greater);
        assert_eq!(compare_stems("cover.jpg", "intro.png"), Ordering::Less);
    }
}
