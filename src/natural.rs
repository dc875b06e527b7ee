//! Natural ordering for page and collection names.
//!
//! Names are split into alternating digit and non-digit runs. Digit runs compare
//! by numeric value ("img2" < "img10"), text runs compare case-insensitively.
//! Names that are equal under those rules (e.g. "009" and "9", or "A" and "a")
//! fall back to a plain string comparison, so the order is total.

use std::cmp::Ordering;
use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Splits a name into maximal digit and non-digit runs.
    static ref RUN_REGEX: Regex = Regex::new(r"[0-9]+|[^0-9]+").unwrap();
}

#[derive(Debug, PartialEq, Eq)]
enum Run<'a> {
    /// Digits with leading zeros stripped.
    Number(&'a str),
    Text(String),
}

impl Ord for Run<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            // Digit strings without leading zeros order by length first, then lexically.
            // This compares arbitrarily long numbers without overflow.
            (Run::Number(a), Run::Number(b)) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
            (Run::Text(a), Run::Text(b)) => a.cmp(b),
            (Run::Number(_), Run::Text(_)) => Ordering::Less,
            (Run::Text(_), Run::Number(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for Run<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn runs(name: &str) -> impl Iterator<Item = Run<'_>> {
    RUN_REGEX.find_iter(name).map(|m| {
        let run = m.as_str();
        if run.as_bytes()[0].is_ascii_digit() {
            let trimmed = run.trim_start_matches('0');
            Run::Number(if trimmed.is_empty() { "0" } else { trimmed })
        } else {
            Run::Text(run.to_lowercase())
        }
    })
}

/// Compares two names in natural order.
///
/// # Examples
///
/// ```
/// use std::cmp::Ordering;
/// use tojiru::natural::natural_cmp;
///
/// assert_eq!(natural_cmp("img2.jpg", "img10.jpg"), Ordering::Less);
/// assert_eq!(natural_cmp("Page_3", "page_03"), Ordering::Less);
/// ```
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    runs(a).cmp(runs(b)).then_with(|| a.cmp(b))
}

/// Compares two paths by their file names in natural order.
pub fn natural_cmp_paths(a: &Path, b: &Path) -> Ordering {
    let a_name = a.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    let b_name = b.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    natural_cmp(&a_name, &b_name)
}

/// Sorts names in place in natural order.
pub fn natural_sort<S: AsRef<str>>(names: &mut [S]) {
    names.sort_by(|a, b| natural_cmp(a.as_ref(), b.as_ref()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_runs_compare_by_value() {
        let mut names = vec!["a2", "a10", "a1"];
        natural_sort(&mut names);
        assert_eq!(names, vec!["a1", "a2", "a10"]);
    }

    #[test]
    fn test_text_runs_are_case_insensitive() {
        assert_eq!(natural_cmp("Chapter 2", "chapter 10"), Ordering::Less);
        assert_eq!(natural_cmp("b", "A"), Ordering::Greater);
    }

    #[test]
    fn test_leading_zeros_compare_by_value() {
        assert_eq!(natural_cmp("009", "10"), Ordering::Less);
        assert_eq!(natural_cmp("page_009.png", "page_8.png"), Ordering::Greater);
        // Equal values are ordered by the raw string so the order stays total
        assert_eq!(natural_cmp("009", "9"), Ordering::Less);
        assert_eq!(natural_cmp("9", "009"), Ordering::Greater);
        assert_eq!(natural_cmp("009", "009"), Ordering::Equal);
    }

    #[test]
    fn test_numbers_sort_before_text() {
        assert_eq!(natural_cmp("1", "a"), Ordering::Less);
        assert_eq!(natural_cmp("cover", "001"), Ordering::Greater);
    }

    #[test]
    fn test_huge_numbers_do_not_overflow() {
        let big = "99999999999999999999999999999";
        let bigger = "100000000000000000000000000000";
        assert_eq!(natural_cmp(big, bigger), Ordering::Less);
    }

    #[test]
    fn test_non_ascii_names() {
        let mut names = vec!["第10話", "第2話", "第1話"];
        natural_sort(&mut names);
        assert_eq!(names, vec!["第1話", "第2話", "第10話"]);
    }

    #[test]
    fn test_paths_use_file_name_only() {
        assert_eq!(
            natural_cmp_paths(Path::new("z/img2.png"), Path::new("a/img10.png")),
            Ordering::Less
        );
    }
}
