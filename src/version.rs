//! Version comparison for SDK dependency values
//!
//! Dependency values in the package manifest come in two shapes: a plain
//! dotted version (`"8.5.0"`) or an install URL that may carry a git tag
//! (`"https://github.com/adjust/unity_sdk.git#5.0.3"`). Neither is guaranteed
//! to be valid semver, so comparison is deliberately lenient:
//!
//! - identical strings are equal without parsing
//! - an empty string sorts below any non-empty string
//! - when a `#` is present, only the text after the last `#` is compared
//! - components are split on `.` and compared numerically, the shorter side
//!   padded with zeros; a non-numeric component counts as `0`
//!
//! A component that is all digits but does not fit in a `u64` cannot be
//! compared numerically. In that case the whole comparison falls back to
//! ordinal string ordering of the compared parts. This is an approximation:
//! it keeps the function total, it does not make the answer meaningful.
//!
//! # Examples
//!
//! ```
//! use std::cmp::Ordering;
//! use sdkpm::compare_versions;
//!
//! assert_eq!(compare_versions("1.2.0", "1.10.0"), Ordering::Less);
//! assert_eq!(compare_versions("repo.git#8.6.0", "8.5.0"), Ordering::Greater);
//! assert_eq!(compare_versions("01.0", "1"), Ordering::Equal);
//! ```

use std::cmp::Ordering;

/// Compare two dependency version strings.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    match (a.is_empty(), b.is_empty()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Less,
        (false, true) => return Ordering::Greater,
        (false, false) => {}
    }

    let left = comparable_part(a);
    let right = comparable_part(b);

    match (parse_components(left), parse_components(right)) {
        (Some(l), Some(r)) => compare_components(&l, &r),
        _ => left.cmp(right),
    }
}

/// Returns true when `installed` satisfies the minimum `expected` version.
pub fn satisfies_minimum(installed: &str, expected: &str) -> bool {
    compare_versions(installed, expected) != Ordering::Less
}

/// Extract the tag of an install URL (`...#tag`), if it has one.
pub fn tag_of(value: &str) -> Option<&str> {
    value
        .rsplit_once('#')
        .map(|(_, tag)| tag)
        .filter(|tag| !tag.is_empty())
}

fn comparable_part(value: &str) -> &str {
    match value.rsplit_once('#') {
        Some((_, tag)) => tag,
        None => value,
    }
}

/// `None` means a numeric component overflowed and cannot be compared.
fn parse_components(value: &str) -> Option<Vec<u64>> {
    value
        .split('.')
        .map(|part| {
            let part = part.trim();
            if !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()) {
                part.parse::<u64>().ok()
            } else {
                Some(0)
            }
        })
        .collect()
}

fn compare_components(left: &[u64], right: &[u64]) -> Ordering {
    let len = left.len().max(right.len());
    for i in 0..len {
        let l = left.get(i).copied().unwrap_or(0);
        let r = right.get(i).copied().unwrap_or(0);
        match l.cmp(&r) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}
