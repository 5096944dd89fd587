//! Display-name normalization used for grouping candidates.
//!
//! Stripping rules, applied in order:
//! 1. a parenthesized numeric range, `"Foo (1-27)"` -> `"Foo"`
//! 2. a bare numeric range, `"Foo 27-77"` -> `"Foo"`
//! 3. runs of whitespace collapse to one space; ends are trimmed
//!
//! A name made only of a range normalizes to itself (trimmed).

use regex::Regex;
use std::sync::LazyLock;

static PARENTHESIZED_RANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(\s*\d+\s*[-–]\s*\d+\s*\)").unwrap());

static BARE_RANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d+\s*[-–]\s*\d+\b").unwrap());

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Base name of a method or candidate, with level ranges removed
pub fn normalize_base_name(name: &str) -> String {
    let stripped = PARENTHESIZED_RANGE.replace_all(name, " ");
    let stripped = BARE_RANGE.replace_all(&stripped, " ");
    let collapsed = WHITESPACE.replace_all(stripped.trim(), " ");

    if collapsed.is_empty() {
        WHITESPACE.replace_all(name.trim(), " ").into_owned()
    } else {
        collapsed.into_owned()
    }
}
