//! Shared helpers: external commands, paths, pluralisation.

pub mod exec;
pub mod mime;
pub mod path;

/// Format count with noun, handling pluralization
///
/// - `plural_count(0, "document")` -> `"0 documents"`
/// - `plural_count(1, "document")` -> `"1 document"`
#[inline]
pub fn plural_count(count: usize, noun: &str) -> String {
    let suffix = if count == 1 { "" } else { "s" };
    format!("{count} {noun}{suffix}")
}
