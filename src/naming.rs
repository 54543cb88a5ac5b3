//! Directory-name sanitization for outline labels.
//!
//! Every group and leaf label in the outline becomes one path component of
//! the output tree. Labels come straight from a bookmark export, so they
//! routinely contain colons, slashes, and quotes:
//!
//! - `Vol 3: Host`                        → `Vol 3 - Host`
//! - `Part A: Logical Link Control`       → `Part A - Logical Link Control`
//! - `Part B  "Security"  <Draft>`        → `Part B Security Draft`
//! - `Errata / Changes`                   → `Errata Changes`
//!
//! The result is a legal directory name on Linux, macOS and Windows.

/// Placeholder used when a label is missing or sanitizes to nothing.
pub const UNKNOWN_NAME: &str = "Unknown";

/// Characters that are illegal in a path component on at least one target
/// filesystem. Colons are handled separately so `Vol 3: Host` keeps its
/// visual separator.
const ILLEGAL_CHARS: &[char] = &['\\', '/', '*', '?', '"', '<', '>', '|'];

/// Sanitize an outline label into a single path component.
///
/// Illegal characters are removed, `:` becomes ` -`, and whitespace runs are
/// collapsed to one space with the ends trimmed. Labels that end up empty
/// (or are only dots, which would resolve to `.`/`..`) become
/// [`UNKNOWN_NAME`].
pub fn sanitize_name(name: &str) -> String {
    let stripped: String = name
        .chars()
        .filter(|c| !ILLEGAL_CHARS.contains(c))
        // Tabs and newlines are whitespace and get collapsed below.
        .filter(|c| c.is_whitespace() || !c.is_control())
        .collect();
    let spaced = stripped.replace(':', " -");
    let collapsed = spaced.split_whitespace().collect::<Vec<_>>().join(" ");

    // Windows silently drops trailing dots and spaces.
    let trimmed = collapsed.trim_end_matches(['.', ' ']);
    if trimmed.is_empty() {
        UNKNOWN_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}
