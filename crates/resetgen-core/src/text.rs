/// Default number of characters kept from database error output.
pub const DEFAULT_ERROR_TAIL_CHARS: usize = 2000;

/// Keep at most the last `max_chars` characters of `text`.
///
/// Truncated output is prefixed with `...` so readers can tell it was cut.
pub fn truncate_tail(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }

    let skip = total - max_chars;
    let start = text
        .char_indices()
        .nth(skip)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len());
    format!("...{}", &text[start..])
}
