// Output formatting: terminal display for cycle reports, previews, status.

pub mod terminal;

/// Cut a string to at most `max_chars` characters.
///
/// Unlike byte slicing (`&text[..120]`), this respects UTF-8 character
/// boundaries and never panics on multi-byte characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

/// Like `truncate_chars`, but marks the cut with "..." (counted in the limit).
pub fn ellipsize(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept = truncate_chars(text, max_chars.saturating_sub(3));
    format!("{kept}...")
}
