//! Outbound text sanitization.
//!
//! Provider text is reduced to ASCII by dropping every non-ASCII character.
//! Nothing is substituted or transliterated, so `"Café – Live"` becomes
//! `"Caf  Live"`. Existing reply output depends on this exact behavior.

/// Drop every character outside the ASCII range.
pub fn to_ascii_lossy(text: &str) -> String {
    text.chars().filter(char::is_ascii).collect()
}
