//! Input normalization for battle text and magic-word matching.

/// Maximum length (in characters) of a single battle submission. Longer text
/// is truncated before matching or relaying; the remote collaborator has its
/// own limits and oversized payloads only waste the request.
pub const MAX_BATTLE_TEXT: usize = 200;

/// Normalize player text for reserved-phrase matching: trim surrounding
/// whitespace and case-fold. Matching is on the normalized form only; the
/// raw (trimmed) text is what gets relayed to the collaborator.
pub fn normalize_input(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Trim and cap free text before it leaves the input layer.
pub fn clamp_battle_text(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.chars().count() <= MAX_BATTLE_TEXT {
        return trimmed.to_string();
    }
    trimmed.chars().take(MAX_BATTLE_TEXT).collect()
}
