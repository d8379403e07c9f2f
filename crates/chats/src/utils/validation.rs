use crate::types::{ChatError, ChatResult};

const ROOM_NAME_LEN: std::ops::RangeInclusive<usize> = 3..=100;

/// Trims and checks a room name.
pub fn room_name(name: &str) -> ChatResult<String> {
    let trimmed = name.trim();
    if !ROOM_NAME_LEN.contains(&trimmed.chars().count()) {
        return Err(ChatError::validation(
            "room name must be between 3 and 100 characters",
        ));
    }
    Ok(trimmed.to_string())
}

pub fn message_content(content: &str) -> ChatResult<()> {
    if content.trim().is_empty() {
        return Err(ChatError::validation("message content must not be empty"));
    }
    Ok(())
}

/// Splits a search query into terms, folding ASCII letters to lowercase.
pub fn search_terms(query: &str) -> ChatResult<Vec<String>> {
    let terms: Vec<String> = query
        .split_whitespace()
        .map(str::to_ascii_lowercase)
        .collect();
    if terms.is_empty() {
        return Err(ChatError::validation("search query must not be empty"));
    }
    Ok(terms)
}
