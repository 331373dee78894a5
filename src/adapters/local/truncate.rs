//! Prompt truncation to the text encoder's context window.

use crate::ports::Tokenizer;

/// Context window of the CLIP text encoder, in tokens.
pub const MAX_PROMPT_TOKENS: usize = 77;

/// Bound `text` to at most `limit` tokens.
///
/// Text that already fits is returned unchanged. Longer text is cut to its
/// first `limit` tokens and decoded back, which may split a word or
/// normalize whitespace.
#[must_use]
pub fn truncate_prompt(tokenizer: &dyn Tokenizer, text: &str, limit: usize) -> String {
    let tokens = tokenizer.encode(text);
    if tokens.len() <= limit {
        return text.to_string();
    }
    tokenizer.decode(&tokens[..limit])
}
