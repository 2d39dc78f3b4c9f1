//! Token estimation used by the history budget.
//!
//! A whitespace word count stands in for real tokens. Eviction timing depends
//! on this exact rule, so swapping in a tokenizer changes observable behavior.

use crate::models::chat::ChatMessage;

/// Number of whitespace-delimited words in `text`.
pub fn estimate_tokens(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Sum of `estimate_tokens` over message contents.
pub fn estimate_messages_tokens<'a, I>(messages: I) -> usize
where
    I: IntoIterator<Item = &'a ChatMessage>,
{
    messages
        .into_iter()
        .map(|msg| estimate_tokens(&msg.content))
        .sum()
}
