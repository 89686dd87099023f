//! Rough token estimates for reporting. Not tokenizer-accurate.

use serde::{Deserialize, Serialize};

/// Per-message framing overhead (role tags and delimiters).
const MESSAGE_OVERHEAD: usize = 4;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetrics {
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub total_tokens: usize,
}

impl TokenMetrics {
    /// `system_prompt` is the augmented prompt, so retrieved context is counted once.
    #[must_use]
    pub fn estimate(system_prompt: &str, message: &str, response: &str) -> Self {
        let system = if system_prompt.is_empty() {
            0
        } else {
            estimate_tokens(system_prompt) + MESSAGE_OVERHEAD
        };
        let input_tokens = system + estimate_tokens(message) + MESSAGE_OVERHEAD;
        let output_tokens = estimate_tokens(response);
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
        }
    }
}

/// About four characters per token, at least one for non-empty text.
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    (text.chars().count() / 4).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_is_zero() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn short_text_is_at_least_one() {
        assert_eq!(estimate_tokens("hi"), 1);
        assert_eq!(estimate_tokens("abcdefgh"), 2);
    }

    #[test]
    fn counts_chars_not_bytes() {
        assert_eq!(estimate_tokens("ééééééééé"), 2);
    }

    #[test]
    fn metrics_add_message_overhead() {
        let m = TokenMetrics::estimate("abcdefgh", "abcd", "abcdefghijkl");
        assert_eq!(m.input_tokens, (2 + 4) + (1 + 4));
        assert_eq!(m.output_tokens, 3);
        assert_eq!(m.total_tokens, m.input_tokens + m.output_tokens);
    }

    #[test]
    fn empty_system_prompt_has_no_overhead() {
        let m = TokenMetrics::estimate("", "abcd", "");
        assert_eq!(m.input_tokens, 5);
        assert_eq!(m.output_tokens, 0);
    }
}
