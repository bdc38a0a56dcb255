//! Transcript decoding
//!
//! A tool-use run produces a transcript of user, assistant and tool-result
//! messages. The caller wants one thing out of it: the final analysis text.
//! The last assistant message with text content is authoritative; when the
//! transcript has none (the model only called tools, or the run was cut
//! short), we fall back to concatenating whatever text the transcript holds
//! and flag the result so callers can record the degraded extraction.

use crate::Message;
use crate::messages::Role;

/// Result of decoding a transcript into final output text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    /// The extracted text; empty when the transcript held no text at all
    pub text: String,

    /// True when no assistant text was found and the concatenation
    /// fallback was used instead
    pub was_fallback: bool,
}

/// Extract the final output text from a completed transcript
///
/// Returns the text of the last assistant message that carries nonempty
/// text. If no such message exists, concatenates the text content of every
/// message in order and marks the result as a fallback extraction. An empty
/// transcript decodes to empty text, not an error.
pub fn extract_final_text(messages: &[Message]) -> ExtractedText {
    let last_assistant_text = messages
        .iter()
        .rev()
        .filter(|m| m.role == Role::Assistant)
        .find_map(|m| m.text().filter(|t| !t.is_empty()));

    if let Some(text) = last_assistant_text {
        return ExtractedText {
            text: text.to_string(),
            was_fallback: false,
        };
    }

    let concatenated: Vec<&str> = messages
        .iter()
        .filter_map(|m| m.text().filter(|t| !t.is_empty()))
        .collect();

    ExtractedText {
        text: concatenated.join("\n"),
        was_fallback: true,
    }
}
