//! Clause/sentence chunking for speech synthesis.
//!
//! Long requests are rendered one clause at a time so playback starts
//! quickly and pauses fall on natural boundaries.  A chunk ends after
//! terminal punctuation (`, . ; : ! ?`) followed by whitespace; text with
//! no such boundary is a single chunk.

use std::time::Duration;

/// Pause after a sentence-ending chunk (`.`, `!`, `?`).
pub const SENTENCE_PAUSE: Duration = Duration::from_millis(200);
/// Pause after a clause-ending chunk (`,`, `;`, `:`).
pub const CLAUSE_PAUSE: Duration = Duration::from_millis(120);
/// Pause after a chunk without terminal punctuation.
pub const WORD_PAUSE: Duration = Duration::from_millis(60);

fn is_boundary_punct(c: char) -> bool {
    matches!(c, ',' | '.' | ';' | ':' | '!' | '?')
}

/// A renderable piece of a synthesis request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub text: String,
}

impl TextChunk {
    /// The pause to insert after rendering this chunk, keyed to its
    /// terminating punctuation.
    pub fn pause(&self) -> Duration {
        match self.text.chars().next_back() {
            Some('.' | '!' | '?') => SENTENCE_PAUSE,
            Some(',' | ';' | ':') => CLAUSE_PAUSE,
            _ => WORD_PAUSE,
        }
    }
}

/// Split `text` into chunks after terminal punctuation followed by
/// whitespace.  Chunks are trimmed; whitespace-only pieces are dropped.
pub fn split_chunks(text: &str) -> Vec<TextChunk> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut prev_was_punct = false;

    for (i, c) in text.char_indices() {
        if prev_was_punct && c.is_whitespace() {
            push_trimmed(&mut chunks, &text[start..i]);
            start = i;
        }
        prev_was_punct = is_boundary_punct(c);
    }
    push_trimmed(&mut chunks, &text[start..]);
    chunks
}

fn push_trimmed(chunks: &mut Vec<TextChunk>, piece: &str) {
    let trimmed = piece.trim();
    if !trimmed.is_empty() {
        chunks.push(TextChunk {
            text: trimmed.to_string(),
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(chunks: &[TextChunk]) -> Vec<&str> {
        chunks.iter().map(|c| c.text.as_str()).collect()
    }

    #[test]
    fn splits_sentences_with_sentence_pause() {
        let chunks = split_chunks("Hello there. How are you?");
        assert_eq!(texts(&chunks), vec!["Hello there.", "How are you?"]);
        assert!(chunks.iter().all(|c| c.pause() == SENTENCE_PAUSE));
    }

    #[test]
    fn splits_clauses_with_clause_pause() {
        let chunks = split_chunks("First part, then more; finally done");
        assert_eq!(
            texts(&chunks),
            vec!["First part,", "then more;", "finally done"]
        );
        assert_eq!(chunks[0].pause(), CLAUSE_PAUSE);
        assert_eq!(chunks[1].pause(), CLAUSE_PAUSE);
        assert_eq!(chunks[2].pause(), WORD_PAUSE);
    }

    #[test]
    fn no_boundary_is_one_chunk() {
        let chunks = split_chunks("just a plain phrase");
        assert_eq!(texts(&chunks), vec!["just a plain phrase"]);
        assert_eq!(chunks[0].pause(), WORD_PAUSE);
    }

    #[test]
    fn punctuation_without_following_whitespace_does_not_split() {
        let chunks = split_chunks("version 1.5 is out");
        assert_eq!(texts(&chunks), vec!["version 1.5 is out"]);
    }

    #[test]
    fn empty_and_blank_input_yield_no_chunks() {
        assert!(split_chunks("").is_empty());
        assert!(split_chunks("   \n\t").is_empty());
    }

    #[test]
    fn consecutive_boundaries_skip_blank_pieces() {
        let chunks = split_chunks("One.   Two!  ");
        assert_eq!(texts(&chunks), vec!["One.", "Two!"]);
    }

    #[test]
    fn multibyte_text_splits_cleanly() {
        let chunks = split_chunks("héllo wörld. ça va?");
        assert_eq!(texts(&chunks), vec!["héllo wörld.", "ça va?"]);
    }
}
