//! Wire framing for the word-guessing protocol.
//!
//! The protocol has no handshake and no length prefix: every chunk of bytes a
//! client sends counts as one guess (its first byte), and every reply is a
//! fixed-length reveal line terminated by a newline.

/// Symbol written in place of every position that has not been guessed yet
pub const MASK_SYMBOL: u8 = b'*';

/// Terminator appended to every reveal line
pub const LINE_END: u8 = b'\n';

/// Completion notice written after the final reveal line.
///
/// Exactly 18 bytes on the wire, trailing NUL included.
pub const SUCCESS_MSG: &[u8; 18] = b"Congratulations!\n\0";

/// Word used when the operator does not configure any
pub const DEFAULT_WORD: &str = "hello";

/// Renders the reveal line for a word.
///
/// Revealed positions show the original symbol, everything else is
/// replaced with [`MASK_SYMBOL`]. The result is always `content.len() + 1`
/// bytes long.
pub fn render_reveal(content: &[u8], revealed: &[bool]) -> Vec<u8> {
    debug_assert_eq!(content.len(), revealed.len());

    let mut line = Vec::with_capacity(content.len() + 1);
    line.extend(
        content
            .iter()
            .zip(revealed)
            .map(|(&symbol, &shown)| if shown { symbol } else { MASK_SYMBOL }),
    );
    line.push(LINE_END);
    line
}

/// Extracts the guess from a chunk of client input.
///
/// Only the first byte counts; an empty chunk carries no guess.
pub fn parse_guess(payload: &[u8]) -> Option<u8> {
    payload.first().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_message_length() {
        assert_eq!(SUCCESS_MSG.len(), 18);
        assert!(SUCCESS_MSG.starts_with(b"Congratulations!\n"));
    }

    #[test]
    fn test_render_nothing_revealed() {
        let line = render_reveal(b"cat", &[false, false, false]);
        assert_eq!(line, b"***\n");
    }

    #[test]
    fn test_render_partial_reveal() {
        let line = render_reveal(b"cat", &[true, false, true]);
        assert_eq!(line, b"c*t\n");
    }

    #[test]
    fn test_render_full_reveal() {
        let line = render_reveal(b"hello", &[true; 5]);
        assert_eq!(line, b"hello\n");
    }

    #[test]
    fn test_render_empty_word() {
        assert_eq!(render_reveal(b"", &[]), b"\n");
    }

    #[test]
    fn test_render_length_matches_word() {
        for word in ["a", "ab", "hello", "mississippi"] {
            let revealed = vec![false; word.len()];
            assert_eq!(render_reveal(word.as_bytes(), &revealed).len(), word.len() + 1);
        }
    }

    #[test]
    fn test_parse_guess_takes_first_byte() {
        assert_eq!(parse_guess(b"c\n"), Some(b'c'));
        assert_eq!(parse_guess(b"xyz"), Some(b'x'));
        assert_eq!(parse_guess(b"\n"), Some(b'\n'));
    }

    #[test]
    fn test_parse_guess_empty() {
        assert_eq!(parse_guess(b""), None);
    }
}
