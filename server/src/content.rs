//! Word selection for new sessions

use rand::seq::SliceRandom;
use shared::DEFAULT_WORD;

/// Supplies the hidden word and attempt budget for each accepted connection.
///
/// Both methods are called exactly once per connection, from the dispatch
/// thread.
pub trait ContentGenerator: Send {
    fn generate_content(&mut self) -> Vec<u8>;

    /// Number of misses a player is allowed; one per symbol by default
    fn attempt_budget(&self, content: &[u8]) -> u32 {
        u32::try_from(content.len()).unwrap_or(u32::MAX)
    }
}

/// Hands every session the same word
#[derive(Debug, Clone)]
pub struct FixedWord {
    word: Vec<u8>,
}

impl FixedWord {
    pub fn new(word: impl Into<Vec<u8>>) -> Self {
        Self { word: word.into() }
    }
}

impl Default for FixedWord {
    fn default() -> Self {
        Self::new(DEFAULT_WORD)
    }
}

impl ContentGenerator for FixedWord {
    fn generate_content(&mut self) -> Vec<u8> {
        self.word.clone()
    }
}

/// Picks a word uniformly at random for every session
#[derive(Debug, Clone)]
pub struct WordList {
    words: Vec<Vec<u8>>,
}

impl WordList {
    /// Returns `None` when `words` is empty
    pub fn new<I, W>(words: I) -> Option<Self>
    where
        I: IntoIterator<Item = W>,
        W: Into<Vec<u8>>,
    {
        let words: Vec<Vec<u8>> = words.into_iter().map(Into::into).collect();
        if words.is_empty() {
            None
        } else {
            Some(Self { words })
        }
    }
}

impl ContentGenerator for WordList {
    fn generate_content(&mut self) -> Vec<u8> {
        self.words
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_else(|| DEFAULT_WORD.as_bytes().to_vec())
    }
}

/// Builds the generator matching the configured word list.
///
/// No words means the default word, one word is fixed, more are drawn at random.
pub fn from_words(words: &[String]) -> Box<dyn ContentGenerator> {
    match words {
        [] => Box::new(FixedWord::default()),
        [word] => Box::new(FixedWord::new(word.as_str())),
        _ => match WordList::new(words.iter().map(String::as_str)) {
            Some(list) => Box::new(list),
            None => Box::new(FixedWord::default()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_word_default() {
        let mut generator = FixedWord::default();
        assert_eq!(generator.generate_content(), b"hello");
        assert_eq!(generator.generate_content(), b"hello");
    }

    #[test]
    fn test_default_attempt_budget_is_length() {
        let generator = FixedWord::new("cat");
        assert_eq!(generator.attempt_budget(b"cat"), 3);
        assert_eq!(generator.attempt_budget(b""), 0);
    }

    #[test]
    fn test_word_list_rejects_empty() {
        assert!(WordList::new(Vec::<String>::new()).is_none());
    }

    #[test]
    fn test_word_list_draws_from_list() {
        let words = ["cat", "dog", "owl"];
        let mut generator = WordList::new(words).unwrap();

        for _ in 0..50 {
            let word = generator.generate_content();
            assert!(words.iter().any(|w| w.as_bytes() == word.as_slice()));
        }
    }

    #[test]
    fn test_from_words_selection() {
        assert_eq!(from_words(&[]).generate_content(), b"hello");

        let single = vec!["cat".to_string()];
        assert_eq!(from_words(&single).generate_content(), b"cat");

        let many = vec!["ab".to_string(), "cd".to_string()];
        let word = from_words(&many).generate_content();
        assert!(word == b"ab" || word == b"cd");
    }
}
