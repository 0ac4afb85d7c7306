//! Human-readable session codes.
//!
//! A code is `n` words drawn uniformly, with replacement, from a fixed
//! dictionary and joined by single spaces. The list is built once at
//! startup and shared read-only.

use std::path::Path;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::{CryptoError, Result};

/// An immutable dictionary for session codes.
#[derive(Clone, Debug)]
pub struct WordList {
    words: Vec<String>,
}

impl WordList {
    /// Build from in-memory words. Blank entries are dropped.
    pub fn new<I, S>(words: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let words: Vec<String> = words
            .into_iter()
            .map(Into::into)
            .map(|w| w.trim().to_string())
            .filter(|w| !w.is_empty())
            .collect();
        if words.is_empty() {
            return Err(CryptoError::EmptyWordList);
        }
        Ok(Self { words })
    }

    /// Load one word per line, e.g. `/usr/share/dict/words`.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let list = Self::new(text.lines())?;
        tracing::info!(path = %path.display(), words = list.len(), "Loaded word list");
        Ok(list)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// A fresh code of `count` words from the thread-local RNG.
    pub fn generate_code(&self, count: usize) -> String {
        self.generate_code_with(&mut rand::thread_rng(), count)
    }

    /// A code drawn from the supplied RNG.
    pub fn generate_code_with<R: Rng + ?Sized>(&self, rng: &mut R, count: usize) -> String {
        (0..count)
            .filter_map(|_| self.words.choose(rng))
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_empty_list_rejected() {
        assert!(matches!(
            WordList::new(Vec::<String>::new()),
            Err(CryptoError::EmptyWordList)
        ));
        assert!(matches!(
            WordList::new(["", "  "]),
            Err(CryptoError::EmptyWordList)
        ));
    }

    #[test]
    fn test_code_shape() {
        let list = WordList::new(["apple", "banana", "cherry"]).expect("list");
        let code = list.generate_code(6);
        let words: Vec<&str> = code.split(' ').collect();
        assert_eq!(words.len(), 6);
        assert!(words
            .iter()
            .all(|w| ["apple", "banana", "cherry"].contains(w)));
    }

    #[test]
    fn test_single_word_list_is_deterministic() {
        let list = WordList::new(["only"]).expect("list");
        assert_eq!(list.generate_code(3), "only only only");
    }

    #[test]
    fn test_seeded_generation_repeats() {
        let list = WordList::new(["a", "b", "c", "d", "e", "f", "g"]).expect("list");
        let first = list.generate_code_with(&mut StdRng::seed_from_u64(42), 6);
        let second = list.generate_code_with(&mut StdRng::seed_from_u64(42), 6);
        assert_eq!(first, second);
    }

    #[test]
    fn test_zero_words() {
        let list = WordList::new(["a"]).expect("list");
        assert_eq!(list.generate_code(0), "");
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("words");
        std::fs::write(&path, "alpha\n\nbravo\r\ncharlie\n").expect("write");

        let list = WordList::from_file(&path).expect("load");
        assert_eq!(list.len(), 3);
        assert!(WordList::from_file(&dir.path().join("missing")).is_err());
    }
}
