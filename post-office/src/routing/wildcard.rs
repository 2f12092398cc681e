//! Hierarchical address matching.

use crate::address::Address;

pub const DEFAULT_DELIMITER: char = '.';
pub const DEFAULT_ANY_WORDS: char = '#';
pub const DEFAULT_SINGLE_WORD: char = '*';

/// Word delimiter and wildcard tokens for hierarchical addresses.
///
/// `orders.*` matches `orders.eu` but not `orders.eu.retail`;
/// `orders.#` matches `orders`, `orders.eu` and `orders.eu.retail`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WildcardConfiguration {
    delimiter: char,
    any_words: String,
    single_word: String,
}

impl WildcardConfiguration {
    pub fn new(delimiter: char, any_words: char, single_word: char) -> Self {
        Self {
            delimiter,
            any_words: any_words.to_string(),
            single_word: single_word.to_string(),
        }
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    pub fn is_wildcard(&self, address: &Address) -> bool {
        address
            .as_str()
            .split(self.delimiter)
            .any(|word| word == self.any_words || word == self.single_word)
    }

    /// Whether the `pattern` address covers the concrete `address`.
    pub fn matches(&self, pattern: &Address, address: &Address) -> bool {
        let pattern: Vec<&str> = pattern.as_str().split(self.delimiter).collect();
        let words: Vec<&str> = address.as_str().split(self.delimiter).collect();
        self.match_words(&pattern, &words)
    }

    fn match_words(&self, pattern: &[&str], words: &[&str]) -> bool {
        match pattern.split_first() {
            None => words.is_empty(),
            Some((head, rest)) if *head == self.any_words => {
                (0..=words.len()).any(|skip| self.match_words(rest, &words[skip..]))
            }
            Some((head, rest)) => match words.split_first() {
                Some((word, remaining)) if *head == self.single_word || head == word => {
                    self.match_words(rest, remaining)
                }
                _ => false,
            },
        }
    }
}

impl Default for WildcardConfiguration {
    fn default() -> Self {
        Self::new(DEFAULT_DELIMITER, DEFAULT_ANY_WORDS, DEFAULT_SINGLE_WORD)
    }
}
