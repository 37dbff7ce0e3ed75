//! The one tokenizer shared by the posting-list writer (`docstore-storage`)
//! and the lexical scorer (`docstore-lexical`), so both sides of the index
//! agree on what a "term" is without one crate depending on the other.
//!
//! Lowercase, strip everything that isn't alphanumeric, split on
//! whitespace, drop empty tokens.

use std::collections::BTreeMap;

pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .map(|s| s.to_string())
        .collect()
}

/// Term -> count within a single piece of text, the unit posting lists are
/// built from.
pub fn term_frequencies(text: &str) -> BTreeMap<String, u32> {
    let mut freqs = BTreeMap::new();
    for term in tokenize(text) {
        *freqs.entry(term).or_insert(0) += 1;
    }
    freqs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_strips_punctuation() {
        assert_eq!(
            tokenize("Hello, World! It's 2026."),
            vec!["hello", "world", "it", "s", "2026"]
        );
    }

    #[test]
    fn empty_and_whitespace_only_text_yields_no_tokens() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   \t\n  ").is_empty());
    }

    #[test]
    fn term_frequencies_count_repeats() {
        let freqs = term_frequencies("the cat sat on the mat the cat watched");
        assert_eq!(freqs.get("the"), Some(&3));
        assert_eq!(freqs.get("cat"), Some(&2));
        assert_eq!(freqs.get("sat"), Some(&1));
    }
}
