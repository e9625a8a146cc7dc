//! Word and n-gram extraction.
//!
//! Tokens are lowercase runs of at least two word characters (alphanumeric or
//! `_`). Single-character words such as "i" or "a" are dropped before n-grams
//! are formed.

const MIN_TOKEN_CHARS: usize = 2;

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Split `text` into lowercase word tokens.
pub fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !is_word_char(c))
        .filter(|w| w.chars().count() >= MIN_TOKEN_CHARS)
        .map(str::to_string)
        .collect()
}

/// Word n-grams for every `n` in `min_n..=max_n`, unigrams first.
pub fn ngrams(text: &str, min_n: usize, max_n: usize) -> Vec<String> {
    let tokens = words(text);
    let mut out = Vec::new();
    for n in min_n.max(1)..=max_n {
        if n == 1 {
            out.extend(tokens.iter().cloned());
            continue;
        }
        out.extend(tokens.windows(n).map(|w| w.join(" ")));
    }
    out
}
