//! TF-IDF vectorizer over word unigrams and bigrams.
//!
//! idf is smoothed as `ln((1 + n) / (1 + df)) + 1`; rows are raw counts times
//! idf, then L2-normalised. Terms outside the fitted vocabulary are ignored.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::tokenize;

/// Sparse row: `(feature index, value)` pairs sorted by index.
pub type SparseVec = Vec<(usize, f64)>;

const NGRAM_RANGE: (usize, usize) = (1, 2);

#[derive(Debug, Clone)]
pub struct TfidfVectorizer {
    vocab: HashMap<String, usize>,
    idf: Vec<f64>,
}

impl TfidfVectorizer {
    /// Learn vocabulary and idf weights from `docs`.
    pub fn fit<S: AsRef<str>>(docs: &[S]) -> Self {
        let mut df: BTreeMap<String, usize> = BTreeMap::new();
        for doc in docs {
            let terms: BTreeSet<String> =
                tokenize::ngrams(doc.as_ref(), NGRAM_RANGE.0, NGRAM_RANGE.1).into_iter().collect();
            for t in terms {
                *df.entry(t).or_insert(0) += 1;
            }
        }

        let n = docs.len() as f64;
        let mut vocab = HashMap::with_capacity(df.len());
        let mut idf = Vec::with_capacity(df.len());
        // BTreeMap iteration keeps feature indices in lexicographic order.
        for (i, (term, count)) in df.into_iter().enumerate() {
            idf.push(((1.0 + n) / (1.0 + count as f64)).ln() + 1.0);
            vocab.insert(term, i);
        }

        Self { vocab, idf }
    }

    /// Number of features.
    pub fn dim(&self) -> usize {
        self.idf.len()
    }

    /// Feature index of a term, if it is in the vocabulary.
    pub fn index_of(&self, term: &str) -> Option<usize> {
        self.vocab.get(term).copied()
    }

    /// Map one document into the fitted feature space.
    pub fn transform(&self, doc: &str) -> SparseVec {
        let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
        for term in tokenize::ngrams(doc, NGRAM_RANGE.0, NGRAM_RANGE.1) {
            if let Some(&i) = self.vocab.get(&term) {
                *counts.entry(i).or_insert(0.0) += 1.0;
            }
        }

        let mut row: SparseVec = counts.into_iter().map(|(i, tf)| (i, tf * self.idf[i])).collect();
        let norm = row.iter().map(|(_, v)| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, v) in row.iter_mut() {
                *v /= norm;
            }
        }
        row
    }
}
