//! The built-in sentiment model, trained once from a fixed phrase list.

use crate::error::Result;

use super::logreg::{LogisticRegression, TrainOptions};
use super::tfidf::TfidfVectorizer;
use super::{Classifier, Prediction, DEFAULT_MODEL_NAME};

const POSITIVE: [&str; 6] = [
    "i love this",
    "this is awesome",
    "great work",
    "excellent result",
    "happy with the service",
    "fantastic experience",
];

const NEGATIVE: [&str; 6] = [
    "i hate this",
    "this is terrible",
    "bad work",
    "awful result",
    "not happy",
    "horrible experience",
];

/// TF-IDF features feeding a logistic regression.
///
/// Parameters are frozen after [`SentimentModel::train`]; the model is safe to
/// share across threads without locking.
#[derive(Debug, Clone)]
pub struct SentimentModel {
    name: String,
    vectorizer: TfidfVectorizer,
    clf: LogisticRegression,
}

impl SentimentModel {
    /// Train on the built-in phrase list.
    pub fn train() -> Result<Self> {
        Self::train_named(DEFAULT_MODEL_NAME)
    }

    /// Train on the built-in phrase list, reporting `name` to clients.
    pub fn train_named(name: impl Into<String>) -> Result<Self> {
        let docs: Vec<&str> = POSITIVE.iter().chain(NEGATIVE.iter()).copied().collect();
        let targets: Vec<bool> = POSITIVE.iter().map(|_| true).chain(NEGATIVE.iter().map(|_| false)).collect();
        Self::fit(name, &docs, &targets)
    }

    /// Train on an arbitrary labelled corpus.
    pub fn fit(name: impl Into<String>, docs: &[&str], targets: &[bool]) -> Result<Self> {
        let vectorizer = TfidfVectorizer::fit(docs);
        let rows: Vec<_> = docs.iter().map(|d| vectorizer.transform(d)).collect();
        let clf = LogisticRegression::fit(&rows, targets, vectorizer.dim(), &TrainOptions::default())?;

        tracing::debug!(
            features = vectorizer.dim(),
            samples = docs.len(),
            iterations = clf.iterations(),
            "sentiment model trained"
        );

        Ok(Self { name: name.into(), vectorizer, clf })
    }

    /// Raw positive-class probability.
    pub fn probability(&self, text: &str) -> f64 {
        self.clf.predict_proba(&self.vectorizer.transform(text))
    }

    pub fn feature_count(&self) -> usize {
        self.vectorizer.dim()
    }
}

impl Classifier for SentimentModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn predict(&self, text: &str) -> Prediction {
        Prediction::from_probability(self.probability(text))
    }
}
