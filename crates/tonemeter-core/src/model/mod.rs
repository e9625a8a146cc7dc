//! Sentiment model: tokenizer, TF-IDF features, logistic regression, and the
//! [`Classifier`] seam the HTTP surface depends on.

pub mod logreg;
pub mod sentiment;
pub mod tfidf;
pub mod tokenize;

use serde::Serialize;

use crate::error::{Result, TonemeterError};

pub use logreg::{LogisticRegression, TrainOptions};
pub use sentiment::SentimentModel;
pub use tfidf::{SparseVec, TfidfVectorizer};

/// Name reported for the built-in model.
pub const DEFAULT_MODEL_NAME: &str = "tfidf+logreg";

/// Winning class of a binary sentiment decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Positive,
    Negative,
}

impl Label {
    pub fn as_str(self) -> &'static str {
        match self {
            Label::Positive => "positive",
            Label::Negative => "negative",
        }
    }
}

/// Outcome of a single prediction.
///
/// `score` is the confidence in `label`, never the raw positive-class
/// probability, so it is always within `[0.5, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub label: Label,
    pub score: f64,
}

impl Prediction {
    /// Turn a positive-class probability into a label and its confidence.
    pub fn from_probability(p_positive: f64) -> Self {
        if p_positive >= 0.5 {
            Self { label: Label::Positive, score: p_positive }
        } else {
            Self { label: Label::Negative, score: 1.0 - p_positive }
        }
    }
}

/// Text classifier shared read-only across concurrent requests.
pub trait Classifier: Send + Sync {
    /// Model identifier reported to clients.
    fn name(&self) -> &str;
    /// Classify already-validated, non-empty text.
    fn predict(&self, text: &str) -> Prediction;
}

/// Trim input text and reject it when nothing is left.
pub fn validate_text(text: &str) -> Result<&str> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(TonemeterError::InvalidInput("text must not be empty".into()));
    }
    Ok(trimmed)
}
