//! Translation client trait and implementations.

pub mod microsoft;
pub mod mock;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use microsoft::MicrosoftTranslator;

/// Request body element: `{"Text": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TextItem {
    #[serde(rename = "Text")]
    pub text: String,
}

/// One candidate translation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Translation {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
}

/// Result for one input text, holding one or more candidates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TranslationResult {
    #[serde(default)]
    pub translations: Vec<Translation>,
}

impl TranslationResult {
    pub fn single(text: impl Into<String>) -> Self {
        Self {
            translations: vec![Translation {
                text: text.into(),
                to: None,
            }],
        }
    }
}

#[derive(Error, Debug)]
pub enum TranslateError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("rate limited (429)")]
    RateLimited { retry_after: Option<Duration> },
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("response contained no translation")]
    Empty,
}

/// A translation endpoint. One call is one request; nothing is batched
/// across calls and nothing is retried.
pub trait Translator: Send + Sync {
    fn name(&self) -> &str;

    /// Translate `texts` into `to` using the model selected by `category`.
    fn translate<'a>(
        &'a self,
        texts: &'a [String],
        to: &'a str,
        category: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<TranslationResult>, TranslateError>> + Send + 'a>>;
}

/// First candidate of the first result, which is all a single-text request
/// ever needs.
pub fn first_candidate(results: Vec<TranslationResult>) -> Result<String, TranslateError> {
    results
        .into_iter()
        .next()
        .and_then(|r| r.translations.into_iter().next())
        .map(|t| t.text)
        .ok_or(TranslateError::Empty)
}

/// Translate a single text and return its first candidate.
pub async fn translate_one(
    translator: &dyn Translator,
    text: &str,
    to: &str,
    category: &str,
) -> Result<String, TranslateError> {
    let texts = [text.to_string()];
    let results = translator.translate(&texts, to, category).await?;
    first_candidate(results)
}
