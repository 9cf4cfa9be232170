//! Mock translator for testing.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{TranslateError, TranslationResult, Translator};

/// A configurable mock response for [`MockTranslator`].
#[derive(Clone, Debug)]
pub enum MockResponse {
    /// Return the same text for every input.
    Fixed(String),
    /// Return each input unchanged.
    Echo,
    /// Look each input up; inputs missing from the table fail with 404.
    Lookup(HashMap<String, String>),
    /// Return a result with no candidate translations.
    Empty,
    /// Simulate an HTTP error with this status.
    Fail(u16),
}

/// A hand-rolled mock implementing [`Translator`] for tests.
///
/// Supports:
/// - A fixed response (used for every call), **or**
/// - A sequence of responses (one per call, repeating the last once exhausted).
/// - Per-category overrides.
/// - A log of `(text, category)` pairs for every call.
pub struct MockTranslator {
    /// Each call pops the next response; the fallback is used once empty.
    responses: Mutex<Vec<MockResponse>>,
    fallback: MockResponse,
    per_category: HashMap<String, MockResponse>,
    calls: Mutex<Vec<(String, String)>>,
    call_count: AtomicUsize,
}

impl MockTranslator {
    /// Create a mock that always answers with `response`.
    pub fn new(response: MockResponse) -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            fallback: response,
            per_category: HashMap::new(),
            calls: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
        }
    }

    /// Create a mock that answers with each response in order, repeating the
    /// last one.
    pub fn with_sequence(mut responses: Vec<MockResponse>) -> Self {
        assert!(
            !responses.is_empty(),
            "sequence must have at least one response"
        );
        // Reverse so we can pop() from the front cheaply.
        responses.reverse();
        let fallback = responses[0].clone();
        let mut mock = Self::new(fallback);
        mock.responses = Mutex::new(responses);
        mock
    }

    /// Answer calls for `category` with `response`, ignoring the sequence.
    pub fn with_category(mut self, category: &str, response: MockResponse) -> Self {
        self.per_category.insert(category.to_string(), response);
        self
    }

    /// How many times `translate()` has been called.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Every `(text, category)` pair seen so far, in call order.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn next_response(&self, category: &str) -> MockResponse {
        if let Some(r) = self.per_category.get(category) {
            return r.clone();
        }
        match self.responses.lock() {
            Ok(mut seq) => seq.pop().unwrap_or_else(|| self.fallback.clone()),
            Err(_) => self.fallback.clone(),
        }
    }
}

fn respond(
    response: &MockResponse,
    texts: &[String],
) -> Result<Vec<TranslationResult>, TranslateError> {
    match response {
        MockResponse::Fixed(text) => Ok(texts
            .iter()
            .map(|_| TranslationResult::single(text.clone()))
            .collect()),
        MockResponse::Echo => Ok(texts
            .iter()
            .map(|t| TranslationResult::single(t.clone()))
            .collect()),
        MockResponse::Lookup(table) => texts
            .iter()
            .map(|t| {
                table
                    .get(t)
                    .map(|hit| TranslationResult::single(hit.clone()))
                    .ok_or_else(|| TranslateError::Status {
                        status: 404,
                        body: format!("no mock translation for {t:?}"),
                    })
            })
            .collect(),
        MockResponse::Empty => Ok(vec![TranslationResult {
            translations: vec![],
        }]),
        MockResponse::Fail(status) => Err(TranslateError::Status {
            status: *status,
            body: "mock failure".into(),
        }),
    }
}

impl Translator for MockTranslator {
    fn name(&self) -> &str {
        "Mock"
    }

    fn translate<'a>(
        &'a self,
        texts: &'a [String],
        _to: &'a str,
        category: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<TranslationResult>, TranslateError>> + Send + 'a>>
    {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut calls) = self.calls.lock() {
            for t in texts {
                calls.push((t.clone(), category.to_string()));
            }
        }
        let result = respond(&self.next_response(category), texts);
        Box::pin(async move { result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::translate_one;

    #[tokio::test]
    async fn sequence_repeats_last() {
        let mock = MockTranslator::with_sequence(vec![
            MockResponse::Fixed("one".into()),
            MockResponse::Fail(500),
        ]);
        assert_eq!(translate_one(&mock, "x", "fr", "c").await.unwrap(), "one");
        assert!(translate_one(&mock, "x", "fr", "c").await.is_err());
        assert!(translate_one(&mock, "x", "fr", "c").await.is_err());
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn category_override_and_call_log() {
        let mock = MockTranslator::new(MockResponse::Echo)
            .with_category("broken", MockResponse::Fail(503));
        assert_eq!(translate_one(&mock, "hi", "fr", "ok").await.unwrap(), "hi");
        assert!(translate_one(&mock, "hi", "fr", "broken").await.is_err());
        assert_eq!(
            mock.calls(),
            vec![
                ("hi".to_string(), "ok".to_string()),
                ("hi".to_string(), "broken".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn empty_response_has_no_candidate() {
        let mock = MockTranslator::new(MockResponse::Empty);
        assert!(matches!(
            translate_one(&mock, "hi", "fr", "c").await,
            Err(TranslateError::Empty)
        ));
    }
}
