//! Sentence-by-sentence evaluation of translation models against a human
//! reference.
//!
//! Every aligned source sentence is sent to every category in turn, one
//! request at a time. A failed request is recorded against its cell and the
//! scan moves on; only cancellation stops the batch.

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::align::AlignedCorpus;
use crate::bleu::BleuScorer;
use crate::translate::{Translator, translate_one};

#[derive(Error, Debug)]
pub enum EvaluateError {
    #[error("evaluation cancelled after {completed} of {total} sentences")]
    Cancelled { completed: usize, total: usize },
    #[error("no categories to evaluate")]
    NoCategories,
}

/// What one category produced for one sentence.
#[derive(Debug, Clone, PartialEq)]
pub enum CategoryOutcome {
    Translated { text: String, score: f64 },
    Failed { error: String },
}

impl CategoryOutcome {
    pub fn text(&self) -> Option<&str> {
        match self {
            CategoryOutcome::Translated { text, .. } => Some(text),
            CategoryOutcome::Failed { .. } => None,
        }
    }

    pub fn score(&self) -> Option<f64> {
        match self {
            CategoryOutcome::Translated { score, .. } => Some(*score),
            CategoryOutcome::Failed { .. } => None,
        }
    }
}

/// One aligned sentence with the outcome of every category, in category
/// order.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub index: usize,
    pub source: String,
    pub reference: String,
    pub outcomes: Vec<CategoryOutcome>,
}

/// Progress events emitted during evaluation.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Sentence {
        index: usize,
        total: usize,
    },
    Translated {
        index: usize,
        category: String,
        score: f64,
    },
    Failed {
        index: usize,
        category: String,
        message: String,
    },
}

/// Per-category aggregate over a finished evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct CategorySummary {
    pub category: String,
    pub translated: usize,
    pub failed: usize,
    /// Mean of the sentence scores of translated sentences.
    pub mean_sentence_bleu: f64,
    /// BLEU over the n-gram statistics of all translated sentences.
    pub corpus_bleu: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub categories: Vec<String>,
    pub rows: Vec<ReportRow>,
}

impl Evaluation {
    /// `(sentence index, translated text, score)` for one category, skipping
    /// failed cells.
    pub fn per_category(&self, category: usize) -> impl Iterator<Item = (usize, &str, f64)> + '_ {
        self.rows.iter().filter_map(move |row| match row.outcomes.get(category) {
            Some(CategoryOutcome::Translated { text, score }) => {
                Some((row.index, text.as_str(), *score))
            }
            _ => None,
        })
    }

    pub fn failures(&self) -> usize {
        self.rows
            .iter()
            .flat_map(|r| &r.outcomes)
            .filter(|o| matches!(o, CategoryOutcome::Failed { .. }))
            .count()
    }

    pub fn summary(&self) -> Vec<CategorySummary> {
        let corpus = BleuScorer::corpus();
        self.categories
            .iter()
            .enumerate()
            .map(|(ci, category)| {
                let scores: Vec<f64> = self.per_category(ci).map(|(_, _, s)| s).collect();
                let translated = scores.len();
                let mean_sentence_bleu = if translated > 0 {
                    scores.iter().sum::<f64>() / translated as f64
                } else {
                    0.0
                };
                let pairs = self.rows.iter().filter_map(|row| {
                    row.outcomes
                        .get(ci)
                        .and_then(CategoryOutcome::text)
                        .map(|text| (text, row.reference.as_str()))
                });
                CategorySummary {
                    category: category.clone(),
                    translated,
                    failed: self.rows.len() - translated,
                    mean_sentence_bleu,
                    corpus_bleu: corpus.corpus_score(pairs).score,
                }
            })
            .collect()
    }
}

/// Translate and score every sentence of `corpus` with every category.
///
/// The machine translation is scored as the hypothesis against the aligned
/// human reference. The returned evaluation always has one row per aligned
/// sentence and one outcome per category in each row.
pub async fn evaluate(
    corpus: &AlignedCorpus,
    categories: &[String],
    target_language: &str,
    translator: &dyn Translator,
    scorer: &BleuScorer,
    progress: impl Fn(ProgressEvent),
    cancel: &CancellationToken,
) -> Result<Evaluation, EvaluateError> {
    if categories.is_empty() {
        return Err(EvaluateError::NoCategories);
    }

    let total = corpus.len();
    let mut rows = Vec::with_capacity(total);

    for pair in corpus.iter() {
        if cancel.is_cancelled() {
            return Err(EvaluateError::Cancelled {
                completed: pair.index,
                total,
            });
        }
        progress(ProgressEvent::Sentence {
            index: pair.index,
            total,
        });
        tracing::debug!(index = pair.index, total, "processing sentence");

        let mut outcomes = Vec::with_capacity(categories.len());
        for category in categories {
            let outcome =
                match translate_one(translator, pair.source, target_language, category).await {
                    Ok(text) => {
                        let score = scorer.score(&text, pair.reference).score;
                        tracing::debug!(
                            index = pair.index,
                            category = %category,
                            score,
                            "translated"
                        );
                        progress(ProgressEvent::Translated {
                            index: pair.index,
                            category: category.clone(),
                            score,
                        });
                        CategoryOutcome::Translated { text, score }
                    }
                    Err(e) => {
                        tracing::warn!(
                            index = pair.index,
                            category = %category,
                            error = %e,
                            "translation failed, skipping"
                        );
                        progress(ProgressEvent::Failed {
                            index: pair.index,
                            category: category.clone(),
                            message: e.to_string(),
                        });
                        CategoryOutcome::Failed {
                            error: e.to_string(),
                        }
                    }
                };
            outcomes.push(outcome);
        }

        rows.push(ReportRow {
            index: pair.index,
            source: pair.source.to_string(),
            reference: pair.reference.to_string(),
            outcomes,
        });
    }

    Ok(Evaluation {
        categories: categories.to_vec(),
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::mock::{MockResponse, MockTranslator};
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn corpus(pairs: &[(&str, &str)]) -> AlignedCorpus {
        AlignedCorpus::new(
            pairs.iter().map(|(s, _)| s.to_string()).collect(),
            pairs.iter().map(|(_, r)| r.to_string()).collect(),
        )
        .unwrap()
    }

    fn cats(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn one_row_per_sentence_one_outcome_per_category() {
        let corpus = corpus(&[("a b", "x y"), ("c d", "z w"), ("e f", "u v")]);
        let mock = MockTranslator::new(MockResponse::Echo);
        let eval = evaluate(
            &corpus,
            &cats(&["one", "two"]),
            "fr",
            &mock,
            &BleuScorer::default(),
            |_| {},
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(eval.rows.len(), 3);
        assert!(eval.rows.iter().all(|r| r.outcomes.len() == 2));
        assert_eq!(mock.call_count(), 6);
        // Sentence-major order: every category for sentence 0 first.
        let calls = mock.calls();
        assert_eq!(calls[0], ("a b".to_string(), "one".to_string()));
        assert_eq!(calls[1], ("a b".to_string(), "two".to_string()));
        assert_eq!(calls[2], ("c d".to_string(), "one".to_string()));
    }

    #[tokio::test]
    async fn reference_echo_scores_maximum() {
        let corpus = corpus(&[
            ("The cat sat.", "Le chat s'est assis."),
            ("Good morning.", "Bonjour."),
        ]);
        let table: HashMap<String, String> = [
            ("The cat sat.", "Le chat s'est assis."),
            ("Good morning.", "Bonjour."),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let mock = MockTranslator::new(MockResponse::Lookup(table));
        let eval = evaluate(
            &corpus,
            &cats(&["general"]),
            "fr",
            &mock,
            &BleuScorer::default(),
            |_| {},
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        for row in &eval.rows {
            assert!((row.outcomes[0].score().unwrap() - 100.0).abs() < 1e-9);
        }
    }

    #[tokio::test]
    async fn failures_are_recorded_and_skipped() {
        let corpus = corpus(&[("one", "un"), ("two", "deux")]);
        let mock = MockTranslator::new(MockResponse::Echo).with_category("bad", MockResponse::Fail(500));
        let events = Mutex::new(Vec::new());
        let eval = evaluate(
            &corpus,
            &cats(&["good", "bad"]),
            "fr",
            &mock,
            &BleuScorer::default(),
            |e| events.lock().unwrap().push(e),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(eval.rows.len(), 2);
        assert_eq!(eval.failures(), 2);
        assert!(matches!(eval.rows[0].outcomes[1], CategoryOutcome::Failed { .. }));
        assert_eq!(eval.rows[0].outcomes[0].text(), Some("one"));
        let failed = events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e, ProgressEvent::Failed { .. }))
            .count();
        assert_eq!(failed, 2);

        let summary = eval.summary();
        assert_eq!(summary[0].translated, 2);
        assert_eq!(summary[1].translated, 0);
        assert_eq!(summary[1].failed, 2);
        assert_eq!(summary[1].mean_sentence_bleu, 0.0);
    }

    #[tokio::test]
    async fn empty_translation_scores_zero() {
        let corpus = corpus(&[("Hello there friend", "Bonjour mon ami")]);
        let mock = MockTranslator::new(MockResponse::Fixed(String::new()));
        let eval = evaluate(
            &corpus,
            &cats(&["c"]),
            "fr",
            &mock,
            &BleuScorer::default(),
            |_| {},
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(eval.rows[0].outcomes[0].score(), Some(0.0));
    }

    #[tokio::test]
    async fn cancellation_stops_the_batch() {
        let corpus = corpus(&[("a", "b")]);
        let mock = MockTranslator::new(MockResponse::Echo);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = evaluate(
            &corpus,
            &cats(&["c"]),
            "fr",
            &mock,
            &BleuScorer::default(),
            |_| {},
            &cancel,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, EvaluateError::Cancelled { completed: 0, total: 1 }));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn no_categories_is_an_error() {
        let corpus = corpus(&[("a", "b")]);
        let mock = MockTranslator::new(MockResponse::Echo);
        assert!(matches!(
            evaluate(&corpus, &[], "fr", &mock, &BleuScorer::default(), |_| {}, &CancellationToken::new()).await,
            Err(EvaluateError::NoCategories)
        ));
    }

    #[test]
    fn per_category_skips_failed_cells() {
        let eval = Evaluation {
            categories: cats(&["c"]),
            rows: vec![
                ReportRow {
                    index: 0,
                    source: "s0".into(),
                    reference: "r0".into(),
                    outcomes: vec![CategoryOutcome::Failed { error: "x".into() }],
                },
                ReportRow {
                    index: 1,
                    source: "s1".into(),
                    reference: "r1".into(),
                    outcomes: vec![CategoryOutcome::Translated {
                        text: "t1".into(),
                        score: 42.0,
                    }],
                },
            ],
        };
        let cells: Vec<_> = eval.per_category(0).collect();
        assert_eq!(cells, vec![(1, "t1", 42.0)]);
    }
}
