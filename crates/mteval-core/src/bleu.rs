//! BLEU scoring with the `13a` tokenizer.
//!
//! Scores are on the 0-100 scale. [`BleuScorer::default`] is configured for
//! single sentences (exponential smoothing, effective order), which is how
//! the evaluation pipeline uses it; [`BleuScorer::corpus`] aggregates n-gram
//! statistics across many sentences before computing one score.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

pub const MAX_ORDER: usize = 4;

static PUNCT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([\{-~\[-`\x20-&\(-\+:-@/])").unwrap());
static PERIOD_COMMA_AFTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"([^0-9])([\.,])").unwrap());
static PERIOD_COMMA_BEFORE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([\.,])([^0-9])").unwrap());
static DIGIT_DASH: Lazy<Regex> = Lazy::new(|| Regex::new(r"([0-9])(-)").unwrap());

/// mteval-v13a tokenization.
pub fn tokenize_13a(line: &str) -> Vec<String> {
    let mut norm = line
        .replace("<skipped>", "")
        .replace("-\n", "")
        .replace('\n', " ");
    if norm.contains('&') {
        norm = norm
            .replace("&quot;", "\"")
            .replace("&amp;", "&")
            .replace("&lt;", "<")
            .replace("&gt;", ">");
    }
    let norm = format!(" {} ", norm);
    let norm = PUNCT.replace_all(&norm, " $1 ");
    let norm = PERIOD_COMMA_AFTER.replace_all(&norm, "$1 $2 ");
    let norm = PERIOD_COMMA_BEFORE.replace_all(&norm, " $1 $2");
    let norm = DIGIT_DASH.replace_all(&norm, "$1 $2 ");
    norm.split_whitespace().map(String::from).collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Smoothing {
    /// NIST geometric sequence smoothing for zero-match orders.
    Exp,
    /// Replace zero matches with this many.
    Floor(f64),
    None,
}

/// Sufficient statistics for BLEU; sums across sentences give corpus BLEU.
#[derive(Debug, Clone, PartialEq)]
pub struct BleuStats {
    pub correct: Vec<usize>,
    pub total: Vec<usize>,
    pub sys_len: usize,
    pub ref_len: usize,
}

impl BleuStats {
    pub fn new(max_order: usize) -> Self {
        Self {
            correct: vec![0; max_order],
            total: vec![0; max_order],
            sys_len: 0,
            ref_len: 0,
        }
    }

    pub fn add(&mut self, other: &BleuStats) {
        for (a, b) in self.correct.iter_mut().zip(&other.correct) {
            *a += b;
        }
        for (a, b) in self.total.iter_mut().zip(&other.total) {
            *a += b;
        }
        self.sys_len += other.sys_len;
        self.ref_len += other.ref_len;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BleuScore {
    pub score: f64,
    pub precisions: Vec<f64>,
    pub brevity_penalty: f64,
    pub sys_len: usize,
    pub ref_len: usize,
}

impl BleuScore {
    fn zero(stats: &BleuStats) -> Self {
        Self {
            score: 0.0,
            precisions: vec![0.0; stats.correct.len()],
            brevity_penalty: 0.0,
            sys_len: stats.sys_len,
            ref_len: stats.ref_len,
        }
    }
}

impl std::fmt::Display for BleuScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let precisions: Vec<String> = self.precisions.iter().map(|p| format!("{p:.1}")).collect();
        write!(
            f,
            "BLEU = {:.2} {} (BP = {:.3} ratio = {:.3} hyp_len = {} ref_len = {})",
            self.score,
            precisions.join("/"),
            self.brevity_penalty,
            if self.ref_len > 0 {
                self.sys_len as f64 / self.ref_len as f64
            } else {
                0.0
            },
            self.sys_len,
            self.ref_len
        )
    }
}

#[derive(Debug, Clone)]
pub struct BleuScorer {
    pub max_order: usize,
    pub smoothing: Smoothing,
    /// Only average over orders the hypothesis is long enough to have.
    pub effective_order: bool,
    pub lowercase: bool,
}

impl Default for BleuScorer {
    fn default() -> Self {
        Self {
            max_order: MAX_ORDER,
            smoothing: Smoothing::Exp,
            effective_order: true,
            lowercase: false,
        }
    }
}

fn ngram_counts(tokens: &[String], n: usize) -> HashMap<&[String], usize> {
    let mut counts = HashMap::new();
    if tokens.len() >= n {
        for window in tokens.windows(n) {
            *counts.entry(window).or_insert(0) += 1;
        }
    }
    counts
}

impl BleuScorer {
    /// Settings for corpus-level aggregation (no effective order).
    pub fn corpus() -> Self {
        Self {
            effective_order: false,
            ..Self::default()
        }
    }

    fn tokens(&self, text: &str) -> Vec<String> {
        if self.lowercase {
            tokenize_13a(&text.to_lowercase())
        } else {
            tokenize_13a(text)
        }
    }

    /// N-gram match statistics of `hypothesis` against `reference`.
    pub fn stats(&self, hypothesis: &str, reference: &str) -> BleuStats {
        let hyp = self.tokens(hypothesis);
        let reference = self.tokens(reference);
        let mut stats = BleuStats::new(self.max_order);
        stats.sys_len = hyp.len();
        stats.ref_len = reference.len();
        for n in 1..=self.max_order {
            let hyp_counts = ngram_counts(&hyp, n);
            let ref_counts = ngram_counts(&reference, n);
            stats.total[n - 1] = hyp.len().saturating_sub(n - 1);
            stats.correct[n - 1] = hyp_counts
                .iter()
                .map(|(gram, &count)| count.min(ref_counts.get(gram).copied().unwrap_or(0)))
                .sum();
        }
        stats
    }

    /// Turn accumulated statistics into a score.
    pub fn compute(&self, stats: &BleuStats) -> BleuScore {
        if stats.sys_len == 0 {
            return BleuScore::zero(stats);
        }

        let mut precisions = vec![0.0; self.max_order];
        let mut smooth_mteval = 1.0;
        let mut effective_order = self.max_order;
        for n in 1..=self.max_order {
            let total = stats.total[n - 1];
            if total == 0 {
                break;
            }
            if self.effective_order {
                effective_order = n;
            }
            let correct = stats.correct[n - 1];
            precisions[n - 1] = if correct == 0 {
                match self.smoothing {
                    Smoothing::Exp => {
                        smooth_mteval *= 2.0;
                        100.0 / (smooth_mteval * total as f64)
                    }
                    Smoothing::Floor(value) => 100.0 * value / total as f64,
                    Smoothing::None => 0.0,
                }
            } else {
                100.0 * correct as f64 / total as f64
            };
        }

        let brevity_penalty = if stats.sys_len < stats.ref_len {
            (1.0 - stats.ref_len as f64 / stats.sys_len as f64).exp()
        } else {
            1.0
        };

        let log_sum: f64 = precisions[..effective_order]
            .iter()
            .map(|&p| if p == 0.0 { -9_999_999_999.0 } else { p.ln() })
            .sum();
        let score = brevity_penalty * (log_sum / effective_order as f64).exp();

        BleuScore {
            score: score.clamp(0.0, 100.0),
            precisions,
            brevity_penalty,
            sys_len: stats.sys_len,
            ref_len: stats.ref_len,
        }
    }

    /// Score a machine translation against its human reference.
    pub fn score(&self, hypothesis: &str, reference: &str) -> BleuScore {
        if hypothesis.trim().is_empty() {
            return BleuScore::zero(&BleuStats::new(self.max_order));
        }
        self.compute(&self.stats(hypothesis, reference))
    }

    /// One score over many `(hypothesis, reference)` pairs.
    pub fn corpus_score<'a>(
        &self,
        pairs: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> BleuScore {
        let mut stats = BleuStats::new(self.max_order);
        for (hyp, reference) in pairs {
            stats.add(&self.stats(hyp, reference));
        }
        self.compute(&stats)
    }
}

/// Sentence BLEU with default settings, 0 for an empty hypothesis.
pub fn sentence_bleu(hypothesis: &str, reference: &str) -> f64 {
    BleuScorer::default().score(hypothesis, reference).score
}
