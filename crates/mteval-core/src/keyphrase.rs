//! TextRank keyphrase extraction over tagged tokens.

use std::collections::{HashMap, HashSet};

use crate::tagger::{Pos, Token};

pub const DAMPING: f64 = 0.85;
pub const TOLERANCE: f64 = 1e-6;
pub const MAX_ITERATIONS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeWeighting {
    /// Every co-occurring pair gets weight 1.
    Binary,
    /// Weight is the number of windows a pair co-occurs in.
    Count,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalize {
    Lemma,
    Lower,
    None,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextRankParams {
    pub include_pos: Vec<Pos>,
    pub window_size: usize,
    pub edge_weighting: EdgeWeighting,
    pub position_bias: bool,
    pub topn: usize,
    pub normalize: Normalize,
}

impl TextRankParams {
    /// Settings for source-language segments.
    pub fn source() -> Self {
        Self {
            include_pos: vec![Pos::Noun, Pos::Propn, Pos::Adj, Pos::Verb],
            window_size: 10,
            edge_weighting: EdgeWeighting::Binary,
            position_bias: false,
            topn: 5,
            normalize: Normalize::Lemma,
        }
    }

    /// Settings for target-language segments: a tighter window and more
    /// candidates to match against.
    pub fn target() -> Self {
        Self {
            window_size: 5,
            topn: 10,
            ..Self::source()
        }
    }
}

fn normalized(token: &Token, normalize: Normalize) -> String {
    match normalize {
        Normalize::Lemma => token.lemma.clone(),
        Normalize::Lower => token.text.to_lowercase(),
        Normalize::None => token.text.clone(),
    }
}

/// Weighted undirected co-occurrence graph over interned terms.
struct Graph {
    terms: Vec<String>,
    edges: Vec<HashMap<usize, f64>>,
}

impl Graph {
    fn build(
        terms: Vec<String>,
        sequence: &[usize],
        window: usize,
        weighting: EdgeWeighting,
    ) -> Self {
        let mut edges = vec![HashMap::new(); terms.len()];
        let window = window.max(2);
        let mut seen: HashSet<(usize, usize)> = HashSet::new();
        for start in 0..sequence.len() {
            let end = (start + window).min(sequence.len());
            let anchor = sequence[start];
            for &other in &sequence[start + 1..end] {
                if other == anchor {
                    continue;
                }
                let key = (anchor.min(other), anchor.max(other));
                match weighting {
                    EdgeWeighting::Binary => {
                        if seen.insert(key) {
                            *edges[anchor].entry(other).or_insert(0.0) += 1.0;
                            *edges[other].entry(anchor).or_insert(0.0) += 1.0;
                        }
                    }
                    EdgeWeighting::Count => {
                        *edges[anchor].entry(other).or_insert(0.0) += 1.0;
                        *edges[other].entry(anchor).or_insert(0.0) += 1.0;
                    }
                }
            }
        }
        Self { terms, edges }
    }

    /// Weighted PageRank with optional personalisation. Dangling nodes
    /// redistribute their rank by the personalisation vector.
    fn pagerank(&self, personalization: &[f64]) -> Vec<f64> {
        let n = self.edges.len();
        if n == 0 {
            return Vec::new();
        }
        let out_weight: Vec<f64> = self.edges.iter().map(|e| e.values().sum()).collect();
        let mut rank = vec![1.0 / n as f64; n];

        for iteration in 0..MAX_ITERATIONS {
            let dangling: f64 = (0..n)
                .filter(|&j| out_weight[j] == 0.0)
                .map(|j| rank[j])
                .sum();
            let mut next: Vec<f64> = personalization
                .iter()
                .map(|&p| (1.0 - DAMPING) * p + DAMPING * dangling * p)
                .collect();
            for (j, neighbours) in self.edges.iter().enumerate() {
                if out_weight[j] == 0.0 {
                    continue;
                }
                for (&i, &w) in neighbours {
                    next[i] += DAMPING * rank[j] * w / out_weight[j];
                }
            }
            let delta: f64 = next.iter().zip(&rank).map(|(a, b)| (a - b).abs()).sum();
            rank = next;
            if delta < n as f64 * TOLERANCE {
                tracing::trace!(iteration, "pagerank converged");
                break;
            }
        }
        rank
    }
}

/// Rank the keyphrases of a tagged text.
///
/// Words whose tag is in `include_pos` form a co-occurrence graph; each
/// maximal run of such words in the text is a candidate, scored by the sum
/// of its word ranks. Returns at most `topn` `(phrase, score)` pairs,
/// highest first.
pub fn textrank(tokens: &[Token], params: &TextRankParams) -> Vec<(String, f64)> {
    let included = |t: &Token| params.include_pos.contains(&t.pos);

    let mut index: HashMap<String, usize> = HashMap::new();
    let mut terms: Vec<String> = Vec::new();
    let mut sequence: Vec<usize> = Vec::new();
    let mut bias: Vec<f64> = Vec::new();
    for (position, token) in tokens.iter().enumerate() {
        if !included(token) {
            continue;
        }
        let term = normalized(token, params.normalize);
        let id = *index.entry(term.clone()).or_insert_with(|| {
            terms.push(term);
            bias.push(0.0);
            terms.len() - 1
        });
        bias[id] += 1.0 / (position as f64 + 1.0);
        sequence.push(id);
    }
    if terms.is_empty() {
        return Vec::new();
    }

    let graph = Graph::build(terms, &sequence, params.window_size, params.edge_weighting);
    let personalization: Vec<f64> = if params.position_bias {
        let total: f64 = bias.iter().sum();
        bias.iter().map(|b| b / total).collect()
    } else {
        vec![1.0 / graph.terms.len() as f64; graph.terms.len()]
    };
    let ranks = graph.pagerank(&personalization);

    // Maximal runs of included tokens, in text order.
    let mut candidates: Vec<(String, f64)> = Vec::new();
    let mut run: Vec<usize> = Vec::new();
    let flush = |run: &mut Vec<usize>, out: &mut Vec<(String, f64)>| {
        if run.is_empty() {
            return;
        }
        let phrase = run
            .iter()
            .map(|&id| graph.terms[id].as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let score: f64 = run.iter().map(|&id| ranks[id]).sum();
        out.push((phrase, score));
        run.clear();
    };
    for token in tokens {
        if included(token) {
            let term = normalized(token, params.normalize);
            if let Some(&id) = index.get(&term) {
                run.push(id);
            }
        } else {
            flush(&mut run, &mut candidates);
        }
    }
    flush(&mut run, &mut candidates);

    let mut seen: HashSet<String> = HashSet::new();
    candidates.retain(|(phrase, _)| seen.insert(phrase.to_lowercase()));
    // Stable sort keeps first occurrence ahead on ties.
    candidates.sort_by(|a, b| b.1.total_cmp(&a.1));
    candidates.truncate(params.topn);
    candidates
}
