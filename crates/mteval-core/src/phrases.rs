//! Harvest multi-word phrase pairs from a translation memory.
//!
//! For each translation unit the keyphrases of both sides are extracted.
//! Each multi-word source keyphrase not yet in the dictionary is sent to the
//! translation model; when the model's output matches one of the target
//! side's multi-word keyphrases exactly (ignoring case and surrounding
//! whitespace), the pair is recorded.

use tokio_util::sync::CancellationToken;

use crate::keyphrase::{TextRankParams, textrank};
use crate::phrase_dict::{DictionaryError, PhraseDictionary};
use crate::tagger::Tagger;
use crate::tmx::TranslationUnit;
use crate::translate::{Translator, translate_one};

/// Inclusive range of translation-unit indices to process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchWindow {
    pub start: usize,
    pub end: usize,
}

impl Default for BatchWindow {
    fn default() -> Self {
        Self { start: 0, end: 100 }
    }
}

impl BatchWindow {
    pub fn contains(&self, index: usize) -> bool {
        index >= self.start && index <= self.end
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub units_processed: usize,
    pub candidates_considered: usize,
    pub translations_requested: usize,
    pub translation_failures: usize,
    pub entries_added: usize,
}

/// Everything the builder needs besides the units and the dictionary.
pub struct PhraseBuilder<'a> {
    pub translator: &'a dyn Translator,
    pub source_tagger: &'a dyn Tagger,
    pub target_tagger: &'a dyn Tagger,
    pub source_params: TextRankParams,
    pub target_params: TextRankParams,
    pub target_language: &'a str,
    pub category: &'a str,
}

fn is_multi_word(phrase: &str) -> bool {
    phrase.split_whitespace().nth(1).is_some()
}

fn same_phrase(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

impl PhraseBuilder<'_> {
    /// Process the units whose [`TranslationUnit::position`] falls inside
    /// `window`, adding matched pairs to
    /// `dictionary`. Translation failures are logged and counted; dictionary
    /// write failures abort.
    pub async fn build(
        &self,
        units: &[TranslationUnit],
        window: BatchWindow,
        dictionary: &mut PhraseDictionary,
        cancel: &CancellationToken,
    ) -> Result<BuildStats, DictionaryError> {
        let mut stats = BuildStats::default();
        let total = units.len();

        for unit in units {
            let i = unit.position;
            if i > window.end {
                break;
            }
            if !window.contains(i) {
                continue;
            }
            if cancel.is_cancelled() {
                tracing::warn!(processed = stats.units_processed, "phrase harvesting cancelled");
                break;
            }
            tracing::info!(
                record = i,
                total,
                batch_start = window.start,
                batch_end = window.end,
                "processing record"
            );
            stats.units_processed += 1;

            let source_phrases = textrank(&self.source_tagger.tag(&unit.source), &self.source_params);
            let target_phrases = textrank(&self.target_tagger.tag(&unit.target), &self.target_params);
            if target_phrases.is_empty() {
                continue;
            }

            for (phrase, _) in &source_phrases {
                if !is_multi_word(phrase) {
                    continue;
                }
                stats.candidates_considered += 1;
                if dictionary.contains(phrase) {
                    continue;
                }
                stats.translations_requested += 1;
                let translation =
                    match translate_one(self.translator, phrase, self.target_language, self.category)
                        .await
                    {
                        Ok(t) => t,
                        Err(e) => {
                            stats.translation_failures += 1;
                            tracing::warn!(record = i, phrase = %phrase, error = %e, "translation failed");
                            continue;
                        }
                    };

                let matched = target_phrases
                    .iter()
                    .map(|(t, _)| t.as_str())
                    .find(|t| is_multi_word(t) && same_phrase(t, &translation));
                if let Some(target) = matched {
                    tracing::info!(source = %phrase, target = %target.trim(), "found phrase pair");
                    if dictionary.insert(phrase, target)? {
                        stats.entries_added += 1;
                    }
                }
            }
        }

        dictionary.flush()?;
        Ok(stats)
    }
}

/// Run `builder` over `units` within `window`.
pub async fn build_phrase_dictionary(
    builder: &PhraseBuilder<'_>,
    units: &[TranslationUnit],
    window: BatchWindow,
    dictionary: &mut PhraseDictionary,
    cancel: &CancellationToken,
) -> Result<BuildStats, DictionaryError> {
    builder.build(units, window, dictionary, cancel).await
}
