pub mod align;
pub mod backend;
pub mod bleu;
pub mod config;
pub mod config_file;
pub mod evaluate;
pub mod keyphrase;
pub mod phrase_dict;
pub mod phrases;
pub mod tagger;
pub mod tmx;
pub mod translate;

// Re-export for convenience
pub use align::{AlignError, AlignedCorpus, AlignedPair, PerlAligner, SentenceAligner};
pub use backend::{BackendError, PdfBackend, extract_to_text_file, text_path_for};
pub use bleu::{BleuScore, BleuScorer, sentence_bleu};
pub use config::{ConfigError, Settings, SettingsBuilder};
pub use evaluate::{
    CategoryOutcome, CategorySummary, EvaluateError, Evaluation, ProgressEvent, ReportRow,
    evaluate,
};
pub use keyphrase::{EdgeWeighting, Normalize, TextRankParams, textrank};
pub use phrase_dict::{DictionaryError, PhraseDictionary};
pub use phrases::{BatchWindow, BuildStats, PhraseBuilder, build_phrase_dictionary};
pub use tagger::{LexiconTagger, Pos, Tagger, TaggerError, Token, load_tagger};
pub use tmx::{TmxError, TranslationUnit, load_tmx};
pub use translate::{MicrosoftTranslator, TranslateError, Translator};
