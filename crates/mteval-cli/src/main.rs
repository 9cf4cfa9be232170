use std::cell::Cell;
use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use mteval_core::config_file::load_config;
use mteval_core::{
    AlignedCorpus, BatchWindow, BleuScorer, EdgeWeighting, MicrosoftTranslator, Normalize,
    PerlAligner, PhraseBuilder, PhraseDictionary, ProgressEvent, SentenceAligner,
    SettingsBuilder, TextRankParams, build_phrase_dictionary, evaluate, extract_to_text_file,
    load_tagger, load_tmx, text_path_for,
};
use mteval_pdf_mupdf::MupdfBackend;
use mteval_reporting::{report_stem, write_reports};
use owo_colors::OwoColorize;
use tokio_util::sync::CancellationToken;

mod output;

use output::ColorMode;

/// Machine-translation evaluation - score custom translation models against human translations
#[derive(Parser, Debug)]
#[command(name = "mteval", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract the text of a PDF into a plain-text file
    Extract {
        /// PDF to extract
        pdf: PathBuf,

        /// Output text file (default: the PDF path with a .txt extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        layout: LayoutArgs,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },

    /// Sentence-align two text files with the external aligner
    Align {
        /// Source-language text file
        #[arg(long)]
        source: PathBuf,

        /// Target-language text file
        #[arg(long)]
        target: PathBuf,

        /// Directory holding align-sents-all.pl (overrides ALIGNER_PATH)
        #[arg(long)]
        aligner_path: Option<PathBuf>,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },

    /// Extract, align, translate and score a document pair, then write reports
    Evaluate {
        /// Directory containing the source PDF
        #[arg(long)]
        source_path: PathBuf,

        /// File name of the source PDF
        #[arg(long)]
        source_doc: String,

        /// Directory containing the human-translated PDF
        #[arg(long)]
        translated_path: PathBuf,

        /// File name of the human-translated PDF
        #[arg(long)]
        translated_doc: String,

        /// Directory for the CSV, HTML and transcript reports
        #[arg(long)]
        output_path: PathBuf,

        /// Language code to translate into (e.g. fr)
        #[arg(long)]
        target_language: String,

        /// Comma-separated category ids (overrides CATEGORIES)
        #[arg(long, value_delimiter = ',')]
        categories: Vec<String>,

        /// Directory holding align-sents-all.pl (overrides ALIGNER_PATH)
        #[arg(long)]
        aligner_path: Option<PathBuf>,

        #[command(flatten)]
        layout: LayoutArgs,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },

    /// Harvest multi-word phrase pairs from a TMX file into a phrase dictionary
    BuildDictionary(BuildDictionaryArgs),
}

#[derive(Args, Debug, Clone, Copy)]
struct LayoutArgs {
    /// Drop text blocks in this top fraction of each page (0 keeps everything)
    #[arg(long, default_value_t = 0.0)]
    header_margin: f32,

    /// Drop text blocks in this bottom fraction of each page (0 keeps everything)
    #[arg(long, default_value_t = 0.0)]
    footer_margin: f32,
}

impl LayoutArgs {
    fn backend(self) -> MupdfBackend {
        MupdfBackend::new()
            .with_header_exclusion(self.header_margin)
            .with_footer_exclusion(self.footer_margin)
    }
}

#[derive(Args, Debug)]
struct BuildDictionaryArgs {
    /// TMX translation memory to mine
    #[arg(long)]
    source_tmx: PathBuf,

    /// Directory holding <lang>_phrase_dictionary.txt
    #[arg(long)]
    dictionary_path: PathBuf,

    /// Language code to translate into (e.g. fr)
    #[arg(long)]
    target_language: String,

    /// Category id of the translation model
    #[arg(long)]
    category_id: String,

    /// Tagger for the source side: a language code or a lexicon file
    #[arg(long)]
    nlp_id: String,

    /// Tagger for the target side: a language code or a lexicon file
    #[arg(long)]
    nlp_target: String,

    /// First translation unit to process
    #[arg(long, default_value_t = 0)]
    batch_start: usize,

    /// Last translation unit to process (inclusive)
    #[arg(long, default_value_t = 100)]
    batch_end: usize,

    /// xml:lang of the source variant (default: first variant of each unit)
    #[arg(long, requires = "target_lang")]
    source_lang: Option<String>,

    /// xml:lang of the target variant (default: second variant of each unit)
    #[arg(long, requires = "source_lang")]
    target_lang: Option<String>,

    /// Co-occurrence window for source keyphrases
    #[arg(long)]
    source_window: Option<usize>,

    /// Co-occurrence window for target keyphrases
    #[arg(long)]
    target_window: Option<usize>,

    /// Number of source keyphrases kept per unit
    #[arg(long)]
    source_topn: Option<usize>,

    /// Number of target keyphrases kept per unit
    #[arg(long)]
    target_topn: Option<usize>,

    /// Favour words that appear early in the segment
    #[arg(long)]
    position_bias: bool,

    /// How co-occurrence edges are weighted
    #[arg(long, value_enum)]
    edge_weighting: Option<EdgeWeightingArg>,

    /// Form used for graph nodes
    #[arg(long, value_enum)]
    normalize: Option<NormalizeArg>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EdgeWeightingArg {
    Binary,
    Count,
}

impl From<EdgeWeightingArg> for EdgeWeighting {
    fn from(arg: EdgeWeightingArg) -> Self {
        match arg {
            EdgeWeightingArg::Binary => EdgeWeighting::Binary,
            EdgeWeightingArg::Count => EdgeWeighting::Count,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum NormalizeArg {
    Lemma,
    Lower,
    #[value(name = "none")]
    AsIs,
}

impl From<NormalizeArg> for Normalize {
    fn from(arg: NormalizeArg) -> Self {
        match arg {
            NormalizeArg::Lemma => Normalize::Lemma,
            NormalizeArg::Lower => Normalize::Lower,
            NormalizeArg::AsIs => Normalize::None,
        }
    }
}

impl BuildDictionaryArgs {
    fn rank_params(
        &self,
        mut params: TextRankParams,
        window: Option<usize>,
        topn: Option<usize>,
    ) -> TextRankParams {
        if let Some(window) = window {
            params.window_size = window;
        }
        if let Some(topn) = topn {
            params.topn = topn;
        }
        if self.position_bias {
            params.position_bias = true;
        }
        if let Some(weighting) = self.edge_weighting {
            params.edge_weighting = weighting.into();
        }
        if let Some(normalize) = self.normalize {
            params.normalize = normalize.into();
        }
        params
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let settings = SettingsBuilder::from_config_file(&load_config())
        .with_env(|key| std::env::var(key).ok())
        .context("invalid environment configuration")?;
    init_tracing(settings.debug.unwrap_or(false));

    match cli.command {
        Command::Extract {
            pdf,
            output,
            layout,
            no_color,
        } => extract(pdf, output, layout, color_mode(no_color)).await,
        Command::Align {
            source,
            target,
            aligner_path,
            no_color,
        } => {
            let tool_dir = aligner_path.or(settings.aligner_path).context(
                "no aligner directory configured: pass --aligner-path or set ALIGNER_PATH",
            )?;
            align(tool_dir, source, target, color_mode(no_color)).await
        }
        Command::Evaluate {
            source_path,
            source_doc,
            translated_path,
            translated_doc,
            output_path,
            target_language,
            categories,
            aligner_path,
            layout,
            no_color,
        } => {
            let mut settings = settings;
            if !categories.is_empty() {
                settings.categories = Some(categories);
            }
            if aligner_path.is_some() {
                settings.aligner_path = aligner_path;
            }
            run_evaluation(
                settings,
                Documents {
                    source: source_path.join(&source_doc),
                    source_doc,
                    translated: translated_path.join(&translated_doc),
                    translated_doc,
                },
                &output_path,
                &target_language,
                layout,
                color_mode(no_color),
            )
            .await
        }
        Command::BuildDictionary(args) => build_dictionary(args, settings).await,
    }
}

/// `RUST_LOG` wins; otherwise `debug` when `DEBUG` is set, else `info`.
/// Logs go to stderr so stdout carries only results.
fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn color_mode(no_color: bool) -> ColorMode {
    ColorMode(!no_color && std::io::stdout().is_terminal())
}

/// Token cancelled on the first Ctrl+C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping after the current request");
            cancel_clone.cancel();
        }
    });
    cancel
}

/// Run PDF extraction on the blocking pool; mupdf is synchronous.
async fn extract_blocking(backend: MupdfBackend, pdf: &Path, out: &Path) -> anyhow::Result<String> {
    if !pdf.is_file() {
        anyhow::bail!("File not found: {}", pdf.display());
    }
    let (pdf_owned, out_owned) = (pdf.to_path_buf(), out.to_path_buf());
    tokio::task::spawn_blocking(move || extract_to_text_file(&backend, &pdf_owned, &out_owned))
        .await?
        .with_context(|| format!("text extraction failed for {}", pdf.display()))
}

/// Run the external aligner on the blocking pool.
async fn run_aligner(
    tool_dir: PathBuf,
    source: &Path,
    target: &Path,
) -> anyhow::Result<AlignedCorpus> {
    let aligner = PerlAligner::new(tool_dir);
    let (source, target) = (source.to_path_buf(), target.to_path_buf());
    tokio::task::spawn_blocking(move || aligner.align(&source, &target))
        .await?
        .context("sentence alignment failed")
}

async fn extract(
    pdf: PathBuf,
    output: Option<PathBuf>,
    layout: LayoutArgs,
    color: ColorMode,
) -> anyhow::Result<()> {
    let out = output.unwrap_or_else(|| text_path_for(&pdf));
    let text = extract_blocking(layout.backend(), &pdf, &out).await?;
    output::print_extraction(
        &mut std::io::stdout(),
        &pdf,
        &out,
        text.chars().count(),
        color,
    )?;
    Ok(())
}

async fn align(
    tool_dir: PathBuf,
    source: PathBuf,
    target: PathBuf,
    color: ColorMode,
) -> anyhow::Result<()> {
    for path in [&source, &target] {
        if !path.is_file() {
            anyhow::bail!("File not found: {}", path.display());
        }
    }
    let corpus = run_aligner(tool_dir, &source, &target).await?;
    output::print_alignment(&mut std::io::stdout(), &source, &target, corpus.len(), color)?;
    Ok(())
}

/// The source PDF and its human translation.
struct Documents {
    source: PathBuf,
    source_doc: String,
    translated: PathBuf,
    translated_doc: String,
}

async fn run_evaluation(
    settings: SettingsBuilder,
    docs: Documents,
    output_path: &Path,
    target_language: &str,
    layout: LayoutArgs,
    color: ColorMode,
) -> anyhow::Result<()> {
    let settings = settings
        .build_for_evaluation()
        .context("invalid configuration")?;
    tracing::debug!(?settings, "resolved settings");

    let source_txt = text_path_for(&docs.source);
    let translated_txt = text_path_for(&docs.translated);
    extract_blocking(layout.backend(), &docs.source, &source_txt).await?;
    extract_blocking(layout.backend(), &docs.translated, &translated_txt).await?;

    let tool_dir = settings
        .aligner_path
        .clone()
        .context("no aligner directory configured")?;
    let corpus = run_aligner(tool_dir, &source_txt, &translated_txt).await?;
    if corpus.is_empty() {
        anyhow::bail!(
            "the aligner produced no sentence pairs for {} and {}",
            docs.source_doc,
            docs.translated_doc
        );
    }
    tracing::info!(
        sentences = corpus.len(),
        categories = settings.categories.len(),
        target_language,
        "starting evaluation"
    );

    let translator =
        MicrosoftTranslator::new(&settings).context("failed to build translation client")?;
    let scorer = BleuScorer::default();
    let cancel = cancel_on_ctrl_c();

    let bar = ProgressBar::new(corpus.len() as u64);
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{bar:40.green/dim}] {pos}/{len} sentences {msg} (eta {eta})",
        )?
        .progress_chars("=> "),
    );
    bar.enable_steady_tick(Duration::from_millis(120));

    let failed = Cell::new(0usize);
    let progress = |event: ProgressEvent| match event {
        ProgressEvent::Sentence { index, .. } => bar.set_position(index as u64),
        ProgressEvent::Translated { .. } => {}
        ProgressEvent::Failed {
            index,
            category,
            message,
        } => {
            failed.set(failed.get() + 1);
            bar.set_message(format!("({} failed)", failed.get()));
            let line = format!(
                "sentence {} [{}]: translation failed: {}",
                index + 1,
                category,
                message
            );
            if color.enabled() {
                bar.println(format!("{} {}", "WARNING:".yellow(), line));
            } else {
                bar.println(format!("WARNING: {}", line));
            }
        }
    };

    let evaluation = match evaluate(
        &corpus,
        &settings.categories,
        target_language,
        &translator,
        &scorer,
        progress,
        &cancel,
    )
    .await
    {
        Ok(evaluation) => {
            bar.finish_with_message(format!("done in {:.0?}", bar.elapsed()));
            evaluation
        }
        Err(e) => {
            bar.abandon();
            return Err(e).context("evaluation aborted; no reports were written");
        }
    };

    let stem = report_stem(&docs.translated_doc);
    let paths = write_reports(
        output_path,
        &stem,
        &evaluation,
        &docs.source_doc,
        &docs.translated_doc,
    )
    .with_context(|| format!("failed to write reports to {}", output_path.display()))?;

    let mut stdout = std::io::stdout();
    output::print_evaluation_summary(&mut stdout, &evaluation, color)?;
    output::print_report_paths(&mut stdout, &paths, color)?;
    stdout.flush()?;
    Ok(())
}

async fn build_dictionary(
    args: BuildDictionaryArgs,
    settings: SettingsBuilder,
) -> anyhow::Result<()> {
    if args.batch_start > args.batch_end {
        anyhow::bail!(
            "--batch-start ({}) is after --batch-end ({})",
            args.batch_start,
            args.batch_end
        );
    }
    let settings = settings
        .build_for_dictionary()
        .context("invalid configuration")?;
    let color = color_mode(args.no_color);

    let langs = args.source_lang.as_deref().zip(args.target_lang.as_deref());
    let units = load_tmx(&args.source_tmx, langs)
        .with_context(|| format!("failed to load {}", args.source_tmx.display()))?;
    tracing::info!(units = units.len(), tmx = %args.source_tmx.display(), "loaded translation memory");

    let source_tagger = load_tagger(&args.nlp_id)
        .with_context(|| format!("cannot load source tagger {}", args.nlp_id))?;
    let target_tagger = load_tagger(&args.nlp_target)
        .with_context(|| format!("cannot load target tagger {}", args.nlp_target))?;

    let mut dictionary = PhraseDictionary::open(&args.dictionary_path, &args.target_language)?;
    tracing::info!(
        path = %dictionary.path().display(),
        entries = dictionary.len(),
        "opened phrase dictionary"
    );

    let translator =
        MicrosoftTranslator::new(&settings).context("failed to build translation client")?;
    let phrase_builder = PhraseBuilder {
        translator: &translator,
        source_tagger: &source_tagger,
        target_tagger: &target_tagger,
        source_params: args.rank_params(
            TextRankParams::source(),
            args.source_window,
            args.source_topn,
        ),
        target_params: args.rank_params(
            TextRankParams::target(),
            args.target_window,
            args.target_topn,
        ),
        target_language: &args.target_language,
        category: &args.category_id,
    };
    let window = BatchWindow {
        start: args.batch_start,
        end: args.batch_end,
    };

    let cancel = cancel_on_ctrl_c();
    let stats = build_phrase_dictionary(&phrase_builder, &units, window, &mut dictionary, &cancel)
        .await
        .context("phrase dictionary update failed")?;

    output::print_build_stats(
        &mut std::io::stdout(),
        &stats,
        dictionary.path(),
        dictionary.len(),
        color,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn categories_split_on_commas() {
        let cli = Cli::try_parse_from([
            "mteval",
            "evaluate",
            "--source-path",
            "en",
            "--source-doc",
            "guide.pdf",
            "--translated-path",
            "fr",
            "--translated-doc",
            "guide_fr.pdf",
            "--output-path",
            "out",
            "--target-language",
            "fr",
            "--categories",
            "general,legal",
        ])
        .unwrap();
        match cli.command {
            Command::Evaluate { categories, .. } => {
                assert_eq!(categories, vec!["general", "legal"]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn build_dictionary_defaults_to_first_hundred_units() {
        let cli = Cli::try_parse_from([
            "mteval",
            "build-dictionary",
            "--source-tmx",
            "memory.tmx",
            "--dictionary-path",
            "dicts",
            "--target-language",
            "fr",
            "--category-id",
            "general",
            "--nlp-id",
            "en",
            "--nlp-target",
            "fr",
        ])
        .unwrap();
        let Command::BuildDictionary(args) = cli.command else {
            panic!("expected build-dictionary");
        };
        assert_eq!((args.batch_start, args.batch_end), (0, 100));
        let source = args.rank_params(TextRankParams::source(), args.source_window, args.source_topn);
        assert_eq!(source, TextRankParams::source());
    }

    #[test]
    fn rank_overrides_apply_per_side() {
        let cli = Cli::try_parse_from([
            "mteval",
            "build-dictionary",
            "--source-tmx",
            "memory.tmx",
            "--dictionary-path",
            "dicts",
            "--target-language",
            "fr",
            "--category-id",
            "general",
            "--nlp-id",
            "en",
            "--nlp-target",
            "fr",
            "--target-window",
            "3",
            "--edge-weighting",
            "count",
            "--normalize",
            "none",
        ])
        .unwrap();
        let Command::BuildDictionary(args) = cli.command else {
            panic!("expected build-dictionary");
        };
        let source = args.rank_params(TextRankParams::source(), args.source_window, args.source_topn);
        let target = args.rank_params(TextRankParams::target(), args.target_window, args.target_topn);
        assert_eq!(source.window_size, TextRankParams::source().window_size);
        assert_eq!(target.window_size, 3);
        assert_eq!(target.edge_weighting, EdgeWeighting::Count);
        assert_eq!(source.normalize, Normalize::None);
    }

    #[test]
    fn tmx_languages_must_come_in_pairs() {
        let result = Cli::try_parse_from([
            "mteval",
            "build-dictionary",
            "--source-tmx",
            "memory.tmx",
            "--dictionary-path",
            "dicts",
            "--target-language",
            "fr",
            "--category-id",
            "general",
            "--nlp-id",
            "en",
            "--nlp-target",
            "fr",
            "--source-lang",
            "en-GB",
        ]);
        assert!(result.is_err());
    }
}
