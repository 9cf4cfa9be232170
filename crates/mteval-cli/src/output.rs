use std::io::Write;
use std::path::Path;

use mteval_core::{BuildStats, Evaluation};
use mteval_reporting::ReportPaths;
use owo_colors::OwoColorize;

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

/// Longest category id, but never narrower than the column header.
fn category_width(evaluation: &Evaluation) -> usize {
    evaluation
        .categories
        .iter()
        .map(|c| c.chars().count())
        .max()
        .unwrap_or(0)
        .max("Category".len())
}

pub fn print_extraction(
    w: &mut dyn Write,
    pdf: &Path,
    text_file: &Path,
    chars: usize,
    color: ColorMode,
) -> std::io::Result<()> {
    if color.enabled() {
        writeln!(
            w,
            "{} {} -> {} ({} chars)",
            "Extracted".green(),
            pdf.display(),
            text_file.display().bold(),
            chars
        )
    } else {
        writeln!(
            w,
            "Extracted {} -> {} ({} chars)",
            pdf.display(),
            text_file.display(),
            chars
        )
    }
}

pub fn print_alignment(
    w: &mut dyn Write,
    source: &Path,
    target: &Path,
    pairs: usize,
    color: ColorMode,
) -> std::io::Result<()> {
    let count = format!("{pairs} aligned sentence pairs");
    if color.enabled() {
        writeln!(w, "{} ({} / {})", count.bold(), source.display(), target.display())
    } else {
        writeln!(w, "{} ({} / {})", count, source.display(), target.display())
    }
}

/// Per-category table: sentences translated, failures, mean sentence BLEU
/// and corpus BLEU.
pub fn print_evaluation_summary(
    w: &mut dyn Write,
    evaluation: &Evaluation,
    color: ColorMode,
) -> std::io::Result<()> {
    let width = category_width(evaluation);
    let header = format!(
        "{:<width$}  {:>10}  {:>6}  {:>9}  {:>11}",
        "Category", "Translated", "Failed", "Mean BLEU", "Corpus BLEU"
    );

    writeln!(w)?;
    if color.enabled() {
        writeln!(w, "{}", header.bold())?;
    } else {
        writeln!(w, "{}", header)?;
    }
    writeln!(w, "{}", "-".repeat(header.len()))?;

    for s in evaluation.summary() {
        let failed = format!("{:>6}", s.failed);
        if color.enabled() {
            let failed = if s.failed > 0 {
                failed.red().to_string()
            } else {
                failed.dimmed().to_string()
            };
            writeln!(
                w,
                "{}  {:>10}  {}  {:>9.2}  {}",
                format!("{:<width$}", s.category).cyan(),
                s.translated,
                failed,
                s.mean_sentence_bleu,
                format!("{:>11.2}", s.corpus_bleu).bold()
            )?;
        } else {
            writeln!(
                w,
                "{:<width$}  {:>10}  {}  {:>9.2}  {:>11.2}",
                s.category, s.translated, failed, s.mean_sentence_bleu, s.corpus_bleu
            )?;
        }
    }

    let failures = evaluation.failures();
    if failures > 0 {
        let msg = format!(
            "{} translation request(s) failed; those cells are empty in the reports",
            failures
        );
        writeln!(w)?;
        if color.enabled() {
            writeln!(w, "{} {}", "WARNING:".yellow(), msg)?;
        } else {
            writeln!(w, "WARNING: {}", msg)?;
        }
    }
    Ok(())
}

pub fn print_report_paths(
    w: &mut dyn Write,
    paths: &ReportPaths,
    color: ColorMode,
) -> std::io::Result<()> {
    writeln!(w)?;
    if color.enabled() {
        writeln!(w, "{}", "Reports".bold())?;
    } else {
        writeln!(w, "Reports")?;
    }
    let files = [&paths.csv, &paths.all_models]
        .into_iter()
        .chain(&paths.html)
        .chain(&paths.transcripts);
    for path in files {
        writeln!(w, "  {}", path.display())?;
    }
    Ok(())
}

pub fn print_build_stats(
    w: &mut dyn Write,
    stats: &BuildStats,
    dictionary: &Path,
    total_entries: usize,
    color: ColorMode,
) -> std::io::Result<()> {
    writeln!(w)?;
    if color.enabled() {
        writeln!(w, "{}", "Phrase dictionary".bold())?;
    } else {
        writeln!(w, "Phrase dictionary")?;
    }
    writeln!(w, "  Units processed:        {}", stats.units_processed)?;
    writeln!(w, "  Multi-word candidates:  {}", stats.candidates_considered)?;
    writeln!(w, "  Translations requested: {}", stats.translations_requested)?;
    if color.enabled() && stats.translation_failures > 0 {
        writeln!(
            w,
            "  Translation failures:   {}",
            stats.translation_failures.red()
        )?;
    } else {
        writeln!(w, "  Translation failures:   {}", stats.translation_failures)?;
    }
    if color.enabled() {
        writeln!(w, "  Pairs added:            {}", stats.entries_added.green())?;
    } else {
        writeln!(w, "  Pairs added:            {}", stats.entries_added)?;
    }
    writeln!(
        w,
        "  {} ({} entries)",
        dictionary.display(),
        total_entries
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mteval_core::{CategoryOutcome, ReportRow};

    fn render(f: impl FnOnce(&mut Vec<u8>) -> std::io::Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    fn evaluation() -> Evaluation {
        Evaluation {
            categories: vec!["general".into(), "a-very-long-category-id".into()],
            rows: vec![ReportRow {
                index: 0,
                source: "Hello".into(),
                reference: "Bonjour".into(),
                outcomes: vec![
                    CategoryOutcome::Translated {
                        text: "Bonjour".into(),
                        score: 100.0,
                    },
                    CategoryOutcome::Failed {
                        error: "HTTP 500".into(),
                    },
                ],
            }],
        }
    }

    #[test]
    fn summary_lists_every_category() {
        let out = render(|w| print_evaluation_summary(w, &evaluation(), ColorMode(false)));
        let lines: Vec<&str> = out.lines().filter(|l| !l.is_empty()).collect();
        assert!(lines[0].starts_with("Category"));
        assert!(lines[2].starts_with("general "));
        assert!(lines[2].contains("100.00"));
        assert!(lines[3].starts_with("a-very-long-category-id"));
        assert!(out.contains("WARNING: 1 translation request(s) failed"));
    }

    #[test]
    fn uncolored_output_has_no_escape_codes() {
        let out = render(|w| print_evaluation_summary(w, &evaluation(), ColorMode(false)));
        assert!(!out.contains('\u{1b}'));
    }

    #[test]
    fn build_stats_show_counts_and_path() {
        let stats = BuildStats {
            units_processed: 3,
            candidates_considered: 5,
            translations_requested: 4,
            translation_failures: 1,
            entries_added: 2,
        };
        let out = render(|w| {
            print_build_stats(w, &stats, Path::new("dicts/fr_phrase_dictionary.txt"), 6, ColorMode(false))
        });
        assert!(out.contains("Units processed:        3"));
        assert!(out.contains("Translation failures:   1"));
        assert!(out.contains("Pairs added:            2"));
        assert!(out.contains("dicts/fr_phrase_dictionary.txt (6 entries)"));
    }
}
