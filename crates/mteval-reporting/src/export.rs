use std::io;
use std::path::{Path, PathBuf};

use mteval_core::{CategoryOutcome, Evaluation};

use crate::html::export_html;

/// Files written by [`write_reports`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportPaths {
    pub csv: PathBuf,
    pub all_models: PathBuf,
    /// One per category, in category order.
    pub html: Vec<PathBuf>,
    /// One per category, in category order.
    pub transcripts: Vec<PathBuf>,
}

/// `guide_fr.pdf` -> `guide_fr`. Report files are named `MT_<stem>...`.
pub fn report_stem(translated_doc: &str) -> String {
    let name = Path::new(translated_doc)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(translated_doc);
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => name.to_string(),
    }
}

/// Category ids end up in file names; keep them on one path component.
fn file_safe(s: &str) -> String {
    s.chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
        .collect()
}

fn csv_escape(s: &str) -> String {
    if s.contains('"') || s.contains(',') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Wide table: source, reference, then score and sentence per category.
/// Failed cells are left empty.
pub fn export_csv(evaluation: &Evaluation) -> String {
    let mut out = String::new();
    let mut header = vec!["Source".to_string(), "Target".to_string()];
    for category in &evaluation.categories {
        header.push(csv_escape(&format!("{category}_score")));
        header.push(csv_escape(&format!("{category}_sentence")));
    }
    out.push_str(&header.join(","));
    out.push('\n');

    for row in &evaluation.rows {
        let mut fields = vec![csv_escape(&row.source), csv_escape(&row.reference)];
        for outcome in &row.outcomes {
            match outcome {
                CategoryOutcome::Translated { text, score } => {
                    fields.push(format!("{score:.2}"));
                    fields.push(csv_escape(text));
                }
                CategoryOutcome::Failed { .. } => {
                    fields.push(String::new());
                    fields.push(String::new());
                }
            }
        }
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    out
}

/// Every sentence under every category, for reading side by side.
pub fn export_all_models(evaluation: &Evaluation) -> String {
    let mut out = String::new();
    for row in &evaluation.rows {
        for (category, outcome) in evaluation.categories.iter().zip(&row.outcomes) {
            out.push_str(&format!("*** Category {category}\n"));
            out.push_str(&format!(" ENG: {}\n", row.source));
            out.push_str(&format!(" REF: {}\n", row.reference));
            match outcome {
                CategoryOutcome::Translated { text, score } => {
                    out.push_str(&format!(" MT : {text}\n"));
                    out.push_str(&format!(" BLEU: {score:.2}\n"));
                }
                CategoryOutcome::Failed { error } => {
                    out.push_str(&format!(" MT : [translation failed: {error}]\n"));
                }
            }
            out.push('\n');
        }
    }
    out
}

/// One line per aligned sentence holding that category's translation. A
/// failed sentence is an empty line so line numbers match the corpus.
pub fn export_category_transcript(evaluation: &Evaluation, category: usize) -> String {
    let mut out = String::new();
    for row in &evaluation.rows {
        if let Some(text) = row.outcomes.get(category).and_then(CategoryOutcome::text) {
            out.push_str(&text.replace(['\r', '\n'], " "));
        }
        out.push('\n');
    }
    out
}

/// Write the CSV, HTML and transcript reports for `evaluation` into `dir`.
pub fn write_reports(
    dir: &Path,
    stem: &str,
    evaluation: &Evaluation,
    source_doc: &str,
    translated_doc: &str,
) -> io::Result<ReportPaths> {
    std::fs::create_dir_all(dir)?;
    let mut paths = ReportPaths {
        csv: dir.join(format!("MT_{stem}.csv")),
        all_models: dir.join(format!("MT_{stem}_all_models.txt")),
        ..ReportPaths::default()
    };

    std::fs::write(&paths.csv, export_csv(evaluation))?;
    std::fs::write(&paths.all_models, export_all_models(evaluation))?;

    for (ci, category) in evaluation.categories.iter().enumerate() {
        let safe = file_safe(category);
        let html_path = dir.join(format!("MT_{stem}_{safe}.html"));
        std::fs::write(
            &html_path,
            export_html(evaluation, ci, source_doc, translated_doc),
        )?;
        paths.html.push(html_path);

        let transcript_path = dir.join(format!("MT_{stem}_{safe}.txt"));
        std::fs::write(&transcript_path, export_category_transcript(evaluation, ci))?;
        paths.transcripts.push(transcript_path);
    }

    tracing::info!(
        dir = %dir.display(),
        files = 2 + paths.html.len() + paths.transcripts.len(),
        "reports written"
    );
    Ok(paths)
}
