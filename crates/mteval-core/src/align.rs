//! Sentence alignment through an external aligner process.
//!
//! The aligner is opaque: it is handed two plain-text files and is expected
//! to leave `<file>.aligned` next to each input, one sentence per line, with
//! line `i` of one file translating line `i` of the other. Exit status and
//! the presence of both outputs are checked before anything is read back.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use thiserror::Error;

pub const DEFAULT_ALIGNER_SCRIPT: &str = "align-sents-all.pl";
pub const DEFAULT_INTERPRETER: &str = "perl";

#[derive(Error, Debug)]
pub enum AlignError {
    #[error("aligner unavailable: {0}")]
    ToolUnavailable(String),
    #[error("aligner exited with {status}: {stderr}")]
    ToolFailed { status: String, stderr: String },
    #[error("aligner input not found: {}", .0.display())]
    MissingInput(PathBuf),
    #[error("aligner produced no output at {}", .0.display())]
    MissingOutput(PathBuf),
    #[error("aligned files disagree: {source_lines} source lines vs {reference_lines} reference lines")]
    LengthMismatch {
        source_lines: usize,
        reference_lines: usize,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One aligned sentence pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlignedPair<'a> {
    pub index: usize,
    pub source: &'a str,
    pub reference: &'a str,
}

/// Source sentences and their human reference translations, position by
/// position. Construction fails unless both sides have the same length.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlignedCorpus {
    source: Vec<String>,
    reference: Vec<String>,
}

impl AlignedCorpus {
    pub fn new(source: Vec<String>, reference: Vec<String>) -> Result<Self, AlignError> {
        if source.len() != reference.len() {
            return Err(AlignError::LengthMismatch {
                source_lines: source.len(),
                reference_lines: reference.len(),
            });
        }
        Ok(Self { source, reference })
    }

    pub fn len(&self) -> usize {
        self.source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    pub fn sources(&self) -> &[String] {
        &self.source
    }

    pub fn references(&self) -> &[String] {
        &self.reference
    }

    pub fn get(&self, index: usize) -> Option<AlignedPair<'_>> {
        Some(AlignedPair {
            index,
            source: self.source.get(index)?,
            reference: self.reference.get(index)?,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = AlignedPair<'_>> {
        self.source
            .iter()
            .zip(&self.reference)
            .enumerate()
            .map(|(index, (source, reference))| AlignedPair {
                index,
                source,
                reference,
            })
    }
}

/// Anything that turns a pair of text files into an aligned corpus.
pub trait SentenceAligner: Send + Sync {
    fn align(&self, source_txt: &Path, target_txt: &Path) -> Result<AlignedCorpus, AlignError>;
}

/// `doc.txt` -> `doc.txt.aligned`.
pub fn aligned_path_for(txt: &Path) -> PathBuf {
    let mut name = txt.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".aligned");
    txt.with_file_name(name)
}

/// Split aligner output into sentences. A trailing newline does not count
/// as an extra empty sentence; CRLF endings are accepted.
pub fn split_aligned(content: &str) -> Vec<String> {
    content.lines().map(str::to_string).collect()
}

/// Read two `.aligned` files into a corpus, checking they exist and agree
/// in length.
pub fn read_aligned_pair(
    source_aligned: &Path,
    target_aligned: &Path,
) -> Result<AlignedCorpus, AlignError> {
    for path in [source_aligned, target_aligned] {
        if !path.is_file() {
            return Err(AlignError::MissingOutput(path.to_path_buf()));
        }
    }
    let source = split_aligned(&std::fs::read_to_string(source_aligned)?);
    let reference = split_aligned(&std::fs::read_to_string(target_aligned)?);
    AlignedCorpus::new(source, reference)
}

/// Runs the Microsoft Bilingual Sentence Aligner (`align-sents-all.pl`), or
/// any tool with the same calling convention, as a child process.
#[derive(Debug, Clone)]
pub struct PerlAligner {
    tool_dir: PathBuf,
    interpreter: String,
    script: String,
}

impl PerlAligner {
    pub fn new(tool_dir: impl Into<PathBuf>) -> Self {
        Self {
            tool_dir: tool_dir.into(),
            interpreter: DEFAULT_INTERPRETER.to_string(),
            script: DEFAULT_ALIGNER_SCRIPT.to_string(),
        }
    }

    /// Override the interpreter used to launch the script (default `perl`).
    pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    /// Override the script file name inside the tool directory.
    pub fn with_script(mut self, script: impl Into<String>) -> Self {
        self.script = script.into();
        self
    }

    fn run(&self, source: &Path, target: &Path) -> Result<(), AlignError> {
        if !self.tool_dir.is_dir() {
            return Err(AlignError::ToolUnavailable(format!(
                "{} is not a directory",
                self.tool_dir.display()
            )));
        }
        if !self.tool_dir.join(&self.script).is_file() {
            return Err(AlignError::ToolUnavailable(format!(
                "{} not found in {}",
                self.script,
                self.tool_dir.display()
            )));
        }

        tracing::info!(
            source = %source.display(),
            target = %target.display(),
            tool = %self.tool_dir.display(),
            "running sentence aligner"
        );

        let output = Command::new(&self.interpreter)
            .arg(&self.script)
            .arg(source)
            .arg(target)
            .current_dir(&self.tool_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| {
                AlignError::ToolUnavailable(format!("cannot run {}: {}", self.interpreter, e))
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !output.status.success() {
            let status = match output.status.code() {
                Some(code) => format!("exit code {code}"),
                None => "a signal".to_string(),
            };
            return Err(AlignError::ToolFailed { status, stderr });
        }
        if !stderr.is_empty() {
            tracing::debug!(stderr = %stderr, "aligner diagnostics");
        }
        Ok(())
    }
}

impl SentenceAligner for PerlAligner {
    fn align(&self, source_txt: &Path, target_txt: &Path) -> Result<AlignedCorpus, AlignError> {
        // The tool runs inside its own directory, so inputs must be absolute.
        let source = absolute_input(source_txt)?;
        let target = absolute_input(target_txt)?;
        let source_out = aligned_path_for(&source);
        let target_out = aligned_path_for(&target);

        // Outputs left over from an earlier run must not pass for fresh ones.
        for stale in [&source_out, &target_out] {
            if stale.exists() {
                std::fs::remove_file(stale)?;
            }
        }

        self.run(&source, &target)?;
        let corpus = read_aligned_pair(&source_out, &target_out)?;
        tracing::info!(pairs = corpus.len(), "alignment complete");
        Ok(corpus)
    }
}

fn absolute_input(path: &Path) -> Result<PathBuf, AlignError> {
    if !path.is_file() {
        return Err(AlignError::MissingInput(path.to_path_buf()));
    }
    Ok(std::fs::canonicalize(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn corpus_rejects_length_mismatch() {
        let err = AlignedCorpus::new(strings(&["a", "b"]), strings(&["x"])).unwrap_err();
        assert!(matches!(
            err,
            AlignError::LengthMismatch {
                source_lines: 2,
                reference_lines: 1
            }
        ));
    }

    #[test]
    fn corpus_iterates_pairs_in_order() {
        let corpus = AlignedCorpus::new(strings(&["one", "two"]), strings(&["un", "deux"])).unwrap();
        let pairs: Vec<_> = corpus.iter().collect();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[1].index, 1);
        assert_eq!(pairs[1].source, "two");
        assert_eq!(pairs[1].reference, "deux");
        assert!(corpus.get(2).is_none());
    }

    #[test]
    fn aligned_path_appends_suffix() {
        assert_eq!(
            aligned_path_for(Path::new("/tmp/en/report.txt")),
            PathBuf::from("/tmp/en/report.txt.aligned")
        );
    }

    #[test]
    fn split_ignores_trailing_newline() {
        assert_eq!(split_aligned("a\nb\n"), strings(&["a", "b"]));
        assert_eq!(split_aligned("a\r\nb"), strings(&["a", "b"]));
        assert_eq!(split_aligned("a\n\nb\n"), strings(&["a", "", "b"]));
        assert!(split_aligned("").is_empty());
    }

    #[test]
    fn read_pair_requires_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("en.txt.aligned");
        std::fs::write(&src, "Hello.\n").unwrap();
        let tgt = dir.path().join("fr.txt.aligned");
        match read_aligned_pair(&src, &tgt) {
            Err(AlignError::MissingOutput(p)) => assert_eq!(p, tgt),
            other => panic!("expected MissingOutput, got {other:?}"),
        }
    }

    #[test]
    fn missing_tool_dir_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("en.txt");
        let tgt = dir.path().join("fr.txt");
        std::fs::write(&src, "Hello.").unwrap();
        std::fs::write(&tgt, "Bonjour.").unwrap();
        let aligner = PerlAligner::new(dir.path().join("no-such-dir"));
        assert!(matches!(
            aligner.align(&src, &tgt),
            Err(AlignError::ToolUnavailable(_))
        ));
    }

    #[test]
    fn missing_input_reported() {
        let dir = tempfile::tempdir().unwrap();
        let aligner = PerlAligner::new(dir.path());
        assert!(matches!(
            aligner.align(&dir.path().join("a.txt"), &dir.path().join("b.txt")),
            Err(AlignError::MissingInput(_))
        ));
    }
}
