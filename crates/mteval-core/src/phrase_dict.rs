//! Append-only phrase dictionary file, one `source, target` pair per line.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DictionaryError {
    #[error("phrase dictionary {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// `<dir>/<lang>_phrase_dictionary.txt`.
pub fn dictionary_path(dir: &Path, target_language: &str) -> PathBuf {
    dir.join(format!("{target_language}_phrase_dictionary.txt"))
}

/// Split a dictionary line on its first comma.
pub fn parse_line(line: &str) -> Option<(String, String)> {
    let (source, target) = line.split_once(',').unwrap_or((line, ""));
    let source = source.trim();
    if source.is_empty() {
        return None;
    }
    Some((source.to_string(), target.trim().to_string()))
}

pub struct PhraseDictionary {
    path: PathBuf,
    entries: HashMap<String, String>,
    writer: BufWriter<File>,
    /// The loaded file did not end in a newline.
    needs_newline: bool,
}

impl PhraseDictionary {
    /// Open (creating if needed) the dictionary for `target_language` in
    /// `dir`, loading the existing entries.
    pub fn open(dir: &Path, target_language: &str) -> Result<Self, DictionaryError> {
        let path = dictionary_path(dir, target_language);
        let io_err = |source| DictionaryError::Io {
            path: path.clone(),
            source,
        };
        std::fs::create_dir_all(dir).map_err(io_err)?;

        let mut entries = HashMap::new();
        let mut needs_newline = false;
        if path.is_file() {
            let content = std::fs::read_to_string(&path).map_err(io_err)?;
            needs_newline = !content.is_empty() && !content.ends_with('\n');
            for (source, target) in content.lines().filter_map(parse_line) {
                entries.insert(source, target);
            }
            tracing::debug!(path = %path.display(), entries = entries.len(), "found existing phrase dictionary");
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_err)?;
        Ok(Self {
            path,
            entries,
            writer: BufWriter::new(file),
            needs_newline,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, source: &str) -> bool {
        self.entries.contains_key(source.trim())
    }

    pub fn get(&self, source: &str) -> Option<&str> {
        self.entries.get(source.trim()).map(String::as_str)
    }

    /// Record a phrase pair as written, lowercased and uppercased, since
    /// lookups against the dictionary are case sensitive.
    ///
    /// Returns `false` without writing when `source` is already present.
    pub fn insert(&mut self, source: &str, target: &str) -> Result<bool, DictionaryError> {
        let source = source.trim();
        let target = target.trim();
        if source.is_empty() || self.contains(source) {
            return Ok(false);
        }
        let variants = [
            (source.to_string(), target.to_string()),
            (source.to_lowercase(), target.to_lowercase()),
            (source.to_uppercase(), target.to_uppercase()),
        ];
        let io_err = |source| DictionaryError::Io {
            path: self.path.clone(),
            source,
        };
        if self.needs_newline {
            self.writer.write_all(b"\n").map_err(io_err)?;
            self.needs_newline = false;
        }
        for (s, t) in variants {
            writeln!(self.writer, "{s}, {t}").map_err(io_err)?;
            self.entries.entry(s).or_insert(t);
        }
        Ok(true)
    }

    pub fn flush(&mut self) -> Result<(), DictionaryError> {
        self.writer.flush().map_err(|source| DictionaryError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

impl Drop for PhraseDictionary {
    fn drop(&mut self) {
        if let Err(e) = self.writer.flush() {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to flush phrase dictionary");
        }
    }
}
