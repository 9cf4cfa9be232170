//! Reader for TMX translation memories.
//!
//! ```xml
//! <tmx version="1.4">
//!   <body>
//!     <tu tuid="1">
//!       <tuv xml:lang="en-GB"><seg>The <hi>customs</hi> union</seg></tuv>
//!       <tuv xml:lang="fr-FR"><seg>L'union douanière</seg></tuv>
//!     </tu>
//!   </body>
//! </tmx>
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TmxError {
    #[error("cannot open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("XML error at byte {position}: {message}")]
    Xml { position: u64, message: String },
}

/// One source/target pair from a `<tu>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationUnit {
    /// Zero-based index of the `<tu>` among all units in the file,
    /// including ones skipped for lacking a side.
    pub position: usize,
    pub id: Option<String>,
    pub source: String,
    pub target: String,
}

/// Inline elements whose content is native markup, not segment text.
const CODE_ELEMENTS: &[&[u8]] = &[b"bpt", b"ept", b"it", b"ph", b"ut"];

fn attr(e: &BytesStart<'_>, names: &[&[u8]]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| names.contains(&a.key.as_ref()))
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

fn lang_matches(lang: Option<&str>, wanted: &str) -> bool {
    lang.is_some_and(|l| {
        l.to_ascii_lowercase()
            .starts_with(&wanted.to_ascii_lowercase())
    })
}

fn collapse(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Default)]
struct UnitState {
    position: usize,
    id: Option<String>,
    /// `(lang, text)` for each `<tuv>` seen so far.
    variants: Vec<(Option<String>, String)>,
}

impl UnitState {
    fn into_unit(self, langs: Option<(&str, &str)>) -> Option<TranslationUnit> {
        let (source, target) = match langs {
            None => {
                let mut it = self.variants.into_iter().map(|(_, t)| t);
                (it.next(), it.next())
            }
            Some((src, tgt)) => {
                let pick = |wanted: &str| {
                    self.variants
                        .iter()
                        .find(|(l, _)| lang_matches(l.as_deref(), wanted))
                        .map(|(_, t)| t.clone())
                };
                (pick(src), pick(tgt))
            }
        };
        match (source, target) {
            (Some(source), Some(target)) if !source.is_empty() && !target.is_empty() => {
                Some(TranslationUnit {
                    position: self.position,
                    id: self.id,
                    source,
                    target,
                })
            }
            _ => {
                tracing::debug!(position = self.position, id = ?self.id, "skipping translation unit without both sides");
                None
            }
        }
    }
}

/// Parse TMX from a reader.
///
/// Without `langs` the first `<tuv>` of each unit is the source and the
/// second the target. With `langs = Some((source, target))` variants are
/// picked by case-insensitive prefix match on `xml:lang` (or `lang`).
///
/// Units missing either side are dropped, but every `<tu>` still counts
/// towards [`TranslationUnit::position`].
pub fn parse_tmx<R: BufRead>(
    reader: R,
    langs: Option<(&str, &str)>,
) -> Result<Vec<TranslationUnit>, TmxError> {
    let mut xml_reader = Reader::from_reader(reader);
    let mut buf = Vec::new();
    let mut units = Vec::new();
    let mut seen_units = 0usize;

    let mut unit: Option<UnitState> = None;
    let mut tuv_lang: Option<String> = None;
    let mut in_tuv = false;
    let mut in_seg = false;
    let mut seg_text = String::new();
    let mut code_depth: u32 = 0;

    loop {
        let event = xml_reader
            .read_event_into(&mut buf)
            .map_err(|e| TmxError::Xml {
                position: xml_reader.buffer_position(),
                message: e.to_string(),
            })?;
        match event {
            Event::Start(ref e) => match e.name().as_ref() {
                b"tu" => {
                    unit = Some(UnitState {
                        position: seen_units,
                        id: attr(e, &[b"tuid"]),
                        variants: Vec::new(),
                    });
                    seen_units += 1;
                }
                b"tuv" if unit.is_some() => {
                    in_tuv = true;
                    tuv_lang = attr(e, &[b"xml:lang", b"lang"]);
                }
                b"seg" if in_tuv => {
                    in_seg = true;
                    seg_text.clear();
                }
                name if in_seg && CODE_ELEMENTS.contains(&name) => code_depth += 1,
                _ => {}
            },
            Event::Text(ref e) if in_seg && code_depth == 0 => {
                let text = e.unescape().map_err(|err| TmxError::Xml {
                    position: xml_reader.buffer_position(),
                    message: err.to_string(),
                })?;
                seg_text.push_str(&text);
            }
            Event::Empty(ref e) if in_tuv && !in_seg && e.name().as_ref() == b"seg" => {
                if let Some(u) = unit.as_mut() {
                    u.variants.push((tuv_lang.clone(), String::new()));
                }
            }
            Event::CData(ref e) if in_seg && code_depth == 0 => {
                seg_text.push_str(&String::from_utf8_lossy(e.as_ref()));
            }
            Event::End(ref e) => match e.name().as_ref() {
                b"seg" if in_seg => {
                    in_seg = false;
                    if let Some(u) = unit.as_mut() {
                        u.variants.push((tuv_lang.clone(), collapse(&seg_text)));
                    }
                }
                b"tuv" => {
                    in_tuv = false;
                    tuv_lang = None;
                }
                b"tu" => {
                    if let Some(u) = unit.take().and_then(|u| u.into_unit(langs)) {
                        units.push(u);
                    }
                }
                name if in_seg && CODE_ELEMENTS.contains(&name) => {
                    code_depth = code_depth.saturating_sub(1);
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(units)
}

/// Load every translation unit from a TMX file.
pub fn load_tmx(
    path: &Path,
    langs: Option<(&str, &str)>,
) -> Result<Vec<TranslationUnit>, TmxError> {
    let file = File::open(path).map_err(|source| TmxError::Open {
        path: path.display().to_string(),
        source,
    })?;
    let units = parse_tmx(BufReader::new(file), langs)?;
    tracing::debug!(path = %path.display(), units = units.len(), "loaded TMX");
    Ok(units)
}
