//! Rule-and-lexicon part-of-speech tagging.
//!
//! Tags use the Universal Dependencies tag set. Closed-class words come from
//! per-language word lists; open-class words are guessed from capitalisation
//! and suffixes. A user lexicon (`form<TAB>POS[<TAB>lemma]`) overrides both.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaggerError {
    #[error("unknown tagger model '{0}' (expected a language code such as 'en' or a lexicon file)")]
    UnknownModel(String),
    #[error("cannot read lexicon {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}:{line}: {reason}")]
    InvalidLexicon {
        path: String,
        line: usize,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pos {
    Noun,
    Propn,
    Adj,
    Verb,
    Adv,
    Pron,
    Det,
    Adp,
    Aux,
    Cconj,
    Sconj,
    Num,
    Part,
    Punct,
    Sym,
    X,
}

impl Pos {
    pub fn as_str(self) -> &'static str {
        match self {
            Pos::Noun => "NOUN",
            Pos::Propn => "PROPN",
            Pos::Adj => "ADJ",
            Pos::Verb => "VERB",
            Pos::Adv => "ADV",
            Pos::Pron => "PRON",
            Pos::Det => "DET",
            Pos::Adp => "ADP",
            Pos::Aux => "AUX",
            Pos::Cconj => "CCONJ",
            Pos::Sconj => "SCONJ",
            Pos::Num => "NUM",
            Pos::Part => "PART",
            Pos::Punct => "PUNCT",
            Pos::Sym => "SYM",
            Pos::X => "X",
        }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Pos {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_uppercase().as_str() {
            "NOUN" => Pos::Noun,
            "PROPN" => Pos::Propn,
            "ADJ" => Pos::Adj,
            "VERB" => Pos::Verb,
            "ADV" => Pos::Adv,
            "PRON" => Pos::Pron,
            "DET" => Pos::Det,
            "ADP" => Pos::Adp,
            "AUX" => Pos::Aux,
            "CCONJ" | "CONJ" => Pos::Cconj,
            "SCONJ" => Pos::Sconj,
            "NUM" => Pos::Num,
            "PART" => Pos::Part,
            "PUNCT" => Pos::Punct,
            "SYM" => Pos::Sym,
            "X" => Pos::X,
            other => return Err(format!("unknown POS tag '{other}'")),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub lemma: String,
    pub pos: Pos,
    /// Byte offset of the token in the tagged text.
    pub offset: usize,
}

pub trait Tagger: Send + Sync {
    fn tag(&self, text: &str) -> Vec<Token>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    En,
    Fr,
    Es,
    De,
    /// No built-in word lists; only shape heuristics apply.
    Generic,
}

impl Language {
    /// Map `en`, `en-GB`, `en_core_web_md` and similar to a language.
    pub fn from_code(code: &str) -> Option<Language> {
        let prefix: String = code
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .collect::<String>()
            .to_ascii_lowercase();
        match prefix.as_str() {
            "en" => Some(Language::En),
            "fr" => Some(Language::Fr),
            "es" => Some(Language::Es),
            "de" => Some(Language::De),
            _ => None,
        }
    }
}

type WordList = &'static [(Pos, &'static [&'static str])];

const EN_WORDS: WordList = &[
    (Pos::Det, &["the", "a", "an", "this", "that", "these", "those", "each", "every", "any", "some", "no", "all", "both", "either", "neither", "such", "another", "its", "their", "his", "her", "our", "your", "my"]),
    (Pos::Pron, &["i", "you", "he", "she", "it", "we", "they", "me", "him", "us", "them", "who", "whom", "which", "what", "whose", "itself", "themselves", "himself", "herself", "ourselves", "yourself", "one", "something", "anything", "nothing", "everything", "someone", "anyone"]),
    (Pos::Adp, &["of", "in", "on", "at", "by", "for", "with", "from", "to", "into", "onto", "upon", "about", "between", "through", "during", "before", "after", "above", "below", "under", "over", "against", "among", "within", "without", "towards", "toward", "across", "per", "via", "regarding", "concerning", "pursuant"]),
    (Pos::Cconj, &["and", "or", "but", "nor", "yet", "plus"]),
    (Pos::Sconj, &["if", "because", "although", "though", "while", "whereas", "unless", "since", "whether", "where", "when", "as", "than"]),
    (Pos::Aux, &["be", "is", "are", "was", "were", "been", "being", "am", "have", "has", "had", "do", "does", "did", "will", "would", "shall", "should", "may", "might", "must", "can", "could", "'s", "'re", "'ve", "'ll", "'d", "'m"]),
    (Pos::Part, &["not", "n't", "to"]),
    (Pos::Adv, &["also", "very", "only", "however", "therefore", "thus", "then", "there", "here", "now", "already", "still", "even", "just", "more", "most", "less", "least", "again", "further", "furthermore", "moreover", "accordingly", "hereby", "too", "so"]),
    (Pos::Num, &["zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten", "hundred", "thousand", "million"]),
];

const FR_WORDS: WordList = &[
    (Pos::Det, &["le", "la", "les", "l'", "un", "une", "des", "du", "au", "aux", "ce", "cet", "cette", "ces", "mon", "ma", "mes", "ton", "ta", "tes", "son", "sa", "ses", "notre", "nos", "votre", "vos", "leur", "leurs", "chaque", "tout", "toute", "tous", "toutes", "aucun", "aucune", "quelques", "plusieurs"]),
    (Pos::Pron, &["je", "j'", "tu", "il", "elle", "on", "nous", "vous", "ils", "elles", "me", "m'", "te", "t'", "se", "s'", "lui", "eux", "y", "en", "qui", "que", "qu'", "quoi", "dont", "où", "celui", "celle", "ceux", "celles", "cela", "ceci", "ça", "lequel", "laquelle", "lesquels", "lesquelles"]),
    (Pos::Adp, &["de", "d'", "à", "dans", "par", "pour", "sur", "sous", "avec", "sans", "entre", "vers", "chez", "contre", "depuis", "pendant", "avant", "après", "selon", "parmi", "conformément", "auprès"]),
    (Pos::Cconj, &["et", "ou", "mais", "ni", "donc", "or", "car"]),
    (Pos::Sconj, &["si", "lorsque", "lorsqu'", "quand", "puisque", "puisqu'", "comme", "bien", "afin", "quoique"]),
    (Pos::Aux, &["est", "sont", "était", "étaient", "être", "été", "sera", "seront", "serait", "a", "ont", "avait", "avaient", "avoir", "aura", "auront", "aurait", "peut", "peuvent", "doit", "doivent"]),
    (Pos::Part, &["ne", "n'", "pas"]),
    (Pos::Adv, &["très", "aussi", "plus", "moins", "déjà", "encore", "toujours", "jamais", "ici", "là", "ainsi", "alors", "également", "notamment", "seulement"]),
    (Pos::Num, &["un", "deux", "trois", "quatre", "cinq", "six", "sept", "huit", "neuf", "dix", "cent", "mille"]),
];

const ES_WORDS: WordList = &[
    (Pos::Det, &["el", "la", "los", "las", "un", "una", "unos", "unas", "del", "al", "este", "esta", "estos", "estas", "ese", "esa", "esos", "esas", "aquel", "aquella", "mi", "mis", "tu", "tus", "su", "sus", "nuestro", "nuestra", "nuestros", "nuestras", "cada", "todo", "toda", "todos", "todas", "ningún", "ninguna", "algún", "alguna", "varios", "varias"]),
    (Pos::Pron, &["yo", "tú", "él", "ella", "usted", "nosotros", "nosotras", "vosotros", "ellos", "ellas", "ustedes", "me", "te", "se", "le", "les", "lo", "nos", "os", "que", "quien", "quienes", "cual", "cuales", "cuyo", "cuya", "esto", "eso", "aquello"]),
    (Pos::Adp, &["de", "a", "en", "por", "para", "con", "sin", "sobre", "entre", "hacia", "hasta", "desde", "contra", "durante", "según", "bajo", "mediante", "ante", "tras"]),
    (Pos::Cconj, &["y", "e", "o", "u", "pero", "ni", "sino"]),
    (Pos::Sconj, &["si", "porque", "aunque", "cuando", "mientras", "como", "donde", "pues"]),
    (Pos::Aux, &["es", "son", "era", "eran", "ser", "sido", "será", "serán", "sería", "está", "están", "estar", "estado", "ha", "han", "había", "habían", "haber", "habrá", "puede", "pueden", "debe", "deben"]),
    (Pos::Part, &["no"]),
    (Pos::Adv, &["muy", "también", "más", "menos", "ya", "todavía", "aún", "siempre", "nunca", "aquí", "allí", "así", "entonces", "además", "solo"]),
    (Pos::Num, &["uno", "dos", "tres", "cuatro", "cinco", "seis", "siete", "ocho", "nueve", "diez", "cien", "mil"]),
];

const DE_WORDS: WordList = &[
    (Pos::Det, &["der", "die", "das", "den", "dem", "des", "ein", "eine", "einen", "einem", "einer", "eines", "dieser", "diese", "dieses", "diesen", "diesem", "jeder", "jede", "jedes", "alle", "kein", "keine", "keinen", "sein", "seine", "ihr", "ihre", "unser", "unsere"]),
    (Pos::Pron, &["ich", "du", "er", "sie", "es", "wir", "ihr", "mich", "dich", "sich", "uns", "euch", "ihm", "ihn", "ihnen", "man", "was", "wer", "welcher", "welche", "welches", "dies", "etwas", "nichts"]),
    (Pos::Adp, &["von", "zu", "mit", "in", "im", "ins", "an", "am", "auf", "für", "aus", "bei", "beim", "nach", "über", "unter", "vor", "zwischen", "durch", "gegen", "ohne", "um", "zum", "zur", "vom", "gemäß", "während", "seit"]),
    (Pos::Cconj, &["und", "oder", "aber", "sondern", "denn", "sowie"]),
    (Pos::Sconj, &["dass", "wenn", "weil", "ob", "als", "obwohl", "während", "damit", "falls"]),
    (Pos::Aux, &["ist", "sind", "war", "waren", "sein", "gewesen", "wird", "werden", "wurde", "wurden", "hat", "haben", "hatte", "hatten", "kann", "können", "muss", "müssen", "soll", "sollen", "darf", "dürfen"]),
    (Pos::Part, &["nicht", "zu"]),
    (Pos::Adv, &["sehr", "auch", "nur", "noch", "schon", "immer", "nie", "hier", "dort", "so", "dann", "jedoch", "daher", "bereits", "insbesondere"]),
    (Pos::Num, &["eins", "zwei", "drei", "vier", "fünf", "sechs", "sieben", "acht", "neun", "zehn", "hundert", "tausend"]),
];

fn build(words: WordList) -> HashMap<&'static str, Pos> {
    let mut map = HashMap::new();
    for (pos, list) in words {
        for w in *list {
            // First list wins for words in more than one class.
            map.entry(*w).or_insert(*pos);
        }
    }
    map
}

static EN: Lazy<HashMap<&'static str, Pos>> = Lazy::new(|| build(EN_WORDS));
static FR: Lazy<HashMap<&'static str, Pos>> = Lazy::new(|| build(FR_WORDS));
static ES: Lazy<HashMap<&'static str, Pos>> = Lazy::new(|| build(ES_WORDS));
static DE: Lazy<HashMap<&'static str, Pos>> = Lazy::new(|| build(DE_WORDS));

static WORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\p{L}\p{M}\p{N}]+(?:[-'\u{2019}.,][\p{L}\p{M}\p{N}]+)*|\S").unwrap()
});
static NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[+-]?\d+(?:[.,]\d+)*%?$").unwrap());
static EN_CLITIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(.+?)(n't|'s|'re|'ve|'ll|'d|'m)$").unwrap());
static FR_ELISION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(l|d|j|m|n|s|t|c|qu|jusqu|lorsqu|puisqu)'(.+)$").unwrap());

/// Tagger built from closed-class word lists, shape heuristics and an
/// optional user lexicon.
#[derive(Debug, Clone)]
pub struct LexiconTagger {
    language: Language,
    /// Lowercased form to `(tag, lemma)`.
    overrides: HashMap<String, (Pos, Option<String>)>,
}

impl LexiconTagger {
    pub fn new(language: Language) -> Self {
        Self {
            language,
            overrides: HashMap::new(),
        }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Read a `form<TAB>POS[<TAB>lemma]` lexicon. Blank lines and lines
    /// starting with `#` are ignored.
    pub fn with_lexicon_file(mut self, path: &Path) -> Result<Self, TaggerError> {
        let content = std::fs::read_to_string(path).map_err(|source| TaggerError::Io {
            path: path.display().to_string(),
            source,
        })?;
        for (n, line) in content.lines().enumerate() {
            let line = line.trim_end();
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.split('\t');
            let form = fields.next().unwrap_or_default().trim();
            let pos = fields.next().ok_or_else(|| TaggerError::InvalidLexicon {
                path: path.display().to_string(),
                line: n + 1,
                reason: "expected form<TAB>POS".into(),
            })?;
            let pos = pos.parse::<Pos>().map_err(|reason| TaggerError::InvalidLexicon {
                path: path.display().to_string(),
                line: n + 1,
                reason,
            })?;
            let lemma = fields
                .next()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from);
            self.overrides.insert(form.to_lowercase(), (pos, lemma));
        }
        tracing::debug!(path = %path.display(), entries = self.overrides.len(), "loaded lexicon");
        Ok(self)
    }

    fn closed_class(&self) -> Option<&'static HashMap<&'static str, Pos>> {
        match self.language {
            Language::En => Some(&*EN),
            Language::Fr => Some(&*FR),
            Language::Es => Some(&*ES),
            Language::De => Some(&*DE),
            Language::Generic => None,
        }
    }

    /// Split words into the pieces the word lists are keyed on: English
    /// clitics and French elided articles become their own tokens.
    fn split_word<'t>(&self, word: &'t str, offset: usize) -> Vec<(&'t str, usize)> {
        let normalized = word.replace('\u{2019}', "'");
        match self.language {
            Language::En => {
                if let Some(c) = EN_CLITIC.captures(&normalized) {
                    let head = c.get(1).map_or(0, |m| m.end());
                    let split = byte_pos(word, &normalized, head);
                    return vec![(&word[..split], offset), (&word[split..], offset + split)];
                }
            }
            Language::Fr => {
                if let Some(c) = FR_ELISION.captures(&normalized) {
                    let head = c.get(1).map_or(0, |m| m.end()) + 1;
                    let split = byte_pos(word, &normalized, head);
                    return vec![(&word[..split], offset), (&word[split..], offset + split)];
                }
            }
            _ => {}
        }
        vec![(word, offset)]
    }

    fn guess(&self, text: &str, lower: &str, sentence_initial: bool) -> Pos {
        let first_alpha = text.chars().next().is_some_and(char::is_alphabetic);
        if !text.chars().any(char::is_alphanumeric) {
            return if text.chars().all(|c| "$%&+<=>^|~#@*\u{20ac}\u{a3}\u{a7}\u{b0}".contains(c)) {
                Pos::Sym
            } else {
                Pos::Punct
            };
        }
        if NUMBER_RE.is_match(text) {
            return Pos::Num;
        }
        if let Some(pos) = self.closed_class().and_then(|m| m.get(lower)) {
            return *pos;
        }
        let capitalised = first_alpha && text.chars().next().is_some_and(char::is_uppercase);
        if capitalised {
            if self.language == Language::De {
                return Pos::Noun;
            }
            let all_caps = text.chars().count() > 1 && text.chars().all(|c| !c.is_lowercase());
            if !sentence_initial || all_caps {
                return Pos::Propn;
            }
        }
        self.suffix_guess(lower)
    }

    fn suffix_guess(&self, lower: &str) -> Pos {
        match self.language {
            Language::En => {
                if has_suffix(lower, &["ly"]) {
                    Pos::Adv
                } else if has_suffix(lower, &["ing", "ed", "ize", "ise", "ify"]) {
                    Pos::Verb
                } else if has_suffix(lower, &["ous", "ful", "ive", "able", "ible", "al", "ic", "less", "ish", "ary"]) {
                    Pos::Adj
                } else {
                    Pos::Noun
                }
            }
            Language::Fr => {
                if (has_suffix(lower, &["ment"]) && !has_suffix(lower, &["ement"]))
                    || has_suffix(lower, &["emment", "amment"])
                {
                    Pos::Adv
                } else if has_suffix(lower, &["er", "ir", "é", "ée", "és", "ées"]) {
                    Pos::Verb
                } else if has_suffix(lower, &["eux", "euse", "ique", "able", "ible", "if", "ive", "el", "elle", "aire"]) {
                    Pos::Adj
                } else {
                    Pos::Noun
                }
            }
            Language::Es => {
                if has_suffix(lower, &["mente"]) {
                    Pos::Adv
                } else if has_suffix(lower, &["ar", "er", "ir", "ado", "ada", "ido", "ida", "ando", "iendo"]) {
                    Pos::Verb
                } else if has_suffix(lower, &["oso", "osa", "ico", "ica", "able", "ible", "al", "ivo", "iva", "ario", "aria"]) {
                    Pos::Adj
                } else {
                    Pos::Noun
                }
            }
            Language::De => {
                if has_suffix(lower, &["lich", "ig", "isch", "bar", "los", "sam"]) {
                    Pos::Adj
                } else if has_suffix(lower, &["en", "ern", "eln"]) {
                    Pos::Verb
                } else {
                    Pos::Adv
                }
            }
            Language::Generic => Pos::Noun,
        }
    }
}

/// Suffix match that leaves at least a three-byte stem.
fn has_suffix(word: &str, suffixes: &[&str]) -> bool {
    suffixes
        .iter()
        .any(|s| word.len() > s.len() + 2 && word.ends_with(s))
}

fn byte_pos(original: &str, normalized: &str, normalized_pos: usize) -> usize {
    // Map a byte position in `normalized` back to `original`, where a
    // 3-byte right quote may have been replaced by a 1-byte apostrophe.
    let chars_before = normalized[..normalized_pos].chars().count();
    original
        .char_indices()
        .nth(chars_before)
        .map_or(original.len(), |(i, _)| i)
}

impl Tagger for LexiconTagger {
    fn tag(&self, text: &str) -> Vec<Token> {
        let mut tokens: Vec<Token> = Vec::new();
        let mut sentence_initial = true;
        for m in WORD_RE.find_iter(text) {
            for (piece, offset) in self.split_word(m.as_str(), m.start()) {
                let lower = piece.to_lowercase().replace('\u{2019}', "'");
                let (pos, lemma) = match self.overrides.get(&lower) {
                    Some((pos, lemma)) => (*pos, lemma.clone().unwrap_or_else(|| lower.clone())),
                    None => (self.guess(piece, &lower, sentence_initial), lower.clone()),
                };
                sentence_initial = matches!(piece, "." | "!" | "?" | ":" | ";")
                    || (sentence_initial && pos == Pos::Punct);
                tokens.push(Token {
                    text: piece.to_string(),
                    lemma,
                    pos,
                    offset,
                });
            }
        }
        tokens
    }
}

/// Resolve a model id to a tagger.
///
/// A language code (`fr`, `fr-FR`, `fr_core_news_md`) selects the built-in
/// word lists. Anything else must be an existing lexicon file; its language
/// comes from the file stem (`de_legal.tsv` is German), defaulting to the
/// generic heuristics.
pub fn load_tagger(model_id: &str) -> Result<LexiconTagger, TaggerError> {
    let path = Path::new(model_id);
    if path.is_file() {
        let language = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(Language::from_code)
            .unwrap_or(Language::Generic);
        return LexiconTagger::new(language).with_lexicon_file(path);
    }
    match Language::from_code(model_id) {
        Some(language) => Ok(LexiconTagger::new(language)),
        None => Err(TaggerError::UnknownModel(model_id.to_string())),
    }
}
