//! Validated runtime settings.
//!
//! Values are resolved with the precedence CLI flag > environment variable >
//! config file > default, and checked once at startup so that a missing key
//! fails before any PDF is parsed or any request is sent.

use std::path::PathBuf;

use thiserror::Error;

use crate::config_file::ConfigFile;

/// Public endpoint of the Microsoft Translator v3 API.
pub const DEFAULT_ENDPOINT: &str = "https://api.cognitive.microsofttranslator.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Settings shared by every job in a run.
#[derive(Clone)]
pub struct Settings {
    pub subscription_key: String,
    pub region: String,
    /// Category (custom model) ids to evaluate, in report column order.
    pub categories: Vec<String>,
    /// Directory holding `align-sents-all.pl`.
    pub aligner_path: Option<PathBuf>,
    pub endpoint: String,
    pub request_timeout_secs: u64,
    pub debug: bool,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("subscription_key", &"***")
            .field("region", &self.region)
            .field("categories", &self.categories)
            .field("aligner_path", &self.aligner_path)
            .field("endpoint", &self.endpoint)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("debug", &self.debug)
            .finish()
    }
}

/// `DEBUG=1`, `DEBUG=yes`, `DEBUG=anything` are on; empty, `0`, `false`
/// and `no` are off.
pub fn parse_flag(value: &str) -> bool {
    let v = value.trim().to_ascii_lowercase();
    !(v.is_empty() || v == "0" || v == "false" || v == "no" || v == "off")
}

/// Split a comma-separated category list, dropping blank fragments.
pub fn parse_categories(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(String::from)
        .collect()
}

/// Collects raw values from the different sources before validation.
#[derive(Debug, Clone, Default)]
pub struct SettingsBuilder {
    pub subscription_key: Option<String>,
    pub region: Option<String>,
    pub categories: Option<Vec<String>>,
    pub aligner_path: Option<PathBuf>,
    pub endpoint: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub debug: Option<bool>,
}

impl SettingsBuilder {
    /// Seed from a config file; lowest precedence after defaults.
    pub fn from_config_file(file: &ConfigFile) -> Self {
        let translator = file.translator.clone().unwrap_or_default();
        let evaluation = file.evaluation.clone().unwrap_or_default();
        Self {
            subscription_key: translator.subscription_key,
            region: translator.region,
            categories: evaluation.categories,
            aligner_path: evaluation.aligner_path.map(PathBuf::from),
            endpoint: translator.endpoint,
            request_timeout_secs: translator.timeout_secs,
            debug: file.logging.as_ref().and_then(|l| l.debug),
        }
    }

    /// Overlay values found through `lookup` (normally `std::env::var`).
    ///
    /// Taking the lookup as a closure keeps tests away from the process
    /// environment.
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        if let Some(v) = lookup("SUBSCRIPTION_KEY") {
            self.subscription_key = Some(v);
        }
        if let Some(v) = lookup("REGION") {
            self.region = Some(v);
        }
        if let Some(v) = lookup("CATEGORIES") {
            self.categories = Some(parse_categories(&v));
        }
        if let Some(v) = lookup("ALIGNER_PATH") {
            self.aligner_path = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("TRANSLATOR_ENDPOINT") {
            self.endpoint = Some(v);
        }
        if let Some(v) = lookup("TRANSLATOR_TIMEOUT") {
            let secs = v.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
                key: "TRANSLATOR_TIMEOUT",
                reason: e.to_string(),
            })?;
            self.request_timeout_secs = Some(secs);
        }
        if let Some(v) = lookup("DEBUG") {
            self.debug = Some(parse_flag(&v));
        }
        Ok(self)
    }

    /// Validate everything the evaluation pipeline needs.
    pub fn build_for_evaluation(self) -> Result<Settings, ConfigError> {
        let categories = self.categories.clone().unwrap_or_default();
        let categories: Vec<String> = categories
            .iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        if categories.is_empty() {
            return Err(ConfigError::Missing("CATEGORIES"));
        }
        for (i, c) in categories.iter().enumerate() {
            if categories[..i].contains(c) {
                return Err(ConfigError::Invalid {
                    key: "CATEGORIES",
                    reason: format!("duplicate category {c}"),
                });
            }
        }

        let aligner_path = self
            .aligner_path
            .clone()
            .ok_or(ConfigError::Missing("ALIGNER_PATH"))?;
        if !aligner_path.is_dir() {
            return Err(ConfigError::Invalid {
                key: "ALIGNER_PATH",
                reason: format!("{} is not a directory", aligner_path.display()),
            });
        }

        let mut settings = self.build_common()?;
        settings.categories = categories;
        settings.aligner_path = Some(aligner_path);
        Ok(settings)
    }

    /// Validate what the phrase-dictionary job needs (no aligner, no categories).
    pub fn build_for_dictionary(self) -> Result<Settings, ConfigError> {
        self.build_common()
    }

    fn build_common(self) -> Result<Settings, ConfigError> {
        let subscription_key = non_blank(self.subscription_key, "SUBSCRIPTION_KEY")?;
        let region = non_blank(self.region, "REGION")?;

        let endpoint = self
            .endpoint
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
            .trim()
            .trim_end_matches('/')
            .to_string();
        if !(endpoint.starts_with("https://") || endpoint.starts_with("http://")) {
            return Err(ConfigError::Invalid {
                key: "TRANSLATOR_ENDPOINT",
                reason: format!("{endpoint} is not an http(s) URL"),
            });
        }

        let request_timeout_secs = self.request_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "TRANSLATOR_TIMEOUT",
                reason: "must be greater than zero".into(),
            });
        }

        Ok(Settings {
            subscription_key,
            region,
            categories: self.categories.unwrap_or_default(),
            aligner_path: self.aligner_path,
            endpoint,
            request_timeout_secs,
            debug: self.debug.unwrap_or(false),
        })
    }
}

fn non_blank(value: Option<String>, key: &'static str) -> Result<String, ConfigError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(ConfigError::Missing(key)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn flag_parsing() {
        assert!(parse_flag("1"));
        assert!(parse_flag("True"));
        assert!(parse_flag("yes"));
        assert!(!parse_flag(""));
        assert!(!parse_flag("0"));
        assert!(!parse_flag("FALSE"));
    }

    #[test]
    fn categories_drop_blanks() {
        assert_eq!(
            parse_categories(" general, ,abc-123 ,"),
            vec!["general".to_string(), "abc-123".to_string()]
        );
    }

    #[test]
    fn evaluation_settings_from_env() {
        let dir = tempfile::tempdir().unwrap();
        let aligner = dir.path().to_string_lossy().to_string();
        let settings = SettingsBuilder::default()
            .with_env(env(&[
                ("SUBSCRIPTION_KEY", "secret"),
                ("REGION", "westeurope"),
                ("CATEGORIES", "general,legal"),
                ("ALIGNER_PATH", aligner.as_str()),
                ("DEBUG", "1"),
            ]))
            .unwrap()
            .build_for_evaluation()
            .unwrap();
        assert_eq!(settings.categories, vec!["general", "legal"]);
        assert_eq!(settings.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(settings.request_timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert!(settings.debug);
        assert!(!format!("{settings:?}").contains("secret"));
    }

    #[test]
    fn env_overrides_config_file() {
        let file: ConfigFile =
            toml::from_str("[translator]\nregion = \"eastus\"\nsubscription_key = \"k\"\n").unwrap();
        let settings = SettingsBuilder::from_config_file(&file)
            .with_env(env(&[("REGION", "westeurope")]))
            .unwrap()
            .build_for_dictionary()
            .unwrap();
        assert_eq!(settings.region, "westeurope");
        assert_eq!(settings.subscription_key, "k");
    }

    #[test]
    fn missing_key_is_reported() {
        let err = SettingsBuilder::default()
            .with_env(env(&[("REGION", "westeurope")]))
            .unwrap()
            .build_for_dictionary()
            .unwrap_err();
        assert_eq!(err, ConfigError::Missing("SUBSCRIPTION_KEY"));
    }

    #[test]
    fn blank_categories_rejected() {
        let err = SettingsBuilder::default()
            .with_env(env(&[
                ("SUBSCRIPTION_KEY", "k"),
                ("REGION", "r"),
                ("CATEGORIES", " , "),
            ]))
            .unwrap()
            .build_for_evaluation()
            .unwrap_err();
        assert_eq!(err, ConfigError::Missing("CATEGORIES"));
    }

    #[test]
    fn duplicate_categories_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let builder = SettingsBuilder {
            subscription_key: Some("k".into()),
            region: Some("r".into()),
            categories: Some(vec!["a".into(), "a".into()]),
            aligner_path: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        assert!(matches!(
            builder.build_for_evaluation(),
            Err(ConfigError::Invalid { key: "CATEGORIES", .. })
        ));
    }

    #[test]
    fn aligner_path_must_exist() {
        let builder = SettingsBuilder {
            subscription_key: Some("k".into()),
            region: Some("r".into()),
            categories: Some(vec!["a".into()]),
            aligner_path: Some(PathBuf::from("/definitely/not/here")),
            ..Default::default()
        };
        assert!(matches!(
            builder.build_for_evaluation(),
            Err(ConfigError::Invalid { key: "ALIGNER_PATH", .. })
        ));
    }

    #[test]
    fn bad_timeout_and_endpoint() {
        assert!(matches!(
            SettingsBuilder::default().with_env(env(&[("TRANSLATOR_TIMEOUT", "soon")])),
            Err(ConfigError::Invalid { key: "TRANSLATOR_TIMEOUT", .. })
        ));
        let builder = SettingsBuilder {
            subscription_key: Some("k".into()),
            region: Some("r".into()),
            endpoint: Some("ftp://example.com".into()),
            ..Default::default()
        };
        assert!(matches!(
            builder.build_for_dictionary(),
            Err(ConfigError::Invalid { key: "TRANSLATOR_ENDPOINT", .. })
        ));
    }

    #[test]
    fn endpoint_trailing_slash_trimmed() {
        let builder = SettingsBuilder {
            subscription_key: Some("k".into()),
            region: Some("r".into()),
            endpoint: Some("http://127.0.0.1:9000/".into()),
            ..Default::default()
        };
        assert_eq!(builder.build_for_dictionary().unwrap().endpoint, "http://127.0.0.1:9000");
    }
}
