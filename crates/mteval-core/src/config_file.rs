use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub translator: Option<TranslatorConfig>,
    pub evaluation: Option<EvaluationConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranslatorConfig {
    pub subscription_key: Option<String>,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvaluationConfig {
    pub categories: Option<Vec<String>>,
    pub aligner_path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub debug: Option<bool>,
}

/// Platform config directory path: `<config_dir>/mteval/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("mteval").join("config.toml"))
}

/// Load config by cascading CWD `.mteval.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(".mteval.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unparseable config file");
            None
        }
    }
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    ConfigFile {
        translator: Some(TranslatorConfig {
            subscription_key: overlay
                .translator
                .as_ref()
                .and_then(|t| t.subscription_key.clone())
                .or_else(|| {
                    base.translator
                        .as_ref()
                        .and_then(|t| t.subscription_key.clone())
                }),
            region: overlay
                .translator
                .as_ref()
                .and_then(|t| t.region.clone())
                .or_else(|| base.translator.as_ref().and_then(|t| t.region.clone())),
            endpoint: overlay
                .translator
                .as_ref()
                .and_then(|t| t.endpoint.clone())
                .or_else(|| base.translator.as_ref().and_then(|t| t.endpoint.clone())),
            timeout_secs: overlay
                .translator
                .as_ref()
                .and_then(|t| t.timeout_secs)
                .or_else(|| base.translator.as_ref().and_then(|t| t.timeout_secs)),
        }),
        evaluation: Some(EvaluationConfig {
            categories: overlay
                .evaluation
                .as_ref()
                .and_then(|e| e.categories.clone())
                .or_else(|| base.evaluation.as_ref().and_then(|e| e.categories.clone())),
            aligner_path: overlay
                .evaluation
                .as_ref()
                .and_then(|e| e.aligner_path.clone())
                .or_else(|| {
                    base.evaluation
                        .as_ref()
                        .and_then(|e| e.aligner_path.clone())
                }),
        }),
        logging: Some(LoggingConfig {
            debug: overlay
                .logging
                .as_ref()
                .and_then(|l| l.debug)
                .or_else(|| base.logging.as_ref().and_then(|l| l.debug)),
        }),
    }
}
