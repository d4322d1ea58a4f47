use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ReportError, Result};

pub const DEFAULT_CONFIG_FILE: &str = "audit_report.toml";
pub const DEFAULT_LOG_LEVEL: &str = "audit_report=info";

/// Main configuration structure loaded from audit_report.toml and environment variables
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub generator: GeneratorConfig,
    pub export: ExportConfig,
    /// Runtime configuration loaded from environment variables
    #[serde(skip)]
    pub runtime: RuntimeConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Gemini,
    /// Deterministic offline recommendations, no network
    Canned,
}

impl std::str::FromStr for Provider {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Provider::Gemini),
            "canned" | "offline" => Ok(Provider::Canned),
            other => Err(ReportError::config(format!(
                "unknown generator provider '{}'",
                other
            ))),
        }
    }
}

/// Recommendation backend settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub provider: Provider,
    pub api_base: String,
    pub text_model: String,
    pub vision_model: String,
    /// Request timeout; unset leaves reqwest's defaults in charge
    pub timeout_ms: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Gemini,
            api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            text_model: "gemini-pro".to_string(),
            vision_model: "gemini-2.5-flash".to_string(),
            timeout_ms: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExportConfig {
    pub output_dir: PathBuf,
    pub include_priority: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            include_priority: true,
        }
    }
}

/// Runtime configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub google_api_key: Option<String>,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            google_api_key: None,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_file: None,
        }
    }
}

impl RuntimeConfig {
    pub fn load_from(lookup: &impl Fn(&str) -> Option<String>) -> Self {
        Self {
            google_api_key: lookup("GOOGLE_API_KEY").filter(|k| !is_placeholder(k)),
            log_level: lookup("RUST_LOG").unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            log_file: lookup("AUDIT_LOG_FILE").map(PathBuf::from),
        }
    }
}

fn is_placeholder(s: &str) -> bool {
    let t = s.trim();
    t.is_empty()
        || t.contains("${")
        || t.eq_ignore_ascii_case("your_key")
        || t.eq_ignore_ascii_case("your-api-key-here")
        || t.eq_ignore_ascii_case("changeme")
}

/// Reads the config file; only a missing file counts as "no file".
fn read_config_file(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

impl Config {
    /// Load configuration from TOML file and environment variables
    /// Uses AUDIT_REPORT_CONFIG environment variable or defaults to "audit_report.toml"
    pub fn load() -> Result<Self> {
        // Environment files:
        // 1) AUDIT_ENV_FILE if set
        // 2) ./.env
        // 3) ../.env when the API key is still missing
        if let Ok(env_path) = std::env::var("AUDIT_ENV_FILE") {
            let _ = dotenvy::from_path(env_path);
        } else {
            let _ = dotenvy::from_path(".env");
            if std::env::var("GOOGLE_API_KEY").is_err() {
                let _ = dotenvy::from_path("../.env");
            }
        }

        let config_path = std::env::var("AUDIT_REPORT_CONFIG")
            .unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

        let mut config = match read_config_file(Path::new(&config_path))? {
            Some(content) => Self::from_toml_str(&content)?,
            None => {
                tracing::warn!("Config file {} not found, using defaults", config_path);
                Self::default()
            }
        };

        config.apply_overrides(&env_lookup)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply env-style overrides and load runtime settings.
    pub fn apply_overrides(&mut self, lookup: &impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(provider) = lookup("AUDIT_PROVIDER") {
            self.generator.provider = provider.parse()?;
            tracing::debug!("AUDIT_PROVIDER env override applied");
        }
        if let Some(base) = lookup("AUDIT_API_BASE") {
            self.generator.api_base = base;
        }
        if let Some(model) = lookup("AUDIT_TEXT_MODEL") {
            self.generator.text_model = model;
        }
        if let Some(model) = lookup("AUDIT_VISION_MODEL") {
            self.generator.vision_model = model;
        }
        if let Some(raw) = lookup("AUDIT_TIMEOUT_MS") {
            let ms = raw.trim().parse::<u64>().map_err(|_| {
                ReportError::config(format!("AUDIT_TIMEOUT_MS must be an integer, got '{}'", raw))
            })?;
            self.generator.timeout_ms = Some(ms);
        }
        if let Some(dir) = lookup("AUDIT_OUTPUT_DIR") {
            self.export.output_dir = PathBuf::from(dir);
        }
        if let Some(flag) = lookup("AUDIT_INCLUDE_PRIORITY") {
            self.export.include_priority = !(flag == "0" || flag.eq_ignore_ascii_case("false"));
        }

        self.runtime = RuntimeConfig::load_from(lookup);
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let generator = &self.generator;
        if generator.text_model.trim().is_empty() || generator.vision_model.trim().is_empty() {
            return Err(ReportError::config("model names must not be empty"));
        }
        if !generator.api_base.starts_with("http://") && !generator.api_base.starts_with("https://")
        {
            return Err(ReportError::config(format!(
                "api_base '{}' must start with http:// or https://",
                generator.api_base
            )));
        }
        if generator.timeout_ms == Some(0) {
            return Err(ReportError::config("timeout_ms must be greater than zero"));
        }
        Ok(())
    }

    /// Where interactive sessions write their log lines
    pub fn log_file(&self) -> PathBuf {
        self.runtime
            .log_file
            .clone()
            .unwrap_or_else(|| self.export.output_dir.join("audit_report.log"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_select_gemini_models() {
        let config = Config::default();
        assert_eq!(config.generator.text_model, "gemini-pro");
        assert_eq!(config.generator.vision_model, "gemini-2.5-flash");
        assert_eq!(config.generator.provider, Provider::Gemini);
        assert!(config.generator.timeout_ms.is_none());
        assert!(config.export.include_priority);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            [generator]
            vision_model = "gemini-2.0-flash"
            timeout_ms = 30000

            [export]
            include_priority = false
            "#,
        )
        .unwrap();
        assert_eq!(config.generator.vision_model, "gemini-2.0-flash");
        assert_eq!(config.generator.text_model, "gemini-pro");
        assert_eq!(config.generator.timeout_ms, Some(30_000));
        assert!(!config.export.include_priority);
    }

    #[test]
    fn env_overrides_win_over_file() {
        let mut config = Config::default();
        let lookup = lookup_from(&[
            ("AUDIT_PROVIDER", "canned"),
            ("AUDIT_OUTPUT_DIR", "/tmp/reports"),
            ("AUDIT_INCLUDE_PRIORITY", "false"),
            ("GOOGLE_API_KEY", "abc123"),
        ]);
        config.apply_overrides(&lookup).unwrap();
        assert_eq!(config.generator.provider, Provider::Canned);
        assert_eq!(config.export.output_dir, PathBuf::from("/tmp/reports"));
        assert!(!config.export.include_priority);
        assert_eq!(config.runtime.google_api_key.as_deref(), Some("abc123"));
        assert_eq!(config.runtime.log_level, DEFAULT_LOG_LEVEL);
    }

    #[test]
    fn placeholder_api_key_is_ignored() {
        let runtime = RuntimeConfig::load_from(&lookup_from(&[("GOOGLE_API_KEY", "${GOOGLE_API_KEY}")]));
        assert!(runtime.google_api_key.is_none());
    }

    #[test]
    fn only_missing_config_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_config_file(&dir.path().join("absent.toml")).unwrap().is_none());

        let file = dir.path().join("audit_report.toml");
        std::fs::write(&file, "[export]\ninclude_priority = false\n").unwrap();
        assert!(read_config_file(&file).unwrap().is_some());

        // a directory where the file should be is an error, not "missing"
        let err = read_config_file(dir.path()).unwrap_err();
        assert!(matches!(err, ReportError::Io(_)));
    }

    #[test]
    fn bad_values_are_rejected() {
        let mut config = Config::default();
        assert!(
            config
                .apply_overrides(&lookup_from(&[("AUDIT_TIMEOUT_MS", "soon")]))
                .is_err()
        );

        let mut config = Config::default();
        config.generator.api_base = "ftp://example".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.generator.timeout_ms = Some(0);
        assert!(config.validate().is_err());
    }
}
