use anyhow::{Context, Result};
use chrono::format::{Item, StrftimeItems};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub vault: VaultConfig,
    #[serde(default)]
    pub related: RelatedConfig,
    #[serde(default)]
    pub daily: DailyConfig,
    #[serde(default)]
    pub structuring: StructuringConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VaultConfig {
    pub path: PathBuf,
    #[serde(default = "default_extension")]
    pub extension: String,
    /// Vault name used in daily-note URIs. Defaults to the directory name.
    #[serde(default)]
    pub name: Option<String>,
}

fn default_extension() -> String {
    "md".to_string()
}

impl VaultConfig {
    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| {
            self.path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "vault".to_string())
        })
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RelatedConfig {
    #[serde(default = "default_match_cap")]
    pub match_cap: usize,
    #[serde(default = "default_strategy")]
    pub strategy: String,
    #[serde(default = "default_min_overlap")]
    pub min_overlap: f64,
}

impl Default for RelatedConfig {
    fn default() -> Self {
        Self {
            match_cap: default_match_cap(),
            strategy: default_strategy(),
            min_overlap: default_min_overlap(),
        }
    }
}

fn default_match_cap() -> usize {
    2
}
fn default_strategy() -> String {
    "substring".to_string()
}
fn default_min_overlap() -> f64 {
    0.6
}

#[derive(Debug, Deserialize, Clone)]
pub struct DailyConfig {
    /// Folder for daily notes, relative to the vault root. Empty means the root.
    #[serde(default)]
    pub folder: String,
    #[serde(default = "default_date_format")]
    pub date_format: String,
    /// Command used to open the daily-note URI (e.g. `xdg-open`, `open`).
    #[serde(default)]
    pub opener: Option<String>,
    #[serde(default = "default_callout_wait_ms")]
    pub callout_wait_ms: u64,
}

impl Default for DailyConfig {
    fn default() -> Self {
        Self {
            folder: String::new(),
            date_format: default_date_format(),
            opener: None,
            callout_wait_ms: default_callout_wait_ms(),
        }
    }
}

fn default_date_format() -> String {
    "%Y-%m-%d".to_string()
}
fn default_callout_wait_ms() -> u64 {
    2000
}

#[derive(Debug, Deserialize, Clone)]
pub struct StructuringConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_structuring_retries")]
    pub max_retries: u32,
    #[serde(default = "default_structuring_timeout")]
    pub timeout_secs: u64,
}

impl Default for StructuringConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            max_retries: default_structuring_retries(),
            timeout_secs: default_structuring_timeout(),
        }
    }
}

impl StructuringConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_structuring_retries() -> u32 {
    3
}
fn default_structuring_timeout() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7340".to_string()
}

impl Config {
    /// A config with every section at its default, pointed at `path`.
    pub fn for_vault(path: impl Into<PathBuf>) -> Self {
        Self {
            vault: VaultConfig {
                path: path.into(),
                extension: default_extension(),
                name: None,
            },
            related: RelatedConfig::default(),
            daily: DailyConfig::default(),
            structuring: StructuringConfig::default(),
            embedding: EmbeddingConfig::default(),
            server: ServerConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.vault.extension.trim().is_empty() {
            anyhow::bail!("vault.extension must not be empty");
        }

        if self.related.match_cap == 0 {
            anyhow::bail!("related.match_cap must be >= 1");
        }

        match self.related.strategy.as_str() {
            "substring" | "token_overlap" => {}
            other => anyhow::bail!(
                "Unknown related.strategy: '{}'. Must be substring or token_overlap.",
                other
            ),
        }

        if !(self.related.min_overlap > 0.0 && self.related.min_overlap <= 1.0) {
            anyhow::bail!("related.min_overlap must be in (0.0, 1.0]");
        }

        if self.daily.date_format.trim().is_empty() {
            anyhow::bail!("daily.date_format must not be empty");
        }
        if StrftimeItems::new(&self.daily.date_format).any(|item| matches!(item, Item::Error)) {
            anyhow::bail!(
                "daily.date_format is not a valid strftime format: '{}'",
                self.daily.date_format
            );
        }

        match self.structuring.provider.as_str() {
            "disabled" => {}
            "openai" => {
                if self.structuring.model.is_none() {
                    anyhow::bail!("structuring.model must be specified when provider is 'openai'");
                }
            }
            other => anyhow::bail!(
                "Unknown structuring provider: '{}'. Must be disabled or openai.",
                other
            ),
        }

        if self.embedding.is_enabled() {
            if self.embedding.dims.is_none() || self.embedding.dims == Some(0) {
                anyhow::bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    self.embedding.provider
                );
            }
            if self.embedding.model.is_none() {
                anyhow::bail!(
                    "embedding.model must be specified when provider is '{}'",
                    self.embedding.provider
                );
            }
            if self.embedding.batch_size == 0 {
                anyhow::bail!("embedding.batch_size must be > 0");
            }
        }

        match self.embedding.provider.as_str() {
            "disabled" | "openai" => {}
            other => anyhow::bail!(
                "Unknown embedding provider: '{}'. Must be disabled or openai.",
                other
            ),
        }

        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse("[vault]\npath = \"/tmp/notes\"\n").unwrap();
        assert_eq!(config.vault.extension, "md");
        assert_eq!(config.related.match_cap, 2);
        assert_eq!(config.related.strategy, "substring");
        assert_eq!(config.daily.date_format, "%Y-%m-%d");
        assert!(!config.embedding.is_enabled());
        assert!(!config.structuring.is_enabled());
        assert_eq!(config.server.bind, "127.0.0.1:7340");
        assert_eq!(config.vault.display_name(), "notes");
    }

    #[test]
    fn test_zero_cap_rejected() {
        let err = parse("[vault]\npath = \"/tmp/notes\"\n[related]\nmatch_cap = 0\n").unwrap_err();
        assert!(err.to_string().contains("match_cap"));
    }

    #[test]
    fn test_unknown_strategy_rejected() {
        let err =
            parse("[vault]\npath = \"/tmp/n\"\n[related]\nstrategy = \"vibes\"\n").unwrap_err();
        assert!(err.to_string().contains("related.strategy"));
    }

    #[test]
    fn test_enabled_embedding_requires_dims() {
        let err = parse(
            "[vault]\npath = \"/tmp/n\"\n[embedding]\nprovider = \"openai\"\nmodel = \"text-embedding-3-small\"\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("embedding.dims"));
    }

    #[test]
    fn test_openai_structuring_requires_model() {
        let err =
            parse("[vault]\npath = \"/tmp/n\"\n[structuring]\nprovider = \"openai\"\n").unwrap_err();
        assert!(err.to_string().contains("structuring.model"));
    }

    #[test]
    fn test_explicit_vault_name() {
        let config = parse("[vault]\npath = \"/tmp/n\"\nname = \"Work\"\n").unwrap();
        assert_eq!(config.vault.display_name(), "Work");
    }

    #[test]
    fn test_invalid_date_format_rejected() {
        let err = parse("[vault]\npath = \"/tmp/n\"\n[daily]\ndate_format = \"%Q\"\n").unwrap_err();
        assert!(err.to_string().contains("daily.date_format"));

        let config = parse("[vault]\npath = \"/tmp/n\"\n[daily]\ndate_format = \"%d.%m.%Y\"\n").unwrap();
        assert_eq!(config.daily.date_format, "%d.%m.%Y");
    }
}
