//! Daily notes.
//!
//! The daily note for a date lives at `<vault>/<daily.folder>/<date>.<ext>`,
//! where `<date>` is rendered with `daily.date_format` (chrono strftime).
//!
//! Bootstrapping a missing daily note first goes through the note app: when
//! `daily.opener` is set, `<opener> obsidian://new?vault=..&file=..` is run
//! and the file is polled for up to `daily.callout_wait_ms`. If the app does
//! not create it in time (or no opener is configured), the note is created
//! directly with a title heading.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use reqwest::Url;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::Config;
use crate::vault::{self, Vault};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct DailyNotes {
    root: PathBuf,
    folder: String,
    date_format: String,
    extension: String,
    vault_name: String,
    opener: Option<String>,
    callout_wait: Duration,
}

impl DailyNotes {
    pub fn from_config(config: &Config) -> Self {
        Self {
            root: config.vault.path.clone(),
            folder: config.daily.folder.trim_matches('/').to_string(),
            date_format: config.daily.date_format.clone(),
            extension: config.vault.extension.trim_start_matches('.').to_string(),
            vault_name: config.vault.display_name(),
            opener: config.daily.opener.clone().filter(|o| !o.trim().is_empty()),
            callout_wait: Duration::from_millis(config.daily.callout_wait_ms),
        }
    }

    /// Path relative to the vault root, without the extension.
    fn relative_stem(&self, date: NaiveDate) -> Result<String> {
        let mut name = String::new();
        write!(name, "{}", date.format(&self.date_format)).map_err(|_| {
            anyhow::anyhow!("invalid daily.date_format: '{}'", self.date_format)
        })?;
        if self.folder.is_empty() {
            Ok(name)
        } else {
            Ok(format!("{}/{}", self.folder, name))
        }
    }

    /// Title of the daily note (its file name without extension).
    pub fn title_for(&self, date: NaiveDate) -> Result<String> {
        let stem = self.relative_stem(date)?;
        Ok(stem.rsplit('/').next().unwrap_or(&stem).to_string())
    }

    pub fn path_for(&self, date: NaiveDate) -> Result<PathBuf> {
        Ok(self
            .root
            .join(format!("{}.{}", self.relative_stem(date)?, self.extension)))
    }

    /// URI asking the note app to create (or open) the daily note.
    pub fn uri_for(&self, date: NaiveDate) -> Result<Url> {
        let mut url = Url::parse("obsidian://new").context("invalid daily-note URI base")?;
        url.query_pairs_mut()
            .append_pair("vault", &self.vault_name)
            .append_pair("file", &self.relative_stem(date)?);
        Ok(url)
    }

    /// Make sure the daily note exists. Returns its path and whether this
    /// call created it. The vault root itself must already exist; only the
    /// daily folder below it is created.
    pub async fn ensure(&self, date: NaiveDate) -> Result<(PathBuf, bool)> {
        Vault::new(self.root.clone(), self.extension.clone())
            .ensure_root()
            .await?;

        let path = self.path_for(date)?;
        if exists(&path).await {
            return Ok((path, false));
        }

        if let Some(opener) = &self.opener {
            match self.callout(opener, date).await {
                Ok(()) => {
                    if self.wait_for(&path).await {
                        tracing::info!(path = %path.display(), "daily note created by URI callout");
                        return Ok((path, true));
                    }
                    tracing::warn!(
                        path = %path.display(),
                        wait_ms = self.callout_wait.as_millis() as u64,
                        "daily note did not appear after URI callout, creating it directly"
                    );
                }
                Err(e) => {
                    tracing::warn!(error = %e, "daily note URI callout failed, creating it directly");
                }
            }
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create daily folder: {}", parent.display()))?;
        }
        let heading = format!("# {}\n", self.title_for(date)?);
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(mut file) => {
                vault::write_all(&mut file, &path, &heading).await?;
                tracing::info!(path = %path.display(), "daily note created");
                Ok((path, true))
            }
            // Someone else created it in the meantime.
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok((path, false)),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to create daily note: {}", path.display())),
        }
    }

    async fn callout(&self, opener: &str, date: NaiveDate) -> Result<()> {
        let uri = self.uri_for(date)?;
        let mut parts = opener.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| anyhow::anyhow!("daily.opener is empty"))?;
        let status = tokio::process::Command::new(program)
            .args(parts)
            .arg(uri.as_str())
            .status()
            .await
            .with_context(|| format!("Failed to run daily.opener '{}'", opener))?;
        if !status.success() {
            anyhow::bail!("daily.opener '{}' exited with {}", opener, status);
        }
        Ok(())
    }

    async fn wait_for(&self, path: &Path) -> bool {
        let deadline = tokio::time::Instant::now() + self.callout_wait;
        loop {
            if exists(path).await {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

async fn exists(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 7).unwrap()
    }

    fn daily(root: &Path, folder: &str) -> DailyNotes {
        let mut config = Config::for_vault(root);
        config.daily.folder = folder.to_string();
        config.vault.name = Some("My Vault".to_string());
        DailyNotes::from_config(&config)
    }

    #[test]
    fn test_paths_and_title() {
        let d = daily(Path::new("/v"), "Daily/");
        assert_eq!(d.title_for(date()).unwrap(), "2026-03-07");
        assert_eq!(
            d.path_for(date()).unwrap(),
            PathBuf::from("/v/Daily/2026-03-07.md")
        );

        let root = daily(Path::new("/v"), "");
        assert_eq!(
            root.path_for(date()).unwrap(),
            PathBuf::from("/v/2026-03-07.md")
        );
    }

    #[test]
    fn test_uri_is_encoded() {
        let d = daily(Path::new("/v"), "Daily");
        let uri = d.uri_for(date()).unwrap();
        assert_eq!(uri.scheme(), "obsidian");
        let pairs: Vec<(String, String)> = uri
            .query_pairs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("vault".to_string(), "My Vault".to_string()),
                ("file".to_string(), "Daily/2026-03-07".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_ensure_creates_once() {
        let tmp = TempDir::new().unwrap();
        let d = daily(tmp.path(), "Daily");

        let (path, created) = d.ensure(date()).await.unwrap();
        assert!(created);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# 2026-03-07\n");

        let (again, created) = d.ensure(date()).await.unwrap();
        assert_eq!(again, path);
        assert!(!created);
    }

    #[tokio::test]
    async fn test_failed_callout_falls_back() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::for_vault(tmp.path());
        config.daily.opener = Some("false".to_string());
        config.daily.callout_wait_ms = 50;
        let d = DailyNotes::from_config(&config);

        let (path, created) = d.ensure(date()).await.unwrap();
        assert!(created);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_heading_is_on_disk_when_ensure_returns() {
        let tmp = TempDir::new().unwrap();
        let d = daily(tmp.path(), "Daily");
        for day in 1..=20 {
            let date = NaiveDate::from_ymd_opt(2026, 4, day).unwrap();
            let (path, created) = d.ensure(date).await.unwrap();
            assert!(created);
            assert_eq!(
                std::fs::read_to_string(&path).unwrap(),
                format!("# {}\n", date.format("%Y-%m-%d"))
            );
        }
    }

    #[tokio::test]
    async fn test_missing_vault_is_not_created() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("missing");
        let d = daily(&root, "Daily");

        let err = d.ensure(date()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<crate::error::VaultError>(),
            Some(crate::error::VaultError::VaultAccess { .. })
        ));
        assert!(!root.exists());
    }

    #[test]
    fn test_invalid_date_format_is_an_error() {
        let mut config = Config::for_vault(Path::new("/v"));
        config.daily.date_format = "%Q".to_string();
        let d = DailyNotes::from_config(&config);
        assert!(d.title_for(date()).is_err());
        assert!(d.path_for(date()).is_err());
    }
}
