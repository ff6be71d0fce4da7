pub mod auth;
pub mod convert;
pub mod generate;
pub mod import;
pub mod plan;
pub mod purge;

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use calplan_core::{RetryPolicy, Settings};
use calplan_provider_google::{GoogleCalendarApi, Session};
use tokio_util::sync::CancellationToken;

/// What every command needs, loaded once per run.
pub struct Context {
    pub settings: Settings,
    pub prompt: PathBuf,
    json_out: Option<PathBuf>,
    ics_out: Option<PathBuf>,
    cancel: CancellationToken,
}

impl Context {
    pub fn load(
        settings_path: &Path,
        prompt: PathBuf,
        json_out: Option<PathBuf>,
        ics_out: Option<PathBuf>,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let settings = Settings::load(settings_path)
            .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;

        Ok(Context {
            settings,
            prompt,
            json_out,
            ics_out,
            cancel,
        })
    }

    pub fn json_path(&self) -> Result<PathBuf> {
        match &self.json_out {
            Some(path) => Ok(path.clone()),
            None => Ok(self.settings.json_output()?),
        }
    }

    pub fn ics_path(&self) -> Result<PathBuf> {
        match &self.ics_out {
            Some(path) => Ok(path.clone()),
            None => Ok(self.settings.ics_output()?),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new().with_cancellation(self.cancel.clone())
    }

    /// Authorize against Google (cached token, refresh or consent).
    pub async fn calendar_api(&self) -> Result<GoogleCalendarApi> {
        let session = Session::acquire(
            &self.settings.client_secrets_path(),
            &self.settings.token_cache_path(),
        )
        .await?;
        GoogleCalendarApi::new(&session)
    }
}

pub fn write_output(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    std::fs::write(path, contents)
        .with_context(|| format!("Failed to write {}", path.display()))
}

pub fn read_input(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}
