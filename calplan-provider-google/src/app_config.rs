//! OAuth client credentials for the Google provider.
//!
//! Read from the JSON file downloaded from the Google Cloud console, which
//! nests the credentials under `installed` (desktop apps) or `web`.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Google OAuth client credentials (user-provided).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SecretsFile {
    Installed { installed: Credentials },
    Web { web: Credentials },
    Flat(Credentials),
}

impl From<SecretsFile> for Credentials {
    fn from(file: SecretsFile) -> Self {
        match file {
            SecretsFile::Installed { installed } => installed,
            SecretsFile::Web { web } => web,
            SecretsFile::Flat(creds) => creds,
        }
    }
}

pub fn parse(contents: &str) -> Result<Credentials> {
    let file: SecretsFile = serde_json::from_str(contents)
        .context("Expected an OAuth client JSON with 'installed' or 'web' credentials")?;
    Ok(file.into())
}

pub fn load(path: &Path) -> Result<Credentials> {
    if !path.exists() {
        anyhow::bail!(
            "Google client secrets not found at {}.\n\n\
            Download an OAuth client ID (Desktop app) JSON from\n\
            https://console.cloud.google.com/apis/credentials and save it there,\n\
            or point [google].client_secrets in the settings file at it.",
            path.display()
        );
    }

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read client secrets from {}", path.display()))?;

    parse(&contents)
        .with_context(|| format!("Failed to parse client secrets from {}", path.display()))
}
