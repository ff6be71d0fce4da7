//! Creates a valid Google session (access token) for the Calendar API.
//!
//! Tokens are cached in a TOML file. A cached token is reused while valid,
//! refreshed when expired, and replaced through the browser consent flow
//! when there is nothing usable.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use google_calendar::{AccessToken, Client};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::app_config::{self, Credentials};
use crate::oauth;

/// Treat tokens this close to expiry as expired.
const EXPIRY_SKEW_SECS: i64 = 60;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TokenCache {
    access_token: String,
    refresh_token: String,
    expires_at: DateTime<Utc>,
}

impl From<&AccessToken> for TokenCache {
    fn from(tokens: &AccessToken) -> Self {
        TokenCache {
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone(),
            expires_at: Utc::now() + Duration::seconds(tokens.expires_in),
        }
    }
}

impl TokenCache {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_SKEW_SECS) >= self.expires_at
    }

    fn can_refresh(&self) -> bool {
        !self.refresh_token.is_empty()
    }

    fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read token cache from {}", path.display()))?;

        match toml::from_str(&contents) {
            Ok(cache) => Ok(Some(cache)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable token cache");
                Ok(None)
            }
        }
    }

    fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("Failed to serialize token cache")?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write token cache to {}", path.display()))?;

        // Set to owner-only (0600) since file contains OAuth tokens:
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
                .with_context(|| format!("Failed to set permissions on {}", path.display()))?;
        }

        Ok(())
    }
}

/// An authorized Google session, acquired once per run.
pub struct Session {
    cache_path: PathBuf,
    tokens: TokenCache,
}

impl Session {
    /// Load the cached token, refreshing or re-authorizing as needed.
    pub async fn acquire(client_secrets: &Path, token_cache: &Path) -> Result<Self> {
        let creds = app_config::load(client_secrets)?;

        let tokens = match TokenCache::load(token_cache)? {
            Some(cached) if !cached.is_expired(Utc::now()) => {
                debug!("using cached Google token");
                cached
            }
            Some(cached) if cached.can_refresh() => match refresh(&creds, &cached).await {
                Ok(tokens) => {
                    info!("refreshed Google token");
                    tokens
                }
                Err(e) => {
                    warn!(error = %e, "token refresh failed, re-authorizing");
                    Self::consent(&creds).await?
                }
            },
            _ => Self::consent(&creds).await?,
        };

        let session = Session {
            cache_path: token_cache.to_path_buf(),
            tokens,
        };
        session.save()?;
        Ok(session)
    }

    /// Run the consent flow unconditionally and replace the cached token.
    pub async fn authorize(client_secrets: &Path, token_cache: &Path) -> Result<Self> {
        let creds = app_config::load(client_secrets)?;
        let session = Session {
            cache_path: token_cache.to_path_buf(),
            tokens: Self::consent(&creds).await?,
        };
        session.save()?;
        Ok(session)
    }

    pub fn access_token(&self) -> &str {
        &self.tokens.access_token
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.tokens.expires_at
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    async fn consent(creds: &Credentials) -> Result<TokenCache> {
        let tokens = oauth::authorize(creds).await?;
        Ok((&tokens).into())
    }

    fn save(&self) -> Result<()> {
        self.tokens.save(&self.cache_path)
    }
}

async fn refresh(creds: &Credentials, cached: &TokenCache) -> Result<TokenCache> {
    let client = Client::new(
        creds.client_id.clone(),
        creds.client_secret.clone(),
        oauth::redirect_uri(),
        cached.access_token.clone(),
        cached.refresh_token.clone(),
    );

    let mut tokens = client
        .refresh_access_token()
        .await
        .context("Failed to refresh token")?;

    // Google typically doesn't return a new refresh_token on refresh
    if tokens.refresh_token.is_empty() {
        tokens.refresh_token = cached.refresh_token.clone();
    }

    Ok((&tokens).into())
}
