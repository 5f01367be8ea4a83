use crate::error::{AppError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// An OAuth2 bearer token as persisted between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Token {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: None,
            scope: None,
            expires_at: None,
            created_at: Utc::now(),
        }
    }

    /// Sets the expiry relative to the creation time.
    pub fn with_expires_in(mut self, seconds: Option<i64>) -> Self {
        self.expires_at = seconds.map(|s| self.created_at + Duration::seconds(s));
        self
    }

    /// Vimeo's authorization-code tokens usually carry no expiry, which
    /// means they stay valid until revoked.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(false, |at| at <= now)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Reads and writes the token file.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, token: &Token) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(token)?;
        std::fs::write(&self.path, data)?;
        tracing::debug!(path = %self.path.display(), "token saved");
        Ok(())
    }

    /// Returns the stored token, or `None` when no token file exists.
    pub fn load(&self) -> Result<Option<Token>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&self.path)?;
        let token: Token = serde_json::from_str(&data)?;
        Ok(Some(token))
    }

    /// Loads a token that is usable for API calls.
    ///
    /// # Errors
    /// `AppError::Auth` when the file is missing, holds an empty token,
    /// or the token has expired. Vimeo issues no refresh tokens for this
    /// flow, so the only remedy is running `auth` again.
    pub fn load_valid(&self) -> Result<Token> {
        let token = self.load()?.ok_or_else(|| {
            AppError::Auth(
                "No authentication token found. Please run the 'auth' command first.".into(),
            )
        })?;

        if token.access_token.trim().is_empty() {
            return Err(AppError::Auth(format!(
                "Token file {} holds no access token. Please run the 'auth' command again.",
                self.path.display()
            )));
        }
        if token.is_expired() {
            return Err(AppError::Auth(
                "The stored token has expired. Please run the 'auth' command again.".into(),
            ));
        }
        Ok(token)
    }
}
