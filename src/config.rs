use crate::error::{AppError, Result};
use std::path::PathBuf;

/// Configuration management for the downloader.
///
/// Values come from a `.env` file in the working directory (loaded with
/// `dotenvy`) and the process environment, on top of built-in defaults.

pub const DEFAULT_API_BASE: &str = "https://api.vimeo.com";
pub const DEFAULT_CALLBACK_PORT: u16 = 8080;
pub const CALLBACK_PATH: &str = "/callback";

/// Configuration for the Vimeo downloader.
///
/// # Examples
///
/// ```
/// use vimeo_downloader::Config;
///
/// let config = Config::default();
/// assert_eq!(config.callback_port, 8080);
/// assert!(config.client_id.is_none());
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub api_base: String,
    pub token_file: PathBuf,
    pub download_dir: PathBuf,
    pub callback_port: u16,
    pub auth_timeout_secs: u64,
    pub page_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            api_base: String::from(DEFAULT_API_BASE),
            token_file: PathBuf::from("vimeo_token.json"),
            download_dir: PathBuf::from("downloads"),
            callback_port: DEFAULT_CALLBACK_PORT,
            auth_timeout_secs: 300,
            page_size: 100,
        }
    }
}

impl Config {
    /// Loads `.env` (if present) and reads the `VIMEO_*` variables.
    pub fn from_env() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                return Err(AppError::Config(format!("Failed to read .env file: {}", e)));
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Config::default();

        config.client_id = get("VIMEO_CLIENT_ID");
        config.client_secret = get("VIMEO_CLIENT_SECRET");
        if let Some(base) = get("VIMEO_API_BASE") {
            config.api_base = base.trim_end_matches('/').to_string();
        }
        if let Some(path) = get("VIMEO_TOKEN_FILE") {
            config.token_file = PathBuf::from(path);
        }
        if let Some(dir) = get("VIMEO_DOWNLOAD_DIR") {
            config.download_dir = PathBuf::from(dir);
        }
        if let Some(port) = get("VIMEO_CALLBACK_PORT") {
            config.callback_port = port.trim().parse().map_err(|_| {
                AppError::Config(format!("VIMEO_CALLBACK_PORT is not a valid port: {}", port))
            })?;
        }

        Ok(config)
    }

    /// Client credentials required by the authorization flow.
    pub fn credentials(&self) -> Result<(&str, &str)> {
        match (self.client_id.as_deref(), self.client_secret.as_deref()) {
            (Some(id), Some(secret)) => Ok((id, secret)),
            _ => Err(AppError::Config(
                "VIMEO_CLIENT_ID and VIMEO_CLIENT_SECRET must be set in the .env file or environment"
                    .into(),
            )),
        }
    }

    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}{}", self.callback_port, CALLBACK_PATH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.token_file, PathBuf::from("vimeo_token.json"));
        assert_eq!(config.redirect_uri(), "http://localhost:8080/callback");
        assert!(matches!(config.credentials(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("VIMEO_CLIENT_ID", "id"),
            ("VIMEO_CLIENT_SECRET", "secret"),
            ("VIMEO_API_BASE", "http://localhost:9000/"),
            ("VIMEO_CALLBACK_PORT", "9999"),
            ("VIMEO_DOWNLOAD_DIR", "out"),
        ]))
        .unwrap();
        assert_eq!(config.credentials().unwrap(), ("id", "secret"));
        assert_eq!(config.api_base, "http://localhost:9000");
        assert_eq!(config.callback_port, 9999);
        assert_eq!(config.download_dir, PathBuf::from("out"));
    }

    #[test]
    fn test_blank_secret_counts_as_missing() {
        let config = Config::from_lookup(lookup(&[
            ("VIMEO_CLIENT_ID", "id"),
            ("VIMEO_CLIENT_SECRET", "  "),
        ]))
        .unwrap();
        assert!(config.credentials().is_err());
    }

    #[test]
    fn test_invalid_port() {
        let result = Config::from_lookup(lookup(&[("VIMEO_CALLBACK_PORT", "http")]));
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
