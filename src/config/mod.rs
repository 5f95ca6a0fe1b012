//! Client configuration: OAuth application credentials and endpoint template

use anyhow::{bail, Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Placeholder replaced by the instance name in `base_url`
pub const INSTANCE_PLACEHOLDER: &str = "{instance}";

const DEFAULT_BASE_URL: &str = "https://{instance}.service-now.com";

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// OAuth application client ID (registered on the instance)
    pub client_id: String,
    /// OAuth application client secret
    pub client_secret: String,
    /// Base URL template; `{instance}` is substituted per call
    pub base_url: String,
    /// Optional per-request timeout applied to the HTTP client
    pub timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: None,
        }
    }
}

impl Config {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            ..Self::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Get config directory path
    fn config_dir() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "servicenow-client", "servicenow-client")
            .context("Could not determine config directory")?;
        Ok(proj_dirs.config_dir().to_path_buf())
    }

    /// Get config file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`, falling back to defaults if absent
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).context("Failed to read config file")?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).context("Failed to write config file")?;

        // Holds the client secret
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(path, perms).context("Failed to set config permissions")?;
        }

        Ok(())
    }

    /// Apply `SERVICENOW_CLIENT_ID`, `SERVICENOW_CLIENT_SECRET` and
    /// `SERVICENOW_BASE_URL` from the environment when set.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(id) = std::env::var("SERVICENOW_CLIENT_ID") {
            self.client_id = id;
        }
        if let Ok(secret) = std::env::var("SERVICENOW_CLIENT_SECRET") {
            self.client_secret = secret;
        }
        if let Ok(base) = std::env::var("SERVICENOW_BASE_URL") {
            self.base_url = base;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            bail!("client_id is not set");
        }
        if self.client_secret.trim().is_empty() {
            bail!("client_secret is not set");
        }
        let sample = self.base_url.replace(INSTANCE_PLACEHOLDER, "dev0000");
        url::Url::parse(&sample)
            .with_context(|| format!("base_url is not a valid URL: {}", self.base_url))?;
        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Base URL for `instance`, without a trailing slash
    pub fn instance_base(&self, instance: &str) -> String {
        self.base_url
            .replace(INSTANCE_PLACEHOLDER, instance)
            .trim_end_matches('/')
            .to_string()
    }

    pub fn token_url(&self, instance: &str) -> String {
        format!("{}/oauth_token.do", self.instance_base(instance))
    }

    pub fn authorize_url(&self, instance: &str) -> String {
        format!("{}/oauth_auth.do", self.instance_base(instance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_endpoints() {
        let config = Config::new("id", "secret");
        assert_eq!(
            config.instance_base("dev1234"),
            "https://dev1234.service-now.com"
        );
        assert_eq!(
            config.token_url("dev1234"),
            "https://dev1234.service-now.com/oauth_token.do"
        );
    }

    #[test]
    fn test_base_url_without_placeholder() {
        let config = Config::new("id", "secret").with_base_url("http://127.0.0.1:8080/");
        assert_eq!(
            config.token_url("ignored"),
            "http://127.0.0.1:8080/oauth_token.do"
        );
    }

    #[test]
    fn test_validate() {
        assert!(Config::new("id", "secret").validate().is_ok());
        assert!(Config::new("", "secret").validate().is_err());
        assert!(Config::new("id", " ").validate().is_err());
        assert!(Config::new("id", "secret")
            .with_base_url("not a url")
            .validate()
            .is_err());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::new("id", "secret");
        config.timeout_secs = Some(30);
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Config::load_from(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(loaded, Config::default());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "client_id = \"abc\"\n").unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.client_id, "abc");
        assert_eq!(loaded.base_url, DEFAULT_BASE_URL);
    }
}
