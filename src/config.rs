use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ClarityError, Result};

pub const DEFAULT_BASE_URL: &str = "https://v1-upscale-endpoint-oak26mtdga-ey.a.run.app";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(550);
pub const KEY_FILE_NAME: &str = "cai_platform_key.txt";

pub const ENV_API_KEY: &str = "CAI_API_KEY";
pub const ENV_BASE_URL: &str = "CAI_BASE_URL";
pub const ENV_POLL_INTERVAL: &str = "CAI_POLL_INTERVAL_SECS";
pub const ENV_TIMEOUT: &str = "CAI_TIMEOUT_SECS";
pub const ENV_KEY_FILE: &str = "CAI_KEY_FILE";

#[derive(Clone)]
pub struct ClarityConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    /// Sleep between two polls of an asynchronous job.
    pub poll_interval: Duration,
    /// Wall-clock ceiling for the whole poll loop, also used as the
    /// timeout of each poll request.
    pub timeout: Duration,
}

// Keeps the key out of debug logs.
impl std::fmt::Debug for ClarityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClarityConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("poll_interval", &self.poll_interval)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for ClarityConfig {
    fn default() -> Self {
        ClarityConfig {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ClarityConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the configuration from the process environment.
    ///
    /// The key comes from `CAI_API_KEY`, falling back to the key file
    /// (`CAI_KEY_FILE`, else `cai_platform_key.txt` next to the executable).
    /// A missing key is not an error here: it is logged with remediation
    /// steps and calls fail later unless they carry an override.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(url) = env::var(ENV_BASE_URL) {
            config.base_url = url;
        }
        if let Some(secs) = parse_secs(ENV_POLL_INTERVAL)? {
            config.poll_interval = secs;
        }
        if let Some(secs) = parse_secs(ENV_TIMEOUT)? {
            config.timeout = secs;
        }

        let key_file = env::var(ENV_KEY_FILE)
            .map(PathBuf::from)
            .ok()
            .or_else(default_key_file);

        config.api_key = normalize_key(env::var(ENV_API_KEY).ok())
            .or_else(|| key_file.as_deref().and_then(read_key_file));

        if config.api_key.is_none() {
            log::warn!(
                "API key is required to use Clarity AI. Set the {} environment variable or place it in {}",
                ENV_API_KEY,
                key_file
                    .as_deref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| KEY_FILE_NAME.to_string())
            );
        }

        Ok(config)
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = normalize_key(Some(api_key.into()));
        self
    }

    pub fn with_key_file(mut self, path: impl AsRef<Path>) -> Self {
        self.api_key = read_key_file(path.as_ref());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Picks the token for one call: the override wins over the configured key.
    pub fn resolve_token(&self, api_key_override: Option<&str>) -> Result<String> {
        normalize_key(api_key_override.map(str::to_string))
            .or_else(|| self.api_key.clone())
            .ok_or(ClarityError::MissingCredentials)
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(ClarityError::Config("base URL is empty".into()));
        }
        if self.timeout.is_zero() {
            return Err(ClarityError::Config("timeout must be non-zero".into()));
        }
        if self.poll_interval.is_zero() {
            return Err(ClarityError::Config("poll interval must be non-zero".into()));
        }
        Ok(())
    }
}

fn normalize_key(key: Option<String>) -> Option<String> {
    key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty())
}

fn read_key_file(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(contents) => normalize_key(Some(contents)),
        Err(e) => {
            log::debug!("No key file at {}: {}", path.display(), e);
            None
        }
    }
}

fn default_key_file() -> Option<PathBuf> {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(KEY_FILE_NAME)))
}

fn parse_secs(var: &str) -> Result<Option<Duration>> {
    match env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(|secs| Some(Duration::from_secs(secs)))
            .map_err(|e| ClarityError::Config(format!("{} must be whole seconds: {}", var, e))),
        Err(_) => Ok(None),
    }
}
