// src/config.rs
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::utils::AppError;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_DIAGNOSTICS_DIR: &str = "./diagnostics";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 20;
pub const DEFAULT_RENDER_OVERHEAD_SECS: u64 = 45;
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Process-wide settings. Read once at start-up from the environment, then overridden by
/// command-line flags.
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub host: String,
    pub port: u16,
    /// Chrome/Chromium binary; `None` lets the launcher search the usual locations.
    pub chrome_path: Option<PathBuf>,
    pub diagnostics_dir: PathBuf,
    pub http_timeout: Duration,
    /// Added to a rendered fetch's own waits to form its overall deadline.
    pub render_overhead: Duration,
    pub user_agent: String,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            chrome_path: None,
            diagnostics_dir: PathBuf::from(DEFAULT_DIAGNOSTICS_DIR),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            render_overhead: Duration::from_secs(DEFAULT_RENDER_OVERHEAD_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ScraperConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(host) = get("HOST") {
            config.host = host;
        }
        if let Some(port) = get("PORT") {
            config.port = port
                .parse()
                .map_err(|_| AppError::Config(format!("PORT must be a port number, got '{}'", port)))?;
        }
        if let Some(path) = get("GOOGLE_CHROME_BIN") {
            config.chrome_path = Some(PathBuf::from(path));
        }
        if let Some(dir) = get("SCRAPER_DIAGNOSTICS_DIR") {
            config.diagnostics_dir = PathBuf::from(dir);
        }
        if let Some(secs) = get("SCRAPER_HTTP_TIMEOUT_SECS") {
            config.http_timeout = parse_secs("SCRAPER_HTTP_TIMEOUT_SECS", &secs)?;
        }
        if let Some(secs) = get("SCRAPER_RENDER_OVERHEAD_SECS") {
            config.render_overhead = parse_secs("SCRAPER_RENDER_OVERHEAD_SECS", &secs)?;
        }
        if let Some(agent) = get("SCRAPER_USER_AGENT") {
            config.user_agent = agent;
        }

        tracing::debug!("Loaded configuration: {:?}", config);
        Ok(config)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_secs(key: &str, value: &str) -> Result<Duration, AppError> {
    value
        .parse()
        .map(Duration::from_secs)
        .map_err(|_| AppError::Config(format!("{} must be whole seconds, got '{}'", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_environment_is_empty() {
        let config = ScraperConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.bind_address(), "0.0.0.0:8000");
        assert_eq!(config.http_timeout, Duration::from_secs(20));
        assert!(config.chrome_path.is_none());
        assert_eq!(config.diagnostics_dir, PathBuf::from("./diagnostics"));
        assert_eq!(config.render_overhead, Duration::from_secs(45));
    }

    #[test]
    fn environment_overrides() {
        let config = ScraperConfig::from_lookup(lookup(&[
            ("PORT", "9001"),
            ("HOST", "127.0.0.1"),
            ("GOOGLE_CHROME_BIN", "/usr/bin/chromium"),
            ("SCRAPER_HTTP_TIMEOUT_SECS", "5"),
            ("SCRAPER_USER_AGENT", "  "),
        ]))
        .unwrap();
        assert_eq!(config.bind_address(), "127.0.0.1:9001");
        assert_eq!(config.chrome_path, Some(PathBuf::from("/usr/bin/chromium")));
        assert_eq!(config.http_timeout, Duration::from_secs(5));
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn invalid_port_is_config_error() {
        let err = ScraperConfig::from_lookup(lookup(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
        let err = ScraperConfig::from_lookup(lookup(&[("SCRAPER_RENDER_OVERHEAD_SECS", "-1")])).unwrap_err();
        assert!(err.to_string().contains("SCRAPER_RENDER_OVERHEAD_SECS"));
    }
}
