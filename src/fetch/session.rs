// src/fetch/session.rs
//! Rendering sessions: a browser tab that executes scripts and hands back evaluated markup.

use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, LaunchOptions, Tab};

use crate::utils::error::{FetchError, SessionError};

/// One acquired rendering session. Dropping it releases the underlying resource.
pub trait RenderSession: Send {
    /// Loads `url`, waiting at most `timeout` for the navigation to settle.
    /// `FetchError::NavigationTimeout` means the request was issued but never settled.
    fn navigate(&self, url: &str, timeout: Duration) -> Result<(), FetchError>;

    /// Waits up to `timeout` for `selector` to appear. `false` on a miss.
    fn wait_for(&self, selector: &str, timeout: Duration) -> bool;

    /// Current, fully evaluated document markup.
    fn markup(&self) -> Result<String, FetchError>;

    /// PNG snapshot of the viewport, when the session can produce one.
    fn screenshot(&self) -> Option<Vec<u8>>;
}

/// Source of rendering sessions. Acquisition may fail (missing runtime, exhaustion) and is
/// never retried by callers.
pub trait SessionLauncher: Send + Sync {
    fn acquire(&self) -> Result<Box<dyn RenderSession>, SessionError>;
}

/// Launch settings for the headless Chrome process.
#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    pub chrome_path: Option<PathBuf>,
    pub user_agent: String,
    pub window_size: (u32, u32),
    pub headless: bool,
    pub sandbox: bool,
    pub idle_timeout: Duration,
}

impl ChromeLauncher {
    pub fn new(chrome_path: Option<PathBuf>, user_agent: impl Into<String>) -> Self {
        Self {
            chrome_path,
            user_agent: user_agent.into(),
            window_size: (1920, 1080),
            headless: true,
            sandbox: false,
            idle_timeout: Duration::from_secs(120),
        }
    }
}

impl SessionLauncher for ChromeLauncher {
    fn acquire(&self) -> Result<Box<dyn RenderSession>, SessionError> {
        let mut launch_opts = LaunchOptions::default();
        launch_opts.headless = self.headless;
        launch_opts.sandbox = self.sandbox;
        launch_opts.window_size = Some(self.window_size);
        launch_opts.idle_browser_timeout = self.idle_timeout;
        launch_opts.args.push(OsStr::new("--disable-dev-shm-usage"));
        launch_opts.args.push(OsStr::new("--disable-gpu"));
        if let Some(path) = &self.chrome_path {
            tracing::info!("Using Chrome binary at: {}", path.display());
            launch_opts.path = Some(path.clone());
        }

        let browser = Browser::new(launch_opts).map_err(|e| SessionError::Launch(e.to_string()))?;
        let tab = browser.new_tab().map_err(|e| SessionError::Tab(e.to_string()))?;
        tab.set_user_agent(&self.user_agent, None, None)
            .map_err(|e| SessionError::Tab(format!("Failed to set user agent: {}", e)))?;

        tracing::info!("Browser session acquired");
        Ok(Box::new(ChromeSession { _browser: browser, tab }))
    }
}

/// A launched browser with one working tab. The browser process is killed when this drops.
pub struct ChromeSession {
    // Held only so the process lives exactly as long as the session.
    _browser: Browser,
    tab: Arc<Tab>,
}

impl RenderSession for ChromeSession {
    fn navigate(&self, url: &str, timeout: Duration) -> Result<(), FetchError> {
        self.tab.set_default_timeout(timeout);
        self.tab
            .navigate_to(url)
            .map_err(|e| FetchError::Navigation { url: url.to_string(), reason: e.to_string() })?;
        self.tab.wait_until_navigated().map(|_| ()).map_err(|e| {
            tracing::debug!("Waiting for {} to load: {}", url, e);
            FetchError::NavigationTimeout { url: url.to_string(), after: timeout }
        })
    }

    fn wait_for(&self, selector: &str, timeout: Duration) -> bool {
        match self.tab.wait_for_element_with_custom_timeout(selector, timeout) {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!("Readiness selector '{}' not found: {}", selector, e);
                false
            }
        }
    }

    fn markup(&self) -> Result<String, FetchError> {
        self.tab.get_content().map_err(|e| FetchError::Markup(e.to_string()))
    }

    fn screenshot(&self) -> Option<Vec<u8>> {
        match self.tab.capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true) {
            Ok(png) => Some(png),
            Err(e) => {
                tracing::warn!("Could not capture screenshot: {}", e);
                None
            }
        }
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        if let Err(e) = self.tab.close(true) {
            tracing::debug!("Tab close on release failed: {}", e);
        }
        tracing::info!("Browser session released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn launcher_defaults_match_server_profile() {
        let launcher = ChromeLauncher::new(None, "test-agent");
        assert!(launcher.headless);
        assert!(!launcher.sandbox);
        assert_eq!(launcher.window_size, (1920, 1080));
        assert_eq!(launcher.user_agent, "test-agent");
    }

    #[test]
    #[ignore] // needs a local Chrome/Chromium
    fn chrome_session_renders_data_url() {
        let launcher = ChromeLauncher::new(None, "match_scraper-test");
        let session = launcher.acquire().expect("chrome should launch");
        session
            .navigate("data:text/html,<div class='ready'>ok</div>", Duration::from_secs(10))
            .expect("navigation");
        assert!(session.wait_for("div.ready", Duration::from_secs(5)));
        assert!(session.markup().unwrap().contains("ready"));
    }
}
