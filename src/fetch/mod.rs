// src/fetch/mod.rs
//! Obtaining page markup, either statically over HTTP or through a rendering session.
//!
//! Rendered fetches run on a blocking worker that owns the session from acquisition to
//! drop, so release happens on every exit path. Processing of the markup (parsing and
//! assembly) happens inside the same scope, which lets a failure snapshot the live page.

pub mod client;
pub mod session;

use std::sync::Arc;
use std::time::Duration;

use crate::utils::error::{FetchError, PipelineError};
use crate::utils::DiagnosticStore;

pub use session::{ChromeLauncher, RenderSession, SessionLauncher};

/// Browser start-up plus assembly time allowed on top of a render's own waits.
const DEFAULT_OVERHEAD: Duration = Duration::from_secs(45);

/// Value produced from fetched markup. A successful value may still ask for a diagnostic
/// snapshot of the page it came from.
pub trait Processed {
    fn wants_snapshot(&self) -> bool {
        false
    }
}

impl Processed for String {}
impl Processed for () {}

/// A page to fetch, named by the domain it belongs to.
#[derive(Debug, Clone)]
pub struct Target {
    pub domain: &'static str,
    pub url: String,
    /// `(regex, label)` markers highlighted in diagnostic snapshots.
    pub anchors: &'static [(&'static str, &'static str)],
}

/// Waits applied to a rendered fetch.
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    pub ready_selector: &'static str,
    pub nav_timeout: Duration,
    pub ready_timeout: Duration,
    pub settle: Duration,
}

#[derive(Debug, Clone, Copy)]
pub enum FetchMode {
    Static,
    Rendered(RenderOptions),
}

#[derive(Clone)]
pub struct PageFetcher {
    http: reqwest::Client,
    launcher: Arc<dyn SessionLauncher>,
    diagnostics: DiagnosticStore,
    overhead: Duration,
}

impl PageFetcher {
    pub fn new(http: reqwest::Client, launcher: Arc<dyn SessionLauncher>, diagnostics: DiagnosticStore) -> Self {
        Self { http, launcher, diagnostics, overhead: DEFAULT_OVERHEAD }
    }

    pub fn with_overhead(mut self, overhead: Duration) -> Self {
        self.overhead = overhead;
        self
    }

    /// Upper bound on one rendered fetch, acquisition included.
    pub fn render_deadline(&self, options: &RenderOptions) -> Duration {
        self.overhead + options.nav_timeout + options.ready_timeout + options.settle
    }

    /// Raw markup of `target`.
    pub async fn fetch(&self, target: &Target, mode: FetchMode) -> Result<String, PipelineError> {
        self.fetch_with(target, mode, |markup| Ok(markup.to_string())).await
    }

    /// Fetches `target` and runs `process` over its markup while the page is still held.
    /// Any failure after the page (or session) exists leaves a diagnostic snapshot behind;
    /// the original error is returned unchanged.
    pub async fn fetch_with<T, F>(&self, target: &Target, mode: FetchMode, process: F) -> Result<T, PipelineError>
    where
        T: Processed + Send + 'static,
        F: FnOnce(&str) -> Result<T, PipelineError> + Send + 'static,
    {
        match mode {
            FetchMode::Static => self.fetch_static(target, process).await,
            FetchMode::Rendered(options) => self.fetch_rendered(target, options, process).await,
        }
    }

    async fn fetch_static<T, F>(&self, target: &Target, process: F) -> Result<T, PipelineError>
    where
        T: Processed,
        F: FnOnce(&str) -> Result<T, PipelineError>,
    {
        let markup = client::download_page(&self.http, &target.url).await?;
        let result = process(&markup);
        match &result {
            Err(e) => {
                tracing::error!("{}: processing static page failed: {}", target.domain, e);
                self.diagnostics.capture(target.domain, Some(&markup), None, target.anchors);
            }
            Ok(value) if value.wants_snapshot() => {
                tracing::warn!("{}: nothing extracted, keeping a snapshot of the page", target.domain);
                self.diagnostics.capture(target.domain, Some(&markup), None, target.anchors);
            }
            Ok(_) => {}
        }
        result
    }

    async fn fetch_rendered<T, F>(&self, target: &Target, options: RenderOptions, process: F) -> Result<T, PipelineError>
    where
        T: Processed + Send + 'static,
        F: FnOnce(&str) -> Result<T, PipelineError> + Send + 'static,
    {
        let launcher = Arc::clone(&self.launcher);
        let diagnostics = self.diagnostics.clone();
        let scoped_target = target.clone();
        let deadline = self.render_deadline(&options);

        let task = tokio::task::spawn_blocking(move || {
            render_scope(launcher.as_ref(), &diagnostics, &scoped_target, &options, process)
        });

        match tokio::time::timeout(deadline, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(PipelineError::Task(join_err.to_string())),
            Err(_) => {
                // The worker keeps running until its own waits expire, then drops the session.
                tracing::error!("{}: rendering exceeded {:?}", target.domain, deadline);
                Err(FetchError::Deadline(deadline).into())
            }
        }
    }
}

/// Acquire, render, process and release. Runs on a blocking thread.
fn render_scope<T, F>(
    launcher: &dyn SessionLauncher,
    diagnostics: &DiagnosticStore,
    target: &Target,
    options: &RenderOptions,
    process: F,
) -> Result<T, PipelineError>
where
    T: Processed,
    F: FnOnce(&str) -> Result<T, PipelineError>,
{
    let session = launcher.acquire()?;

    let result = render(session.as_ref(), target, options)
        .map_err(PipelineError::from)
        .and_then(|markup| process(&markup));

    let snapshot = match &result {
        Err(e) => {
            tracing::error!("{}: rendered fetch failed: {}", target.domain, e);
            true
        }
        Ok(value) if value.wants_snapshot() => {
            tracing::warn!("{}: nothing extracted, keeping a snapshot of the page", target.domain);
            true
        }
        Ok(_) => false,
    };
    if snapshot {
        let markup = session.markup().ok();
        let screenshot = session.screenshot();
        diagnostics.capture(target.domain, markup.as_deref(), screenshot.as_deref(), target.anchors);
    }

    drop(session);
    result
}

fn render(session: &dyn RenderSession, target: &Target, options: &RenderOptions) -> Result<String, FetchError> {
    tracing::info!("{}: navigating to {}", target.domain, target.url);
    match session.navigate(&target.url, options.nav_timeout) {
        Ok(()) => {}
        Err(FetchError::NavigationTimeout { after, .. }) => {
            tracing::warn!("{}: page still loading after {:?}; continuing with what has rendered", target.domain, after);
        }
        Err(e) => return Err(e),
    }

    if session.wait_for(options.ready_selector, options.ready_timeout) {
        tracing::info!("{}: main content loaded", target.domain);
    } else {
        tracing::warn!(
            "{}: '{}' not present after {:?}; continuing with what has rendered",
            target.domain,
            options.ready_selector,
            options.ready_timeout
        );
    }

    if !options.settle.is_zero() {
        std::thread::sleep(options.settle);
    }
    session.markup()
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory rendering doubles.

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::{RenderSession, SessionLauncher};
    use crate::utils::error::{FetchError, SessionError};

    #[derive(Clone, Default)]
    pub struct Counters {
        pub acquired: Arc<AtomicUsize>,
        pub released: Arc<AtomicUsize>,
    }

    impl Counters {
        pub fn acquired(&self) -> usize {
            self.acquired.load(Ordering::SeqCst)
        }

        pub fn released(&self) -> usize {
            self.released.load(Ordering::SeqCst)
        }
    }

    #[derive(Clone, Default)]
    pub struct MockLauncher {
        pub markup: String,
        pub fail_acquire: bool,
        pub fail_navigation: bool,
        pub navigation_times_out: bool,
        pub ready: bool,
        pub navigation_delay: Duration,
        pub counters: Counters,
    }

    impl MockLauncher {
        pub fn serving(markup: &str) -> Self {
            Self { markup: markup.to_string(), ready: true, ..Default::default() }
        }
    }

    impl SessionLauncher for MockLauncher {
        fn acquire(&self) -> Result<Box<dyn RenderSession>, SessionError> {
            if self.fail_acquire {
                return Err(SessionError::Launch("no rendering runtime available".to_string()));
            }
            self.counters.acquired.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(MockSession { launcher: self.clone() }))
        }
    }

    pub struct MockSession {
        launcher: MockLauncher,
    }

    impl RenderSession for MockSession {
        fn navigate(&self, url: &str, timeout: Duration) -> Result<(), FetchError> {
            std::thread::sleep(self.launcher.navigation_delay);
            if self.launcher.fail_navigation {
                return Err(FetchError::Navigation { url: url.to_string(), reason: "net::ERR_NAME_NOT_RESOLVED".to_string() });
            }
            if self.launcher.navigation_times_out {
                return Err(FetchError::NavigationTimeout { url: url.to_string(), after: timeout });
            }
            Ok(())
        }

        fn wait_for(&self, _selector: &str, _timeout: Duration) -> bool {
            self.launcher.ready
        }

        fn markup(&self) -> Result<String, FetchError> {
            Ok(self.launcher.markup.clone())
        }

        fn screenshot(&self) -> Option<Vec<u8>> {
            Some(vec![0x89, b'P', b'N', b'G'])
        }
    }

    impl Drop for MockSession {
        fn drop(&mut self) {
            self.launcher.counters.released.fetch_add(1, Ordering::SeqCst);
        }
    }
}
