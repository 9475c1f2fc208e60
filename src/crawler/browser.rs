//! Scripted browser fetch strategy
//!
//! A single Chromium process is started lazily and shared by every fetch.
//! Each fetch runs in its own isolated browser context with a randomized
//! viewport and a rotated User-Agent. The context is disposed when the fetch
//! ends, on every exit path; the browser itself lives until [`SharedBrowser::shutdown`].

use crate::crawler::fetcher::FetchedPage;
use crate::FetchError;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetDeviceMetricsOverrideParams, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use futures::StreamExt;
use rand::seq::SliceRandom;
use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, RwLock};
use tokio::task::JoinHandle;

const HIDE_WEBDRIVER: &str =
    "Object.defineProperty(navigator, 'webdriver', { get: () => undefined });";

const LAUNCH_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--no-sandbox",
    "--disable-setuid-sandbox",
    "--disable-dev-shm-usage",
    "--disable-infobars",
    "--disable-popup-blocking",
    "--disable-notifications",
    "--ignore-certificate-errors",
];

/// Viewport width range in CSS pixels
pub const VIEWPORT_WIDTH: (i64, i64) = (1280, 1920);
/// Viewport height range in CSS pixels
pub const VIEWPORT_HEIGHT: (i64, i64) = (720, 1080);

/// Launch options for the shared browser
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub headless: bool,
    pub proxy_url: Option<String>,
    pub timeout: Duration,
    pub user_agents: Vec<String>,
}

struct RunningBrowser {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl RunningBrowser {
    fn is_alive(&self) -> bool {
        !self.handler.is_finished()
    }
}

/// Lazily-started Chromium shared across fetches
pub struct SharedBrowser {
    options: BrowserOptions,
    running: RwLock<Option<Arc<RunningBrowser>>>,
}

impl SharedBrowser {
    pub fn new(options: BrowserOptions) -> Self {
        Self {
            options,
            running: RwLock::new(None),
        }
    }

    /// Returns true if a browser process is currently running
    pub async fn is_started(&self) -> bool {
        self.current().await.is_some()
    }

    /// Starts the browser if it is not already running
    ///
    /// Concurrent callers share one launch. A browser whose connection has
    /// dropped is replaced.
    pub async fn ensure_started(&self) -> Result<(), CdpError> {
        self.running_browser().await.map(|_| ())
    }

    /// Returns the live browser, if any, under a shared read lock
    async fn current(&self) -> Option<Arc<RunningBrowser>> {
        self.running
            .read()
            .await
            .as_ref()
            .filter(|running| running.is_alive())
            .map(Arc::clone)
    }

    async fn running_browser(&self) -> Result<Arc<RunningBrowser>, CdpError> {
        if let Some(existing) = self.current().await {
            return Ok(existing);
        }

        let mut running = self.running.write().await;

        // Another caller may have launched while we waited for the write lock
        if let Some(existing) = running.as_ref() {
            if existing.is_alive() {
                return Ok(Arc::clone(existing));
            }
            tracing::warn!("Shared browser connection lost, relaunching");
        }

        tracing::info!(
            "Launching shared browser (headless: {}, proxy: {})",
            self.options.headless,
            self.options.proxy_url.is_some()
        );

        let (browser, mut handler) = Browser::launch(self.launch_config()?).await?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::trace!("Browser handler event error: {}", e);
                }
            }
            tracing::debug!("Browser handler loop finished");
        });

        let started = Arc::new(RunningBrowser { browser, handler });
        *running = Some(Arc::clone(&started));
        tracing::info!("Shared browser launched");

        Ok(started)
    }

    fn launch_config(&self) -> Result<BrowserConfig, CdpError> {
        let mut args: Vec<String> = LAUNCH_ARGS.iter().map(|s| s.to_string()).collect();
        if let Some(proxy) = &self.options.proxy_url {
            args.push(format!("--proxy-server={}", proxy));
        }

        let mut builder = BrowserConfig::builder().args(args);
        if !self.options.headless {
            builder = builder.with_head();
        }

        builder.build().map_err(CdpError::ChromeMessage)
    }

    /// Closes the browser process
    ///
    /// Fetches still holding the browser keep it alive until they finish;
    /// it is then dropped, which terminates the process.
    pub async fn shutdown(&self) {
        let Some(running) = self.running.write().await.take() else {
            return;
        };

        tracing::info!("Closing shared browser");
        match Arc::try_unwrap(running) {
            Ok(mut running) => {
                if let Err(e) = running.browser.close().await {
                    tracing::warn!("Error closing browser: {}", e);
                }
                if let Err(e) = running.browser.wait().await {
                    tracing::warn!("Error waiting for browser exit: {}", e);
                }
                running.handler.abort();
            }
            Err(_) => {
                tracing::debug!("Browser still in use, it will close when the last fetch ends");
            }
        }
        tracing::info!("Shared browser closed");
    }

    /// Fetches a URL in a fresh browser context
    ///
    /// # Errors
    ///
    /// | Condition | Error |
    /// |-----------|-------|
    /// | Wall-clock timeout or CDP timeout | `Timeout` |
    /// | Navigation failure or no response | `BrowserNavigation` |
    /// | Launch or protocol failure | `BrowserInternal` |
    /// | Non-2xx final status | `HttpStatus` |
    pub async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        match tokio::time::timeout(self.options.timeout, self.fetch_in_context(url)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(
                    "Browser fetch of {} exceeded {:.1}s",
                    url,
                    self.options.timeout.as_secs_f64()
                );
                Err(FetchError::Timeout {
                    url: url.to_string(),
                })
            }
        }
    }

    async fn fetch_in_context(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let internal = |e: CdpError| internal_error(url, e);

        let running = self.running_browser().await.map_err(internal)?;
        let context_id = create_context(Arc::clone(&running)).await.map_err(internal)?;
        let guard = ContextGuard::new(Arc::clone(&running), context_id.clone());

        let mut target = CreateTargetParams::new("about:blank");
        target.browser_context_id = Some(context_id);
        let page = running.browser.new_page(target).await.map_err(internal)?;

        self.prepare_page(&page).await.map_err(internal)?;

        let result = navigate(&page, url).await;
        guard.dispose().await;
        result
    }

    async fn prepare_page(&self, page: &Page) -> Result<(), CdpError> {
        let (width, height) = {
            let mut rng = rand::thread_rng();
            (
                rng.gen_range(VIEWPORT_WIDTH.0..=VIEWPORT_WIDTH.1),
                rng.gen_range(VIEWPORT_HEIGHT.0..=VIEWPORT_HEIGHT.1),
            )
        };
        page.execute(SetDeviceMetricsOverrideParams::new(width, height, 1.0, false))
            .await?;

        let user_agent = self
            .options
            .user_agents
            .choose(&mut rand::thread_rng())
            .cloned();
        if let Some(user_agent) = &user_agent {
            page.execute(SetUserAgentOverrideParams::new(user_agent.clone()))
                .await?;
        }

        page.execute(AddScriptToEvaluateOnNewDocumentParams::new(HIDE_WEBDRIVER))
            .await?;

        tracing::debug!(
            "Prepared browser page {}x{} with UA {}",
            width,
            height,
            user_agent.as_deref().unwrap_or("<browser default>")
        );
        Ok(())
    }
}

async fn navigate(page: &Page, url: &str) -> Result<FetchedPage, FetchError> {
    let navigation = |e: CdpError| navigation_error(url, e);

    page.goto(url).await.map_err(navigation)?;
    let request = page.wait_for_navigation_response().await.map_err(navigation)?;

    let status = request
        .as_ref()
        .and_then(|request| request.response.as_ref())
        .map(|response| response.status)
        .ok_or_else(|| FetchError::BrowserNavigation {
            url: url.to_string(),
            message: "navigation returned no response".to_string(),
        })?;

    let final_url = page
        .url()
        .await
        .map_err(navigation)?
        .unwrap_or_else(|| url.to_string());

    let status = u16::try_from(status).map_err(|_| FetchError::BrowserInternal {
        url: final_url.clone(),
        message: format!("invalid status code {}", status),
    })?;

    if !(200..300).contains(&status) {
        tracing::warn!("Browser fetch of {} returned status {}", final_url, status);
        return Err(FetchError::HttpStatus {
            url: final_url,
            status,
        });
    }

    let body = page.content().await.map_err(navigation)?;
    tracing::info!(
        "Fetched (browser) {} with status {} ({} bytes)",
        final_url,
        status,
        body.len()
    );

    Ok(FetchedPage {
        body,
        status,
        final_url,
    })
}

fn internal_error(url: &str, error: CdpError) -> FetchError {
    match error {
        CdpError::Timeout => FetchError::Timeout {
            url: url.to_string(),
        },
        other => {
            tracing::error!("Browser error for {}: {}", url, other);
            FetchError::BrowserInternal {
                url: url.to_string(),
                message: other.to_string(),
            }
        }
    }
}

fn navigation_error(url: &str, error: CdpError) -> FetchError {
    match error {
        CdpError::Timeout => FetchError::Timeout {
            url: url.to_string(),
        },
        other => {
            tracing::warn!("Browser navigation to {} failed: {}", url, other);
            FetchError::BrowserNavigation {
                url: url.to_string(),
                message: other.to_string(),
            }
        }
    }
}

/// Creates an isolated browser context
///
/// Creation runs on its own task. If the fetch is cancelled before the id
/// arrives, the task disposes the context it created.
async fn create_context(running: Arc<RunningBrowser>) -> Result<BrowserContextId, CdpError> {
    let creator = Arc::clone(&running);
    let created = spawn_reclaimable(
        async move {
            creator
                .browser
                .execute(CreateBrowserContextParams::default())
                .await
                .map(|response| response.result.browser_context_id)
        },
        move |created| async move {
            if let Ok(id) = created {
                tracing::debug!("Fetch cancelled during context creation, disposing {:?}", id);
                dispose_context(&running, id).await;
            }
        },
    )
    .await;

    created.unwrap_or_else(|| {
        Err(CdpError::ChromeMessage(
            "browser context creation task failed".to_string(),
        ))
    })
}

/// Runs `create` on a separate task so it always completes
///
/// Returns `None` only if that task panics. A value the caller stopped
/// waiting for is passed to `reclaim`.
async fn spawn_reclaimable<T, F, R>(
    create: F,
    reclaim: impl FnOnce(T) -> R + Send + 'static,
) -> Option<T>
where
    T: Send + 'static,
    F: Future<Output = T> + Send + 'static,
    R: Future<Output = ()> + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        let value = create.await;
        if let Err(value) = tx.send(value) {
            reclaim(value).await;
        }
    });
    rx.await.ok()
}

/// Disposes a browser context when dropped
///
/// `dispose` is the normal path. If the fetch future is cancelled first,
/// `Drop` spawns the disposal on the current runtime instead.
struct ContextGuard {
    running: Arc<RunningBrowser>,
    id: Option<BrowserContextId>,
}

impl ContextGuard {
    fn new(running: Arc<RunningBrowser>, id: BrowserContextId) -> Self {
        Self {
            running,
            id: Some(id),
        }
    }

    async fn dispose(mut self) {
        if let Some(id) = self.id.take() {
            dispose_context(&self.running, id).await;
        }
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        let Some(id) = self.id.take() else {
            return;
        };
        let running = Arc::clone(&self.running);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { dispose_context(&running, id).await });
            }
            Err(_) => tracing::warn!("No runtime to dispose browser context {:?}", id),
        }
    }
}

async fn dispose_context(running: &RunningBrowser, id: BrowserContextId) {
    match running
        .browser
        .execute(DisposeBrowserContextParams::new(id.clone()))
        .await
    {
        Ok(_) => tracing::trace!("Disposed browser context {:?}", id),
        Err(e) => tracing::warn!("Failed to dispose browser context {:?}: {}", id, e),
    }
}
