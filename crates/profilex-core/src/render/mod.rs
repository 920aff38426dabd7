//! Page renderers: turn a URL into the markup a browser would show.

mod chrome;
mod http;
mod static_page;

pub use chrome::ChromeRenderer;
pub use http::HttpRenderer;
pub use static_page::StaticRenderer;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::config::{RenderConfig, RendererKind};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("No browser binary found (tried: {0})")]
    BrowserNotFound(String),
    #[error("Browser failed to launch: {0}")]
    Launch(String),
    #[error("Navigation failed: {0}")]
    Navigation(String),
    #[error("Rendering timed out after {0:?}")]
    Timeout(Duration),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RenderError {
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Http(e) => e.is_timeout(),
            _ => false,
        }
    }
}

pub type RenderResult<T> = Result<T, RenderError>;

/// Markup captured for one request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderedPage {
    pub url: String,
    pub markup: String,
    pub captured_at: DateTime<Utc>,
    /// Visual snapshot, when the renderer took one
    pub screenshot: Option<PathBuf>,
}

impl RenderedPage {
    #[must_use]
    pub fn new(url: String, markup: String) -> Self {
        Self {
            url,
            markup,
            captured_at: Utc::now(),
            screenshot: None,
        }
    }

    #[must_use]
    pub fn with_screenshot(mut self, path: PathBuf) -> Self {
        self.screenshot = Some(path);
        self
    }
}

#[async_trait::async_trait]
pub trait Renderer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Render `url` and return its markup once the page has settled.
    ///
    /// Any per-request resources must be released before this returns, and
    /// also when the returned future is dropped.
    async fn render(&self, url: &str) -> RenderResult<RenderedPage>;
}

/// Parse `url` and require an http(s) scheme.
pub(crate) fn validate_url(url: &str) -> RenderResult<url::Url> {
    let parsed = url::Url::parse(url).map_err(|e| RenderError::InvalidUrl(format!("{url}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(RenderError::InvalidUrl(format!("unsupported scheme {other}"))),
    }
}

/// Build the renderer selected by `config`.
pub fn create_renderer(
    config: &RenderConfig,
    screenshot_path: &Path,
) -> RenderResult<Box<dyn Renderer>> {
    match config.kind {
        RendererKind::Chrome => {
            let renderer = ChromeRenderer::from_config(config)?;
            let renderer = if config.screenshot {
                renderer.with_screenshot(screenshot_path.to_path_buf())
            } else {
                renderer
            };
            Ok(Box::new(renderer))
        }
        RendererKind::Http => Ok(Box::new(HttpRenderer::new(config.timeout())?)),
    }
}
