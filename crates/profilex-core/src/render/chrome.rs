use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use super::{validate_url, RenderError, RenderResult, RenderedPage, Renderer};
use crate::config::RenderConfig;

/// Binaries tried, in order, when no explicit path is configured
const CANDIDATES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
    "chrome",
];

/// Renders pages with a headless Chrome/Chromium process.
///
/// Every call launches a fresh browser with a throwaway profile directory, so
/// cookies and history never carry over between requests. The process is
/// killed and the profile removed when the call finishes or is cancelled.
#[derive(Debug, Clone)]
pub struct ChromeRenderer {
    binary: PathBuf,
    settle: Duration,
    window_size: (u32, u32),
    screenshot_path: Option<PathBuf>,
}

impl ChromeRenderer {
    pub fn new(binary: PathBuf) -> Self {
        Self {
            binary,
            settle: Duration::from_secs(5),
            window_size: (1280, 800),
            screenshot_path: None,
        }
    }

    pub fn from_config(config: &RenderConfig) -> RenderResult<Self> {
        let binary = match &config.chrome_binary {
            Some(path) => path.clone(),
            None => locate_browser()?,
        };

        Ok(Self::new(binary)
            .with_settle(Duration::from_millis(config.settle_ms))
            .with_window_size(config.window_size))
    }

    #[must_use]
    pub const fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    #[must_use]
    pub const fn with_window_size(mut self, size: (u32, u32)) -> Self {
        self.window_size = size;
        self
    }

    #[must_use]
    pub fn with_screenshot(mut self, path: PathBuf) -> Self {
        self.screenshot_path = Some(path);
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn base_args(&self, profile_dir: &Path) -> Vec<String> {
        let (width, height) = self.window_size;
        vec![
            "--headless=new".to_string(),
            "--no-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--disable-gpu".to_string(),
            "--disable-extensions".to_string(),
            "--no-first-run".to_string(),
            format!("--window-size={width},{height}"),
            format!("--user-data-dir={}", profile_dir.display()),
            format!("--virtual-time-budget={}", self.settle.as_millis()),
        ]
    }

    async fn run(&self, args: Vec<String>) -> RenderResult<String> {
        let output = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| RenderError::Launch(format!("{}: {e}", self.binary.display())))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RenderError::Launch(format!(
                "exit status {:?}: {}",
                output.status.code(),
                tail(&stderr, 400)
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn capture_screenshot(
        &self,
        profile_dir: &Path,
        url: &str,
        path: &Path,
    ) -> RenderResult<()> {
        let mut args = self.base_args(profile_dir);
        args.push(format!("--screenshot={}", path.display()));
        args.push(url.to_string());
        self.run(args).await.map(|_| ())
    }
}

#[async_trait::async_trait]
impl Renderer for ChromeRenderer {
    fn name(&self) -> &'static str {
        "chrome"
    }

    #[tracing::instrument(skip(self), fields(binary = %self.binary.display()))]
    async fn render(&self, url: &str) -> RenderResult<RenderedPage> {
        validate_url(url)?;

        let profile = tempfile::Builder::new().prefix("profilex-chrome-").tempdir()?;

        let mut args = self.base_args(profile.path());
        args.push("--dump-dom".to_string());
        args.push(url.to_string());

        let markup = self.run(args).await?;
        if markup.trim().is_empty() {
            return Err(RenderError::Navigation(format!("{url} produced no markup")));
        }
        tracing::debug!(bytes = markup.len(), "Captured DOM");

        let mut page = RenderedPage::new(url.to_string(), markup);

        if let Some(path) = &self.screenshot_path {
            match self.capture_screenshot(profile.path(), url, path).await {
                Ok(()) => page = page.with_screenshot(path.clone()),
                Err(e) => tracing::warn!(error = %e, "Screenshot failed, continuing without it"),
            }
        }

        Ok(page)
    }
}

/// Find the first browser binary on PATH.
pub fn locate_browser() -> RenderResult<PathBuf> {
    CANDIDATES
        .iter()
        .find_map(|name| which::which(name).ok())
        .ok_or_else(|| RenderError::BrowserNotFound(CANDIDATES.join(", ")))
}

fn tail(text: &str, max_chars: usize) -> &str {
    let text = text.trim();
    let count = text.chars().count();
    if count <= max_chars {
        return text;
    }
    let skip = count - max_chars;
    text.char_indices()
        .nth(skip)
        .map_or(text, |(idx, _)| &text[idx..])
}
