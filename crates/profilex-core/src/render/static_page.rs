use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use super::{RenderError, RenderResult, RenderedPage, Renderer};

/// Serves fixed markup for every URL. Useful for tests and for running the
/// pipeline against a saved page.
#[derive(Debug)]
pub struct StaticRenderer {
    markup: Option<String>,
    failure: Option<String>,
    delay: Option<Duration>,
    requested: Mutex<Vec<String>>,
}

impl StaticRenderer {
    pub fn new(markup: impl Into<String>) -> Self {
        Self {
            markup: Some(markup.into()),
            failure: None,
            delay: None,
            requested: Mutex::new(Vec::new()),
        }
    }

    /// A renderer whose every call fails to launch
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            markup: None,
            failure: Some(message.into()),
            delay: None,
            requested: Mutex::new(Vec::new()),
        }
    }

    /// Wait this long before answering
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// URLs rendered so far, in call order
    pub fn requested(&self) -> Vec<String> {
        self.requested
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait::async_trait]
impl Renderer for StaticRenderer {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn render(&self, url: &str) -> RenderResult<RenderedPage> {
        self.requested
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match (&self.markup, &self.failure) {
            (_, Some(message)) => Err(RenderError::Launch(message.clone())),
            (Some(markup), None) => Ok(RenderedPage::new(url.to_string(), markup.clone())),
            (None, None) => Err(RenderError::Navigation(format!("{url} has no markup"))),
        }
    }
}
