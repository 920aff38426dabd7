use reqwest::Client;
use std::time::Duration;

use super::{validate_url, RenderError, RenderResult, RenderedPage, Renderer};

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// Fetches markup with a plain GET. Page scripts are not executed, so this
/// only suits pages that are rendered server-side.
#[derive(Debug, Clone)]
pub struct HttpRenderer {
    client: Client,
}

impl HttpRenderer {
    pub fn new(timeout: Duration) -> RenderResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10).min(timeout))
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Renderer for HttpRenderer {
    fn name(&self) -> &'static str {
        "http"
    }

    #[tracing::instrument(skip(self))]
    async fn render(&self, url: &str) -> RenderResult<RenderedPage> {
        let parsed = validate_url(url)?;

        let response = self.client.get(parsed).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RenderError::Navigation(format!("{url} returned {status}")));
        }

        let markup = response.text().await?;
        tracing::debug!(bytes = markup.len(), "Fetched markup");

        Ok(RenderedPage::new(url.to_string(), markup))
    }
}
