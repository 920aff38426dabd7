use scraper::{Html, Node};

/// Elements whose text content is never visible on the page
pub const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Turns raw page markup into the plain text handed to the extractor.
///
/// Implementations must be total: malformed or empty markup yields an empty
/// or near-empty string, never an error.
pub trait Normalizer: Send + Sync {
    fn normalize(&self, markup: &str) -> String;
}

/// Lenient HTML-to-text normalizer backed by html5ever.
#[derive(Debug, Clone)]
pub struct HtmlNormalizer {
    skipped: Vec<String>,
}

impl HtmlNormalizer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            skipped: SKIPPED_ELEMENTS.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    /// Also drop the text of `element` (e.g. `"nav"`, `"footer"`).
    #[must_use]
    pub fn skipping(mut self, element: &str) -> Self {
        let element = element.to_lowercase();
        if !self.skipped.contains(&element) {
            self.skipped.push(element);
        }
        self
    }

    fn is_skipped(&self, name: &str) -> bool {
        self.skipped.iter().any(|s| s == name)
    }
}

impl Default for HtmlNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer for HtmlNormalizer {
    fn normalize(&self, markup: &str) -> String {
        let document = Html::parse_document(markup);
        let mut blocks: Vec<&str> = Vec::new();

        for node in document.tree.root().descendants() {
            let Node::Text(text) = node.value() else {
                continue;
            };

            let hidden = node.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .is_some_and(|el| self.is_skipped(el.name()))
            });
            if hidden {
                continue;
            }

            let trimmed = text.trim();
            if !trimmed.is_empty() {
                blocks.push(trimmed);
            }
        }

        blocks.join("\n")
    }
}

/// Normalize with the default element set.
pub fn normalize(markup: &str) -> String {
    HtmlNormalizer::new().normalize(markup)
}
