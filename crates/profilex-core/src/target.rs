use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Host that marks an identifier as an already-qualified profile URL
pub const PROFILE_HOST: &str = "naukri.com";
pub const PROFILE_URL_PREFIX: &str = "https://www.naukri.com/code360/profile/";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TargetError {
    #[error("Profile identifier is empty")]
    Empty,
    #[error("Profile identifier contains whitespace: {0:?}")]
    Whitespace(String),
    #[error("Profile URL is not a valid http(s) URL: {0}")]
    InvalidUrl(String),
    #[error("Profile URL points outside {PROFILE_HOST}: {0}")]
    ForeignHost(String),
}

/// Canonical URL of the profile page a request is about
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProfileTarget {
    url: String,
}

impl ProfileTarget {
    /// Resolve a bare username or a full profile URL.
    ///
    /// Anything that mentions the profile host is taken verbatim, provided it
    /// is an absolute http(s) URL on that host; everything else is treated as
    /// a username and substituted into the URL template.
    pub fn resolve(identifier: &str) -> Result<Self, TargetError> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(TargetError::Empty);
        }
        if identifier.chars().any(char::is_whitespace) {
            return Err(TargetError::Whitespace(identifier.to_string()));
        }

        let url = if identifier.contains(PROFILE_HOST) {
            check_profile_url(identifier)?;
            identifier.to_string()
        } else {
            format!("{PROFILE_URL_PREFIX}{}", identifier.trim_matches('/'))
        };

        Ok(Self { url })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn into_url(self) -> String {
        self.url
    }
}

fn check_profile_url(url: &str) -> Result<(), TargetError> {
    let parsed = url::Url::parse(url).map_err(|e| TargetError::InvalidUrl(format!("{url}: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(TargetError::InvalidUrl(url.to_string()));
    }

    let host = parsed.host_str().unwrap_or_default();
    let on_profile_host = host == PROFILE_HOST
        || host
            .strip_suffix(PROFILE_HOST)
            .is_some_and(|prefix| prefix.ends_with('.'));
    if on_profile_host {
        Ok(())
    } else {
        Err(TargetError::ForeignHost(url.to_string()))
    }
}

impl fmt::Display for ProfileTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}
