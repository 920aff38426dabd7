use serde::{Deserialize, Serialize};

/// Caller-facing classification of a pipeline failure.
///
/// Every stage error is translated into exactly one of these at the
/// orchestrator boundary; nothing finer-grained leaks to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    BadInput,
    ServiceUnavailable,
    Timeout,
    Internal,
}

impl FailureKind {
    pub const fn status_code(self) -> u16 {
        match self {
            Self::BadInput => 400,
            Self::ServiceUnavailable => 503,
            Self::Timeout => 504,
            Self::Internal => 500,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BadInput => "bad_input",
            Self::ServiceUnavailable => "service_unavailable",
            Self::Timeout => "timeout",
            Self::Internal => "internal",
        }
    }

    /// Fixed text safe to show callers. Details stay in the logs.
    pub const fn public_message(self) -> &'static str {
        match self {
            Self::BadInput => {
                "The profile identifier is invalid or the profile page has too little content"
            }
            Self::ServiceUnavailable => "An upstream service is unavailable, try again later",
            Self::Timeout => "An upstream service timed out, try again later",
            Self::Internal => "Internal error",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
