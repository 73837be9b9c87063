use std::fmt;
use std::time::Duration;

use roomscout_core::{Termination, Website};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Launching,
    Searching,
    CollectingSources,
    Enriching,
    Storing,
    Done,
}

/// Counts returned by the listing store after a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreSummary {
    pub new: usize,
    pub updated: usize,
    pub deleted: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub listings: usize,
    pub duplicates: usize,
    pub pages: u32,
    pub termination: Option<Termination>,
    pub geocoded: usize,
    pub store: StoreSummary,
}

/// Progress reported by a pipeline run to any observer.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    Stage(Stage),
    PageCollected {
        page: u32,
        total_pages: Option<u32>,
        items: usize,
    },
    CaptchaBackoff {
        attempt: u32,
        delay: Duration,
    },
    SourceCollected {
        website: Website,
        items: usize,
    },
    ListingEnriched {
        url: String,
        geocoded: bool,
    },
    Finished(RunSummary),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutput {
    pub bytes: Vec<u8>,
    pub metadata: FetchMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchMetadata {
    /// Where the last redirect landed; relative links resolve against it.
    pub final_url: String,
    pub redirect_count: usize,
    pub content_type: Option<String>,
}

/// A decoded HTML page and the URL it was finally served from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub html: String,
    pub url: url::Url,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    RedirectLimitExceeded,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    UnsupportedContentType { content_type: String },
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::UnsupportedContentType { content_type } => {
                write!(f, "unsupported content type {content_type}")
            }
            FailureKind::Network => write!(f, "network error"),
        }
    }
}
