//! Unified error type for the orchestrator.
//!
//! Every failure surfaced to callers is a [`ChainError`] of one of three
//! kinds. The classification boundary between configuration and run errors
//! lives entirely in this module ([`classify_status`], [`translate`]) so it
//! can be extended without touching dispatch logic.

use thiserror::Error;

/// Closed set of error kinds callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad or missing credentials, unknown provider, malformed adapter setup.
    /// Not retryable without operator intervention.
    ProviderConfig,
    /// Rule violations, provider-reported generation failures, malformed tool
    /// schemas. May be retryable after the caller adjusts input.
    Run,
    /// Unclassified failure, surfaced as-is for diagnosis.
    Unknown,
}

/// Unified error type for chaincall.
///
/// The public `Display` message is a human-readable summary; the original
/// cause is kept as an internal attachment (see [`ChainError::cause`]) for
/// logging, never as part of the contract callers branch on.
#[derive(Debug, Clone, Error)]
pub enum ChainError {
    #[error("provider configuration error: {message}")]
    ProviderConfig {
        message: String,
        cause: Option<String>,
    },

    #[error("run error: {message}")]
    Run {
        message: String,
        cause: Option<String>,
    },

    #[error("unknown error: {message}")]
    Unknown {
        message: String,
        cause: Option<String>,
    },
}

impl ChainError {
    pub fn provider_config(msg: impl Into<String>) -> Self {
        ChainError::ProviderConfig {
            message: msg.into(),
            cause: None,
        }
    }

    pub fn run(msg: impl Into<String>) -> Self {
        ChainError::Run {
            message: msg.into(),
            cause: None,
        }
    }

    pub fn unknown(msg: impl Into<String>) -> Self {
        ChainError::Unknown {
            message: msg.into(),
            cause: None,
        }
    }

    /// Attach the rendered original cause for diagnostics.
    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        let c = Some(cause.into());
        match &mut self {
            ChainError::ProviderConfig { cause, .. }
            | ChainError::Run { cause, .. }
            | ChainError::Unknown { cause, .. } => *cause = c,
        }
        self
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ChainError::ProviderConfig { .. } => ErrorKind::ProviderConfig,
            ChainError::Run { .. } => ErrorKind::Run,
            ChainError::Unknown { .. } => ErrorKind::Unknown,
        }
    }

    /// The preserved original cause, if any. Diagnostic only.
    pub fn cause(&self) -> Option<&str> {
        match self {
            ChainError::ProviderConfig { cause, .. }
            | ChainError::Run { cause, .. }
            | ChainError::Unknown { cause, .. } => cause.as_deref(),
        }
    }
}

/// Classify an HTTP response from a *reached* provider.
///
/// Policy: credential problems are operator-actionable and map to
/// `ProviderConfig`; everything else the provider reported about the request
/// or its own state is a `Run` error the caller may retry after adjusting
/// input. The body goes into the cause attachment, truncated, rather than
/// into the public message.
pub fn classify_status(status: u16, body: &str) -> ChainError {
    let summary = summarize_body(body);
    match status {
        401 | 403 => {
            ChainError::provider_config(format!("provider rejected credentials (HTTP {status})"))
                .with_cause(summary)
        }
        429 => ChainError::run("provider rate limited the request (HTTP 429)").with_cause(summary),
        400 | 404 | 409 | 413 | 422 => {
            ChainError::run(format!("provider rejected the request (HTTP {status})"))
                .with_cause(summary)
        }
        500..=599 => {
            ChainError::run(format!("provider reported a server error (HTTP {status})"))
                .with_cause(summary)
        }
        _ => ChainError::unknown(format!("unexpected provider response (HTTP {status})"))
            .with_cause(summary),
    }
}

/// Translate an arbitrary failure raised during dispatch into a [`ChainError`].
///
/// Already-classified errors pass through untouched. Transport-level reqwest
/// failures (DNS, connect, mid-body cut) are unrecognized from the caller's
/// point of view and map to `Unknown`; request-construction failures are
/// adapter setup problems and map to `ProviderConfig`.
pub fn translate(err: Box<dyn std::error::Error + Send + Sync>) -> ChainError {
    let err = match err.downcast::<ChainError>() {
        Ok(chain) => return *chain,
        Err(err) => err,
    };
    match err.downcast::<reqwest::Error>() {
        Ok(http) => {
            if http.is_builder() {
                ChainError::provider_config("failed to construct provider request")
                    .with_cause(http.to_string())
            } else if let Some(status) = http.status() {
                classify_status(status.as_u16(), "")
            } else {
                ChainError::unknown("provider transport failure").with_cause(http.to_string())
            }
        }
        Err(other) => ChainError::unknown("unclassified failure").with_cause(other.to_string()),
    }
}

fn summarize_body(body: &str) -> String {
    const MAX: usize = 240;
    let trimmed = body.trim();
    if trimmed.len() <= MAX {
        trimmed.to_string()
    } else {
        let mut cut = MAX;
        while !trimmed.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}…", &trimmed[..cut])
    }
}

impl From<serde_json::Error> for ChainError {
    fn from(e: serde_json::Error) -> Self {
        ChainError::run("malformed JSON payload").with_cause(e.to_string())
    }
}
