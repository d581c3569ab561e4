use thiserror::Error;

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum PipelineError {
    /// One transport failed; the gateway moves on to the next strategy.
    #[error("transport {transport} failed ({reason}): {message}")]
    Transport {
        transport: String,
        reason: &'static str,
        message: String,
    },

    /// Every transport in the chain failed or was not allowed to run.
    #[error("upstream unavailable after {} attempt(s): {}", .attempts.len(), .attempts.join("; "))]
    UpstreamUnavailable { attempts: Vec<String> },

    /// Model output did not match the expected shape after all recovery attempts.
    #[error("parse error: {message}")]
    Parse { message: String, raw: String },

    #[error("validation failed: {0}")]
    Validation(String),

    /// A message arrived while the session was still processing the previous one.
    #[error("conversation is busy with a previous message")]
    Busy,

    #[error("configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    pub fn parse(message: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            raw: raw.into(),
        }
    }

    /// Raw model text attached to a parse failure, for "unable to parse" diagnostics.
    pub fn raw_text(&self) -> Option<&str> {
        match self {
            Self::Parse { raw, .. } => Some(raw),
            _ => None,
        }
    }
}
