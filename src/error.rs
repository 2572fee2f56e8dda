//! Error taxonomy shared by every stage of the remix pipeline.

use async_openai::error::OpenAIError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemixError {
    /// The video could not be opened, or yielded no usable frames.
    #[error("Failed to open video: {0}")]
    Source(String),

    /// A single frame could not be sought to or decoded.
    #[error("Failed to decode frame {index}: {reason}")]
    Decode { index: u64, reason: String },

    /// The completion service call failed.
    #[error("Completion request failed: {0}")]
    Request(String),

    #[error("Frame count must be at least 1")]
    InvalidFrameCount,

    #[error("Unsupported video container: {0} (expected MP4 or MOV)")]
    UnsupportedContainer(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<OpenAIError> for RemixError {
    fn from(error: OpenAIError) -> Self {
        RemixError::Request(error.to_string())
    }
}

impl RemixError {
    pub(crate) fn decode(index: u64, reason: impl ToString) -> Self {
        RemixError::Decode {
            index,
            reason: reason.to_string(),
        }
    }
}
