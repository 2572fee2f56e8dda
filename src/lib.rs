//! Turn a reference video and a modification request into a vertical (9:16)
//! text-to-video prompt using a multimodal chat model.

pub mod ai;
pub mod capture;
pub mod error;
pub mod pipeline;
pub mod prompt;
pub mod sampler;
pub mod upload;

pub use ai::{CompletionClient, OpenAiClient};
pub use capture::{FfmpegVideo, VideoSource};
pub use error::RemixError;
pub use pipeline::{generate, RemixConfig};
pub use prompt::{assemble, ImagePart, PromptRequest};
pub use sampler::{sample, SampledFrame};
pub use upload::{Container, UploadedVideo};
