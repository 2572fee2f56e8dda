use std::path::Path;

use tracing::{info, info_span, Instrument};

use crate::ai::CompletionClient;
use crate::capture::VideoSource;
use crate::error::RemixError;
use crate::prompt;
use crate::sampler;
use crate::upload::UploadedVideo;

pub const DEFAULT_FRAME_COUNT: usize = 5;
pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 500;
pub const DEFAULT_MODIFICATION: &str = "Keep the same style, but change the subject to...";

/// Everything one generation needs besides the video and the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemixConfig {
    pub modification: String,
    pub frame_count: usize,
    pub model: String,
    pub max_output_tokens: u32,
}

impl Default for RemixConfig {
    fn default() -> Self {
        Self {
            modification: DEFAULT_MODIFICATION.to_owned(),
            frame_count: DEFAULT_FRAME_COUNT,
            model: DEFAULT_MODEL.to_owned(),
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
        }
    }
}

/// Turn an uploaded video into a text-to-video prompt.
///
/// `open` decodes the stored upload. The decoder is released once sampling
/// ends and the upload's temporary file is deleted before this returns,
/// whether or not generation succeeded.
pub async fn generate<S, F, C>(
    config: &RemixConfig,
    upload: UploadedVideo,
    open: F,
    client: &C,
) -> Result<String, RemixError>
where
    S: VideoSource,
    F: FnOnce(&Path) -> Result<S, RemixError>,
    C: CompletionClient + ?Sized,
{
    let span = info_span!("generate", path = %upload.path().display(), model = %config.model);
    async move {
        let frames = {
            let source = open(upload.path())?;
            sampler::sample(source, config.frame_count)?
        };
        info!(frames = frames.len(), "sampled video");

        let request = prompt::assemble(&config.modification, &frames);
        let generated = client
            .complete(&request, &config.model, config.max_output_tokens)
            .await?;
        info!(chars = generated.len(), "prompt generated");

        drop(upload);
        Ok::<_, RemixError>(generated)
    }
    .instrument(span)
    .await
}
