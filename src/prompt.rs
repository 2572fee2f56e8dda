//! Builds the two-message request sent to the vision model: a fixed system
//! instruction and one user turn holding the modification text and frames.

use crate::sampler::SampledFrame;

pub const SYSTEM_INSTRUCTION: &str = "You are an expert AI Video Prompt Engineer specializing in Sora 2.
Your task is to analyze video frames and generate a high-fidelity text-to-video prompt.

Follow these rules strictly:
1. Analyze the camera movement, lighting, style, aesthetic, and action in the frames.
2. Apply the user's requested MODIFICATION to the content.
3. Output ONLY the prompt in English.
4. The output must be highly descriptive, photorealistic (unless specified otherwise), and detailed.
5. End the prompt with specific technical parameters: \"--ar 9:16 --v 2\"";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePart {
    pub mime: String,
    /// Base64 of the encoded image.
    pub data: String,
}

impl ImagePart {
    pub fn url(&self) -> String {
        format!("data:{};base64,{}", self.mime, self.data)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRequest {
    pub instruction: String,
    pub user_text: String,
    pub images: Vec<ImagePart>,
}

pub fn user_text(modification: &str) -> String {
    format!(
        "User Modification Request: {modification}. \n\nAnalyze these frames and generate the Sora prompt:"
    )
}

pub fn assemble(modification: &str, frames: &[SampledFrame]) -> PromptRequest {
    PromptRequest {
        instruction: SYSTEM_INSTRUCTION.to_owned(),
        user_text: user_text(modification),
        images: frames
            .iter()
            .map(|frame| ImagePart {
                mime: frame.mime().to_owned(),
                data: frame.base64(),
            })
            .collect(),
    }
}
