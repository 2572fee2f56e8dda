use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImageArgs,
    ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContent,
    ChatCompletionRequestUserMessageContentPart, CreateChatCompletionRequest,
    CreateChatCompletionRequestArgs, ImageUrlArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::RemixError;
use crate::prompt::PromptRequest;

/// A multimodal completion service. One call, no retries.
#[async_trait]
pub trait CompletionClient {
    async fn complete(
        &self,
        request: &PromptRequest,
        model: &str,
        max_output_tokens: u32,
    ) -> Result<String, RemixError>;
}

pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
}

impl OpenAiClient {
    pub fn new(api_key: &str) -> Self {
        Self::with_config(OpenAIConfig::new().with_api_key(api_key))
    }

    /// Build a client for any OpenAI-compatible endpoint. Rate-limit
    /// responses are returned as errors straight away rather than retried.
    pub fn with_config(config: OpenAIConfig) -> Self {
        let no_retry = backoff::ExponentialBackoffBuilder::new()
            .with_max_elapsed_time(Some(Duration::ZERO))
            .build();
        Self {
            client: Client::with_config(config).with_backoff(no_retry),
        }
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(
        &self,
        request: &PromptRequest,
        model: &str,
        max_output_tokens: u32,
    ) -> Result<String, RemixError> {
        info!(model, images = request.images.len(), "sending completion request");
        let request = chat_request(request, model, max_output_tokens)?;

        let response = self.client.chat().create(request).await?;
        debug!(choices = response.choices.len(), "completion received");

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| RemixError::Request("no content in response from OpenAI".to_owned()))
    }
}

pub fn chat_request(
    request: &PromptRequest,
    model: &str,
    max_output_tokens: u32,
) -> Result<CreateChatCompletionRequest, OpenAIError> {
    let system = ChatCompletionRequestSystemMessageArgs::default()
        .content(request.instruction.as_str())
        .build()?;

    let parts = [
        vec![ChatCompletionRequestUserMessageContentPart::Text(
            ChatCompletionRequestMessageContentPartTextArgs::default()
                .text(request.user_text.as_str())
                .build()?,
        )],
        request
            .images
            .iter()
            .map(|image| -> Result<_, OpenAIError> {
                Ok(ChatCompletionRequestUserMessageContentPart::ImageUrl(
                    ChatCompletionRequestMessageContentPartImageArgs::default()
                        .image_url(ImageUrlArgs::default().url(image.url()).build()?)
                        .build()?,
                ))
            })
            .collect::<Result<_, _>>()?,
    ]
    .concat();

    let user = ChatCompletionRequestUserMessageArgs::default()
        .content(ChatCompletionRequestUserMessageContent::Array(parts))
        .build()?;

    CreateChatCompletionRequestArgs::default()
        .model(model)
        .max_tokens(max_output_tokens)
        .messages([
            ChatCompletionRequestMessage::System(system),
            ChatCompletionRequestMessage::User(user),
        ])
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::ImagePart;

    fn prompt(images: usize) -> PromptRequest {
        PromptRequest {
            instruction: "be brief".to_owned(),
            user_text: "User Modification Request: . \n\nAnalyze".to_owned(),
            images: (0..images)
                .map(|i| ImagePart {
                    mime: "image/jpeg".to_owned(),
                    data: format!("AAA{i}"),
                })
                .collect(),
        }
    }

    #[test]
    fn request_has_one_system_and_one_user_message() {
        let request = chat_request(&prompt(5), "gpt-4o", 500).unwrap();
        assert_eq!(request.model, "gpt-4o");
        assert_eq!(request.messages.len(), 2);
        assert!(matches!(
            request.messages[0],
            ChatCompletionRequestMessage::System(_)
        ));

        let ChatCompletionRequestMessage::User(user) = &request.messages[1] else {
            panic!("second message should be the user turn");
        };
        let ChatCompletionRequestUserMessageContent::Array(parts) = &user.content else {
            panic!("user content should be multipart");
        };
        assert_eq!(parts.len(), 6);
        assert!(matches!(
            parts[0],
            ChatCompletionRequestUserMessageContentPart::Text(_)
        ));
    }

    #[test]
    fn images_are_inline_data_urls_in_order() {
        let request = chat_request(&prompt(3), "gpt-4o", 500).unwrap();
        let ChatCompletionRequestMessage::User(user) = &request.messages[1] else {
            panic!("second message should be the user turn");
        };
        let ChatCompletionRequestUserMessageContent::Array(parts) = &user.content else {
            panic!("user content should be multipart");
        };
        let urls: Vec<_> = parts
            .iter()
            .filter_map(|part| match part {
                ChatCompletionRequestUserMessageContentPart::ImageUrl(image) => {
                    Some(image.image_url.url.clone())
                }
                _ => None,
            })
            .collect();
        assert_eq!(
            urls,
            vec![
                "data:image/jpeg;base64,AAA0",
                "data:image/jpeg;base64,AAA1",
                "data:image/jpeg;base64,AAA2",
            ]
        );
    }
}
