//! HTTP chat-completions provider with SSE streaming

use crate::providers::{response_error, LlmProvider, ProviderError, TextStream};
use async_stream::try_stream;
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Silicon Flow LLM provider
pub struct SiliconFlowLlm {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl SiliconFlowLlm {
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        temperature: f32,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        if api_key.trim().is_empty() {
            return Err(ProviderError::InvalidInput(
                "API key cannot be empty".to_string(),
            ));
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            temperature,
            max_tokens,
        })
    }

    async fn post_completion(
        &self,
        prompt: &str,
        max_tokens: u32,
        stream: bool,
    ) -> Result<reqwest::Response, ProviderError> {
        if prompt.trim().is_empty() {
            return Err(ProviderError::InvalidInput(
                "Prompt cannot be empty".to_string(),
            ));
        }

        let request = CompletionRequest {
            model: &self.model,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            max_tokens,
            stream,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(response_error(response).await);
        }

        Ok(response)
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[derive(Deserialize)]
struct StreamFrame {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

#[async_trait]
impl LlmProvider for SiliconFlowLlm {
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String, ProviderError> {
        let response = self.post_completion(prompt, max_tokens, false).await?;

        let body: CompletionResponse = response.json().await?;
        let choice = body.choices.into_iter().next().ok_or_else(|| {
            ProviderError::MalformedResponse("No choices in response".to_string())
        })?;

        Ok(choice.message.content)
    }

    async fn generate_stream(&self, prompt: &str) -> Result<TextStream, ProviderError> {
        let response = self.post_completion(prompt, self.max_tokens, true).await?;

        let stream = try_stream! {
            let mut body = response.bytes_stream();
            let mut buffer = String::new();

            'frames: while let Some(chunk) = body.next().await {
                let chunk = chunk?;
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                // SSE frames are newline-delimited "data: {json}" lines
                while let Some(pos) = buffer.find('\n') {
                    let line = buffer[..pos].trim().to_string();
                    buffer.drain(..=pos);

                    let Some(data) = line.strip_prefix("data:") else {
                        continue;
                    };
                    let data = data.trim();

                    if data == "[DONE]" {
                        break 'frames;
                    }

                    if let Ok(frame) = serde_json::from_str::<StreamFrame>(data) {
                        for choice in frame.choices {
                            if let Some(fragment) = choice.delta.content {
                                if !fragment.is_empty() {
                                    yield fragment;
                                }
                            }
                        }
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rejects_empty_prompt() {
        let provider = SiliconFlowLlm::new(
            "https://api.siliconflow.cn/v1",
            "key",
            "Qwen/Qwen2-7B-Instruct",
            0.7,
            2048,
            Duration::from_secs(30),
        )
        .unwrap();

        let result = provider.generate("   ", 100).await;
        assert!(matches!(result, Err(ProviderError::InvalidInput(_))));
    }

    #[test]
    fn test_rejects_empty_api_key() {
        let result = SiliconFlowLlm::new(
            "https://api.siliconflow.cn/v1",
            "",
            "Qwen/Qwen2-7B-Instruct",
            0.7,
            2048,
            Duration::from_secs(30),
        );
        assert!(result.is_err());
    }
}
