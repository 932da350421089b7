//! Gemini `streamGenerateContent` client.
//!
//! Responses arrive as server-sent events; the text parts of every chunk are
//! concatenated into one narrative.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{mime_type_for, ModelError, SummaryModel, VisionModel};
use crate::config::{ModelConfig, SamplingConfig};

/// Harm categories sent with their blocking threshold set to `OFF`.
const SAFETY_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_HARASSMENT",
];

pub struct GeminiClient {
    api_key: String,
    base_url: String,
    model: String,
    summary_model: String,
    sampling: SamplingConfig,
    http: Client,
}

impl GeminiClient {
    pub fn from_config(config: &ModelConfig) -> Result<Self, ModelError> {
        debug!(?config, "from_config: called");
        let api_key = config.api_key.clone().ok_or(ModelError::MissingCredentials)?;
        let http = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            api_key,
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            summary_model: config.summary_model.clone(),
            sampling: config.sampling.clone(),
            http,
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.base_url, model
        )
    }

    fn build_request_body(&self, parts: Vec<serde_json::Value>) -> serde_json::Value {
        serde_json::json!({
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": {
                "temperature": self.sampling.temperature,
                "topP": self.sampling.top_p,
                "maxOutputTokens": self.sampling.max_output_tokens,
                "responseModalities": ["TEXT"],
            },
            "safetySettings": SAFETY_CATEGORIES
                .iter()
                .map(|category| serde_json::json!({ "category": category, "threshold": "OFF" }))
                .collect::<Vec<_>>(),
        })
    }

    async fn stream_text(&self, model: &str, body: serde_json::Value) -> Result<String, ModelError> {
        let url = self.endpoint(model);
        debug!(%url, "stream_text: sending request");

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ModelError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let mut stream = response.bytes_stream();
        let mut accumulator = SseText::default();
        while let Some(chunk) = stream.next().await {
            accumulator.push(&chunk?)?;
        }

        accumulator.finish()
    }
}

#[async_trait]
impl VisionModel for GeminiClient {
    async fn analyze(&self, image_reference: &str, prompt: &str) -> Result<String, ModelError> {
        let parts = vec![
            serde_json::json!({
                "fileData": {
                    "mimeType": mime_type_for(image_reference),
                    "fileUri": image_reference,
                }
            }),
            serde_json::json!({ "text": prompt }),
        ];
        let body = self.build_request_body(parts);
        self.stream_text(&self.model, body).await
    }
}

#[async_trait]
impl SummaryModel for GeminiClient {
    async fn summarize(&self, prompt: &str) -> Result<String, ModelError> {
        let body = self.build_request_body(vec![serde_json::json!({ "text": prompt })]);
        self.stream_text(&self.summary_model, body).await
    }
}

/// Incremental SSE decoder keeping only candidate text. Bytes are buffered
/// until a full line arrives so multibyte characters split across network
/// chunks decode intact.
#[derive(Debug, Default)]
struct SseText {
    buffer: Vec<u8>,
    text: String,
}

impl SseText {
    fn push(&mut self, bytes: &[u8]) -> Result<(), ModelError> {
        self.buffer.extend_from_slice(bytes);

        while let Some(line_end) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=line_end).collect();
            self.consume_bytes(&line)?;
        }
        Ok(())
    }

    fn consume_bytes(&mut self, line: &[u8]) -> Result<(), ModelError> {
        let line = std::str::from_utf8(line)
            .map_err(|e| ModelError::InvalidResponse(format!("stream is not valid UTF-8: {e}")))?;
        self.consume_line(line.trim())
    }

    fn consume_line(&mut self, line: &str) -> Result<(), ModelError> {
        let Some(data) = line.strip_prefix("data:") else {
            return Ok(());
        };
        let data = data.trim();
        if data.is_empty() || data == "[DONE]" {
            return Ok(());
        }

        let chunk: StreamChunk = serde_json::from_str(data)?;
        if let Some(error) = chunk.error {
            return Err(ModelError::Api {
                status: error.code,
                message: error.message,
            });
        }

        if let Some(reason) = chunk.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(ModelError::InvalidResponse(format!("prompt blocked: {reason}")));
        }

        for candidate in chunk.candidates {
            let Some(content) = candidate.content else {
                continue;
            };
            for part in content.parts {
                if let Some(text) = part.text {
                    self.text.push_str(&text);
                }
            }
        }
        Ok(())
    }

    fn finish(mut self) -> Result<String, ModelError> {
        let rest = std::mem::take(&mut self.buffer);
        self.consume_bytes(&rest)?;

        if self.text.trim().is_empty() {
            return Err(ModelError::EmptyResponse);
        }
        Ok(self.text)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: u16,
    #[serde(default)]
    message: String,
}
