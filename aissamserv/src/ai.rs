//! Gemini-backed response generation with bounded retry and a hard
//! wall-clock timeout. Model failures never surface to the caller; the chat
//! turn always completes with a substitute reply.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use aissam::tutor::{self, Subject, TranscriptEntry};

use crate::media::InlineImage;

/// Returned when the model keeps answering with nothing.
pub const EMPTY_REPLY_APOLOGY: &str = "죄송합니다. 현재 응답을 생성할 수 없습니다. 다시 시도해 주세요.";

/// Returned when generation exceeds the wall-clock bound.
pub const TIMEOUT_APOLOGY: &str = "죄송합니다. 응답 생성 시간이 초과되었습니다. 다시 시도해 주세요.";

#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("empty response from model")]
    Empty,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
    #[serde(rename = "safetySettings")]
    safety_settings: Vec<SafetySetting>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    Inline {
        inline_data: InlineData<'a>,
    },
}

#[derive(Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    // Low temperature for precise worked solutions.
    temperature: f32,
    #[serde(rename = "topP")]
    top_p: f32,
    #[serde(rename = "topK")]
    top_k: u32,
}

#[derive(Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

fn safety_settings() -> Vec<SafetySetting> {
    [
        "HARM_CATEGORY_HARASSMENT",
        "HARM_CATEGORY_HATE_SPEECH",
        "HARM_CATEGORY_SEXUALLY_EXPLICIT",
        "HARM_CATEGORY_DANGEROUS_CONTENT",
    ]
    .into_iter()
    .map(|category| SafetySetting {
        category,
        threshold: "BLOCK_MEDIUM_AND_ABOVE",
    })
    .collect()
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

/// Thin client for the Gemini `generateContent` endpoint.
#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        GeminiClient {
            http: Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// One generation attempt. Trimmed text of the first candidate; `Empty`
    /// when the model answers with no usable text.
    pub async fn generate(&self, prompt: &str, image: Option<&InlineImage>) -> Result<String, AiError> {
        let mut parts = vec![Part::Text { text: prompt }];
        if let Some(image) = image {
            parts.push(Part::Inline {
                inline_data: InlineData {
                    mime_type: image.mime_type,
                    data: &image.data,
                },
            });
        }

        let body = GenerateRequest {
            contents: vec![Content { parts }],
            generation_config: GenerationConfig {
                temperature: 0.3,
                top_p: 1.0,
                top_k: 1,
            },
            safety_settings: safety_settings(),
        };

        let resp = self
            .http
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url.trim_end_matches('/'),
                self.model
            ))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(AiError::Api { status, message });
        }

        let data: GenerateResponse = resp.json().await?;
        let text = data
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<String>()
            })
            .unwrap_or_default();

        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(AiError::Empty);
        }
        Ok(trimmed.to_string())
    }
}

/// Response generator: prompt assembly, bounded retry, timeout, apology
/// substitution.
pub struct AiService {
    client: GeminiClient,
    max_attempts: u32,
    timeout: Duration,
}

impl AiService {
    pub fn new(client: GeminiClient, max_attempts: u32, timeout: Duration) -> Self {
        AiService {
            client,
            max_attempts,
            timeout,
        }
    }

    /// Generate the tutoring reply for one chat turn. Never fails: transport
    /// errors, empty answers, and timeouts all degrade to apology strings.
    pub async fn generate_reply(
        &self,
        subject: Subject,
        question: &str,
        history: &[TranscriptEntry],
        image: Option<InlineImage>,
    ) -> String {
        let prompt = tutor::build_prompt(subject, question, history, image.is_some());

        match tokio::time::timeout(self.timeout, self.attempt_reply(&prompt, image.as_ref())).await {
            Ok(reply) => reply,
            Err(_) => {
                tracing::warn!(
                    "Generation exceeded {}s bound, substituting timeout apology",
                    self.timeout.as_secs()
                );
                TIMEOUT_APOLOGY.to_string()
            }
        }
    }

    async fn attempt_reply(&self, prompt: &str, image: Option<&InlineImage>) -> String {
        for attempt in 1..=self.max_attempts {
            match self.client.generate(prompt, image).await {
                Ok(text) => return text,
                Err(AiError::Empty) => {
                    tracing::warn!("Empty model response (attempt {}/{})", attempt, self.max_attempts);
                    if attempt == self.max_attempts {
                        return EMPTY_REPLY_APOLOGY.to_string();
                    }
                }
                Err(e) => {
                    tracing::error!(
                        "Model call failed (attempt {}/{}): {}",
                        attempt,
                        self.max_attempts,
                        e
                    );
                    if attempt == self.max_attempts {
                        return format!("죄송합니다. 오류가 발생했습니다: {e}");
                    }
                }
            }
        }

        EMPTY_REPLY_APOLOGY.to_string()
    }

    /// Weak-topic analysis over a student's recent questions. Empty string
    /// below the 3-question threshold or on any failure; single attempt.
    pub async fn analyze_pattern(&self, questions: &[String]) -> String {
        let Some(prompt) = tutor::build_pattern_prompt(questions) else {
            return String::new();
        };

        match tokio::time::timeout(self.timeout, self.client.generate(&prompt, None)).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                tracing::warn!("Pattern analysis failed: {}", e);
                String::new()
            }
            Err(_) => {
                tracing::warn!("Pattern analysis timed out");
                String::new()
            }
        }
    }
}
