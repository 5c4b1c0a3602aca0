use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::GenerationFailure;
use crate::prompts::{self, Prompt};
use crate::session::SessionConfig;
use crate::transcript::Message;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Input for a question request.
#[derive(Debug, Clone)]
pub struct QuestionRequest {
    pub session: SessionConfig,
    /// The last two messages at most.
    pub recent: Vec<Message>,
}

/// Input for a feedback request.
#[derive(Debug, Clone)]
pub struct FeedbackRequest {
    pub session: SessionConfig,
    pub question: String,
    pub answer: String,
}

/// The external language-model service. Implementations make no promise of
/// determinism; callers must not assume a retry returns the same text.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate_question(&self, request: &QuestionRequest) -> Result<String, GenerationFailure>;

    async fn generate_feedback(&self, request: &FeedbackRequest) -> Result<String, GenerationFailure>;
}

// Gemini request types
#[derive(Serialize)]
struct GeminiRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

// Gemini response types
#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
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

/// Gemini `generateContent` client.
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    temperature: f32,
    max_output_tokens: u32,
    language: String,
}

impl GeminiClient {
    /// A missing key is accepted here; each call then fails with
    /// `MissingCredential`.
    pub fn from_config(config: &Config) -> Self {
        if config.api_key().is_none() {
            log::warn!("No Gemini API key set; questions and feedback will fail until one is configured");
        }
        Self {
            http: reqwest::Client::new(),
            api_key: config.api_key().map(str::to_string),
            base_url: GEMINI_BASE_URL.to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            language: config.response_language.clone(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn generate(&self, prompt: Prompt) -> Result<String, GenerationFailure> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(GenerationFailure::MissingCredential)?;

        let url = format!("{}/{}:generateContent", self.base_url, self.model);

        let body = GeminiRequest {
            system_instruction: Content {
                parts: vec![Part {
                    text: prompt.instruction,
                }],
            },
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.content,
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
            },
        };

        let resp = self
            .http
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(GenerationFailure::Api { status, body });
        }

        let gemini_resp: GeminiResponse = resp.json().await?;
        extract_text(gemini_resp)
    }
}

fn extract_text(resp: GeminiResponse) -> Result<String, GenerationFailure> {
    let text = resp
        .candidates
        .and_then(|c| c.into_iter().next())
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().map(|p| p.text).collect::<Vec<_>>().join(""))
        .ok_or_else(|| GenerationFailure::Malformed("response has no candidates".into()))?;

    let text = text.trim();
    if text.is_empty() {
        return Err(GenerationFailure::EmptyResponse);
    }
    Ok(text.to_string())
}

#[async_trait]
impl ContentGenerator for GeminiClient {
    async fn generate_question(&self, request: &QuestionRequest) -> Result<String, GenerationFailure> {
        let prompt = prompts::question_prompt(&request.session, &request.recent, &self.language);
        self.generate(prompt).await
    }

    async fn generate_feedback(&self, request: &FeedbackRequest) -> Result<String, GenerationFailure> {
        let prompt = prompts::feedback_prompt(
            &request.session,
            &request.question,
            &request.answer,
            &self.language,
        );
        self.generate(prompt).await
    }
}
