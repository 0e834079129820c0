//! OpenRouter adapter for multimodal chat completions.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::error::ProviderError;
use super::pricing::chat_cost;
use super::types::*;

// =============================================================================
// TRAIT
// =============================================================================

/// Trait for chat completion providers.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError>;
}

// =============================================================================
// OPENROUTER ADAPTER
// =============================================================================

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Maximum allowed response content length (1MB).
const MAX_RESPONSE_LEN: usize = 1_024 * 1_024;

/// Wait suggested for a 429 without a `Retry-After` header.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Maximum allowed text input characters.
const MAX_INPUT_CHARS: usize = 200_000;

/// Maximum total size of inline image URLs in one request (20MB).
const MAX_IMAGE_BYTES: usize = 20 * 1_024 * 1_024;

/// OpenRouter API adapter for chat completions.
#[derive(Debug, Clone)]
pub struct OpenRouterAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl OpenRouterAdapter {
    /// Create from API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Self::with_config(
            api_key,
            DEFAULT_BASE_URL,
            Duration::from_secs(120),
            None,
            None,
        )
    }

    /// Create from environment variables.
    ///
    /// `OPENROUTER_API_KEY` is required; base URL, timeout, referer and app title
    /// are optional overrides.
    pub fn from_env() -> Result<Self, ProviderError> {
        let api_key = std::env::var("OPENROUTER_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ProviderError::MissingApiKey)?;

        let base_url =
            std::env::var("OPENROUTER_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());

        let timeout = std::env::var("OPENROUTER_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(120));

        let referer = std::env::var("OPENROUTER_REFERER").ok();
        let app_title = std::env::var("OPENROUTER_APP_TITLE")
            .ok()
            .or_else(|| Some("image-ranker".to_string()));

        Self::with_config(api_key, base_url, timeout, referer, app_title)
    }

    /// Create with custom configuration.
    pub fn with_config(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
        referer: Option<String>,
        app_title: Option<String>,
    ) -> Result<Self, ProviderError> {
        let api_key = api_key.into();
        let base_url = base_url.into();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let auth_value = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| ProviderError::Setup("API key is not a valid header value".into()))?;
        headers.insert(AUTHORIZATION, auth_value);

        if let Some(ref r) = referer {
            if let Ok(v) = HeaderValue::from_str(r) {
                headers.insert("HTTP-Referer", v);
            }
        }

        if let Some(ref t) = app_title {
            if let Ok(v) = HeaderValue::from_str(t) {
                headers.insert("X-Title", v);
            }
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .gzip(true)
            .build()
            .map_err(|e| ProviderError::Setup(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Extract request ID from response headers.
    fn extract_request_id(headers: &reqwest::header::HeaderMap) -> Option<String> {
        headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    }

    /// Check if message indicates a refusal.
    fn is_refusal(msg: &str) -> bool {
        let l = msg.trim_start().to_lowercase();
        let first_line = l.lines().next().unwrap_or("");

        const PREFIXES: &[&str] = &[
            "refus",
            "i cannot",
            "i can't",
            "i won't",
            "i will not",
            "i am unable to",
            "i'm unable to",
            "unable to comply",
            "unable to assist",
        ];

        PREFIXES.iter().any(|p| first_line.starts_with(p)) || l.contains("request was refused")
    }

    fn validate(req: &ChatRequest) -> Result<(), ProviderError> {
        let (mut text_chars, mut image_bytes) = (0usize, 0usize);
        for part in req.messages.iter().flat_map(|m| m.content.iter()) {
            match part {
                ContentPart::Text(t) => text_chars += t.len(),
                ContentPart::ImageUrl(u) => image_bytes += u.len(),
            }
        }

        if text_chars > MAX_INPUT_CHARS {
            return Err(ProviderError::Oversized(format!(
                "prompt: {text_chars} chars (max {MAX_INPUT_CHARS})"
            )));
        }
        if image_bytes > MAX_IMAGE_BYTES {
            return Err(ProviderError::Oversized(format!(
                "images: {image_bytes} bytes (max {MAX_IMAGE_BYTES})"
            )));
        }
        Ok(())
    }
}

// =============================================================================
// API TYPES
// =============================================================================

#[derive(Serialize)]
struct ChatApiRequest<'a> {
    model: &'a str,
    messages: &'a [ApiMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ApiMessage {
    role: &'static str,
    content: ApiContent,
}

/// Plain string for text-only messages, part array once images are involved.
#[derive(Serialize)]
#[serde(untagged)]
enum ApiContent {
    Text(String),
    Parts(Vec<ApiPart>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiPart {
    Text { text: String },
    ImageUrl { image_url: ApiImageUrl },
}

#[derive(Serialize)]
struct ApiImageUrl {
    url: String,
}

impl From<&Message> for ApiMessage {
    fn from(m: &Message) -> Self {
        let role = match m.role {
            Role::System => "system",
            Role::User => "user",
        };

        let content = if m.image_count() == 0 {
            ApiContent::Text(m.text_content())
        } else {
            ApiContent::Parts(
                m.content
                    .iter()
                    .map(|p| match p {
                        ContentPart::Text(text) => ApiPart::Text { text: text.clone() },
                        ContentPart::ImageUrl(url) => ApiPart::ImageUrl {
                            image_url: ApiImageUrl { url: url.clone() },
                        },
                    })
                    .collect(),
            )
        };

        Self { role, content }
    }
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Deserialize)]
struct ChatApiResponse {
    choices: Option<Vec<Choice>>,
    usage: Option<Usage>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
    #[serde(default)]
    cost_details: Option<CostDetails>,
}

#[derive(Deserialize)]
struct CostDetails {
    upstream_inference_cost: Option<f64>,
}

#[derive(Deserialize)]
struct ApiError {
    message: Option<String>,
    code: Option<serde_json::Value>,
}

// =============================================================================
// CHAT PROVIDER IMPL
// =============================================================================

#[async_trait]
impl ChatProvider for OpenRouterAdapter {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        Self::validate(req)?;

        let start = Instant::now();

        let messages: Vec<ApiMessage> = req.messages.iter().map(ApiMessage::from).collect();

        let api_req = ChatApiRequest {
            model: req.model.model_id(),
            messages: &messages,
            temperature: req.temperature,
            max_tokens: req.max_tokens,
            response_format: if req.json_mode {
                Some(ResponseFormat {
                    format_type: "json_object",
                })
            } else {
                None
            },
        };

        let mut response = self
            .client
            .post(self.chat_url())
            .json(&api_req)
            .send()
            .await?;

        let status = response.status();
        let request_id = Self::extract_request_id(response.headers());
        let retry_after = retry_after_header(response.headers());

        // Stream response to enforce size limit
        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            let new_len = bytes.len() + chunk.len();
            if new_len > MAX_RESPONSE_LEN {
                return Err(ProviderError::Malformed(format!(
                    "response exceeds {MAX_RESPONSE_LEN} bytes"
                )));
            }
            bytes.extend_from_slice(&chunk);
        }

        let body = String::from_utf8_lossy(&bytes).to_string();

        if !status.is_success() {
            let error = serde_json::from_str::<ChatApiResponse>(&body)
                .ok()
                .and_then(|p| p.error);
            return Err(classify_status(status.as_u16(), error, request_id, retry_after));
        }

        let parsed: ChatApiResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::Malformed(format!("invalid JSON: {e}")))?;

        if let Some(error) = parsed.error {
            let message = error.message.clone().unwrap_or_default();
            if Self::is_refusal(&message) {
                return Err(ProviderError::Refused(message));
            }
            return Err(classify_status(status.as_u16(), Some(error), request_id, None));
        }

        let choice = parsed
            .choices
            .and_then(|c| c.into_iter().next())
            .ok_or_else(|| ProviderError::Malformed("no choices".into()))?;

        let content = choice
            .message
            .and_then(|m| m.content)
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(ProviderError::EmptyReply);
        }

        if Self::is_refusal(&content) {
            return Err(ProviderError::Refused(content));
        }

        let usage = parsed
            .usage
            .ok_or_else(|| ProviderError::Malformed("no usage block".into()))?;

        let input_tokens = usage.prompt_tokens.unwrap_or(0);
        let output_tokens = usage.completion_tokens.unwrap_or(0);

        let latency = start.elapsed();
        let cost = chat_cost(req.model.model_id(), input_tokens, output_tokens);
        let upstream_cost_nanodollars = usage
            .cost_details
            .and_then(|d| d.upstream_inference_cost)
            .map(|usd| ((usd * 1_000_000_000.0).round() as i64).max(0));

        Ok(ChatResponse {
            content,
            input_tokens,
            output_tokens,
            cost_nanodollars: cost,
            upstream_cost_nanodollars,
            latency,
            finish_reason: FinishReason::from(choice.finish_reason),
        })
    }
}

/// Seconds from a `Retry-After` header; HTTP-date values are ignored.
fn retry_after_header(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn classify_status(
    status: u16,
    error: Option<ApiError>,
    request_id: Option<String>,
    retry_after: Option<Duration>,
) -> ProviderError {
    let (message, code) = match error {
        Some(ApiError { message, code }) => {
            let code = match code {
                Some(serde_json::Value::String(code)) => Some(code),
                Some(serde_json::Value::Null) | None => None,
                Some(other) => Some(other.to_string()),
            };
            (message.unwrap_or_else(|| format!("HTTP {status}")), code)
        }
        None => (format!("HTTP {status}"), None),
    };

    match status {
        429 => ProviderError::RateLimited {
            retry_after: retry_after.unwrap_or(DEFAULT_RETRY_AFTER),
            request_id,
        },
        401 | 403 => ProviderError::Unauthorized { status, message },
        _ => ProviderError::Status {
            status,
            code,
            message,
            request_id,
        },
    }
}
