//! AI sharpness evaluation of candidate images.
//!
//! Sends one image (rating) or two images (comparison) to a vision model through
//! the gateway and returns the model's free-text feedback. A numeric score or a
//! sharper-side verdict is parsed on a best-effort basis; an unparsable reply is
//! still returned as feedback.
//!
//! Nothing here touches ranking state. Failures surface as `EvaluationError`
//! for the caller to report.

use std::path::Path;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::gateway::{Attribution, ChatGateway, ChatModel, ChatRequest, ProviderError};
use crate::prompts::{PromptTemplate, DEFAULT_COMPARISON_PROMPT, DEFAULT_RATING_PROMPT};
use crate::ranker::Side;
use crate::thumbnail::{render_thumbnail, ThumbnailError, ThumbnailSpec};

// =============================================================================
// Configuration
// =============================================================================

pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";

/// Environment variable overriding the vision model id.
pub const MODEL_ENV: &str = "IMAGE_RANKER_MODEL";

#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
    /// OpenRouter model id; must accept image input.
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    /// Images are downsized to fit these bounds before upload.
    pub upload_bounds: ThumbnailSpec,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.0,
            max_output_tokens: 400,
            upload_bounds: ThumbnailSpec::new(1024, 1024),
        }
    }
}

impl EvaluatorConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(model) = std::env::var(MODEL_ENV) {
            if !model.trim().is_empty() {
                config.model = model.trim().to_string();
            }
        }
        config
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

// =============================================================================
// Results and errors
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error("evaluation service failed: {0}")]
    Provider(#[from] ProviderError),
    #[error("could not prepare image: {0}")]
    Image(#[from] ThumbnailError),
}

impl EvaluationError {
    /// One-line message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            EvaluationError::Provider(ProviderError::MissingApiKey) => {
                "AI evaluation unavailable; set OPENROUTER_API_KEY to enable it".to_string()
            }
            EvaluationError::Provider(ProviderError::Unauthorized { status, .. }) => {
                format!("AI evaluation rejected (HTTP {status}); check OPENROUTER_API_KEY")
            }
            EvaluationError::Provider(err) => format!("AI evaluation failed: {err}"),
            EvaluationError::Image(err) => format!("AI evaluation skipped: {err}"),
        }
    }
}

/// Model verdict on which of two images is sharper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Left,
    Right,
    Tie,
}

impl Verdict {
    /// The winning side, if there is one.
    pub fn side(&self) -> Option<Side> {
        match self {
            Verdict::Left => Some(Side::Left),
            Verdict::Right => Some(Side::Right),
            Verdict::Tie => None,
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "left" | "a" | "first" => Some(Verdict::Left),
            "right" | "b" | "second" => Some(Verdict::Right),
            "tie" | "equal" | "same" => Some(Verdict::Tie),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SharpnessRating {
    pub image: String,
    /// Parsed 0-10 score, when the model produced one.
    pub score: Option<f64>,
    pub feedback: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct SharpnessComparison {
    pub left: String,
    pub right: String,
    pub verdict: Option<Verdict>,
    pub feedback: String,
    pub model: String,
}

// =============================================================================
// Evaluator
// =============================================================================

/// Sharpness rater/comparer over any chat gateway.
pub struct SharpnessEvaluator {
    gateway: Arc<dyn ChatGateway>,
    config: EvaluatorConfig,
    session_id: Option<Uuid>,
}

impl SharpnessEvaluator {
    pub fn new(gateway: Arc<dyn ChatGateway>, config: EvaluatorConfig) -> Self {
        Self {
            gateway,
            config,
            session_id: None,
        }
    }

    /// Attribute calls to a ranking session.
    pub fn with_session(mut self, session_id: Uuid) -> Self {
        self.session_id = Some(session_id);
        self
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Rate one image's sharpness on a 0-10 scale.
    pub async fn rate(&self, image: &Path) -> Result<SharpnessRating, EvaluationError> {
        let label = display_name(image);
        let urls = vec![image_data_url(image, self.config.upload_bounds)?];
        let prompt = DEFAULT_RATING_PROMPT.render_single(&label);
        let raw = self
            .ask(DEFAULT_RATING_PROMPT, prompt.to_messages(urls), "evaluation::rate")
            .await?;

        let (score, feedback) = parse_rating_response(&raw);
        debug!(image = %label, ?score, "sharpness rated");
        Ok(SharpnessRating {
            image: label,
            score,
            feedback,
            model: self.config.model.clone(),
        })
    }

    /// Compare two images' sharpness; `left` is sent first.
    pub async fn compare(
        &self,
        left: &Path,
        right: &Path,
    ) -> Result<SharpnessComparison, EvaluationError> {
        let (left_label, right_label) = (display_name(left), display_name(right));
        let urls = vec![
            image_data_url(left, self.config.upload_bounds)?,
            image_data_url(right, self.config.upload_bounds)?,
        ];
        let prompt = DEFAULT_COMPARISON_PROMPT.render_pair(&left_label, &right_label);
        let raw = self
            .ask(
                DEFAULT_COMPARISON_PROMPT,
                prompt.to_messages(urls),
                "evaluation::compare",
            )
            .await?;

        let (verdict, feedback) = parse_comparison_response(&raw);
        debug!(left = %left_label, right = %right_label, ?verdict, "sharpness compared");
        Ok(SharpnessComparison {
            left: left_label,
            right: right_label,
            verdict,
            feedback,
            model: self.config.model.clone(),
        })
    }

    async fn ask(
        &self,
        template: PromptTemplate,
        messages: Vec<crate::gateway::Message>,
        caller: &'static str,
    ) -> Result<String, EvaluationError> {
        let mut attribution = Attribution::new(caller);
        if let Some(id) = self.session_id {
            attribution = attribution.with_session(id);
        }

        let req = ChatRequest::new(
            ChatModel::openrouter(&self.config.model),
            messages,
            attribution,
        )
        .temperature(self.config.temperature)
        .max_tokens(self.config.max_output_tokens);

        debug!(template = template.slug, model = %self.config.model, "sending evaluation");
        let resp = self.gateway.chat(req).await?;
        Ok(resp.content)
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Downsize and PNG-encode an image as a `data:` URL.
pub fn image_data_url(path: &Path, bounds: ThumbnailSpec) -> Result<String, ThumbnailError> {
    let thumb = render_thumbnail(path, bounds)?;
    Ok(format!("data:image/png;base64,{}", STANDARD.encode(&thumb.png)))
}

// =============================================================================
// Response parsing
// =============================================================================

#[derive(Debug, Deserialize)]
struct RatingJson {
    #[serde(default)]
    score: Option<serde_json::Value>,
    #[serde(default)]
    feedback: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ComparisonJson {
    #[serde(default)]
    sharper: Option<String>,
    #[serde(default)]
    feedback: Option<String>,
}

/// Pull a 0-10 score and feedback text out of a rating reply.
pub fn parse_rating_response(raw: &str) -> (Option<f64>, String) {
    match serde_json::from_str::<RatingJson>(extract_json(raw)) {
        Ok(parsed) => {
            let score = parsed.score.as_ref().and_then(score_value);
            let feedback = non_empty_or_raw(parsed.feedback, raw);
            (score, feedback)
        }
        Err(err) => {
            warn!(error = %err, "rating reply was not JSON; keeping raw text");
            (None, raw.trim().to_string())
        }
    }
}

/// Pull a verdict and feedback text out of a comparison reply.
pub fn parse_comparison_response(raw: &str) -> (Option<Verdict>, String) {
    match serde_json::from_str::<ComparisonJson>(extract_json(raw)) {
        Ok(parsed) => {
            let verdict = parsed.sharper.as_deref().and_then(Verdict::parse);
            let feedback = non_empty_or_raw(parsed.feedback, raw);
            (verdict, feedback)
        }
        Err(err) => {
            warn!(error = %err, "comparison reply was not JSON; keeping raw text");
            (None, raw.trim().to_string())
        }
    }
}

fn score_value(value: &serde_json::Value) -> Option<f64> {
    let score = match value {
        serde_json::Value::Number(n) => n.as_f64()?,
        serde_json::Value::String(s) => s.trim().trim_end_matches("/10").trim().parse().ok()?,
        _ => return None,
    };
    (score.is_finite() && (0.0..=10.0).contains(&score)).then_some(score)
}

fn non_empty_or_raw(feedback: Option<String>, raw: &str) -> String {
    feedback
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
        .unwrap_or_else(|| raw.trim().to_string())
}

/// Extract the first balanced JSON object (handles models that add surrounding text).
fn extract_json(raw: &str) -> &str {
    let trimmed = raw.trim();

    if let Some(start) = trimmed.find('{') {
        let remainder = &trimmed[start..];
        let mut depth = 0;
        for (i, c) in remainder.char_indices() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return &remainder[..=i];
                    }
                }
                _ => {}
            }
        }
    }

    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_parses_json_score_and_feedback() {
        let (score, feedback) =
            parse_rating_response(r#"{"score": 7.5, "feedback": "Eyes in focus."}"#);
        assert_eq!(score, Some(7.5));
        assert_eq!(feedback, "Eyes in focus.");
    }

    #[test]
    fn rating_accepts_string_scores_and_surrounding_text() {
        let raw = "Sure! {\"score\": \"8/10\", \"feedback\": \"Crisp.\"} Hope that helps.";
        let (score, feedback) = parse_rating_response(raw);
        assert_eq!(score, Some(8.0));
        assert_eq!(feedback, "Crisp.");
    }

    #[test]
    fn rating_rejects_out_of_range_score() {
        let (score, _) = parse_rating_response(r#"{"score": 42, "feedback": "x"}"#);
        assert_eq!(score, None);
    }

    #[test]
    fn rating_falls_back_to_raw_text() {
        let (score, feedback) = parse_rating_response("  Quite soft overall.  ");
        assert_eq!(score, None);
        assert_eq!(feedback, "Quite soft overall.");
    }

    #[test]
    fn comparison_parses_verdict() {
        let (verdict, feedback) =
            parse_comparison_response(r#"{"sharper": "RIGHT", "feedback": "Less shake."}"#);
        assert_eq!(verdict, Some(Verdict::Right));
        assert_eq!(verdict.and_then(|v| v.side()), Some(Side::Right));
        assert_eq!(feedback, "Less shake.");
    }

    #[test]
    fn comparison_tie_has_no_side() {
        let (verdict, _) = parse_comparison_response(r#"{"sharper": "tie"}"#);
        assert_eq!(verdict, Some(Verdict::Tie));
        assert_eq!(Verdict::Tie.side(), None);
    }

    #[test]
    fn config_error_message_mentions_key() {
        let err = EvaluationError::Provider(ProviderError::MissingApiKey);
        assert!(err.user_message().contains("OPENROUTER_API_KEY"));

        let err = EvaluationError::Provider(ProviderError::Unauthorized {
            status: 401,
            message: "No auth credentials found".into(),
        });
        assert!(err.user_message().contains("check OPENROUTER_API_KEY"));
    }
}
