//! Prompt templates for multimodal sharpness evaluation.
//!
//! Renders text only; the evaluation module attaches the image parts.

use crate::gateway::Message;

// =============================================================================
// Prompt templates
// =============================================================================

/// Rendered prompt ready for the model, minus images.
#[derive(Debug, Clone)]
pub struct PromptInstance {
    pub template_slug: String,
    pub system: String,
    pub user: String,
}

impl PromptInstance {
    /// System message plus a user message carrying `image_urls` after the text.
    pub fn to_messages(&self, image_urls: Vec<String>) -> Vec<Message> {
        vec![
            Message::system(&self.system),
            Message::user_with_images(&self.user, image_urls),
        ]
    }
}

/// Escape XML special characters so filenames cannot break the prompt's tags.
fn escape_xml_chars(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// A prompt template with `{image_A}` / `{image_B}` label placeholders.
#[derive(Debug, Clone, Copy)]
pub struct PromptTemplate {
    pub slug: &'static str,
    pub system: &'static str,
    pub user: &'static str,
}

impl PromptTemplate {
    /// Render for a single image.
    pub fn render_single(&self, label: &str) -> PromptInstance {
        self.render(&[label])
    }

    /// Render for a left/right image pair.
    pub fn render_pair(&self, left: &str, right: &str) -> PromptInstance {
        self.render(&[left, right])
    }

    fn render(&self, labels: &[&str]) -> PromptInstance {
        let mut system = self.system.to_string();
        let mut user = self.user.to_string();
        for (placeholder, label) in ["{image_A}", "{image_B}"].iter().zip(labels) {
            let safe = escape_xml_chars(label);
            system = system.replace(placeholder, &safe);
            user = user.replace(placeholder, &safe);
        }

        PromptInstance {
            template_slug: self.slug.to_string(),
            system: system.trim().to_string(),
            user: user.trim().to_string(),
        }
    }
}

// =============================================================================
// Standard prompts
// =============================================================================

pub const SHARPNESS_RATING_V1: PromptTemplate = PromptTemplate {
    slug: "sharpness_rating_v1",
    system: r#"You are an expert photo editor judging technical image sharpness: focus accuracy, motion blur, camera shake, and fine-detail resolution. Ignore composition and subject matter.

Output only valid JSON `{"score": 0-10, "feedback": "<two or three sentences>"}` where 0 is completely blurred and 10 is tack sharp across the subject."#,
    user: r#"Rate the sharpness of the attached image.
<image_name>{image_A}</image_name>

json:"#,
};

pub const SHARPNESS_COMPARISON_V1: PromptTemplate = PromptTemplate {
    slug: "sharpness_comparison_v1",
    system: r#"You are an expert photo editor comparing the technical sharpness of two images: focus accuracy, motion blur, camera shake, and fine-detail resolution. Ignore composition and subject matter.

The first attached image is LEFT, the second is RIGHT.
Output only valid JSON `{"sharper": "left"|"right"|"tie", "feedback": "<two or three sentences>"}`."#,
    user: r#"Which image is sharper?
<left_image_name>{image_A}</left_image_name>
<right_image_name>{image_B}</right_image_name>

json:"#,
};

pub const DEFAULT_RATING_PROMPT: PromptTemplate = SHARPNESS_RATING_V1;
pub const DEFAULT_COMPARISON_PROMPT: PromptTemplate = SHARPNESS_COMPARISON_V1;

// =============================================================================
// TESTS
// =============================================================================
