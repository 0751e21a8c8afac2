use serde::{Deserialize, Serialize};

use super::error::PainterError;

/// Model used when the caller does not pick one
pub const DEFAULT_MODEL_ID: &str = "midjourney";

/// Text shown in an empty prompt box; never a valid prompt
pub const DEFAULT_PLACEHOLDER: &str = "Enter your prompt";

pub const GUIDANCE_SCALE: u32 = 8;
pub const INFERENCE_STEPS: u32 = 25;
pub const IMAGE_WIDTH: u32 = 512;
pub const IMAGE_HEIGHT: u32 = 512;
pub const SAMPLE_COUNT: u32 = 1;

/// Parameters for one text-to-image generation.
///
/// Built once per submission and not mutated afterwards. The tunable
/// generation parameters are fixed and only exposed through accessors.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    #[serde(skip)]
    api_key: String,
    prompt: String,
    negative_prompt: Option<String>,
    model_id: String,
}

impl GenerationRequest {
    pub fn new(api_key: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            prompt: prompt.into(),
            negative_prompt: None,
            model_id: DEFAULT_MODEL_ID.to_string(),
        }
    }

    /// Empty text clears the negative prompt
    pub fn with_negative_prompt(mut self, neg: impl Into<String>) -> Self {
        let neg = neg.into();
        self.negative_prompt = if neg.trim().is_empty() { None } else { Some(neg) };
        self
    }

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    /// Attach an API key, e.g. after restoring a request from history
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn negative_prompt(&self) -> Option<&str> {
        self.negative_prompt.as_deref()
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn guidance_scale(&self) -> u32 {
        GUIDANCE_SCALE
    }

    pub fn inference_steps(&self) -> u32 {
        INFERENCE_STEPS
    }

    pub fn width(&self) -> u32 {
        IMAGE_WIDTH
    }

    pub fn height(&self) -> u32 {
        IMAGE_HEIGHT
    }

    pub fn sample_count(&self) -> u32 {
        SAMPLE_COUNT
    }

    /// Get the prompt (truncated for display)
    pub fn prompt_preview(&self, max_len: usize) -> String {
        preview(&self.prompt, max_len)
    }
}

// Keeps the key out of logs and panics.
impl std::fmt::Debug for GenerationRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationRequest")
            .field("api_key", &"****")
            .field("prompt", &self.prompt)
            .field("negative_prompt", &self.negative_prompt)
            .field("model_id", &self.model_id)
            .finish()
    }
}

/// Check prompt text before a request is issued.
///
/// Returns the trimmed prompt. Empty text and the placeholder are rejected.
pub fn validate_prompt(text: &str, placeholder: &str) -> Result<String, PainterError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(PainterError::InvalidPrompt("prompt is empty".to_string()));
    }
    if trimmed == placeholder.trim() {
        return Err(PainterError::InvalidPrompt(
            "prompt still contains the placeholder text".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

/// Truncate on a char boundary, appending "..." when shortened
pub fn preview(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        text.to_string()
    } else {
        let kept: String = text.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
