use serde::{Deserialize, Serialize};

use crate::core::GenerationRequest;

/// Request body for the dreambooth endpoint
#[derive(Debug, Serialize)]
pub struct DreamboothRequest<'a> {
    pub key: &'a str,
    pub prompt: &'a str,
    /// Serialized as `null` when absent
    pub negative_prompt: Option<&'a str>,
    pub model_id: &'a str,
    pub guidance_scale: u32,
    pub num_inference_steps: u32,
    pub width: u32,
    pub height: u32,
    pub samples: u32,
}

impl<'a> From<&'a GenerationRequest> for DreamboothRequest<'a> {
    fn from(req: &'a GenerationRequest) -> Self {
        Self {
            key: req.api_key(),
            prompt: req.prompt(),
            negative_prompt: req.negative_prompt(),
            model_id: req.model_id(),
            guidance_scale: req.guidance_scale(),
            num_inference_steps: req.inference_steps(),
            width: req.width(),
            height: req.height(),
            samples: req.sample_count(),
        }
    }
}

/// Response from the dreambooth endpoint.
///
/// Every field is optional; classification happens after decoding.
#[derive(Debug, Deserialize)]
pub struct DreamboothResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub output: Option<Vec<String>>,
    /// Error detail some failure replies carry (a string or an object)
    #[serde(default)]
    pub message: Option<serde_json::Value>,
}
