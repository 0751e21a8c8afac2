use super::error::{FailureKind, GenerationError};

/// Outcome of one generation call
#[derive(Debug)]
pub enum GenerationResult {
    /// The service produced at least one image URL
    Success { image_urls: Vec<String> },
    /// Transport, decode or unsuccessful generation
    Failure(GenerationError),
}

impl GenerationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, GenerationResult::Success { .. })
    }

    pub fn image_urls(&self) -> &[String] {
        match self {
            GenerationResult::Success { image_urls } => image_urls,
            GenerationResult::Failure(_) => &[],
        }
    }

    pub fn first_image_url(&self) -> Option<&str> {
        self.image_urls().first().map(String::as_str)
    }

    pub fn failure(&self) -> Option<&GenerationError> {
        match self {
            GenerationResult::Success { .. } => None,
            GenerationResult::Failure(err) => Some(err),
        }
    }

    /// Failure classification, `None` on success
    pub fn kind(&self) -> Option<FailureKind> {
        self.failure().map(GenerationError::kind)
    }

    pub fn into_result(self) -> Result<Vec<String>, GenerationError> {
        match self {
            GenerationResult::Success { image_urls } => Ok(image_urls),
            GenerationResult::Failure(err) => Err(err),
        }
    }
}
