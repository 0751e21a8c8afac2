use thiserror::Error;

/// Why a single generation call did not produce an image
#[derive(Error, Debug)]
pub enum GenerationError {
    /// The HTTP exchange did not complete (unreachable host, timeout, TLS,
    /// connection dropped while reading the body)
    #[error("Transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// The exchange completed but the body was not the expected JSON shape
    #[error("Invalid API response: {0}")]
    Decode(#[source] serde_json::Error),

    /// Well-formed response, but the service did not produce an image
    #[error("Generation failed: {}", unsuccessful_reason(.status, .message))]
    Unsuccessful {
        status: Option<String>,
        message: Option<String>,
    },
}

fn unsuccessful_reason(status: &Option<String>, message: &Option<String>) -> String {
    match (status.as_deref(), message.as_deref()) {
        (Some(status), Some(message)) => format!("status \"{}\": {}", status, message),
        (Some("success"), None) => "service reported success but returned no images".to_string(),
        (Some(status), None) => format!("status \"{}\"", status),
        (None, Some(message)) => message.to_string(),
        (None, None) => "response carried no status and no images".to_string(),
    }
}

/// Coarse classification of a failed generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Transport,
    Decode,
    Unsuccessful,
}

impl GenerationError {
    pub fn kind(&self) -> FailureKind {
        match self {
            GenerationError::Transport(_) => FailureKind::Transport,
            GenerationError::Decode(_) => FailureKind::Decode,
            GenerationError::Unsuccessful { .. } => FailureKind::Unsuccessful,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, GenerationError::Transport(e) if e.is_timeout())
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Transport => write!(f, "transport"),
            FailureKind::Decode => write!(f, "decode"),
            FailureKind::Unsuccessful => write!(f, "unsuccessful"),
        }
    }
}

#[derive(Error, Debug)]
pub enum PainterError {
    #[error("API key not configured. Set STABLE_DIFFUSION_API_KEY environment variable or run: painter config set api.key <your-key>")]
    MissingApiKey,

    #[error("Invalid prompt: {0}")]
    InvalidPrompt(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsuccessful_messages() {
        let err = GenerationError::Unsuccessful {
            status: Some("error".to_string()),
            message: None,
        };
        assert_eq!(err.to_string(), "Generation failed: status \"error\"");
        assert_eq!(err.kind(), FailureKind::Unsuccessful);

        let err = GenerationError::Unsuccessful {
            status: Some("success".to_string()),
            message: None,
        };
        assert!(err.to_string().contains("no images"));

        let err = GenerationError::Unsuccessful {
            status: Some("error".to_string()),
            message: Some("Invalid API key".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Generation failed: status \"error\": Invalid API key"
        );
    }

    #[test]
    fn test_decode_kind() {
        let json_err = serde_json::from_str::<serde_json::Value>("{\"status\":").unwrap_err();
        let err = GenerationError::Decode(json_err);
        assert_eq!(err.kind(), FailureKind::Decode);
        assert!(err.to_string().starts_with("Invalid API response"));
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_painter_error_messages() {
        assert!(PainterError::MissingApiKey
            .to_string()
            .contains("STABLE_DIFFUSION_API_KEY"));
        assert_eq!(
            PainterError::JobNotFound("ap_1234abcd".to_string()).to_string(),
            "Job not found: ap_1234abcd"
        );
        assert_eq!(
            PainterError::DownloadFailed("HTTP 404".to_string()).to_string(),
            "Download failed: HTTP 404"
        );
        assert_eq!(
            PainterError::InvalidState("busy".to_string()).to_string(),
            "Invalid state: busy"
        );
    }
}
