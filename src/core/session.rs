use super::error::{GenerationError, PainterError};
use super::request::{validate_prompt, GenerationRequest};
use super::result::GenerationResult;

/// Identifies one submission within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(u64);

impl Ticket {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Where the prompt/generate cycle currently is
#[derive(Debug)]
pub enum SessionState {
    Idle,
    Submitting { ticket: Ticket },
    Succeeded { image_urls: Vec<String> },
    Failed { error: GenerationError },
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Submitting { .. } => "submitting",
            SessionState::Succeeded { .. } => "succeeded",
            SessionState::Failed { .. } => "failed",
        }
    }
}

/// A request that the caller must now pass to the client
#[derive(Debug, Clone)]
pub struct Submission {
    pub ticket: Ticket,
    pub request: GenerationRequest,
}

/// Caller-side lifecycle around the generation client.
///
/// Only one submission is live at a time. Results are matched against the
/// live ticket so a late answer to an abandoned submission is ignored.
#[derive(Debug)]
pub struct Session {
    state: SessionState,
    last_request: Option<GenerationRequest>,
    next_ticket: u64,
    placeholder: String,
}

impl Session {
    pub fn new(placeholder: impl Into<String>) -> Self {
        Self {
            state: SessionState::Idle,
            last_request: None,
            next_ticket: 1,
            placeholder: placeholder.into(),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    /// Change the rejected placeholder text. Tickets keep counting up.
    pub fn set_placeholder(&mut self, placeholder: impl Into<String>) {
        self.placeholder = placeholder.into();
    }

    pub fn is_submitting(&self) -> bool {
        matches!(self.state, SessionState::Submitting { .. })
    }

    /// The request most recently submitted, kept for retry
    pub fn last_request(&self) -> Option<&GenerationRequest> {
        self.last_request.as_ref()
    }

    /// Validate `text` and enter `Submitting`.
    ///
    /// `build` turns the validated prompt into a request (it is where the
    /// caller's configuration is applied).
    pub fn submit<F>(&mut self, text: &str, build: F) -> Result<Submission, PainterError>
    where
        F: FnOnce(String) -> Result<GenerationRequest, PainterError>,
    {
        if self.is_submitting() {
            return Err(PainterError::InvalidState(
                "a generation is already in progress".to_string(),
            ));
        }

        let prompt = validate_prompt(text, &self.placeholder)?;
        let request = build(prompt)?;
        Ok(self.start(request))
    }

    /// Re-issue the last request after a failure
    pub fn retry(&mut self) -> Result<Submission, PainterError> {
        if !matches!(self.state, SessionState::Failed { .. }) {
            return Err(PainterError::InvalidState(format!(
                "cannot retry while {}",
                self.state.name()
            )));
        }

        let request = self
            .last_request
            .clone()
            .ok_or_else(|| PainterError::InvalidState("no request to retry".to_string()))?;
        Ok(self.start(request))
    }

    /// Apply a result. Returns `false` when the ticket is stale.
    pub fn complete(&mut self, ticket: Ticket, result: GenerationResult) -> bool {
        match self.state {
            SessionState::Submitting { ticket: live } if live == ticket => {}
            _ => {
                tracing::debug!("Dropping stale result for ticket {}", ticket.id());
                return false;
            }
        }

        self.state = match result {
            GenerationResult::Success { image_urls } => SessionState::Succeeded { image_urls },
            GenerationResult::Failure(error) => SessionState::Failed { error },
        };
        true
    }

    /// Return to `Idle`, abandoning any live submission
    pub fn cancel(&mut self) {
        self.state = SessionState::Idle;
    }

    fn start(&mut self, request: GenerationRequest) -> Submission {
        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;

        self.last_request = Some(request.clone());
        self.state = SessionState::Submitting { ticket };

        Submission { ticket, request }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::request::DEFAULT_PLACEHOLDER;

    fn build(prompt: String) -> Result<GenerationRequest, PainterError> {
        Ok(GenerationRequest::new("key", prompt))
    }

    fn unsuccessful() -> GenerationResult {
        GenerationResult::Failure(GenerationError::Unsuccessful {
            status: Some("error".to_string()),
            message: None,
        })
    }

    #[test]
    fn test_submit_and_succeed() {
        let mut session = Session::new(DEFAULT_PLACEHOLDER);
        let sub = session.submit(" a lighthouse ", build).unwrap();
        assert_eq!(sub.request.prompt(), "a lighthouse");
        assert!(session.is_submitting());

        let applied = session.complete(
            sub.ticket,
            GenerationResult::Success {
                image_urls: vec!["https://x/img.png".to_string()],
            },
        );
        assert!(applied);
        match session.state() {
            SessionState::Succeeded { image_urls } => {
                assert_eq!(image_urls, &vec!["https://x/img.png".to_string()])
            }
            other => panic!("unexpected state {}", other.name()),
        }
    }

    #[test]
    fn test_placeholder_and_empty_are_rejected() {
        let mut session = Session::new(DEFAULT_PLACEHOLDER);
        assert!(session.submit("", build).is_err());
        assert!(session.submit(DEFAULT_PLACEHOLDER, build).is_err());
        assert_eq!(session.state().name(), "idle");
        assert!(session.last_request().is_none());
    }

    #[test]
    fn test_no_overlapping_submissions() {
        let mut session = Session::new(DEFAULT_PLACEHOLDER);
        session.submit("first", build).unwrap();
        let err = session.submit("second", build).unwrap_err();
        assert!(matches!(err, PainterError::InvalidState(_)));
        assert_eq!(session.last_request().unwrap().prompt(), "first");
    }

    #[test]
    fn test_retry_reuses_request_with_new_ticket() {
        let mut session = Session::new(DEFAULT_PLACEHOLDER);
        let first = session.submit("a fox", build).unwrap();
        assert!(session.complete(first.ticket, unsuccessful()));
        assert_eq!(session.state().name(), "failed");

        let second = session.retry().unwrap();
        assert_eq!(second.request, first.request);
        assert!(second.ticket > first.ticket);
        assert!(session.is_submitting());
    }

    #[test]
    fn test_retry_only_from_failed() {
        let mut session = Session::new(DEFAULT_PLACEHOLDER);
        assert!(session.retry().is_err());

        let sub = session.submit("a fox", build).unwrap();
        assert!(session.retry().is_err());

        session.complete(
            sub.ticket,
            GenerationResult::Success {
                image_urls: vec!["u".to_string()],
            },
        );
        assert!(session.retry().is_err());
    }

    #[test]
    fn test_cancel_makes_result_stale() {
        let mut session = Session::new(DEFAULT_PLACEHOLDER);
        let abandoned = session.submit("a fox", build).unwrap();
        session.cancel();
        assert_eq!(session.state().name(), "idle");

        let live = session.submit("a wolf", build).unwrap();
        assert!(!session.complete(abandoned.ticket, unsuccessful()));
        assert!(session.is_submitting());

        assert!(session.complete(live.ticket, unsuccessful()));
        // A second delivery for the same ticket is ignored
        assert!(!session.complete(live.ticket, unsuccessful()));
    }

    #[test]
    fn test_set_placeholder_keeps_tickets_and_last_request() {
        let mut session = Session::new(DEFAULT_PLACEHOLDER);
        let abandoned = session.submit("a fox", build).unwrap();
        session.cancel();

        session.set_placeholder("Describe an image");
        assert_eq!(session.placeholder(), "Describe an image");
        assert_eq!(session.last_request().map(|r| r.prompt()), Some("a fox"));
        assert!(session.submit("Describe an image", build).is_err());

        let live = session.submit("a wolf", build).unwrap();
        assert!(live.ticket > abandoned.ticket);
        assert!(!session.complete(abandoned.ticket, unsuccessful()));
        assert!(session.is_submitting());
    }
}
