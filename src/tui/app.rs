use anyhow::Result;
use async_channel::{Receiver, Sender};
use std::path::PathBuf;

use crate::api::DiffusionClient;
use crate::config::Config;
use crate::core::{GenerationResult, Job, PainterError, Session, SessionState, Submission, Ticket};
use crate::db::Database;

/// Application mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    /// Main view with history list
    Main,
    /// Prompt input mode
    Input,
    /// Viewing job details
    JobDetail,
    /// Settings screen
    Settings,
}

/// Settings field being edited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsField {
    Model,
    Endpoint,
    Timeout,
    NegativePrompt,
    OutputDirectory,
    AutoDownload,
    Placeholder,
}

impl SettingsField {
    pub fn all() -> &'static [SettingsField] {
        &[
            SettingsField::Model,
            SettingsField::Endpoint,
            SettingsField::Timeout,
            SettingsField::NegativePrompt,
            SettingsField::OutputDirectory,
            SettingsField::AutoDownload,
            SettingsField::Placeholder,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            SettingsField::Model => "Model",
            SettingsField::Endpoint => "Endpoint",
            SettingsField::Timeout => "Timeout (s)",
            SettingsField::NegativePrompt => "Negative Prompt",
            SettingsField::OutputDirectory => "Output Directory",
            SettingsField::AutoDownload => "Auto Download",
            SettingsField::Placeholder => "Placeholder",
        }
    }

    pub fn config_key(&self) -> &'static str {
        match self {
            SettingsField::Model => "api.model_id",
            SettingsField::Endpoint => "api.endpoint",
            SettingsField::Timeout => "api.timeout_secs",
            SettingsField::NegativePrompt => "defaults.negative_prompt",
            SettingsField::OutputDirectory => "output.directory",
            SettingsField::AutoDownload => "output.auto_download",
            SettingsField::Placeholder => "tui.placeholder",
        }
    }

    /// Changing this field requires a new HTTP client
    fn affects_client(&self) -> bool {
        matches!(self, SettingsField::Endpoint | SettingsField::Timeout)
    }
}

/// What a spawned generation task reports back
pub struct GenerationOutcome {
    pub ticket: Ticket,
    pub result: GenerationResult,
    /// (image index, saved path) for each downloaded image
    pub saved: Vec<(usize, PathBuf)>,
    pub download_error: Option<String>,
}

/// TUI application state
pub struct App {
    /// Current mode
    pub mode: AppMode,

    /// Configuration
    pub config: Config,

    /// Database
    pub db: Database,

    /// Generation client, rebuilt when its settings change
    pub client: DiffusionClient,

    /// Prompt/generate lifecycle
    pub session: Session,

    /// Job recorded for the live (or last) submission
    pub active_job: Option<Job>,

    /// Current prompt input
    pub input: String,

    /// Cursor position in input, in chars
    pub cursor_pos: usize,

    /// History list
    pub jobs: Vec<Job>,

    /// Selected job index
    pub selected_job: usize,

    /// Currently viewing job (for detail view)
    pub current_job: Option<Job>,

    /// Status message
    pub status_message: Option<String>,

    /// Error message
    pub error_message: Option<String>,

    /// Whether to quit
    pub should_quit: bool,

    /// Whether config was changed
    pub config_changed: bool,

    /// Settings: selected field index
    pub settings_selected: usize,

    /// Settings: currently editing
    pub settings_editing: bool,

    /// Settings: edit buffer
    pub settings_edit_buffer: String,

    /// Spinner frame counter
    pub tick: usize,

    outcome_tx: Sender<GenerationOutcome>,
    outcome_rx: Receiver<GenerationOutcome>,
}

impl App {
    pub fn new(config: Config, db: Database) -> Result<Self> {
        let client = DiffusionClient::from_config(&config.api)?;
        let session = Session::new(config.tui.placeholder.clone());
        let (outcome_tx, outcome_rx) = async_channel::unbounded();

        Ok(Self {
            mode: AppMode::Main,
            config,
            db,
            client,
            session,
            active_job: None,
            input: String::new(),
            cursor_pos: 0,
            jobs: Vec::new(),
            selected_job: 0,
            current_job: None,
            status_message: None,
            error_message: None,
            should_quit: false,
            config_changed: false,
            settings_selected: 0,
            settings_editing: false,
            settings_edit_buffer: String::new(),
            tick: 0,
            outcome_tx,
            outcome_rx,
        })
    }

    /// Load jobs from database
    pub fn load_jobs(&mut self) -> Result<()> {
        self.jobs = self.db.list_jobs(50, None)?;
        if self.selected_job >= self.jobs.len() && !self.jobs.is_empty() {
            self.selected_job = self.jobs.len() - 1;
        }
        Ok(())
    }

    /// Set status message
    pub fn set_status(&mut self, msg: impl Into<String>) {
        self.status_message = Some(msg.into());
        self.error_message = None;
    }

    /// Set error message
    pub fn set_error(&mut self, msg: impl Into<String>) {
        self.error_message = Some(msg.into());
        self.status_message = None;
    }

    /// Clear messages
    pub fn clear_messages(&mut self) {
        self.status_message = None;
        self.error_message = None;
    }

    /// Get the currently selected job
    pub fn selected_job(&self) -> Option<&Job> {
        self.jobs.get(self.selected_job)
    }

    /// Move selection up
    pub fn select_previous(&mut self) {
        if self.selected_job > 0 {
            self.selected_job -= 1;
        }
    }

    /// Move selection down
    pub fn select_next(&mut self) {
        if self.selected_job < self.jobs.len().saturating_sub(1) {
            self.selected_job += 1;
        }
    }

    /// Submit the prompt box. Invalid prompts leave the session idle.
    pub fn submit_prompt(&mut self) -> Result<()> {
        let config = &self.config;
        let submission = match self.session.submit(&self.input, |p| config.request_for(p)) {
            Ok(submission) => submission,
            Err(e) => {
                self.set_error(e.to_string());
                return Ok(());
            }
        };

        self.input.clear();
        self.cursor_pos = 0;
        self.mode = AppMode::Main;

        let job = Job::new(submission.request.clone());
        self.start(submission, job)
    }

    /// Re-issue the failed request
    pub fn retry(&mut self) -> Result<()> {
        let submission = match self.session.retry() {
            Ok(submission) => submission,
            Err(e) => {
                self.set_error(e.to_string());
                return Ok(());
            }
        };

        let job = match &self.active_job {
            Some(parent) => Job::retry_of(parent, submission.request.clone()),
            None => Job::new(submission.request.clone()),
        };
        self.start(submission, job)
    }

    /// Run a history entry again with its stored parameters
    pub fn resubmit(&mut self, parent: &Job) -> Result<()> {
        let config = &self.config;
        let submitted = self.session.submit(parent.request.prompt(), |_| {
            let key = config.api_key().ok_or(PainterError::MissingApiKey)?;
            Ok(parent.request.clone().with_api_key(key))
        });
        let submission = match submitted {
            Ok(submission) => submission,
            Err(e) => {
                self.set_error(e.to_string());
                return Ok(());
            }
        };

        let job = Job::retry_of(parent, submission.request.clone());
        self.start(submission, job)
    }

    /// Leave the result/error overlay, abandoning a live submission
    pub fn cancel(&mut self) -> Result<()> {
        if self.session.is_submitting() {
            if let Some(job) = self.active_job.as_mut() {
                job.set_cancelled();
                self.db.update_job(job)?;
            }
            self.set_status("Generation cancelled");
            self.load_jobs()?;
        }
        self.session.cancel();
        Ok(())
    }

    fn start(&mut self, submission: Submission, mut job: Job) -> Result<()> {
        job.set_running();
        self.db.insert_job(&job)?;

        self.set_status(format!("Generating: {}", job.prompt_preview(60)));
        self.spawn_generation(submission, &job);
        self.active_job = Some(job);
        self.load_jobs()?;
        Ok(())
    }

    fn spawn_generation(&self, submission: Submission, job: &Job) {
        let client = self.client.clone();
        let tx = self.outcome_tx.clone();
        let download_to = self
            .config
            .output
            .auto_download
            .then(|| PathBuf::from(&self.config.output.directory));
        let job_id = job.id.clone();

        tokio::spawn(async move {
            let Submission { ticket, request } = submission;
            let result = client.generate(&request).await;

            let mut saved = Vec::new();
            let mut download_error = None;
            if let Some(dir) = download_to.filter(|_| result.is_success()) {
                for (index, url) in result.image_urls().iter().enumerate() {
                    let stem = format!("{}_{}", job_id, index);
                    match client.download_image(url, &dir, &stem).await {
                        Ok(path) => saved.push((index, path)),
                        Err(e) => download_error = Some(format!("{:#}", e)),
                    }
                }
            }

            let outcome = GenerationOutcome {
                ticket,
                result,
                saved,
                download_error,
            };
            if tx.send(outcome).await.is_err() {
                tracing::debug!("TUI closed before generation finished");
            }
        });
    }

    /// Apply finished generations. Stale outcomes are dropped.
    pub fn poll_outcomes(&mut self) -> Result<()> {
        while let Ok(outcome) = self.outcome_rx.try_recv() {
            self.apply_outcome(outcome)?;
        }
        Ok(())
    }

    fn apply_outcome(&mut self, outcome: GenerationOutcome) -> Result<()> {
        let live = matches!(
            self.session.state(),
            SessionState::Submitting { ticket } if *ticket == outcome.ticket
        );
        if !live {
            tracing::debug!("Ignoring outcome for stale ticket {}", outcome.ticket.id());
            return Ok(());
        }

        if let Some(job) = self.active_job.as_mut() {
            job.apply_result(&outcome.result);
            for (index, path) in &outcome.saved {
                job.set_image_path(*index, path.to_string_lossy());
            }
            self.db.update_job(job)?;
        }

        match (&outcome.result, &outcome.download_error) {
            (GenerationResult::Success { .. }, Some(err)) => {
                self.set_error(format!("Generated, but download failed: {}", err))
            }
            (GenerationResult::Success { .. }, None) => self.set_status(format!(
                "Generation complete: {}",
                outcome.result.first_image_url().unwrap_or_default()
            )),
            (GenerationResult::Failure(err), _) => self.set_error(err.to_string()),
        }

        self.session.complete(outcome.ticket, outcome.result);
        self.load_jobs()?;
        Ok(())
    }

    /// Saved path of the first image of the active job
    pub fn active_image_path(&self) -> Option<&str> {
        self.active_job
            .as_ref()
            .and_then(|job| job.images.first())
            .and_then(|img| img.path.as_deref())
    }

    /// Get current settings value
    pub fn get_settings_value(&self, field: &SettingsField) -> String {
        self.config.get(field.config_key()).unwrap_or_default()
    }

    /// Set settings value
    pub fn set_settings_value(&mut self, field: &SettingsField, value: &str) -> Result<()> {
        self.config.set(field.config_key(), value)?;
        self.config_changed = true;

        if field.affects_client() {
            self.client = DiffusionClient::from_config(&self.config.api)?;
        }
        if *field == SettingsField::Placeholder {
            self.session.set_placeholder(self.config.tui.placeholder.clone());
        }
        Ok(())
    }

    /// Get options for a settings field (if applicable)
    pub fn get_settings_options(&self, field: &SettingsField) -> Option<Vec<&'static str>> {
        match field {
            SettingsField::Model => Some(Config::models().to_vec()),
            SettingsField::AutoDownload => Some(vec!["true", "false"]),
            _ => None,
        }
    }

    /// Cycle to next option for a settings field
    pub fn cycle_settings_option(&mut self, field: &SettingsField) -> Result<()> {
        if let Some(options) = self.get_settings_options(field) {
            let current = self.get_settings_value(field);
            let current_idx = options.iter().position(|&o| o == current).unwrap_or(0);
            let next_idx = (current_idx + 1) % options.len();
            self.set_settings_value(field, options[next_idx])?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::GenerationError;

    fn app() -> App {
        let mut config = Config::default();
        config.api.key = Some("test-key".to_string());
        config.output.auto_download = false;
        App::new(config, Database::open_in_memory().unwrap()).unwrap()
    }

    fn outcome(ticket: Ticket, result: GenerationResult) -> GenerationOutcome {
        GenerationOutcome {
            ticket,
            result,
            saved: Vec::new(),
            download_error: None,
        }
    }

    #[tokio::test]
    async fn test_placeholder_prompt_is_not_submitted() {
        let mut app = app();
        app.input = "Enter your prompt".to_string();
        app.submit_prompt().unwrap();

        assert!(!app.session.is_submitting());
        assert!(app.error_message.is_some());
        assert_eq!(app.db.count_jobs().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_stale_outcome_is_ignored() {
        let mut app = app();
        // Point at a closed port so the spawned request fails fast
        app.client = DiffusionClient::new(reqwest::Client::new(), "http://127.0.0.1:9/gen");

        app.input = "a fox".to_string();
        app.submit_prompt().unwrap();
        let SessionState::Submitting { ticket: first } = *app.session.state() else {
            panic!("expected submitting");
        };
        app.cancel().unwrap();
        assert_eq!(app.active_job.as_ref().unwrap().status_name(), "cancelled");

        app.input = "a wolf".to_string();
        app.submit_prompt().unwrap();

        app.apply_outcome(outcome(
            first,
            GenerationResult::Success {
                image_urls: vec!["https://x/old.png".to_string()],
            },
        ))
        .unwrap();
        assert!(app.session.is_submitting());
        assert!(app.active_job.as_ref().unwrap().images.is_empty());
    }

    #[tokio::test]
    async fn test_resubmit_history_entry() {
        let mut app = app();
        app.client = DiffusionClient::new(reqwest::Client::new(), "http://127.0.0.1:9/gen");

        let parent = Job::new(
            crate::core::GenerationRequest::new("old-key", "a red barn")
                .with_negative_prompt("fog")
                .with_model("sdxl"),
        );
        app.db.insert_job(&parent).unwrap();

        app.resubmit(&parent).unwrap();
        assert!(app.session.is_submitting());
        let job = app.active_job.as_ref().unwrap();
        assert_eq!(job.parent_id.as_deref(), Some(parent.id.as_str()));
        assert_eq!(job.request.api_key(), "test-key");
        assert_eq!(job.request.model_id(), "sdxl");
        assert_eq!(job.request.negative_prompt(), Some("fog"));
        assert_eq!(app.db.count_jobs().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_placeholder_change_keeps_stale_guard() {
        let mut app = app();
        app.client = DiffusionClient::new(reqwest::Client::new(), "http://127.0.0.1:9/gen");

        app.input = "a fox".to_string();
        app.submit_prompt().unwrap();
        let SessionState::Submitting { ticket: abandoned } = *app.session.state() else {
            panic!("expected submitting");
        };
        app.cancel().unwrap();

        app.set_settings_value(&SettingsField::Placeholder, "Describe an image")
            .unwrap();
        assert_eq!(app.session.placeholder(), "Describe an image");

        app.input = "a wolf".to_string();
        app.submit_prompt().unwrap();
        let SessionState::Submitting { ticket: live } = *app.session.state() else {
            panic!("expected submitting");
        };
        assert_ne!(abandoned, live);

        app.apply_outcome(outcome(
            abandoned,
            GenerationResult::Success {
                image_urls: vec!["https://x/fox.png".to_string()],
            },
        ))
        .unwrap();
        assert!(app.session.is_submitting());
        let job = app.active_job.as_ref().unwrap();
        assert_eq!(job.request.prompt(), "a wolf");
        assert!(job.images.is_empty());
    }

    #[tokio::test]
    async fn test_failure_then_retry_links_jobs() {
        let mut app = app();
        app.client = DiffusionClient::new(reqwest::Client::new(), "http://127.0.0.1:9/gen");

        app.input = "a lighthouse".to_string();
        app.submit_prompt().unwrap();
        let SessionState::Submitting { ticket } = *app.session.state() else {
            panic!("expected submitting");
        };
        app.apply_outcome(outcome(
            ticket,
            GenerationResult::Failure(GenerationError::Unsuccessful {
                status: Some("error".to_string()),
                message: None,
            }),
        ))
        .unwrap();
        assert_eq!(app.session.state().name(), "failed");
        let failed_id = app.active_job.as_ref().unwrap().id.clone();
        assert_eq!(app.db.get_job(&failed_id).unwrap().unwrap().status_name(), "failed");

        app.retry().unwrap();
        assert!(app.session.is_submitting());
        let retry = app.active_job.as_ref().unwrap();
        assert_eq!(retry.parent_id.as_deref(), Some(failed_id.as_str()));
        assert_eq!(retry.request.prompt(), "a lighthouse");
    }
}
