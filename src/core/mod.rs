pub mod error;
pub mod job;
pub mod request;
pub mod result;
pub mod session;

pub use error::{FailureKind, GenerationError, PainterError};
pub use job::{Job, JobImage, JobStatus};
pub use request::{validate_prompt, GenerationRequest};
pub use result::GenerationResult;
pub use session::{Session, SessionState, Submission, Ticket};
