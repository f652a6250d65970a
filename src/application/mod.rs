//! Application services: submission orchestration, transition control,
//! report rendering.

pub mod orchestrator;
pub mod reporting;
pub mod workflow;

pub use orchestrator::{CancelError, JobOrchestrator, NewSubmission, SubmitError};
pub use workflow::JobWorkflow;
