mod service;
mod state;

pub use service::{StageOrchestrator, SubmissionRun};
pub use state::{StageEvent, StageOutcome, StageState, TransitionError};
