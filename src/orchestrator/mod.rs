pub mod run;
pub mod state;
pub mod workflow;

pub use run::{
    AreaStatus, AreaVerification, FatalRecord, RunStatus, VerificationOutcome, WorkflowOptions,
    WorkflowRun,
};
pub use state::{RunSnapshot, RunStore};
pub use workflow::Orchestrator;
