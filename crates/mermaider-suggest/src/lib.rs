pub mod engine;
pub mod error;
pub mod parse;
pub mod pipeline;
pub mod prompt;

pub use engine::{ChatBackend, LlmBackend};
pub use error::SuggestError;
pub use pipeline::{
    Pipeline, PipelineRun, RepairMethod, RepairReport, SharedPipeline, Step, StepOutcome,
    StepReport, Stepped,
};
