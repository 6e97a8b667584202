pub mod orchestrator;
pub mod prompt;
pub mod reasoning;

pub use orchestrator::{
    DEFAULT_STATUS_DELAY, TurnConfig, TurnOutcome, TurnSink, TurnStatus, run_turn,
};
pub use reasoning::{Confidence, ReasoningConfig, ReasoningEngine, ReasoningResult};
