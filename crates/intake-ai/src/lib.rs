//! AI layer: coach response parsing, prompt construction, the LLM
//! completion boundary, and the per-turn coach runner.

pub mod coach;
pub mod llm;
pub mod prompt;
pub mod turn;

pub use coach::parse_coach_response;
pub use llm::{CompletionRequest, CompletionService, HttpCompletionClient, LlmError};
pub use prompt::{COACH_SYSTEM_PROMPT, build_turn_prompt};
pub use turn::{Coach, CoachConfig, TurnOutcome};
