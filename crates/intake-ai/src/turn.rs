//! One interview turn: safety check, completion, parse.

use intake_core::{Case, CoachSuggestion, DangerSignal, danger_signals};
use tracing::{info, warn};

use crate::coach::parse_coach_response;
use crate::llm::{CompletionRequest, CompletionService, LlmError};
use crate::prompt::{COACH_SYSTEM_PROMPT, build_turn_prompt};

#[derive(Debug, Clone, PartialEq)]
pub struct CoachConfig {
    pub max_tokens: u32,
    pub temperature: f32,
    pub model: Option<String>,
}

impl Default for CoachConfig {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            temperature: 0.2,
            model: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// The user may be in immediate danger. Show the safety interruption
    /// before anything else. `suggestion` is set when the model raised the
    /// flag, so its facts can still be merged.
    SafetyInterrupt {
        signals: Vec<DangerSignal>,
        suggestion: Option<CoachSuggestion>,
    },
    Suggestion(CoachSuggestion),
    /// The model answered but no suggestion could be parsed from it.
    RawReply(String),
}

pub struct Coach<C> {
    service: C,
    config: CoachConfig,
}

impl<C: CompletionService> Coach<C> {
    pub fn new(service: C) -> Self {
        Self {
            service,
            config: CoachConfig::default(),
        }
    }

    pub fn with_config(mut self, config: CoachConfig) -> Self {
        self.config = config;
        self
    }

    pub async fn turn(&self, case: &Case, user_text: &str) -> Result<TurnOutcome, LlmError> {
        let signals = danger_signals(user_text);
        if !signals.is_empty() {
            warn!(case_id = %case.id, ?signals, "danger language in answer, interrupting");
            return Ok(TurnOutcome::SafetyInterrupt {
                signals,
                suggestion: None,
            });
        }

        let request = CompletionRequest {
            system: Some(COACH_SYSTEM_PROMPT.to_string()),
            prompt: build_turn_prompt(case, user_text),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            model: self.config.model.clone(),
        };
        let reply = self.service.complete(&request).await?;

        let Some(suggestion) = parse_coach_response(&reply) else {
            warn!(case_id = %case.id, chars = reply.len(), "coach reply not parseable");
            return Ok(TurnOutcome::RawReply(reply));
        };
        if suggestion.has_immediate_danger() {
            warn!(case_id = %case.id, "coach flagged immediate danger");
            return Ok(TurnOutcome::SafetyInterrupt {
                signals: Vec::new(),
                suggestion: Some(suggestion),
            });
        }

        info!(
            case_id = %case.id,
            progress = suggestion.progress_percent,
            questions = suggestion.next_questions.len(),
            "coach turn complete"
        );
        Ok(TurnOutcome::Suggestion(suggestion))
    }
}
