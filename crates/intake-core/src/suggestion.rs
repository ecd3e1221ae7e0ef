use serde::{Deserialize, Serialize};

use crate::facts::{FactField, FactSet};

/// Flag a model sets when the conversation indicates imminent danger.
pub const IMMEDIATE_DANGER_FLAG: &str = "immediate_danger";

/// The structured part of one coach (model) turn.
///
/// Built by the response parser, consumed by the fact merge, never persisted
/// on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoachSuggestion {
    pub assistant_message: String,
    pub next_questions: Vec<String>,
    pub extracted_facts: FactSet,
    pub missing_fields: Vec<FactField>,
    /// UI hint only; completion is decided by the facts, not by this number.
    pub progress_percent: u8,
    pub safety_flags: Vec<String>,
}

impl CoachSuggestion {
    pub fn has_immediate_danger(&self) -> bool {
        self.safety_flags
            .iter()
            .any(|flag| flag.eq_ignore_ascii_case(IMMEDIATE_DANGER_FLAG))
    }
}
