//! Core types for the guided intake engine: the case and fact model, the
//! coach suggestion shape, fact merging, and immediate-danger detection.

pub mod case;
pub mod facts;
pub mod merge;
pub mod safety;
pub mod suggestion;

pub use case::{Case, CaseId, CaseOutputs, CaseStatus, IntakeAnswers, OutputKind, UnknownVariant};
pub use facts::{FactField, FactSet, Parties, TimelineEntry};
pub use merge::merge_facts;
pub use safety::{DangerSignal, danger_signals, detect_immediate_danger};
pub use suggestion::{CoachSuggestion, IMMEDIATE_DANGER_FLAG};
