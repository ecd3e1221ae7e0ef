//! Case records: identity, lifecycle status, intake answers, facts, outputs.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::facts::{FactField, FactSet, Parties, non_empty};

/// Opaque, immutable case identifier (a UUID v4 string).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaseId(String);

impl CaseId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<String> for CaseId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CaseId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown {kind}: {value:?}")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

/// Where a case is in the guided flow.
///
/// Progression is `interview` → `summary` → `roadmap`, but the order is not
/// enforced here; callers sequence transitions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseStatus {
    #[default]
    Interview,
    Summary,
    Roadmap,
}

impl CaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Interview => "interview",
            Self::Summary => "summary",
            Self::Roadmap => "roadmap",
        }
    }
}

impl FromStr for CaseStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "interview" => Ok(Self::Interview),
            "summary" => Ok(Self::Summary),
            "roadmap" => Ok(Self::Roadmap),
            _ => Err(UnknownVariant {
                kind: "case status",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Predefined generated artifacts a case can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutputKind {
    CaseSummary,
    Roadmap,
    HearingScript,
    EvidenceChecklist,
    SafetyPlan,
}

impl OutputKind {
    pub const ALL: [OutputKind; 5] = [
        Self::CaseSummary,
        Self::Roadmap,
        Self::HearingScript,
        Self::EvidenceChecklist,
        Self::SafetyPlan,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CaseSummary => "caseSummary",
            Self::Roadmap => "roadmap",
            Self::HearingScript => "hearingScript",
            Self::EvidenceChecklist => "evidenceChecklist",
            Self::SafetyPlan => "safetyPlan",
        }
    }

    /// Human-readable label for display.
    pub fn label(&self) -> &'static str {
        match self {
            Self::CaseSummary => "Case summary",
            Self::Roadmap => "Roadmap",
            Self::HearingScript => "Hearing script",
            Self::EvidenceChecklist => "Evidence checklist",
            Self::SafetyPlan => "Safety plan",
        }
    }
}

impl FromStr for OutputKind {
    type Err = UnknownVariant;

    /// Accepts `hearingScript`, `hearing_script` and `hearing-script`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .flat_map(char::to_lowercase)
            .collect();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().to_ascii_lowercase() == key)
            .ok_or_else(|| UnknownVariant {
                kind: "output kind",
                value: s.to_string(),
            })
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

pub type CaseOutputs = BTreeMap<OutputKind, String>;

/// Safety-status answers that mean the litigant reports being safe.
const SAFE_ANSWERS: &[&str] = &["safe", "safe now", "i am safe", "i'm safe", "yes"];

/// First-screen answers a case is created from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntakeAnswers {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safety_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub petitioner_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub respondent_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incident_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relief_sought: Vec<String>,
}

impl IntakeAnswers {
    /// True when the safety answer is one of the "I am safe" responses.
    pub fn reports_safe(&self) -> bool {
        self.safety_status
            .as_deref()
            .map(|s| SAFE_ANSWERS.contains(&s.trim().to_lowercase().as_str()))
            .unwrap_or(false)
    }

    /// Initial facts derived from the answers.
    pub fn seed_facts(&self) -> FactSet {
        let safety_concerns = match trimmed(&self.safety_status) {
            Some(status) if !self.reports_safe() => Some(vec![format!("Safety status: {status}")]),
            _ => None,
        };
        FactSet {
            parties: Parties {
                petitioner: trimmed(&self.petitioner_name),
                respondent: trimmed(&self.respondent_name),
            },
            relationship: trimmed(&self.relationship_category),
            incidents: trimmed(&self.incident_summary).map(|s| vec![s]),
            safety_concerns,
            requested_relief: non_empty(
                self.relief_sought
                    .iter()
                    .map(|r| r.trim())
                    .filter(|r| !r.is_empty())
                    .map(str::to_string)
                    .collect(),
            ),
            evidence_list: None,
            timeline: None,
        }
    }
}

fn trimmed(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// One litigant's intake record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Case {
    pub id: CaseId,
    pub status: CaseStatus,
    #[serde(default)]
    pub answers: IntakeAnswers,
    #[serde(default)]
    pub facts: FactSet,
    #[serde(default)]
    pub outputs: CaseOutputs,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Case {
    /// A fresh case in `interview` with facts seeded from `answers`.
    pub fn new(answers: IntakeAnswers) -> Self {
        let now = Utc::now();
        Self {
            id: CaseId::generate(),
            status: CaseStatus::Interview,
            facts: answers.seed_facts(),
            answers,
            outputs: CaseOutputs::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Refresh `updated_at`. The new value is always strictly later than the
    /// previous one, even when the clock has not advanced.
    pub fn touch(&mut self) {
        let now = Utc::now();
        self.updated_at = if now > self.updated_at {
            now
        } else {
            self.updated_at + TimeDelta::milliseconds(1)
        };
    }

    /// Fields the interview still needs, including the safety answer.
    pub fn missing_fields(&self) -> Vec<FactField> {
        let mut missing = self.facts.missing_fields();
        if trimmed(&self.answers.safety_status).is_none() {
            missing.push(FactField::SafetyStatus);
        }
        missing
    }
}
