//! Fact model: the structured extraction of a litigant's situation.
//!
//! Every sequence field is either absent (not yet known) or non-empty.
//! Empty sequences are normalised to `None` when deserialised and are never
//! written out, so "unknown" and "explicitly cleared" cannot be confused.

use serde::{Deserialize, Deserializer, Serialize};

/// The two sides of the case. Each name is independently optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub petitioner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub respondent: Option<String>,
}

impl Parties {
    pub fn is_empty(&self) -> bool {
        self.petitioner.is_none() && self.respondent.is_none()
    }
}

/// One dated (or merely ordered) event in the case timeline.
///
/// Deserialises from either `{"date": "...", "description": "..."}` or a bare
/// string, which becomes an entry without a date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "TimelineRepr")]
pub struct TimelineEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    pub description: String,
}

impl TimelineEntry {
    pub fn new(date: Option<String>, description: impl Into<String>) -> Self {
        Self {
            date,
            description: description.into(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TimelineRepr {
    Text(String),
    Entry {
        #[serde(default)]
        date: Option<String>,
        #[serde(alias = "event")]
        description: String,
    },
}

impl From<TimelineRepr> for TimelineEntry {
    fn from(repr: TimelineRepr) -> Self {
        match repr {
            TimelineRepr::Text(description) => Self {
                date: None,
                description,
            },
            TimelineRepr::Entry { date, description } => Self { date, description },
        }
    }
}

/// Structured facts about a case. Also used as the *partial* fact set an
/// AI turn extracts: any subset of fields may be present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactSet {
    #[serde(default, skip_serializing_if = "Parties::is_empty")]
    pub parties: Parties,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship: Option<String>,
    #[serde(
        default,
        deserialize_with = "non_empty_seq",
        skip_serializing_if = "Option::is_none"
    )]
    pub incidents: Option<Vec<String>>,
    #[serde(
        default,
        deserialize_with = "non_empty_seq",
        skip_serializing_if = "Option::is_none"
    )]
    pub safety_concerns: Option<Vec<String>>,
    #[serde(
        default,
        deserialize_with = "non_empty_seq",
        skip_serializing_if = "Option::is_none"
    )]
    pub requested_relief: Option<Vec<String>>,
    #[serde(
        default,
        deserialize_with = "non_empty_seq",
        skip_serializing_if = "Option::is_none"
    )]
    pub evidence_list: Option<Vec<String>>,
    #[serde(
        default,
        deserialize_with = "non_empty_seq",
        skip_serializing_if = "Option::is_none"
    )]
    pub timeline: Option<Vec<TimelineEntry>>,
}

impl FactSet {
    /// True when no field carries a value.
    pub fn is_empty(&self) -> bool {
        self.parties.is_empty()
            && self.relationship.is_none()
            && self.incidents.is_none()
            && self.safety_concerns.is_none()
            && self.requested_relief.is_none()
            && self.evidence_list.is_none()
            && self.timeline.is_none()
    }

    /// Enforce the absent-or-non-empty invariant on a hand-built value.
    pub fn normalized(mut self) -> Self {
        self.incidents = self.incidents.and_then(non_empty);
        self.safety_concerns = self.safety_concerns.and_then(non_empty);
        self.requested_relief = self.requested_relief.and_then(non_empty);
        self.evidence_list = self.evidence_list.and_then(non_empty);
        self.timeline = self.timeline.and_then(non_empty);
        self
    }

    /// Fact fields with no value yet. Safety status lives on the intake
    /// answers, so it is never reported from here.
    pub fn missing_fields(&self) -> Vec<FactField> {
        let mut missing = Vec::new();
        if self.parties.petitioner.is_none() {
            missing.push(FactField::PetitionerName);
        }
        if self.parties.respondent.is_none() {
            missing.push(FactField::RespondentName);
        }
        if self.relationship.is_none() {
            missing.push(FactField::RelationshipCategory);
        }
        if self.incidents.is_none() {
            missing.push(FactField::Incidents);
        }
        if self.safety_concerns.is_none() {
            missing.push(FactField::SafetyConcerns);
        }
        if self.requested_relief.is_none() {
            missing.push(FactField::RequestedRelief);
        }
        if self.evidence_list.is_none() {
            missing.push(FactField::EvidenceList);
        }
        if self.timeline.is_none() {
            missing.push(FactField::Timeline);
        }
        missing
    }
}

/// `Some(v)` when `v` has at least one element.
pub fn non_empty<T>(v: Vec<T>) -> Option<Vec<T>> {
    if v.is_empty() { None } else { Some(v) }
}

fn non_empty_seq<'de, D, T>(de: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let seq = Option::<Vec<T>>::deserialize(de)?;
    Ok(seq.and_then(non_empty))
}

/// Identifiers of the facts an interview still needs.
///
/// This is the closed vocabulary for `missing_fields`; model output naming
/// anything else is dropped by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactField {
    PetitionerName,
    RespondentName,
    RelationshipCategory,
    SafetyStatus,
    Incidents,
    SafetyConcerns,
    RequestedRelief,
    EvidenceList,
    Timeline,
}

impl FactField {
    pub const ALL: [FactField; 9] = [
        Self::PetitionerName,
        Self::RespondentName,
        Self::RelationshipCategory,
        Self::SafetyStatus,
        Self::Incidents,
        Self::SafetyConcerns,
        Self::RequestedRelief,
        Self::EvidenceList,
        Self::Timeline,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PetitionerName => "petitioner_name",
            Self::RespondentName => "respondent_name",
            Self::RelationshipCategory => "relationship_category",
            Self::SafetyStatus => "safety_status",
            Self::Incidents => "incidents",
            Self::SafetyConcerns => "safety_concerns",
            Self::RequestedRelief => "requested_relief",
            Self::EvidenceList => "evidence_list",
            Self::Timeline => "timeline",
        }
    }

    /// Resolve an identifier as a model might spell it: snake_case,
    /// camelCase, dotted (`parties.petitioner`) or a short alias.
    pub fn from_identifier(s: &str) -> Option<Self> {
        let key: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' ' | '.'))
            .flat_map(char::to_lowercase)
            .collect();
        let key = key.strip_prefix("parties").unwrap_or(&key);
        let field = match key {
            "petitionername" | "petitioner" => Self::PetitionerName,
            "respondentname" | "respondent" => Self::RespondentName,
            "relationshipcategory" | "relationship" => Self::RelationshipCategory,
            "safetystatus" => Self::SafetyStatus,
            "incidents" | "incident" => Self::Incidents,
            "safetyconcerns" => Self::SafetyConcerns,
            "requestedrelief" | "relief" => Self::RequestedRelief,
            "evidencelist" | "evidence" => Self::EvidenceList,
            "timeline" => Self::Timeline,
            _ => return None,
        };
        Some(field)
    }
}

impl std::fmt::Display for FactField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
