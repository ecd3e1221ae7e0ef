//! The snapshot document: every case plus the active case id.
//!
//! The same JSON shape is written to the local snapshot file and pushed to
//! remote storage, so it must round-trip without losing any fact or output.

use intake_core::{Case, CaseId};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::StoreError;

pub const SNAPSHOT_VERSION: u32 = 1;

fn current_version() -> u32 {
    SNAPSHOT_VERSION
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    #[serde(default = "current_version")]
    pub version: u32,
    /// Cases in creation order.
    #[serde(default)]
    pub cases: Vec<Case>,
    #[serde(default)]
    pub active_case_id: Option<CaseId>,
}

impl Default for StoreSnapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            cases: Vec::new(),
            active_case_id: None,
        }
    }
}

impl StoreSnapshot {
    pub fn to_json(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a snapshot, rejecting newer versions and repairing an active id
    /// that points at no case.
    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        let snapshot: Self = serde_json::from_str(json)?;
        if snapshot.version > SNAPSHOT_VERSION {
            return Err(StoreError::UnsupportedVersion(snapshot.version));
        }
        Ok(snapshot.repaired())
    }

    /// Clear `active_case_id` if it references a case that does not exist.
    pub fn repaired(mut self) -> Self {
        if let Some(active) = &self.active_case_id {
            if !self.cases.iter().any(|c| &c.id == active) {
                warn!(case_id = %active, "snapshot active case missing, clearing");
                self.active_case_id = None;
            }
        }
        self
    }

    pub fn case(&self, id: &CaseId) -> Option<&Case> {
        self.cases.iter().find(|c| &c.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intake_core::{
        FactSet, IntakeAnswers, OutputKind, Parties, TimelineEntry, merge_facts,
    };

    fn populated() -> StoreSnapshot {
        let mut first = Case::new(IntakeAnswers {
            relationship_category: Some("Spouse".into()),
            safety_status: Some("Not safe".into()),
            petitioner_name: Some("Ana".into()),
            relief_sought: vec!["Stay-away order".into()],
            ..Default::default()
        });
        first.facts = merge_facts(
            &first.facts,
            Some(&FactSet {
                parties: Parties {
                    petitioner: None,
                    respondent: Some("Mark".into()),
                },
                incidents: Some(vec!["Threatened me with a rifle".into()]),
                evidence_list: Some(vec!["Voicemail".into(), "Photos".into()]),
                timeline: Some(vec![
                    TimelineEntry::new(Some("2024-02-10".into()), "Moved out"),
                    TimelineEntry::new(None, "Threat by phone"),
                ]),
                ..Default::default()
            }),
        );
        first
            .outputs
            .insert(OutputKind::HearingScript, "Good morning, your honour.".into());
        first
            .outputs
            .insert(OutputKind::EvidenceChecklist, "- voicemail\n- photos".into());
        first.touch();
        let second = Case::new(IntakeAnswers::default());
        StoreSnapshot {
            version: SNAPSHOT_VERSION,
            active_case_id: Some(first.id.clone()),
            cases: vec![first, second],
        }
    }

    #[test]
    fn serialise_deserialise_serialise_is_identical() {
        let snapshot = populated();
        let first = snapshot.to_json().unwrap();
        let restored = StoreSnapshot::from_json(&first).unwrap();
        let second = restored.to_json().unwrap();
        assert_eq!(first, second);
        assert_eq!(restored, snapshot);
    }

    #[test]
    fn pretty_form_parses_to_the_same_value() {
        let snapshot = populated();
        let pretty = snapshot.to_json_pretty().unwrap();
        assert_eq!(StoreSnapshot::from_json(&pretty).unwrap(), snapshot);
    }

    #[test]
    fn empty_document_is_an_empty_store() {
        let snapshot = StoreSnapshot::from_json("{}").unwrap();
        assert_eq!(snapshot, StoreSnapshot::default());
    }

    #[test]
    fn dangling_active_id_is_cleared() {
        let json = r#"{"version":1,"cases":[],"activeCaseId":"gone"}"#;
        let snapshot = StoreSnapshot::from_json(json).unwrap();
        assert!(snapshot.active_case_id.is_none());
    }

    #[test]
    fn newer_version_is_rejected() {
        let json = r#"{"version":99,"cases":[]}"#;
        assert!(matches!(
            StoreSnapshot::from_json(json),
            Err(StoreError::UnsupportedVersion(99))
        ));
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(
            StoreSnapshot::from_json("{not json"),
            Err(StoreError::Json(_))
        ));
    }
}
