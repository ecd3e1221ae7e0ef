//! Fact merge: fold an AI-extracted partial fact set into the current one.
//!
//! The policy is additive and never regresses:
//!
//! - Scalar fields (`parties.petitioner`, `parties.respondent`,
//!   `relationship`) are overwritten field by field. A missing or blank
//!   incoming value keeps the current one.
//! - Sequence fields are replaced wholesale, but only by a non-empty
//!   incoming sequence. A model omitting a field in one turn does not mean
//!   the field is now empty.
//!
//! Known limitation: a non-empty incoming sequence replaces rather than
//! appends, so entries the model forgot to repeat are dropped.

use tracing::trace;

use crate::facts::{FactSet, Parties};

/// Merge `incoming` over `current`, returning a new fact set.
///
/// With no incoming facts the result equals `current`. Neither input is
/// modified.
pub fn merge_facts(current: &FactSet, incoming: Option<&FactSet>) -> FactSet {
    let Some(incoming) = incoming else {
        return current.clone();
    };

    FactSet {
        parties: Parties {
            petitioner: merge_scalar(&current.parties.petitioner, &incoming.parties.petitioner),
            respondent: merge_scalar(&current.parties.respondent, &incoming.parties.respondent),
        },
        relationship: merge_scalar(&current.relationship, &incoming.relationship),
        incidents: merge_seq("incidents", &current.incidents, &incoming.incidents),
        safety_concerns: merge_seq(
            "safetyConcerns",
            &current.safety_concerns,
            &incoming.safety_concerns,
        ),
        requested_relief: merge_seq(
            "requestedRelief",
            &current.requested_relief,
            &incoming.requested_relief,
        ),
        evidence_list: merge_seq(
            "evidenceList",
            &current.evidence_list,
            &incoming.evidence_list,
        ),
        timeline: merge_seq("timeline", &current.timeline, &incoming.timeline),
    }
}

fn merge_scalar(current: &Option<String>, incoming: &Option<String>) -> Option<String> {
    match incoming.as_deref().map(str::trim) {
        Some(value) if !value.is_empty() => Some(value.to_string()),
        _ => current.clone(),
    }
}

fn merge_seq<T: Clone>(
    field: &'static str,
    current: &Option<Vec<T>>,
    incoming: &Option<Vec<T>>,
) -> Option<Vec<T>> {
    match incoming {
        Some(items) if !items.is_empty() => Some(items.clone()),
        _ => {
            trace!(field, "no incoming entries, keeping current sequence");
            current.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::TimelineEntry;
    use proptest::collection::vec;
    use proptest::option;
    use proptest::prelude::*;

    fn sample() -> FactSet {
        FactSet {
            parties: Parties {
                petitioner: Some("Ana".into()),
                respondent: Some("Mark".into()),
            },
            relationship: Some("Former spouse".into()),
            incidents: Some(vec!["Shoved me in March".into()]),
            safety_concerns: Some(vec!["Owns a rifle".into()]),
            requested_relief: Some(vec!["Stay-away order".into()]),
            evidence_list: Some(vec!["Text messages".into()]),
            timeline: Some(vec![TimelineEntry::new(
                Some("2024-03-02".into()),
                "Shoving incident",
            )]),
        }
    }

    #[test]
    fn absent_incoming_is_identity() {
        let current = sample();
        assert_eq!(merge_facts(&current, None), current);
        let empty = FactSet::default();
        assert_eq!(merge_facts(&empty, None), empty);
    }

    #[test]
    fn empty_incoming_changes_nothing() {
        let current = sample();
        assert_eq!(merge_facts(&current, Some(&FactSet::default())), current);
    }

    #[test]
    fn parties_merge_field_by_field() {
        let current = sample();
        let incoming = FactSet {
            parties: Parties {
                petitioner: Some("Ana Ruiz".into()),
                respondent: None,
            },
            ..Default::default()
        };
        let merged = merge_facts(&current, Some(&incoming));
        assert_eq!(merged.parties.petitioner.as_deref(), Some("Ana Ruiz"));
        assert_eq!(merged.parties.respondent.as_deref(), Some("Mark"));
    }

    #[test]
    fn blank_scalar_does_not_erase() {
        let current = sample();
        let incoming = FactSet {
            relationship: Some("  ".into()),
            ..Default::default()
        };
        let merged = merge_facts(&current, Some(&incoming));
        assert_eq!(merged.relationship.as_deref(), Some("Former spouse"));
    }

    #[test]
    fn non_empty_sequence_replaces() {
        let current = sample();
        let incoming = FactSet {
            incidents: Some(vec!["Threat by phone".into(), "Broke window".into()]),
            ..Default::default()
        };
        let merged = merge_facts(&current, Some(&incoming));
        assert_eq!(merged.incidents, incoming.incidents);
        assert_eq!(merged.evidence_list, current.evidence_list);
    }

    #[test]
    fn empty_sequence_preserves() {
        let current = sample();
        let incoming = FactSet {
            incidents: Some(vec![]),
            timeline: Some(vec![]),
            ..Default::default()
        };
        let merged = merge_facts(&current, Some(&incoming));
        assert_eq!(merged.incidents, current.incidents);
        assert_eq!(merged.timeline, current.timeline);
    }

    #[test]
    fn fills_unknown_fields() {
        let current = FactSet::default();
        let incoming = FactSet {
            relationship: Some("Dating".into()),
            evidence_list: Some(vec!["Photos".into()]),
            ..Default::default()
        };
        let merged = merge_facts(&current, Some(&incoming));
        assert_eq!(merged, incoming);
    }

    #[test]
    fn inputs_are_untouched() {
        let current = sample();
        let before = current.clone();
        let incoming = FactSet {
            relationship: Some("Cohabitant".into()),
            incidents: Some(vec!["New incident".into()]),
            ..Default::default()
        };
        let incoming_before = incoming.clone();
        let _ = merge_facts(&current, Some(&incoming));
        assert_eq!(current, before);
        assert_eq!(incoming, incoming_before);
    }

    fn scalar() -> impl Strategy<Value = Option<String>> {
        option::of("[ A-Za-z]{0,8}")
    }

    fn items() -> impl Strategy<Value = Option<Vec<String>>> {
        option::of(vec("[a-z ]{1,12}", 0..3))
    }

    fn fact_set() -> impl Strategy<Value = FactSet> {
        let timeline = option::of(vec(
            (option::of("2024-0[1-9]-[0-2][0-9]"), "[a-z ]{1,12}")
                .prop_map(|(date, description)| TimelineEntry::new(date, description)),
            0..3,
        ));
        (
            (scalar(), scalar(), scalar()),
            (items(), items(), items(), items()),
            timeline,
        )
            .prop_map(
                |(
                    (petitioner, respondent, relationship),
                    (incidents, safety_concerns, requested_relief, evidence_list),
                    timeline,
                )| FactSet {
                    parties: Parties {
                        petitioner,
                        respondent,
                    },
                    relationship,
                    incidents,
                    safety_concerns,
                    requested_relief,
                    evidence_list,
                    timeline,
                },
            )
    }

    fn expected_scalar(current: &Option<String>, incoming: &Option<String>) -> Option<String> {
        match incoming.as_deref().map(str::trim) {
            Some(value) if !value.is_empty() => Some(value.to_string()),
            _ => current.clone(),
        }
    }

    fn expected_seq<T: Clone>(
        current: &Option<Vec<T>>,
        incoming: &Option<Vec<T>>,
    ) -> Option<Vec<T>> {
        if incoming.as_ref().is_some_and(|items| !items.is_empty()) {
            incoming.clone()
        } else {
            current.clone()
        }
    }

    proptest! {
        #[test]
        fn each_field_is_replaced_or_preserved(current in fact_set(), incoming in fact_set()) {
            let merged = merge_facts(&current, Some(&incoming));
            prop_assert_eq!(
                merged.parties.petitioner,
                expected_scalar(&current.parties.petitioner, &incoming.parties.petitioner)
            );
            prop_assert_eq!(
                merged.parties.respondent,
                expected_scalar(&current.parties.respondent, &incoming.parties.respondent)
            );
            prop_assert_eq!(
                merged.relationship,
                expected_scalar(&current.relationship, &incoming.relationship)
            );
            prop_assert_eq!(merged.incidents, expected_seq(&current.incidents, &incoming.incidents));
            prop_assert_eq!(
                merged.safety_concerns,
                expected_seq(&current.safety_concerns, &incoming.safety_concerns)
            );
            prop_assert_eq!(
                merged.requested_relief,
                expected_seq(&current.requested_relief, &incoming.requested_relief)
            );
            prop_assert_eq!(
                merged.evidence_list,
                expected_seq(&current.evidence_list, &incoming.evidence_list)
            );
            prop_assert_eq!(merged.timeline, expected_seq(&current.timeline, &incoming.timeline));
        }

        #[test]
        fn no_or_empty_incoming_is_identity(current in fact_set()) {
            prop_assert_eq!(&merge_facts(&current, None), &current);
            prop_assert_eq!(&merge_facts(&current, Some(&FactSet::default())), &current);
        }

        #[test]
        fn merging_the_same_facts_twice_is_stable(current in fact_set(), incoming in fact_set()) {
            let once = merge_facts(&current, Some(&incoming));
            let twice = merge_facts(&once, Some(&incoming));
            prop_assert_eq!(once, twice);
        }
    }
}
