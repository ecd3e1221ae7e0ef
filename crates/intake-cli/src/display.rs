//! Vertical card display for cases.
//!
//! Renders a case as grouped, human-readable sections. Empty sections are
//! skipped entirely.

use std::fmt::Write;

use chrono::{DateTime, Utc};
use intake_core::{Case, CoachSuggestion, DangerSignal, OutputKind};

const MAX_LIST_ITEMS: usize = 10;
const LABEL_WIDTH: usize = 20;
const OUTPUT_PREVIEW_CHARS: usize = 200;

// ── Public API ──

/// Render one case as a card grouped by section.
pub fn case_card(case: &Case, active: bool) -> String {
    let mut out = String::new();
    let marker = if active { " (active)" } else { "" };
    let _ = writeln!(out, "=== {}{} ===", case.id, marker);
    out.push('\n');

    let facts = &case.facts;
    section(
        &mut out,
        "Case",
        &[
            ("status", Some(case.status.as_str().to_string())),
            ("relationship", facts.relationship.clone()),
            ("safety at intake", case.answers.safety_status.clone()),
        ],
    );
    section(
        &mut out,
        "Parties",
        &[
            ("petitioner", facts.parties.petitioner.clone()),
            ("respondent", facts.parties.respondent.clone()),
        ],
    );
    list_section(&mut out, "Incidents", facts.incidents.as_deref());
    list_section(&mut out, "Safety Concerns", facts.safety_concerns.as_deref());
    list_section(&mut out, "Requested Relief", facts.requested_relief.as_deref());
    list_section(&mut out, "Evidence", facts.evidence_list.as_deref());

    let timeline: Option<Vec<String>> = facts.timeline.as_ref().map(|entries| {
        entries
            .iter()
            .map(|e| match &e.date {
                Some(date) => format!("{date}  {}", e.description),
                None => e.description.clone(),
            })
            .collect()
    });
    list_section(&mut out, "Timeline", timeline.as_deref());

    if !case.outputs.is_empty() {
        out.push_str("Outputs\n");
        for kind in OutputKind::ALL {
            if let Some(text) = case.outputs.get(&kind) {
                let _ = writeln!(out, "  {:<LABEL_WIDTH$} {}", kind.label(), preview(text));
            }
        }
        out.push('\n');
    }

    let missing = case.missing_fields();
    if !missing.is_empty() {
        let names: Vec<&str> = missing.iter().map(|f| f.as_str()).collect();
        let _ = writeln!(out, "Still Needed\n  {}\n", names.join(", "));
    }

    section(
        &mut out,
        "Timestamps",
        &[
            ("created", Some(timestamp(case.created_at))),
            ("updated", Some(timestamp(case.updated_at))),
        ],
    );
    out
}

/// One line per case for `list`.
pub fn case_row(case: &Case, active: bool) -> String {
    let marker = if active { '*' } else { ' ' };
    let petitioner = case.facts.parties.petitioner.as_deref().unwrap_or("-");
    format!(
        "{marker} {:<36}  {:<9}  {:<20}  {}",
        case.id,
        case.status.as_str(),
        petitioner,
        timestamp(case.updated_at)
    )
}

/// The coach's reply, follow-up questions and progress.
pub fn suggestion(suggestion: &CoachSuggestion) -> String {
    let mut out = String::new();
    if !suggestion.assistant_message.is_empty() {
        let _ = writeln!(out, "{}\n", suggestion.assistant_message);
    }
    for question in &suggestion.next_questions {
        let _ = writeln!(out, "  ? {question}");
    }
    if !suggestion.next_questions.is_empty() {
        out.push('\n');
    }
    let _ = write!(out, "Progress: {}%", suggestion.progress_percent);
    if !suggestion.missing_fields.is_empty() {
        let names: Vec<&str> = suggestion.missing_fields.iter().map(|f| f.as_str()).collect();
        let _ = write!(out, "  (still needed: {})", names.join(", "));
    }
    out.push('\n');
    out
}

/// Emergency banner shown before anything else when danger is detected.
pub fn safety_banner(signals: &[DangerSignal]) -> String {
    let mut out = String::from("!! YOUR SAFETY COMES FIRST !!\n");
    if !signals.is_empty() {
        let names: Vec<&str> = signals.iter().map(|s| s.as_str()).collect();
        let _ = writeln!(out, "Detected: {}", names.join(", "));
    }
    out.push_str(
        "If you are in immediate danger, call 911 now.\n\
         National Domestic Violence Hotline: 1-800-799-7233 (text START to 88788).\n",
    );
    out
}

// ── Section rendering ──

fn section(out: &mut String, header: &str, rows: &[(&str, Option<String>)]) {
    if rows.iter().all(|(_, value)| value.is_none()) {
        return;
    }
    let _ = writeln!(out, "{header}");
    for (label, value) in rows {
        if let Some(value) = value {
            let _ = writeln!(out, "  {label:<LABEL_WIDTH$} {value}");
        }
    }
    out.push('\n');
}

fn list_section(out: &mut String, header: &str, items: Option<&[String]>) {
    let Some(items) = items.filter(|items| !items.is_empty()) else {
        return;
    };
    let _ = writeln!(out, "{header} ({})", items.len());
    for item in items.iter().take(MAX_LIST_ITEMS) {
        let _ = writeln!(out, "  - {item}");
    }
    if items.len() > MAX_LIST_ITEMS {
        let _ = writeln!(out, "  ... and {} more", items.len() - MAX_LIST_ITEMS);
    }
    out.push('\n');
}

// ── Helpers ──

fn preview(text: &str) -> String {
    let first_line = text.lines().next().unwrap_or_default();
    let mut short: String = first_line.chars().take(OUTPUT_PREVIEW_CHARS).collect();
    if short.len() < first_line.len() || text.lines().nth(1).is_some() {
        short.push_str("...");
    }
    short
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use intake_core::{CaseId, FactField, FactSet, IntakeAnswers, TimelineEntry, merge_facts};

    fn sample() -> Case {
        let mut case = Case::new(IntakeAnswers {
            relationship_category: Some("Spouse".into()),
            safety_status: Some("Safe now".into()),
            petitioner_name: Some("Ana".into()),
            ..Default::default()
        });
        case.facts = merge_facts(
            &case.facts,
            Some(&FactSet {
                incidents: Some((1..=12).map(|i| format!("incident {i}")).collect()),
                timeline: Some(vec![TimelineEntry::new(Some("2024-03-01".into()), "Moved out")]),
                ..Default::default()
            }),
        );
        case.outputs
            .insert(OutputKind::HearingScript, "Your honour,\nI am here because".into());
        case
    }

    #[test]
    fn card_groups_facts_and_skips_empty_sections() {
        let card = case_card(&sample(), true);
        assert!(card.contains("(active)"));
        assert!(card.contains("relationship"));
        assert!(card.contains("Spouse"));
        assert!(card.contains("petitioner"));
        assert!(!card.contains("respondent "));
        assert!(card.contains("Incidents (12)"));
        assert!(card.contains("... and 2 more"));
        assert!(card.contains("2024-03-01  Moved out"));
        assert!(card.contains("Your honour,..."));
        assert!(!card.contains("Evidence"));
        assert!(card.contains("respondent_name"));
    }

    #[test]
    fn row_marks_active_case() {
        let case = sample();
        assert!(case_row(&case, true).starts_with('*'));
        assert!(case_row(&case, false).starts_with(' '));
        assert!(case_row(&case, false).contains("Ana"));
    }

    #[test]
    fn row_columns_align_for_short_ids() {
        let mut case = sample();
        case.id = CaseId::from("short");
        let row = case_row(&case, false);
        assert_eq!(&row[2..40], format!("{:<36}  ", "short"));
        assert_eq!(row.find("interview"), Some(40));
    }

    #[test]
    fn suggestion_lists_questions_and_gaps() {
        let text = suggestion(&CoachSuggestion {
            assistant_message: "Thank you.".into(),
            next_questions: vec!["When did this start?".into()],
            missing_fields: vec![FactField::Timeline],
            progress_percent: 40,
            ..Default::default()
        });
        assert!(text.starts_with("Thank you."));
        assert!(text.contains("? When did this start?"));
        assert!(text.contains("Progress: 40%"));
        assert!(text.contains("timeline"));
    }

    #[test]
    fn banner_names_signals() {
        let banner = safety_banner(&[DangerSignal::Weapon]);
        assert!(banner.contains("weapon"));
        assert!(banner.contains("911"));
    }
}
