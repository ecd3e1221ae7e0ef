//! Coach response parser.
//!
//! Pulls the structured suggestion out of free-form model output. The model
//! is asked for a single JSON object but may wrap it in a code fence, add
//! prose around it, or get it wrong entirely.
//!
//! # Locating the object
//!
//! Candidates are tried in order and the first one that parses as a JSON
//! object wins:
//!
//! 1. The body of each fenced code block (with or without a language tag)
//! 2. The whole trimmed text
//! 3. Each top-level balanced `{...}` span, scanning left to right
//! 4. The span from the first `{` to the last `}`
//!
//! The balanced scan never descends into an unterminated object, so a
//! malformed payload yields `None` rather than one of its nested fragments.
//!
//! # Mapping
//!
//! External keys are snake_case at the top level (`assistant_message`,
//! `next_questions`, ...) and camelCase inside `extracted_facts`; both
//! spellings are accepted everywhere. Unknown keys are ignored, and missing
//! or ill-typed values default to empty. `missing_fields` keeps only known
//! [`FactField`] identifiers.

use intake_core::facts::non_empty;
use intake_core::{CoachSuggestion, FactField, FactSet, Parties, TimelineEntry};
use serde_json::{Map, Value};
use tracing::debug;

type Object = Map<String, Value>;

/// Parse one model reply. `None` means no structured suggestion this turn;
/// show the raw text instead.
pub fn parse_coach_response(raw: &str) -> Option<CoachSuggestion> {
    let Some(object) = locate_object(raw) else {
        debug!(len = raw.len(), "no JSON object in coach response");
        return None;
    };
    Some(suggestion_from_object(&object))
}

// ── Locating ──

fn locate_object(raw: &str) -> Option<Object> {
    candidates(raw).into_iter().find_map(parse_object)
}

fn candidates(raw: &str) -> Vec<&str> {
    let mut out = fenced_blocks(raw);
    out.push(raw.trim());
    out.extend(balanced_objects(raw));
    if let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}'))
        && start < end
    {
        out.push(&raw[start..=end]);
    }
    out
}

fn parse_object(candidate: &str) -> Option<Object> {
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Bodies of ``` fenced blocks, in order. An unterminated fence runs to the
/// end of the text.
fn fenced_blocks(text: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find("```") {
        let after = &rest[open + 3..];
        let body_start = match after.find('\n') {
            Some(nl) if is_language_tag(&after[..nl]) => nl + 1,
            _ => 0,
        };
        let body = &after[body_start..];
        match body.find("```") {
            Some(close) => {
                blocks.push(body[..close].trim());
                rest = &body[close + 3..];
            }
            None => {
                blocks.push(body.trim());
                break;
            }
        }
    }
    blocks
}

fn is_language_tag(s: &str) -> bool {
    s.trim()
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+'))
}

/// Top-level balanced `{...}` spans.
///
/// A `{` with no partner is skipped when it is stray prose. When it opens a
/// JSON object the scan stops, so a broken object never yields one of its
/// nested fragments.
fn balanced_objects(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut from = 0;
    while let Some(offset) = text[from..].find('{') {
        let start = from + offset;
        match matching_brace(bytes, start) {
            Some(end) => {
                spans.push(&text[start..=end]);
                from = end + 1;
            }
            None if opens_object(&text[start + 1..]) => break,
            None => from = start + 1,
        }
    }
    spans
}

fn opens_object(after_brace: &str) -> bool {
    matches!(after_brace.trim_start().chars().next(), Some('"' | '}'))
}

/// Index of the `}` closing the `{` at `start`, skipping braces inside
/// JSON strings. Braces and quotes are ASCII, so byte indices are always
/// char boundaries.
fn matching_brace(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

// ── Mapping ──

fn suggestion_from_object(obj: &Object) -> CoachSuggestion {
    let mut missing_fields = Vec::new();
    for fact in field(obj, &["missing_fields", "missingFields"])
        .map(strings)
        .unwrap_or_default()
        .iter()
        .filter_map(|id| FactField::from_identifier(id))
    {
        if !missing_fields.contains(&fact) {
            missing_fields.push(fact);
        }
    }

    CoachSuggestion {
        assistant_message: field(obj, &["assistant_message", "assistantMessage", "message"])
            .and_then(text)
            .unwrap_or_default(),
        next_questions: field(obj, &["next_questions", "nextQuestions", "questions"])
            .map(strings)
            .unwrap_or_default(),
        extracted_facts: field(obj, &["extracted_facts", "extractedFacts", "facts"])
            .and_then(Value::as_object)
            .map(facts_from_object)
            .unwrap_or_default(),
        missing_fields,
        progress_percent: field(obj, &["progress_percent", "progressPercent", "progress"])
            .and_then(percent)
            .unwrap_or(0),
        safety_flags: field(obj, &["safety_flags", "safetyFlags"])
            .map(strings)
            .unwrap_or_default(),
    }
}

fn facts_from_object(obj: &Object) -> FactSet {
    let parties = field(obj, &["parties"]).and_then(Value::as_object);
    let party = |keys: &[&str]| {
        parties
            .and_then(|p| field(p, keys))
            .or_else(|| field(obj, keys))
            .and_then(text)
    };

    FactSet {
        parties: Parties {
            petitioner: party(&["petitioner", "petitioner_name", "petitionerName"]),
            respondent: party(&["respondent", "respondent_name", "respondentName"]),
        },
        relationship: field(
            obj,
            &["relationship", "relationship_category", "relationshipCategory"],
        )
        .and_then(text),
        incidents: sequence(obj, &["incidents"]),
        safety_concerns: sequence(obj, &["safetyConcerns", "safety_concerns"]),
        requested_relief: sequence(obj, &["requestedRelief", "requested_relief"]),
        evidence_list: sequence(obj, &["evidenceList", "evidence_list", "evidence"]),
        timeline: field(obj, &["timeline"])
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(timeline_entry).collect())
            .and_then(non_empty),
    }
}

/// First non-null value under any of `keys`.
fn field<'a>(obj: &'a Object, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}

fn text(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// A list of strings from an array (or a lone string). Numbers and bools are
/// stringified; objects contribute their `description`/`text` field.
fn strings(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(item_text).collect(),
        Value::String(_) => text(value).into_iter().collect(),
        _ => Vec::new(),
    }
}

fn item_text(item: &Value) -> Option<String> {
    match item {
        Value::String(_) => text(item),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Object(obj) => field(obj, &["description", "text", "event"]).and_then(text),
        _ => None,
    }
}

fn sequence(obj: &Object, keys: &[&str]) -> Option<Vec<String>> {
    field(obj, keys).map(strings).and_then(non_empty)
}

fn timeline_entry(item: &Value) -> Option<TimelineEntry> {
    match item {
        Value::String(_) => text(item).map(|d| TimelineEntry::new(None, d)),
        Value::Object(obj) => {
            let description = field(obj, &["description", "event", "text", "what"]).and_then(text)?;
            let date = field(obj, &["date", "when"]).and_then(text);
            Some(TimelineEntry::new(date, description))
        }
        _ => None,
    }
}

/// 0–100, from a number or a string like `"40%"`.
fn percent(value: &Value) -> Option<u8> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if n.is_nan() {
        return None;
    }
    Some(n.round().clamp(0.0, 100.0) as u8)
}
