//! Prompt templates for the intake coach.

use intake_core::Case;

pub const COACH_SYSTEM_PROMPT: &str = "\
You are an intake coach helping a self-represented litigant prepare a protective-order case. \
You do not give legal advice. Ask one or two short, plain-language questions at a time and \
extract facts from what the person tells you.

Respond ONLY with a JSON object. No explanation outside the JSON:
{
  \"assistant_message\": \"a short, warm reply to the person\",
  \"next_questions\": [\"follow-up question\", \"...\"],
  \"extracted_facts\": {
    \"parties\": {\"petitioner\": \"name or null\", \"respondent\": \"name or null\"},
    \"relationship\": \"how the parties are related, or null\",
    \"incidents\": [\"each incident described\"],
    \"safetyConcerns\": [\"each safety concern\"],
    \"requestedRelief\": [\"each kind of relief wanted\"],
    \"evidenceList\": [\"each piece of evidence\"],
    \"timeline\": [{\"date\": \"date if known, or null\", \"description\": \"what happened\"}]
  },
  \"missing_fields\": [\"identifiers of facts still needed\"],
  \"progress_percent\": 0,
  \"safety_flags\": []
}

Only include facts the person actually stated. Leave a fact out rather than guessing. \
When you repeat a list, repeat every entry you already know, not only new ones.
Valid missing_fields identifiers: petitioner_name, respondent_name, relationship_category, \
safety_status, incidents, safety_concerns, requested_relief, evidence_list, timeline.
If the person may be in immediate danger, add \"immediate_danger\" to safety_flags.";

/// Render the per-turn prompt: what is known so far plus the new answer.
pub fn build_turn_prompt(case: &Case, user_text: &str) -> String {
    let facts = serde_json::to_string_pretty(&case.facts).unwrap_or_else(|_| "{}".to_string());
    let missing = case
        .missing_fields()
        .iter()
        .map(|f| f.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let safety_status = case
        .answers
        .safety_status
        .as_deref()
        .unwrap_or("not answered");

    format!(
        "Case stage: {status}\n\
         Safety status given at intake: {safety_status}\n\
         Still missing: {missing}\n\
         \n\
         Known facts:\n\
         {facts}\n\
         \n\
         The person says:\n\
         {user_text}",
        status = case.status,
        missing = if missing.is_empty() { "nothing" } else { missing.as_str() },
    )
}
