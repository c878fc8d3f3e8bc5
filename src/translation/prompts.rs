/*!
 * Prompt text for the translation oracle.
 */

use serde_json::json;

use crate::errors::ProviderError;

use super::oracle::{BatchRequest, LanguagePair};

/// System prompt for batch calls
pub fn batch_system_prompt(languages: &LanguagePair, style_hint: &str) -> String {
    let mut prompt = format!(
        "Role: expert subtitler translating {source} dialogue into natural {target}.\n\
         Task: translate every string of the JSON list in the user message.\n\
         Rules:\n\
         1. Reply with JSON only: {{\"translations\": [\"...\"]}}\n\
         2. ORDER: the output list has exactly as many items as the input, in the same order.\n\
         3. NO ECHO: never return {source} text. Translate every item. Only proper names stay unchanged.\n\
         4. Never merge, split, drop or invent lines. Translate each item on its own.\n\
         5. Keep it short and idiomatic, as spoken dialogue. Example: \"Yeah.\" is a short affirmative, not a literal word.",
        source = languages.source,
        target = languages.target,
    );
    if !style_hint.trim().is_empty() {
        prompt.push_str("\n6. ");
        prompt.push_str(style_hint.trim());
    }
    prompt
}

/// User message carrying the strings and any corrections from earlier attempts
pub fn batch_user_prompt(request: &BatchRequest) -> Result<String, ProviderError> {
    let payload = serde_json::to_string(&json!({ "lines": request.items }))
        .map_err(|e| ProviderError::RequestFailed(format!("Failed to encode batch: {}", e)))?;

    let mut prompt = format!(
        "Translate these {} lines. Return exactly {} translations.\n{}",
        request.len(),
        request.len(),
        payload
    );
    for note in &request.corrections {
        prompt.push_str("\n\n");
        prompt.push_str(note);
    }
    Ok(prompt)
}

/// Corrective instruction appended after an untranslated echo
pub fn echo_correction(languages: &LanguagePair) -> String {
    format!(
        "CRITICAL ERROR: You returned {} text. YOU MUST TRANSLATE TO {}.",
        languages.source,
        languages.target.to_uppercase()
    )
}

pub fn emergency_system_prompt(languages: &LanguagePair) -> String {
    format!("You translate single subtitle lines into {}. Reply with the translation only.", languages.target)
}

/// Plain single-line question used when batches keep failing
pub fn emergency_prompt(text: &str, languages: &LanguagePair) -> String {
    format!("How do you say '{}' in {}? Only the answer.", text, languages.target)
}
