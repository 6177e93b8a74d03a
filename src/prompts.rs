//! Instruction prompts for combined summarise-and-tag requests.
//!
//! Summary and tags come back from a single model round trip. Tag hygiene
//! (at most three, prefer existing, no near-duplicates) is asked of the
//! model here rather than enforced locally, so every rule about tags lives
//! in this one prompt.
//!
//! Callers can override the whole prompt via
//! [`crate::config::ProcessingConfig::prompt`]; an override is sent verbatim
//! and does not receive the tag library.

use crate::taxonomy::TagLibrary;

/// Default instruction prompt. `{tag_library}` is replaced with the
/// comma-separated library by [`default_prompt`].
pub const DEFAULT_PROMPT_TEMPLATE: &str = r#"You are a careful document analyst. The images that follow are the pages of one document, in order. Consider all pages together.

1. SUMMARY
   - Write a summary of the whole document in 2-5 sentences.
   - State what the document is and what it is for.

2. TAGS
   - Assign at most 3 tags.
   - Prefer tags from the existing tag library below over inventing new ones.
   - When both a domain-specific and a generic existing tag apply, choose the domain-specific one.
   - Do not return near-duplicate tags (e.g. "Budget" and "Budgets", or "Meetings" and "Meeting Minutes").
   - Only invent a new tag when no existing tag fits.

Existing tag library: {tag_library}

3. OUTPUT FORMAT
   - Respond with a single JSON object and nothing else:
     {"summary": "<summary>", "tags": ["<tag>", "<tag>"]}
   - Do NOT wrap the JSON in markdown fences.
   - Do NOT add commentary before or after the JSON."#;

/// Render the default prompt with the given tag library inlined.
pub fn default_prompt(library: &TagLibrary) -> String {
    DEFAULT_PROMPT_TEMPLATE.replace("{tag_library}", &library.joined(", "))
}

/// Pick the prompt for a request: the override when given, else the
/// rendered default.
pub fn resolve_prompt(prompt_override: Option<&str>, library: &TagLibrary) -> String {
    match prompt_override {
        Some(p) => p.to_string(),
        None => default_prompt(library),
    }
}
