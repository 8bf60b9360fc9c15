//! Summarizer instruction assembly
//!
//! Instructions are built from up to four sections joined by blank lines, empty
//! sections skipped:
//!
//! 1. the structured summary template (only when enabled for the session)
//! 2. the split-turn prefix boilerplate (prefix calls only)
//! 3. caller-supplied custom instructions
//! 4. the tool failure digest

/// Fixed skeleton the summarizer is asked to fill when structured summaries are on
pub const STRUCTURED_SUMMARY_TEMPLATE: &str = r#"Write the summary using exactly the following markdown sections, in this order:

## Goal
What the user is trying to accomplish. List every distinct goal if the session covers several tasks.

## Progress
What has been completed, what is in progress, and what is blocked.

## Key Data
Preserve key data verbatim: file paths, identifiers, function names, commands, error messages, numbers, and URLs. Copy them exactly; do not paraphrase.

## Decisions
Choices that were made and the reason given for each.

## Modified Files
Every file created, edited, or deleted, with a short note on the change.

## Next Steps
Ordered list of what should happen next.

## Constraints
User requirements, preferences, and limits that must keep applying.

Every section MUST be present in the output. Write "(none)" under a section that has nothing to report."#;

/// Boilerplate for the second summarizer call of a split turn
pub const TURN_PREFIX_INSTRUCTIONS: &str = "This summary covers the prefix of a split turn. \
Focus on the original request, early progress, and any details needed to understand the retained suffix.";

/// Instructions for the main history call
pub fn history_instructions(
    custom_instructions: Option<&str>,
    structured_summary: bool,
    tool_failures: &str,
) -> Option<String> {
    join_sections([
        structured_summary.then_some(STRUCTURED_SUMMARY_TEMPLATE),
        custom_instructions,
        Some(tool_failures),
    ])
}

/// Instructions for the split-turn prefix call
pub fn turn_prefix_instructions(
    custom_instructions: Option<&str>,
    structured_summary: bool,
    tool_failures: &str,
) -> Option<String> {
    join_sections([
        structured_summary.then_some(STRUCTURED_SUMMARY_TEMPLATE),
        Some(TURN_PREFIX_INSTRUCTIONS),
        custom_instructions,
        Some(tool_failures),
    ])
}

fn join_sections<'a>(sections: impl IntoIterator<Item = Option<&'a str>>) -> Option<String> {
    let parts: Vec<&str> = sections
        .into_iter()
        .flatten()
        .filter(|s| !s.trim().is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}
