//! Prompt constants for the three model stages.
//!
//! These prompts are the contract between the pipeline and the backends:
//! the JSON shapes they request must match `types.rs`.

use super::types::ProblemInfo;
use crate::settings::Language;

pub const MAX_TOKENS: u32 = 4096;

/// EXTRACT system prompt: screenshots in, ProblemInfo JSON out.
pub const EXTRACT_SYSTEM_PROMPT: &str = r#"You read screenshots of a coding problem and transcribe it into structured JSON.

<rules>
1. ALWAYS respond with valid JSON matching the schema below. No prose, no markdown.
2. Combine all screenshots into ONE problem. They are ordered top to bottom.
3. Copy the statement faithfully. Do not solve the problem.
4. If a field is not visible in the screenshots, use null (or an empty list for test_cases).
</rules>

<response_format>
{
  "problem_statement": "<full problem text>",
  "constraints": "<constraints text or null>",
  "return_type": "<expected return type or null>",
  "test_cases": [
    {"input": <JSON value>, "output": <JSON value>, "explanation": "<text or null>"}
  ]
}
</response_format>"#;

/// SOLVE system prompt: ProblemInfo in, SolutionData JSON out.
pub const SOLVE_SYSTEM_PROMPT: &str = r#"You are an expert competitive programmer. Solve the problem you are given.

<rules>
1. ALWAYS respond with valid JSON matching the schema below. No prose, no markdown.
2. "code" must be a complete, runnable solution in the requested language.
3. "thoughts" is a short ordered list of the key reasoning steps (3-6 items).
4. Complexities use big-O notation followed by a one-sentence justification.
</rules>

<response_format>
{
  "code": "<solution source>",
  "thoughts": ["<step>", "<step>"],
  "time_complexity": "O(...) - <why>",
  "space_complexity": "O(...) - <why>"
}
</response_format>"#;

/// DEBUG system prompt: original + new screenshots and the prior problem in,
/// revised SolutionData JSON out.
pub const DEBUG_SYSTEM_PROMPT: &str = r#"You are helping a programmer debug their solution to a coding problem.

<rules>
1. ALWAYS respond with valid JSON matching the schema below. No prose, no markdown.
2. The first screenshots show the original problem. The remaining screenshots were captured later and show the current code, failing tests, or error output.
3. Work out what changed and what is wrong, then return a corrected solution.
4. "thoughts" lists what you changed and why, in order.
</rules>

<response_format>
{
  "code": "<corrected solution source>",
  "thoughts": ["<what changed>", "<what changed>"],
  "time_complexity": "O(...) - <why>",
  "space_complexity": "O(...) - <why>"
}
</response_format>"#;

/// User message accompanying the extraction screenshots.
pub fn build_extract_message(image_count: usize) -> String {
    format!(
        "Extract the coding problem shown in the following {} screenshot(s). Return JSON only.",
        image_count
    )
}

/// User message for the solve stage.
pub fn build_solve_message(problem: &ProblemInfo, language: Language) -> String {
    let problem_json = serde_json::to_string_pretty(problem).unwrap_or_default();
    format!(
        r#"<problem>
{problem_json}
</problem>

<language>{}</language>

Solve this problem in {}. Return JSON only."#,
        language.id(),
        language.display_name()
    )
}

/// User message accompanying the debug screenshots.
pub fn build_debug_message(problem: &ProblemInfo, language: Language, image_count: usize) -> String {
    let problem_json = serde_json::to_string_pretty(problem).unwrap_or_default();
    format!(
        r#"<problem>
{problem_json}
</problem>

<language>{}</language>

The {image_count} screenshot(s) below start with the original problem and end with the newest captures. Debug the {} solution they show. Return JSON only."#,
        language.id(),
        language.display_name()
    )
}
