/// Maximum number of characters of source sent to the model
pub const MAX_SOURCE_CHARS: usize = 10_000;

pub const TRUNCATION_MARKER: &str = "\n... (truncated)";

/// Cut `source` to [`MAX_SOURCE_CHARS`] characters, marking the cut once.
pub fn truncate_source(source: &str) -> String {
    match source.char_indices().nth(MAX_SOURCE_CHARS) {
        Some((cut, _)) => format!("{}{}", &source[..cut], TRUNCATION_MARKER),
        None => source.to_string(),
    }
}

pub fn build_prompt(filename: &str, source: &str) -> String {
    format!(
        r#"You are a code review expert. Analyze the following code and provide a JSON response with exactly this structure:

{{
    "readability_score": 8.5,
    "modularity_score": 7.2,
    "potential_issues": ["Issue 1", "Issue 2"],
    "suggestions": ["Suggestion 1", "Suggestion 2"]
}}

Rules:
- readability_score: number between 0-10 (how easy to read/understand)
- modularity_score: number between 0-10 (how well organized/modular)
- potential_issues: array of strings describing problems
- suggestions: array of strings with improvement recommendations
- Return ONLY valid JSON, no other text

Code to analyze:
```{filename}
{source}
```
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_source_is_untouched() {
        let source = "fn main() {}\n";
        assert_eq!(truncate_source(source), source);

        let exact = "x".repeat(MAX_SOURCE_CHARS);
        assert_eq!(truncate_source(&exact), exact);
    }

    #[test]
    fn long_source_is_cut_and_marked_once() {
        let source = "y".repeat(MAX_SOURCE_CHARS + 500);
        let out = truncate_source(&source);
        assert!(out.ends_with(TRUNCATION_MARKER));
        assert_eq!(out.matches("(truncated)").count(), 1);
        assert_eq!(out.chars().count(), MAX_SOURCE_CHARS + TRUNCATION_MARKER.chars().count());
    }

    #[test]
    fn limit_counts_characters_not_bytes() {
        let source = "é".repeat(MAX_SOURCE_CHARS);
        assert_eq!(truncate_source(&source), source);

        let source = "é".repeat(MAX_SOURCE_CHARS + 1);
        let out = truncate_source(&source);
        assert_eq!(out.trim_end_matches(TRUNCATION_MARKER).chars().count(), MAX_SOURCE_CHARS);
    }

    #[test]
    fn prompt_embeds_filename_and_source() {
        let prompt = build_prompt("main.py", "print('hi')");
        assert!(prompt.contains("```main.py\nprint('hi')\n```"));
        assert!(prompt.contains("\"readability_score\""));
        assert!(prompt.contains("Return ONLY valid JSON"));
    }
}
