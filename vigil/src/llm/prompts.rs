//! Prompt templates for delta analysis
//!
//! Templates use `format!()` interpolation so a missing variable is a
//! compile-time error rather than a runtime surprise.

use serde::Deserialize;

use crate::models::RecurringSearchConfig;
use crate::models::{SearchResult, SearchType};

/// What the comparison model is asked to return, verbatim.
#[derive(Debug, Clone, Deserialize)]
pub struct ComparisonOutcome {
    pub is_significant: bool,
    pub confidence: f32,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub key_changes: Vec<String>,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub citations: Vec<String>,
}

/// Build the comparison prompt for one execution pair. `deep_context`
/// carries excerpts from scraped pages when deep search produced any.
pub fn comparison_prompt(
    search: &RecurringSearchConfig,
    previous: &[SearchResult],
    current: &[SearchResult],
    deep_context: &[String],
) -> String {
    let mut guidance = String::new();

    if let Some(custom) = search.custom_prompt.as_deref().filter(|p| !p.trim().is_empty()) {
        guidance.push_str("Additional instructions from the user:\n");
        guidance.push_str(custom.trim());
        guidance.push('\n');
    }

    if !search.focus_areas.is_empty() {
        guidance.push_str(&format!(
            "Focus on changes related to: {}.\n",
            search.focus_areas.join(", ")
        ));
    }

    if !search.ignore_patterns.is_empty() {
        guidance.push_str(&format!(
            "Ignore changes that only concern: {}.\n",
            search.ignore_patterns.join(", ")
        ));
    }

    for refinement in search.active_refinements() {
        guidance.push_str(&format!("Learned guidance: {}\n", refinement.text));
    }

    let context_section = if deep_context.is_empty() {
        String::new()
    } else {
        format!(
            "\nExcerpts from the pages behind the current results:\n{}\n",
            deep_context
                .iter()
                .enumerate()
                .map(|(i, c)| format!("[excerpt {}] {c}", i + 1))
                .collect::<Vec<_>>()
                .join("\n")
        )
    };

    format!(
        r#"You monitor the recurring {search_type} search "{query}" for meaningful changes.
Compare the previous result set with the current one and decide whether anything
significant happened since the last run: new developments, reversals, removals,
or material shifts in the story. Reordering, cosmetic rewording, and duplicate
coverage of already-known facts are NOT significant.

{guidance}
Previous results:
{previous}

Current results:
{current}
{context_section}
Respond with valid JSON only, no prose around it:
{{
  "is_significant": true or false,
  "confidence": 0.0 to 1.0,
  "summary": "one or two sentences describing what changed",
  "key_changes": ["specific change", "..."],
  "reasoning": "why this is or is not significant",
  "citations": ["url of a result supporting each key change"]
}}"#,
        search_type = type_label(search.search_type),
        query = search.query,
        guidance = guidance,
        previous = format_results(previous),
        current = format_results(current),
        context_section = context_section,
    )
}

fn type_label(search_type: SearchType) -> &'static str {
    match search_type {
        SearchType::General => "general web",
        SearchType::News => "news",
        SearchType::Finance => "financial news",
    }
}

fn format_results(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return "(none)".to_string();
    }

    results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let published = r
                .published_at
                .map(|dt| format!(" ({})", dt.format("%Y-%m-%d")))
                .unwrap_or_default();
            format!(
                "{}. {}{published}\n   {}\n   source: {} | {}",
                i + 1,
                r.title,
                r.snippet,
                r.source,
                r.url
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
