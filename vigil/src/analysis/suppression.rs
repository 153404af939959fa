use crate::models::SearchResult;
use crate::models::{RuleType, SuppressionRule};

/// First active rule matching the comparison output, in creation order.
/// Precedence over the confidence gate is the caller's job; this only
/// answers "does anything match".
pub fn first_matching_rule<'a>(
    rules: &'a [SuppressionRule],
    results: &[SearchResult],
    summary: &str,
) -> Option<&'a SuppressionRule> {
    rules
        .iter()
        .filter(|rule| rule.is_active())
        .find(|rule| rule_matches(rule, results, summary))
}

fn rule_matches(rule: &SuppressionRule, results: &[SearchResult], summary: &str) -> bool {
    match rule.rule_type {
        RuleType::Keyword => {
            let keyword = rule.condition.to_lowercase();
            results.iter().any(|r| {
                r.title.to_lowercase().contains(&keyword)
                    || r.snippet.to_lowercase().contains(&keyword)
            })
        }
        RuleType::Source => {
            let domain = rule.condition.to_lowercase();
            results.iter().any(|r| {
                result_domain(r)
                    .map(|d| d == domain || d.ends_with(&format!(".{domain}")))
                    .unwrap_or(false)
            })
        }
        RuleType::Pattern => match regex::Regex::new(&rule.condition) {
            Ok(re) => results
                .iter()
                .any(|r| re.is_match(&r.title) || re.is_match(&r.snippet)),
            Err(err) => {
                tracing::warn!(rule_id = %rule.id, error = %err, "Invalid suppression pattern, skipping rule");
                false
            }
        },
        RuleType::Semantic => {
            let needle = rule.condition.to_lowercase();
            !needle.is_empty() && summary.to_lowercase().contains(&needle)
        }
    }
}

fn result_domain(result: &SearchResult) -> Option<String> {
    url::Url::parse(&result.url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_lowercase()))
        .or_else(|| {
            let source = result.source.trim().to_lowercase();
            (!source.is_empty()).then_some(source)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RuleOrigin;
    use chrono::Utc;

    fn rule(rule_type: RuleType, condition: &str) -> SuppressionRule {
        SuppressionRule {
            id: format!("rule_{condition}"),
            search_id: "srch_1".to_string(),
            tenant_id: "tenant-1".to_string(),
            rule_type,
            condition: condition.to_string(),
            created_by: RuleOrigin::User,
            applied_count: 0,
            effectiveness: 0.0,
            created_at: Utc::now(),
            deleted_at: None,
        }
    }

    fn result(title: &str, url: &str, snippet: &str) -> SearchResult {
        SearchResult {
            title: title.to_string(),
            url: url.to_string(),
            snippet: snippet.to_string(),
            source: String::new(),
            published_at: None,
            relevance_score: 0.5,
        }
    }

    #[test]
    fn keyword_matches_case_insensitively_in_title_or_snippet() {
        let rules = vec![rule(RuleType::Keyword, "rumor")];
        let results = vec![result("Acquisition RUMOR swirls", "https://a.com/x", "")];
        assert!(first_matching_rule(&rules, &results, "").is_some());

        let results = vec![result("Deal closed", "https://a.com/x", "despite earlier rumors")];
        assert!(first_matching_rule(&rules, &results, "").is_some());

        let results = vec![result("Deal closed", "https://a.com/x", "confirmed by filing")];
        assert!(first_matching_rule(&rules, &results, "").is_none());
    }

    #[test]
    fn source_matches_domain_and_subdomains() {
        let rules = vec![rule(RuleType::Source, "tabloid.example")];
        let hit = vec![result("t", "https://www.tabloid.example/story", "s")];
        assert!(first_matching_rule(&rules, &hit, "").is_some());

        let sub = vec![result("t", "https://celeb.tabloid.example/story", "s")];
        assert!(first_matching_rule(&rules, &sub, "").is_some());

        let miss = vec![result("t", "https://reuters.example/story", "s")];
        assert!(first_matching_rule(&rules, &miss, "").is_none());
    }

    #[test]
    fn pattern_rule_uses_regex() {
        let rules = vec![rule(RuleType::Pattern, r"Q[1-4]\s+earnings")];
        let hit = vec![result("Q3 earnings preview", "https://a.com", "")];
        assert!(first_matching_rule(&rules, &hit, "").is_some());
    }

    #[test]
    fn invalid_pattern_never_matches() {
        let rules = vec![rule(RuleType::Pattern, "([unclosed")];
        let results = vec![result("anything", "https://a.com", "")];
        assert!(first_matching_rule(&rules, &results, "").is_none());
    }

    #[test]
    fn semantic_rule_matches_against_summary() {
        let rules = vec![rule(RuleType::Semantic, "stock price movement")];
        assert!(first_matching_rule(&rules, &[], "Routine stock price movement, nothing new").is_some());
        assert!(first_matching_rule(&rules, &[], "New CEO announced").is_none());
    }

    #[test]
    fn deleted_rules_are_ignored() {
        let mut deleted = rule(RuleType::Keyword, "rumor");
        deleted.deleted_at = Some(Utc::now());
        let results = vec![result("rumor mill", "https://a.com", "")];
        assert!(first_matching_rule(&[deleted], &results, "").is_none());
    }

    #[test]
    fn first_match_in_order_wins() {
        let rules = vec![
            rule(RuleType::Keyword, "rumor"),
            rule(RuleType::Keyword, "speculation"),
        ];
        let results = vec![result("rumor and speculation", "https://a.com", "")];
        let matched = first_matching_rule(&rules, &results, "").unwrap();
        assert_eq!(matched.condition, "rumor");
    }
}
