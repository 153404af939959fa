use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use nanoid::nanoid;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::config::LearningConfig;
use crate::db::DatabaseBackend;
use crate::error::Result;
use crate::models::{
    Alert, FeedbackKind, ProgressEvent, PromptRefinement, RuleOrigin, RuleType, Sensitivity,
    SuppressionRule,
};

const STOPWORDS: [&str; 32] = [
    "the", "and", "for", "that", "this", "with", "from", "have", "has", "was", "were", "been",
    "are", "will", "would", "could", "should", "about", "after", "before", "into", "over",
    "under", "their", "there", "they", "them", "than", "then", "when", "which", "while",
];

/// Turns alert feedback into suppression rules and sensitivity
/// recommendations. Runs a learning pass on every Nth feedback entry per
/// search; recommendations are advisory and never overwrite a user-set
/// sensitivity.
pub struct LearningEngine {
    db: Arc<dyn DatabaseBackend>,
    events: broadcast::Sender<ProgressEvent>,
    config: LearningConfig,
}

impl LearningEngine {
    pub fn new(
        db: Arc<dyn DatabaseBackend>,
        events: broadcast::Sender<ProgressEvent>,
        config: LearningConfig,
    ) -> Self {
        Self { db, events, config }
    }

    /// Called after each feedback entry lands. Cheap unless the entry
    /// completes a batch.
    pub async fn on_feedback(&self, search_id: &str) -> Result<()> {
        let count = self.db.feedback_count(search_id).await?;
        if count == 0 || count % self.config.feedback_batch_size as i64 != 0 {
            debug!(search_id, count, "Feedback below batch boundary, skipping learning pass");
            return Ok(());
        }
        self.learn(search_id).await
    }

    /// One full learning pass for a search.
    pub async fn learn(&self, search_id: &str) -> Result<()> {
        let fp_rate = self.trailing_fp_rate(search_id).await?;
        self.recommend_sensitivity(search_id, fp_rate).await?;

        let irrelevant = self
            .db
            .recent_irrelevant_alerts(search_id, self.config.fp_rate_window as u32)
            .await?;
        if irrelevant.len() < self.config.cluster_min {
            debug!(
                search_id,
                irrelevant = irrelevant.len(),
                "Too few irrelevant alerts to cluster"
            );
            return Ok(());
        }

        let existing = self.db.active_rules(search_id).await?;
        let tenant_id = irrelevant[0].tenant_id.clone();
        let characteristics = self.shared_characteristics(&irrelevant);

        for (rule_type, condition) in characteristics.clone() {
            let duplicate = existing
                .iter()
                .any(|r| r.rule_type == rule_type && r.condition == condition);
            if duplicate {
                continue;
            }

            let rule = SuppressionRule {
                id: format!("rule_{}", nanoid!()),
                search_id: search_id.to_string(),
                tenant_id: tenant_id.clone(),
                rule_type,
                condition: condition.clone(),
                created_by: RuleOrigin::LearningSystem,
                applied_count: 0,
                effectiveness: 0.0,
                created_at: Utc::now(),
                deleted_at: None,
            };
            self.db.create_rule(&rule).await?;

            info!(search_id, rule_type = %rule_type, condition = %condition, "Learned suppression rule");
            let _ = self.events.send(ProgressEvent::LearningUpdate {
                search_id: search_id.to_string(),
                detail: format!("suppression rule created: {rule_type} '{condition}'"),
            });
        }

        self.append_refinements(search_id, &characteristics).await
    }

    /// Append-only prompt guidance derived from the same clustered
    /// characteristics. A refinement whose text already exists on the
    /// search is skipped so repeated passes stay idempotent.
    async fn append_refinements(
        &self,
        search_id: &str,
        characteristics: &[(RuleType, String)],
    ) -> Result<()> {
        if characteristics.is_empty() {
            return Ok(());
        }
        let Some(mut search) = self.db.get_recurring(search_id).await? else {
            return Ok(());
        };

        let mut appended = 0usize;
        for (rule_type, condition) in characteristics {
            let text = match rule_type {
                RuleType::Keyword => format!(
                    "Past alerts centered on '{condition}' were judged irrelevant for this \
                     search; do not treat changes that are only about {condition} as significant."
                ),
                RuleType::Source => format!(
                    "Results sourced from {condition} have repeatedly produced irrelevant \
                     alerts for this search; weigh coverage from that source with skepticism."
                ),
                _ => continue,
            };
            if search.prompt_refinements.iter().any(|r| r.text == text) {
                continue;
            }

            search.prompt_refinements.push(PromptRefinement {
                text: text.clone(),
                origin: RuleOrigin::LearningSystem,
                created_at: Utc::now(),
                active: true,
            });
            appended += 1;

            info!(search_id, refinement = %text, "Appended prompt refinement");
            let _ = self.events.send(ProgressEvent::LearningUpdate {
                search_id: search_id.to_string(),
                detail: format!("prompt refinement appended: '{text}'"),
            });
        }

        if appended > 0 {
            search.updated_at = Utc::now();
            self.db.update_recurring(&search).await?;
        }
        Ok(())
    }

    async fn trailing_fp_rate(&self, search_id: &str) -> Result<f32> {
        let recent = self
            .db
            .recent_feedback(search_id, self.config.fp_rate_window as u32)
            .await?;
        if recent.is_empty() {
            return Ok(0.0);
        }
        let irrelevant = recent
            .iter()
            .filter(|f| f.feedback == FeedbackKind::Irrelevant)
            .count();
        Ok(irrelevant as f32 / recent.len() as f32)
    }

    async fn recommend_sensitivity(&self, search_id: &str, fp_rate: f32) -> Result<()> {
        let recommended = if fp_rate > 0.4 {
            Sensitivity::Low
        } else if fp_rate < 0.1 {
            Sensitivity::High
        } else {
            Sensitivity::Medium
        };
        debug!(search_id, fp_rate, ?recommended, "Sensitivity recommendation");
        self.db
            .set_recommended_sensitivity(search_id, recommended)
            .await
    }

    /// Characteristics shared by at least `cluster_min` of the alerts:
    /// citation source domains and frequent summary keywords.
    fn shared_characteristics(&self, alerts: &[Alert]) -> Vec<(RuleType, String)> {
        let mut domain_counts: HashMap<String, usize> = HashMap::new();
        let mut keyword_counts: HashMap<String, usize> = HashMap::new();

        for alert in alerts {
            let mut domains: HashSet<String> = HashSet::new();
            for citation in &alert.citations {
                if let Some(domain) = domain_of(citation) {
                    domains.insert(domain);
                }
            }
            for domain in domains {
                *domain_counts.entry(domain).or_default() += 1;
            }

            let mut keywords: HashSet<String> = HashSet::new();
            for word in alert.summary.to_lowercase().split(|c: char| !c.is_alphanumeric()) {
                if word.len() > 3 && !STOPWORDS.contains(&word) {
                    keywords.insert(word.to_string());
                }
            }
            for keyword in keywords {
                *keyword_counts.entry(keyword).or_default() += 1;
            }
        }

        let mut characteristics: Vec<(RuleType, String)> = Vec::new();
        for (domain, count) in domain_counts {
            if count >= self.config.cluster_min {
                characteristics.push((RuleType::Source, domain));
            }
        }
        for (keyword, count) in keyword_counts {
            if count >= self.config.cluster_min {
                characteristics.push((RuleType::Keyword, keyword));
            }
        }
        characteristics.sort_by(|a, b| a.1.cmp(&b.1));
        characteristics
    }
}

fn domain_of(url: &str) -> Option<String> {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_lowercase()))
}
