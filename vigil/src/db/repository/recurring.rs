use chrono::{DateTime, Utc};
use libsql::{params, Connection};

use crate::error::Result;
use crate::models::{RecurringSearchConfig, SearchType, Sensitivity};

use super::{parse_datetime, parse_datetime_opt};

pub struct RecurringSearchRepository;

impl RecurringSearchRepository {
    pub async fn create(conn: &Connection, config: &RecurringSearchConfig) -> Result<()> {
        conn.execute(
            r#"
            INSERT INTO recurring_searches (
                search_id, tenant_id, project_id, query, search_type,
                schedule_interval_secs, sensitivity, recommended_sensitivity,
                confidence_threshold, volume_threshold, volume_threshold_percent,
                require_both_thresholds, custom_prompt, focus_areas,
                ignore_patterns, prompt_refinements, last_executed_at,
                created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19
            )
            "#,
            params![
                config.search_id.clone(),
                config.tenant_id.clone(),
                config.project_id.clone(),
                config.query.clone(),
                config.search_type.to_string(),
                config.schedule_interval_secs,
                config.sensitivity.to_string(),
                config.recommended_sensitivity.map(|s| s.to_string()),
                config.confidence_threshold.map(|v| v as f64),
                config.volume_threshold,
                config.volume_threshold_percent.map(|v| v as f64),
                config.require_both_thresholds as i32,
                config.custom_prompt.clone(),
                serde_json::to_string(&config.focus_areas)?,
                serde_json::to_string(&config.ignore_patterns)?,
                serde_json::to_string(&config.prompt_refinements)?,
                config.last_executed_at.map(|d| d.to_rfc3339()),
                config.created_at.to_rfc3339(),
                config.updated_at.to_rfc3339(),
            ],
        )
        .await?;

        Ok(())
    }

    pub async fn get(conn: &Connection, search_id: &str) -> Result<Option<RecurringSearchConfig>> {
        let mut rows = conn
            .query(
                "SELECT * FROM recurring_searches WHERE search_id = ?1",
                params![search_id],
            )
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(Self::row_to_config(&row)?))
        } else {
            Ok(None)
        }
    }

    pub async fn update(conn: &Connection, config: &RecurringSearchConfig) -> Result<()> {
        conn.execute(
            r#"
            UPDATE recurring_searches SET
                query = ?2,
                search_type = ?3,
                schedule_interval_secs = ?4,
                sensitivity = ?5,
                recommended_sensitivity = ?6,
                confidence_threshold = ?7,
                volume_threshold = ?8,
                volume_threshold_percent = ?9,
                require_both_thresholds = ?10,
                custom_prompt = ?11,
                focus_areas = ?12,
                ignore_patterns = ?13,
                prompt_refinements = ?14,
                updated_at = ?15
            WHERE search_id = ?1
            "#,
            params![
                config.search_id.clone(),
                config.query.clone(),
                config.search_type.to_string(),
                config.schedule_interval_secs,
                config.sensitivity.to_string(),
                config.recommended_sensitivity.map(|s| s.to_string()),
                config.confidence_threshold.map(|v| v as f64),
                config.volume_threshold,
                config.volume_threshold_percent.map(|v| v as f64),
                config.require_both_thresholds as i32,
                config.custom_prompt.clone(),
                serde_json::to_string(&config.focus_areas)?,
                serde_json::to_string(&config.ignore_patterns)?,
                serde_json::to_string(&config.prompt_refinements)?,
                Utc::now().to_rfc3339(),
            ],
        )
        .await?;

        Ok(())
    }

    pub async fn delete(conn: &Connection, search_id: &str) -> Result<bool> {
        let removed = conn
            .execute(
                "DELETE FROM recurring_searches WHERE search_id = ?1",
                params![search_id],
            )
            .await?;
        Ok(removed > 0)
    }

    pub async fn list(conn: &Connection, tenant_id: &str) -> Result<Vec<RecurringSearchConfig>> {
        let mut rows = conn
            .query(
                "SELECT * FROM recurring_searches WHERE tenant_id = ?1 ORDER BY created_at",
                params![tenant_id],
            )
            .await?;

        let mut configs = Vec::new();
        while let Some(row) = rows.next().await? {
            configs.push(Self::row_to_config(&row)?);
        }
        Ok(configs)
    }

    /// Searches with a schedule whose interval has elapsed (or that have
    /// never run). Times compared in the database to keep the scheduler
    /// tick cheap.
    pub async fn due(conn: &Connection, now: DateTime<Utc>) -> Result<Vec<RecurringSearchConfig>> {
        let mut rows = conn
            .query(
                r#"
                SELECT * FROM recurring_searches
                WHERE schedule_interval_secs IS NOT NULL
                  AND (
                    last_executed_at IS NULL
                    OR strftime('%s', ?1) - strftime('%s', last_executed_at) >= schedule_interval_secs
                  )
                "#,
                params![now.to_rfc3339()],
            )
            .await?;

        let mut configs = Vec::new();
        while let Some(row) = rows.next().await? {
            configs.push(Self::row_to_config(&row)?);
        }
        Ok(configs)
    }

    pub async fn set_last_executed(
        conn: &Connection,
        search_id: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        conn.execute(
            "UPDATE recurring_searches SET last_executed_at = ?2 WHERE search_id = ?1",
            params![search_id, at.to_rfc3339()],
        )
        .await?;
        Ok(())
    }

    pub async fn set_recommended_sensitivity(
        conn: &Connection,
        search_id: &str,
        sensitivity: Sensitivity,
    ) -> Result<()> {
        conn.execute(
            r#"
            UPDATE recurring_searches
            SET recommended_sensitivity = ?2, updated_at = ?3
            WHERE search_id = ?1
            "#,
            params![search_id, sensitivity.to_string(), Utc::now().to_rfc3339()],
        )
        .await?;
        Ok(())
    }

    fn row_to_config(row: &libsql::Row) -> Result<RecurringSearchConfig> {
        Ok(RecurringSearchConfig {
            search_id: row.get(0)?,
            tenant_id: row.get(1)?,
            project_id: row.get(2)?,
            query: row.get(3)?,
            search_type: row
                .get::<String>(4)?
                .parse()
                .unwrap_or(SearchType::General),
            schedule_interval_secs: row.get(5)?,
            sensitivity: row
                .get::<String>(6)?
                .parse()
                .unwrap_or(Sensitivity::Medium),
            recommended_sensitivity: row
                .get::<Option<String>>(7)?
                .and_then(|s| s.parse().ok()),
            confidence_threshold: row.get::<Option<f64>>(8)?.map(|v| v as f32),
            volume_threshold: row.get(9)?,
            volume_threshold_percent: row.get::<Option<f64>>(10)?.map(|v| v as f32),
            require_both_thresholds: row.get::<i32>(11)? != 0,
            custom_prompt: row.get(12)?,
            focus_areas: serde_json::from_str(&row.get::<String>(13)?).unwrap_or_default(),
            ignore_patterns: serde_json::from_str(&row.get::<String>(14)?).unwrap_or_default(),
            prompt_refinements: serde_json::from_str(&row.get::<String>(15)?).unwrap_or_default(),
            last_executed_at: parse_datetime_opt(row.get(16)?),
            created_at: parse_datetime(&row.get::<String>(17)?),
            updated_at: parse_datetime(&row.get::<String>(18)?),
        })
    }
}
