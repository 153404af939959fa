use chrono::{DateTime, Utc};
use libsql::{params, Connection};

use crate::error::Result;
use crate::models::{Alert, AlertStatus, FeedbackKind, NotificationRecord};

use super::{parse_datetime, parse_datetime_opt};

pub struct AlertRepository;

impl AlertRepository {
    pub async fn create(conn: &Connection, alert: &Alert) -> Result<()> {
        conn.execute(
            r#"
            INSERT INTO alerts (
                id, search_id, tenant_id, execution_id, triggered_at, confidence,
                summary, key_changes, reasoning, citations, status, feedback,
                feedback_comment, snooze_until, notifications
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
            params![
                alert.id.clone(),
                alert.search_id.clone(),
                alert.tenant_id.clone(),
                alert.execution_id.clone(),
                alert.triggered_at.to_rfc3339(),
                alert.confidence as f64,
                alert.summary.clone(),
                serde_json::to_string(&alert.key_changes)?,
                alert.reasoning.clone(),
                serde_json::to_string(&alert.citations)?,
                alert.status.to_string(),
                alert.feedback.map(|f| f.to_string()),
                alert.feedback_comment.clone(),
                alert.snooze_until.map(|d| d.to_rfc3339()),
                serde_json::to_string(&alert.notifications)?,
            ],
        )
        .await?;

        Ok(())
    }

    pub async fn exists(conn: &Connection, search_id: &str, execution_id: &str) -> Result<bool> {
        let mut rows = conn
            .query(
                "SELECT COUNT(*) FROM alerts WHERE search_id = ?1 AND execution_id = ?2",
                params![search_id, execution_id],
            )
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(row.get::<i64>(0)? > 0)
        } else {
            Ok(false)
        }
    }

    pub async fn get_by_id(conn: &Connection, id: &str) -> Result<Option<Alert>> {
        let mut rows = conn
            .query("SELECT * FROM alerts WHERE id = ?1", params![id])
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(Self::row_to_alert(&row)?))
        } else {
            Ok(None)
        }
    }

    pub async fn list(
        conn: &Connection,
        tenant_id: &str,
        search_id: Option<&str>,
        limit: u32,
    ) -> Result<Vec<Alert>> {
        let mut alerts = Vec::new();

        if let Some(search_id) = search_id {
            let mut rows = conn
                .query(
                    r#"
                    SELECT * FROM alerts WHERE tenant_id = ?1 AND search_id = ?2
                    ORDER BY triggered_at DESC LIMIT ?3
                    "#,
                    params![tenant_id, search_id, limit],
                )
                .await?;
            while let Some(row) = rows.next().await? {
                alerts.push(Self::row_to_alert(&row)?);
            }
        } else {
            let mut rows = conn
                .query(
                    "SELECT * FROM alerts WHERE tenant_id = ?1 ORDER BY triggered_at DESC LIMIT ?2",
                    params![tenant_id, limit],
                )
                .await?;
            while let Some(row) = rows.next().await? {
                alerts.push(Self::row_to_alert(&row)?);
            }
        }

        Ok(alerts)
    }

    pub async fn update_status(
        conn: &Connection,
        id: &str,
        status: AlertStatus,
        snooze_until: Option<DateTime<Utc>>,
    ) -> Result<()> {
        conn.execute(
            "UPDATE alerts SET status = ?2, snooze_until = ?3 WHERE id = ?1",
            params![
                id,
                status.to_string(),
                snooze_until.map(|d| d.to_rfc3339())
            ],
        )
        .await?;
        Ok(())
    }

    pub async fn set_feedback(
        conn: &Connection,
        id: &str,
        feedback: FeedbackKind,
        comment: Option<&str>,
    ) -> Result<()> {
        conn.execute(
            "UPDATE alerts SET feedback = ?2, feedback_comment = ?3 WHERE id = ?1",
            params![id, feedback.to_string(), comment],
        )
        .await?;
        Ok(())
    }

    pub async fn update_notifications(
        conn: &Connection,
        id: &str,
        notifications: &[NotificationRecord],
    ) -> Result<()> {
        conn.execute(
            "UPDATE alerts SET notifications = ?2 WHERE id = ?1",
            params![id, serde_json::to_string(notifications)?],
        )
        .await?;
        Ok(())
    }

    pub async fn latest_feedback(
        conn: &Connection,
        search_id: &str,
    ) -> Result<Option<FeedbackKind>> {
        let mut rows = conn
            .query(
                r#"
                SELECT feedback FROM alerts
                WHERE search_id = ?1
                ORDER BY triggered_at DESC LIMIT 1
                "#,
                params![search_id],
            )
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(row.get::<Option<String>>(0)?.and_then(|s| s.parse().ok()))
        } else {
            Ok(None)
        }
    }

    pub async fn recent_irrelevant(
        conn: &Connection,
        search_id: &str,
        limit: u32,
    ) -> Result<Vec<Alert>> {
        let mut rows = conn
            .query(
                r#"
                SELECT * FROM alerts
                WHERE search_id = ?1 AND feedback = 'irrelevant'
                ORDER BY triggered_at DESC LIMIT ?2
                "#,
                params![search_id, limit],
            )
            .await?;

        let mut alerts = Vec::new();
        while let Some(row) = rows.next().await? {
            alerts.push(Self::row_to_alert(&row)?);
        }
        Ok(alerts)
    }

    fn row_to_alert(row: &libsql::Row) -> Result<Alert> {
        Ok(Alert {
            id: row.get(0)?,
            search_id: row.get(1)?,
            tenant_id: row.get(2)?,
            execution_id: row.get(3)?,
            triggered_at: parse_datetime(&row.get::<String>(4)?),
            confidence: row.get::<f64>(5)? as f32,
            summary: row.get(6)?,
            key_changes: serde_json::from_str(&row.get::<String>(7)?).unwrap_or_default(),
            reasoning: row.get(8)?,
            citations: serde_json::from_str(&row.get::<String>(9)?).unwrap_or_default(),
            status: row
                .get::<String>(10)?
                .parse()
                .unwrap_or(AlertStatus::Unread),
            feedback: row.get::<Option<String>>(11)?.and_then(|s| s.parse().ok()),
            feedback_comment: row.get(12)?,
            snooze_until: parse_datetime_opt(row.get(13)?),
            notifications: serde_json::from_str(&row.get::<String>(14)?).unwrap_or_default(),
        })
    }
}
