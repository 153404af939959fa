use libsql::{params, Connection};

use crate::error::Result;
use crate::models::{AlertFeedback, FeedbackKind};

use super::parse_datetime;

pub struct FeedbackRepository;

impl FeedbackRepository {
    pub async fn append(conn: &Connection, feedback: &AlertFeedback) -> Result<()> {
        conn.execute(
            r#"
            INSERT INTO alert_feedback (
                id, alert_id, search_id, user_id, feedback, comment, provided_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                feedback.id.clone(),
                feedback.alert_id.clone(),
                feedback.search_id.clone(),
                feedback.user_id.clone(),
                feedback.feedback.to_string(),
                feedback.comment.clone(),
                feedback.provided_at.to_rfc3339(),
            ],
        )
        .await?;

        Ok(())
    }

    pub async fn count_for_search(conn: &Connection, search_id: &str) -> Result<i64> {
        let mut rows = conn
            .query(
                "SELECT COUNT(*) FROM alert_feedback WHERE search_id = ?1",
                params![search_id],
            )
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(row.get(0)?)
        } else {
            Ok(0)
        }
    }

    pub async fn recent_for_search(
        conn: &Connection,
        search_id: &str,
        limit: u32,
    ) -> Result<Vec<AlertFeedback>> {
        let mut rows = conn
            .query(
                r#"
                SELECT * FROM alert_feedback
                WHERE search_id = ?1
                ORDER BY provided_at DESC LIMIT ?2
                "#,
                params![search_id, limit],
            )
            .await?;

        let mut entries = Vec::new();
        while let Some(row) = rows.next().await? {
            entries.push(Self::row_to_feedback(&row)?);
        }
        Ok(entries)
    }

    fn row_to_feedback(row: &libsql::Row) -> Result<AlertFeedback> {
        Ok(AlertFeedback {
            id: row.get(0)?,
            alert_id: row.get(1)?,
            search_id: row.get(2)?,
            user_id: row.get(3)?,
            feedback: row
                .get::<String>(4)?
                .parse()
                .unwrap_or(FeedbackKind::Relevant),
            comment: row.get(5)?,
            provided_at: parse_datetime(&row.get::<String>(6)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;
    use chrono::Utc;

    async fn setup_test_db() -> Connection {
        let conn = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .unwrap()
            .connect()
            .unwrap();
        // libsql enforces foreign keys by default; these fixtures reference
        // alerts that are not inserted, matching plain-SQLite defaults.
        conn.execute_batch("PRAGMA foreign_keys = OFF").await.unwrap();
        schema::init_schema(&conn).await.unwrap();
        conn
    }

    fn feedback(id: &str, kind: FeedbackKind) -> AlertFeedback {
        AlertFeedback {
            id: id.to_string(),
            alert_id: "a1".into(),
            search_id: "s1".into(),
            user_id: "u1".into(),
            feedback: kind,
            comment: None,
            provided_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_append_and_count() {
        let conn = setup_test_db().await;
        FeedbackRepository::append(&conn, &feedback("f1", FeedbackKind::Relevant))
            .await
            .unwrap();
        FeedbackRepository::append(&conn, &feedback("f2", FeedbackKind::Irrelevant))
            .await
            .unwrap();

        assert_eq!(
            FeedbackRepository::count_for_search(&conn, "s1").await.unwrap(),
            2
        );
        assert_eq!(
            FeedbackRepository::count_for_search(&conn, "other").await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_recent_respects_limit() {
        let conn = setup_test_db().await;
        for i in 0..5 {
            FeedbackRepository::append(&conn, &feedback(&format!("f{i}"), FeedbackKind::Snooze))
                .await
                .unwrap();
        }

        let recent = FeedbackRepository::recent_for_search(&conn, "s1", 3)
            .await
            .unwrap();
        assert_eq!(recent.len(), 3);
    }
}
