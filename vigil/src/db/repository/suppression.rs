use chrono::Utc;
use libsql::{params, Connection};

use crate::error::Result;
use crate::models::{RuleOrigin, RuleType, SuppressionRule};

use super::{parse_datetime, parse_datetime_opt};

pub struct SuppressionRepository;

impl SuppressionRepository {
    pub async fn create(conn: &Connection, rule: &SuppressionRule) -> Result<()> {
        conn.execute(
            r#"
            INSERT INTO suppression_rules (
                id, search_id, tenant_id, rule_type, condition, created_by,
                applied_count, effectiveness, created_at, deleted_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                rule.id.clone(),
                rule.search_id.clone(),
                rule.tenant_id.clone(),
                rule.rule_type.to_string(),
                rule.condition.clone(),
                rule.created_by.to_string(),
                rule.applied_count,
                rule.effectiveness as f64,
                rule.created_at.to_rfc3339(),
                rule.deleted_at.map(|d| d.to_rfc3339()),
            ],
        )
        .await?;

        Ok(())
    }

    pub async fn active_for_search(
        conn: &Connection,
        search_id: &str,
    ) -> Result<Vec<SuppressionRule>> {
        let mut rows = conn
            .query(
                r#"
                SELECT * FROM suppression_rules
                WHERE search_id = ?1 AND deleted_at IS NULL
                ORDER BY created_at
                "#,
                params![search_id],
            )
            .await?;

        let mut rules = Vec::new();
        while let Some(row) = rows.next().await? {
            rules.push(Self::row_to_rule(&row)?);
        }
        Ok(rules)
    }

    pub async fn soft_delete(conn: &Connection, id: &str) -> Result<bool> {
        let updated = conn
            .execute(
                "UPDATE suppression_rules SET deleted_at = ?2 WHERE id = ?1 AND deleted_at IS NULL",
                params![id, Utc::now().to_rfc3339()],
            )
            .await?;
        Ok(updated > 0)
    }

    pub async fn bump_applied_count(conn: &Connection, id: &str) -> Result<()> {
        conn.execute(
            "UPDATE suppression_rules SET applied_count = applied_count + 1 WHERE id = ?1",
            params![id],
        )
        .await?;
        Ok(())
    }

    fn row_to_rule(row: &libsql::Row) -> Result<SuppressionRule> {
        Ok(SuppressionRule {
            id: row.get(0)?,
            search_id: row.get(1)?,
            tenant_id: row.get(2)?,
            rule_type: row.get::<String>(3)?.parse().unwrap_or(RuleType::Keyword),
            condition: row.get(4)?,
            created_by: row.get::<String>(5)?.parse().unwrap_or(RuleOrigin::User),
            applied_count: row.get(6)?,
            effectiveness: row.get::<f64>(7)? as f32,
            created_at: parse_datetime(&row.get::<String>(8)?),
            deleted_at: parse_datetime_opt(row.get(9)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;

    async fn setup_test_db() -> Connection {
        let conn = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .unwrap()
            .connect()
            .unwrap();
        schema::init_schema(&conn).await.unwrap();
        conn
    }

    fn rule(id: &str, search_id: &str) -> SuppressionRule {
        SuppressionRule {
            id: id.to_string(),
            search_id: search_id.to_string(),
            tenant_id: "t1".into(),
            rule_type: RuleType::Source,
            condition: "spamnews.example".into(),
            created_by: RuleOrigin::LearningSystem,
            applied_count: 0,
            effectiveness: 0.0,
            created_at: Utc::now(),
            deleted_at: None,
        }
    }

    #[tokio::test]
    async fn test_active_excludes_soft_deleted() {
        let conn = setup_test_db().await;
        SuppressionRepository::create(&conn, &rule("r1", "s1"))
            .await
            .unwrap();
        SuppressionRepository::create(&conn, &rule("r2", "s1"))
            .await
            .unwrap();

        assert!(SuppressionRepository::soft_delete(&conn, "r1").await.unwrap());

        let active = SuppressionRepository::active_for_search(&conn, "s1")
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, "r2");

        // Deleting twice is a no-op.
        assert!(!SuppressionRepository::soft_delete(&conn, "r1").await.unwrap());
    }

    #[tokio::test]
    async fn test_bump_applied_count() {
        let conn = setup_test_db().await;
        SuppressionRepository::create(&conn, &rule("r1", "s1"))
            .await
            .unwrap();
        SuppressionRepository::bump_applied_count(&conn, "r1")
            .await
            .unwrap();
        SuppressionRepository::bump_applied_count(&conn, "r1")
            .await
            .unwrap();

        let active = SuppressionRepository::active_for_search(&conn, "s1")
            .await
            .unwrap();
        assert_eq!(active[0].applied_count, 2);
    }
}
