use libsql::{params, Connection};

use crate::error::Result;
use crate::models::{AnalysisState, SearchExecution, SearchType};

use super::parse_datetime;

pub struct ExecutionRepository;

impl ExecutionRepository {
    pub async fn create(conn: &Connection, execution: &SearchExecution) -> Result<()> {
        conn.execute(
            r#"
            INSERT INTO search_executions (
                id, tenant_id, project_id, search_id, query, search_type,
                executed_at, results, previous_execution_id, seq, analysis_state
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                execution.id.clone(),
                execution.tenant_id.clone(),
                execution.project_id.clone(),
                execution.search_id.clone(),
                execution.query.clone(),
                execution.search_type.to_string(),
                execution.executed_at.to_rfc3339(),
                serde_json::to_string(&execution.results)?,
                execution.previous_execution_id.clone(),
                execution.seq,
                execution.analysis_state.to_string(),
            ],
        )
        .await?;

        Ok(())
    }

    pub async fn get_by_id(conn: &Connection, id: &str) -> Result<Option<SearchExecution>> {
        let mut rows = conn
            .query("SELECT * FROM search_executions WHERE id = ?1", params![id])
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(Self::row_to_execution(&row)?))
        } else {
            Ok(None)
        }
    }

    pub async fn latest(conn: &Connection, search_id: &str) -> Result<Option<SearchExecution>> {
        let mut rows = conn
            .query(
                "SELECT * FROM search_executions WHERE search_id = ?1 ORDER BY seq DESC LIMIT 1",
                params![search_id],
            )
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(Self::row_to_execution(&row)?))
        } else {
            Ok(None)
        }
    }

    pub async fn set_analysis_state(
        conn: &Connection,
        id: &str,
        state: AnalysisState,
    ) -> Result<()> {
        conn.execute(
            "UPDATE search_executions SET analysis_state = ?2 WHERE id = ?1",
            params![id, state.to_string()],
        )
        .await?;

        Ok(())
    }

    pub async fn max_terminal_seq(conn: &Connection, search_id: &str) -> Result<Option<i64>> {
        let mut rows = conn
            .query(
                r#"
                SELECT MAX(seq) FROM search_executions
                WHERE search_id = ?1 AND analysis_state != 'pending'
                "#,
                params![search_id],
            )
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(row.get::<Option<i64>>(0)?)
        } else {
            Ok(None)
        }
    }

    pub async fn next_seq(conn: &Connection, search_id: &str) -> Result<i64> {
        let mut rows = conn
            .query(
                "SELECT COALESCE(MAX(seq), 0) + 1 FROM search_executions WHERE search_id = ?1",
                params![search_id],
            )
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(row.get(0)?)
        } else {
            Ok(1)
        }
    }

    fn row_to_execution(row: &libsql::Row) -> Result<SearchExecution> {
        Ok(SearchExecution {
            id: row.get(0)?,
            tenant_id: row.get(1)?,
            project_id: row.get(2)?,
            search_id: row.get(3)?,
            query: row.get(4)?,
            search_type: row
                .get::<String>(5)?
                .parse()
                .unwrap_or(SearchType::General),
            executed_at: parse_datetime(&row.get::<String>(6)?),
            results: serde_json::from_str(&row.get::<String>(7)?).unwrap_or_default(),
            previous_execution_id: row.get(8)?,
            seq: row.get(9)?,
            analysis_state: row
                .get::<String>(10)?
                .parse()
                .unwrap_or(AnalysisState::Pending),
        })
    }
}
