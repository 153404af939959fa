use libsql::Connection;

use crate::error::Result;

pub async fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- One row per run of a search. Immutable apart from analysis_state.
        CREATE TABLE IF NOT EXISTS search_executions (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            project_id TEXT NOT NULL,
            search_id TEXT NOT NULL,
            query TEXT NOT NULL,
            search_type TEXT NOT NULL DEFAULT 'general',
            executed_at TEXT NOT NULL,
            results TEXT NOT NULL DEFAULT '[]',
            previous_execution_id TEXT,
            seq INTEGER NOT NULL,
            analysis_state TEXT NOT NULL DEFAULT 'pending'
        );

        CREATE INDEX IF NOT EXISTS idx_executions_search_id ON search_executions(search_id, seq);
        CREATE INDEX IF NOT EXISTS idx_executions_tenant ON search_executions(tenant_id, project_id);

        -- Scraped result pages with chunk embeddings and a hard TTL.
        CREATE TABLE IF NOT EXISTS web_pages (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            project_id TEXT NOT NULL,
            source_query TEXT NOT NULL,
            url TEXT NOT NULL,
            content TEXT NOT NULL DEFAULT '',
            title TEXT,
            author TEXT,
            publish_date TEXT,
            search_type TEXT NOT NULL DEFAULT 'general',
            scraped_at TEXT NOT NULL,
            expires_at TEXT NOT NULL,
            chunks TEXT NOT NULL DEFAULT '[]',
            conversation_id TEXT,
            recurring_search_id TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_web_pages_partition
            ON web_pages(tenant_id, project_id, source_query);
        CREATE INDEX IF NOT EXISTS idx_web_pages_expires_at ON web_pages(expires_at);
        CREATE INDEX IF NOT EXISTS idx_web_pages_search_type ON web_pages(search_type);
        CREATE INDEX IF NOT EXISTS idx_web_pages_scraped_at ON web_pages(scraped_at);

        -- Recurring search configs, one per watched query.
        CREATE TABLE IF NOT EXISTS recurring_searches (
            search_id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            project_id TEXT NOT NULL,
            query TEXT NOT NULL,
            search_type TEXT NOT NULL DEFAULT 'general',
            schedule_interval_secs INTEGER,
            sensitivity TEXT NOT NULL DEFAULT 'medium',
            recommended_sensitivity TEXT,
            confidence_threshold REAL,
            volume_threshold INTEGER,
            volume_threshold_percent REAL,
            require_both_thresholds INTEGER NOT NULL DEFAULT 0,
            custom_prompt TEXT,
            focus_areas TEXT NOT NULL DEFAULT '[]',
            ignore_patterns TEXT NOT NULL DEFAULT '[]',
            prompt_refinements TEXT NOT NULL DEFAULT '[]',
            last_executed_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_recurring_tenant ON recurring_searches(tenant_id);

        -- Alerts. The unique index is the idempotency backstop: at most
        -- one alert per (search_id, execution_id).
        CREATE TABLE IF NOT EXISTS alerts (
            id TEXT PRIMARY KEY,
            search_id TEXT NOT NULL,
            tenant_id TEXT NOT NULL,
            execution_id TEXT NOT NULL,
            triggered_at TEXT NOT NULL,
            confidence REAL NOT NULL,
            summary TEXT NOT NULL,
            key_changes TEXT NOT NULL DEFAULT '[]',
            reasoning TEXT NOT NULL DEFAULT '',
            citations TEXT NOT NULL DEFAULT '[]',
            status TEXT NOT NULL DEFAULT 'unread',
            feedback TEXT,
            feedback_comment TEXT,
            snooze_until TEXT,
            notifications TEXT NOT NULL DEFAULT '[]'
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_alerts_search_execution
            ON alerts(search_id, execution_id);
        CREATE INDEX IF NOT EXISTS idx_alerts_tenant ON alerts(tenant_id);
        CREATE INDEX IF NOT EXISTS idx_alerts_triggered_at ON alerts(triggered_at);

        -- Suppression rules (user- or learning-created), soft-deletable.
        CREATE TABLE IF NOT EXISTS suppression_rules (
            id TEXT PRIMARY KEY,
            search_id TEXT NOT NULL,
            tenant_id TEXT NOT NULL,
            rule_type TEXT NOT NULL,
            condition TEXT NOT NULL,
            created_by TEXT NOT NULL DEFAULT 'user',
            applied_count INTEGER NOT NULL DEFAULT 0,
            effectiveness REAL NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            deleted_at TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_rules_search_id ON suppression_rules(search_id);

        -- Append-only user feedback on alerts.
        CREATE TABLE IF NOT EXISTS alert_feedback (
            id TEXT PRIMARY KEY,
            alert_id TEXT NOT NULL,
            search_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            feedback TEXT NOT NULL,
            comment TEXT,
            provided_at TEXT NOT NULL,
            FOREIGN KEY (alert_id) REFERENCES alerts(id)
        );

        CREATE INDEX IF NOT EXISTS idx_feedback_search_id ON alert_feedback(search_id, provided_at);
        "#,
    )
    .await?;

    Ok(())
}
