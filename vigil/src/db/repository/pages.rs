use chrono::{DateTime, Utc};
use libsql::{params, Connection};

use crate::error::Result;
use crate::models::{SearchType, WebPageDocument};

use super::{parse_datetime, parse_datetime_opt};

pub struct PageRepository;

impl PageRepository {
    pub async fn put(conn: &Connection, page: &WebPageDocument) -> Result<()> {
        conn.execute(
            r#"
            INSERT OR REPLACE INTO web_pages (
                id, tenant_id, project_id, source_query, url, content, title,
                author, publish_date, search_type, scraped_at, expires_at,
                chunks, conversation_id, recurring_search_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
            params![
                page.id.clone(),
                page.tenant_id.clone(),
                page.project_id.clone(),
                page.source_query.clone(),
                page.url.clone(),
                page.content.clone(),
                page.title.clone(),
                page.author.clone(),
                page.publish_date.map(|d| d.to_rfc3339()),
                page.search_type.to_string(),
                page.scraped_at.to_rfc3339(),
                page.expires_at.to_rfc3339(),
                serde_json::to_string(&page.chunks)?,
                page.conversation_id.clone(),
                page.recurring_search_id.clone(),
            ],
        )
        .await?;

        Ok(())
    }

    /// All reads filter on `expires_at` so a lagging sweep can never leak
    /// an expired page into results.
    pub async fn query_recent(
        conn: &Connection,
        tenant_id: &str,
        project_id: &str,
        source_query: &str,
        since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<WebPageDocument>> {
        let mut rows = conn
            .query(
                r#"
                SELECT * FROM web_pages
                WHERE tenant_id = ?1 AND project_id = ?2 AND source_query = ?3
                  AND scraped_at >= ?4 AND expires_at > ?5
                ORDER BY scraped_at DESC
                "#,
                params![
                    tenant_id,
                    project_id,
                    source_query,
                    since.to_rfc3339(),
                    now.to_rfc3339()
                ],
            )
            .await?;

        let mut pages = Vec::new();
        while let Some(row) = rows.next().await? {
            pages.push(Self::row_to_page(&row)?);
        }
        Ok(pages)
    }

    pub async fn sweep_expired(conn: &Connection, now: DateTime<Utc>) -> Result<u64> {
        let removed = conn
            .execute(
                "DELETE FROM web_pages WHERE expires_at <= ?1",
                params![now.to_rfc3339()],
            )
            .await?;
        Ok(removed)
    }

    fn row_to_page(row: &libsql::Row) -> Result<WebPageDocument> {
        Ok(WebPageDocument {
            id: row.get(0)?,
            tenant_id: row.get(1)?,
            project_id: row.get(2)?,
            source_query: row.get(3)?,
            url: row.get(4)?,
            content: row.get(5)?,
            title: row.get(6)?,
            author: row.get(7)?,
            publish_date: parse_datetime_opt(row.get(8)?),
            search_type: row
                .get::<String>(9)?
                .parse()
                .unwrap_or(SearchType::General),
            scraped_at: parse_datetime(&row.get::<String>(10)?),
            expires_at: parse_datetime(&row.get::<String>(11)?),
            chunks: serde_json::from_str(&row.get::<String>(12)?).unwrap_or_default(),
            conversation_id: row.get(13)?,
            recurring_search_id: row.get(14)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;
    use crate::models::PageChunk;
    use chrono::Duration;

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

    fn page(id: &str, ttl_days: i64) -> WebPageDocument {
        let mut p = WebPageDocument::new(
            id.to_string(),
            "t1".into(),
            "p1".into(),
            "rust news".into(),
            format!("https://example.org/{id}"),
            SearchType::News,
            ttl_days,
        );
        p.content = "Rust 1.80 is out.".into();
        p.chunks = vec![PageChunk {
            text: "Rust 1.80 is out.".into(),
            embedding: vec![0.1, 0.2],
            start_index: 0,
        }];
        p
    }

    #[tokio::test]
    async fn test_put_and_query_recent() {
        let conn = setup_test_db().await;
        PageRepository::put(&conn, &page("pg1", 30)).await.unwrap();

        let now = Utc::now();
        let since = now - Duration::days(1);
        let pages = PageRepository::query_recent(&conn, "t1", "p1", "rust news", since, now)
            .await
            .unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].chunks.len(), 1);
        assert_eq!(pages[0].chunks[0].start_index, 0);
    }

    #[tokio::test]
    async fn test_query_recent_is_partition_scoped() {
        let conn = setup_test_db().await;
        PageRepository::put(&conn, &page("pg1", 30)).await.unwrap();

        let now = Utc::now();
        let since = now - Duration::days(1);
        // Different tenant sees nothing.
        let pages = PageRepository::query_recent(&conn, "t2", "p1", "rust news", since, now)
            .await
            .unwrap();
        assert!(pages.is_empty());
        // Different query sees nothing.
        let pages = PageRepository::query_recent(&conn, "t1", "p1", "go news", since, now)
            .await
            .unwrap();
        assert!(pages.is_empty());
    }

    #[tokio::test]
    async fn test_expired_pages_invisible_before_sweep() {
        let conn = setup_test_db().await;
        // TTL of zero days: expires_at == scraped_at.
        PageRepository::put(&conn, &page("pg1", 0)).await.unwrap();

        let now = Utc::now() + Duration::seconds(1);
        let since = now - Duration::days(1);
        let pages = PageRepository::query_recent(&conn, "t1", "p1", "rust news", since, now)
            .await
            .unwrap();
        assert!(pages.is_empty(), "expired page must not be visible");

        // The row still physically exists until the sweeper runs.
        let removed = PageRepository::sweep_expired(&conn, now).await.unwrap();
        assert_eq!(removed, 1);
    }

    #[tokio::test]
    async fn test_sweep_keeps_live_pages() {
        let conn = setup_test_db().await;
        PageRepository::put(&conn, &page("live", 30)).await.unwrap();
        PageRepository::put(&conn, &page("dead", 0)).await.unwrap();

        let now = Utc::now() + Duration::seconds(1);
        let removed = PageRepository::sweep_expired(&conn, now).await.unwrap();
        assert_eq!(removed, 1);

        let pages =
            PageRepository::query_recent(&conn, "t1", "p1", "rust news", now - Duration::days(1), now)
                .await
                .unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].id, "live");
    }
}
