// SQLite PageSource Implementation
//
// Generic paginated reader over any table with a stable ascending sort
// column, for jobs that walk the platform's own database. The cursor is
// bound into `order_col > ?`; SQLite's column affinity makes the
// comparison numeric for INTEGER columns and lexicographic for TEXT ones,
// so both rowids and timestamp strings work as cursors.

use async_trait::async_trait;
use backfill_core::domain::{BatchItem, Cursor};
use backfill_core::error::{AppError, Result};
use backfill_core::port::PageSource;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, SqlitePool};

/// Decode one payload column as text, regardless of the column's storage
/// class. INTEGER and REAL values surface as their string rendering so
/// eligibility predicates can compare them the way they compare TEXT
/// columns; only NULL (and undecodable blobs) become JSON null.
fn payload_value(row: &SqliteRow, name: &str) -> serde_json::Value {
    if let Ok(Some(text)) = row.try_get::<Option<String>, _>(name) {
        return serde_json::Value::String(text);
    }
    if let Ok(Some(int)) = row.try_get::<Option<i64>, _>(name) {
        return serde_json::Value::String(int.to_string());
    }
    if let Ok(Some(real)) = row.try_get::<Option<f64>, _>(name) {
        return serde_json::Value::String(real.to_string());
    }
    serde_json::Value::Null
}

fn valid_identifier(s: &str) -> bool {
    !s.is_empty()
        && s.chars().next().map(|c| c.is_ascii_alphabetic() || c == '_').unwrap_or(false)
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Which table and columns to page over
#[derive(Debug, Clone)]
pub struct SourceQuery {
    table: String,
    id_column: String,
    order_column: String,
    /// Extra columns exposed in the item payload (eligibility testing).
    /// Values surface as their text rendering; NULL stays null.
    payload_columns: Vec<String>,
}

impl SourceQuery {
    pub fn new(
        table: impl Into<String>,
        id_column: impl Into<String>,
        order_column: impl Into<String>,
        payload_columns: Vec<String>,
    ) -> Result<Self> {
        let query = Self {
            table: table.into(),
            id_column: id_column.into(),
            order_column: order_column.into(),
            payload_columns,
        };
        for ident in std::iter::once(&query.table)
            .chain(std::iter::once(&query.id_column))
            .chain(std::iter::once(&query.order_column))
            .chain(query.payload_columns.iter())
        {
            if !valid_identifier(ident) {
                return Err(AppError::Config(format!(
                    "Invalid SQL identifier in source query: {ident:?}"
                )));
            }
        }
        Ok(query)
    }
}

/// Paginated fetcher over a local SQLite table
pub struct SqliteRecordSource {
    pool: SqlitePool,
    query: SourceQuery,
}

impl SqliteRecordSource {
    pub fn new(pool: SqlitePool, query: SourceQuery) -> Self {
        Self { pool, query }
    }

    fn select_clause(&self) -> String {
        let mut columns = vec![
            format!("CAST({} AS TEXT) AS item_id", self.query.id_column),
            format!("CAST({} AS TEXT) AS item_order_key", self.query.order_column),
        ];
        for col in &self.query.payload_columns {
            columns.push(col.clone());
        }
        columns.join(", ")
    }
}

#[async_trait]
impl PageSource for SqliteRecordSource {
    async fn fetch_page(&self, after: Option<&Cursor>, limit: u32) -> Result<Vec<BatchItem>> {
        let sql = match after {
            Some(_) => format!(
                "SELECT {} FROM {} WHERE {} > ? ORDER BY {} ASC LIMIT ?",
                self.select_clause(),
                self.query.table,
                self.query.order_column,
                self.query.order_column,
            ),
            None => format!(
                "SELECT {} FROM {} ORDER BY {} ASC LIMIT ?",
                self.select_clause(),
                self.query.table,
                self.query.order_column,
            ),
        };

        let mut query = sqlx::query(&sql);
        if let Some(cursor) = after {
            query = query.bind(cursor.as_str());
        }
        let rows = query
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let items = rows
            .into_iter()
            .map(|row| {
                let id: String = row.get("item_id");
                let order_key: String = row.get("item_order_key");
                let mut payload = serde_json::Map::new();
                for col in row.columns() {
                    let name = col.name();
                    if name == "item_id" || name == "item_order_key" {
                        continue;
                    }
                    payload.insert(name.to_string(), payload_value(&row, name));
                }
                BatchItem::new(id, Cursor::new(order_key), serde_json::Value::Object(payload))
            })
            .collect();
        Ok(items)
    }

    async fn count(&self) -> Result<Option<u64>> {
        let sql = format!("SELECT COUNT(*) FROM {}", self.query.table);
        let count: i64 = sqlx::query_scalar(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(Some(count as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::create_pool;

    async fn seeded_pool(rows: i64) -> SqlitePool {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        sqlx::query(
            "CREATE TABLE wiki_entries (id INTEGER PRIMARY KEY, title TEXT, content TEXT)",
        )
        .execute(&pool)
        .await
        .unwrap();
        for i in 1..=rows {
            sqlx::query("INSERT INTO wiki_entries (id, title, content) VALUES (?, ?, ?)")
                .bind(i)
                .bind(format!("Entry {i}"))
                .bind(if i % 2 == 0 { Some("filled") } else { None })
                .execute(&pool)
                .await
                .unwrap();
        }
        pool
    }

    fn query() -> SourceQuery {
        SourceQuery::new(
            "wiki_entries",
            "id",
            "id",
            vec!["title".to_string(), "content".to_string()],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn pages_are_ordered_and_bounded() {
        let source = SqliteRecordSource::new(seeded_pool(12).await, query());

        let first = source.fetch_page(None, 5).await.unwrap();
        assert_eq!(first.len(), 5);
        assert_eq!(first[0].id, "1");
        assert_eq!(first[4].id, "5");

        // Strictly-greater bound: numeric comparison despite the text cursor
        let next = source
            .fetch_page(Some(&Cursor::new("5")), 5)
            .await
            .unwrap();
        assert_eq!(next[0].id, "6");
        assert_eq!(next.len(), 5);

        let tail = source
            .fetch_page(Some(&Cursor::new("10")), 5)
            .await
            .unwrap();
        assert_eq!(tail.len(), 2);

        let empty = source
            .fetch_page(Some(&Cursor::new("12")), 5)
            .await
            .unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn payload_columns_are_exposed() {
        let source = SqliteRecordSource::new(seeded_pool(2).await, query());
        let page = source.fetch_page(None, 10).await.unwrap();

        assert_eq!(page[0].payload["title"], "Entry 1");
        assert!(page[0].payload["content"].is_null());
        assert_eq!(page[1].payload["content"], "filled");
        assert_eq!(page[0].label(), "Entry 1");
    }

    #[tokio::test]
    async fn non_text_payload_columns_decode_as_text() {
        // A migration job reads an INTEGER version column; the predicate
        // compares it as a string, so rows at the target version must not
        // decode to null (null reads as "still needs work" forever).
        let pool = create_pool("sqlite::memory:").await.unwrap();
        sqlx::query(
            "CREATE TABLE wiki_entries (id INTEGER PRIMARY KEY, metadata_version INTEGER, score REAL)",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query("INSERT INTO wiki_entries (id, metadata_version, score) VALUES (1, 2, 4.5)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO wiki_entries (id, metadata_version, score) VALUES (2, NULL, NULL)")
            .execute(&pool)
            .await
            .unwrap();

        let source = SqliteRecordSource::new(
            pool,
            SourceQuery::new(
                "wiki_entries",
                "id",
                "id",
                vec!["metadata_version".to_string(), "score".to_string()],
            )
            .unwrap(),
        );
        let page = source.fetch_page(None, 10).await.unwrap();

        assert_eq!(page[0].payload["metadata_version"], "2");
        assert_eq!(page[0].payload["score"], "4.5");
        assert!(page[1].payload["metadata_version"].is_null());
        assert!(page[1].payload["score"].is_null());
    }

    #[tokio::test]
    async fn count_reports_table_size() {
        let source = SqliteRecordSource::new(seeded_pool(7).await, query());
        assert_eq!(source.count().await.unwrap(), Some(7));
    }

    #[tokio::test]
    async fn identifiers_are_validated() {
        assert!(SourceQuery::new("wiki; DROP TABLE x", "id", "id", vec![]).is_err());
        assert!(SourceQuery::new("wiki_entries", "id", "created at", vec![]).is_err());
        assert!(SourceQuery::new("wiki_entries", "id", "id", vec!["ok_col".into()]).is_ok());
    }
}
