//! PostgreSQL access for interaction records

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow};
use sqlx::{Connection, Row};
use tracing::{debug, warn};

use super::InteractionSource;
use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::models::{InteractionFilter, InteractionRecord};

/// Interactions joined with their optional evaluation.
///
/// Casts pin the column types the row mapper expects regardless of how the
/// tables declare them.
const FETCH_INTERACTIONS: &str = r#"
    SELECT CAST(i.created_at AS TIMESTAMP) AS created_at,
           CAST(i.input AS TEXT) AS input,
           CAST(i.output AS TEXT) AS output,
           CAST(COALESCE(i.token_count, 0) AS BIGINT) AS token_count,
           CAST(COALESCE(i.total_cost_usd, 0) AS DOUBLE PRECISION) AS total_cost_usd,
           CAST(i.email AS TEXT) AS email,
           CAST(e.stars AS INTEGER) AS stars,
           CAST(e.text AS TEXT) AS text,
           CAST(i.id AS TEXT) AS id
    FROM wk_interaction i
    LEFT JOIN wk_evaluation e ON i.id = e.interaction_id
    WHERE i.email LIKE $1 ESCAPE '\'
      AND i.created_at >= $2
      AND i.created_at < $3
"#;

/// Repository for interaction reads.
///
/// Opens a fresh connection for every call and closes it afterwards; there
/// is no pool and no retry.
#[derive(Clone)]
pub struct InteractionRepository {
    options: PgConnectOptions,
}

impl InteractionRepository {
    /// Create a repository for the configured database
    pub fn new(config: &DatabaseConfig) -> Self {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .database(&config.name)
            .username(&config.user)
            .password(&config.password)
            .application_name("dldata");

        Self { options }
    }

    /// Health check
    pub async fn health_check(&self) -> Result<()> {
        let mut conn = PgConnection::connect_with(&self.options).await?;
        let result = sqlx::query("SELECT 1").execute(&mut conn).await;
        close(conn).await;
        result?;
        Ok(())
    }
}

#[async_trait]
impl InteractionSource for InteractionRepository {
    async fn fetch(&self, filter: &InteractionFilter) -> Result<Vec<InteractionRecord>> {
        let (start, end) = filter.timestamp_bounds();

        let mut conn = PgConnection::connect_with(&self.options).await?;
        let rows = sqlx::query(FETCH_INTERACTIONS)
            .bind(filter.like_pattern())
            .bind(start)
            .bind(end)
            .fetch_all(&mut conn)
            .await;
        close(conn).await;

        let rows = rows?;
        debug!(rows = rows.len(), "Fetched interactions");

        rows.iter().map(row_to_record).collect()
    }
}

async fn close(conn: PgConnection) {
    if let Err(e) = conn.close().await {
        warn!(error = %e, "Failed to close database connection cleanly");
    }
}

fn row_to_record(row: &PgRow) -> Result<InteractionRecord> {
    Ok(InteractionRecord {
        created_at: row.try_get("created_at")?,
        input: row.try_get("input")?,
        output: row.try_get("output")?,
        token_count: row.try_get("token_count")?,
        total_cost_usd: row.try_get("total_cost_usd")?,
        email: row.try_get("email")?,
        stars: row.try_get("stars")?,
        text: row.try_get("text")?,
        id: row.try_get("id")?,
    })
}
