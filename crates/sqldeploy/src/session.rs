//! Database sessions.
//!
//! A session is the single connection a run deploys through: it opens the
//! connection, owns the transaction, switches the current catalog and
//! executes raw SQL. [`PgSession`] talks to PostgreSQL, where a catalog is a
//! schema selected through `search_path`. [`NullSession`] stands in when
//! only a SQL file is generated.

use sqlx::{Connection, PgConnection};
use tracing::debug;

use crate::error::{DeployError, Result};
use crate::metadata::quote_identifier;

/// Connection capability used by a deployment run.
#[allow(async_fn_in_trait)]
pub trait SqlSession {
    /// Opens the connection to a server.
    async fn open(&mut self, server: &str) -> Result<()>;

    /// Starts the run's transaction.
    async fn begin_transaction(&mut self) -> Result<()>;

    /// Commits the run's transaction, if one was started.
    async fn commit_transaction(&mut self) -> Result<()>;

    /// Rolls back the run's transaction, if one was started.
    async fn rollback_transaction(&mut self) -> Result<()>;

    /// Makes `catalog` the target of following statements.
    async fn use_catalog(&mut self, catalog: &str) -> Result<()>;

    /// Executes a batch of SQL.
    async fn execute(&mut self, sql: &str) -> Result<()>;

    /// Runs a query returning at most one text value.
    async fn fetch_text(&mut self, sql: &str) -> Result<Option<String>>;
}

/// PostgreSQL session over a single connection.
#[derive(Default)]
pub struct PgSession {
    conn: Option<PgConnection>,
    in_transaction: bool,
}

impl PgSession {
    /// Creates an unconnected session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn conn(&mut self) -> Result<&mut PgConnection> {
        self.conn.as_mut().ok_or(DeployError::NotConnected)
    }
}

impl SqlSession for PgSession {
    async fn open(&mut self, server: &str) -> Result<()> {
        self.conn = Some(PgConnection::connect(server).await?);
        Ok(())
    }

    async fn begin_transaction(&mut self) -> Result<()> {
        sqlx::raw_sql("BEGIN ISOLATION LEVEL SERIALIZABLE")
            .execute(self.conn()?)
            .await?;
        self.in_transaction = true;
        Ok(())
    }

    async fn commit_transaction(&mut self) -> Result<()> {
        if std::mem::take(&mut self.in_transaction) {
            sqlx::raw_sql("COMMIT").execute(self.conn()?).await?;
        }
        Ok(())
    }

    async fn rollback_transaction(&mut self) -> Result<()> {
        if std::mem::take(&mut self.in_transaction) {
            sqlx::raw_sql("ROLLBACK").execute(self.conn()?).await?;
        }
        Ok(())
    }

    async fn use_catalog(&mut self, catalog: &str) -> Result<()> {
        let sql = format!("SET search_path TO {}", quote_identifier(catalog));
        debug!(sql = %sql, "Switching catalog");
        sqlx::raw_sql(&sql).execute(self.conn()?).await?;
        Ok(())
    }

    async fn execute(&mut self, sql: &str) -> Result<()> {
        debug!(sql = %sql, "Executing SQL");
        sqlx::raw_sql(sql).execute(self.conn()?).await?;
        Ok(())
    }

    async fn fetch_text(&mut self, sql: &str) -> Result<Option<String>> {
        debug!(sql = %sql, "Querying");
        let value: Option<Option<String>> = sqlx::query_scalar(sql)
            .fetch_optional(self.conn()?)
            .await?;
        Ok(value.flatten())
    }
}

/// Session that does nothing. Used when the run only writes a SQL file.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSession;

impl SqlSession for NullSession {
    async fn open(&mut self, _server: &str) -> Result<()> {
        Ok(())
    }

    async fn begin_transaction(&mut self) -> Result<()> {
        Ok(())
    }

    async fn commit_transaction(&mut self) -> Result<()> {
        Ok(())
    }

    async fn rollback_transaction(&mut self) -> Result<()> {
        Ok(())
    }

    async fn use_catalog(&mut self, _catalog: &str) -> Result<()> {
        Ok(())
    }

    async fn execute(&mut self, _sql: &str) -> Result<()> {
        Ok(())
    }

    async fn fetch_text(&mut self, _sql: &str) -> Result<Option<String>> {
        Ok(None)
    }
}
