//! tpub-db
//!
//! MySQL snapshot source.
//!
//! One fresh connection per fetch, closed on every exit path. The fixed
//! statement reads the whole table; both columns are cast to text so that
//! numeric, string and JSON columns all arrive as the server prints them.
//! Failures are classified from driver error codes, never from message text.

mod classify;

use std::time::Duration;

use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::{Connection, Row};
use tpub_config::DbSettings;
use tpub_reconcile::{FetchError, FetchErrorKind, SnapshotSource, SourceRow};
use tracing::debug;

pub use classify::{classify, classify_mysql};

/// Full-table read of `<id_column>, <value_column>` from `<table>`.
///
/// Names are backtick-quoted; callers pass only validated plain identifiers
/// (see `tpub_config::is_plain_identifier`).
pub fn select_statement(table: &str, id_column: &str, value_column: &str) -> String {
    format!(
        "SELECT CAST(`{id_column}` AS CHAR) AS id, CAST(`{value_column}` AS CHAR) AS value \
         FROM `{table}`"
    )
}

#[derive(Debug, Clone)]
pub struct MySqlSnapshotSource {
    options: MySqlConnectOptions,
    statement: String,
    database: String,
    table: String,
    timeout: Duration,
}

impl MySqlSnapshotSource {
    pub fn new(db: &DbSettings) -> Self {
        let options = MySqlConnectOptions::new()
            .host(&db.host)
            .port(db.port)
            .username(&db.user)
            .password(&db.password)
            .database(&db.database);

        Self {
            options,
            statement: select_statement(&db.table, &db.id_column, &db.value_column),
            database: db.database.clone(),
            table: db.table.clone(),
            timeout: db.fetch_timeout,
        }
    }

    pub fn statement(&self) -> &str {
        &self.statement
    }

    fn error(&self, err: sqlx::Error) -> FetchError {
        FetchError::new(classify(&err), self.table.clone(), err.to_string())
    }

    async fn fetch_once(&self) -> Result<Vec<SourceRow>, FetchError> {
        let mut conn = MySqlConnection::connect_with(&self.options)
            .await
            .map_err(|e| self.error(e))?;

        let fetched = sqlx::query(&self.statement).fetch_all(&mut conn).await;

        // Close before inspecting the result so both paths release the session.
        if let Err(e) = conn.close().await {
            debug!(error = %e, "closing source connection failed");
        }

        let rows = fetched.map_err(|e| self.error(e))?;
        rows.iter()
            .map(|row| decode_row(row).map_err(|e| self.error(e)))
            .collect()
    }
}

fn decode_row(row: &MySqlRow) -> Result<SourceRow, sqlx::Error> {
    Ok(SourceRow {
        id: row.try_get("id")?,
        value: row.try_get("value")?,
    })
}

#[async_trait::async_trait]
impl SnapshotSource for MySqlSnapshotSource {
    fn describe(&self) -> String {
        format!("mysql {}.{}", self.database, self.table)
    }

    async fn fetch(&self) -> Result<Vec<SourceRow>, FetchError> {
        match tokio::time::timeout(self.timeout, self.fetch_once()).await {
            Ok(result) => result,
            // Dropping the in-flight future drops (and so closes) its connection.
            Err(_) => Err(FetchError::new(
                FetchErrorKind::Connectivity,
                self.table.clone(),
                format!("no result within {:?}", self.timeout),
            )),
        }
    }
}
