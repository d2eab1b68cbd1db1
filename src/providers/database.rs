//! Read-only MySQL table introspection.
//!
//! Every table of the configured database is exposed as one resource whose
//! description carries the column list and up to three sample rows. Any
//! failure talking to the server collapses the listing into a single
//! placeholder resource; it never fails the caller.

use std::fmt::Write as _;
use std::time::Duration;

use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use tracing::{debug, error};

use crate::config::DatabaseConfig;
use crate::error::ProviderError;
use crate::providers::resources::{
    build_uri, Resource, ResourceContents, ResourceUri, APPLICATION_SQL,
};

/// URI scheme of database resources.
pub const SCHEME: &str = "mysql";

/// Rows shown per table.
pub const SAMPLE_ROWS: usize = 3;

/// Table listing backed by a lazily connected pool.
#[derive(Debug, Clone)]
pub struct DatabaseSource {
    pool: MySqlPool,
    host: String,
    database: String,
}

/// Column list and sample rows of one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSummary {
    /// Table name.
    pub name: String,
    /// `(column name, column type)` in ordinal order.
    pub columns: Vec<(String, String)>,
    /// Rendered sample rows, at most [`SAMPLE_ROWS`].
    pub rows: Vec<String>,
}

impl TableSummary {
    /// The text used both as resource description and as read content.
    #[must_use]
    pub fn describe(&self) -> String {
        let schema = self
            .columns
            .iter()
            .map(|(name, ty)| format!("{name} {ty}"))
            .collect::<Vec<_>>()
            .join(", ");
        let preview = if self.rows.is_empty() {
            "No data.".to_string()
        } else {
            self.rows.join("\n")
        };
        format!("Table {} schema: {schema}\nSample data:\n{preview}", self.name)
    }
}

impl DatabaseSource {
    /// Creates a source; no connection is attempted until first use.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime, which the pool uses for
    /// its maintenance task.
    #[must_use]
    pub fn new(config: &DatabaseConfig) -> Self {
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.database);

        let pool = MySqlPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect_lazy_with(options);

        Self {
            pool,
            host: config.host.clone(),
            database: config.database.clone(),
        }
    }

    /// One resource per table, or the placeholder if the database is
    /// unreachable.
    pub async fn resources(&self) -> Vec<Resource> {
        match self.summaries().await {
            Ok(tables) => tables
                .iter()
                .map(|table| Resource {
                    uri: self.table_uri(&table.name),
                    name: format!("MySQL Table: {}", table.name),
                    description: table.describe(),
                    mime_type: APPLICATION_SQL.to_string(),
                })
                .collect(),
            Err(e) => {
                error!(error = %e, "MySQL error");
                vec![self.placeholder()]
            }
        }
    }

    /// Reads `mysql://<host>/<database>/<table>` as the table description.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::NotFound`] for URIs outside this database or
    /// naming an unknown table, and [`ProviderError::Unsupported`] when the
    /// database cannot be reached.
    pub async fn read(&self, uri: &ResourceUri) -> Result<ResourceContents, ProviderError> {
        let [database, table] = uri.segments.as_slice() else {
            return Err(ProviderError::NotFound(format!(
                "Resource not found: {}",
                uri.raw
            )));
        };
        if uri.host != self.host || *database != self.database {
            return Err(ProviderError::NotFound(format!(
                "Resource not found: {}",
                uri.raw
            )));
        }

        let tables = self
            .table_names()
            .await
            .map_err(|e| ProviderError::Unsupported(format!("MySQL unavailable: {e}")))?;
        if !tables.iter().any(|t| t == table) {
            return Err(ProviderError::NotFound(format!("Table not found: {table}")));
        }

        let summary = self
            .summarise(table)
            .await
            .map_err(|e| ProviderError::Unsupported(format!("MySQL unavailable: {e}")))?;

        Ok(ResourceContents {
            uri: uri.raw.clone(),
            mime_type: APPLICATION_SQL.to_string(),
            text: summary.describe(),
        })
    }

    /// The resource reported when the database cannot be introspected.
    #[must_use]
    pub fn placeholder(&self) -> Resource {
        Resource {
            uri: build_uri(SCHEME, &self.host, &[&self.database]),
            name: format!("MySQL Database: {}", self.database),
            description: format!("MySQL database {} (connection error)", self.database),
            mime_type: APPLICATION_SQL.to_string(),
        }
    }

    fn table_uri(&self, table: &str) -> String {
        build_uri(SCHEME, &self.host, &[&self.database, table])
    }

    async fn summaries(&self) -> Result<Vec<TableSummary>, sqlx::Error> {
        let mut summaries = Vec::new();
        for table in self.table_names().await? {
            summaries.push(self.summarise(&table).await?);
        }
        Ok(summaries)
    }

    async fn table_names(&self) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            "SELECT CAST(TABLE_NAME AS CHAR) FROM information_schema.TABLES \
             WHERE TABLE_SCHEMA = ? ORDER BY TABLE_NAME",
        )
        .bind(&self.database)
        .fetch_all(&self.pool)
        .await
    }

    async fn summarise(&self, table: &str) -> Result<TableSummary, sqlx::Error> {
        debug!(table, "Introspecting MySQL table");

        let columns = sqlx::query_as::<_, (String, String)>(
            "SELECT CAST(COLUMN_NAME AS CHAR), CAST(COLUMN_TYPE AS CHAR) \
             FROM information_schema.COLUMNS \
             WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? ORDER BY ORDINAL_POSITION",
        )
        .bind(&self.database)
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        let rows = if columns.is_empty() {
            Vec::new()
        } else {
            let query = sample_query(table, &columns);
            sqlx::query_scalar::<_, String>(&query)
                .fetch_all(&self.pool)
                .await?
        };

        Ok(TableSummary {
            name: table.to_string(),
            columns,
            rows,
        })
    }
}

/// Quotes an identifier for MySQL.
fn quote_ident(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}

/// Builds a query rendering each sample row as one `(a, b, ...)` string.
///
/// Identifiers come from `information_schema`, not from callers.
fn sample_query(table: &str, columns: &[(String, String)]) -> String {
    let mut cells = String::new();
    for (i, (name, _)) in columns.iter().enumerate() {
        if i > 0 {
            cells.push_str(", ', ', ");
        }
        let _ = write!(cells, "COALESCE(CAST({} AS CHAR), 'NULL')", quote_ident(name));
    }
    format!(
        "SELECT CONCAT('(', {cells}, ')') FROM {} LIMIT {SAMPLE_ROWS}",
        quote_ident(table)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_config() -> DatabaseConfig {
        DatabaseConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            user: "root".to_string(),
            password: String::new(),
            database: "bank".to_string(),
            connect_timeout_secs: 1,
        }
    }

    #[test]
    fn describe_with_and_without_rows() {
        let mut table = TableSummary {
            name: "accounts".to_string(),
            columns: vec![
                ("id".to_string(), "int".to_string()),
                ("owner".to_string(), "varchar(64)".to_string()),
            ],
            rows: Vec::new(),
        };
        assert_eq!(
            table.describe(),
            "Table accounts schema: id int, owner varchar(64)\nSample data:\nNo data."
        );

        table.rows = vec!["(1, ada)".to_string(), "(2, grace)".to_string()];
        assert!(table.describe().ends_with("Sample data:\n(1, ada)\n(2, grace)"));
    }

    #[test]
    fn sample_query_quotes_identifiers() {
        let columns = vec![
            ("id".to_string(), "int".to_string()),
            ("we`ird".to_string(), "text".to_string()),
        ];
        let query = sample_query("t`1", &columns);
        assert_eq!(
            query,
            "SELECT CONCAT('(', COALESCE(CAST(`id` AS CHAR), 'NULL'), ', ', \
             COALESCE(CAST(`we``ird` AS CHAR), 'NULL'), ')') FROM `t``1` LIMIT 3"
        );
    }

    #[tokio::test]
    async fn unreachable_database_degrades_to_placeholder() {
        let source = DatabaseSource::new(&unreachable_config());
        let resources = source.resources().await;

        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].uri, "mysql://127.0.0.1/bank");
        assert_eq!(resources[0].mime_type, "application/sql");
        assert!(resources[0].description.contains("connection error"));
    }

    #[tokio::test]
    async fn read_outside_database_is_not_found() {
        let source = DatabaseSource::new(&unreachable_config());
        let uri = ResourceUri::parse("mysql://127.0.0.1/other/accounts").unwrap();
        assert!(matches!(
            source.read(&uri).await,
            Err(ProviderError::NotFound(_))
        ));
    }
}
