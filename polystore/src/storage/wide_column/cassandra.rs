//! `CassandraWideColumnClient` - Production Wide-Column Client
//!
//! `TigerStyle`: Thin mapping of `WideColumnClient` onto one CQL session.
//!
//! Statements are sent as CQL text. Keyspace, table and column names must
//! be plain identifiers; values are rendered as literals (text quoted,
//! decimals verbatim). A decimal reads back with the scale it was stored
//! with, so `100.0` stays `100.0`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use scylla::frame::response::result::CqlValue as Cell;
use scylla::transport::errors::{DbError, QueryError};
use scylla::{Session, SessionBuilder};
use tokio::sync::RwLock;

use super::{CqlRow, CqlValue, Decimal, Replication, TableSchema, WideColumnClient};
use crate::storage::{ClientError, ClientResult};

/// Cassandra/Scylla client over one shared session.
#[derive(Clone)]
pub struct CassandraWideColumnClient {
    session: Arc<Session>,
    /// Column names per `keyspace.table`, learned from DDL or the schema tables.
    columns: Arc<RwLock<HashMap<String, Vec<String>>>>,
}

impl CassandraWideColumnClient {
    /// Connect to one contact point (e.g. `cassandra:9042`).
    ///
    /// # Errors
    /// Returns `ClientError::Unreachable` if no session can be opened.
    pub async fn connect(node: &str) -> ClientResult<Self> {
        let session = SessionBuilder::new()
            .known_node(node)
            .build()
            .await
            .map_err(|e| ClientError::Unreachable(e.to_string()))?;
        Ok(Self::from_session(session))
    }

    /// Wrap an open session.
    #[must_use]
    pub fn from_session(session: Session) -> Self {
        Self {
            session: Arc::new(session),
            columns: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    async fn rows(&self, cql: String) -> ClientResult<Vec<Vec<Option<Cell>>>> {
        tracing::trace!(cql = %cql, "cql");
        let result = self
            .session
            .query_unpaged(cql, ())
            .await
            .map_err(map_query_error)?;
        Ok(result
            .rows
            .unwrap_or_default()
            .into_iter()
            .map(|row| row.columns)
            .collect())
    }

    async fn execute(&self, cql: String) -> ClientResult<()> {
        self.rows(cql).await.map(|_| ())
    }

    /// Columns of `keyspace.table`, asking the schema tables on a cache miss.
    async fn columns(&self, keyspace: &str, table: &str) -> ClientResult<Vec<String>> {
        let key = format!("{keyspace}.{table}");
        if let Some(columns) = self.columns.read().await.get(&key) {
            return Ok(columns.clone());
        }

        let cql = format!(
            "SELECT column_name FROM system_schema.columns \
             WHERE keyspace_name = {} AND table_name = {}",
            text_literal(keyspace),
            text_literal(table),
        );
        let mut columns = Vec::new();
        for row in self.rows(cql).await? {
            match row.into_iter().next().flatten() {
                Some(Cell::Text(name) | Cell::Ascii(name)) => columns.push(name),
                other => return Err(ClientError::Codec(format!("column_name {other:?}"))),
            }
        }
        if columns.is_empty() {
            return Err(ClientError::rejected(format!("unconfigured table {key}")));
        }

        columns.sort();
        self.columns.write().await.insert(key, columns.clone());
        Ok(columns)
    }
}

fn map_query_error(err: QueryError) -> ClientError {
    match &err {
        QueryError::DbError(
            DbError::Unavailable { .. } | DbError::Overloaded | DbError::IsBootstrapping,
            _,
        ) => ClientError::Unreachable(err.to_string()),
        QueryError::DbError(_, message)
            if message.contains("non existing") || message.contains("does not exist") =>
        {
            ClientError::not_found(message.clone())
        }
        QueryError::DbError(..) | QueryError::BadQuery(_) => ClientError::rejected(err.to_string()),
        _ => ClientError::Unreachable(err.to_string()),
    }
}

fn ident(name: &str) -> ClientResult<&str> {
    let plain = !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain {
        Ok(name)
    } else {
        Err(ClientError::rejected(format!("not a plain identifier: {name:?}")))
    }
}

fn text_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// CQL wants a digit on both sides of the sign: `+7` -> `7`, `.5` -> `0.5`.
fn decimal_literal(decimal: &Decimal) -> String {
    let text = decimal.as_str();
    let (sign, unsigned) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", text.strip_prefix('+').unwrap_or(text)),
    };
    if unsigned.starts_with('.') {
        format!("{sign}0{unsigned}")
    } else {
        format!("{sign}{unsigned}")
    }
}

fn literal(value: Option<&CqlValue>) -> String {
    match value {
        None => "null".to_string(),
        Some(CqlValue::Text(text)) => text_literal(text),
        Some(CqlValue::Decimal(decimal)) => decimal_literal(decimal),
    }
}

/// Render a CQL decimal (big-endian two's complement unscaled value plus
/// scale) as plain decimal text.
fn decimal_text(unscaled: &[u8], scale: i32) -> ClientResult<String> {
    if unscaled.len() > 16 {
        return Err(ClientError::Codec(format!(
            "decimal of {} bytes does not fit",
            unscaled.len()
        )));
    }
    let negative = unscaled.first().is_some_and(|b| b & 0x80 != 0);
    let value = unscaled
        .iter()
        .fold(if negative { -1i128 } else { 0 }, |acc, b| {
            (acc << 8) | i128::from(*b)
        });

    let sign = if value < 0 { "-" } else { "" };
    let digits = value.unsigned_abs().to_string();
    let Ok(scale) = usize::try_from(scale) else {
        let zeros = "0".repeat(scale.unsigned_abs() as usize);
        return Ok(format!("{sign}{digits}{zeros}"));
    };
    if scale == 0 {
        return Ok(format!("{sign}{digits}"));
    }

    let padded = format!("{digits:0>width$}", width = scale + 1);
    let (whole, fraction) = padded.split_at(padded.len() - scale);
    Ok(format!("{sign}{whole}.{fraction}"))
}

fn decode_cell(cell: Cell) -> ClientResult<CqlValue> {
    match cell {
        Cell::Text(text) | Cell::Ascii(text) => Ok(CqlValue::Text(text)),
        Cell::Decimal(decimal) => {
            let (unscaled, scale) = decimal.as_signed_be_bytes_slice_and_exponent();
            let text = decimal_text(unscaled, scale)?;
            Decimal::parse(&text)
                .map(CqlValue::Decimal)
                .ok_or_else(|| ClientError::Codec(format!("decimal {text:?}")))
        }
        other => Err(ClientError::Codec(format!("unexpected cell {other:?}"))),
    }
}

#[async_trait]
impl WideColumnClient for CassandraWideColumnClient {
    async fn drop_keyspace(&self, keyspace: &str) -> ClientResult<()> {
        let prefix = format!("{keyspace}.");
        self.columns
            .write()
            .await
            .retain(|key, _| !key.starts_with(&prefix));
        self.execute(format!("DROP KEYSPACE {}", ident(keyspace)?))
            .await
    }

    async fn create_keyspace(&self, keyspace: &str, replication: Replication) -> ClientResult<()> {
        self.execute(format!(
            "CREATE KEYSPACE {} WITH replication = {{'class': '{}', 'replication_factor': {}}}",
            ident(keyspace)?,
            replication.class(),
            replication.factor,
        ))
        .await
    }

    async fn create_table(&self, keyspace: &str, schema: &TableSchema) -> ClientResult<()> {
        let mut definitions = Vec::with_capacity(schema.columns.len());
        for (name, cql_type) in &schema.columns {
            let key = if *name == schema.primary_key { " PRIMARY KEY" } else { "" };
            definitions.push(format!("{} {}{key}", ident(name)?, cql_type.as_str()));
        }
        self.execute(format!(
            "CREATE TABLE {}.{} ({})",
            ident(keyspace)?,
            ident(&schema.name)?,
            definitions.join(", "),
        ))
        .await?;

        let mut columns: Vec<String> = schema.columns.iter().map(|(n, _)| n.clone()).collect();
        columns.sort();
        self.columns
            .write()
            .await
            .insert(format!("{keyspace}.{}", schema.name), columns);
        Ok(())
    }

    async fn create_index(&self, keyspace: &str, table: &str, column: &str) -> ClientResult<()> {
        self.execute(format!(
            "CREATE INDEX ON {}.{} ({})",
            ident(keyspace)?,
            ident(table)?,
            ident(column)?,
        ))
        .await
    }

    async fn insert(&self, keyspace: &str, table: &str, row: CqlRow) -> ClientResult<()> {
        // Columns the row leaves out are written as null so the insert
        // replaces the whole row.
        let mut columns = self.columns(keyspace, table).await?;
        for column in row.keys() {
            if !columns.contains(column) {
                return Err(ClientError::rejected(format!("unknown column {column}")));
            }
        }

        let mut names = Vec::with_capacity(columns.len());
        for column in &columns {
            names.push(ident(column)?);
        }
        let values: Vec<String> = columns.iter().map(|c| literal(row.get(c))).collect();

        self.execute(format!(
            "INSERT INTO {}.{} ({}) VALUES ({})",
            ident(keyspace)?,
            ident(table)?,
            names.join(", "),
            values.join(", "),
        ))
        .await
    }

    async fn select(
        &self,
        keyspace: &str,
        table: &str,
        filter: Option<(&str, &CqlValue)>,
    ) -> ClientResult<Vec<CqlRow>> {
        let columns = self.columns(keyspace, table).await?;
        let mut names = Vec::with_capacity(columns.len());
        for column in &columns {
            names.push(ident(column)?);
        }

        let mut cql = format!(
            "SELECT {} FROM {}.{}",
            names.join(", "),
            ident(keyspace)?,
            ident(table)?,
        );
        if let Some((column, value)) = filter {
            cql.push_str(&format!(" WHERE {} = {}", ident(column)?, literal(Some(value))));
        }

        let mut rows = Vec::new();
        for cells in self.rows(cql).await? {
            let mut row = CqlRow::new();
            for (column, cell) in columns.iter().zip(cells) {
                if let Some(cell) = cell {
                    row.insert(column.clone(), decode_cell(cell)?);
                }
            }
            rows.push(row);
        }
        Ok(rows)
    }
}
