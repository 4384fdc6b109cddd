//! SQLite storage backend.
//!
//! Primary-key metadata comes from `PRAGMA table_info`. A single
//! `INTEGER PRIMARY KEY` column is an alias of the rowid, so SQLite assigns
//! it when it is left unset. Each session runs inside one transaction.

use super::{Session, StorageBackend, TableSchema};
use crate::pool::{DatabasePool, DatabasePoolInterface};
use async_trait::async_trait;
use sqlx::sqlite::{Sqlite, SqliteConnection, SqlitePool, SqliteRow};
use sqlx::{Decode, QueryBuilder, Row, Transaction, TypeInfo, ValueRef};
use std::marker::PhantomData;
use std::sync::Arc;
use tessera_core::{Condition, Key, Predicate, Record, TesseraError, TesseraResult, Value};
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// `SQLITE_MAX_VARIABLE_NUMBER` since SQLite 3.32, less one for `LIMIT`.
const MAX_BOUND_VALUES: usize = 32_765;

/// Composite keys render as a chain of `OR`s, which SQLite parses one
/// level deep per key against its expression depth limit of 1000.
const MAX_COMPOSITE_KEYS: usize = 500;

#[derive(Debug)]
struct TableMeta {
    schema: TableSchema,
    has_rowid: bool,
}

/// A table in a SQLite database.
///
/// The table name defaults to the base shape name of `E`.
pub struct SqliteBackend<E> {
    pool: Arc<dyn DatabasePoolInterface>,
    table: String,
    meta: OnceCell<Arc<TableMeta>>,
    records: PhantomData<fn() -> E>,
}

impl<E: Record> SqliteBackend<E> {
    /// Creates a backend over an injected pool.
    #[must_use]
    pub fn new(pool: Arc<dyn DatabasePoolInterface>) -> Self {
        Self {
            pool,
            table: E::shapes().first().copied().unwrap_or("records").to_string(),
            meta: OnceCell::new(),
            records: PhantomData,
        }
    }

    /// Creates a backend over a bare SQLx pool.
    #[must_use]
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self::new(Arc::new(DatabasePool::with_pool(pool)))
    }

    /// Overrides the table name.
    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    async fn meta(&self) -> TesseraResult<Arc<TableMeta>> {
        self.meta
            .get_or_try_init(|| self.load_meta())
            .await
            .map(Arc::clone)
    }

    async fn load_meta(&self) -> TesseraResult<Arc<TableMeta>> {
        let pragma = format!("PRAGMA table_info({})", quote(&self.table));
        let rows = sqlx::query(&pragma).fetch_all(self.pool.inner()).await?;
        if rows.is_empty() {
            return Err(TesseraError::configuration(format!(
                "table {} does not exist",
                self.table
            )));
        }

        let mut key_columns = Vec::new();
        for row in &rows {
            let position: i64 = row.try_get("pk")?;
            if position > 0 {
                let name: String = row.try_get("name")?;
                let declared: String = row.try_get("type")?;
                key_columns.push((position, name, declared));
            }
        }
        key_columns.sort_by_key(|(position, _, _)| *position);

        let generated_key = matches!(
            key_columns.as_slice(),
            [(_, _, declared)] if declared.eq_ignore_ascii_case("INTEGER")
        );
        let probe = format!("SELECT rowid FROM {} LIMIT 0", quote(&self.table));
        let has_rowid = sqlx::query(&probe).fetch_all(self.pool.inner()).await.is_ok();

        let schema = TableSchema {
            table: self.table.clone(),
            primary_key: key_columns.into_iter().map(|(_, name, _)| name).collect(),
            generated_key,
            discriminator: E::discriminator(),
        };
        info!(
            table = %schema.table,
            primary_key = ?schema.primary_key,
            generated_key,
            "Loaded SQLite table metadata"
        );
        Ok(Arc::new(TableMeta { schema, has_rowid }))
    }
}

#[async_trait]
impl<E: Record> StorageBackend<E> for SqliteBackend<E> {
    type Session = SqliteSession<E>;

    async fn schema(&self) -> TesseraResult<TableSchema> {
        Ok(self.meta().await?.schema.clone())
    }

    async fn open(&self) -> TesseraResult<Self::Session> {
        let meta = self.meta().await?;
        let tx = self.pool.inner().begin().await?;
        Ok(SqliteSession {
            tx: Some(tx),
            meta,
            records: PhantomData,
        })
    }
}

/// Unit of work on a [`SqliteBackend`], backed by one transaction.
pub struct SqliteSession<E> {
    tx: Option<Transaction<'static, Sqlite>>,
    meta: Arc<TableMeta>,
    records: PhantomData<fn() -> E>,
}

impl<E: Record> SqliteSession<E> {
    fn conn(&mut self) -> TesseraResult<&mut SqliteConnection> {
        self.tx
            .as_deref_mut()
            .ok_or_else(|| TesseraError::Usage("session already committed".to_string()))
    }

    fn select(&self) -> QueryBuilder<'static, Sqlite> {
        QueryBuilder::new(format!("SELECT * FROM {}", quote(&self.meta.schema.table)))
    }

    fn push_key_filter(&self, builder: &mut QueryBuilder<'static, Sqlite>, key: &Key) -> TesseraResult<()> {
        let columns = &self.meta.schema.primary_key;
        if columns.len() != key.len() {
            return Err(TesseraError::KeyArity {
                expected: columns.len(),
                actual: key.len(),
            });
        }
        builder.push(" WHERE ");
        for (i, (column, value)) in columns.iter().zip(key.parts()).enumerate() {
            if i > 0 {
                builder.push(" AND ");
            }
            builder.push(quote(column)).push(" = ");
            push_value(builder, value);
        }
        Ok(())
    }

    fn decode(&self, row: &SqliteRow) -> TesseraResult<E> {
        let shape = match self.meta.schema.discriminator {
            Some(column) => row.try_get::<String, _>(column)?,
            None => E::shapes().first().copied().unwrap_or_default().to_string(),
        };
        let mut entity = E::blank(&shape).ok_or_else(|| {
            TesseraError::mapping(format!(
                "unknown shape {shape} in table {}",
                self.meta.schema.table
            ))
        })?;
        for field in entity.fields() {
            let value = decode_column(row, field)?;
            entity.set(field, value)?;
        }
        Ok(entity)
    }
}

#[async_trait]
impl<E: Record> Session<E> for SqliteSession<E> {
    fn keys_per_query(&self, width: usize) -> usize {
        keys_per_query(width)
    }

    async fn find(&mut self, key: &Key) -> TesseraResult<Option<E>> {
        let mut builder = self.select();
        self.push_key_filter(&mut builder, key)?;
        builder.push(" LIMIT 1");

        let row = builder.build().fetch_optional(self.conn()?).await?;
        row.map(|row| self.decode(&row)).transpose()
    }

    async fn fetch(
        &mut self,
        filter: Option<&Predicate<E>>,
        limit: Option<usize>,
    ) -> TesseraResult<Vec<E>> {
        let mut builder = self.select();
        if let Some(predicate) = filter {
            builder.push(" WHERE ");
            push_condition(&mut builder, predicate.condition());
        }
        if self.meta.has_rowid {
            builder.push(" ORDER BY rowid");
        }
        if let Some(limit) = limit {
            builder.push(" LIMIT ");
            builder.push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }
        debug!(sql = builder.sql(), "Fetching rows");

        let rows = builder.build().fetch_all(self.conn()?).await?;
        rows.iter().map(|row| self.decode(row)).collect()
    }

    async fn add(&mut self, mut entity: E) -> TesseraResult<E> {
        let schema = &self.meta.schema;
        let generate = schema.needs_generated_key(&entity);

        let mut columns = Vec::new();
        let mut values = Vec::new();
        for field in entity.fields() {
            if generate && schema.primary_key[0] == *field {
                continue;
            }
            columns.push(*field);
            values.push(entity.get(field).unwrap_or(Value::Null));
        }
        if let Some(column) = schema.discriminator {
            columns.push(column);
            values.push(Value::from(entity.shape()));
        }

        let mut builder = QueryBuilder::new(format!("INSERT INTO {}", quote(&schema.table)));
        if columns.is_empty() {
            builder.push(" DEFAULT VALUES");
        } else {
            builder.push(" (");
            builder.push(columns.iter().map(|c| quote(c)).collect::<Vec<_>>().join(", "));
            builder.push(") VALUES (");
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    builder.push(", ");
                }
                push_value(&mut builder, value);
            }
            builder.push(")");
        }
        let key_column = generate.then(|| schema.primary_key[0].clone());

        let result = builder.build().execute(self.conn()?).await?;
        if let Some(column) = key_column {
            entity.set(&column, Value::Int(result.last_insert_rowid()))?;
        }
        Ok(entity)
    }

    async fn update(&mut self, entity: E) -> TesseraResult<()> {
        let schema = &self.meta.schema;
        let key = schema.key_of(&entity)?;

        let mut assignments: Vec<(&str, Value)> = entity
            .fields()
            .iter()
            .filter(|field| !schema.primary_key.iter().any(|c| c == *field))
            .map(|field| (*field, entity.get(field).unwrap_or(Value::Null)))
            .collect();
        if let Some(column) = schema.discriminator {
            assignments.push((column, Value::from(entity.shape())));
        }
        if assignments.is_empty() {
            return Ok(());
        }

        let mut builder = QueryBuilder::new(format!("UPDATE {} SET ", quote(&schema.table)));
        for (i, (column, value)) in assignments.iter().enumerate() {
            if i > 0 {
                builder.push(", ");
            }
            builder.push(quote(column)).push(" = ");
            push_value(&mut builder, value);
        }
        self.push_key_filter(&mut builder, &key)?;

        let result = builder.build().execute(self.conn()?).await?;
        if result.rows_affected() == 0 {
            return Err(TesseraError::conflict(format!(
                "row {key} no longer exists in {}",
                self.meta.schema.table
            )));
        }
        Ok(())
    }

    async fn remove(&mut self, entity: &E) -> TesseraResult<()> {
        let key = self.meta.schema.key_of(entity)?;
        let mut builder = QueryBuilder::new(format!("DELETE FROM {}", quote(&self.meta.schema.table)));
        self.push_key_filter(&mut builder, &key)?;

        let result = builder.build().execute(self.conn()?).await?;
        if result.rows_affected() == 0 {
            return Err(TesseraError::conflict(format!(
                "row {key} no longer exists in {}",
                self.meta.schema.table
            )));
        }
        Ok(())
    }

    async fn commit(&mut self) -> TesseraResult<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| TesseraError::Usage("session already committed".to_string()))?;
        tx.commit().await?;
        Ok(())
    }
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn push_value(builder: &mut QueryBuilder<'static, Sqlite>, value: &Value) {
    match value.clone() {
        Value::Null => builder.push_bind(Option::<i64>::None),
        Value::Bool(b) => builder.push_bind(b),
        Value::Int(i) => builder.push_bind(i),
        Value::Float(x) => builder.push_bind(x),
        Value::Text(s) => builder.push_bind(s),
        Value::Uuid(u) => builder.push_bind(u.to_string()),
        Value::Timestamp(t) => builder.push_bind(t.to_rfc3339()),
    };
}

fn keys_per_query(width: usize) -> usize {
    let by_values = MAX_BOUND_VALUES / width.max(1);
    if width > 1 {
        by_values.min(MAX_COMPOSITE_KEYS)
    } else {
        by_values
    }
}

/// Renders a condition as a parenthesised SQL boolean expression.
fn push_condition(builder: &mut QueryBuilder<'static, Sqlite>, condition: &Condition) {
    match condition {
        Condition::Compare { field, op, value } => {
            builder.push(quote(field)).push(" ").push(op.as_sql()).push(" ");
            push_value(builder, value);
        }
        Condition::In { values, .. } if values.is_empty() => {
            builder.push("1 = 0");
        }
        Condition::In { field, values } => {
            builder.push(quote(field)).push(" IN (");
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    builder.push(", ");
                }
                push_value(builder, value);
            }
            builder.push(")");
        }
        Condition::IsNull(field) => {
            builder.push(quote(field)).push(" IS NULL");
        }
        Condition::And(items) if items.is_empty() => {
            builder.push("1 = 1");
        }
        Condition::Or(items) if items.is_empty() => {
            builder.push("1 = 0");
        }
        Condition::And(items) | Condition::Or(items) => {
            let separator = if matches!(condition, Condition::And(_)) {
                " AND "
            } else {
                " OR "
            };
            builder.push("(");
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    builder.push(separator);
                }
                push_condition(builder, item);
            }
            builder.push(")");
        }
        Condition::Not(inner) => {
            builder.push("NOT (");
            push_condition(builder, inner);
            builder.push(")");
        }
    }
}

fn decode_column(row: &SqliteRow, column: &str) -> TesseraResult<Value> {
    let raw = row.try_get_raw(column)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let storage = raw.type_info().name().to_ascii_uppercase();
    let decoded = match storage.as_str() {
        "REAL" => <f64 as Decode<'_, Sqlite>>::decode(raw).map(Value::Float),
        "TEXT" | "DATE" | "TIME" | "DATETIME" => {
            <String as Decode<'_, Sqlite>>::decode(raw).map(Value::Text)
        }
        "BLOB" => {
            return Err(TesseraError::mapping(format!(
                "column {column} holds a BLOB, which no field type accepts"
            )))
        }
        _ => <i64 as Decode<'_, Sqlite>>::decode(raw).map(Value::Int),
    };
    decoded.map_err(|e| TesseraError::mapping(format!("column {column}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default)]
    struct SimpleEntity {
        key: i32,
        value: Option<String>,
    }

    tessera_core::record!(SimpleEntity { key, value });

    fn render(predicate: &Predicate<SimpleEntity>) -> String {
        let mut builder = QueryBuilder::<'static, Sqlite>::new("");
        push_condition(&mut builder, predicate.condition());
        builder.sql().to_string()
    }

    #[test]
    fn test_render_comparisons() {
        assert_eq!(render(&Predicate::eq("key", 8)), "\"key\" = ?");
        assert_eq!(render(&Predicate::ge("key", 8)), "\"key\" >= ?");
        assert_eq!(render(&Predicate::is_null("value")), "\"value\" IS NULL");
    }

    #[test]
    fn test_render_membership() {
        assert_eq!(render(&Predicate::is_in("key", [1, 2, 3])), "\"key\" IN (?, ?, ?)");
        assert_eq!(render(&Predicate::is_in("key", Vec::<i32>::new())), "1 = 0");
    }

    #[test]
    fn test_render_connectives() {
        let predicate = Predicate::all([Predicate::eq("key", 7), Predicate::eq("value", "a")])
            .or(Predicate::eq("key", 8).not());
        assert_eq!(
            render(&predicate),
            "((\"key\" = ? AND \"value\" = ?) OR NOT (\"key\" = ?))"
        );
        assert_eq!(render(&Predicate::all([])), "1 = 1");
        assert_eq!(render(&Predicate::any([])), "1 = 0");
    }

    #[test]
    fn test_quote_escapes_identifiers() {
        assert_eq!(quote("plain"), "\"plain\"");
        assert_eq!(quote("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_key_capacity_respects_sqlite_limits() {
        assert_eq!(keys_per_query(1), MAX_BOUND_VALUES);
        assert_eq!(keys_per_query(2), MAX_COMPOSITE_KEYS);
        assert!(keys_per_query(100) * 100 <= MAX_BOUND_VALUES);
        assert_eq!(keys_per_query(0), MAX_BOUND_VALUES);
    }
}
