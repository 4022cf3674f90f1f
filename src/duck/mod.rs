use anyhow::{anyhow, Context, Result};
use arrow::datatypes::{DataType, Schema as ArrowSchema};
use arrow::record_batch::RecordBatch;
use duckdb::{params, Connection};
use std::path::Path;
use tracing::{debug, error};

/// Open a DuckDB database on disk at `path`, creating the file if it doesn't exist.
pub fn open_disk_db(path: &Path) -> Result<Connection> {
    Connection::open(path).with_context(|| format!("opening DuckDB at {}", path.display()))
}

/// Open a DuckDB in‐memory database
pub fn open_mem_db() -> Result<Connection> {
    Connection::open_in_memory().context("opening in-memory DuckDB")
}

/// Double-quote an identifier, escaping embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Map an Arrow DataType onto the DuckDB column type used in DDL.
pub fn sql_type(dt: &DataType) -> Result<String> {
    let ty = match dt {
        DataType::Boolean => "BOOLEAN".to_string(),
        DataType::Int8 => "TINYINT".to_string(),
        DataType::Int16 => "SMALLINT".to_string(),
        DataType::Int32 => "INTEGER".to_string(),
        DataType::Int64 => "BIGINT".to_string(),
        DataType::UInt8 => "UTINYINT".to_string(),
        DataType::UInt16 => "USMALLINT".to_string(),
        DataType::UInt32 => "UINTEGER".to_string(),
        DataType::UInt64 => "UBIGINT".to_string(),
        DataType::Float32 => "FLOAT".to_string(),
        DataType::Float64 => "DOUBLE".to_string(),
        DataType::Utf8 | DataType::LargeUtf8 => "VARCHAR".to_string(),
        DataType::Decimal128(p, s) => format!("DECIMAL({}, {})", p, s),
        DataType::Date32 => "DATE".to_string(),
        DataType::Timestamp(_, None) => "TIMESTAMP".to_string(),
        other => return Err(anyhow!("no DuckDB column type for Arrow type {:?}", other)),
    };
    Ok(ty)
}

/// How a batch lands in its destination table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Drop whatever the table held and recreate it from the batch schema.
    Replace,
    Append,
}

/// `CREATE OR REPLACE TABLE` with one column per schema field.
pub fn create_or_replace_table(conn: &Connection, table: &str, schema: &ArrowSchema) -> Result<()> {
    if schema.fields().is_empty() {
        return Err(anyhow!("cannot create table `{}` without columns", table));
    }
    let columns = schema
        .fields()
        .iter()
        .map(|f| Ok(format!("{} {}", quote_ident(f.name()), sql_type(f.data_type())?)))
        .collect::<Result<Vec<_>>>()?;
    let sql = format!(
        "CREATE OR REPLACE TABLE {} ({});",
        quote_ident(table),
        columns.join(", ")
    );
    debug!(table = %table, "{}", sql);
    conn.execute_batch(&sql)
        .with_context(|| format!("creating table `{}`", table))
}

/// Bulk-append one record batch through the DuckDB Arrow appender.
/// Returns the number of rows written.
pub fn append_batch(conn: &Connection, table: &str, batch: RecordBatch) -> Result<usize> {
    let rows = batch.num_rows();
    if rows == 0 {
        return Ok(0);
    }
    let mut appender = conn
        .appender(table)
        .with_context(|| format!("opening appender on `{}`", table))?;
    appender
        .append_record_batch(batch)
        .with_context(|| format!("appending {} rows to `{}`", rows, table))?;
    appender
        .flush()
        .with_context(|| format!("flushing appender on `{}`", table))?;
    Ok(rows)
}

/// Write a batch in the given mode; `Replace` recreates the table first.
pub fn write_batch(
    conn: &Connection,
    table: &str,
    batch: RecordBatch,
    mode: WriteMode,
) -> Result<usize> {
    if mode == WriteMode::Replace {
        create_or_replace_table(conn, table, &batch.schema())?;
    }
    append_batch(conn, table, batch)
}

pub fn row_count(conn: &Connection, table: &str) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
    conn.query_row(&sql, [], |r| r.get(0))
        .with_context(|| format!("counting rows of `{}`", table))
}

/// Column names of `table` in declaration order, or `None` when the table
/// does not exist. The table name is matched case-insensitively.
pub fn table_columns(conn: &Connection, table: &str) -> Result<Option<Vec<String>>> {
    let mut stmt = conn.prepare(
        "SELECT column_name FROM information_schema.columns \
         WHERE lower(table_name) = lower(?) ORDER BY ordinal_position",
    )?;
    let columns = stmt
        .query_map(params![table], |r| r.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("reading columns of `{}`", table))?;
    if columns.is_empty() {
        Ok(None)
    } else {
        Ok(Some(columns))
    }
}

/// Run `f` inside one transaction: commit on success, roll back on error.
pub fn in_transaction<T>(conn: &Connection, f: impl FnOnce() -> Result<T>) -> Result<T> {
    conn.execute_batch("BEGIN TRANSACTION")
        .context("beginning transaction")?;
    match f() {
        Ok(v) => {
            conn.execute_batch("COMMIT").context("committing transaction")?;
            Ok(v)
        }
        Err(e) => {
            if let Err(rb) = conn.execute_batch("ROLLBACK") {
                error!("rollback failed: {:?}", rb);
            }
            Err(e)
        }
    }
}
