use crate::dataset::{Dataset, Value};
use crate::error::{EtlError, Result};
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, Connection, ToSql};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info, instrument};

/// Confirmation of a completed table write
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SaveSummary {
    pub table: String,
    pub rows: usize,
    pub columns: usize,
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Integer(v) => ToSqlOutput::Borrowed(ValueRef::Integer(*v)),
            Value::Real(v) => ToSqlOutput::Borrowed(ValueRef::Real(*v)),
            Value::Text(v) => ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes())),
        })
    }
}

/// Writes a dataset into a SQLite file, replacing the target table
pub struct SqliteWriter {
    conn: Connection,
}

impl SqliteWriter {
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                EtlError::Store(format!("cannot create store directory '{}': {}", parent.display(), e))
            })?;
        }
        let conn = Connection::open(db_path)?;
        debug!("Opened store at {}", db_path.display());
        Ok(Self { conn })
    }

    /// Drop and recreate `table`, then insert every row, all in one transaction
    #[instrument(skip(self, dataset), fields(rows = dataset.len()))]
    pub fn write_table(&mut self, dataset: &Dataset, table: &str) -> Result<SaveSummary> {
        if dataset.columns.is_empty() {
            return Err(EtlError::Store(format!("cannot create table '{}' with no columns", table)));
        }

        let types = dataset.column_types();
        let column_defs: Vec<String> = dataset
            .columns
            .iter()
            .zip(&types)
            .map(|(name, ty)| format!("{} {}", quote_ident(name), ty.sql_type()))
            .collect();
        let quoted_table = quote_ident(table);

        let tx = self.conn.transaction()?;
        tx.execute_batch(&format!(
            "DROP TABLE IF EXISTS {table};\nCREATE TABLE {table} ({defs});",
            table = quoted_table,
            defs = column_defs.join(", ")
        ))?;
        {
            let placeholders = vec!["?"; dataset.columns.len()].join(", ");
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {} VALUES ({})",
                quoted_table, placeholders
            ))?;
            for row in &dataset.rows {
                stmt.execute(params_from_iter(row.iter()))?;
            }
        }
        tx.commit()?;

        crate::metrics::writer::rows_written(table, dataset.len());
        info!("Wrote {} rows to table {}", dataset.len(), table);
        Ok(SaveSummary {
            table: table.to_string(),
            rows: dataset.len(),
            columns: dataset.columns.len(),
        })
    }
}

/// Persist `dataset` as `table` in the SQLite file at `db_path`
pub fn save<P: AsRef<Path>>(dataset: &Dataset, db_path: P, table: &str) -> Result<SaveSummary> {
    SqliteWriter::open(db_path)?.write_table(dataset, table)
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::tempdir;

    fn sample() -> Dataset {
        Dataset {
            columns: vec!["id".into(), "message".into(), "original".into(), "related".into()],
            rows: vec![
                vec![Value::Integer(1), Value::Text("help".into()), Value::Null, Value::Integer(1)],
                vec![Value::Integer(2), Value::Text("water".into()), Value::Text("agua".into()), Value::Integer(0)],
            ],
        }
    }

    fn declared_types(conn: &Connection, table: &str) -> Vec<(String, String)> {
        let mut stmt = conn
            .prepare(&format!("PRAGMA table_info({})", quote_ident(table)))
            .unwrap();
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(1)?, row.get::<_, String>(2)?)))
            .unwrap();
        rows.map(|r| r.unwrap()).collect()
    }

    #[test]
    fn test_save_creates_typed_table() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("out.db");

        let summary = save(&sample(), &db, "ETL_pipeline_cleaned").unwrap();
        assert_eq!(summary.rows, 2);
        assert_eq!(summary.columns, 4);

        let conn = Connection::open(&db).unwrap();
        assert_eq!(
            declared_types(&conn, "ETL_pipeline_cleaned"),
            vec![
                ("id".to_string(), "INTEGER".to_string()),
                ("message".to_string(), "TEXT".to_string()),
                ("original".to_string(), "TEXT".to_string()),
                ("related".to_string(), "INTEGER".to_string()),
            ]
        );
        let original: Option<String> = conn
            .query_row("SELECT original FROM ETL_pipeline_cleaned WHERE id = 1", [], |r| r.get(0))
            .unwrap();
        assert_eq!(original, None);
    }

    #[test]
    fn test_save_replaces_existing_table() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("out.db");

        save(&sample(), &db, "t").unwrap();
        let mut smaller = sample();
        smaller.rows.truncate(1);
        save(&smaller, &db, "t").unwrap();

        let conn = Connection::open(&db).unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM t", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_quotes_awkward_identifiers() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("nested").join("out.db");
        let ds = Dataset {
            columns: vec!["weird \"name\"".into(), "order".into()],
            rows: vec![vec![Value::Integer(1), Value::Real(0.5)]],
        };

        let summary = save(&ds, &db, "select").unwrap();
        assert_eq!(summary.rows, 1);
    }

    #[test]
    fn test_unopenable_store_is_storage_error() {
        let dir = tempdir().unwrap();
        // A directory cannot be opened as a database file
        let err = save(&sample(), dir.path(), "t").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);
    }

    #[test]
    fn test_store_under_regular_file_is_storage_error() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, "x").unwrap();

        let err = save(&sample(), blocker.join("out.db"), "t").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);
    }

    #[test]
    fn test_columnless_dataset_is_storage_error() {
        let dir = tempdir().unwrap();
        let err = save(&Dataset::default(), dir.path().join("out.db"), "t").unwrap_err();
        assert!(matches!(err, EtlError::Store(_)));
        assert_eq!(err.kind(), ErrorKind::Storage);
    }
}
