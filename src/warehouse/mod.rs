pub mod demo;

use crate::errors::{AppError, AppResult};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

static TABLE_IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Cell {
    /// Text form used for identifiers and labels. Whole reals print without a
    /// fractional part so `101.0` and `101` name the same restaurant.
    pub fn as_text(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Integer(value) => value.to_string(),
            Self::Real(value) if value.fract() == 0.0 && value.is_finite() => format!("{}", *value as i64),
            Self::Real(value) => value.to_string(),
            Self::Text(value) => value.trim().to_string(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|candidate| candidate.eq_ignore_ascii_case(column))
    }

    pub fn require_column(&self, column: &str) -> AppResult<usize> {
        self.column_index(column).ok_or_else(|| {
            AppError::Schema(format!("table '{}' is missing column '{}'", self.name, column))
        })
    }

    pub fn push_row(&mut self, row: Vec<Cell>) -> AppResult<()> {
        if row.len() != self.columns.len() {
            return Err(AppError::Schema(format!(
                "table '{}' row has {} cells, expected {}",
                self.name,
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }
}

/// Read-only access to the analytic warehouse holding the gold tables.
pub trait WarehouseClient: Send + Sync {
    fn fetch(&self, table: &str) -> AppResult<Table>;
}

pub fn validate_table_identifier(table: &str) -> AppResult<()> {
    if TABLE_IDENTIFIER.is_match(table) {
        Ok(())
    } else {
        Err(AppError::Warehouse(format!("invalid table identifier '{}'", table)))
    }
}

#[derive(Debug)]
pub struct SqliteWarehouse {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl SqliteWarehouse {
    pub fn open(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            return Err(AppError::Warehouse(format!(
                "warehouse database not found at {}",
                path.display()
            )));
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
            db_path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }
}

impl WarehouseClient for SqliteWarehouse {
    fn fetch(&self, table: &str) -> AppResult<Table> {
        validate_table_identifier(table)?;
        let conn = self
            .conn
            .lock()
            .map_err(|_| AppError::Internal("warehouse mutex poisoned".to_string()))?;

        let mut statement = conn.prepare(&format!("SELECT * FROM {}", table))?;
        let columns = statement
            .column_names()
            .into_iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        let width = columns.len();
        let mut result = Table::new(table, columns);

        let mut rows = statement.query([])?;
        while let Some(row) = rows.next()? {
            let mut cells = Vec::with_capacity(width);
            for index in 0..width {
                cells.push(cell_from_value(row.get_ref(index)?));
            }
            result.rows.push(cells);
        }

        tracing::debug!(table, rows = result.rows.len(), "fetched warehouse table");
        Ok(result)
    }
}

fn cell_from_value(value: ValueRef<'_>) -> Cell {
    match value {
        ValueRef::Null | ValueRef::Blob(_) => Cell::Null,
        ValueRef::Integer(value) => Cell::Integer(value),
        ValueRef::Real(value) => Cell::Real(value),
        ValueRef::Text(bytes) => Cell::Text(String::from_utf8_lossy(bytes).into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::{validate_table_identifier, Cell, SqliteWarehouse, WarehouseClient};
    use rusqlite::Connection;

    #[test]
    fn rejects_identifiers_that_could_inject_sql() {
        assert!(validate_table_identifier("customer_intelligence").is_ok());
        assert!(validate_table_identifier("_staging2").is_ok());
        assert!(validate_table_identifier("orders; DROP TABLE users").is_err());
        assert!(validate_table_identifier("1table").is_err());
        assert!(validate_table_identifier("").is_err());
    }

    #[test]
    fn fetch_reads_every_cell_type() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("gold.db");
        {
            let conn = Connection::open(&db_path).expect("open");
            conn.execute_batch(
                "CREATE TABLE sample (id INTEGER, amount REAL, label TEXT, missing TEXT);
                 INSERT INTO sample VALUES (7, 12.5, 'abc', NULL);
                 INSERT INTO sample VALUES (8, 3.0, '4.25', 'x');",
            )
            .expect("seed");
        }

        let warehouse = SqliteWarehouse::open(&db_path).expect("warehouse");
        let table = warehouse.fetch("sample").expect("fetch");
        assert_eq!(table.columns, vec!["id", "amount", "label", "missing"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0][0], Cell::Integer(7));
        assert_eq!(table.rows[0][1], Cell::Real(12.5));
        assert_eq!(table.rows[0][2], Cell::Text("abc".to_string()));
        assert!(table.rows[0][3].is_null());
    }

    #[test]
    fn fetch_failure_propagates() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("gold.db");
        Connection::open(&db_path).expect("create empty db");

        let warehouse = SqliteWarehouse::open(&db_path).expect("warehouse");
        let err = warehouse.fetch("does_not_exist").expect_err("missing table");
        assert!(err.to_string().starts_with("WAREHOUSE_FAILURE"));
    }

    #[test]
    fn opening_a_missing_file_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(SqliteWarehouse::open(&dir.path().join("absent.db")).is_err());
    }

    #[test]
    fn whole_reals_render_as_integers() {
        assert_eq!(Cell::Real(101.0).as_text(), "101");
        assert_eq!(Cell::Real(1.5).as_text(), "1.5");
        assert_eq!(Cell::Text(" R-7 ".to_string()).as_text(), "R-7");
    }
}
