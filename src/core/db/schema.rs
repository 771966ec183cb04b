/// Schema Management Module
///
/// This module creates, drops, lists and introspects tables on a connection.
/// Column definitions are free-form type/constraint strings handed to the
/// engine as-is; there is no closed type system and no migration support.

use crate::core::{GatewayError, Result};
use rusqlite::{Connection, Row};
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use tracing::{debug, info};

/// A column requested in `create_table`: name plus its raw definition,
/// e.g. `("id", "INTEGER PRIMARY KEY")`.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    pub name: String,
    pub definition: String,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, definition: impl Into<String>) -> Self {
        ColumnSpec {
            name: name.into(),
            definition: definition.into(),
        }
    }
}

/// Column metadata as reported by the engine
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnDef {
    /// Column position
    pub cid: i64,
    /// Column name
    pub name: String,
    /// Declared type, verbatim (may be empty)
    #[serde(rename = "type")]
    pub type_name: String,
    /// Whether the column was declared NOT NULL
    #[serde(serialize_with = "bool_as_int")]
    pub notnull: bool,
    /// Default value expression (if any)
    pub default_value: Option<String>,
    /// 1-based position within the primary key, 0 if not part of it
    pub pk: i64,
    /// Referenced `table(column)` when the column is a foreign key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub references: Option<String>,
}

impl ColumnDef {
    /// Creates a ColumnDef from a PRAGMA table_info result row
    fn from_pragma_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(ColumnDef {
            cid: row.get(0)?,
            name: row.get(1)?,
            type_name: row.get(2)?,
            notnull: row.get(3)?,
            default_value: row.get(4)?,
            pk: row.get(5)?,
            references: None,
        })
    }

    /// Whether this column is part of the primary key
    pub fn is_primary_key(&self) -> bool {
        self.pk > 0
    }
}

fn bool_as_int<S: Serializer>(value: &bool, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_i64(i64::from(*value))
}

/// Creates a table if it does not already exist.
///
/// An existing table is left untouched even when `columns` differ from its
/// current definition.
pub fn create_table(conn: &Connection, table: &str, columns: &[ColumnSpec]) -> Result<()> {
    let col_defs: Vec<String> = columns
        .iter()
        .map(|c| format!("{} {}", c.name, c.definition))
        .collect();
    let sql = format!("CREATE TABLE IF NOT EXISTS {} ({})", table, col_defs.join(", "));

    debug!("CREATE TABLE SQL: {}", sql);
    conn.execute(&sql, [])?;
    info!("Table '{}' created successfully", table);
    Ok(())
}

/// Drops a table. Dropping a table that does not exist is not an error.
pub fn drop_table(conn: &Connection, table: &str) -> Result<()> {
    conn.execute(&format!("DROP TABLE IF EXISTS {}", table), [])?;
    info!("Table '{}' dropped successfully", table);
    Ok(())
}

/// Lists every table in the database, in catalog order
pub fn list_tables(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type='table'")?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(names)
}

/// Returns the ordered column metadata of a table.
///
/// # Errors
///
/// `GatewayError::UnknownTable` if the table does not exist.
pub fn get_schema(conn: &Connection, table: &str) -> Result<Vec<ColumnDef>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let mut columns = stmt
        .query_map([], |row| ColumnDef::from_pragma_row(row))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    if columns.is_empty() {
        return Err(GatewayError::UnknownTable(table.to_string()));
    }

    let references = get_foreign_keys(conn, table)?;
    for column in &mut columns {
        column.references = references.get(&column.name).cloned();
    }

    Ok(columns)
}

/// Maps each foreign-key column of a table to its `table(column)` target
fn get_foreign_keys(conn: &Connection, table: &str) -> Result<HashMap<String, String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA foreign_key_list({})", table))?;
    let fk_iter = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(2)?,         // referenced table
            row.get::<_, String>(3)?,         // from column
            row.get::<_, Option<String>>(4)?, // to column (NULL means the primary key)
        ))
    })?;

    let mut references = HashMap::new();
    for fk in fk_iter {
        let (referenced_table, from_column, to_column) = fk?;
        let target = match to_column {
            Some(to) => format!("{}({})", referenced_table, to),
            None => referenced_table,
        };
        references.insert(from_column, target);
    }
    Ok(references)
}
