/// Row CRUD Module
///
/// Generic select/insert/update/delete against any table, driven by
/// caller-supplied column maps and free-form SQL conditions with positional
/// `?` placeholders.
///
/// Table names, column names and conditions are spliced into the SQL text
/// unquoted; only values are bound. Callers are trusted to supply sane
/// identifiers. Placeholder/parameter arity is not checked here either: a
/// mismatch is reported by the engine when the statement is bound.

use super::value::{json_params, json_to_sql, read_row, Row};
use crate::core::Result;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use serde_json::Value;
use tracing::{debug, info};

/// Inserts one row, binding values in the row's key order.
///
/// # Returns
///
/// The engine-assigned rowid of the new row.
pub fn insert(conn: &Connection, table: &str, row: &Row) -> Result<i64> {
    let columns: Vec<&str> = row.keys().map(String::as_str).collect();
    let placeholders = vec!["?"; columns.len()].join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        columns.join(", "),
        placeholders
    );
    let values: Vec<SqlValue> = row.values().map(json_to_sql).collect();

    debug!("INSERT SQL: {}", sql);
    conn.execute(&sql, params_from_iter(values))?;
    let rowid = conn.last_insert_rowid();
    info!("Data inserted into '{}' successfully", table);
    Ok(rowid)
}

/// Selects rows from a table.
///
/// `columns` is the raw select list (`"*"` for all). An empty `condition` is
/// treated as absent. `params` are always bound, so supplying parameters
/// without a condition is an engine error.
pub fn select(
    conn: &Connection,
    table: &str,
    columns: &str,
    condition: Option<&str>,
    params: &[Value],
) -> Result<Vec<Row>> {
    let mut sql = format!("SELECT {} FROM {}", columns, table);
    if let Some(cond) = condition.filter(|c| !c.is_empty()) {
        sql.push_str(" WHERE ");
        sql.push_str(cond);
    }

    debug!("SELECT SQL: {}", sql);
    let mut stmt = conn.prepare(&sql)?;
    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let rows = stmt
        .query_map(params_from_iter(json_params(params)), |row| read_row(row, &names))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    debug!("Retrieved {} rows from '{}'", rows.len(), table);
    Ok(rows)
}

/// Updates rows matching `condition`.
///
/// The `SET` values bind first, in the map's key order, followed by the
/// condition's own parameters. Condition placeholders are positional, so this
/// order must not change.
///
/// # Returns
///
/// Number of rows changed.
pub fn update(
    conn: &Connection,
    table: &str,
    values: &Row,
    condition: &str,
    params: &[Value],
) -> Result<usize> {
    let set_clause: Vec<String> = values.keys().map(|col| format!("{} = ?", col)).collect();
    let sql = format!(
        "UPDATE {} SET {} WHERE {}",
        table,
        set_clause.join(", "),
        condition
    );

    let bound: Vec<SqlValue> = values
        .values()
        .chain(params.iter())
        .map(json_to_sql)
        .collect();

    debug!("UPDATE SQL: {}", sql);
    let rows_affected = conn.execute(&sql, params_from_iter(bound))?;
    info!("{} row(s) updated in '{}'", rows_affected, table);
    Ok(rows_affected)
}

/// Deletes rows matching `condition`, or every row when it is absent or empty.
///
/// # Returns
///
/// Number of rows removed.
pub fn delete(
    conn: &Connection,
    table: &str,
    condition: Option<&str>,
    params: &[Value],
) -> Result<usize> {
    let mut sql = format!("DELETE FROM {}", table);
    if let Some(cond) = condition.filter(|c| !c.is_empty()) {
        sql.push_str(" WHERE ");
        sql.push_str(cond);
    }

    debug!("DELETE SQL: {}", sql);
    let rows_affected = conn.execute(&sql, params_from_iter(json_params(params)))?;
    info!("{} row(s) deleted from '{}'", rows_affected, table);
    Ok(rows_affected)
}
