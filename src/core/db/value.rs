/// Value Conversion Module
///
/// Rows cross the gateway boundary as JSON objects of untyped scalars. This
/// module converts those scalars into SQLite values for binding and turns
/// fetched SQLite values back into JSON.

use rusqlite::types::{Value as SqlValue, ValueRef};
use serde_json::{Map, Number, Value};

/// A fetched or submitted row: column name to scalar value.
///
/// `serde_json` is built with `preserve_order`, so iteration follows the order
/// in which keys were inserted (request order for submitted rows, the engine's
/// column order for fetched rows).
pub type Row = Map<String, Value>;

/// Converts a JSON value into a SQLite value suitable for positional binding.
///
/// Booleans become integers, numbers keep their integer/real distinction and
/// nested arrays or objects are stored as their JSON text.
pub fn json_to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                SqlValue::Real(f)
            } else {
                SqlValue::Text(n.to_string())
            }
        }
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => SqlValue::Text(value.to_string()),
    }
}

/// Converts a list of JSON parameters into SQLite values, preserving order.
pub fn json_params(params: &[Value]) -> Vec<SqlValue> {
    params.iter().map(json_to_sql).collect()
}

/// Converts a fetched SQLite value into JSON.
pub fn sql_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Number(i.into()),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(format!("<BLOB: {} bytes>", b.len())),
    }
}

/// Reads every column of a result row into a [`Row`], keyed by `columns`.
pub fn read_row(row: &rusqlite::Row<'_>, columns: &[String]) -> rusqlite::Result<Row> {
    let mut map = Map::with_capacity(columns.len());
    for (i, name) in columns.iter().enumerate() {
        map.insert(name.clone(), sql_to_json(row.get_ref(i)?));
    }
    Ok(map)
}

/// Splits a comma-joined parameter string (as sent in query strings) into
/// positional text parameters. No trimming or unescaping is performed.
pub fn split_params(joined: &str) -> Vec<Value> {
    joined
        .split(',')
        .map(|p| Value::String(p.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;
    use serde_json::json;

    #[test]
    fn test_json_to_sql_scalars() {
        assert_eq!(json_to_sql(&Value::Null), SqlValue::Null);
        assert_eq!(json_to_sql(&json!(true)), SqlValue::Integer(1));
        assert_eq!(json_to_sql(&json!(42)), SqlValue::Integer(42));
        assert_eq!(json_to_sql(&json!(2.5)), SqlValue::Real(2.5));
        assert_eq!(json_to_sql(&json!("a")), SqlValue::Text("a".to_string()));
        assert_eq!(
            json_to_sql(&json!({"k": [1, 2]})),
            SqlValue::Text("{\"k\":[1,2]}".to_string())
        );
    }

    #[test]
    fn test_read_row_handles_every_storage_class() {
        let conn = Connection::open_in_memory().unwrap();
        let mut stmt = conn
            .prepare("SELECT 1 AS i, 1.5 AS r, 'txt' AS t, NULL AS n, X'0102' AS b")
            .unwrap();
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let row = stmt
            .query_row([], |row| read_row(row, &columns))
            .unwrap();

        assert_eq!(row["i"], json!(1));
        assert_eq!(row["r"], json!(1.5));
        assert_eq!(row["t"], json!("txt"));
        assert_eq!(row["n"], Value::Null);
        assert_eq!(row["b"], json!("<BLOB: 2 bytes>"));
        let keys: Vec<&String> = row.keys().collect();
        assert_eq!(keys, vec!["i", "r", "t", "n", "b"]);
    }

    #[test]
    fn test_split_params() {
        assert_eq!(split_params("1,abc"), vec![json!("1"), json!("abc")]);
        assert_eq!(split_params(""), vec![json!("")]);
    }
}
