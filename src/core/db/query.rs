/// Query Execution Module
///
/// Executes arbitrary SQL on behalf of remote callers. Statements are
/// classified by their leading keyword: only statements that start with
/// `SELECT` are treated as reads and return rows; everything else is treated
/// as a write and reported as an affected-row count.
///
/// The classification is a plain prefix match. `WITH ... SELECT`,
/// `PRAGMA` and `EXPLAIN` statements therefore execute as writes: any rows
/// they produce are discarded and `rows_affected` is 0.

use super::value::{json_params, read_row, Row};
use crate::core::Result;
use rusqlite::{params_from_iter, Connection};
use serde_json::Value;
use tracing::debug;

/// Represents different SQL statement types for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementType {
    /// SELECT statement
    Select,
    /// INSERT or REPLACE statement
    Insert,
    /// UPDATE statement
    Update,
    /// DELETE statement
    Delete,
    /// CREATE statement
    Create,
    /// DROP statement
    Drop,
    /// ALTER statement
    Alter,
    /// BEGIN/COMMIT/ROLLBACK/END transaction commands
    Transaction,
    /// Other statement types
    Other,
}

impl StatementType {
    /// Determines the statement type from a SQL string
    pub fn from_sql(sql: &str) -> Self {
        let sql_upper = sql.trim().to_uppercase();
        let keyword = sql_upper
            .split(|c: char| !c.is_ascii_alphabetic())
            .next()
            .unwrap_or("");

        if sql_upper.starts_with("SELECT") {
            return StatementType::Select;
        }
        match keyword {
            "INSERT" | "REPLACE" => StatementType::Insert,
            "UPDATE" => StatementType::Update,
            "DELETE" => StatementType::Delete,
            "CREATE" => StatementType::Create,
            "DROP" => StatementType::Drop,
            "ALTER" => StatementType::Alter,
            "BEGIN" | "COMMIT" | "ROLLBACK" | "END" => StatementType::Transaction,
            _ => StatementType::Other,
        }
    }

    /// Whether the statement is answered with fetched rows
    pub fn is_read(self) -> bool {
        self == StatementType::Select
    }

    /// Whether the engine reports a meaningful change count for the statement
    pub fn counts_changes(self) -> bool {
        matches!(
            self,
            StatementType::Insert | StatementType::Update | StatementType::Delete
        )
    }
}

/// Result of a raw statement
#[derive(Debug, Clone, PartialEq)]
pub enum ExecOutcome {
    /// A read: every fetched row
    Rows(Vec<Row>),
    /// A write: number of rows changed
    Affected(usize),
}

/// Executes one SQL statement with positional parameters.
///
/// Any surrounding transaction is left alone, so this runs unchanged inside
/// [`ConnectionRegistry::transaction`](super::ConnectionRegistry::transaction).
pub fn execute(conn: &Connection, sql: &str, params: &[Value]) -> Result<ExecOutcome> {
    let kind = StatementType::from_sql(sql);
    debug!("Executing {:?} statement: {}", kind, sql);

    let mut stmt = conn.prepare(sql)?;
    let bound = params_from_iter(json_params(params));

    if kind.is_read() {
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let rows = stmt
            .query_map(bound, |row| read_row(row, &names))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        return Ok(ExecOutcome::Rows(rows));
    }

    let affected = if stmt.column_count() == 0 {
        let changed = stmt.execute(bound)?;
        if kind.counts_changes() {
            changed
        } else {
            0
        }
    } else {
        // Statements such as PRAGMA or INSERT ... RETURNING produce rows
        let mut rows = stmt.query(bound)?;
        let mut produced = 0;
        while rows.next()?.is_some() {
            produced += 1;
        }
        if kind.counts_changes() {
            produced
        } else {
            0
        }
    };

    Ok(ExecOutcome::Affected(affected))
}

/// Executes a statement on behalf of a remote caller.
///
/// Same as [`execute`], except that a transaction opened earlier with a raw
/// `BEGIN` is committed by the next write that is not itself transaction
/// control. Remote callers therefore never leave work pending across calls
/// unless they only issue transaction-control statements.
pub fn execute_remote(conn: &Connection, sql: &str, params: &[Value]) -> Result<ExecOutcome> {
    let outcome = execute(conn, sql, params)?;

    let kind = StatementType::from_sql(sql);
    if !kind.is_read() && kind != StatementType::Transaction && !conn.is_autocommit() {
        conn.execute_batch("COMMIT")?;
        debug!("Committed pending transaction after write");
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::GatewayError;
    use serde_json::json;

    fn setup_test_table(conn: &Connection) {
        conn.execute_batch(
            "
            CREATE TABLE test (
                id INTEGER PRIMARY KEY,
                name TEXT,
                value REAL,
                x INTEGER DEFAULT 0
            );
            INSERT INTO test (name, value) VALUES ('Alice', 123.45);
            INSERT INTO test (name, value) VALUES ('Bob', 678.90);
            INSERT INTO test (name, value) VALUES (NULL, NULL);
        ",
        )
        .unwrap();
    }

    #[test]
    fn test_select_returns_rows() {
        let conn = Connection::open_in_memory().unwrap();
        setup_test_table(&conn);

        match execute(&conn, "SELECT id, name FROM test ORDER BY id", &[]).unwrap() {
            ExecOutcome::Rows(rows) => {
                assert_eq!(rows.len(), 3);
                assert_eq!(rows[0]["name"], json!("Alice"));
                assert_eq!(rows[2]["name"], Value::Null);
            }
            other => panic!("Expected rows, got {:?}", other),
        }
    }

    #[test]
    fn test_lowercase_select_with_params() {
        let conn = Connection::open_in_memory().unwrap();
        setup_test_table(&conn);

        let outcome = execute(&conn, "  select name from test where id = ?", &[json!(2)]).unwrap();
        assert_eq!(
            outcome,
            ExecOutcome::Rows(vec![json!({"name": "Bob"}).as_object().cloned().unwrap()])
        );
    }

    #[test]
    fn test_write_returns_affected_count() {
        let conn = Connection::open_in_memory().unwrap();
        setup_test_table(&conn);

        assert_eq!(
            execute(&conn, "UPDATE test SET x = 1", &[]).unwrap(),
            ExecOutcome::Affected(3)
        );
        assert_eq!(
            execute(&conn, "DELETE FROM test WHERE id = ?", &[json!(1)]).unwrap(),
            ExecOutcome::Affected(1)
        );
    }

    #[test]
    fn test_ddl_reports_zero_affected() {
        let conn = Connection::open_in_memory().unwrap();
        setup_test_table(&conn);
        execute(&conn, "UPDATE test SET x = 2", &[]).unwrap();

        assert_eq!(
            execute(&conn, "ALTER TABLE test ADD COLUMN extra TEXT", &[]).unwrap(),
            ExecOutcome::Affected(0)
        );
    }

    #[test]
    fn test_non_select_reads_are_write_shaped() {
        let conn = Connection::open_in_memory().unwrap();
        setup_test_table(&conn);

        assert_eq!(
            execute(&conn, "WITH c AS (SELECT 1) SELECT * FROM c", &[]).unwrap(),
            ExecOutcome::Affected(0)
        );
        assert_eq!(
            execute(&conn, "PRAGMA table_info(test)", &[]).unwrap(),
            ExecOutcome::Affected(0)
        );
    }

    #[test]
    fn test_raw_begin_is_committed_by_next_remote_write() {
        let conn = Connection::open_in_memory().unwrap();
        setup_test_table(&conn);

        execute_remote(&conn, "BEGIN", &[]).unwrap();
        assert!(!conn.is_autocommit());
        execute_remote(&conn, "SELECT * FROM test", &[]).unwrap();
        assert!(!conn.is_autocommit());
        execute_remote(&conn, "UPDATE test SET x = 9 WHERE id = 1", &[]).unwrap();
        assert!(conn.is_autocommit());
    }

    #[test]
    fn test_execute_leaves_open_transaction_alone() {
        let conn = Connection::open_in_memory().unwrap();
        setup_test_table(&conn);

        conn.execute_batch("BEGIN").unwrap();
        execute(&conn, "UPDATE test SET x = 9 WHERE id = 1", &[]).unwrap();
        assert!(!conn.is_autocommit());
        conn.execute_batch("ROLLBACK").unwrap();

        let x: i64 = conn.query_row("SELECT x FROM test WHERE id = 1", [], |r| r.get(0)).unwrap();
        assert_eq!(x, 0);
    }

    #[test]
    fn test_query_error_handling() {
        let conn = Connection::open_in_memory().unwrap();

        match execute(&conn, "SELECT * FROM nonexistent_table", &[]) {
            Err(GatewayError::Engine(e)) => assert!(e.to_string().contains("no such table")),
            other => panic!("Expected engine error, got {:?}", other),
        }
    }

    #[test]
    fn test_statement_type_classification() {
        assert_eq!(StatementType::from_sql("SELECT * FROM users"), StatementType::Select);
        assert_eq!(StatementType::from_sql("  select 1"), StatementType::Select);
        assert_eq!(StatementType::from_sql("INSERT INTO users VALUES (1, 'test')"), StatementType::Insert);
        assert_eq!(StatementType::from_sql("REPLACE INTO users VALUES (1, 'test')"), StatementType::Insert);
        assert_eq!(StatementType::from_sql("UPDATE users SET name = 'new'"), StatementType::Update);
        assert_eq!(StatementType::from_sql("DELETE FROM users WHERE id = 1"), StatementType::Delete);
        assert_eq!(StatementType::from_sql("CREATE TABLE test (id INTEGER)"), StatementType::Create);
        assert_eq!(StatementType::from_sql("DROP TABLE test"), StatementType::Drop);
        assert_eq!(StatementType::from_sql("BEGIN"), StatementType::Transaction);
        assert_eq!(StatementType::from_sql("COMMIT;"), StatementType::Transaction);
        assert_eq!(StatementType::from_sql("ROLLBACK TRANSACTION"), StatementType::Transaction);
        assert_eq!(StatementType::from_sql("WITH c AS (SELECT 1) SELECT * FROM c"), StatementType::Other);
        assert_eq!(StatementType::from_sql("PRAGMA foreign_keys = ON"), StatementType::Other);
        assert!(!StatementType::from_sql("PRAGMA table_info(t)").is_read());
    }
}
