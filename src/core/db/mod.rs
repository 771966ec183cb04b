/// Database Module
///
/// This module turns one embedded SQLite file at a time into a shared,
/// generic persistence layer.
///
/// ## Architecture
///
/// - **Connection Registry** (`connection.rs`): the single active database, connect/disconnect,
///   and the in-process transaction helper
/// - **Schema Manager** (`schema.rs`): create/drop/list tables and column introspection
/// - **Row CRUD Engine** (`rows.rs`): generic select/insert/update/delete
/// - **Raw Query Executor** (`query.rs`): arbitrary SQL with read/write classification
/// - **Backup** (`backup.rs`): online copies of the active database
/// - **Values** (`value.rs`): conversion between JSON scalars and SQLite values
///
/// Schema, row, query and backup functions take a plain `&Connection`, so they
/// run the same way against the registry's connection and inside a transaction.
pub mod backup;
pub mod connection;
pub mod query;
pub mod rows;
pub mod schema;
pub mod value;

pub use backup::*;
pub use connection::*;
pub use query::*;
pub use rows::*;
pub use schema::*;
pub use value::*;
