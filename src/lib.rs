//! A single-file relational database engine.
//!
//! Each database lives in one human-readable text file holding named
//! tables with typed, constrained columns. The engine executes a
//! restricted SQL dialect: CREATE/DROP DATABASE and TABLE, INSERT, DELETE,
//! UPDATE with compound assignment operators, and SELECT with chained
//! inner joins. Every mutating statement rewrites the database file whole
//! through a temp file, so a statement either fully applies or leaves the
//! file untouched.
//!
//! ```no_run
//! use flatsql::Session;
//!
//! # fn main() -> Result<(), flatsql::DbError> {
//! let mut session = Session::new("./data");
//! session.execute(
//!     "CREATE DATABASE payroll;
//!      CREATE TABLE employee (id integer primary_key, name string, pay integer);
//!      INSERT INTO employee (id, name, pay) VALUES (1, 'Alice', 100)",
//! )?;
//! let results = session.execute("SELECT employee.name, employee.pay FROM employee")?;
//! println!("{:?}", results[0].rows);
//! # Ok(())
//! # }
//! ```

pub mod ast;
pub mod codec;
pub mod error;
pub mod executor;
pub mod lexer;
pub mod parser;
pub mod storage;
pub mod validator;

pub use ast::{ColumnDef, DataType, SelectResult, Value};
pub use error::{DbError, DbResult};
pub use storage::Session;
