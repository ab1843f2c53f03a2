use serde::{Deserialize, Serialize};
use std::fmt;

/// A single parsed SQL statement, ready for execution.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    CreateDatabase(String),
    DropDatabase(String),
    CreateTable(CreateTableStatement),
    DropTable(String),
    Insert(InsertStatement),
    Delete(DeleteStatement),
    Update(UpdateStatement),
    Select(SelectStatement),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableStatement {
    pub name: String,
    pub columns: Vec<ColumnDef>,
}

/// One column of a table schema.
///
/// `primary_key` and `unique` columns are never `nullable`; the parser and
/// the engine both reject schemas that violate this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: DataType,
    pub primary_key: bool,
    pub unique: bool,
    pub nullable: bool,
}

impl ColumnDef {
    /// Whether the column participates in a uniqueness constraint.
    pub fn is_key(&self) -> bool {
        self.primary_key || self.unique
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Integer,
    String,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Integer => write!(f, "integer"),
            DataType::String => write!(f, "string"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub table: String,
    /// `(column, literal)` pairs in the order the statement listed them.
    pub values: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStatement {
    pub table: String,
    pub filter: Option<Filter>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    pub table: String,
    pub set: SetClause,
    pub filter: Option<Filter>,
}

/// A single-predicate WHERE clause. Comparison is textual equality of the
/// stored literal against `value`.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub value: String,
}

impl Filter {
    pub fn matches(&self, stored: &str) -> bool {
        match self.op {
            FilterOp::Eq => stored == self.value,
            FilterOp::Ne => stored != self.value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
}

/// The single assignment of an UPDATE's SET clause.
#[derive(Debug, Clone, PartialEq)]
pub struct SetClause {
    pub column: String,
    pub op: SetOp,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOp {
    Assign,
    MulAssign,
    AddAssign,
    SubAssign,
    DivAssign,
}

impl SetOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            SetOp::Assign => "=",
            SetOp::MulAssign => "*=",
            SetOp::AddAssign => "+=",
            SetOp::SubAssign => "-=",
            SetOp::DivAssign => "/=",
        }
    }

    /// The compound operators only apply to integer columns.
    pub fn is_arithmetic(&self) -> bool {
        !matches!(self, SetOp::Assign)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    /// Projected tables in first-appearance order, each carrying its
    /// qualified columns in the order they were requested.
    pub tables: Vec<TableProjection>,
    /// `ON` conditions in the order they were written; joins chain in
    /// exactly this order.
    pub joins: Vec<JoinCondition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableProjection {
    pub table: String,
    /// Qualified `table.column` names.
    pub columns: Vec<String>,
}

/// An equi-join between two qualified columns.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinCondition {
    pub left: String,
    pub right: String,
}

/// A stored literal decoded to its semantic type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Integer(i64),
    Text(String),
}

/// The result of one SELECT statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectResult {
    /// Qualified column names, in projection order.
    pub schema: Vec<String>,
    /// One decoded tuple per row, column order matching `schema`.
    pub rows: Vec<Vec<Value>>,
}
