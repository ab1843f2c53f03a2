//! Catalog and storage engine.
//!
//! One database is one text file `<name>.db` inside the session's data
//! directory (format in `codec`). Every mutation is a single linear scan
//! of the current file that streams a complete replacement into
//! `<name>.db.tmp`; the temp file atomically renames over the original
//! only after the scan finishes, and is deleted on every failure path.
//! Statements are therefore all-or-nothing with respect to the persisted
//! file (not crash-atomic across the rename itself).

use crate::ast::{ColumnDef, Filter, SelectResult, SetClause, Statement};
use crate::codec;
use crate::error::{DbError, DbResult};
use crate::executor;
use crate::parser;
use crate::validator;
use regex::Regex;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

const DB_EXTENSION: &str = "db";

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern"))
}

fn check_identifier(name: &str) -> DbResult<()> {
    if identifier_pattern().is_match(name) {
        Ok(())
    } else {
        Err(DbError::InvalidIdentifier(name.to_string()))
    }
}

/// Position of the line scanner within a database file, relative to one
/// target table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    /// Before the target table's header line.
    SeekingTable,
    /// Header seen, `#SCHEMA` not yet.
    TableFound,
    /// Inside the schema block, `#BODY` not yet.
    InSchema,
    /// `#BODY` seen, its `{` not yet.
    BodyHeader,
    /// Between the body's `{` and `}`: every line is one record.
    InBody,
    /// Past the target table; the rest of the file is copied verbatim.
    Done,
}

/// What a rewrite does to the target table's body block.
enum RewriteOp<'a> {
    /// Copy every record, then append one new record line before `}`.
    Insert { line: String },
    /// Drop every record matching the filter (all of them if `None`).
    Delete { filter: Option<&'a Filter> },
    /// Mutate one column of every record matching the filter.
    Update {
        set: &'a SetClause,
        set_column: &'a ColumnDef,
        filter: Option<&'a Filter>,
    },
}

/// Scratch file for the rewrite protocol. Deleted on drop unless committed.
struct TempFile {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    committed: bool,
}

impl TempFile {
    fn create(target: &Path) -> DbResult<Self> {
        let mut name = target.as_os_str().to_owned();
        name.push(".tmp");
        let path = PathBuf::from(name);
        let writer = BufWriter::new(File::create(&path)?);
        Ok(TempFile {
            path,
            writer: Some(writer),
            committed: false,
        })
    }

    fn write_line(&mut self, line: &str) -> DbResult<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.write_all(line.as_bytes())?;
            writer.write_all(b"\n")?;
        }
        Ok(())
    }

    /// Flushes and renames over the target. On any error the guard still
    /// removes the temp file when dropped.
    fn commit(mut self, target: &Path) -> DbResult<()> {
        if let Some(writer) = self.writer.take() {
            let file = writer.into_inner().map_err(|e| DbError::Io(e.into_error()))?;
            file.sync_all()?;
        }
        fs::rename(&self.path, target)?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if !self.committed {
            self.writer.take();
            let _ = fs::remove_file(&self.path);
        }
    }
}

/// Handle to one data directory and the database selected within it.
///
/// The selection is plain session state: it is set by selecting a database
/// (or creating one while nothing is selected) and cleared when the
/// selected database is dropped. Every table and record operation requires
/// it. Operations run synchronously on the caller's thread; the engine has
/// no notion of concurrent access to a database file.
pub struct Session {
    data_dir: PathBuf,
    current: Option<String>,
}

impl Session {
    pub fn new<P: Into<PathBuf>>(data_dir: P) -> Self {
        Session {
            data_dir: data_dir.into(),
            current: None,
        }
    }

    /// The currently selected database, if any.
    pub fn current_database(&self) -> Option<&str> {
        self.current.as_deref()
    }

    fn db_path(&self, name: &str) -> PathBuf {
        self.data_dir.join(format!("{name}.{DB_EXTENSION}"))
    }

    fn current_path(&self) -> DbResult<PathBuf> {
        let name = self.current.as_deref().ok_or(DbError::NoDatabaseSelected)?;
        Ok(self.db_path(name))
    }

    /// Runs a batch of `;`-separated statements in order, aborting at the
    /// first failure. Returns the results of the batch's SELECTs.
    pub fn execute(&mut self, batch: &str) -> DbResult<Vec<SelectResult>> {
        let mut results = Vec::new();
        for text in parser::split_statements(batch)? {
            match parser::parse(text)? {
                Statement::CreateDatabase(name) => self.create_database(&name)?,
                Statement::DropDatabase(name) => self.drop_database(&name)?,
                Statement::CreateTable(stmt) => self.create_table(&stmt.name, &stmt.columns)?,
                Statement::DropTable(name) => self.drop_table(&name)?,
                Statement::Insert(stmt) => self.insert(&stmt.table, &stmt.values)?,
                Statement::Delete(stmt) => self.delete(&stmt.table, stmt.filter.as_ref())?,
                Statement::Update(stmt) => {
                    self.update(&stmt.table, &stmt.set, stmt.filter.as_ref())?
                }
                Statement::Select(stmt) => {
                    results.push(executor::select(self, &stmt.tables, &stmt.joins)?)
                }
            }
        }
        Ok(results)
    }

    /// Creates an empty database file. If nothing is selected yet, the new
    /// database becomes the selection.
    pub fn create_database(&mut self, name: &str) -> DbResult<()> {
        check_identifier(name)?;
        let path = self.db_path(name);
        if path.is_file() {
            return Err(DbError::DatabaseAlreadyExists(name.to_string()));
        }
        File::create(&path)?;
        if self.current.is_none() {
            self.current = Some(name.to_string());
        }
        Ok(())
    }

    /// Removes a database file; dropping the selected database clears the
    /// selection.
    pub fn drop_database(&mut self, name: &str) -> DbResult<()> {
        check_identifier(name)?;
        let path = self.db_path(name);
        if !path.is_file() {
            return Err(DbError::DatabaseNotFound(name.to_string()));
        }
        fs::remove_file(&path)?;
        if self.current.as_deref() == Some(name) {
            self.current = None;
        }
        Ok(())
    }

    pub fn select_database(&mut self, name: &str) -> DbResult<()> {
        check_identifier(name)?;
        if !self.db_path(name).is_file() {
            return Err(DbError::DatabaseNotFound(name.to_string()));
        }
        self.current = Some(name.to_string());
        Ok(())
    }

    /// Appends a new table with an empty body to the current database.
    pub fn create_table(&mut self, name: &str, columns: &[ColumnDef]) -> DbResult<()> {
        check_identifier(name)?;
        if columns.is_empty() {
            return Err(DbError::MalformedStatement(format!(
                "table '{name}' needs at least one column"
            )));
        }
        for (i, column) in columns.iter().enumerate() {
            check_identifier(&column.name)?;
            if column.is_key() && column.nullable {
                return Err(DbError::MalformedStatement(format!(
                    "key column '{}' cannot be null",
                    column.name
                )));
            }
            if columns[..i].iter().any(|c| c.name == column.name) {
                return Err(DbError::MalformedStatement(format!(
                    "duplicate column name '{}'",
                    column.name
                )));
            }
        }

        let path = self.current_path()?;
        let header = format!("{}{name}", codec::TABLE_HEADER);
        let reader = BufReader::new(File::open(&path)?);
        let mut tmp = TempFile::create(&path)?;
        for line in reader.lines() {
            let line = line?;
            if line.trim() == header {
                return Err(DbError::TableAlreadyExists(name.to_string()));
            }
            tmp.write_line(&line)?;
        }
        for block_line in codec::encode_table_block(name, columns).lines() {
            tmp.write_line(block_line)?;
        }
        tmp.commit(&path)
    }

    /// Removes one table block, leaving every other table untouched and in
    /// order.
    pub fn drop_table(&mut self, name: &str) -> DbResult<()> {
        check_identifier(name)?;
        let path = self.current_path()?;
        let header = format!("{}{name}", codec::TABLE_HEADER);
        let reader = BufReader::new(File::open(&path)?);
        let mut tmp = TempFile::create(&path)?;
        let mut skipping = false;
        let mut found = false;
        for line in reader.lines() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed == header {
                skipping = true;
                found = true;
                continue;
            }
            if skipping && trimmed.starts_with(codec::TABLE_HEADER) {
                skipping = false;
            }
            if !skipping {
                tmp.write_line(&line)?;
            }
        }
        if !found {
            return Err(DbError::TableNotFound(name.to_string()));
        }
        tmp.commit(&path)
    }

    /// Reads a table's schema from the current database.
    pub fn read_schema(&self, table: &str) -> DbResult<Vec<ColumnDef>> {
        let path = self.current_path()?;
        let header = format!("{}{table}", codec::TABLE_HEADER);
        let reader = BufReader::new(File::open(&path)?);
        let mut state = ScanState::SeekingTable;
        for line in reader.lines() {
            let line = line?;
            match state {
                ScanState::SeekingTable if line.trim() == header => {
                    state = ScanState::TableFound;
                }
                ScanState::TableFound if line.trim() == codec::SCHEMA_MARKER => {
                    state = ScanState::InSchema;
                }
                ScanState::InSchema if line.starts_with("\t(") => {
                    return codec::decode_schema_line(&line);
                }
                _ => {}
            }
        }
        Err(DbError::TableNotFound(table.to_string()))
    }

    /// Reads every record of a table as stored `(column, literal)` pairs.
    pub fn read_records(&self, table: &str) -> DbResult<Vec<Vec<(String, String)>>> {
        let path = self.current_path()?;
        let header = format!("{}{table}", codec::TABLE_HEADER);
        let reader = BufReader::new(File::open(&path)?);
        let mut state = ScanState::SeekingTable;
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            let trimmed = line.trim();
            match state {
                ScanState::SeekingTable if trimmed == header => state = ScanState::TableFound,
                ScanState::TableFound if trimmed == codec::SCHEMA_MARKER => {
                    state = ScanState::InSchema;
                }
                ScanState::InSchema if trimmed == codec::BODY_MARKER => {
                    state = ScanState::BodyHeader;
                }
                ScanState::BodyHeader if trimmed == codec::BLOCK_OPEN => {
                    state = ScanState::InBody;
                }
                ScanState::InBody => {
                    if trimmed == codec::BLOCK_CLOSE {
                        return Ok(records);
                    }
                    records.push(codec::decode_record_line(&line)?);
                }
                _ => {}
            }
        }
        Err(DbError::TableNotFound(table.to_string()))
    }

    /// Validates and appends one record, stored in schema column order.
    pub fn insert(&mut self, table: &str, values: &[(String, String)]) -> DbResult<()> {
        let schema = self.read_schema(table)?;
        for (name, _) in values {
            validator::find_column(&schema, table, name)?;
        }
        if let Some((duplicate, _)) = values
            .iter()
            .enumerate()
            .find(|(i, (name, _))| values[..*i].iter().any(|(n, _)| n == name))
            .map(|(_, pair)| pair)
        {
            return Err(DbError::MalformedStatement(format!(
                "column '{duplicate}' is listed twice"
            )));
        }

        let existing = self.read_records(table)?;
        let mut record = Vec::with_capacity(schema.len());
        for column in &schema {
            let Some((_, literal)) = values.iter().find(|(name, _)| name == &column.name) else {
                return Err(DbError::MalformedStatement(format!(
                    "INSERT into '{table}' is missing a value for column '{}'",
                    column.name
                )));
            };
            validator::check_value(table, column, literal)?;
            validator::check_unique(table, column, literal, &existing)?;
            record.push((column.name.clone(), literal.clone()));
        }

        let line = codec::encode_record_line(&record);
        self.rewrite_body(table, RewriteOp::Insert { line })
    }

    /// Removes every record matching the filter, or all records when there
    /// is none.
    pub fn delete(&mut self, table: &str, filter: Option<&Filter>) -> DbResult<()> {
        let schema = self.read_schema(table)?;
        if let Some(f) = filter {
            validator::find_column(&schema, table, &f.column)?;
        }
        self.rewrite_body(table, RewriteOp::Delete { filter })
    }

    /// Mutates one column of every record matching the filter, or of all
    /// records when there is none.
    pub fn update(
        &mut self,
        table: &str,
        set: &SetClause,
        filter: Option<&Filter>,
    ) -> DbResult<()> {
        let schema = self.read_schema(table)?;
        if let Some(f) = filter {
            validator::find_column(&schema, table, &f.column)?;
        }
        let set_column = validator::check_set_clause(table, &schema, set)?;
        self.rewrite_body(
            table,
            RewriteOp::Update {
                set,
                set_column,
                filter,
            },
        )
    }

    /// The rewrite protocol: one pass over the current file, streaming a
    /// replacement into a temp file. The operations differ only in what
    /// they do inside the target table's body block.
    fn rewrite_body(&self, table: &str, op: RewriteOp) -> DbResult<()> {
        let path = self.current_path()?;
        let header = format!("{}{table}", codec::TABLE_HEADER);
        let reader = BufReader::new(File::open(&path)?);
        let mut tmp = TempFile::create(&path)?;
        let mut state = ScanState::SeekingTable;
        for line in reader.lines() {
            let line = line?;
            let trimmed = line.trim();
            match state {
                ScanState::SeekingTable if trimmed == header => state = ScanState::TableFound,
                ScanState::TableFound if trimmed == codec::SCHEMA_MARKER => {
                    state = ScanState::InSchema;
                }
                ScanState::InSchema if trimmed == codec::BODY_MARKER => {
                    state = ScanState::BodyHeader;
                }
                ScanState::BodyHeader if trimmed == codec::BLOCK_OPEN => {
                    state = ScanState::InBody;
                }
                ScanState::InBody => {
                    if trimmed == codec::BLOCK_CLOSE {
                        if let RewriteOp::Insert { line: new_record } = &op {
                            tmp.write_line(new_record)?;
                        }
                        state = ScanState::Done;
                    } else {
                        let record = codec::decode_record_line(&line)?;
                        match &op {
                            RewriteOp::Insert { .. } => {}
                            RewriteOp::Delete { filter } => {
                                if record_matches(&record, *filter) {
                                    continue;
                                }
                            }
                            RewriteOp::Update {
                                set,
                                set_column,
                                filter,
                            } => {
                                if record_matches(&record, *filter) {
                                    let updated =
                                        apply_record_update(table, set_column, set, record)?;
                                    tmp.write_line(&codec::encode_record_line(&updated))?;
                                    continue;
                                }
                            }
                        }
                    }
                }
                _ => {}
            }
            tmp.write_line(&line)?;
        }
        if state == ScanState::SeekingTable {
            return Err(DbError::TableNotFound(table.to_string()));
        }
        tmp.commit(&path)
    }
}

fn record_matches(record: &[(String, String)], filter: Option<&Filter>) -> bool {
    match filter {
        None => true,
        Some(filter) => record
            .iter()
            .any(|(name, stored)| name == &filter.column && filter.matches(stored)),
    }
}

fn apply_record_update(
    table: &str,
    set_column: &ColumnDef,
    set: &SetClause,
    mut record: Vec<(String, String)>,
) -> DbResult<Vec<(String, String)>> {
    let Some(slot) = record.iter_mut().find(|(name, _)| name == &set.column) else {
        return Err(DbError::Corrupt(format!(
            "record of table '{table}' lacks column '{}'",
            set.column
        )));
    };
    slot.1 = validator::apply_set(table, set_column, set, &slot.1)?;
    Ok(record)
}
