//! SELECT evaluation: working sets, chained inner joins, projection.
//!
//! Every table named by the statement starts as its own working set of
//! records tagged with qualified `table.column` names. Each `ON` condition,
//! in the order written, replaces its two tables' working sets with their
//! equi-joined product. After the last condition the result rows are taken
//! from the set the final condition's right-hand table belongs to, and the
//! projected columns are read from those rows, `Null` where a row has no
//! such column.

use crate::ast::{JoinCondition, SelectResult, TableProjection, Value};
use crate::codec;
use crate::error::{DbError, DbResult};
use crate::parser;
use crate::storage::Session;
use crate::validator;
use std::collections::HashMap;

/// One joined row: qualified column names paired with stored literals.
type Row = Vec<(String, String)>;

pub fn select(
    session: &Session,
    projections: &[TableProjection],
    joins: &[JoinCondition],
) -> DbResult<SelectResult> {
    let Some(first) = projections.first() else {
        return Err(DbError::MalformedStatement(
            "SELECT needs at least one projected column".to_string(),
        ));
    };
    let mut sets = WorkingSets::default();
    let mut schemas = HashMap::new();

    // Resolve every named table up front so a bad reference fails before
    // any joining starts.
    for projection in projections {
        let schema = session.read_schema(&projection.table)?;
        for qualified in &projection.columns {
            let (_, column) = parser::split_qualified(qualified)?;
            validator::find_column(&schema, &projection.table, column)?;
        }
        schemas.insert(projection.table.clone(), schema);
    }
    for join in joins {
        for qualified in [&join.left, &join.right] {
            let (table, column) = parser::split_qualified(qualified)?;
            if !schemas.contains_key(table) {
                schemas.insert(table.to_string(), session.read_schema(table)?);
            }
            validator::find_column(&schemas[table], table, column)?;
        }
    }

    for join in joins {
        let (left_table, left_column) = parser::split_qualified(&join.left)?;
        let (right_table, right_column) = parser::split_qualified(&join.right)?;
        let left_type = validator::find_column(&schemas[left_table], left_table, left_column)?
            .data_type;
        let right_type = validator::find_column(&schemas[right_table], right_table, right_column)?
            .data_type;
        if left_type != right_type {
            return Err(DbError::JoinTypeMismatch(
                join.left.clone(),
                join.right.clone(),
            ));
        }
        sets.join(session, join, left_table, right_table)?;
    }

    // The rows come from the last join's right-hand table, or from the one
    // projected table when there is no join.
    let final_table = match joins.last() {
        Some(join) => parser::split_qualified(&join.right)?.0,
        None => first.table.as_str(),
    };
    let rows = sets.load(session, final_table)?;

    let schema: Vec<String> = projections
        .iter()
        .flat_map(|p| p.columns.iter().cloned())
        .collect();
    let mut decoded = Vec::with_capacity(rows.len());
    for row in rows {
        let mut tuple = Vec::with_capacity(schema.len());
        for qualified in &schema {
            match field(row, qualified) {
                Some(literal) => tuple.push(codec::decode_literal(literal)?),
                None => tuple.push(Value::Null),
            }
        }
        decoded.push(tuple);
    }
    Ok(SelectResult {
        schema,
        rows: decoded,
    })
}

fn field<'a>(row: &'a Row, qualified: &str) -> Option<&'a str> {
    row.iter()
        .find(|(name, _)| name == qualified)
        .map(|(_, literal)| literal.as_str())
}

/// The working sets of all tables touched so far. Joining two tables fuses
/// their sets; every table previously in either set follows the fusion.
#[derive(Default)]
struct WorkingSets {
    sets: Vec<Vec<Row>>,
    by_table: HashMap<String, usize>,
}

impl WorkingSets {
    /// The working set a table currently belongs to, reading its records
    /// from the database on first use.
    fn load_index(&mut self, session: &Session, table: &str) -> DbResult<usize> {
        if let Some(&index) = self.by_table.get(table) {
            return Ok(index);
        }
        let rows: Vec<Row> = session
            .read_records(table)?
            .into_iter()
            .map(|record| {
                record
                    .into_iter()
                    .map(|(column, literal)| (format!("{table}.{column}"), literal))
                    .collect()
            })
            .collect();
        let index = self.sets.len();
        self.sets.push(rows);
        self.by_table.insert(table.to_string(), index);
        Ok(index)
    }

    fn load(&mut self, session: &Session, table: &str) -> DbResult<&[Row]> {
        let index = self.load_index(session, table)?;
        Ok(&self.sets[index])
    }

    /// Applies one `ON` condition. Stored literals compare textually, so
    /// two nulls match each other and nothing else.
    fn join(
        &mut self,
        session: &Session,
        condition: &JoinCondition,
        left_table: &str,
        right_table: &str,
    ) -> DbResult<()> {
        let left_index = self.load_index(session, left_table)?;
        let right_index = self.load_index(session, right_table)?;

        let joined = if left_index == right_index {
            // Both columns already live in the same rows; the condition
            // becomes a filter.
            self.sets[left_index]
                .iter()
                .filter(|row| {
                    matches!(
                        (field(row, &condition.left), field(row, &condition.right)),
                        (Some(a), Some(b)) if a == b
                    )
                })
                .cloned()
                .collect()
        } else {
            let mut joined = Vec::new();
            for left_row in &self.sets[left_index] {
                let Some(left_value) = field(left_row, &condition.left) else {
                    continue;
                };
                for right_row in &self.sets[right_index] {
                    if field(right_row, &condition.right) == Some(left_value) {
                        let mut row = left_row.clone();
                        row.extend(right_row.iter().cloned());
                        joined.push(row);
                    }
                }
            }
            joined
        };

        let fused = self.sets.len();
        self.sets.push(joined);
        for index in self.by_table.values_mut() {
            if *index == left_index || *index == right_index {
                *index = fused;
            }
        }
        Ok(())
    }
}
