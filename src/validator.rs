//! Pure constraint and type checks consulted by the storage engine during
//! INSERT and UPDATE. Nothing here touches the filesystem.

use crate::ast::{ColumnDef, DataType, SetClause, SetOp};
use crate::codec;
use crate::error::{DbError, DbResult};

/// Looks a column up in a schema.
pub fn find_column<'a>(
    schema: &'a [ColumnDef],
    table: &str,
    column: &str,
) -> DbResult<&'a ColumnDef> {
    schema
        .iter()
        .find(|c| c.name == column)
        .ok_or_else(|| DbError::ColumnNotFound {
            table: table.to_string(),
            column: column.to_string(),
        })
}

/// Type and nullability check for one literal against one column. A `null`
/// literal is accepted exactly when the column is nullable, overriding the
/// type check.
pub fn check_value(table: &str, column: &ColumnDef, literal: &str) -> DbResult<()> {
    if literal == "null" {
        if column.nullable {
            return Ok(());
        }
        return Err(DbError::NullabilityViolation {
            table: table.to_string(),
            column: column.name.clone(),
        });
    }
    let ok = match column.data_type {
        DataType::Integer => literal.parse::<i64>().is_ok(),
        DataType::String => codec::quoted_inner(literal).is_some(),
    };
    if ok {
        Ok(())
    } else {
        Err(DbError::TypeMismatch {
            table: table.to_string(),
            column: column.name.clone(),
            expected: column.data_type,
        })
    }
}

/// For key columns, the candidate literal must not already be stored in
/// that column of any existing record. Comparison is textual.
pub fn check_unique(
    table: &str,
    column: &ColumnDef,
    literal: &str,
    existing: &[Vec<(String, String)>],
) -> DbResult<()> {
    if !column.is_key() {
        return Ok(());
    }
    for record in existing {
        if record
            .iter()
            .any(|(name, stored)| name == &column.name && stored == literal)
        {
            return Err(DbError::UniquenessViolation {
                table: table.to_string(),
                column: column.name.clone(),
            });
        }
    }
    Ok(())
}

/// Validates an UPDATE's SET clause against the schema and returns the
/// target column. Key columns are immutable regardless of whether any
/// record matches the predicate; the compound operators require an integer
/// column and an integer operand.
pub fn check_set_clause<'a>(
    table: &str,
    schema: &'a [ColumnDef],
    set: &SetClause,
) -> DbResult<&'a ColumnDef> {
    let column = find_column(schema, table, &set.column)?;
    if column.is_key() {
        return Err(DbError::ImmutableColumnViolation {
            table: table.to_string(),
            column: column.name.clone(),
        });
    }
    if set.op.is_arithmetic() {
        if column.data_type == DataType::String {
            return Err(DbError::UnsupportedOperatorForType {
                table: table.to_string(),
                column: column.name.clone(),
                op: set.op.symbol(),
            });
        }
        if set.value.parse::<i64>().is_err() {
            return Err(DbError::TypeMismatch {
                table: table.to_string(),
                column: column.name.clone(),
                expected: DataType::Integer,
            });
        }
    } else {
        check_value(table, column, &set.value)?;
    }
    Ok(column)
}

/// Applies a validated SET clause to one stored literal, producing the new
/// literal. `/=` is integer (truncating) division; division by zero and
/// i64 overflow are reported, not wrapped.
pub fn apply_set(table: &str, column: &ColumnDef, set: &SetClause, stored: &str) -> DbResult<String> {
    if set.op == SetOp::Assign {
        return Ok(set.value.clone());
    }
    let type_mismatch = || DbError::TypeMismatch {
        table: table.to_string(),
        column: column.name.clone(),
        expected: DataType::Integer,
    };
    // A stored null has no integer value to operate on.
    let current: i64 = stored.parse().map_err(|_| type_mismatch())?;
    let operand: i64 = set.value.parse().map_err(|_| type_mismatch())?;
    let result = match set.op {
        SetOp::Assign => unreachable!("handled above"),
        SetOp::MulAssign => current.checked_mul(operand),
        SetOp::AddAssign => current.checked_add(operand),
        SetOp::SubAssign => current.checked_sub(operand),
        SetOp::DivAssign => {
            if operand == 0 {
                return Err(DbError::Arithmetic(format!(
                    "division by zero in column '{}' of table '{table}'",
                    column.name
                )));
            }
            current.checked_div(operand)
        }
    };
    result
        .map(|n| n.to_string())
        .ok_or_else(|| DbError::Arithmetic("integer overflow".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(data_type: DataType, nullable: bool, key: bool) -> ColumnDef {
        ColumnDef {
            name: "c".to_string(),
            data_type,
            primary_key: key,
            unique: false,
            nullable,
        }
    }

    fn set(op: SetOp, value: &str) -> SetClause {
        SetClause {
            column: "c".to_string(),
            op,
            value: value.to_string(),
        }
    }

    #[test]
    fn integer_columns_accept_signed_integers() {
        let col = column(DataType::Integer, false, false);
        assert!(check_value("t", &col, "42").is_ok());
        assert!(check_value("t", &col, "-42").is_ok());
        assert!(check_value("t", &col, "'42'").is_err());
        assert!(check_value("t", &col, "null").is_err());
    }

    #[test]
    fn string_columns_require_quotes() {
        let col = column(DataType::String, false, false);
        assert!(check_value("t", &col, "'hi'").is_ok());
        assert!(check_value("t", &col, "hi").is_err());
        assert!(check_value("t", &col, "7").is_err());
    }

    #[test]
    fn null_is_gated_on_nullability() {
        let col = column(DataType::String, true, false);
        assert!(check_value("t", &col, "null").is_ok());
        assert!(matches!(
            check_value("t", &column(DataType::String, false, false), "null"),
            Err(DbError::NullabilityViolation { .. })
        ));
    }

    #[test]
    fn uniqueness_scans_existing_records() {
        let col = column(DataType::Integer, false, true);
        let existing = vec![vec![("c".to_string(), "1".to_string())]];
        assert!(check_unique("t", &col, "2", &existing).is_ok());
        assert!(matches!(
            check_unique("t", &col, "1", &existing),
            Err(DbError::UniquenessViolation { .. })
        ));
        // Non-key columns may repeat freely.
        let plain = column(DataType::Integer, false, false);
        assert!(check_unique("t", &plain, "1", &existing).is_ok());
    }

    #[test]
    fn key_columns_are_immutable() {
        let schema = vec![column(DataType::Integer, false, true)];
        assert!(matches!(
            check_set_clause("t", &schema, &set(SetOp::Assign, "2")),
            Err(DbError::ImmutableColumnViolation { .. })
        ));
    }

    #[test]
    fn arithmetic_needs_integer_column_and_operand() {
        let strings = vec![column(DataType::String, false, false)];
        assert!(matches!(
            check_set_clause("t", &strings, &set(SetOp::AddAssign, "2")),
            Err(DbError::UnsupportedOperatorForType { .. })
        ));
        let integers = vec![column(DataType::Integer, false, false)];
        assert!(matches!(
            check_set_clause("t", &integers, &set(SetOp::AddAssign, "'2'")),
            Err(DbError::TypeMismatch { .. })
        ));
        assert!(check_set_clause("t", &integers, &set(SetOp::AddAssign, "2")).is_ok());
    }

    #[test]
    fn apply_set_arithmetic() {
        let col = column(DataType::Integer, false, false);
        assert_eq!(apply_set("t", &col, &set(SetOp::MulAssign, "3"), "7").unwrap(), "21");
        assert_eq!(apply_set("t", &col, &set(SetOp::AddAssign, "-1"), "0").unwrap(), "-1");
        assert_eq!(apply_set("t", &col, &set(SetOp::SubAssign, "5"), "3").unwrap(), "-2");
        // Truncating division.
        assert_eq!(apply_set("t", &col, &set(SetOp::DivAssign, "2"), "7").unwrap(), "3");
        assert_eq!(apply_set("t", &col, &set(SetOp::DivAssign, "2"), "-7").unwrap(), "-3");
    }

    #[test]
    fn apply_set_reports_bad_arithmetic() {
        let col = column(DataType::Integer, false, false);
        assert!(matches!(
            apply_set("t", &col, &set(SetOp::DivAssign, "0"), "7"),
            Err(DbError::Arithmetic(_))
        ));
        assert!(matches!(
            apply_set("t", &col, &set(SetOp::MulAssign, "2"), &i64::MAX.to_string()),
            Err(DbError::Arithmetic(_))
        ));
        // Arithmetic on a stored null.
        assert!(matches!(
            apply_set("t", &col, &set(SetOp::AddAssign, "1"), "null"),
            Err(DbError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn plain_assignment_replaces_the_literal() {
        let col = column(DataType::Integer, true, false);
        assert_eq!(apply_set("t", &col, &set(SetOp::Assign, "9"), "1").unwrap(), "9");
    }
}
