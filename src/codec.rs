//! Text codec for the on-disk database format.
//!
//! A database file is a sequence of table blocks:
//!
//! ```text
//! TABLE_NAME = people
//! #SCHEMA
//! {
//!     (id, integer, pk:1;u:0;n:0), (name, string, pk:0;u:0;n:1)
//! }
//! #BODY
//! {
//!     ((id, 1), (name, 'Alice')),
//! }
//! ```
//!
//! Literals are stored verbatim: bare decimal integers, single-quoted
//! strings (quotes included), or the bare word `null`. Everything in this
//! module is pure; file traversal lives in `storage`.

use crate::ast::{ColumnDef, DataType, Value};
use crate::error::{DbError, DbResult};

pub const TABLE_HEADER: &str = "TABLE_NAME = ";
pub const SCHEMA_MARKER: &str = "#SCHEMA";
pub const BODY_MARKER: &str = "#BODY";
pub const BLOCK_OPEN: &str = "{";
pub const BLOCK_CLOSE: &str = "}";

fn corrupt(context: &str, input: &str) -> DbError {
    DbError::Corrupt(format!("{context}: {input:?}"))
}

/// Encodes constraint flags as `pk:D;u:D;n:D`.
pub fn encode_flags(column: &ColumnDef) -> String {
    format!(
        "pk:{};u:{};n:{}",
        column.primary_key as u8, column.unique as u8, column.nullable as u8
    )
}

/// Decodes `pk:D;u:D;n:D` into `(primary_key, unique, nullable)`.
pub fn decode_flags(flags: &str) -> DbResult<(bool, bool, bool)> {
    let mut decoded = [false; 3];
    let mut fields = flags.split(';');
    for (slot, key) in decoded.iter_mut().zip(["pk", "u", "n"]) {
        let field = fields
            .next()
            .ok_or_else(|| corrupt("truncated constraint flags", flags))?;
        *slot = match field.split_once(':') {
            Some((k, "0")) if k == key => false,
            Some((k, "1")) if k == key => true,
            _ => return Err(corrupt("unreadable constraint flags", flags)),
        };
    }
    if fields.next().is_some() {
        return Err(corrupt("trailing constraint flags", flags));
    }
    Ok((decoded[0], decoded[1], decoded[2]))
}

/// Encodes a whole schema as its single block line, tab indent included.
pub fn encode_schema_line(columns: &[ColumnDef]) -> String {
    let entries: Vec<String> = columns
        .iter()
        .map(|c| format!("({}, {}, {})", c.name, c.data_type, encode_flags(c)))
        .collect();
    format!("\t{}", entries.join(", "))
}

pub fn decode_schema_line(line: &str) -> DbResult<Vec<ColumnDef>> {
    let mut columns = Vec::new();
    for entry in split_parenthesized(line.trim())? {
        let mut parts = entry.splitn(3, ", ");
        let (name, data_type, flags) = match (parts.next(), parts.next(), parts.next()) {
            (Some(n), Some(t), Some(f)) => (n, t, f),
            _ => return Err(corrupt("unreadable schema entry", &entry)),
        };
        let data_type = match data_type {
            "integer" => DataType::Integer,
            "string" => DataType::String,
            other => return Err(corrupt("unknown column type", other)),
        };
        let (primary_key, unique, nullable) = decode_flags(flags)?;
        columns.push(ColumnDef {
            name: name.to_string(),
            data_type,
            primary_key,
            unique,
            nullable,
        });
    }
    if columns.is_empty() {
        return Err(corrupt("empty schema line", line));
    }
    Ok(columns)
}

/// Encodes one record as its body line, tab indent included.
pub fn encode_record_line(pairs: &[(String, String)]) -> String {
    let entries: Vec<String> = pairs
        .iter()
        .map(|(name, literal)| format!("({name}, {literal})"))
        .collect();
    format!("\t({})", entries.join(", "))
}

/// Decodes a body line back into `(column, literal)` pairs.
pub fn decode_record_line(line: &str) -> DbResult<Vec<(String, String)>> {
    let trimmed = line.trim();
    let inner = trimmed
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| corrupt("unreadable record line", line))?;
    let mut pairs = Vec::new();
    for entry in split_parenthesized(inner)? {
        let (name, literal) = entry
            .split_once(", ")
            .ok_or_else(|| corrupt("unreadable record entry", &entry))?;
        pairs.push((name.to_string(), literal.to_string()));
    }
    if pairs.is_empty() {
        return Err(corrupt("empty record line", line));
    }
    Ok(pairs)
}

/// Renders a freshly created table: header, schema block, empty body block.
pub fn encode_table_block(name: &str, columns: &[ColumnDef]) -> String {
    format!(
        "{TABLE_HEADER}{name}\n{SCHEMA_MARKER}\n{BLOCK_OPEN}\n{}\n{BLOCK_CLOSE}\n{BODY_MARKER}\n{BLOCK_OPEN}\n{BLOCK_CLOSE}\n",
        encode_schema_line(columns)
    )
}

/// Decodes a stored literal to its semantic value: `null` becomes `Null`,
/// a quoted literal its unquoted text, anything else an integer.
pub fn decode_literal(literal: &str) -> DbResult<Value> {
    if literal == "null" {
        return Ok(Value::Null);
    }
    if let Some(inner) = quoted_inner(literal) {
        return Ok(Value::Text(inner.to_string()));
    }
    literal
        .parse::<i64>()
        .map(Value::Integer)
        .map_err(|_| corrupt("unreadable literal", literal))
}

/// The text between the bounding single quotes, if the literal has them.
pub fn quoted_inner(literal: &str) -> Option<&str> {
    if literal.len() >= 2 && literal.starts_with('\'') && literal.ends_with('\'') {
        Some(&literal[1..literal.len() - 1])
    } else {
        None
    }
}

/// Splits `(a), (b), ...` into its top-level parenthesized entries.
/// Quote-aware: parentheses and commas inside a string literal are payload.
fn split_parenthesized(input: &str) -> DbResult<Vec<String>> {
    let mut entries = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut in_quote = false;
    for ch in input.chars() {
        match ch {
            '\'' if depth > 0 => {
                in_quote = !in_quote;
                current.push(ch);
            }
            '(' if !in_quote => {
                depth += 1;
                if depth > 1 {
                    current.push(ch);
                }
            }
            ')' if !in_quote => {
                match depth {
                    0 => return Err(corrupt("unbalanced parentheses", input)),
                    1 => entries.push(std::mem::take(&mut current)),
                    _ => current.push(ch),
                }
                depth -= 1;
            }
            _ if depth > 0 => current.push(ch),
            ',' | ' ' | '\t' => {}
            _ => return Err(corrupt("stray character between entries", input)),
        }
    }
    if depth != 0 || in_quote {
        return Err(corrupt("unbalanced parentheses", input));
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn column(name: &str, data_type: DataType, pk: bool, unique: bool, nullable: bool) -> ColumnDef {
        ColumnDef {
            name: name.to_string(),
            data_type,
            primary_key: pk,
            unique,
            nullable,
        }
    }

    #[test]
    fn flags_round_trip() {
        let col = column("id", DataType::Integer, true, false, false);
        assert_eq!(encode_flags(&col), "pk:1;u:0;n:0");
        assert_eq!(decode_flags("pk:1;u:0;n:0").unwrap(), (true, false, false));
        assert_eq!(decode_flags("pk:0;u:1;n:0").unwrap(), (false, true, false));
    }

    #[test]
    fn flags_reject_garbage() {
        assert!(decode_flags("pk:2;u:0;n:0").is_err());
        assert!(decode_flags("pk:1;u:0").is_err());
        assert!(decode_flags("u:1;pk:0;n:0").is_err());
        assert!(decode_flags("pk:1;u:0;n:0;x:1").is_err());
    }

    #[test]
    fn schema_line_round_trip() {
        let columns = vec![
            column("id", DataType::Integer, true, false, false),
            column("name", DataType::String, false, false, true),
        ];
        let line = encode_schema_line(&columns);
        assert_eq!(
            line,
            "\t(id, integer, pk:1;u:0;n:0), (name, string, pk:0;u:0;n:1)"
        );
        assert_eq!(decode_schema_line(&line).unwrap(), columns);
    }

    #[test]
    fn record_line_round_trip() {
        let pairs = vec![
            ("id".to_string(), "1".to_string()),
            ("name".to_string(), "'Alice'".to_string()),
            ("note".to_string(), "null".to_string()),
        ];
        let line = encode_record_line(&pairs);
        assert_eq!(line, "\t((id, 1), (name, 'Alice'), (note, null))");
        assert_eq!(decode_record_line(&line).unwrap(), pairs);
    }

    #[test]
    fn record_line_survives_hostile_strings() {
        // Delimiters inside a string literal are payload, not structure.
        let pairs = vec![
            ("a".to_string(), "'x), (y'".to_string()),
            ("b".to_string(), "'a, b; c'".to_string()),
        ];
        let line = encode_record_line(&pairs);
        assert_eq!(decode_record_line(&line).unwrap(), pairs);
    }

    #[test]
    fn record_line_rejects_garbage() {
        assert!(decode_record_line("\tnot a record").is_err());
        assert!(decode_record_line("\t((a, 1), (b, 2)").is_err());
        assert!(decode_record_line("\t()").is_err());
    }

    #[test]
    fn table_block_shape() {
        let columns = vec![column("id", DataType::Integer, false, false, false)];
        let block = encode_table_block("t", &columns);
        let lines: Vec<&str> = block.lines().collect();
        assert_eq!(
            lines,
            vec![
                "TABLE_NAME = t",
                "#SCHEMA",
                "{",
                "\t(id, integer, pk:0;u:0;n:0)",
                "}",
                "#BODY",
                "{",
                "}",
            ]
        );
    }

    #[test]
    fn literal_decoding() {
        assert_eq!(decode_literal("null").unwrap(), Value::Null);
        assert_eq!(decode_literal("-42").unwrap(), Value::Integer(-42));
        assert_eq!(
            decode_literal("'hi there'").unwrap(),
            Value::Text("hi there".to_string())
        );
        // Empty string literal is two quotes, not nothing.
        assert_eq!(decode_literal("''").unwrap(), Value::Text(String::new()));
        assert!(decode_literal("'unclosed").is_err());
        assert!(decode_literal("abc").is_err());
    }

    fn identifier_strategy() -> impl Strategy<Value = String> {
        "[A-Za-z_][A-Za-z0-9_]{0,11}"
    }

    fn literal_strategy() -> impl Strategy<Value = String> {
        prop_oneof![
            any::<i64>().prop_map(|n| n.to_string()),
            "[^']{0,20}".prop_map(|s| format!("'{s}'")),
            Just("null".to_string()),
        ]
    }

    proptest! {
        #[test]
        fn any_record_round_trips(
            pairs in prop::collection::vec((identifier_strategy(), literal_strategy()), 1..6)
        ) {
            let line = encode_record_line(&pairs);
            prop_assert_eq!(decode_record_line(&line).unwrap(), pairs);
        }

        #[test]
        fn any_schema_round_trips(
            columns in prop::collection::vec(
                (identifier_strategy(), any::<bool>(), any::<(bool, bool, bool)>()),
                1..6,
            )
        ) {
            let columns: Vec<ColumnDef> = columns
                .into_iter()
                .map(|(name, is_int, (pk, unique, nullable))| ColumnDef {
                    name,
                    data_type: if is_int { DataType::Integer } else { DataType::String },
                    primary_key: pk,
                    unique,
                    nullable,
                })
                .collect();
            let line = encode_schema_line(&columns);
            prop_assert_eq!(decode_schema_line(&line).unwrap(), columns);
        }
    }
}
