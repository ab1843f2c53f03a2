use crate::ast::*;
use crate::error::{DbError, DbResult};
use crate::lexer::{self, Token};

/// Splits a batch into individual statements on top-level `;`. A `;` inside
/// a single-quoted string literal is payload, not a separator. A single
/// trailing `;` is allowed; empty statements anywhere else are errors.
pub fn split_statements(batch: &str) -> DbResult<Vec<&str>> {
    let batch = batch.trim();
    if batch.is_empty() {
        return Err(DbError::MalformedStatement(
            "expected at least one SQL statement".to_string(),
        ));
    }

    let mut statements = Vec::new();
    let mut in_quote = false;
    let mut start = 0;
    for (i, ch) in batch.char_indices() {
        match ch {
            '\'' => in_quote = !in_quote,
            ';' if !in_quote => {
                statements.push(batch[start..i].trim());
                start = i + ch.len_utf8();
            }
            _ => {}
        }
    }
    if in_quote {
        return Err(DbError::UnterminatedQuotedLiteral);
    }
    let tail = batch[start..].trim();
    if !tail.is_empty() {
        statements.push(tail);
    }

    if statements.is_empty() {
        return Err(DbError::MalformedStatement(
            "expected at least one SQL statement".to_string(),
        ));
    }
    if let Some(empty) = statements.iter().position(|s| s.is_empty()) {
        return Err(DbError::MalformedStatement(format!(
            "statement {} of the batch is empty (stray ';')",
            empty + 1
        )));
    }
    Ok(statements)
}

/// Parses one statement's text into its structured form.
pub fn parse(statement: &str) -> DbResult<Statement> {
    let tokens = lexer::tokenize(statement)?;
    Parser::new(tokens, statement).parse_statement()
}

struct Parser<'a> {
    tokens: Vec<Token>,
    current: usize,
    text: &'a str,
}

impl<'a> Parser<'a> {
    fn new(tokens: Vec<Token>, text: &'a str) -> Self {
        Parser {
            tokens,
            current: 0,
            text,
        }
    }

    fn current_token(&self) -> &Token {
        self.tokens.get(self.current).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.current_token().clone();
        self.current += 1;
        token
    }

    fn consume(&mut self, expected: Token) -> DbResult<()> {
        if *self.current_token() == expected {
            self.current += 1;
            Ok(())
        } else {
            Err(self.fail(&format!(
                "expected {:?}, found {:?}",
                expected,
                self.current_token()
            )))
        }
    }

    fn fail(&self, message: &str) -> DbError {
        DbError::MalformedStatement(format!("{message} in '{}'", self.text))
    }

    /// A plain (unqualified) identifier.
    fn expect_name(&mut self, what: &str) -> DbResult<String> {
        match self.advance() {
            Token::Identifier(name) if !name.contains('.') => Ok(name),
            Token::Identifier(name) => Err(DbError::InvalidIdentifier(name)),
            other => Err(self.fail(&format!("expected {what}, found {other:?}"))),
        }
    }

    /// A qualified `table.column` identifier, returned whole.
    fn expect_qualified(&mut self, what: &str) -> DbResult<String> {
        match self.advance() {
            Token::Identifier(name) if name.contains('.') => Ok(name),
            Token::Identifier(name) => Err(self.fail(&format!(
                "expected {what} as a qualified table.column name, found '{name}'"
            ))),
            other => Err(self.fail(&format!("expected {what}, found {other:?}"))),
        }
    }

    fn expect_eof(&mut self) -> DbResult<()> {
        match self.current_token() {
            Token::Eof => Ok(()),
            other => Err(self.fail(&format!("unexpected trailing {other:?}"))),
        }
    }

    /// A value literal, kept in its stored form: bare integer, quoted
    /// string, or `null`.
    fn expect_literal(&mut self) -> DbResult<String> {
        match self.advance() {
            Token::Number(n) => Ok(n.to_string()),
            Token::StringLiteral(s) => Ok(format!("'{s}'")),
            Token::Null => Ok("null".to_string()),
            other => Err(self.fail(&format!("expected a value literal, found {other:?}"))),
        }
    }

    fn parse_statement(&mut self) -> DbResult<Statement> {
        let statement = match self.current_token() {
            Token::Create => self.parse_create()?,
            Token::Drop => self.parse_drop()?,
            Token::Insert => self.parse_insert()?,
            Token::Delete => self.parse_delete()?,
            Token::Update => self.parse_update()?,
            Token::Select => self.parse_select()?,
            other => return Err(self.fail(&format!("unrecognized statement keyword {other:?}"))),
        };
        self.expect_eof()?;
        Ok(statement)
    }

    fn parse_create(&mut self) -> DbResult<Statement> {
        self.consume(Token::Create)?;
        match self.current_token() {
            Token::Database => {
                self.advance();
                Ok(Statement::CreateDatabase(self.expect_name("database name")?))
            }
            Token::Table => {
                self.advance();
                self.parse_create_table()
            }
            other => Err(self.fail(&format!("expected DATABASE or TABLE, found {other:?}"))),
        }
    }

    fn parse_drop(&mut self) -> DbResult<Statement> {
        self.consume(Token::Drop)?;
        match self.current_token() {
            Token::Database => {
                self.advance();
                Ok(Statement::DropDatabase(self.expect_name("database name")?))
            }
            Token::Table => {
                self.advance();
                Ok(Statement::DropTable(self.expect_name("table name")?))
            }
            other => Err(self.fail(&format!("expected DATABASE or TABLE, found {other:?}"))),
        }
    }

    fn parse_create_table(&mut self) -> DbResult<Statement> {
        let name = self.expect_name("table name")?;
        self.consume(Token::LParen)?;
        let mut columns: Vec<ColumnDef> = Vec::new();
        loop {
            let column = self.parse_column_def()?;
            if columns.iter().any(|c| c.name == column.name) {
                return Err(self.fail(&format!("duplicate column name '{}'", column.name)));
            }
            columns.push(column);
            if *self.current_token() == Token::Comma {
                self.advance();
            } else {
                break;
            }
        }
        self.consume(Token::RParen)?;
        Ok(Statement::CreateTable(CreateTableStatement {
            name,
            columns,
        }))
    }

    fn parse_column_def(&mut self) -> DbResult<ColumnDef> {
        let name = self.expect_name("column name")?;
        let data_type = match self.advance() {
            Token::IntegerType => DataType::Integer,
            Token::StringType => DataType::String,
            other => return Err(self.fail(&format!("expected a column type, found {other:?}"))),
        };

        // Columns default to not_null; the flags may come in any order.
        let mut nullable = false;
        let mut primary_key = false;
        let mut unique = false;
        loop {
            match self.current_token() {
                Token::Null => nullable = true,
                Token::NotNull => nullable = false,
                Token::PrimaryKey => primary_key = true,
                Token::Unique => unique = true,
                _ => break,
            }
            self.advance();
        }
        if nullable && (primary_key || unique) {
            return Err(self.fail(&format!("key column '{name}' cannot be null")));
        }

        Ok(ColumnDef {
            name,
            data_type,
            primary_key,
            unique,
            nullable,
        })
    }

    fn parse_insert(&mut self) -> DbResult<Statement> {
        self.consume(Token::Insert)?;
        self.consume(Token::Into)?;
        let table = self.expect_name("table name")?;

        self.consume(Token::LParen)?;
        let mut columns = Vec::new();
        loop {
            let column = self.expect_name("column name")?;
            if columns.contains(&column) {
                return Err(self.fail(&format!("duplicate column name '{column}'")));
            }
            columns.push(column);
            if *self.current_token() == Token::Comma {
                self.advance();
            } else {
                break;
            }
        }
        self.consume(Token::RParen)?;

        self.consume(Token::Values)?;
        self.consume(Token::LParen)?;
        let mut literals = Vec::new();
        loop {
            literals.push(self.expect_literal()?);
            if *self.current_token() == Token::Comma {
                self.advance();
            } else {
                break;
            }
        }
        self.consume(Token::RParen)?;

        if columns.len() != literals.len() {
            return Err(self.fail(&format!(
                "{} columns but {} values",
                columns.len(),
                literals.len()
            )));
        }
        Ok(Statement::Insert(InsertStatement {
            table,
            values: columns.into_iter().zip(literals).collect(),
        }))
    }

    fn parse_delete(&mut self) -> DbResult<Statement> {
        self.consume(Token::Delete)?;
        self.consume(Token::From)?;
        let table = self.expect_name("table name")?;
        let filter = self.parse_optional_filter()?;
        Ok(Statement::Delete(DeleteStatement { table, filter }))
    }

    fn parse_update(&mut self) -> DbResult<Statement> {
        self.consume(Token::Update)?;
        let table = self.expect_name("table name")?;
        self.consume(Token::Set)?;
        let column = self.expect_name("column name")?;
        let op = match self.advance() {
            Token::Eq => SetOp::Assign,
            Token::MulAssign => SetOp::MulAssign,
            Token::AddAssign => SetOp::AddAssign,
            Token::SubAssign => SetOp::SubAssign,
            Token::DivAssign => SetOp::DivAssign,
            other => return Err(self.fail(&format!("expected a SET operator, found {other:?}"))),
        };
        let value = self.expect_literal()?;
        let filter = self.parse_optional_filter()?;
        Ok(Statement::Update(UpdateStatement {
            table,
            set: SetClause { column, op, value },
            filter,
        }))
    }

    fn parse_optional_filter(&mut self) -> DbResult<Option<Filter>> {
        if *self.current_token() != Token::Where {
            return Ok(None);
        }
        self.advance();
        let column = self.expect_name("column name")?;
        let op = match self.advance() {
            Token::Eq => FilterOp::Eq,
            Token::Ne => FilterOp::Ne,
            other => return Err(self.fail(&format!("expected = or <>, found {other:?}"))),
        };
        let value = self.expect_literal()?;
        Ok(Some(Filter { column, op, value }))
    }

    fn parse_select(&mut self) -> DbResult<Statement> {
        self.consume(Token::Select)?;

        // Projections, grouped by table in first-appearance order.
        let mut tables: Vec<TableProjection> = Vec::new();
        loop {
            let column = self.expect_qualified("a projected column")?;
            let (table, _) = split_qualified(&column)?;
            match tables.iter_mut().find(|p| p.table == table) {
                Some(projection) => projection.columns.push(column),
                None => tables.push(TableProjection {
                    table: table.to_string(),
                    columns: vec![column],
                }),
            }
            if *self.current_token() == Token::Comma {
                self.advance();
            } else {
                break;
            }
        }

        self.consume(Token::From)?;
        let from_table = self.expect_name("table name")?;

        let mut joins = Vec::new();
        let mut named_tables = vec![from_table];
        while *self.current_token() == Token::Inner {
            self.advance();
            self.consume(Token::Join)?;
            named_tables.push(self.expect_name("table name")?);
            self.consume(Token::On)?;
            let left = self.expect_qualified("a join column")?;
            self.consume(Token::Eq)?;
            let right = self.expect_qualified("a join column")?;
            joins.push(JoinCondition { left, right });
        }

        for projection in &tables {
            if !named_tables.contains(&projection.table) {
                return Err(self.fail(&format!(
                    "table '{}' does not appear in FROM or any JOIN",
                    projection.table
                )));
            }
        }

        Ok(Statement::Select(SelectStatement { tables, joins }))
    }
}

/// Splits a `table.column` reference into its two parts.
pub fn split_qualified(name: &str) -> DbResult<(&str, &str)> {
    match name.split_once('.') {
        Some((table, column)) if !table.is_empty() && !column.is_empty() => Ok((table, column)),
        _ => Err(DbError::MalformedStatement(format!(
            "expected a qualified table.column name, got '{name}'"
        ))),
    }
}
