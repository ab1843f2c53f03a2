use crate::error::{DbError, DbResult};

/// Tokens of the SQL dialect. Keywords are case-insensitive; identifiers
/// and string literals keep their case.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Create,
    Drop,
    Database,
    Table,
    Insert,
    Into,
    Values,
    Delete,
    From,
    Where,
    Update,
    Set,
    Select,
    Inner,
    Join,
    On,
    Null,
    NotNull,
    PrimaryKey,
    Unique,
    IntegerType,
    StringType,

    /// Plain `name` or qualified `table.column`.
    Identifier(String),
    Number(i64),
    /// The text between the quotes, quotes stripped.
    StringLiteral(String),

    LParen,
    RParen,
    Comma,

    Eq,
    Ne,
    MulAssign,
    AddAssign,
    SubAssign,
    DivAssign,

    Eof,
}

pub fn tokenize(input: &str) -> DbResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&ch) = chars.peek() {
        match ch {
            ' ' | '\t' | '\n' | '\r' => {
                chars.next();
            }
            '(' => {
                tokens.push(Token::LParen);
                chars.next();
            }
            ')' => {
                tokens.push(Token::RParen);
                chars.next();
            }
            ',' => {
                tokens.push(Token::Comma);
                chars.next();
            }
            '=' => {
                tokens.push(Token::Eq);
                chars.next();
            }
            '<' => {
                chars.next();
                if chars.peek() == Some(&'>') {
                    tokens.push(Token::Ne);
                    chars.next();
                } else {
                    return Err(unexpected('<'));
                }
            }
            '*' => {
                chars.next();
                expect_assign(&mut chars, '*')?;
                tokens.push(Token::MulAssign);
            }
            '+' => {
                chars.next();
                expect_assign(&mut chars, '+')?;
                tokens.push(Token::AddAssign);
            }
            '/' => {
                chars.next();
                expect_assign(&mut chars, '/')?;
                tokens.push(Token::DivAssign);
            }
            '-' => {
                chars.next();
                match chars.peek() {
                    Some(&'=') => {
                        chars.next();
                        tokens.push(Token::SubAssign);
                    }
                    Some(c) if c.is_ascii_digit() => {
                        let number = read_number(&mut chars)?;
                        tokens.push(Token::Number(-number));
                    }
                    _ => return Err(unexpected('-')),
                }
            }
            '\'' => {
                chars.next();
                tokens.push(Token::StringLiteral(read_string(&mut chars)?));
            }
            _ if ch.is_ascii_digit() => {
                tokens.push(Token::Number(read_number(&mut chars)?));
            }
            _ if ch.is_ascii_alphabetic() || ch == '_' => {
                tokens.push(read_word(&mut chars)?);
            }
            _ => return Err(unexpected(ch)),
        }
    }

    tokens.push(Token::Eof);
    Ok(tokens)
}

fn unexpected(ch: char) -> DbError {
    DbError::MalformedStatement(format!("unexpected character '{ch}'"))
}

fn expect_assign(chars: &mut std::iter::Peekable<std::str::Chars>, op: char) -> DbResult<()> {
    if chars.peek() == Some(&'=') {
        chars.next();
        Ok(())
    } else {
        Err(unexpected(op))
    }
}

fn read_identifier(chars: &mut std::iter::Peekable<std::str::Chars>) -> String {
    let mut ident = String::new();
    while let Some(&ch) = chars.peek() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            ident.push(ch);
            chars.next();
        } else {
            break;
        }
    }
    ident
}

/// Reads a keyword, a plain identifier, or a qualified `table.column` name.
fn read_word(chars: &mut std::iter::Peekable<std::str::Chars>) -> DbResult<Token> {
    let ident = read_identifier(chars);
    if chars.peek() == Some(&'.') {
        chars.next();
        match chars.peek() {
            Some(&c) if c.is_ascii_alphabetic() || c == '_' => {
                let rest = read_identifier(chars);
                Ok(Token::Identifier(format!("{ident}.{rest}")))
            }
            _ => Err(unexpected('.')),
        }
    } else {
        Ok(match_keyword(&ident))
    }
}

fn read_number(chars: &mut std::iter::Peekable<std::str::Chars>) -> DbResult<i64> {
    let mut digits = String::new();
    while let Some(&ch) = chars.peek() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            chars.next();
        } else {
            break;
        }
    }
    digits
        .parse::<i64>()
        .map_err(|_| DbError::MalformedStatement(format!("integer literal '{digits}' out of range")))
}

/// Reads up to the closing quote. The dialect has no escape sequences, so a
/// string literal is simply everything between two single quotes.
fn read_string(chars: &mut std::iter::Peekable<std::str::Chars>) -> DbResult<String> {
    let mut value = String::new();
    for ch in chars {
        if ch == '\'' {
            return Ok(value);
        }
        value.push(ch);
    }
    Err(DbError::UnterminatedQuotedLiteral)
}

fn match_keyword(ident: &str) -> Token {
    match ident.to_uppercase().as_str() {
        "CREATE" => Token::Create,
        "DROP" => Token::Drop,
        "DATABASE" => Token::Database,
        "TABLE" => Token::Table,
        "INSERT" => Token::Insert,
        "INTO" => Token::Into,
        "VALUES" => Token::Values,
        "DELETE" => Token::Delete,
        "FROM" => Token::From,
        "WHERE" => Token::Where,
        "UPDATE" => Token::Update,
        "SET" => Token::Set,
        "SELECT" => Token::Select,
        "INNER" => Token::Inner,
        "JOIN" => Token::Join,
        "ON" => Token::On,
        "NULL" => Token::Null,
        "NOT_NULL" => Token::NotNull,
        "PRIMARY_KEY" => Token::PrimaryKey,
        "UNIQUE" => Token::Unique,
        "INTEGER" => Token::IntegerType,
        "STRING" => Token::StringType,
        _ => Token::Identifier(ident.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_are_case_insensitive() {
        let tokens = tokenize("select FROM Where").unwrap();
        assert_eq!(
            tokens,
            vec![Token::Select, Token::From, Token::Where, Token::Eof]
        );
    }

    #[test]
    fn qualified_names_lex_as_one_identifier() {
        let tokens = tokenize("people.name").unwrap();
        assert_eq!(
            tokens,
            vec![Token::Identifier("people.name".to_string()), Token::Eof]
        );
    }

    #[test]
    fn operators() {
        let tokens = tokenize("= <> *= += -= /=").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Eq,
                Token::Ne,
                Token::MulAssign,
                Token::AddAssign,
                Token::SubAssign,
                Token::DivAssign,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn negative_numbers_and_strings() {
        let tokens = tokenize("(-5, 'it''s two literals')").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::LParen,
                Token::Number(-5),
                Token::Comma,
                Token::StringLiteral("it".to_string()),
                Token::StringLiteral("s two literals".to_string()),
                Token::RParen,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn unterminated_string_is_reported() {
        assert!(matches!(
            tokenize("'oops"),
            Err(DbError::UnterminatedQuotedLiteral)
        ));
    }

    #[test]
    fn stray_characters_are_rejected() {
        assert!(tokenize("a % b").is_err());
        assert!(tokenize("a < b").is_err());
        assert!(tokenize("a.").is_err());
    }
}
