//! Unicode-aware `LIKE`.
//!
//! SQLite's built-in `LIKE` only folds ASCII letters, so `'%đắc nhân tâm%'`
//! does not match `Đắc Nhân Tâm`. Registering an application-defined
//! `like()` replaces the operator for both `X LIKE Y` and
//! `X LIKE Y ESCAPE Z` on that connection.

use rusqlite::functions::{Context, FunctionFlags};
use rusqlite::types::ValueRef;
use rusqlite::Connection;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    /// `%`: any run of characters, including none.
    Any,
    /// `_`: exactly one character.
    One,
    Literal(char),
}

fn tokenize(pattern: &str, escape: Option<char>) -> Vec<Token> {
    let mut tokens = Vec::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        if Some(c) == escape {
            // A trailing escape stands for itself.
            let literal = chars.next().unwrap_or(c);
            tokens.extend(literal.to_lowercase().map(Token::Literal));
            continue;
        }
        match c {
            '%' => tokens.push(Token::Any),
            '_' => tokens.push(Token::One),
            c => tokens.extend(c.to_lowercase().map(Token::Literal)),
        }
    }
    tokens
}

/// Case-insensitive SQL `LIKE` over full Unicode lowercase mapping.
pub fn like_matches(pattern: &str, text: &str, escape: Option<char>) -> bool {
    let tokens = tokenize(pattern, escape);
    let text: Vec<char> = text.to_lowercase().chars().collect();

    let (mut t, mut s) = (0, 0);
    // Last `%` seen and the text position it is currently expanded to.
    let mut backtrack: Option<(usize, usize)> = None;

    while s < text.len() {
        match tokens.get(t) {
            Some(Token::Any) => {
                backtrack = Some((t, s));
                t += 1;
            }
            Some(Token::One) => {
                t += 1;
                s += 1;
            }
            Some(Token::Literal(c)) if *c == text[s] => {
                t += 1;
                s += 1;
            }
            _ => match backtrack {
                Some((star, pos)) => {
                    t = star + 1;
                    s = pos + 1;
                    backtrack = Some((star, pos + 1));
                }
                None => return false,
            },
        }
    }

    tokens[t..].iter().all(|tok| *tok == Token::Any)
}

/// SQL text value of an argument, with SQLite's usual coercions.
fn text_arg(ctx: &Context<'_>, idx: usize) -> Option<String> {
    match ctx.get_raw(idx) {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Some(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

/// `like(pattern, text [, escape])`, the function form of `text LIKE pattern`.
fn like_function(ctx: &Context<'_>) -> rusqlite::Result<Option<bool>> {
    let escape = if ctx.len() == 3 {
        let Some(escape) = text_arg(ctx, 2) else {
            return Ok(None);
        };
        let mut chars = escape.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Some(c),
            _ => {
                return Err(rusqlite::Error::UserFunctionError(
                    "ESCAPE expression must be a single character".into(),
                ))
            }
        }
    } else {
        None
    };

    match (text_arg(ctx, 0), text_arg(ctx, 1)) {
        (Some(pattern), Some(text)) => Ok(Some(like_matches(&pattern, &text, escape))),
        _ => Ok(None),
    }
}

/// Replace `LIKE` on a connection with the Unicode-aware version.
pub fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    let flags = FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC;
    conn.create_scalar_function("like", 2, flags, like_function)?;
    conn.create_scalar_function("like", 3, flags, like_function)
}
