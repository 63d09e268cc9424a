//! Query gate for model-generated SQL.
//!
//! A generated statement runs only if it is a single read statement
//! (`SELECT` or `WITH`) and mentions neither `DROP` nor `DELETE` anywhere,
//! in any case. The keyword check is a plain substring test, so a book
//! title containing "delete" is refused as well. SQL comments are refused
//! outright, since quote tracking inside them is ambiguous.

/// Keywords refused anywhere in the statement.
const DENIED_KEYWORDS: &[&str] = &["DROP", "DELETE"];

/// Leading keywords of an acceptable statement.
const ALLOWED_LEADING: &[&str] = &["SELECT", "WITH"];

/// Why a generated statement was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateRejection {
    #[error("query is empty")]
    Empty,
    #[error("query contains denied keyword {0}")]
    DeniedKeyword(&'static str),
    #[error("query must start with SELECT or WITH, found {0:?}")]
    NotReadStatement(String),
    #[error("query contains more than one statement")]
    MultipleStatements,
    #[error("query contains a comment")]
    Comment,
}

/// Remove Markdown code-fence markup and surrounding whitespace.
pub fn strip_code_fences(raw: &str) -> String {
    raw.replace("```sql", "").replace("```", "").trim().to_string()
}

/// Decide whether `sql` may be executed.
pub fn check_query(sql: &str) -> Result<(), GateRejection> {
    let sql = sql.trim();
    if sql.is_empty() {
        return Err(GateRejection::Empty);
    }

    let upper = sql.to_uppercase();
    if let Some(keyword) = DENIED_KEYWORDS.iter().find(|k| upper.contains(*k)) {
        return Err(GateRejection::DeniedKeyword(keyword));
    }

    let leading: String = upper
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    if !ALLOWED_LEADING.contains(&leading.as_str()) {
        return Err(GateRejection::NotReadStatement(leading));
    }

    if let Some(end) = first_terminator(sql)? {
        if !sql[end + 1..].trim().is_empty() {
            return Err(GateRejection::MultipleStatements);
        }
    }

    Ok(())
}

/// Byte offset of the first `;` outside quoted text. Fails on a `--` or
/// `/*` comment anywhere outside quoted text.
fn first_terminator(sql: &str) -> Result<Option<usize>, GateRejection> {
    let mut quote: Option<char> = None;
    let mut terminator = None;
    let mut chars = sql.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        let next = chars.peek().map(|&(_, n)| n);
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"' | '`') => quote = Some(c),
            (None, '-') if next == Some('-') => return Err(GateRejection::Comment),
            (None, '/') if next == Some('*') => return Err(GateRejection::Comment),
            (None, ';') => {
                terminator.get_or_insert(i);
            }
            (None, _) => {}
        }
    }
    Ok(terminator)
}
