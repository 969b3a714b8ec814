//! Typed row filters
//!
//! A [`RowFilter`] is a boolean expression tree evaluated against every row
//! of an [`ArchetypeTable`]. Filters can be built in code or parsed from the
//! query strings used in fitting configurations:
//!
//! ```
//! use archifer_core::filter::RowFilter;
//!
//! let parsed: RowFilter = "Nutzung == 'Wohnen' and NGF >= 100".parse().unwrap();
//! let built = RowFilter::eq("Nutzung", "Wohnen").and(RowFilter::ge("NGF", 100.0));
//! assert_eq!(parsed, built);
//! ```
//!
//! Grammar (lowest precedence first):
//!
//! ```text
//! or      := and (("or" | "|") and)*
//! and     := unary (("and" | "&") unary)*
//! unary   := ("not" | "~" | "!") unary | primary
//! primary := "(" or ")" | column cmp literal | column ["not"] "in" list
//! list    := "[" literal ("," literal)* "]"   (parentheses also accepted)
//! column  := identifier | `back-ticked name`
//! literal := number | 'text' | "text" | true | false
//! ```
//!
//! Missing cells never match a comparison, except `!=` and `not in`.

use std::cmp::Ordering;
use std::fmt;
use std::iter::Peekable;
use std::str::{CharIndices, FromStr};

use crate::error::{ArchiferError, ArchiferResult};
use crate::table::{ArchetypeTable, ColumnValues};

/// Literal operand of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    Text(String),
    Bool(bool),
}

impl From<f64> for Literal {
    fn from(v: f64) -> Self {
        Literal::Number(v)
    }
}

impl From<&str> for Literal {
    fn from(v: &str) -> Self {
        Literal::Text(v.to_string())
    }
}

impl From<String> for Literal {
    fn from(v: String) -> Self {
        Literal::Text(v)
    }
}

impl From<bool> for Literal {
    fn from(v: bool) -> Self {
        Literal::Bool(v)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Number(v) => write!(f, "{v}"),
            Literal::Text(s) => write!(f, "'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
            Literal::Bool(b) => write!(f, "{b}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn holds(self, ordering: Option<Ordering>) -> bool {
        match ordering {
            None => self == CompareOp::Ne,
            Some(o) => match self {
                CompareOp::Eq => o == Ordering::Equal,
                CompareOp::Ne => o != Ordering::Equal,
                CompareOp::Lt => o == Ordering::Less,
                CompareOp::Le => o != Ordering::Greater,
                CompareOp::Gt => o == Ordering::Greater,
                CompareOp::Ge => o != Ordering::Less,
            },
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

/// Boolean row filter.
#[derive(Debug, Clone, PartialEq)]
pub enum RowFilter {
    Compare {
        column: String,
        op: CompareOp,
        value: Literal,
    },
    In {
        column: String,
        values: Vec<Literal>,
        negated: bool,
    },
    Not(Box<RowFilter>),
    And(Box<RowFilter>, Box<RowFilter>),
    Or(Box<RowFilter>, Box<RowFilter>),
}

impl RowFilter {
    pub fn compare(column: &str, op: CompareOp, value: impl Into<Literal>) -> Self {
        RowFilter::Compare {
            column: column.to_string(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(column: &str, value: impl Into<Literal>) -> Self {
        Self::compare(column, CompareOp::Eq, value)
    }

    pub fn ne(column: &str, value: impl Into<Literal>) -> Self {
        Self::compare(column, CompareOp::Ne, value)
    }

    pub fn lt(column: &str, value: impl Into<Literal>) -> Self {
        Self::compare(column, CompareOp::Lt, value)
    }

    pub fn le(column: &str, value: impl Into<Literal>) -> Self {
        Self::compare(column, CompareOp::Le, value)
    }

    pub fn gt(column: &str, value: impl Into<Literal>) -> Self {
        Self::compare(column, CompareOp::Gt, value)
    }

    pub fn ge(column: &str, value: impl Into<Literal>) -> Self {
        Self::compare(column, CompareOp::Ge, value)
    }

    pub fn is_in<L: Into<Literal>>(column: &str, values: impl IntoIterator<Item = L>) -> Self {
        RowFilter::In {
            column: column.to_string(),
            values: values.into_iter().map(Into::into).collect(),
            negated: false,
        }
    }

    pub fn and(self, other: RowFilter) -> Self {
        RowFilter::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: RowFilter) -> Self {
        RowFilter::Or(Box::new(self), Box::new(other))
    }

    /// Parse a query string such as `Nutzung in ['Wohnen', 'Buero'] & NGF > 50`.
    pub fn parse(input: &str) -> ArchiferResult<Self> {
        let tokens = tokenize(input)?;
        if tokens.is_empty() {
            return Err(ArchiferError::Predicate("empty predicate".to_string()));
        }
        let mut parser = Parser {
            input,
            tokens,
            pos: 0,
        };
        let filter = parser.parse_or()?;
        if let Some(tok) = parser.tokens.get(parser.pos) {
            return Err(parser.error(&format!("unexpected trailing {tok}")));
        }
        Ok(filter)
    }

    /// Evaluate the filter on every row, returning one flag per row.
    pub fn evaluate(&self, table: &ArchetypeTable) -> ArchiferResult<Vec<bool>> {
        match self {
            RowFilter::Compare { column, op, value } => {
                let values = predicate_column(table, column)?;
                compare_column(&values, *op, value, column)
            }
            RowFilter::In {
                column,
                values,
                negated,
            } => {
                let cells = predicate_column(table, column)?;
                let mut mask = vec![false; cells.len()];
                for literal in values {
                    let hits = compare_column(&cells, CompareOp::Eq, literal, column)?;
                    for (acc, hit) in mask.iter_mut().zip(hits) {
                        *acc |= hit;
                    }
                }
                if *negated {
                    mask.iter_mut().for_each(|m| *m = !*m);
                }
                Ok(mask)
            }
            RowFilter::Not(inner) => Ok(inner.evaluate(table)?.into_iter().map(|b| !b).collect()),
            RowFilter::And(a, b) => {
                let lhs = a.evaluate(table)?;
                let rhs = b.evaluate(table)?;
                Ok(lhs.into_iter().zip(rhs).map(|(x, y)| x && y).collect())
            }
            RowFilter::Or(a, b) => {
                let lhs = a.evaluate(table)?;
                let rhs = b.evaluate(table)?;
                Ok(lhs.into_iter().zip(rhs).map(|(x, y)| x || y).collect())
            }
        }
    }

    /// Columns referenced anywhere in the tree.
    pub fn columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            RowFilter::Compare { column, .. } | RowFilter::In { column, .. } => {
                if !out.contains(&column.as_str()) {
                    out.push(column);
                }
            }
            RowFilter::Not(inner) => inner.collect_columns(out),
            RowFilter::And(a, b) | RowFilter::Or(a, b) => {
                a.collect_columns(out);
                b.collect_columns(out);
            }
        }
    }
}

impl std::ops::Not for RowFilter {
    type Output = RowFilter;

    fn not(self) -> RowFilter {
        RowFilter::Not(Box::new(self))
    }
}

impl FromStr for RowFilter {
    type Err = ArchiferError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RowFilter::parse(s)
    }
}

impl fmt::Display for RowFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowFilter::Compare { column, op, value } => {
                write!(f, "{} {} {}", ColumnName(column), op.symbol(), value)
            }
            RowFilter::In {
                column,
                values,
                negated,
            } => {
                let items: Vec<String> = values.iter().map(ToString::to_string).collect();
                let keyword = if *negated { "not in" } else { "in" };
                write!(f, "{} {keyword} [{}]", ColumnName(column), items.join(", "))
            }
            RowFilter::Not(inner) => write!(f, "not ({inner})"),
            RowFilter::And(a, b) => write!(f, "({a} and {b})"),
            RowFilter::Or(a, b) => write!(f, "({a} or {b})"),
        }
    }
}

struct ColumnName<'a>(&'a str);

impl fmt::Display for ColumnName<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let plain = self.0.chars().next().is_some_and(|c| c.is_alphabetic() || c == '_')
            && self.0.chars().all(|c| c.is_alphanumeric() || c == '_')
            && keyword(self.0).is_none();
        if plain {
            f.write_str(self.0)
        } else {
            write!(f, "`{}`", self.0)
        }
    }
}

fn predicate_column(table: &ArchetypeTable, column: &str) -> ArchiferResult<ColumnValues> {
    table.column_values(column).map_err(|err| match err {
        ArchiferError::MissingKey { .. } => {
            ArchiferError::Predicate(format!("unknown column '{column}'"))
        }
        other => other,
    })
}

fn compare_column(
    values: &ColumnValues,
    op: CompareOp,
    literal: &Literal,
    column: &str,
) -> ArchiferResult<Vec<bool>> {
    match (values, literal) {
        (ColumnValues::Number(cells), Literal::Number(x)) => Ok(cells
            .iter()
            .map(|cell| op.holds(cell.and_then(|c| c.partial_cmp(x))))
            .collect()),
        (ColumnValues::Text(cells), Literal::Text(x)) => Ok(cells
            .iter()
            .map(|cell| op.holds(cell.as_deref().map(|c| c.cmp(x.as_str()))))
            .collect()),
        (ColumnValues::Bool(cells), Literal::Bool(x)) => match op {
            CompareOp::Eq | CompareOp::Ne => Ok(cells
                .iter()
                .map(|cell| op.holds(cell.map(|c| c.cmp(x))))
                .collect()),
            _ => Err(ArchiferError::Predicate(format!(
                "operator '{}' is not supported on boolean column '{column}'",
                op.symbol()
            ))),
        },
        _ => Err(ArchiferError::Predicate(format!(
            "cannot compare {} column '{column}' with {literal}",
            values.kind()
        ))),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Num(f64),
    Cmp(CompareOp),
    And,
    Or,
    Not,
    In,
    Bool(bool),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(s) => write!(f, "identifier '{s}'"),
            Token::Str(s) => write!(f, "string '{s}'"),
            Token::Num(v) => write!(f, "number {v}"),
            Token::Cmp(op) => write!(f, "'{}'", op.symbol()),
            Token::And => f.write_str("'and'"),
            Token::Or => f.write_str("'or'"),
            Token::Not => f.write_str("'not'"),
            Token::In => f.write_str("'in'"),
            Token::Bool(b) => write!(f, "'{b}'"),
            Token::LParen => f.write_str("'('"),
            Token::RParen => f.write_str("')'"),
            Token::LBracket => f.write_str("'['"),
            Token::RBracket => f.write_str("']'"),
            Token::Comma => f.write_str("','"),
        }
    }
}

fn keyword(word: &str) -> Option<Token> {
    match word {
        "and" => Some(Token::And),
        "or" => Some(Token::Or),
        "not" => Some(Token::Not),
        "in" => Some(Token::In),
        "true" | "True" => Some(Token::Bool(true)),
        "false" | "False" => Some(Token::Bool(false)),
        _ => None,
    }
}

fn tokenize(input: &str) -> ArchiferResult<Vec<Token>> {
    let err = |msg: String| ArchiferError::Predicate(format!("{msg} in '{input}'"));
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(pos, ch)) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' | ')' | '[' | ']' | ',' | '~' => {
                chars.next();
                tokens.push(match ch {
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    '[' => Token::LBracket,
                    ']' => Token::RBracket,
                    ',' => Token::Comma,
                    _ => Token::Not,
                });
            }
            '&' | '|' => {
                chars.next();
                // `&&` / `||` read the same as `&` / `|`
                if chars.peek().map(|&(_, c)| c) == Some(ch) {
                    chars.next();
                }
                tokens.push(if ch == '&' { Token::And } else { Token::Or });
            }
            '!' => {
                chars.next();
                if next_is(&mut chars, '=') {
                    tokens.push(Token::Cmp(CompareOp::Ne));
                } else {
                    tokens.push(Token::Not);
                }
            }
            '=' => {
                chars.next();
                if !next_is(&mut chars, '=') {
                    return Err(err(format!("single '=' at offset {pos}; use '=='")));
                }
                tokens.push(Token::Cmp(CompareOp::Eq));
            }
            '<' | '>' => {
                chars.next();
                let inclusive = next_is(&mut chars, '=');
                tokens.push(Token::Cmp(match (ch, inclusive) {
                    ('<', true) => CompareOp::Le,
                    ('<', false) => CompareOp::Lt,
                    (_, true) => CompareOp::Ge,
                    (_, false) => CompareOp::Gt,
                }));
            }
            '\'' | '"' => {
                chars.next();
                let text = read_quoted(&mut chars, ch)
                    .ok_or_else(|| err(format!("unterminated string starting at offset {pos}")))?;
                tokens.push(Token::Str(text));
            }
            '`' => {
                chars.next();
                let name = read_quoted(&mut chars, '`')
                    .ok_or_else(|| err(format!("unterminated column name at offset {pos}")))?;
                tokens.push(Token::Ident(name));
            }
            c if c.is_ascii_digit() || c == '.' || (c == '-' && starts_number(&chars)) => {
                let mut text = String::new();
                if c == '-' {
                    text.push('-');
                    chars.next();
                }
                while let Some(&(_, d)) = chars.peek() {
                    let exponent_sign =
                        (d == '+' || d == '-') && text.ends_with(|e: char| e == 'e' || e == 'E');
                    if d.is_ascii_digit() || matches!(d, '.' | 'e' | 'E') || exponent_sign {
                        text.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value = text
                    .parse::<f64>()
                    .map_err(|_| err(format!("invalid number '{text}' at offset {pos}")))?;
                tokens.push(Token::Num(value));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut word = String::new();
                while let Some(&(_, d)) = chars.peek() {
                    if d.is_alphanumeric() || d == '_' {
                        word.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(keyword(&word).unwrap_or(Token::Ident(word)));
            }
            other => {
                return Err(err(format!("unexpected character '{other}' at offset {pos}")));
            }
        }
    }
    Ok(tokens)
}

fn next_is(chars: &mut Peekable<CharIndices<'_>>, expected: char) -> bool {
    if chars.peek().map(|&(_, c)| c) == Some(expected) {
        chars.next();
        true
    } else {
        false
    }
}

fn starts_number(chars: &Peekable<CharIndices<'_>>) -> bool {
    let mut look = chars.clone();
    look.next();
    matches!(look.peek(), Some(&(_, d)) if d.is_ascii_digit() || d == '.')
}

/// Read up to the closing `quote`; backslash escapes the next character.
fn read_quoted(chars: &mut Peekable<CharIndices<'_>>, quote: char) -> Option<String> {
    let mut out = String::new();
    while let Some((_, c)) = chars.next() {
        if c == quote {
            return Some(out);
        }
        if c == '\\' {
            let (_, escaped) = chars.next()?;
            out.push(escaped);
        } else {
            out.push(c);
        }
    }
    None
}

struct Parser<'a> {
    input: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn error(&self, msg: &str) -> ArchiferError {
        ArchiferError::Predicate(format!("{msg} in '{}'", self.input))
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn parse_or(&mut self) -> ArchiferResult<RowFilter> {
        let mut lhs = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let rhs = self.parse_and()?;
            lhs = lhs.or(rhs);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> ArchiferResult<RowFilter> {
        let mut lhs = self.parse_unary()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let rhs = self.parse_unary()?;
            lhs = lhs.and(rhs);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> ArchiferResult<RowFilter> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            return Ok(!self.parse_unary()?);
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> ArchiferResult<RowFilter> {
        match self.advance() {
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    Some(tok) => Err(self.error(&format!("expected ')' but found {tok}"))),
                    None => Err(self.error("missing ')'")),
                }
            }
            Some(Token::Ident(column)) => self.parse_comparison(column),
            Some(tok) => Err(self.error(&format!("expected a column name but found {tok}"))),
            None => Err(self.error("unexpected end of predicate")),
        }
    }

    fn parse_comparison(&mut self, column: String) -> ArchiferResult<RowFilter> {
        match self.advance() {
            Some(Token::Cmp(op)) => {
                let value = self.parse_literal()?;
                Ok(RowFilter::Compare { column, op, value })
            }
            Some(Token::In) => Ok(RowFilter::In {
                column,
                values: self.parse_list()?,
                negated: false,
            }),
            Some(Token::Not) => match self.advance() {
                Some(Token::In) => Ok(RowFilter::In {
                    column,
                    values: self.parse_list()?,
                    negated: true,
                }),
                _ => Err(self.error(&format!("expected 'in' after '{column} not'"))),
            },
            Some(tok) => Err(self.error(&format!(
                "expected a comparison after column '{column}' but found {tok}"
            ))),
            None => Err(self.error(&format!("column '{column}' is not compared to anything"))),
        }
    }

    fn parse_literal(&mut self) -> ArchiferResult<Literal> {
        match self.advance() {
            Some(Token::Num(v)) => Ok(Literal::Number(v)),
            Some(Token::Str(s)) => Ok(Literal::Text(s)),
            Some(Token::Bool(b)) => Ok(Literal::Bool(b)),
            Some(tok) => Err(self.error(&format!("expected a literal value but found {tok}"))),
            None => Err(self.error("expected a literal value")),
        }
    }

    fn parse_list(&mut self) -> ArchiferResult<Vec<Literal>> {
        let close = match self.advance() {
            Some(Token::LBracket) => Token::RBracket,
            Some(Token::LParen) => Token::RParen,
            _ => return Err(self.error("expected '[' after 'in'")),
        };
        let mut values = Vec::new();
        loop {
            if self.peek() == Some(&close) {
                self.pos += 1;
                return Ok(values);
            }
            values.push(self.parse_literal()?);
            match self.advance() {
                Some(Token::Comma) => continue,
                Some(tok) if tok == close => return Ok(values),
                Some(tok) => {
                    return Err(self.error(&format!("expected ',' or {close} but found {tok}")))
                }
                None => return Err(self.error(&format!("missing {close}"))),
            }
        }
    }
}
