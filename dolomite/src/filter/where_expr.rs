//! `$where` predicate evaluation.
//!
//! The body is first screened against an identifier deny-list, then parsed
//! and evaluated by a small expression-only language instead of a script
//! host: field references (`this.a.b` or `obj.a.b`), literals, comparisons,
//! boolean connectives and parentheses. There is no ambient host access by
//! construction.

use crate::common::document::Document;
use crate::common::{compare, field, Value};
use crate::errors::{DolomiteError, DolomiteResult, ErrorKind};

const DENIED_IDENTIFIERS: [&str; 3] = ["process", "global", "db"];

/// Evaluates a `$where` body against a candidate document.
pub fn evaluate(doc: &Document, body: &str) -> DolomiteResult<bool> {
    for denied in DENIED_IDENTIFIERS {
        if body.contains(denied) {
            log::error!("$where body rejected, contains '{}'", denied);
            return Err(DolomiteError::new(
                &format!("$where may not reference '{}'", denied),
                ErrorKind::ScriptRejected,
            ));
        }
    }
    let tokens = tokenize(body)?;
    let mut parser = Parser {
        tokens: &tokens,
        position: 0,
    };
    let expr = parser.parse_or()?;
    if parser.position != tokens.len() {
        return Err(DolomiteError::new(
            "unexpected trailing input in $where expression",
            ErrorKind::Client,
        ));
    }
    Ok(truthy(&expr.evaluate(doc)))
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Path(String),
    Literal(Value),
    Compare(CompareOp),
    And,
    Or,
    Not,
    Open,
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CompareOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

fn tokenize(body: &str) -> DolomiteResult<Vec<Token>> {
    let bytes: Vec<char> = body.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        match c {
            ' ' | '\t' | '\r' | '\n' | ';' => i += 1,
            '(' => {
                tokens.push(Token::Open);
                i += 1;
            }
            ')' => {
                tokens.push(Token::Close);
                i += 1;
            }
            '&' if bytes.get(i + 1) == Some(&'&') => {
                tokens.push(Token::And);
                i += 2;
            }
            '|' if bytes.get(i + 1) == Some(&'|') => {
                tokens.push(Token::Or);
                i += 2;
            }
            '=' if bytes.get(i + 1) == Some(&'=') => {
                // === and == are the same comparison here
                i += if bytes.get(i + 2) == Some(&'=') { 3 } else { 2 };
                tokens.push(Token::Compare(CompareOp::Eq));
            }
            '!' if bytes.get(i + 1) == Some(&'=') => {
                i += if bytes.get(i + 2) == Some(&'=') { 3 } else { 2 };
                tokens.push(Token::Compare(CompareOp::Ne));
            }
            '!' => {
                tokens.push(Token::Not);
                i += 1;
            }
            '<' => {
                if bytes.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Compare(CompareOp::Lte));
                    i += 2;
                } else {
                    tokens.push(Token::Compare(CompareOp::Lt));
                    i += 1;
                }
            }
            '>' => {
                if bytes.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Compare(CompareOp::Gte));
                    i += 2;
                } else {
                    tokens.push(Token::Compare(CompareOp::Gt));
                    i += 1;
                }
            }
            '\'' | '"' => {
                let quote = c;
                let mut text = String::new();
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    text.push(bytes[i]);
                    i += 1;
                }
                if i == bytes.len() {
                    return Err(DolomiteError::new(
                        "unterminated string in $where expression",
                        ErrorKind::Client,
                    ));
                }
                i += 1;
                tokens.push(Token::Literal(Value::String(text)));
            }
            c if c.is_ascii_digit()
                || (c == '-' && bytes.get(i + 1).is_some_and(|n| n.is_ascii_digit())) =>
            {
                let start = i;
                i += 1;
                let mut float = false;
                while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == '.') {
                    float |= bytes[i] == '.';
                    i += 1;
                }
                let text: String = bytes[start..i].iter().collect();
                let literal = if float {
                    Value::Double(text.parse::<f64>().map_err(|_| {
                        DolomiteError::new("bad number in $where expression", ErrorKind::Client)
                    })?)
                } else {
                    Value::Int32(text.parse()?)
                };
                tokens.push(Token::Literal(literal));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < bytes.len()
                    && (bytes[i].is_ascii_alphanumeric() || bytes[i] == '_' || bytes[i] == '.')
                {
                    i += 1;
                }
                let word: String = bytes[start..i].iter().collect();
                match word.as_str() {
                    "true" => tokens.push(Token::Literal(Value::Bool(true))),
                    "false" => tokens.push(Token::Literal(Value::Bool(false))),
                    "null" => tokens.push(Token::Literal(Value::Null)),
                    _ => {
                        let path = word
                            .strip_prefix("this.")
                            .or_else(|| word.strip_prefix("obj."))
                            .ok_or_else(|| {
                                DolomiteError::new(
                                    &format!(
                                        "unknown identifier '{}' in $where expression",
                                        word
                                    ),
                                    ErrorKind::Client,
                                )
                            })?;
                        tokens.push(Token::Path(path.to_string()));
                    }
                }
            }
            _ => {
                return Err(DolomiteError::new(
                    &format!("unexpected character '{}' in $where expression", c),
                    ErrorKind::Client,
                ))
            }
        }
    }
    Ok(tokens)
}

#[derive(Debug)]
enum Expr {
    Literal(Value),
    Path(String),
    Compare(CompareOp, Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

/// An evaluated operand; a path that resolves to nothing stays distinct
/// from a stored null.
#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Value(Value),
    Absent,
}

struct Parser<'a> {
    tokens: &'a [Token],
    position: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn advance(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.position);
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn parse_or(&mut self) -> DolomiteResult<Expr> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.advance();
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> DolomiteResult<Expr> {
        let mut left = self.parse_comparison()?;
        while self.peek() == Some(&Token::And) {
            self.advance();
            let right = self.parse_comparison()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> DolomiteResult<Expr> {
        let left = self.parse_unary()?;
        if let Some(Token::Compare(op)) = self.peek() {
            let op = *op;
            self.advance();
            let right = self.parse_unary()?;
            return Ok(Expr::Compare(op, Box::new(left), Box::new(right)));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> DolomiteResult<Expr> {
        if self.peek() == Some(&Token::Not) {
            self.advance();
            let inner = self.parse_unary()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> DolomiteResult<Expr> {
        match self.advance() {
            Some(Token::Literal(value)) => Ok(Expr::Literal(value.clone())),
            Some(Token::Path(path)) => Ok(Expr::Path(path.clone())),
            Some(Token::Open) => {
                let expr = self.parse_or()?;
                if self.advance() != Some(&Token::Close) {
                    return Err(DolomiteError::new(
                        "missing closing parenthesis in $where expression",
                        ErrorKind::Client,
                    ));
                }
                Ok(expr)
            }
            _ => Err(DolomiteError::new(
                "malformed $where expression",
                ErrorKind::Client,
            )),
        }
    }
}

impl Expr {
    fn evaluate(&self, doc: &Document) -> Operand {
        match self {
            Expr::Literal(value) => Operand::Value(value.clone()),
            Expr::Path(path) => match field::first_value(doc, path) {
                Some(value) => Operand::Value(value),
                None => Operand::Absent,
            },
            Expr::Compare(op, left, right) => {
                let left = left.evaluate(doc);
                let right = right.evaluate(doc);
                Operand::Value(Value::Bool(compare_operands(*op, &left, &right)))
            }
            Expr::And(left, right) => Operand::Value(Value::Bool(
                truthy(&left.evaluate(doc)) && truthy(&right.evaluate(doc)),
            )),
            Expr::Or(left, right) => Operand::Value(Value::Bool(
                truthy(&left.evaluate(doc)) || truthy(&right.evaluate(doc)),
            )),
            Expr::Not(inner) => Operand::Value(Value::Bool(!truthy(&inner.evaluate(doc)))),
        }
    }
}

fn compare_operands(op: CompareOp, left: &Operand, right: &Operand) -> bool {
    let (a, b) = match (left, right) {
        (Operand::Value(a), Operand::Value(b)) => (a, b),
        // An absent operand only participates in (in)equality.
        _ => {
            return match op {
                CompareOp::Eq => left == right,
                CompareOp::Ne => left != right,
                _ => false,
            }
        }
    };
    match op {
        CompareOp::Eq => compare::equal(a, b),
        CompareOp::Ne => !compare::equal(a, b),
        CompareOp::Lt => compare::compare(a, b).is_lt(),
        CompareOp::Lte => compare::equal(a, b) || compare::compare(a, b).is_lt(),
        CompareOp::Gt => compare::compare(a, b).is_gt(),
        CompareOp::Gte => compare::equal(a, b) || compare::compare(a, b).is_gt(),
    }
}

fn truthy(operand: &Operand) -> bool {
    match operand {
        Operand::Absent => false,
        Operand::Value(value) => match value {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int32(n) => *n != 0,
            Value::Int64(n) => *n != 0,
            Value::Double(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        },
    }
}
