//! The boolean activation mini-language.
//!
//! Grammar: identifiers, `and`, `or`, `not`, parentheses. No literals, no
//! comparisons, no arithmetic. Expressions are parsed into an explicit
//! tagged AST and walked by a small recursive evaluator; nothing is ever
//! dynamically executed.
//!
//! Ranking semantics: an absent expression ranks `0` (unconditionally
//! active, lowest specificity). A malformed expression, a reference to an
//! identifier missing from the context, or an expression that evaluates
//! false all rank `-1`. A true expression ranks by the number of *distinct*
//! identifiers it references, so more specific matches outrank general ones.

use rustc_hash::FxHashMap;
use thiserror::Error;

/// Per-utterance topic activation map.
pub type ActivationContext = FxHashMap<String, bool>;

/// Parsed expression tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BoolExpr {
    And(Box<BoolExpr>, Box<BoolExpr>),
    Or(Box<BoolExpr>, Box<BoolExpr>),
    Not(Box<BoolExpr>),
    Ident(String),
}

/// Parse or evaluation failure. Never escapes [`rank`]; callers that parse
/// directly get the full story.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExprError {
    #[error("unexpected character '{0}' in expression")]
    UnexpectedChar(char),
    #[error("unexpected token '{0}'")]
    UnexpectedToken(String),
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("trailing input after expression: '{0}'")]
    TrailingInput(String),
    #[error("unknown identifier '{0}'")]
    UnknownIdent(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Token {
    And,
    Or,
    Not,
    LParen,
    RParen,
    Ident(String),
}

fn tokenize(input: &str) -> Result<Vec<Token>, ExprError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();
    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == '(' {
            chars.next();
            tokens.push(Token::LParen);
        } else if c == ')' {
            chars.next();
            tokens.push(Token::RParen);
        } else if c.is_ascii_alphabetic() || c == '_' {
            let mut end = start;
            while let Some(&(i, c)) = chars.peek() {
                if c.is_ascii_alphanumeric() || c == '_' {
                    end = i + c.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(match &input[start..end] {
                "and" => Token::And,
                "or" => Token::Or,
                "not" => Token::Not,
                ident => Token::Ident(ident.to_string()),
            });
        } else {
            return Err(ExprError::UnexpectedChar(c));
        }
    }
    Ok(tokens)
}

/// Recursive-descent parser with the usual precedence: `or` < `and` < `not`.
struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl<'t> Parser<'t> {
    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&'t Token> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    fn or_expr(&mut self) -> Result<BoolExpr, ExprError> {
        let mut left = self.and_expr()?;
        while self.peek() == Some(&Token::Or) {
            self.next();
            let right = self.and_expr()?;
            left = BoolExpr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<BoolExpr, ExprError> {
        let mut left = self.not_expr()?;
        while self.peek() == Some(&Token::And) {
            self.next();
            let right = self.not_expr()?;
            left = BoolExpr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<BoolExpr, ExprError> {
        if self.peek() == Some(&Token::Not) {
            self.next();
            Ok(BoolExpr::Not(Box::new(self.not_expr()?)))
        } else {
            self.atom()
        }
    }

    fn atom(&mut self) -> Result<BoolExpr, ExprError> {
        match self.next() {
            Some(Token::Ident(name)) => Ok(BoolExpr::Ident(name.clone())),
            Some(Token::LParen) => {
                let inner = self.or_expr()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    Some(other) => Err(ExprError::UnexpectedToken(format!("{other:?}"))),
                    None => Err(ExprError::UnexpectedEnd),
                }
            }
            Some(other) => Err(ExprError::UnexpectedToken(format!("{other:?}"))),
            None => Err(ExprError::UnexpectedEnd),
        }
    }
}

/// Parse an expression string into its AST.
pub fn parse(input: &str) -> Result<BoolExpr, ExprError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
    };
    let expr = parser.or_expr()?;
    if parser.pos < tokens.len() {
        return Err(ExprError::TrailingInput(format!(
            "{:?}",
            tokens[parser.pos]
        )));
    }
    Ok(expr)
}

impl BoolExpr {
    /// Evaluate against a context. Referencing an identifier absent from the
    /// context is an error, not `false`.
    pub fn eval(&self, context: &ActivationContext) -> Result<bool, ExprError> {
        match self {
            BoolExpr::And(l, r) => Ok(l.eval(context)? & r.eval(context)?),
            BoolExpr::Or(l, r) => Ok(l.eval(context)? | r.eval(context)?),
            BoolExpr::Not(inner) => Ok(!inner.eval(context)?),
            BoolExpr::Ident(name) => context
                .get(name)
                .copied()
                .ok_or_else(|| ExprError::UnknownIdent(name.clone())),
        }
    }

    fn collect_idents<'a>(&'a self, into: &mut Vec<&'a str>) {
        match self {
            BoolExpr::And(l, r) | BoolExpr::Or(l, r) => {
                l.collect_idents(into);
                r.collect_idents(into);
            }
            BoolExpr::Not(inner) => inner.collect_idents(into),
            BoolExpr::Ident(name) => {
                if !into.contains(&name.as_str()) {
                    into.push(name);
                }
            }
        }
    }

    /// Distinct identifiers referenced, in first-appearance order.
    #[must_use]
    pub fn idents(&self) -> Vec<&str> {
        let mut idents = Vec::new();
        self.collect_idents(&mut idents);
        idents
    }
}

/// Specificity rank of an optional activation expression.
///
/// `None` or blank ranks `0`; any failure or a false result ranks `-1`;
/// otherwise the count of distinct identifiers referenced.
#[must_use]
pub fn rank(expr: Option<&str>, context: &ActivationContext) -> i32 {
    let Some(expr) = expr else { return 0 };
    if expr.trim().is_empty() {
        return 0;
    }
    let parsed = match parse(expr) {
        Ok(parsed) => parsed,
        Err(err) => {
            tracing::debug!(expr, %err, "activation expression rejected");
            return -1;
        }
    };
    match parsed.eval(context) {
        Ok(true) => i32::try_from(parsed.idents().len()).unwrap_or(i32::MAX),
        Ok(false) => -1,
        Err(err) => {
            tracing::debug!(expr, %err, "activation expression rejected");
            -1
        }
    }
}
