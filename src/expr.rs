//! Recursive-descent evaluator for the arithmetic used in pose array cells.
//!
//! ```text
//! expr  := term (('+' | '-') term)*
//! term  := unary (('*' | '/') unary)*
//! unary := ('+' | '-')* atom
//! atom  := number | constant | '(' expr ')'
//! ```
//!
//! Parentheses nest at most [`MAX_DEPTH`] deep.
//!
//! Numbers may carry a `f` suffix (handled by the lexer). Constants come from
//! a [`Constants`] table seeded with the usual π aliases.

use crate::error::EvalError;
use crate::lexer::{Token, TokenKind};
use std::collections::HashMap;

/// Deepest parenthesis nesting accepted in one expression.
pub const MAX_DEPTH: usize = 256;

/// Named numeric constants visible to the evaluator.
#[derive(Clone, Debug)]
pub struct Constants {
    values: HashMap<String, f64>,
}

impl Default for Constants {
    /// The π aliases used by arm-SDK examples. `kPi` and `kPi_2` use the
    /// truncated values those examples declare.
    fn default() -> Self {
        let mut values = HashMap::new();
        values.insert("kPi".to_string(), 3.141592654);
        values.insert("kPi_2".to_string(), 1.57079632);
        values.insert("M_PI".to_string(), std::f64::consts::PI);
        values.insert("M_PI_2".to_string(), std::f64::consts::FRAC_PI_2);
        Self { values }
    }
}

impl Constants {
    /// A table with no constants at all.
    pub fn empty() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    /// Defines or overrides a constant.
    pub fn define(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Evaluates one expression. Comment tokens are ignored.
pub fn evaluate(tokens: &[Token], constants: &Constants) -> Result<f64, EvalError> {
    let tokens: Vec<&Token> = tokens.iter().filter(|t| !t.is_comment()).collect();
    if tokens.is_empty() {
        return Err(EvalError::Empty);
    }
    let mut eval = Evaluator {
        tokens: &tokens,
        pos: 0,
        depth: 0,
        constants,
    };
    let value = eval.expr()?;
    match eval.peek() {
        None => Ok(value),
        Some(t) => Err(EvalError::Unexpected(describe(t))),
    }
}

struct Evaluator<'a> {
    tokens: &'a [&'a Token],
    pos: usize,
    depth: usize,
    constants: &'a Constants,
}

impl<'a> Evaluator<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos).copied()
    }

    fn eat_punct(&mut self, c: char) -> bool {
        if self.peek().is_some_and(|t| t.is_punct(c)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expr(&mut self) -> Result<f64, EvalError> {
        let mut acc = self.term()?;
        loop {
            if self.eat_punct('+') {
                acc += self.term()?;
            } else if self.eat_punct('-') {
                acc -= self.term()?;
            } else {
                return Ok(acc);
            }
        }
    }

    fn term(&mut self) -> Result<f64, EvalError> {
        let mut acc = self.unary()?;
        loop {
            if self.eat_punct('*') {
                acc *= self.unary()?;
            } else if self.eat_punct('/') {
                let divisor = self.unary()?;
                if divisor == 0.0 {
                    return Err(EvalError::DivisionByZero);
                }
                acc /= divisor;
            } else {
                return Ok(acc);
            }
        }
    }

    fn unary(&mut self) -> Result<f64, EvalError> {
        let mut negate = false;
        loop {
            if self.eat_punct('-') {
                negate = !negate;
            } else if !self.eat_punct('+') {
                break;
            }
        }
        let value = self.atom()?;
        Ok(if negate { -value } else { value })
    }

    fn atom(&mut self) -> Result<f64, EvalError> {
        let Some(token) = self.peek() else {
            return Err(EvalError::Empty);
        };
        match &token.kind {
            TokenKind::Number(n) => {
                self.pos += 1;
                Ok(n.value)
            }
            TokenKind::Ident(name) => {
                self.pos += 1;
                self.constants
                    .get(name)
                    .ok_or_else(|| EvalError::UnknownConstant(name.clone()))
            }
            TokenKind::Punct('(') => {
                if self.depth == MAX_DEPTH {
                    return Err(EvalError::TooDeep(MAX_DEPTH));
                }
                self.pos += 1;
                self.depth += 1;
                let value = self.expr()?;
                self.depth -= 1;
                if self.eat_punct(')') {
                    Ok(value)
                } else {
                    Err(EvalError::UnbalancedParen)
                }
            }
            _ => Err(EvalError::Unexpected(describe(token))),
        }
    }
}

fn describe(token: &Token) -> String {
    match &token.kind {
        TokenKind::Ident(s) => s.clone(),
        TokenKind::Number(n) => n.value.to_string(),
        TokenKind::Punct(c) => c.to_string(),
        TokenKind::LineComment(_) => "comment".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use approx::assert_relative_eq;

    fn eval(src: &str) -> Result<f64, EvalError> {
        evaluate(&tokenize(src), &Constants::default())
    }

    #[test]
    fn suffixed_literal() {
        assert_relative_eq!(eval("0.78f").unwrap(), 0.78);
    }

    #[test]
    fn sums_of_products_left_to_right() {
        assert_relative_eq!(eval("kPi_2 + 0.18f").unwrap(), 1.57079632 + 0.18);
        assert_relative_eq!(eval("-kPi_2-0.1f").unwrap(), -1.57079632 - 0.1);
        assert_relative_eq!(eval("2 * kPi_2 - 1").unwrap(), 2.0 * 1.57079632 - 1.0);
        assert_relative_eq!(eval("1 - 2 - 3").unwrap(), -4.0);
    }

    #[test]
    fn division_and_parentheses() {
        assert_relative_eq!(eval("-kPi_2/2").unwrap(), -1.57079632 / 2.0);
        assert_relative_eq!(eval("(1 + 2) * 0.5f").unwrap(), 1.5);
    }

    #[test]
    fn unresolvable_inputs_are_errors() {
        assert_eq!(eval("foo"), Err(EvalError::UnknownConstant("foo".into())));
        assert_eq!(eval(""), Err(EvalError::Empty));
        assert_eq!(eval("(1 + 2"), Err(EvalError::UnbalancedParen));
        assert_eq!(eval("1 / 0"), Err(EvalError::DivisionByZero));
        assert_eq!(eval("1 2"), Err(EvalError::Unexpected("2".into())));
    }

    #[test]
    fn sign_runs_collapse() {
        assert_relative_eq!(eval("--1").unwrap(), 1.0);
        assert_relative_eq!(eval("-+-+-2").unwrap(), -2.0);
        let long = format!("{}0.5f", "-".repeat(100_000));
        assert_relative_eq!(eval(&long).unwrap(), 0.5);
    }

    #[test]
    fn nesting_is_bounded() {
        let nested = |n: usize| format!("{}1{}", "(".repeat(n), ")".repeat(n));
        assert_relative_eq!(eval(&nested(MAX_DEPTH)).unwrap(), 1.0);
        assert_eq!(eval(&nested(MAX_DEPTH + 1)), Err(EvalError::TooDeep(MAX_DEPTH)));
        assert_eq!(eval(&nested(50_000)), Err(EvalError::TooDeep(MAX_DEPTH)));
    }

    #[test]
    fn user_constants_override_builtins() {
        let mut c = Constants::default();
        c.define("kPi", 3.0);
        assert_relative_eq!(evaluate(&tokenize("kPi"), &c).unwrap(), 3.0);
    }
}
