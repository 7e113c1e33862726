//! Condition evaluation for `if`/`elseif` directives.
//!
//! The grammar is a fixed splitter, not a precedence parser: a condition is
//! first split on `||`, then on `&&`, then matched as a single integer
//! comparison, and finally read as a lone variable. There is no grouping, so
//! `a && b || c` always means `(a && b) || c` and `a || b && c` means
//! `a || (b && c)`.

use super::error::ParseError;
use super::vars::Variables;
use regex::Regex;
use std::sync::LazyLock;

static COMPARISON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+)(==|!=|<=|>=|<|>)(.+)$").expect("Invalid comparison regex"));

const OR: &str = "||";
const AND: &str = "&&";

/// Comparison operator of a binary condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparison {
    Eq,
    Ne,
    Le,
    Ge,
    Lt,
    Gt,
}

impl Comparison {
    fn parse(op: &str) -> Option<Self> {
        match op {
            "==" => Some(Comparison::Eq),
            "!=" => Some(Comparison::Ne),
            "<=" => Some(Comparison::Le),
            ">=" => Some(Comparison::Ge),
            "<" => Some(Comparison::Lt),
            ">" => Some(Comparison::Gt),
            _ => None,
        }
    }

    fn apply(self, lhs: i64, rhs: i64) -> bool {
        match self {
            Comparison::Eq => lhs == rhs,
            Comparison::Ne => lhs != rhs,
            Comparison::Le => lhs <= rhs,
            Comparison::Ge => lhs >= rhs,
            Comparison::Lt => lhs < rhs,
            Comparison::Gt => lhs > rhs,
        }
    }
}

/// Evaluates conditions against a fixed set of variables
#[derive(Debug, Clone, Copy)]
pub struct Evaluator<'a> {
    vars: &'a Variables,
}

impl<'a> Evaluator<'a> {
    pub fn new(vars: &'a Variables) -> Self {
        Self { vars }
    }

    /// Evaluate a condition without position information
    pub fn evaluate(&self, condition: &str) -> Result<bool, ParseError> {
        self.evaluate_at(condition, None, None)
    }

    /// Evaluate a condition; `line` and `file` only enrich error messages
    pub fn evaluate_at(&self, condition: &str, line: Option<usize>, file: Option<&str>) -> Result<bool, ParseError> {
        let condition = condition.trim();

        let parts = split_operands(condition, OR);
        if parts.len() > 1 {
            for part in parts {
                if self.evaluate_at(part, line, file)? {
                    return Ok(true);
                }
            }
            return Ok(false);
        }

        let parts = split_operands(condition, AND);
        if parts.len() > 1 {
            for part in parts {
                if !self.evaluate_at(part, line, file)? {
                    return Ok(false);
                }
            }
            return Ok(true);
        }

        if let Some(caps) = COMPARISON.captures(condition) {
            let op = Comparison::parse(&caps[2])
                .ok_or_else(|| ParseError::evaluation("Invalid Expression!").at(line, file))?;
            let lhs = self.operand(&caps[1], line, file)?;
            let rhs = self.operand(&caps[3], line, file)?;
            return Ok(op.apply(lhs, rhs));
        }

        Ok(match self.vars.get(condition) {
            None => false,
            Some(value) => value.parse::<i64>().map(|n| n != 0).unwrap_or(true),
        })
    }

    fn operand(&self, text: &str, line: Option<usize>, file: Option<&str>) -> Result<i64, ParseError> {
        let resolved = self.vars.resolve(text.trim());
        resolved.parse::<i64>().map_err(|_| {
            ParseError::evaluation(format!("For input string: \"{}\"", resolved)).at(line, file)
        })
    }
}

/// Split on a literal operator, dropping trailing empty segments so that a
/// dangling operator (`a ||`) does not count as a second operand
fn split_operands<'c>(condition: &'c str, op: &str) -> Vec<&'c str> {
    let mut parts: Vec<&str> = condition.split(op).collect();
    while parts.len() > 1 && parts.last().is_some_and(|p| p.is_empty()) {
        parts.pop();
    }
    parts
}
