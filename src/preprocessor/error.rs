use std::fmt;
use thiserror::Error;

/// Category of a preprocessing failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Unbalanced or misplaced if/elseif/else/endif directives
    Structural,
    /// A directive condition without its leading space
    Syntax,
    /// A comparison operand that is not an integer
    Evaluation,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseErrorKind::Structural => write!(f, "structural"),
            ParseErrorKind::Syntax => write!(f, "syntax"),
            ParseErrorKind::Evaluation => write!(f, "evaluation"),
        }
    }
}

/// Error raised while reading the directives of a file
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}{}", location_suffix(.line, .file))]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// 1-based line the error was found on
    pub line: Option<usize>,
    pub file: Option<String>,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            line: None,
            file: None,
        }
    }

    pub fn structural(message: impl Into<String>) -> Self {
        Self::new(ParseErrorKind::Structural, message)
    }

    pub fn syntax(message: impl Into<String>) -> Self {
        Self::new(ParseErrorKind::Syntax, message)
    }

    pub fn evaluation(message: impl Into<String>) -> Self {
        Self::new(ParseErrorKind::Evaluation, message)
    }

    /// Attach the position the error refers to
    pub fn at(mut self, line: Option<usize>, file: Option<&str>) -> Self {
        self.line = line;
        self.file = file.map(str::to_string);
        self
    }
}

fn location_suffix(line: &Option<usize>, file: &Option<String>) -> String {
    let mut suffix = String::new();
    if let Some(line) = line {
        suffix.push_str(&format!(" In line: {}", line));
    }
    if let Some(file) = file.as_deref().filter(|f| !f.trim().is_empty()) {
        suffix.push_str(&format!(" of file: {}", file));
    }
    suffix
}
