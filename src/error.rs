//! Shared error utilities used across the compilation pipeline.
//!
//! Every stage fails fast: the first problem aborts compilation and is reported
//! as a single `CompileError`. Diagnostics can be rendered in a style
//! reminiscent of chibicc, pointing at the offending column with a caret.

use snafu::Snafu;

use crate::tokenizer::SourceLocation;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
pub enum CompileError {
  #[snafu(display("input is empty"))]
  EmptyInput,

  #[snafu(display("{loc}: syntax error: {message}"))]
  Syntax { loc: SourceLocation, message: String },

  #[snafu(display("{loc}: type error: {message}"))]
  Type { loc: SourceLocation, message: String },

  /// An earlier stage handed over input that breaks one of its guarantees.
  #[snafu(display("internal compiler error: {message}"))]
  Internal { message: String },
}

impl CompileError {
  pub fn syntax(loc: &SourceLocation, message: impl Into<String>) -> Self {
    Self::Syntax {
      loc: loc.clone(),
      message: message.into(),
    }
  }

  pub fn type_error(loc: &SourceLocation, message: impl Into<String>) -> Self {
    Self::Type {
      loc: loc.clone(),
      message: message.into(),
    }
  }

  pub fn internal(message: impl Into<String>) -> Self {
    Self::Internal {
      message: message.into(),
    }
  }

  pub fn location(&self) -> Option<&SourceLocation> {
    match self {
      Self::Syntax { loc, .. } | Self::Type { loc, .. } => Some(loc),
      Self::EmptyInput | Self::Internal { .. } => None,
    }
  }

  /// Render the error against the source it came from: the offending line,
  /// a caret under the column, then the message.
  pub fn render(&self, source: &str) -> String {
    let Some(loc) = self.location() else {
      return self.to_string();
    };
    let Some(line) = source.lines().nth(loc.line.saturating_sub(1) as usize) else {
      return self.to_string();
    };
    let expr_line = format!("'{line}'");
    let width = line.chars().count();
    let column = (loc.column.max(1) as usize).min(width + 1);
    // account for opening quote
    let marker = format!("{}^", " ".repeat(column));
    format!("{expr_line}\n{marker} {self}")
  }
}
