//! Lexical analysis: turns the raw input string into a vector of tokens.
//!
//! Tokenizing is total. Whitespace and comments are skipped, every other
//! lexeme is matched against a fixed, ordered list of anchored regular
//! expressions, and characters nothing matches are dropped with a warning.
//! Multi-character operators are listed before single-character ones so the
//! longest lexeme wins.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

/// Position of a token in the source, 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceLocation {
  pub file: String,
  pub line: u32,
  pub column: u32,
}

impl SourceLocation {
  pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
    Self {
      file: file.into(),
      line,
      column,
    }
  }
}

impl fmt::Display for SourceLocation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}:{}", self.file, self.line, self.column)
  }
}

/// Kinds of tokens recognised by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
  /// Identifiers and keywords alike; the parser tells them apart.
  Identifier,
  IntLiteral,
  Operator,
  Punctuation,
  /// Synthetic sentinel, appended once after the last real token.
  End,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
  pub loc: SourceLocation,
  pub kind: TokenKind,
  pub text: String,
}

impl Token {
  pub fn new(loc: SourceLocation, kind: TokenKind, text: impl Into<String>) -> Self {
    Self {
      loc,
      kind,
      text: text.into(),
    }
  }

  pub fn is(&self, text: &str) -> bool {
    self.kind != TokenKind::End && self.text == text
  }
}

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| anchored(r"[ \t\r\f\v]+"));
static NEWLINE: LazyLock<Regex> = LazyLock::new(|| anchored(r"\n"));
static LINE_COMMENT: LazyLock<Regex> = LazyLock::new(|| anchored(r"(//|#)[^\n]*\n?"));
static BLOCK_COMMENT: LazyLock<Regex> = LazyLock::new(|| anchored(r"/\*(?s:.)*?\*/"));

static TOKEN_RULES: LazyLock<[(Regex, TokenKind); 4]> = LazyLock::new(|| {
  [
    (anchored(r"[A-Za-z_][A-Za-z_0-9]*"), TokenKind::Identifier),
    (anchored(r"[1-9][0-9]*|0"), TokenKind::IntLiteral),
    (
      anchored(r"==|!=|<=|>=|=>|<|>|\+|-|\*|/|=|%"),
      TokenKind::Operator,
    ),
    (anchored(r"[(){},;:]"), TokenKind::Punctuation),
  ]
});

fn anchored(pattern: &str) -> Regex {
  Regex::new(&format!(r"\A(?:{pattern})")).expect("lexer patterns are valid")
}

/// Lex the input into a flat vector of tokens terminated by an `End` marker.
pub fn tokenize(source: &str, file: &str) -> Vec<Token> {
  let mut tokens = Vec::new();
  let mut line = 1;
  let mut column = 1;
  let mut i = 0;

  while i < source.len() {
    let rest = &source[i..];

    if let Some(m) = WHITESPACE.find(rest) {
      column += char_len(m.as_str());
      i += m.end();
      continue;
    }

    if let Some(m) = NEWLINE.find(rest).or_else(|| LINE_COMMENT.find(rest)) {
      if m.as_str().ends_with('\n') {
        line += 1;
        column = 1;
      } else {
        column += char_len(m.as_str());
      }
      i += m.end();
      continue;
    }

    if let Some(m) = BLOCK_COMMENT.find(rest) {
      let text = m.as_str();
      match text.rfind('\n') {
        Some(last) => {
          line += text.matches('\n').count() as u32;
          column = char_len(&text[last + 1..]) + 1;
        }
        None => column += char_len(text),
      }
      i += m.end();
      continue;
    }

    if let Some((m, kind)) = TOKEN_RULES
      .iter()
      .find_map(|(re, kind)| re.find(rest).map(|m| (m, *kind)))
    {
      let loc = SourceLocation::new(file, line, column);
      tokens.push(Token::new(loc, kind, m.as_str()));
      column += char_len(m.as_str());
      i += m.end();
      continue;
    }

    let skipped = rest.chars().next().unwrap_or('\0');
    warn!(
      location = %SourceLocation::new(file, line, column),
      character = ?skipped,
      "skipping unrecognized character"
    );
    i += skipped.len_utf8().max(1);
    column += 1;
  }

  tokens.push(Token::new(
    SourceLocation::new(file, line + 1, 0),
    TokenKind::End,
    "",
  ));
  debug!(file, tokens = tokens.len(), "tokenized");
  tokens
}

fn char_len(text: &str) -> u32 {
  text.chars().count() as u32
}

/// Human-friendly description used in diagnostics.
pub fn describe_token(token: &Token) -> String {
  match token.kind {
    TokenKind::End => "end of input".to_string(),
    _ => format!("'{}'", token.text),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn texts(source: &str) -> Vec<(TokenKind, String)> {
    tokenize(source, "test")
      .into_iter()
      .filter(|t| t.kind != TokenKind::End)
      .map(|t| (t.kind, t.text))
      .collect()
  }

  #[test]
  fn tracks_lines_and_columns() {
    let tokens = tokenize("if  3\nwhile", "f");
    assert_eq!(tokens[0], Token::new(SourceLocation::new("f", 1, 1), TokenKind::Identifier, "if"));
    assert_eq!(tokens[1], Token::new(SourceLocation::new("f", 1, 5), TokenKind::IntLiteral, "3"));
    assert_eq!(tokens[2], Token::new(SourceLocation::new("f", 2, 1), TokenKind::Identifier, "while"));
    assert_eq!(tokens[3].kind, TokenKind::End);
    assert_eq!(tokens[3].loc, SourceLocation::new("f", 3, 0));
  }

  #[test]
  fn minus_is_never_part_of_a_literal() {
    use TokenKind::*;
    assert_eq!(
      texts("if -344 and Y1ppee"),
      vec![
        (Identifier, "if".into()),
        (Operator, "-".into()),
        (IntLiteral, "344".into()),
        (Identifier, "and".into()),
        (Identifier, "Y1ppee".into()),
      ]
    );
  }

  #[test]
  fn identifiers_may_contain_digits_and_underscores() {
    let toks = texts("_He123 H_E_L_L_0");
    assert_eq!(toks[0].1, "_He123");
    assert_eq!(toks[1].1, "H_E_L_L_0");
  }

  #[test]
  fn operators_use_maximal_munch() {
    let ops: Vec<String> = texts("==<=>==!=<>+-/*%=>").into_iter().map(|(_, t)| t).collect();
    assert_eq!(
      ops,
      ["==", "<=", ">=", "=", "!=", "<", ">", "+", "-", "/", "*", "%", "=>"]
    );
  }

  #[test]
  fn punctuation_includes_colon() {
    let toks = texts("(){},;:");
    assert!(toks.iter().all(|(kind, _)| *kind == TokenKind::Punctuation));
    assert_eq!(toks.len(), 7);
  }

  #[test]
  fn leading_zeros_split_literals() {
    let toks = texts("007");
    assert_eq!(toks.iter().map(|(_, t)| t.as_str()).collect::<Vec<_>>(), ["0", "0", "7"]);
  }

  #[test]
  fn line_comments_are_skipped() {
    let tokens = tokenize("// this is comment \n # another one  \nremains", "c");
    assert_eq!(tokens[0].text, "remains");
    assert_eq!(tokens[0].loc, SourceLocation::new("c", 3, 1));
  }

  #[test]
  fn block_comments_count_newlines() {
    let tokens = tokenize("/* \n this \n is \n comment */ \nremains", "c");
    assert_eq!(tokens[0].text, "remains");
    assert_eq!(tokens[0].loc.line, 5);
    assert_eq!(tokens[0].loc.column, 1);

    let tokens = tokenize("/* x */ y", "c");
    assert_eq!(tokens[0].loc, SourceLocation::new("c", 1, 9));
  }

  #[test]
  fn empty_input_still_has_end() {
    let tokens = tokenize("", "e");
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].kind, TokenKind::End);
    assert_eq!(tokens[0].loc, SourceLocation::new("e", 2, 0));
  }

  #[test]
  fn unrecognized_characters_are_skipped() {
    let tokens = tokenize("a @ b", "s");
    assert_eq!(tokens[0].text, "a");
    assert_eq!(tokens[1].text, "b");
    assert_eq!(tokens[1].loc.column, 5);
  }

  #[test]
  fn retokenizing_printed_tokens_round_trips() {
    let source = "var x: Int = 10; while x > 0 do { x = x - 1 } # done";
    let first = texts(source);
    let printed = first.iter().map(|(_, t)| t.as_str()).collect::<Vec<_>>().join(" ");
    assert_eq!(texts(&printed), first);
  }
}
