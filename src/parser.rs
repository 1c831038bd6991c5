//! Recursive-descent parser producing the expression tree.
//!
//! Binary operators are parsed by precedence climbing over `BINARY_LEVELS`,
//! lowest precedence first; every level is left-associative. Assignment is
//! right-associative and handled after the whole chain. The program itself is
//! an implicit block of top-level statements, so the block and program loops
//! share the same separator rules: statements are separated by `;`, except
//! that a statement may directly follow one ending in `}`.

use tracing::debug;

use crate::ast::{Expr, ExprKind, TypeExpr, UnaryOp};
use crate::error::{CompileError, CompileResult};
use crate::tokenizer::{SourceLocation, Token, TokenKind, describe_token};

const BINARY_LEVELS: [&[&str]; 6] = [
  &["or"],
  &["and"],
  &["==", "!="],
  &["<", "<=", ">", ">="],
  &["+", "-"],
  &["*", "/", "%"],
];

const KEYWORDS: [&str; 11] = [
  "if", "then", "else", "while", "do", "var", "true", "false", "and", "or", "not",
];

/// Parse a token stream into the top-level block.
pub fn parse(tokens: Vec<Token>) -> CompileResult<Expr> {
  if tokens.first().is_none_or(|token| token.kind == TokenKind::End) {
    return Err(CompileError::EmptyInput);
  }

  let mut stream = TokenStream::new(tokens);
  let program = parse_program(&mut stream)?;
  if let ExprKind::Block { statements, result } = &program.kind {
    debug!(
      statements = statements.len(),
      has_result = result.is_some(),
      "parsed"
    );
  }
  Ok(program)
}

fn parse_program(stream: &mut TokenStream) -> CompileResult<Expr> {
  let loc = stream.peek().loc.clone();
  let mut statements = Vec::new();
  let mut result = None;

  loop {
    let statement = parse_statement(stream)?;
    if stream.equal(";") {
      statements.push(statement);
      if stream.is_eof() {
        break;
      }
    } else if stream.is_eof() {
      result = Some(statement);
      break;
    } else if stream.follows_block() {
      statements.push(statement);
    } else {
      return Err(stream.missing_semicolon());
    }
  }

  Ok(Expr::block(loc, statements, result))
}

fn parse_block(stream: &mut TokenStream) -> CompileResult<Expr> {
  let loc = stream.skip("{")?.loc;
  let mut statements = Vec::new();
  let mut result = None;

  loop {
    if stream.check("}") || stream.is_eof() {
      break;
    }
    let statement = parse_statement(stream)?;
    if stream.equal(";") {
      statements.push(statement);
    } else if stream.check("}") || stream.is_eof() {
      result = Some(statement);
      break;
    } else if stream.follows_block() {
      statements.push(statement);
    } else {
      return Err(stream.missing_semicolon());
    }
  }

  stream.skip("}")?;
  Ok(Expr::block(loc, statements, result))
}

/// A statement is an expression, or a declaration where a block allows one.
fn parse_statement(stream: &mut TokenStream) -> CompileResult<Expr> {
  if stream.check("var") {
    return parse_declaration(stream);
  }
  parse_expr(stream)
}

fn parse_declaration(stream: &mut TokenStream) -> CompileResult<Expr> {
  let loc = stream.skip("var")?.loc;
  let (name, _) = stream.get_ident()?;
  let annotation = if stream.equal(":") {
    Some(parse_type_expr(stream)?)
  } else {
    None
  };
  stream.skip("=")?;
  let value = parse_expr(stream)?;
  Ok(Expr::declaration(loc, name, value, annotation))
}

fn parse_type_expr(stream: &mut TokenStream) -> CompileResult<TypeExpr> {
  if stream.check("(") {
    let loc = stream.skip("(")?.loc;
    let mut params = Vec::new();
    if !stream.equal(")") {
      loop {
        params.push(parse_type_expr(stream)?);
        if stream.equal(",") {
          continue;
        }
        stream.skip(")")?;
        break;
      }
    }
    stream.skip("=>")?;
    let result = parse_type_expr(stream)?;
    return Ok(TypeExpr::FunctionTypeExpression {
      loc,
      params,
      result: Box::new(result),
    });
  }

  let (name, loc) = stream.get_ident()?;
  Ok(TypeExpr::Named { loc, name })
}

fn parse_expr(stream: &mut TokenStream) -> CompileResult<Expr> {
  parse_assign(stream)
}

fn parse_assign(stream: &mut TokenStream) -> CompileResult<Expr> {
  let node = parse_binary(stream, 0)?;

  if stream.equal("=") {
    let rhs = parse_assign(stream)?;
    return Ok(Expr::binary(node, "=", rhs));
  }

  Ok(node)
}

fn parse_binary(stream: &mut TokenStream, level: usize) -> CompileResult<Expr> {
  let Some(operators) = BINARY_LEVELS.get(level) else {
    return parse_unary(stream);
  };

  let mut node = parse_binary(stream, level + 1)?;

  while let Some(op) = stream.peek_operator(operators) {
    stream.skip(op)?;
    let rhs = parse_binary(stream, level + 1)?;
    node = Expr::binary(node, op, rhs);
  }

  Ok(node)
}

fn parse_unary(stream: &mut TokenStream) -> CompileResult<Expr> {
  let loc = stream.peek().loc.clone();
  let mut ops = Vec::new();

  loop {
    if stream.equal("-") {
      ops.push(UnaryOp::Neg);
    } else if stream.equal("not") {
      ops.push(UnaryOp::Not);
    } else {
      break;
    }
  }

  let operand = parse_primary(stream)?;
  if ops.is_empty() {
    return Ok(operand);
  }
  Ok(Expr::unary(loc, ops, operand))
}

fn parse_primary(stream: &mut TokenStream) -> CompileResult<Expr> {
  let token = stream.peek().clone();

  if token.is("(") {
    stream.skip("(")?;
    let node = parse_expr(stream)?;
    stream.skip(")")?;
    return Ok(node);
  }

  if token.is("{") {
    return parse_block(stream);
  }

  if token.is("if") {
    return parse_if(stream);
  }

  if token.is("while") {
    return parse_while(stream);
  }

  if token.is("var") {
    return Err(CompileError::syntax(
      &token.loc,
      "variable declaration only allowed in blocks or top-level",
    ));
  }

  if token.is("true") || token.is("false") {
    stream.advance();
    return Ok(Expr::boolean(token.loc, token.text == "true"));
  }

  match token.kind {
    TokenKind::IntLiteral => {
      let (value, loc) = stream.get_number()?;
      Ok(Expr::literal(loc, value))
    }
    TokenKind::Identifier if !is_keyword(&token.text) => {
      let (name, loc) = stream.get_ident()?;
      if stream.check("(") {
        let args = parse_call_args(stream)?;
        return Ok(Expr::call(loc, name, args));
      }
      Ok(Expr::identifier(loc, name))
    }
    _ => Err(CompileError::syntax(
      &token.loc,
      format!("expected an expression, but got {}", describe_token(&token)),
    )),
  }
}

fn parse_if(stream: &mut TokenStream) -> CompileResult<Expr> {
  let loc = stream.skip("if")?.loc;
  let cond = parse_expr(stream)?;
  stream.skip("then")?;
  let then_branch = parse_expr(stream)?;
  let else_branch = if stream.equal("else") {
    Some(parse_expr(stream)?)
  } else {
    None
  };
  Ok(Expr::if_expression(loc, cond, then_branch, else_branch))
}

fn parse_while(stream: &mut TokenStream) -> CompileResult<Expr> {
  let loc = stream.skip("while")?.loc;
  let cond = parse_expr(stream)?;
  stream.skip("do")?;
  let body = parse_expr(stream)?;
  Ok(Expr::while_loop(loc, cond, body))
}

fn parse_call_args(stream: &mut TokenStream) -> CompileResult<Vec<Expr>> {
  stream.skip("(")?;
  let mut args = Vec::new();
  if stream.equal(")") {
    return Ok(args);
  }
  loop {
    args.push(parse_expr(stream)?);
    if stream.equal(",") {
      continue;
    }
    stream.skip(")")?;
    return Ok(args);
  }
}

fn is_keyword(text: &str) -> bool {
  KEYWORDS.contains(&text)
}

/// Lightweight cursor over the token vector.
struct TokenStream {
  tokens: Vec<Token>,
  pos: usize,
}

impl TokenStream {
  /// Take ownership of the token stream, making sure it ends in an `End`
  /// sentinel so lookahead never runs off the vector.
  fn new(mut tokens: Vec<Token>) -> Self {
    if let Some(last) = tokens.last()
      && last.kind != TokenKind::End
    {
      let mut end = last.loc.clone();
      end.line += 1;
      end.column = 0;
      tokens.push(Token::new(end, TokenKind::End, ""));
    }
    Self { tokens, pos: 0 }
  }

  fn peek(&self) -> &Token {
    let last = self.tokens.len() - 1;
    &self.tokens[self.pos.min(last)]
  }

  fn previous(&self) -> Option<&Token> {
    self.pos.checked_sub(1).and_then(|pos| self.tokens.get(pos))
  }

  fn advance(&mut self) -> Token {
    let token = self.peek().clone();
    if token.kind != TokenKind::End {
      self.pos += 1;
    }
    token
  }

  fn check(&self, text: &str) -> bool {
    self.peek().is(text)
  }

  /// Consume the current token if its text matches.
  fn equal(&mut self, text: &str) -> bool {
    if self.check(text) {
      self.pos += 1;
      return true;
    }
    false
  }

  fn skip(&mut self, text: &str) -> CompileResult<Token> {
    if self.check(text) {
      return Ok(self.advance());
    }
    let token = self.peek();
    Err(CompileError::syntax(
      &token.loc,
      format!("expected '{text}', but got {}", describe_token(token)),
    ))
  }

  /// The operator among `operators` that the current token spells, if any.
  fn peek_operator(&self, operators: &[&'static str]) -> Option<&'static str> {
    let token = self.peek();
    if !matches!(token.kind, TokenKind::Operator | TokenKind::Identifier) {
      return None;
    }
    operators.iter().copied().find(|op| token.text == *op)
  }

  /// Parse the current token as an integer literal returning its value and location.
  fn get_number(&mut self) -> CompileResult<(i64, SourceLocation)> {
    let token = self.peek();
    if token.kind != TokenKind::IntLiteral {
      return Err(CompileError::syntax(
        &token.loc,
        format!("expected an integer literal, but got {}", describe_token(token)),
      ));
    }
    let value = token.text.parse::<i64>().map_err(|err| {
      CompileError::syntax(
        &token.loc,
        format!("integer literal {} is out of range: {err}", token.text),
      )
    })?;
    let token = self.advance();
    Ok((value, token.loc))
  }

  /// Parse the current token as a non-keyword identifier.
  fn get_ident(&mut self) -> CompileResult<(String, SourceLocation)> {
    let token = self.peek();
    if token.kind != TokenKind::Identifier || is_keyword(&token.text) {
      return Err(CompileError::syntax(
        &token.loc,
        format!("expected an identifier, but got {}", describe_token(token)),
      ));
    }
    let token = self.advance();
    Ok((token.text, token.loc))
  }

  /// Whether the previous token closed a block, which stands in for a `;`.
  fn follows_block(&self) -> bool {
    self.previous().is_some_and(|token| token.is("}"))
  }

  fn missing_semicolon(&self) -> CompileError {
    let token = self.peek();
    CompileError::syntax(
      &token.loc,
      format!("missing semicolon before {}", describe_token(token)),
    )
  }

  fn is_eof(&self) -> bool {
    self.peek().kind == TokenKind::End
  }
}
