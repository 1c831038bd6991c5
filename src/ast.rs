//! Expression tree produced by the parser.
//!
//! Every node carries its source location and an empty type slot that the
//! type checker fills exactly once.

use std::fmt;

use crate::tokenizer::SourceLocation;
use crate::ty::Type;

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
  pub loc: SourceLocation,
  pub kind: ExprKind,
  pub ty: Option<Type>,
}

/// Prefix operators. A run such as `- not x` is kept in source order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
  Neg,
  Not,
}

impl UnaryOp {
  /// Name of the intrinsic implementing this operator.
  pub fn intrinsic(self) -> &'static str {
    match self {
      Self::Neg => "unary_-",
      Self::Not => "unary_not",
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
  Literal(i64),
  BooleanLiteral(bool),
  Identifier(String),
  BinaryOp {
    left: Box<Expr>,
    op: String,
    right: Box<Expr>,
  },
  Unary {
    ops: Vec<UnaryOp>,
    operand: Box<Expr>,
  },
  IfExpression {
    cond: Box<Expr>,
    then_branch: Box<Expr>,
    else_branch: Option<Box<Expr>>,
  },
  WhileLoop {
    cond: Box<Expr>,
    body: Box<Expr>,
  },
  /// A missing `result` means the block evaluates to unit.
  Block {
    statements: Vec<Expr>,
    result: Option<Box<Expr>>,
  },
  Declaration {
    name: String,
    value: Box<Expr>,
    annotation: Option<TypeExpr>,
  },
  FunctionCall {
    callee: String,
    args: Vec<Expr>,
  },
}

/// Type annotation syntax. Never evaluated, only resolved by the checker.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
  Named {
    loc: SourceLocation,
    name: String,
  },
  FunctionTypeExpression {
    loc: SourceLocation,
    params: Vec<TypeExpr>,
    result: Box<TypeExpr>,
  },
}

impl TypeExpr {
  pub fn loc(&self) -> &SourceLocation {
    match self {
      Self::Named { loc, .. } | Self::FunctionTypeExpression { loc, .. } => loc,
    }
  }
}

impl Expr {
  pub fn new(loc: SourceLocation, kind: ExprKind) -> Self {
    Self { loc, kind, ty: None }
  }

  pub fn literal(loc: SourceLocation, value: i64) -> Self {
    Self::new(loc, ExprKind::Literal(value))
  }

  pub fn boolean(loc: SourceLocation, value: bool) -> Self {
    Self::new(loc, ExprKind::BooleanLiteral(value))
  }

  pub fn identifier(loc: SourceLocation, name: impl Into<String>) -> Self {
    Self::new(loc, ExprKind::Identifier(name.into()))
  }

  pub fn binary(left: Expr, op: impl Into<String>, right: Expr) -> Self {
    let loc = left.loc.clone();
    Self::new(
      loc,
      ExprKind::BinaryOp {
        left: Box::new(left),
        op: op.into(),
        right: Box::new(right),
      },
    )
  }

  pub fn unary(loc: SourceLocation, ops: Vec<UnaryOp>, operand: Expr) -> Self {
    Self::new(
      loc,
      ExprKind::Unary {
        ops,
        operand: Box::new(operand),
      },
    )
  }

  pub fn if_expression(
    loc: SourceLocation,
    cond: Expr,
    then_branch: Expr,
    else_branch: Option<Expr>,
  ) -> Self {
    Self::new(
      loc,
      ExprKind::IfExpression {
        cond: Box::new(cond),
        then_branch: Box::new(then_branch),
        else_branch: else_branch.map(Box::new),
      },
    )
  }

  pub fn while_loop(loc: SourceLocation, cond: Expr, body: Expr) -> Self {
    Self::new(
      loc,
      ExprKind::WhileLoop {
        cond: Box::new(cond),
        body: Box::new(body),
      },
    )
  }

  pub fn block(loc: SourceLocation, statements: Vec<Expr>, result: Option<Expr>) -> Self {
    Self::new(
      loc,
      ExprKind::Block {
        statements,
        result: result.map(Box::new),
      },
    )
  }

  pub fn declaration(
    loc: SourceLocation,
    name: impl Into<String>,
    value: Expr,
    annotation: Option<TypeExpr>,
  ) -> Self {
    Self::new(
      loc,
      ExprKind::Declaration {
        name: name.into(),
        value: Box::new(value),
        annotation,
      },
    )
  }

  pub fn call(loc: SourceLocation, callee: impl Into<String>, args: Vec<Expr>) -> Self {
    Self::new(
      loc,
      ExprKind::FunctionCall {
        callee: callee.into(),
        args,
      },
    )
  }
}

/// Fully parenthesized rendering, one level of parentheses per operator node.
impl fmt::Display for Expr {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.kind {
      ExprKind::Literal(value) => write!(f, "{value}"),
      ExprKind::BooleanLiteral(value) => write!(f, "{value}"),
      ExprKind::Identifier(name) => f.write_str(name),
      ExprKind::BinaryOp { left, op, right } => write!(f, "({left} {op} {right})"),
      ExprKind::Unary { ops, operand } => {
        f.write_str("(")?;
        for op in ops {
          match op {
            UnaryOp::Neg => f.write_str("- ")?,
            UnaryOp::Not => f.write_str("not ")?,
          }
        }
        write!(f, "{operand})")
      }
      ExprKind::IfExpression {
        cond,
        then_branch,
        else_branch,
      } => match else_branch {
        Some(else_branch) => write!(f, "(if {cond} then {then_branch} else {else_branch})"),
        None => write!(f, "(if {cond} then {then_branch})"),
      },
      ExprKind::WhileLoop { cond, body } => write!(f, "(while {cond} do {body})"),
      ExprKind::Block { statements, result } => {
        f.write_str("{")?;
        for (i, statement) in statements.iter().enumerate() {
          if i > 0 {
            f.write_str(" ")?;
          }
          write!(f, "{statement};")?;
        }
        if let Some(result) = result {
          if !statements.is_empty() {
            f.write_str(" ")?;
          }
          write!(f, "{result}")?;
        }
        f.write_str("}")
      }
      ExprKind::Declaration {
        name,
        value,
        annotation,
      } => match annotation {
        Some(annotation) => write!(f, "(var {name}: {annotation} = {value})"),
        None => write!(f, "(var {name} = {value})"),
      },
      ExprKind::FunctionCall { callee, args } => {
        write!(f, "{callee}(")?;
        for (i, arg) in args.iter().enumerate() {
          if i > 0 {
            f.write_str(", ")?;
          }
          write!(f, "{arg}")?;
        }
        f.write_str(")")
      }
    }
  }
}

impl fmt::Display for TypeExpr {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Named { name, .. } => f.write_str(name),
      Self::FunctionTypeExpression { params, result, .. } => {
        f.write_str("(")?;
        for (i, param) in params.iter().enumerate() {
          if i > 0 {
            f.write_str(", ")?;
          }
          write!(f, "{param}")?;
        }
        write!(f, ") => {result}")
      }
    }
  }
}
