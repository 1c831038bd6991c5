//! Single-pass type checker.
//!
//! Walks the tree once in evaluation order, threading a scope through blocks,
//! and writes each node's type into its slot. The first violation aborts.

use tracing::{debug, trace};

use crate::ast::{Expr, ExprKind, TypeExpr, UnaryOp};
use crate::error::{CompileError, CompileResult};
use crate::symtab::{ScopeId, SymTab};
use crate::tokenizer::SourceLocation;
use crate::ty::Type;

/// Check `program` against the bindings in `root`'s root scope and return
/// its type.
pub fn typecheck(program: &mut Expr, root: SymTab<Type>) -> CompileResult<Type> {
  let mut checker = TypeChecker { symbols: root };
  let scope = checker.symbols.root();
  let ty = checker.check(program, scope)?;
  debug!(%ty, "type checked");
  Ok(ty)
}

struct TypeChecker {
  symbols: SymTab<Type>,
}

impl TypeChecker {
  fn check(&mut self, expr: &mut Expr, scope: ScopeId) -> CompileResult<Type> {
    let ty = self.check_kind(expr, scope)?;
    if expr.ty.is_some() {
      return Err(CompileError::internal(format!(
        "node at {} was type checked twice",
        expr.loc
      )));
    }
    trace!(loc = %expr.loc, %ty, "typed node");
    expr.ty = Some(ty.clone());
    Ok(ty)
  }

  fn check_kind(&mut self, expr: &mut Expr, scope: ScopeId) -> CompileResult<Type> {
    let loc = expr.loc.clone();
    match &mut expr.kind {
      ExprKind::Literal(_) => Ok(Type::Int),
      ExprKind::BooleanLiteral(_) => Ok(Type::Bool),
      ExprKind::Identifier(name) => {
        let ty = self.lookup(&loc, name, scope)?;
        if ty.is_function() {
          return Err(CompileError::type_error(
            &loc,
            format!("function '{name}' can only be called, not used as a value"),
          ));
        }
        Ok(ty)
      }
      ExprKind::BinaryOp { left, op, right } => self.check_binary(&loc, left, op, right, scope),
      ExprKind::Unary { ops, operand } => {
        let ty = self.check(operand, scope)?;
        for op in ops.iter().rev() {
          let expected = match op {
            UnaryOp::Neg => Type::Int,
            UnaryOp::Not => Type::Bool,
          };
          if ty != expected {
            let symbol = match op {
              UnaryOp::Neg => "-",
              UnaryOp::Not => "not",
            };
            return Err(CompileError::type_error(
              &loc,
              format!("operator '{symbol}' expects {expected}, but the operand is {ty}"),
            ));
          }
        }
        Ok(ty)
      }
      ExprKind::IfExpression {
        cond,
        then_branch,
        else_branch,
      } => {
        self.expect(cond, scope, &Type::Bool, "if condition")?;
        let then_ty = self.check(then_branch, scope)?;
        let Some(else_branch) = else_branch else {
          return Ok(Type::Unit);
        };
        let else_ty = self.check(else_branch, scope)?;
        if then_ty != else_ty {
          return Err(CompileError::type_error(
            &loc,
            format!("then branch is {then_ty} but else branch is {else_ty}"),
          ));
        }
        Ok(then_ty)
      }
      ExprKind::WhileLoop { cond, body } => {
        self.expect(cond, scope, &Type::Bool, "while condition")?;
        self.check(body, scope)?;
        Ok(Type::Unit)
      }
      ExprKind::Block { statements, result } => {
        let inner = self.symbols.child(scope);
        for statement in statements.iter_mut() {
          self.check(statement, inner)?;
        }
        match result {
          Some(result) => self.check(result, inner),
          None => Ok(Type::Unit),
        }
      }
      ExprKind::Declaration {
        name,
        value,
        annotation,
      } => {
        let value_ty = self.check(value, scope)?;
        if self.symbols.is_local(scope, name) {
          return Err(CompileError::type_error(
            &loc,
            format!("'{name}' is already declared in this scope"),
          ));
        }
        let root = self.symbols.root();
        if scope != root && self.symbols.is_local(root, name) {
          return Err(CompileError::type_error(
            &loc,
            format!("'{name}' is a builtin and cannot be redeclared"),
          ));
        }
        if let Some(annotation) = annotation {
          let declared = resolve_type(annotation)?;
          if declared != value_ty {
            return Err(CompileError::type_error(
              annotation.loc(),
              format!("'{name}' is declared as {declared} but initialized with {value_ty}"),
            ));
          }
        }
        self.symbols.insert(scope, name.clone(), value_ty);
        Ok(Type::Unit)
      }
      ExprKind::FunctionCall { callee, args } => {
        let mut arg_types = Vec::with_capacity(args.len());
        for arg in args.iter_mut() {
          arg_types.push(self.check(arg, scope)?);
        }
        self.check_call(&loc, callee, arg_types, scope)
      }
    }
  }

  fn check_binary(
    &mut self,
    loc: &SourceLocation,
    left: &mut Expr,
    op: &str,
    right: &mut Expr,
    scope: ScopeId,
  ) -> CompileResult<Type> {
    if op == "=" && !matches!(left.kind, ExprKind::Identifier(_)) {
      return Err(CompileError::type_error(
        loc,
        "the left side of '=' must be a variable",
      ));
    }

    let left_ty = self.check(left, scope)?;
    let right_ty = self.check(right, scope)?;

    let (operand, result) = match op {
      "+" | "-" | "*" | "/" | "%" => (Type::Int, Type::Int),
      "<" | "<=" | ">" | ">=" => (Type::Int, Type::Bool),
      "and" | "or" => (Type::Bool, Type::Bool),
      "==" | "!=" => {
        if left_ty != right_ty {
          return Err(CompileError::type_error(
            loc,
            format!("'{op}' compares {left_ty} with {right_ty}"),
          ));
        }
        return Ok(Type::Bool);
      }
      "=" => {
        if left_ty != right_ty {
          return Err(CompileError::type_error(
            loc,
            format!("cannot assign {right_ty} to a variable of type {left_ty}"),
          ));
        }
        return Ok(right_ty);
      }
      _ => {
        return Err(CompileError::internal(format!(
          "parser produced unknown binary operator '{op}'"
        )));
      }
    };

    if left_ty != operand || right_ty != operand {
      return Err(CompileError::type_error(
        loc,
        format!("'{op}' expects {operand} operands, got {left_ty} and {right_ty}"),
      ));
    }
    Ok(result)
  }

  fn check_call(
    &mut self,
    loc: &SourceLocation,
    callee: &str,
    arg_types: Vec<Type>,
    scope: ScopeId,
  ) -> CompileResult<Type> {
    match self.symbols.lookup(scope, callee) {
      Some(Type::Function { params, result }) => {
        if params.len() != arg_types.len() {
          return Err(CompileError::type_error(
            loc,
            format!(
              "'{callee}' takes {} arguments but {} were given",
              params.len(),
              arg_types.len()
            ),
          ));
        }
        for (i, (param, arg)) in params.iter().zip(&arg_types).enumerate() {
          if param != arg {
            return Err(CompileError::type_error(
              loc,
              format!("argument {} of '{callee}' must be {param}, got {arg}", i + 1),
            ));
          }
        }
        Ok((**result).clone())
      }
      Some(other) => Err(CompileError::type_error(
        loc,
        format!("'{callee}' is {other}, not a function"),
      )),
      None => {
        // External function: its first call fixes the signature.
        let root = self.symbols.root();
        let ty = Type::function(arg_types, Type::Unit);
        debug!(callee, %ty, "declaring external function from first call");
        self.symbols.insert(root, callee, ty);
        Ok(Type::Unit)
      }
    }
  }

  fn expect(
    &mut self,
    expr: &mut Expr,
    scope: ScopeId,
    expected: &Type,
    what: &str,
  ) -> CompileResult<()> {
    let ty = self.check(expr, scope)?;
    if &ty != expected {
      return Err(CompileError::type_error(
        &expr.loc,
        format!("{what} must be {expected}, got {ty}"),
      ));
    }
    Ok(())
  }

  fn lookup(&self, loc: &SourceLocation, name: &str, scope: ScopeId) -> CompileResult<Type> {
    self
      .symbols
      .lookup(scope, name)
      .cloned()
      .ok_or_else(|| CompileError::type_error(loc, format!("'{name}' is not declared")))
  }
}

fn resolve_type(annotation: &TypeExpr) -> CompileResult<Type> {
  match annotation {
    TypeExpr::Named { loc, name } => Type::basic(name).ok_or_else(|| {
      CompileError::type_error(
        loc,
        format!("unknown type '{name}', expected Int, Bool or Unit"),
      )
    }),
    TypeExpr::FunctionTypeExpression { params, result, .. } => {
      let params = params.iter().map(resolve_type).collect::<CompileResult<Vec<_>>>()?;
      Ok(Type::function(params, resolve_type(result)?))
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::intrinsics::runtime_types;
  use crate::parser::parse;
  use crate::tokenizer::tokenize;

  fn check_with(source: &str, root: SymTab<Type>) -> CompileResult<Type> {
    let mut program = parse(tokenize(source, "test"))?;
    typecheck(&mut program, root)
  }

  fn check(source: &str) -> CompileResult<Type> {
    check_with(source, runtime_types().into_iter().collect())
  }

  fn type_error(source: &str) -> String {
    match check(source) {
      Err(err @ CompileError::Type { .. }) => err.to_string(),
      other => panic!("expected a type error for {source:?}, got {other:?}"),
    }
  }

  #[test]
  fn operators() {
    assert_eq!(check("1 + 2"), Ok(Type::Int));
    assert_eq!(check("1 < 2"), Ok(Type::Bool));
    assert_eq!(check("1 == 2"), Ok(Type::Bool));
    assert_eq!(check("true != false"), Ok(Type::Bool));
    assert_eq!(check("true and false or true"), Ok(Type::Bool));
    assert_eq!(check("7 % 3 * 2 - 1 / 1"), Ok(Type::Int));
  }

  #[test]
  fn operator_mismatches() {
    assert!(type_error("1 + true").contains("'+' expects Int operands, got Int and Bool"));
    assert!(type_error("true < false").contains("'<' expects Int"));
    assert!(type_error("1 and true").contains("'and' expects Bool"));
    assert!(type_error("1 == true").contains("'==' compares Int with Bool"));
  }

  #[test]
  fn literals_and_unary() {
    assert_eq!(check("1"), Ok(Type::Int));
    assert_eq!(check("false"), Ok(Type::Bool));
    assert_eq!(check("--1"), Ok(Type::Int));
    assert_eq!(check("not not true"), Ok(Type::Bool));
    assert!(type_error("not 1").contains("'not' expects Bool"));
    assert!(type_error("-true").contains("'-' expects Int"));
  }

  #[test]
  fn conditionals() {
    assert_eq!(check("if true then 1 else 2"), Ok(Type::Int));
    assert_eq!(check("if true then 1"), Ok(Type::Unit));
    assert!(type_error("if 1 then 2").contains("if condition must be Bool, got Int"));
    assert!(type_error("if true then 1 else false").contains("then branch is Int but else branch is Bool"));
  }

  #[test]
  fn while_loops() {
    assert_eq!(check("while true do 1"), Ok(Type::Unit));
    assert!(type_error("while 1 do 2").contains("while condition must be Bool"));
    assert!(type_error("while true do 1 + false").contains("'+'"));
  }

  #[test]
  fn identifiers_resolve_through_scopes() {
    let root: SymTab<Type> = [("a", Type::Bool)].into_iter().collect();
    assert_eq!(check_with("a", root), Ok(Type::Bool));
    assert_eq!(check("var a = 1; { { a } }"), Ok(Type::Int));
    assert!(type_error("b").contains("'b' is not declared"));
    assert!(type_error("{ var a = 1 }; a").contains("'a' is not declared"));
  }

  #[test]
  fn blocks() {
    assert_eq!(check("var a = 1"), Ok(Type::Unit));
    assert_eq!(check("{ var a = 10; a }"), Ok(Type::Int));
    assert_eq!(check("{ var a = 10; a; }"), Ok(Type::Unit));
    assert_eq!(check("{}"), Ok(Type::Unit));
    assert_eq!(check("{ 1 } true"), Ok(Type::Bool));
  }

  #[test]
  fn redeclaration_in_same_scope_is_rejected() {
    assert!(type_error("var x = 1; var x = 2").contains("'x' is already declared in this scope"));
    assert!(type_error("{ var y = true; var y = false }").contains("already declared"));
  }

  #[test]
  fn nested_declarations_shadow() {
    assert_eq!(check("var x = 1; { var x = true; x }"), Ok(Type::Bool));
    assert_eq!(check("var x = 1; { var x = true; x }; x"), Ok(Type::Int));
  }

  #[test]
  fn builtins_cannot_be_redeclared() {
    assert!(type_error("var print_int = 1").contains("builtin"));
  }

  #[test]
  fn annotations_must_match() {
    assert_eq!(check("var a: Int = 1; a"), Ok(Type::Int));
    assert_eq!(check("var u: Unit = {}; 1"), Ok(Type::Int));
    assert!(type_error("var a: Bool = 1").contains("declared as Bool but initialized with Int"));
    assert!(type_error("var a: Str = 1").contains("unknown type 'Str'"));
    assert!(type_error("var a: (Int) => Unit = 1").contains("declared as (Int) => Unit"));
  }

  #[test]
  fn annotation_mismatch_points_at_annotation() {
    let err = check("var flag: Bool = 1").unwrap_err();
    assert_eq!(err.location().map(|loc| loc.column), Some(11));
  }

  #[test]
  fn assignment() {
    assert_eq!(check("var a = 1; a = 2"), Ok(Type::Int));
    assert_eq!(check("var a = 1; var b = 2; a = b = 3"), Ok(Type::Int));
    assert!(type_error("var a = 1; a = true").contains("cannot assign Bool to a variable of type Int"));
    assert!(type_error("1 = 2").contains("left side of '='"));
  }

  #[test]
  fn calls_check_known_signatures() {
    assert_eq!(check("print_int(1)"), Ok(Type::Unit));
    assert_eq!(check("read_int() + 1"), Ok(Type::Int));
    assert!(type_error("print_int(true)").contains("argument 1 of 'print_int' must be Int, got Bool"));
    assert!(type_error("print_int(1, 2)").contains("takes 1 arguments but 2 were given"));
    assert!(type_error("var f = 1; f(2)").contains("'f' is Int, not a function"));
  }

  #[test]
  fn unknown_callees_take_their_first_signature() {
    assert_eq!(check("ext(1, true)"), Ok(Type::Unit));
    assert_eq!(check("ext(1); ext(2)"), Ok(Type::Unit));
    assert!(type_error("ext(1); ext(false)").contains("argument 1 of 'ext' must be Int"));
  }

  #[test]
  fn functions_are_not_values() {
    assert!(type_error("var f = print_int").contains("can only be called"));
    assert!(type_error("print_int == print_int").contains("can only be called"));
  }

  #[test]
  fn every_node_gets_a_type() {
    fn assert_typed(expr: &Expr) {
      assert!(expr.ty.is_some(), "untyped node {expr}");
      match &expr.kind {
        ExprKind::BinaryOp { left, right, .. } => {
          assert_typed(left);
          assert_typed(right);
        }
        ExprKind::Unary { operand, .. } => assert_typed(operand),
        ExprKind::IfExpression {
          cond,
          then_branch,
          else_branch,
        } => {
          assert_typed(cond);
          assert_typed(then_branch);
          if let Some(else_branch) = else_branch {
            assert_typed(else_branch);
          }
        }
        ExprKind::WhileLoop { cond, body } => {
          assert_typed(cond);
          assert_typed(body);
        }
        ExprKind::Block { statements, result } => {
          statements.iter().for_each(assert_typed);
          if let Some(result) = result {
            assert_typed(result);
          }
        }
        ExprKind::Declaration { value, .. } => assert_typed(value),
        ExprKind::FunctionCall { args, .. } => args.iter().for_each(assert_typed),
        ExprKind::Literal(_) | ExprKind::BooleanLiteral(_) | ExprKind::Identifier(_) => {}
      }
    }

    let mut program = parse(tokenize(
      "var x = 1; while x < 10 do { x = x + 1; if x == 5 then print_int(-x) else {} }; x > 3 and not false",
      "test",
    ))
    .unwrap();
    let ty = typecheck(&mut program, runtime_types().into_iter().collect()).unwrap();
    assert_eq!(ty, Type::Bool);
    assert_typed(&program);
  }

  #[test]
  fn checking_twice_is_an_internal_error() {
    let mut program = parse(tokenize("1 + 2", "test")).unwrap();
    typecheck(&mut program, SymTab::new()).unwrap();
    let err = typecheck(&mut program, SymTab::new()).unwrap_err();
    assert!(matches!(err, CompileError::Internal { .. }));
  }
}
