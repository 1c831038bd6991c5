//! Lowering of the typed tree into flat IR.
//!
//! Control flow becomes explicit labels and jumps. Every value lives in a
//! named temporary; source variables are mapped to fresh temporaries through
//! the same scope chain the checker used.

use tracing::{debug, trace};

use crate::ast::{Expr, ExprKind};
use crate::error::{CompileError, CompileResult};
use crate::ir::{Instruction, InstructionKind, IrVar, UNIT};
use crate::symtab::{ScopeId, SymTab};
use crate::tokenizer::SourceLocation;
use crate::ty::Type;

/// Lower a type-checked program. `root_types` names every reserved operator
/// and runtime function; each becomes a variable of the same name.
pub fn generate_ir(root_types: &[(&str, Type)], program: &Expr) -> CompileResult<Vec<Instruction>> {
  let vars: SymTab<IrVar> = root_types
    .iter()
    .map(|(name, _)| (*name, IrVar::new(*name)))
    .collect();
  let mut generator = IrGenerator {
    var_counter: 0,
    label_counter: 0,
    instructions: Vec::new(),
    vars,
    unit: IrVar::new(UNIT),
  };

  let root = generator.vars.root();
  let result = generator.visit(program, root)?;

  let printer = match type_of(program)? {
    Type::Int => Some("print_int"),
    Type::Bool => Some("print_bool"),
    _ => None,
  };
  if let Some(printer) = printer {
    let fun = generator.resolve(printer, root)?;
    let dest = generator.new_var();
    generator.emit(
      &program.loc,
      InstructionKind::Call {
        fun,
        args: vec![result],
        dest,
      },
    );
  }

  debug!(
    instructions = generator.instructions.len(),
    variables = generator.var_counter,
    labels = generator.label_counter,
    "lowered to IR"
  );
  Ok(generator.instructions)
}

fn type_of(expr: &Expr) -> CompileResult<&Type> {
  expr
    .ty
    .as_ref()
    .ok_or_else(|| CompileError::internal(format!("node at {} reached lowering untyped", expr.loc)))
}

struct IrGenerator {
  var_counter: usize,
  label_counter: usize,
  instructions: Vec<Instruction>,
  vars: SymTab<IrVar>,
  unit: IrVar,
}

impl IrGenerator {
  fn new_var(&mut self) -> IrVar {
    self.var_counter += 1;
    IrVar::new(format!("x{}", self.var_counter))
  }

  fn new_label(&mut self) -> String {
    self.label_counter += 1;
    format!("L{}", self.label_counter)
  }

  fn emit(&mut self, loc: &SourceLocation, kind: InstructionKind) {
    let insn = Instruction::new(loc.clone(), kind);
    trace!(%insn, "emit");
    self.instructions.push(insn);
  }

  fn label(&mut self, loc: &SourceLocation, name: &str) {
    self.emit(loc, InstructionKind::Label(name.to_string()));
  }

  fn jump(&mut self, loc: &SourceLocation, target: &str) {
    self.emit(loc, InstructionKind::Jump(target.to_string()));
  }

  fn cond_jump(&mut self, loc: &SourceLocation, cond: IrVar, then_label: &str, else_label: &str) {
    self.emit(
      loc,
      InstructionKind::CondJump {
        cond,
        then_label: then_label.to_string(),
        else_label: else_label.to_string(),
      },
    );
  }

  fn copy(&mut self, loc: &SourceLocation, source: IrVar, dest: IrVar) {
    self.emit(loc, InstructionKind::Copy { source, dest });
  }

  fn call(&mut self, loc: &SourceLocation, fun: IrVar, args: Vec<IrVar>) -> IrVar {
    let dest = self.new_var();
    self.emit(
      loc,
      InstructionKind::Call {
        fun,
        args,
        dest: dest.clone(),
      },
    );
    dest
  }

  fn resolve(&self, name: &str, scope: ScopeId) -> CompileResult<IrVar> {
    self.vars.lookup(scope, name).cloned().ok_or_else(|| {
      CompileError::internal(format!("'{name}' has no IR variable after type checking"))
    })
  }

  fn visit(&mut self, expr: &Expr, scope: ScopeId) -> CompileResult<IrVar> {
    let loc = &expr.loc;
    match &expr.kind {
      ExprKind::Literal(value) => {
        let dest = self.new_var();
        self.emit(
          loc,
          InstructionKind::LoadIntConst {
            value: *value,
            dest: dest.clone(),
          },
        );
        Ok(dest)
      }
      ExprKind::BooleanLiteral(value) => {
        let dest = self.new_var();
        self.emit(
          loc,
          InstructionKind::LoadBoolConst {
            value: *value,
            dest: dest.clone(),
          },
        );
        Ok(dest)
      }
      ExprKind::Identifier(name) => self.resolve(name, scope),
      ExprKind::BinaryOp { left, op, right } => match op.as_str() {
        "=" => {
          let ExprKind::Identifier(name) = &left.kind else {
            return Err(CompileError::internal(format!(
              "assignment at {loc} has a non-variable target"
            )));
          };
          let target = self.resolve(name, scope)?;
          let value = self.visit(right, scope)?;
          self.copy(loc, value, target.clone());
          Ok(target)
        }
        "and" | "or" => self.visit_short_circuit(loc, left, op == "or", right, scope),
        "==" | "!=" if *type_of(left)? == Type::Unit => {
          // Unit values are all equal; only the operands' effects remain.
          self.visit(left, scope)?;
          self.visit(right, scope)?;
          let dest = self.new_var();
          self.emit(
            loc,
            InstructionKind::LoadBoolConst {
              value: op == "==",
              dest: dest.clone(),
            },
          );
          Ok(dest)
        }
        _ => {
          let fun = self.resolve(op, scope)?;
          let lhs = self.visit(left, scope)?;
          let rhs = self.visit(right, scope)?;
          Ok(self.call(loc, fun, vec![lhs, rhs]))
        }
      },
      ExprKind::Unary { ops, operand } => {
        let mut value = self.visit(operand, scope)?;
        for op in ops.iter().rev() {
          let fun = self.resolve(op.intrinsic(), scope)?;
          value = self.call(loc, fun, vec![value]);
        }
        Ok(value)
      }
      ExprKind::IfExpression {
        cond,
        then_branch,
        else_branch: None,
      } => {
        let then_label = self.new_label();
        let end_label = self.new_label();

        let cond = self.visit(cond, scope)?;
        self.cond_jump(loc, cond, &then_label, &end_label);
        self.label(loc, &then_label);
        self.visit(then_branch, scope)?;
        self.label(loc, &end_label);
        Ok(self.unit.clone())
      }
      ExprKind::IfExpression {
        cond,
        then_branch,
        else_branch: Some(else_branch),
      } => {
        let then_label = self.new_label();
        let else_label = self.new_label();
        let end_label = self.new_label();

        let cond = self.visit(cond, scope)?;
        let result = match type_of(expr)? {
          Type::Unit => None,
          _ => Some(self.new_var()),
        };
        self.cond_jump(loc, cond, &then_label, &else_label);

        self.label(loc, &then_label);
        let value = self.visit(then_branch, scope)?;
        if let Some(result) = &result {
          self.copy(loc, value, result.clone());
        }
        self.jump(loc, &end_label);

        self.label(loc, &else_label);
        let value = self.visit(else_branch, scope)?;
        if let Some(result) = &result {
          self.copy(loc, value, result.clone());
        }
        self.label(loc, &end_label);

        Ok(result.unwrap_or_else(|| self.unit.clone()))
      }
      ExprKind::WhileLoop { cond, body } => {
        let start_label = self.new_label();
        let body_label = self.new_label();
        let end_label = self.new_label();

        self.label(loc, &start_label);
        let cond = self.visit(cond, scope)?;
        self.cond_jump(loc, cond, &body_label, &end_label);
        self.label(loc, &body_label);
        self.visit(body, scope)?;
        self.jump(loc, &start_label);
        self.label(loc, &end_label);
        Ok(self.unit.clone())
      }
      ExprKind::Block { statements, result } => {
        let inner = self.vars.child(scope);
        for statement in statements {
          self.visit(statement, inner)?;
        }
        match result {
          Some(result) => self.visit(result, inner),
          None => Ok(self.unit.clone()),
        }
      }
      ExprKind::Declaration { name, value, .. } => {
        let value = self.visit(value, scope)?;
        let var = self.new_var();
        self.copy(loc, value, var.clone());
        self.vars.insert(scope, name.clone(), var);
        Ok(self.unit.clone())
      }
      ExprKind::FunctionCall { callee, args } => {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
          values.push(self.visit(arg, scope)?);
        }
        let fun = match self.vars.lookup(scope, callee) {
          Some(fun) => fun.clone(),
          None => {
            trace!(%callee, "calling external function");
            IrVar::new(callee.clone())
          }
        };
        Ok(self.call(loc, fun, values))
      }
    }
  }

  /// `a and b` evaluates `b` only when `a` is true; `a or b` only when `a`
  /// is false. The other path loads the operator's identity.
  fn visit_short_circuit(
    &mut self,
    loc: &SourceLocation,
    left: &Expr,
    is_or: bool,
    right: &Expr,
    scope: ScopeId,
  ) -> CompileResult<IrVar> {
    let right_label = self.new_label();
    let skip_label = self.new_label();
    let end_label = self.new_label();

    let lhs = self.visit(left, scope)?;
    let result = self.new_var();
    if is_or {
      self.cond_jump(loc, lhs, &skip_label, &right_label);
    } else {
      self.cond_jump(loc, lhs, &right_label, &skip_label);
    }

    self.label(loc, &right_label);
    let rhs = self.visit(right, scope)?;
    self.copy(loc, rhs, result.clone());
    self.jump(loc, &end_label);

    self.label(loc, &skip_label);
    self.emit(
      loc,
      InstructionKind::LoadBoolConst {
        value: is_or,
        dest: result.clone(),
      },
    );
    self.label(loc, &end_label);
    Ok(result)
  }
}
