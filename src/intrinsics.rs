//! Reserved names: the operators, which the code generator expands inline,
//! and the runtime functions, which are linked from outside.

use crate::error::{CompileError, CompileResult};
use crate::ty::Type;

/// Functions supplied by the runtime and called through the normal
/// calling convention.
pub const RUNTIME_FUNCTIONS: [&str; 3] = ["print_int", "print_bool", "read_int"];

const ARITHMETIC: [&str; 5] = ["+", "-", "*", "/", "%"];
const COMPARISON: [&str; 4] = ["<", "<=", ">", ">="];
const EQUALITY: [&str; 2] = ["==", "!="];
const LOGICAL: [&str; 2] = ["and", "or"];

/// Types of the runtime functions, seeded into the checker's root scope.
pub fn runtime_types() -> Vec<(&'static str, Type)> {
  vec![
    ("print_int", Type::function(vec![Type::Int], Type::Unit)),
    ("print_bool", Type::function(vec![Type::Bool], Type::Unit)),
    ("read_int", Type::function(vec![], Type::Int)),
  ]
}

/// Every reserved name with its function type.
///
/// Equality is listed with `Int` operands; the checker accepts any pair of
/// equal operand types for `==` and `!=` by its own rule.
pub fn root_types() -> Vec<(&'static str, Type)> {
  let int_int = || vec![Type::Int, Type::Int];
  let mut types = Vec::new();
  types.extend(ARITHMETIC.map(|op| (op, Type::function(int_int(), Type::Int))));
  types.extend(COMPARISON.map(|op| (op, Type::function(int_int(), Type::Bool))));
  types.extend(EQUALITY.map(|op| (op, Type::function(int_int(), Type::Bool))));
  types.extend(LOGICAL.map(|op| (op, Type::function(vec![Type::Bool, Type::Bool], Type::Bool))));
  types.push(("unary_-", Type::function(vec![Type::Int], Type::Int)));
  types.push(("unary_not", Type::function(vec![Type::Bool], Type::Bool)));
  types.extend(runtime_types());
  types
}

/// Whether `name` is expanded inline rather than called.
pub fn is_operator(name: &str) -> bool {
  ARITHMETIC.contains(&name)
    || COMPARISON.contains(&name)
    || EQUALITY.contains(&name)
    || LOGICAL.contains(&name)
    || name == "unary_-"
    || name == "unary_not"
}

/// Whether `name` never gets a stack slot.
pub fn is_reserved(name: &str) -> bool {
  is_operator(name) || RUNTIME_FUNCTIONS.contains(&name)
}

/// Emit the inline expansion of operator `op`, reading its operands from
/// `args` (memory references) and leaving the result in `%rax`.
pub fn emit_inline(op: &str, args: &[&str], asm: &mut String) -> CompileResult<()> {
  match (op, args) {
    ("unary_-", [operand]) => {
      asm.push_str(&format!("    movq {operand}, %rax\n"));
      asm.push_str("    negq %rax\n");
    }
    ("unary_not", [operand]) => {
      asm.push_str(&format!("    movq {operand}, %rax\n"));
      asm.push_str("    xorq $1, %rax\n");
    }
    (_, [lhs, rhs]) => emit_binary(op, lhs, rhs, asm)?,
    _ => {
      return Err(CompileError::internal(format!(
        "intrinsic '{op}' called with {} arguments",
        args.len()
      )));
    }
  }
  Ok(())
}

fn emit_binary(op: &str, lhs: &str, rhs: &str, asm: &mut String) -> CompileResult<()> {
  let set = match op {
    "+" | "-" | "*" | "and" | "or" => {
      let insn = match op {
        "+" => "addq",
        "-" => "subq",
        "*" => "imulq",
        "and" => "andq",
        _ => "orq",
      };
      asm.push_str(&format!("    movq {lhs}, %rax\n"));
      asm.push_str(&format!("    {insn} {rhs}, %rax\n"));
      return Ok(());
    }
    "/" | "%" => {
      asm.push_str(&format!("    movq {lhs}, %rax\n"));
      asm.push_str("    cqto\n");
      asm.push_str(&format!("    idivq {rhs}\n"));
      if op == "%" {
        asm.push_str("    movq %rdx, %rax\n");
      }
      return Ok(());
    }
    "==" => "sete",
    "!=" => "setne",
    "<" => "setl",
    "<=" => "setle",
    ">" => "setg",
    ">=" => "setge",
    _ => {
      return Err(CompileError::internal(format!(
        "no inline expansion for '{op}'"
      )));
    }
  };

  asm.push_str("    xorq %rax, %rax\n");
  asm.push_str(&format!("    movq {lhs}, %rdx\n"));
  asm.push_str(&format!("    cmpq {rhs}, %rdx\n"));
  asm.push_str(&format!("    {set} %al\n"));
  Ok(())
}
