//! Stack slot assignment. Every non-reserved IR variable gets its own
//! 8-byte slot below `%rbp`, in first-seen order. Nothing is reused.

use std::collections::{HashMap, HashSet};

use crate::error::{CompileError, CompileResult};
use crate::intrinsics::is_reserved;
use crate::ir::{Instruction, IrVar};

/// Distinct non-reserved variables in order of first appearance.
pub fn collect_variables(instructions: &[Instruction]) -> Vec<IrVar> {
  let mut seen = HashSet::new();
  let mut ordered = Vec::new();
  for insn in instructions {
    for var in insn.variables() {
      if !is_reserved(var.name()) && seen.insert(var) {
        ordered.push(var.clone());
      }
    }
  }
  ordered
}

#[derive(Debug)]
pub struct Locals {
  refs: HashMap<IrVar, String>,
  stack_used: usize,
}

impl Locals {
  pub fn new(variables: &[IrVar]) -> Self {
    let mut refs = HashMap::with_capacity(variables.len());
    for (i, var) in variables.iter().enumerate() {
      refs.insert(var.clone(), format!("-{}(%rbp)", (i + 1) * 8));
    }
    Self {
      refs,
      stack_used: variables.len() * 8,
    }
  }

  /// Memory operand of `var`'s slot, e.g. `-16(%rbp)`.
  pub fn get_ref(&self, var: &IrVar) -> CompileResult<&str> {
    self
      .find(var)
      .ok_or_else(|| CompileError::internal(format!("IR variable '{var}' has no stack slot")))
  }

  /// Like `get_ref`, for variables that may legitimately be absent.
  pub fn find(&self, var: &IrVar) -> Option<&str> {
    self.refs.get(var).map(String::as_str)
  }

  /// Bytes reserved for the frame.
  pub fn stack_used(&self) -> usize {
    self.stack_used
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ir::InstructionKind;
  use crate::tokenizer::SourceLocation;

  fn insn(kind: InstructionKind) -> Instruction {
    Instruction::new(SourceLocation::new("test", 1, 1), kind)
  }

  #[test]
  fn slots_follow_first_appearance() {
    let x = |n: &str| IrVar::new(n);
    let program = [
      insn(InstructionKind::LoadIntConst {
        value: 1,
        dest: x("x1"),
      }),
      insn(InstructionKind::Call {
        fun: x("+"),
        args: vec![x("x1"), x("x1")],
        dest: x("x2"),
      }),
      insn(InstructionKind::Call {
        fun: x("print_int"),
        args: vec![x("x2")],
        dest: x("x3"),
      }),
    ];
    let vars = collect_variables(&program);
    assert_eq!(vars, [x("x1"), x("x2"), x("x3")]);

    let locals = Locals::new(&vars);
    assert_eq!(locals.stack_used(), 24);
    assert_eq!(locals.get_ref(&x("x1")), Ok("-8(%rbp)"));
    assert_eq!(locals.get_ref(&x("x3")), Ok("-24(%rbp)"));
  }

  #[test]
  fn reserved_names_get_no_slot() {
    let program = [insn(InstructionKind::Copy {
      source: IrVar::new("print_bool"),
      dest: IrVar::new("x1"),
    })];
    assert_eq!(collect_variables(&program), [IrVar::new("x1")]);
  }

  #[test]
  fn repeated_variables_keep_first_position() {
    let program: Vec<Instruction> = (0..200)
      .map(|i| {
        insn(InstructionKind::Copy {
          source: IrVar::new(format!("x{}", i % 3)),
          dest: IrVar::new(format!("x{}", (i + 1) % 3)),
        })
      })
      .collect();
    let names: Vec<String> = collect_variables(&program)
      .iter()
      .map(|var| var.name().to_string())
      .collect();
    assert_eq!(names, ["x0", "x1", "x2"]);
  }

  #[test]
  fn missing_variable_is_internal() {
    let locals = Locals::new(&[]);
    assert_eq!(locals.stack_used(), 0);
    assert!(matches!(
      locals.get_ref(&IrVar::new("x9")),
      Err(CompileError::Internal { .. })
    ));
  }
}
