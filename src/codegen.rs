//! Code generation: translate IR into AT&T x86-64 assembly.
//!
//! Every IR variable lives in its own stack slot addressed relative to
//! `%rbp`, and all transfers pass through `%rax`. Control flow is already
//! explicit in the IR, so emission is a linear walk over the instructions.

use std::collections::HashSet;

use tracing::debug;

use crate::error::CompileResult;
use crate::intrinsics::{emit_inline, is_operator};
use crate::ir::{Instruction, InstructionKind, IrVar, UNIT};
use crate::locals::{Locals, collect_variables};

const ARG_REGISTERS: [&str; 6] = ["%rdi", "%rsi", "%rdx", "%rcx", "%r8", "%r9"];

/// Values that fit a sign-extended 32-bit immediate.
const IMM32: std::ops::RangeInclusive<i64> = i32::MIN as i64..=i32::MAX as i64;

/// Emit a complete `main` for the instruction list.
pub fn generate(instructions: &[Instruction]) -> CompileResult<String> {
  let locals = Locals::new(&collect_variables(instructions));
  let mut asm = String::new();

  for name in external_functions(instructions) {
    asm.push_str(&format!(".extern {name}\n"));
  }
  asm.push_str(".global main\n");
  asm.push_str(".type main, @function\n");
  asm.push('\n');
  asm.push_str(".section .text\n");
  asm.push('\n');
  asm.push_str("main:\n");
  asm.push_str("    pushq %rbp\n");
  asm.push_str("    movq %rsp, %rbp\n");
  if locals.stack_used() > 0 {
    asm.push_str(&format!("    subq ${}, %rsp\n", locals.stack_used()));
  }
  if let Some(unit) = locals.find(&IrVar::new(UNIT)) {
    asm.push_str(&format!("    movq $0, {unit}\n"));
  }

  for insn in instructions {
    asm.push_str(&format!("    # {insn}\n"));
    emit_instruction(insn, &locals, &mut asm)?;
  }

  asm.push_str("\n    movq $0, %rax\n");
  asm.push_str("    movq %rbp, %rsp\n");
  asm.push_str("    popq %rbp\n");
  asm.push_str("    ret\n");

  debug!(
    instructions = instructions.len(),
    frame = locals.stack_used(),
    bytes = asm.len(),
    "generated assembly"
  );
  Ok(asm)
}

/// Callees that are not expanded inline, in order of first call.
fn external_functions(instructions: &[Instruction]) -> Vec<&str> {
  let mut seen = HashSet::new();
  let mut names = Vec::new();
  for insn in instructions {
    if let InstructionKind::Call { fun, .. } = &insn.kind
      && !is_operator(fun.name())
      && seen.insert(fun.name())
    {
      names.push(fun.name());
    }
  }
  names
}

fn emit_instruction(insn: &Instruction, locals: &Locals, asm: &mut String) -> CompileResult<()> {
  match &insn.kind {
    InstructionKind::Label(name) => {
      asm.push_str(&format!("\n.{name}:\n"));
    }
    InstructionKind::Jump(label) => {
      asm.push_str(&format!("    jmp .{label}\n"));
    }
    InstructionKind::LoadIntConst { value, dest } => {
      let dest = locals.get_ref(dest)?;
      if IMM32.contains(value) {
        asm.push_str(&format!("    movq ${value}, {dest}\n"));
      } else {
        // movabsq can only target a register.
        asm.push_str(&format!("    movabsq ${value}, %rax\n"));
        asm.push_str(&format!("    movq %rax, {dest}\n"));
      }
    }
    InstructionKind::LoadBoolConst { value, dest } => {
      let dest = locals.get_ref(dest)?;
      asm.push_str(&format!("    movq ${}, {dest}\n", u8::from(*value)));
    }
    InstructionKind::Copy { source, dest } => {
      asm.push_str(&format!("    movq {}, %rax\n", locals.get_ref(source)?));
      asm.push_str(&format!("    movq %rax, {}\n", locals.get_ref(dest)?));
    }
    InstructionKind::CondJump {
      cond,
      then_label,
      else_label,
    } => {
      asm.push_str(&format!("    cmpq $0, {}\n", locals.get_ref(cond)?));
      asm.push_str(&format!("    jne .{then_label}\n"));
      asm.push_str(&format!("    jmp .{else_label}\n"));
    }
    InstructionKind::Call { fun, args, dest } => {
      if is_operator(fun.name()) {
        let refs = args
          .iter()
          .map(|arg| locals.get_ref(arg))
          .collect::<CompileResult<Vec<_>>>()?;
        emit_inline(fun.name(), &refs, asm)?;
      } else {
        emit_call(fun, args, locals, asm)?;
      }
      asm.push_str(&format!("    movq %rax, {}\n", locals.get_ref(dest)?));
    }
  }
  Ok(())
}

/// System V call: six register arguments, the rest pushed right to left,
/// `%rsp` 16-byte aligned at the `callq`.
fn emit_call(fun: &IrVar, args: &[IrVar], locals: &Locals, asm: &mut String) -> CompileResult<()> {
  let stack_args = args.get(ARG_REGISTERS.len()..).unwrap_or(&[]);
  let padding = if (locals.stack_used() + 8 * stack_args.len()) % 16 != 0 {
    8
  } else {
    0
  };

  if padding > 0 {
    asm.push_str(&format!("    subq ${padding}, %rsp\n"));
  }
  for arg in stack_args.iter().rev() {
    asm.push_str(&format!("    pushq {}\n", locals.get_ref(arg)?));
  }
  for (arg, reg) in args.iter().zip(ARG_REGISTERS) {
    asm.push_str(&format!("    movq {}, {reg}\n", locals.get_ref(arg)?));
  }
  asm.push_str(&format!("    callq {fun}\n"));

  let reclaimed = padding + 8 * stack_args.len();
  if reclaimed > 0 {
    asm.push_str(&format!("    addq ${reclaimed}, %rsp\n"));
  }
  Ok(())
}
