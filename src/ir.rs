//! Flat intermediate representation between the typed tree and assembly.

use std::fmt;

use crate::tokenizer::SourceLocation;

/// Name of the variable standing for every unit value.
pub const UNIT: &str = "unit";

/// A named temporary. Operators and runtime functions are also referred to
/// through variables carrying their reserved names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IrVar(String);

impl IrVar {
  pub fn new(name: impl Into<String>) -> Self {
    Self(name.into())
  }

  pub fn name(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for IrVar {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
  pub loc: SourceLocation,
  pub kind: InstructionKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstructionKind {
  LoadIntConst { value: i64, dest: IrVar },
  LoadBoolConst { value: bool, dest: IrVar },
  Copy { source: IrVar, dest: IrVar },
  Call { fun: IrVar, args: Vec<IrVar>, dest: IrVar },
  Label(String),
  Jump(String),
  CondJump { cond: IrVar, then_label: String, else_label: String },
}

impl Instruction {
  pub fn new(loc: SourceLocation, kind: InstructionKind) -> Self {
    Self { loc, kind }
  }

  /// Every variable the instruction reads or writes, in operand order.
  /// The callee of a `Call` is not included.
  pub fn variables(&self) -> Vec<&IrVar> {
    match &self.kind {
      InstructionKind::LoadIntConst { dest, .. } | InstructionKind::LoadBoolConst { dest, .. } => {
        vec![dest]
      }
      InstructionKind::Copy { source, dest } => vec![source, dest],
      InstructionKind::Call { args, dest, .. } => args.iter().chain([dest]).collect(),
      InstructionKind::CondJump { cond, .. } => vec![cond],
      InstructionKind::Label(_) | InstructionKind::Jump(_) => Vec::new(),
    }
  }
}

impl fmt::Display for Instruction {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.kind {
      InstructionKind::LoadIntConst { value, dest } => write!(f, "LoadIntConst({value}, {dest})"),
      InstructionKind::LoadBoolConst { value, dest } => {
        write!(f, "LoadBoolConst({value}, {dest})")
      }
      InstructionKind::Copy { source, dest } => write!(f, "Copy({source}, {dest})"),
      InstructionKind::Call { fun, args, dest } => {
        write!(f, "Call({fun}, [")?;
        for (i, arg) in args.iter().enumerate() {
          if i > 0 {
            f.write_str(", ")?;
          }
          write!(f, "{arg}")?;
        }
        write!(f, "], {dest})")
      }
      InstructionKind::Label(name) => write!(f, "Label({name})"),
      InstructionKind::Jump(label) => write!(f, "Jump({label})"),
      InstructionKind::CondJump {
        cond,
        then_label,
        else_label,
      } => write!(f, "CondJump({cond}, {then_label}, {else_label})"),
    }
  }
}

/// One instruction per line.
pub fn dump(instructions: &[Instruction]) -> String {
  let mut out = String::new();
  for insn in instructions {
    out.push_str(&insn.to_string());
    out.push('\n');
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  fn at() -> SourceLocation {
    SourceLocation::new("test", 1, 1)
  }

  #[test]
  fn display_formats() {
    let x1 = IrVar::new("x1");
    let x2 = IrVar::new("x2");
    let cases = [
      (
        InstructionKind::LoadIntConst {
          value: -3,
          dest: x1.clone(),
        },
        "LoadIntConst(-3, x1)",
      ),
      (
        InstructionKind::LoadBoolConst {
          value: true,
          dest: x1.clone(),
        },
        "LoadBoolConst(true, x1)",
      ),
      (
        InstructionKind::Copy {
          source: x1.clone(),
          dest: x2.clone(),
        },
        "Copy(x1, x2)",
      ),
      (
        InstructionKind::Call {
          fun: IrVar::new("+"),
          args: vec![x1.clone(), x2.clone()],
          dest: IrVar::new("x3"),
        },
        "Call(+, [x1, x2], x3)",
      ),
      (
        InstructionKind::Call {
          fun: IrVar::new("read_int"),
          args: vec![],
          dest: x1.clone(),
        },
        "Call(read_int, [], x1)",
      ),
      (InstructionKind::Label("L1".into()), "Label(L1)"),
      (InstructionKind::Jump("L2".into()), "Jump(L2)"),
      (
        InstructionKind::CondJump {
          cond: x1,
          then_label: "L1".into(),
          else_label: "L2".into(),
        },
        "CondJump(x1, L1, L2)",
      ),
    ];
    for (kind, expected) in cases {
      assert_eq!(Instruction::new(at(), kind).to_string(), expected);
    }
  }

  #[test]
  fn variables_skip_callee() {
    let insn = Instruction::new(
      at(),
      InstructionKind::Call {
        fun: IrVar::new("print_int"),
        args: vec![IrVar::new("x1")],
        dest: IrVar::new("x2"),
      },
    );
    let names: Vec<&str> = insn.variables().into_iter().map(IrVar::name).collect();
    assert_eq!(names, ["x1", "x2"]);
  }

  #[test]
  fn dump_is_line_per_instruction() {
    let insns = [
      Instruction::new(at(), InstructionKind::Label("L1".into())),
      Instruction::new(at(), InstructionKind::Jump("L1".into())),
    ];
    assert_eq!(dump(&insns), "Label(L1)\nJump(L1)\n");
  }
}
