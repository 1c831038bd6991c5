//! Crate root: wires together the compilation pipeline.
//!
//! - `tokenizer` performs lexical analysis and produces a flat token stream.
//! - `parser` owns all syntactic knowledge and returns the program as a block.
//! - `typechecker` fills in the type of every node against the `intrinsics`.
//! - `ir_generator` flattens the typed tree into `ir` instructions.
//! - `codegen` assigns stack slots via `locals` and emits x86-64 AT&T assembly.
//! - `error` centralises reporting utilities shared by the other modules.

pub mod ast;
pub mod codegen;
pub mod error;
pub mod intrinsics;
pub mod ir;
pub mod ir_generator;
pub mod locals;
pub mod parser;
pub mod symtab;
pub mod tokenizer;
pub mod ty;
pub mod typechecker;

use tracing::debug;

pub use error::{CompileError, CompileResult};

/// Which stage's output `compile_with` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Emit {
  /// One token per line with its location and kind.
  Tokens,
  /// The type-checked tree, fully parenthesized.
  Ast,
  /// One IR instruction per line.
  Ir,
  #[default]
  Asm,
}

impl Emit {
  pub fn from_name(name: &str) -> Option<Self> {
    match name {
      "tokens" => Some(Self::Tokens),
      "ast" => Some(Self::Ast),
      "ir" => Some(Self::Ir),
      "asm" => Some(Self::Asm),
      _ => None,
    }
  }
}

/// Parse and type check `source`, returning the annotated tree and its type.
pub fn check(source: &str, name: &str) -> CompileResult<(ast::Expr, ty::Type)> {
  let tokens = tokenizer::tokenize(source, name);
  let mut program = parser::parse(tokens)?;
  let root = intrinsics::runtime_types().into_iter().collect();
  let ty = typechecker::typecheck(&mut program, root)?;
  Ok((program, ty))
}

/// Lower `source` to IR.
pub fn lower(source: &str, name: &str) -> CompileResult<Vec<ir::Instruction>> {
  let (program, _) = check(source, name)?;
  ir_generator::generate_ir(&intrinsics::root_types(), &program)
}

/// Compile a source string into AT&T assembly.
pub fn compile(source: &str, name: &str) -> CompileResult<String> {
  compile_with(source, name, Emit::Asm)
}

pub fn compile_with(source: &str, name: &str, emit: Emit) -> CompileResult<String> {
  debug!(name, ?emit, bytes = source.len(), "compiling");
  match emit {
    Emit::Tokens => {
      let mut out = String::new();
      for token in tokenizer::tokenize(source, name) {
        out.push_str(&format!("{}\t{:?}\t{}\n", token.loc, token.kind, token.text));
      }
      Ok(out)
    }
    Emit::Ast => {
      let (program, ty) = check(source, name)?;
      Ok(format!("{program}\n: {ty}\n"))
    }
    Emit::Ir => Ok(ir::dump(&lower(source, name)?)),
    Emit::Asm => codegen::generate(&lower(source, name)?),
  }
}
