use std::env;
use std::fs;
use std::io::{self, Read, Write};
use std::process;

use blockc::{CompileError, Emit};
use snafu::{IntoError, OptionExt, ResultExt, Snafu};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: blockc [--emit=tokens|ast|ir|asm] [--output=FILE] [INPUT]";

#[derive(Debug, Snafu)]
enum CliError {
  #[snafu(display("{USAGE}\n{message}"))]
  Usage { message: String },

  #[snafu(display("cannot read {path}: {source}"))]
  ReadSource { path: String, source: io::Error },

  #[snafu(display("cannot write {path}: {source}"))]
  WriteOutput { path: String, source: io::Error },

  #[snafu(display("{rendered}"))]
  Compile {
    rendered: String,
    source: CompileError,
  },
}

#[derive(Debug, Default)]
struct Options {
  emit: Emit,
  output: Option<String>,
  input: Option<String>,
}

fn parse_args(args: &[String]) -> Result<Options, CliError> {
  let mut options = Options::default();
  for arg in args {
    if let Some(name) = arg.strip_prefix("--emit=") {
      options.emit = Emit::from_name(name).with_context(|| UsageSnafu {
        message: format!("unknown emit kind '{name}'"),
      })?;
    } else if let Some(path) = arg.strip_prefix("--output=") {
      options.output = Some(path.to_string());
    } else if arg.starts_with("--") {
      return UsageSnafu {
        message: format!("unknown option '{arg}'"),
      }
      .fail();
    } else if options.input.is_some() {
      return UsageSnafu {
        message: "only one input file can be given",
      }
      .fail();
    } else {
      options.input = Some(arg.clone());
    }
  }
  Ok(options)
}

fn run(args: &[String]) -> Result<(), CliError> {
  let options = parse_args(args)?;

  let (name, source) = match &options.input {
    Some(path) => {
      let source = fs::read_to_string(path).context(ReadSourceSnafu { path })?;
      (path.as_str(), source)
    }
    None => {
      let mut source = String::new();
      io::stdin()
        .read_to_string(&mut source)
        .context(ReadSourceSnafu { path: "<stdin>" })?;
      ("<stdin>", source)
    }
  };

  let output = blockc::compile_with(&source, name, options.emit).map_err(|err| {
    let rendered = err.render(&source);
    CompileSnafu { rendered }.into_error(err)
  })?;

  match &options.output {
    Some(path) => fs::write(path, &output).context(WriteOutputSnafu { path })?,
    None => io::stdout()
      .write_all(output.as_bytes())
      .context(WriteOutputSnafu { path: "<stdout>" })?,
  }
  Ok(())
}

fn main() {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(io::stderr)
    .init();

  let args: Vec<String> = env::args().skip(1).collect();
  if let Err(err) = run(&args) {
    eprintln!("{err}");
    process::exit(1);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|arg| arg.to_string()).collect()
  }

  #[test]
  fn defaults_to_assembly_on_stdio() {
    let options = parse_args(&[]).unwrap();
    assert_eq!(options.emit, Emit::Asm);
    assert!(options.input.is_none());
    assert!(options.output.is_none());
  }

  #[test]
  fn flags_and_input() {
    let options = parse_args(&args(&["--emit=ir", "prog.src", "--output=out.s"])).unwrap();
    assert_eq!(options.emit, Emit::Ir);
    assert_eq!(options.input.as_deref(), Some("prog.src"));
    assert_eq!(options.output.as_deref(), Some("out.s"));
  }

  #[test]
  fn usage_errors() {
    let cases: [&[&str]; 3] = [&["--emit=exe"], &["--verbose"], &["a.src", "b.src"]];
    for bad in cases {
      let err = parse_args(&args(bad)).unwrap_err();
      assert!(matches!(err, CliError::Usage { .. }), "{bad:?}");
      assert!(err.to_string().starts_with(USAGE));
    }
  }
}
