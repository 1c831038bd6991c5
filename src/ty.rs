use std::fmt;

/// Static types. Equality is structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
  Int,
  Bool,
  Unit,
  Function { params: Vec<Type>, result: Box<Type> },
}

impl Type {
  pub fn function(params: Vec<Type>, result: Type) -> Self {
    Self::Function {
      params,
      result: Box::new(result),
    }
  }

  /// Resolve one of the builtin basic type names.
  pub fn basic(name: &str) -> Option<Self> {
    match name {
      "Int" => Some(Self::Int),
      "Bool" => Some(Self::Bool),
      "Unit" => Some(Self::Unit),
      _ => None,
    }
  }

  pub fn is_function(&self) -> bool {
    matches!(self, Self::Function { .. })
  }
}

impl fmt::Display for Type {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Int => f.write_str("Int"),
      Self::Bool => f.write_str("Bool"),
      Self::Unit => f.write_str("Unit"),
      Self::Function { params, result } => {
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

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn function_types_compare_structurally() {
    let a = Type::function(vec![Type::Int, Type::Bool], Type::Unit);
    let b = Type::function(vec![Type::Int, Type::Bool], Type::Unit);
    assert_eq!(a, b);
    assert_ne!(a, Type::function(vec![Type::Int], Type::Unit));
    assert_eq!(a.to_string(), "(Int, Bool) => Unit");
    assert_eq!(Type::function(vec![], Type::Int).to_string(), "() => Int");
  }

  #[test]
  fn basic_names() {
    assert_eq!(Type::basic("Bool"), Some(Type::Bool));
    assert_eq!(Type::basic("bool"), None);
  }
}
