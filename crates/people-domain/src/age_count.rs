// age_count.rs
use serde::{Deserialize, Serialize};
use std::fmt;

/// Número de personas con una misma edad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgeCount {
  pub age: i32,
  pub count: i64,
}

impl AgeCount {
  pub fn new(age: i32, count: i64) -> Self {
    Self { age, count }
  }

  /// Campos de la línea de salida `age,count`.
  pub fn to_fields(&self) -> Vec<String> {
    vec![self.age.to_string(), self.count.to_string()]
  }
}

impl fmt::Display for AgeCount {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{},{}", self.age, self.count)
  }
}
