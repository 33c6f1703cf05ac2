// person.rs
use crate::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Edad máxima admitida por la tabla de personas.
pub const MAX_AGE: i32 = 150;

/// Registro de una persona tal como llega del fichero de entrada.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Person {
  name: String,
  age: i32,
  email: String,
}

impl Person {
  /// Valida y normaliza (recorta espacios) los campos.
  pub fn new(name: &str, age: i32, email: &str) -> Result<Self, DomainError> {
    let name = name.trim();
    let email = email.trim();
    if name.is_empty() {
      return Err(DomainError::InvalidField { field: "name", reason: "vacío".to_string() });
    }
    if age < 0 {
      return Err(DomainError::InvalidField { field: "age", reason: format!("negativa ({})", age) });
    }
    if email.is_empty() {
      return Err(DomainError::InvalidField { field: "email", reason: "vacío".to_string() });
    }
    Ok(Self { name: name.to_string(), age, email: email.to_string() })
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn age(&self) -> i32 {
    self.age
  }

  pub fn email(&self) -> &str {
    &self.email
  }

  /// `true` si la edad cabe en la restricción de la tabla (0..=150).
  pub fn has_storable_age(&self) -> bool {
    self.age <= MAX_AGE
  }
}

impl fmt::Display for Person {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Person(name={}, age={}, email={})", self.name, self.age, self.email)
  }
}
