// errors.rs
use thiserror::Error;

/// Errores del dominio de personas.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
  /// Campo obligatorio vacío o con un valor no admitido.
  #[error("persona inválida: campo '{field}': {reason}")]
  InvalidField { field: &'static str, reason: String },
  /// Edad que no cabe en la tabla de personas.
  #[error("edad {age} fuera de rango (0..={max}) para '{name}'")]
  AgeOutOfRange { name: String, age: i32, max: i32 },
  /// Fallo del almacenamiento subyacente.
  #[error("Error externo: {0}")]
  ExternalError(String),
  #[error("Error de serialización: {0}")]
  SerializationError(String),
}

impl From<serde_json::Error> for DomainError {
  fn from(e: serde_json::Error) -> Self {
    Self::SerializationError(e.to_string())
  }
}
