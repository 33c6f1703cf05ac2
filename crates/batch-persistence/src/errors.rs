// errors.rs
use batch::BatchError;
use people_domain::DomainError;
use thiserror::Error;

/// Errores internos de la capa Diesel. Se convierten en `BatchError` o
/// `DomainError` en el borde de cada trait.
#[derive(Debug, Error)]
pub enum PersistenceError {
  #[error("db: {0}")]
  Db(#[from] diesel::result::Error),
  #[error("pool: {0}")]
  Pool(#[from] r2d2::Error),
  #[error("migraciones: {0}")]
  Migration(String),
  #[error("mutex poisoned: {0}")]
  Poisoned(String),
  #[error(transparent)]
  Batch(#[from] BatchError),
  #[error(transparent)]
  Domain(#[from] DomainError),
}

impl From<PersistenceError> for BatchError {
  fn from(e: PersistenceError) -> Self {
    match e {
      PersistenceError::Batch(b) => b,
      other => BatchError::Storage(other.to_string()),
    }
  }
}

impl From<PersistenceError> for DomainError {
  fn from(e: PersistenceError) -> Self {
    match e {
      PersistenceError::Domain(d) => d,
      other => DomainError::ExternalError(other.to_string()),
    }
  }
}

pub type Result<T> = std::result::Result<T, PersistenceError>;
