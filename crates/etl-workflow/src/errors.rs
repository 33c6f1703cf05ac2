use thiserror::Error;

// Errores del workflow ETL.
//
// Agrupa los fallos de las capas inferiores (motor batch, persistencia,
// dominio) y los de configuración detectados antes de lanzar el job.
#[derive(Error, Debug)]
pub enum WorkflowError {
  /// Errores del motor batch (construcción del job, repositorio, ...).
  #[error("Error batch: {0}")]
  Batch(#[from] batch::BatchError),

  #[error("Error de persistencia: {0}")]
  Persistence(#[from] batch_persistence::PersistenceError),

  #[error("Error de dominio: {0}")]
  Domain(#[from] people_domain::DomainError),

  /// Valor de configuración ausente o inválido.
  #[error("Error de configuración: {0}")]
  Configuration(String),

  #[error("Error de serializacion: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, WorkflowError>;
