// Archivo: errors.rs
// Propósito: definir los errores del motor batch y el alias Result<T> usado
// por las APIs del crate.
use thiserror::Error;

/// Registro de entrada mal formado.
///
/// Conserva la línea (1-based) y el texto crudo del registro para que el
/// mensaje final de la ejecución permita localizar el problema.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("registro mal formado en la línea {line}: {cause} (registro: '{raw}')")]
pub struct ParseError {
    pub line: u64,
    pub raw: String,
    pub cause: String,
}

/// Fallo del sink o de la transacción al escribir un chunk completo.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("fallo al escribir un chunk de {chunk_size} items: {cause}")]
pub struct WriteError {
    pub chunk_size: usize,
    pub cause: String,
}

/// Errores comunes del motor batch.
///
/// - `Parse`, `Transform` y `Write` abortan únicamente el step en curso.
/// - `Configuration` se detecta al construir el job, antes de ejecutar.
/// - `NotFound`, `Conflict` y `Storage` provienen del repositorio de jobs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// Fallo de la lógica de transformación de un item.
    #[error("Error de transformación: {0}")]
    Transform(String),
    #[error(transparent)]
    Write(#[from] WriteError),
    /// Fallo al abrir/leer/cerrar el origen que no es un registro mal formado.
    #[error("Error de lectura: {0}")]
    Read(String),
    /// Chunk size inválido, parámetro requerido ausente o flujo imposible.
    #[error("Error de configuración: {0}")]
    Configuration(String),
    /// Entidad no encontrada (instancia, ejecución, job).
    #[error("No encontrado: {0}")]
    NotFound(String),
    /// Conflicto de estado (ejecución ya en curso, estado terminal).
    #[error("Conflicto: {0}")]
    Conflict(String),
    /// Error genérico de almacenamiento (BD, mutex envenenado, etc.).
    #[error("Error de almacenamiento: {0}")]
    Storage(String),
}

impl BatchError {
    /// Envuelve cualquier error como fallo de escritura de un chunk de
    /// `chunk_size` items. Un `Write` ya tipado se conserva tal cual.
    pub fn into_write_error(self, chunk_size: usize) -> BatchError {
        match self {
            BatchError::Write(e) => BatchError::Write(e),
            other => BatchError::Write(WriteError { chunk_size, cause: other.to_string() }),
        }
    }

    /// Igual que `into_write_error` pero para la fase de transformación.
    pub fn into_transform_error(self) -> BatchError {
        match self {
            BatchError::Transform(m) => BatchError::Transform(m),
            other => BatchError::Transform(other.to_string()),
        }
    }
}

impl From<csv::Error> for BatchError {
    fn from(e: csv::Error) -> Self {
        BatchError::Read(e.to_string())
    }
}

impl From<std::io::Error> for BatchError {
    fn from(e: std::io::Error) -> Self {
        BatchError::Read(e.to_string())
    }
}

impl From<serde_json::Error> for BatchError {
    fn from(e: serde_json::Error) -> Self {
        BatchError::Storage(format!("serialización: {}", e))
    }
}

/// Alias de resultado usado por las APIs del crate.
pub type Result<T> = std::result::Result<T, BatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_error_keeps_original_cause() {
        let err = BatchError::Storage("disk full".into()).into_write_error(3);
        match err {
            BatchError::Write(w) => {
                assert_eq!(w.chunk_size, 3);
                assert!(w.cause.contains("disk full"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn parse_error_message_mentions_line_and_raw_record() {
        let err: BatchError = ParseError { line: 4, raw: "bob,x".into(), cause: "edad inválida".into() }.into();
        let msg = err.to_string();
        assert!(msg.contains("línea 4"));
        assert!(msg.contains("bob,x"));
    }
}
