use crate::errors::{Result, WorkflowError};
use batch::JobParameters;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Variables de entorno reconocidas y la clave de configuración a la que
/// se traducen. `BATCH_DB_URL` tiene prioridad sobre `DATABASE_URL`.
const ENV_KEYS: [(&str, &str); 6] = [("BATCH_INPUT", "input"),
                                     ("BATCH_OUTPUT", "output"),
                                     ("BATCH_CHUNK_SIZE", "chunk.size"),
                                     ("DATABASE_URL", "database.url"),
                                     ("BATCH_DB_URL", "database.url"),
                                     ("BATCH_LISTENER_TIMEOUT_MS", "listener.timeout.ms")];

/// Configuración del job ETL.
///
/// Se resuelve una sola vez antes de lanzar el job, en este orden:
/// valores por defecto, entorno (incluido `.env`) y pares `clave=valor`
/// explícitos. Sin `database_url` se usa una base en memoria.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EtlConfig {
  pub input: PathBuf,
  pub output: PathBuf,
  pub chunk_size: usize,
  pub database_url: Option<String>,
  pub listener_timeout_ms: u64,
}

impl Default for EtlConfig {
  fn default() -> Self {
    Self { input: PathBuf::from("in.csv"),
           output: PathBuf::from("out.csv"),
           chunk_size: 10,
           database_url: None,
           listener_timeout_ms: 5_000 }
  }
}

impl EtlConfig {
  /// Defaults + variables de entorno (cargando `.env` si existe).
  pub fn from_env() -> Result<Self> {
    dotenvy::dotenv().ok();
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  /// Igual que `from_env` pero con una fuente de variables arbitraria.
  pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where F: Fn(&str) -> Option<String>
  {
    let mut config = Self::default();
    for (var, key) in ENV_KEYS {
      if let Some(value) = lookup(var).filter(|v| !v.trim().is_empty()) {
        config.set(key, &value)
              .map_err(|e| WorkflowError::Configuration(format!("{}: {}", var, e)))?;
      }
    }
    Ok(config)
  }

  /// Asigna una clave. Admite también los nombres de propiedad
  /// `dailyFile` (entrada) y `chunkSize`.
  pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
    let value = value.trim();
    match key.trim() {
      "input" | "dailyFile" => self.input = PathBuf::from(value),
      "output" => self.output = PathBuf::from(value),
      "chunk.size" | "chunk_size" | "chunkSize" => {
        self.chunk_size = value.parse().map_err(|_| invalid("chunk.size", value))?;
      }
      "database.url" | "db.url" => {
        self.database_url = if value.is_empty() { None } else { Some(value.to_string()) };
      }
      "listener.timeout.ms" => {
        self.listener_timeout_ms = value.parse().map_err(|_| invalid("listener.timeout.ms", value))?;
      }
      other => return Err(WorkflowError::Configuration(format!("clave desconocida '{}'", other))),
    }
    Ok(())
  }

  /// Aplica pares `clave=valor` (los argumentos libres de la CLI).
  pub fn apply_pairs<I, S>(&mut self, pairs: I) -> Result<()>
    where I: IntoIterator<Item = S>,
          S: AsRef<str>
  {
    for pair in pairs {
      let pair = pair.as_ref();
      let (key, value) = pair.split_once('=')
                             .ok_or_else(|| {
                               WorkflowError::Configuration(format!("se esperaba clave=valor, no '{}'", pair))
                             })?;
      self.set(key, value)?;
    }
    Ok(())
  }

  pub fn validate(&self) -> Result<()> {
    if self.chunk_size == 0 {
      return Err(invalid("chunk.size", "0"));
    }
    if self.input.as_os_str().is_empty() {
      return Err(WorkflowError::Configuration("falta el fichero de entrada".into()));
    }
    if self.output.as_os_str().is_empty() {
      return Err(WorkflowError::Configuration("falta el fichero de salida".into()));
    }
    if self.listener_timeout_ms == 0 {
      return Err(invalid("listener.timeout.ms", "0"));
    }
    Ok(())
  }

  pub fn listener_timeout(&self) -> Duration {
    Duration::from_millis(self.listener_timeout_ms)
  }

  /// Entrada, salida y chunk size identifican la instancia.
  pub fn to_job_parameters(&self) -> JobParameters {
    JobParameters::new().with_string("input", self.input.to_string_lossy())
                        .with_string("output", self.output.to_string_lossy())
                        .with_long("chunk.size", self.chunk_size as i64)
  }

  pub fn to_json(&self) -> Result<String> {
    Ok(serde_json::to_string(self)?)
  }
}

fn invalid(key: &str, value: &str) -> WorkflowError {
  WorkflowError::Configuration(format!("valor inválido para {}: '{}'", key, value))
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;

  #[test]
  fn environment_overrides_defaults() {
    let env: HashMap<&str, &str> = [("BATCH_INPUT", "people.csv"),
                                    ("BATCH_CHUNK_SIZE", "25"),
                                    ("DATABASE_URL", "fallback.db"),
                                    ("BATCH_DB_URL", "batch.db")].into_iter()
                                                                 .collect();
    let config = EtlConfig::from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap();
    assert_eq!(config.input, PathBuf::from("people.csv"));
    assert_eq!(config.output, PathBuf::from("out.csv"));
    assert_eq!(config.chunk_size, 25);
    assert_eq!(config.database_url.as_deref(), Some("batch.db"));
  }

  #[test]
  fn bad_values_are_configuration_errors() {
    let err = EtlConfig::from_lookup(|k| (k == "BATCH_CHUNK_SIZE").then(|| "ten".to_string())).unwrap_err();
    assert!(matches!(err, WorkflowError::Configuration(ref m) if m.contains("BATCH_CHUNK_SIZE")));

    let mut config = EtlConfig::default();
    assert!(config.apply_pairs(["nokey"]).is_err());
    assert!(config.apply_pairs(["colour=blue"]).is_err());
    config.apply_pairs(["chunk.size=0"]).unwrap();
    assert!(config.validate().is_err());
  }

  #[test]
  fn pairs_and_parameters() {
    let mut config = EtlConfig::default();
    config.apply_pairs(["dailyFile=/tmp/in.csv", "output = /tmp/out.csv", "chunkSize=3"]).unwrap();
    config.validate().unwrap();
    let params = config.to_job_parameters();
    assert_eq!(params.get_string("input"), Some("/tmp/in.csv"));
    assert_eq!(params.get_long("chunk.size"), Some(3));

    assert_eq!(params.job_key(), config.clone().to_job_parameters().job_key());
    let mut other = config.clone();
    other.chunk_size = 50;
    assert_ne!(params.job_key(), other.to_job_parameters().job_key());
  }
}
