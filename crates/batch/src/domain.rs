// Archivo: domain.rs
// Propósito: tipos de dominio del motor: parámetros, instancias y
// ejecuciones de jobs/steps, junto con la máquina de estados `BatchStatus`.
use crate::errors::{BatchError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Estado de una ejecución de job o step.
///
/// STARTING → STARTED → {COMPLETED, FAILED, STOPPED}. Los tres últimos son
/// terminales.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    Starting,
    Started,
    Completed,
    Failed,
    Stopped,
}

impl BatchStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BatchStatus::Completed | BatchStatus::Failed | BatchStatus::Stopped)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, BatchStatus::Starting | BatchStatus::Started)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Starting => "STARTING",
            BatchStatus::Started => "STARTED",
            BatchStatus::Completed => "COMPLETED",
            BatchStatus::Failed => "FAILED",
            BatchStatus::Stopped => "STOPPED",
        }
    }

    /// Valida una transición. Sólo se avanza hacia delante y nunca se sale
    /// de un estado terminal.
    pub fn can_transition_to(&self, next: BatchStatus) -> bool {
        match (self, next) {
            (BatchStatus::Starting, BatchStatus::Started) => true,
            (BatchStatus::Starting, n) | (BatchStatus::Started, n) => n.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BatchStatus {
    type Err = BatchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "STARTING" => Ok(BatchStatus::Starting),
            "STARTED" => Ok(BatchStatus::Started),
            "COMPLETED" => Ok(BatchStatus::Completed),
            "FAILED" => Ok(BatchStatus::Failed),
            "STOPPED" => Ok(BatchStatus::Stopped),
            other => Err(BatchError::Storage(format!("estado desconocido: {}", other))),
        }
    }
}

/// Código de salida + descripción. El código es lo que evalúan las reglas
/// de flujo condicionales.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitStatus {
    pub code: String,
    pub description: String,
}

impl ExitStatus {
    pub const UNKNOWN: &'static str = "UNKNOWN";
    pub const EXECUTING: &'static str = "EXECUTING";
    pub const COMPLETED: &'static str = "COMPLETED";
    pub const NOOP: &'static str = "NOOP";
    pub const FAILED: &'static str = "FAILED";
    pub const STOPPED: &'static str = "STOPPED";

    pub fn new(code: &str) -> Self {
        Self { code: code.to_string(), description: String::new() }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn unknown() -> Self {
        Self::new(Self::UNKNOWN)
    }
    pub fn executing() -> Self {
        Self::new(Self::EXECUTING)
    }
    pub fn completed() -> Self {
        Self::new(Self::COMPLETED)
    }
    pub fn noop() -> Self {
        Self::new(Self::NOOP)
    }
    pub fn failed() -> Self {
        Self::new(Self::FAILED)
    }
    pub fn stopped() -> Self {
        Self::new(Self::STOPPED)
    }
}

impl Default for ExitStatus {
    fn default() -> Self {
        Self::unknown()
    }
}

/// Valor de un parámetro de job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum JobParameter {
    String(String),
    Long(i64),
    Date(DateTime<Utc>),
}

impl fmt::Display for JobParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobParameter::String(s) => write!(f, "{}", s),
            JobParameter::Long(n) => write!(f, "{}", n),
            JobParameter::Date(d) => write!(f, "{}", d.to_rfc3339()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobParameterEntry {
    pub value: JobParameter,
    pub identifying: bool,
}

/// Parámetros de ejecución. Los identificativos forman parte de la
/// identidad de la `JobInstance`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobParameters {
    entries: BTreeMap<String, JobParameterEntry>,
}

impl JobParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: JobParameter, identifying: bool) -> Self {
        self.insert(key, value, identifying);
        self
    }

    pub fn with_string(self, key: &str, value: impl Into<String>) -> Self {
        self.with(key, JobParameter::String(value.into()), true)
    }

    pub fn with_long(self, key: &str, value: i64) -> Self {
        self.with(key, JobParameter::Long(value), true)
    }

    pub fn with_date(self, key: &str, value: DateTime<Utc>) -> Self {
        self.with(key, JobParameter::Date(value), true)
    }

    pub fn insert(&mut self, key: &str, value: JobParameter, identifying: bool) {
        self.entries.insert(key.to_string(), JobParameterEntry { value, identifying });
    }

    pub fn get(&self, key: &str) -> Option<&JobParameter> {
        self.entries.get(key).map(|e| &e.value)
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        match self.get(key) {
            Some(JobParameter::String(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn get_long(&self, key: &str) -> Option<i64> {
        match self.get(key) {
            Some(JobParameter::Long(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &JobParameterEntry)> {
        self.entries.iter()
    }

    /// Clave estable de la instancia: hash blake3 de los parámetros
    /// identificativos en orden lexicográfico. Cada clave y valor va
    /// precedido de su longitud y el valor lleva una marca de tipo.
    pub fn job_key(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for (k, e) in self.entries.iter().filter(|(_, e)| e.identifying) {
            let (tag, value) = match &e.value {
                JobParameter::String(s) => (b's', s.clone()),
                JobParameter::Long(n) => (b'l', n.to_string()),
                JobParameter::Date(d) => (b'd', d.to_rfc3339()),
            };
            hasher.update(&(k.len() as u64).to_le_bytes());
            hasher.update(k.as_bytes());
            hasher.update(&[tag]);
            hasher.update(&(value.len() as u64).to_le_bytes());
            hasher.update(value.as_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}

/// Identidad lógica de una ejecución: (nombre del job, parámetros).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobInstance {
    pub id: i64,
    pub job_name: String,
    pub job_key: String,
    pub parameters: JobParameters,
    pub created_at: DateTime<Utc>,
}

/// Un intento físico de ejecutar una `JobInstance`. El `id` es el run id:
/// estrictamente creciente dentro de un repositorio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobExecution {
    pub id: i64,
    pub job_instance_id: i64,
    pub job_name: String,
    pub parameters: JobParameters,
    pub status: BatchStatus,
    pub exit_status: ExitStatus,
    /// Nombre del step que provocó el fallo, si lo hubo.
    pub failing_step: Option<String>,
    pub created_at: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub step_executions: Vec<StepExecution>,
}

impl JobExecution {
    pub fn new(id: i64, instance: &JobInstance, parameters: JobParameters) -> Self {
        Self { id,
               job_instance_id: instance.id,
               job_name: instance.job_name.clone(),
               parameters,
               status: BatchStatus::Starting,
               exit_status: ExitStatus::unknown(),
               failing_step: None,
               created_at: Utc::now(),
               start_time: None,
               end_time: None,
               step_executions: Vec::new() }
    }

    /// Aplica una transición de estado. Una ejecución terminal es inmutable.
    pub fn transition_to(&mut self, next: BatchStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(BatchError::Conflict(format!("job execution {}: transición inválida {} -> {}",
                                                    self.id, self.status, next)));
        }
        match next {
            BatchStatus::Started => {
                self.start_time = Some(Utc::now());
                self.exit_status = ExitStatus::executing();
            }
            s if s.is_terminal() => self.end_time = Some(Utc::now()),
            _ => {}
        }
        self.status = next;
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.status.is_running()
    }

    pub fn step_execution(&self, step_name: &str) -> Option<&StepExecution> {
        self.step_executions.iter().find(|s| s.step_name == step_name)
    }

    /// Mensaje de fallo visible para el usuario: step + causa.
    pub fn failure_message(&self) -> Option<String> {
        self.failing_step
            .as_ref()
            .map(|step| format!("step '{}' falló: {}", step, self.exit_status.description))
    }
}

/// Ejecución de un step dentro de una `JobExecution`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepExecution {
    pub id: i64,
    pub job_execution_id: i64,
    pub step_name: String,
    pub status: BatchStatus,
    pub read_count: u64,
    pub write_count: u64,
    /// Items descartados por el transformer.
    pub filter_count: u64,
    /// Siempre 0 sin política de skip; se persiste para futuras extensiones.
    pub skip_count: u64,
    pub commit_count: u64,
    pub rollback_count: u64,
    pub exit_status: ExitStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl StepExecution {
    pub fn new(id: i64, job_execution_id: i64, step_name: &str) -> Self {
        Self { id,
               job_execution_id,
               step_name: step_name.to_string(),
               status: BatchStatus::Starting,
               read_count: 0,
               write_count: 0,
               filter_count: 0,
               skip_count: 0,
               commit_count: 0,
               rollback_count: 0,
               exit_status: ExitStatus::unknown(),
               start_time: None,
               end_time: None }
    }

    pub fn transition_to(&mut self, next: BatchStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(BatchError::Conflict(format!("step '{}': transición inválida {} -> {}",
                                                    self.step_name, self.status, next)));
        }
        match next {
            BatchStatus::Started => {
                self.start_time = Some(Utc::now());
                self.exit_status = ExitStatus::executing();
            }
            s if s.is_terminal() => self.end_time = Some(Utc::now()),
            _ => {}
        }
        self.status = next;
        Ok(())
    }

    /// Cierra el step como COMPLETED (o NOOP si no leyó nada).
    pub fn complete(&mut self) -> Result<()> {
        self.transition_to(BatchStatus::Completed)?;
        self.exit_status = if self.read_count == 0 { ExitStatus::noop() } else { ExitStatus::completed() };
        Ok(())
    }

    /// Cierra el step como FAILED con el mensaje del error.
    pub fn fail(&mut self, error: &BatchError) -> Result<()> {
        self.transition_to(BatchStatus::Failed)?;
        self.exit_status = ExitStatus::failed().with_description(error.to_string());
        Ok(())
    }

    pub fn stop(&mut self) -> Result<()> {
        self.transition_to(BatchStatus::Stopped)?;
        self.exit_status = ExitStatus::stopped().with_description("parada solicitada");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_do_not_transition() {
        let mut se = StepExecution::new(1, 1, "s");
        se.transition_to(BatchStatus::Started).unwrap();
        se.complete().unwrap();
        assert!(se.transition_to(BatchStatus::Failed).is_err());
        assert!(se.transition_to(BatchStatus::Started).is_err());
        assert_eq!(se.status, BatchStatus::Completed);
    }

    #[test]
    fn job_key_ignores_non_identifying_parameters() {
        let a = JobParameters::new().with_string("input", "in.csv");
        let b = JobParameters::new().with_string("input", "in.csv")
                                    .with("launched.by", JobParameter::String("cli".into()), false);
        let c = JobParameters::new().with_string("input", "other.csv");
        assert_eq!(a.job_key(), b.job_key());
        assert_ne!(a.job_key(), c.job_key());
    }

    #[test]
    fn parameters_roundtrip_through_json() {
        let p = JobParameters::new().with_string("input", "a.csv").with_long("run.id", 3);
        let back = JobParameters::from_json(&p.to_json().unwrap()).unwrap();
        assert_eq!(back.get_long("run.id"), Some(3));
        assert_eq!(back.get_string("input"), Some("a.csv"));
    }

    #[test]
    fn empty_completed_step_reports_noop() {
        let mut se = StepExecution::new(1, 1, "s");
        se.transition_to(BatchStatus::Started).unwrap();
        se.complete().unwrap();
        assert_eq!(se.exit_status.code, ExitStatus::NOOP);
    }
}
