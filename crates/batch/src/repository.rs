// Archivo: repository.rs
// Propósito: definir el trait `JobRepository`, contrato de persistencia del
// estado de jobs y steps (memoria, SQLite, ...).
use crate::domain::{JobExecution, JobInstance, JobParameters, StepExecution};
use crate::errors::Result;

/// Contrato del repositorio de metadatos batch.
///
/// Los ids de `JobExecution` (run ids) deben ser estrictamente crecientes
/// dentro de un mismo repositorio. Una ejecución almacenada en estado
/// terminal no admite más actualizaciones.
pub trait JobRepository: Send + Sync {
    /// Devuelve la instancia (nombre, parámetros identificativos) o la crea.
    fn get_or_create_job_instance(&self, job_name: &str, parameters: &JobParameters) -> Result<JobInstance>;

    /// Busca una instancia existente sin crearla.
    fn find_job_instance(&self, job_name: &str, parameters: &JobParameters) -> Result<Option<JobInstance>>;

    /// Crea una nueva ejecución STARTING con el siguiente run id.
    fn create_job_execution(&self, instance: &JobInstance, parameters: &JobParameters) -> Result<JobExecution>;

    /// Persiste estado, exit status y timestamps de la ejecución. Devuelve
    /// `Conflict` si la versión almacenada ya es terminal.
    fn update_job_execution(&self, execution: &JobExecution) -> Result<()>;

    /// Crea una `StepExecution` STARTING asociada a la ejecución.
    fn create_step_execution(&self, job_execution_id: i64, step_name: &str) -> Result<StepExecution>;

    /// Persiste contadores y estado del step (checkpoint).
    fn update_step_execution(&self, step: &StepExecution) -> Result<()>;

    /// Obtiene una ejecución con sus steps, o `NotFound`.
    fn get_job_execution(&self, execution_id: i64) -> Result<JobExecution>;

    /// Última ejecución (mayor run id) de una instancia, si existe.
    fn get_last_job_execution(&self, job_instance_id: i64) -> Result<Option<JobExecution>>;

    /// Instancias de un job, en orden de creación.
    fn list_job_instances(&self, job_name: &str) -> Result<Vec<JobInstance>>;

    /// Ejecuciones de un job, ordenadas por run id.
    fn list_job_executions(&self, job_name: &str) -> Result<Vec<JobExecution>>;
}
