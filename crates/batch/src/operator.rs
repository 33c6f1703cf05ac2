// Archivo: operator.rs
// Propósito: `JobOperator`, capa de alto nivel que registra definiciones de
// jobs por nombre y expone arrancar, relanzar, parar y consultar
// ejecuciones. Pensada para ser invocada desde la CLI o desde workers.
use crate::domain::{JobExecution, JobParameters};
use crate::errors::{BatchError, Result};
use crate::job::JobDefinition;
use crate::launcher::JobLauncher;
use crate::repository::JobRepository;
use indexmap::IndexMap;
use log::info;
use std::sync::Arc;

pub struct JobOperator {
    launcher: Arc<JobLauncher>,
    repo: Arc<dyn JobRepository>,
    jobs: IndexMap<String, Arc<JobDefinition>>,
}

impl JobOperator {
    pub fn new(launcher: Arc<JobLauncher>) -> Self {
        let repo = launcher.repository();
        Self { launcher, repo, jobs: IndexMap::new() }
    }

    /// Registra una definición. Un nombre repetido es un error de
    /// configuración.
    pub fn register(&mut self, job: JobDefinition) -> Result<()> {
        let name = job.name().to_string();
        if self.jobs.contains_key(&name) {
            return Err(BatchError::Configuration(format!("job '{}' ya registrado", name)));
        }
        self.jobs.insert(name, Arc::new(job));
        Ok(())
    }

    pub fn job_names(&self) -> Vec<&str> {
        self.jobs.keys().map(|s| s.as_str()).collect()
    }

    fn job(&self, name: &str) -> Result<Arc<JobDefinition>> {
        self.jobs
            .get(name)
            .cloned()
            .ok_or_else(|| BatchError::NotFound(format!("job '{}'", name)))
    }

    /// Lanza el job con los parámetros dados.
    pub fn start(&self, job_name: &str, parameters: JobParameters) -> Result<JobExecution> {
        let job = self.job(job_name)?;
        self.launcher.run(&job, parameters)
    }

    /// Lanza una instancia nueva usando el incrementador del job sobre los
    /// parámetros de la última instancia conocida.
    pub fn start_next_instance(&self, job_name: &str) -> Result<JobExecution> {
        let job = self.job(job_name)?;
        let incrementer = job.incrementer().ok_or_else(|| {
                                               BatchError::Configuration(format!("job '{}' no tiene incrementador",
                                                                                 job_name))
                                           })?;
        let previous = self.repo.list_job_instances(job_name)?.pop().map(|i| i.parameters);
        let params = incrementer.next(previous.as_ref());
        self.launcher.run(&job, params)
    }

    /// Relanza la instancia de una ejecución previa con sus mismos
    /// parámetros. La nueva ejecución empieza todos los steps desde cero.
    pub fn restart(&self, execution_id: i64) -> Result<JobExecution> {
        let previous = self.repo.get_job_execution(execution_id)?;
        if previous.is_running() {
            return Err(BatchError::Conflict(format!("la ejecución {} sigue en curso", execution_id)));
        }
        let job = self.job(&previous.job_name)?;
        info!("job '{}': relanzando la instancia {} (ejecución previa {} en {})",
              previous.job_name,
              previous.job_instance_id,
              previous.id,
              previous.status);
        self.launcher.run(&job, previous.parameters)
    }

    pub fn stop(&self, execution_id: i64) -> Result<bool> {
        self.launcher.stop(execution_id)
    }

    /// Estado actual de una ejecución, con sus steps.
    pub fn summary(&self, execution_id: i64) -> Result<JobExecution> {
        self.repo.get_job_execution(execution_id)
    }

    pub fn executions(&self, job_name: &str) -> Result<Vec<JobExecution>> {
        self.repo.list_job_executions(job_name)
    }
}
