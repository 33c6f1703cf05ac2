// Archivo: launcher.rs
// Propósito: `JobLauncher`, el controlador que crea la `JobExecution`,
// recorre el flujo de steps de forma secuencial y publica los eventos de
// ciclo de vida.
use crate::domain::{BatchStatus, ExitStatus, JobExecution, JobParameters, StepExecution};
use crate::errors::{BatchError, Result};
use crate::job::{FlowTarget, JobDefinition};
use crate::listener::{JobEventKind, JobExecutionEvent, JobExecutionListener, ListenerRegistry};
use crate::repository::JobRepository;
use crate::step::{Step, StepContext, StepOutcome, StopSignal};
use log::{error, info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Configuración del launcher.
#[derive(Debug, Clone)]
pub struct LauncherConfig {
    /// Tiempo máximo que se espera a cada listener por evento.
    pub listener_timeout: Duration,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self { listener_timeout: Duration::from_secs(5) }
    }
}

/// Ejecuta jobs sobre un `JobRepository`.
///
/// Modelo de ejecución: un hilo, síncrono. Un step termina antes de que
/// empiece el siguiente. Los fallos de steps no se devuelven como `Err`:
/// quedan reflejados en la `JobExecution` devuelta.
pub struct JobLauncher {
    repo: Arc<dyn JobRepository>,
    listeners: ListenerRegistry,
    /// Señales de parada de las ejecuciones en curso, por run id.
    running: Mutex<HashMap<i64, StopSignal>>,
}

impl JobLauncher {
    pub fn new(repo: Arc<dyn JobRepository>, config: LauncherConfig) -> Self {
        Self { repo,
               listeners: ListenerRegistry::new(config.listener_timeout),
               running: Mutex::new(HashMap::new()) }
    }

    /// Registra un listener. Se invocan en orden de registro.
    pub fn register_listener(&mut self, listener: Arc<dyn JobExecutionListener>) {
        self.listeners.register(listener);
    }

    pub fn repository(&self) -> Arc<dyn JobRepository> {
        Arc::clone(&self.repo)
    }

    fn running(&self) -> Result<MutexGuard<'_, HashMap<i64, StopSignal>>> {
        self.running.lock().map_err(|e| BatchError::Storage(format!("mutex poisoned: {:?}", e)))
    }

    /// Pide la parada de una ejecución en curso. Devuelve `false` si la
    /// ejecución no está corriendo en este launcher.
    pub fn stop(&self, execution_id: i64) -> Result<bool> {
        match self.running()?.get(&execution_id) {
            Some(signal) => {
                info!("job execution {}: parada solicitada", execution_id);
                signal.request();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Lanza una nueva ejecución de `(job, parameters)`.
    ///
    /// Devuelve `Conflict` si la última ejecución de la instancia sigue en
    /// curso. Cada llamada crea una `JobExecution` nueva con run id mayor
    /// que cualquier anterior; los steps se ejecutan siempre desde el
    /// principio.
    pub fn run(&self, job: &JobDefinition, parameters: JobParameters) -> Result<JobExecution> {
        let instance = self.repo.get_or_create_job_instance(job.name(), &parameters)?;
        if let Some(last) = self.repo.get_last_job_execution(instance.id)? {
            if last.is_running() {
                return Err(BatchError::Conflict(format!("job '{}': la ejecución {} de la instancia {} sigue en curso",
                                                        job.name(),
                                                        last.id,
                                                        instance.id)));
            }
        }
        let mut execution = self.repo.create_job_execution(&instance, &parameters)?;
        let signal = StopSignal::new();
        self.running()?.insert(execution.id, signal.clone());

        let result = self.drive(job, &mut execution, signal);

        self.running()?.remove(&execution.id);
        if let Err(e) = &result {
            // Una ejecución abandonada en STARTED bloquearía la instancia.
            if !execution.status.is_terminal() && execution.transition_to(BatchStatus::Failed).is_ok() {
                execution.exit_status = ExitStatus::failed().with_description(e.to_string());
                if let Err(update_err) = self.repo.update_job_execution(&execution) {
                    error!("job execution {}: no se pudo marcar FAILED: {}", execution.id, update_err);
                }
            }
        }
        result.map(|_| execution)
    }

    fn drive(&self, job: &JobDefinition, execution: &mut JobExecution, signal: StopSignal) -> Result<()> {
        execution.transition_to(BatchStatus::Started)?;
        self.repo.update_job_execution(execution)?;
        info!("job '{}': inicio de la ejecución {} (instancia {})",
              job.name(),
              execution.id,
              execution.job_instance_id);
        self.listeners.publish(&JobExecutionEvent::job(JobEventKind::JobStarted, execution));

        let ctx = StepContext::new(signal, Arc::clone(&self.repo));
        let mut current = job.first_step().to_string();
        let mut any_failed = false;
        let final_target = loop {
            let step_exec = match self.run_step(job, &current, execution, &ctx) {
                Ok(step_exec) => step_exec,
                Err(abort) => {
                    if !any_failed {
                        execution.failing_step = Some(current.clone());
                    }
                    execution.step_executions.extend(abort.step);
                    return Err(abort.error);
                }
            };
            if step_exec.status == BatchStatus::Failed && !any_failed {
                any_failed = true;
                execution.failing_step = Some(step_exec.step_name.clone());
                execution.exit_status = ExitStatus::failed().with_description(step_exec.exit_status.description.clone());
            }
            let target = job.next_target(&current, step_exec.status, &step_exec.exit_status);
            execution.step_executions.push(step_exec);
            match target {
                FlowTarget::Step(next) => current = next,
                other => break other,
            }
        };

        let (status, kind) = match final_target {
            FlowTarget::Stop => (BatchStatus::Stopped, JobEventKind::JobStopped),
            FlowTarget::Fail => (BatchStatus::Failed, JobEventKind::JobFailed),
            _ if any_failed => (BatchStatus::Failed, JobEventKind::JobFailed),
            _ => (BatchStatus::Completed, JobEventKind::JobCompleted),
        };
        execution.transition_to(status)?;
        match status {
            BatchStatus::Completed => execution.exit_status = ExitStatus::completed(),
            BatchStatus::Stopped => execution.exit_status = ExitStatus::stopped().with_description("parada solicitada"),
            _ if execution.failing_step.is_none() => {
                execution.exit_status = ExitStatus::failed().with_description("flujo terminado con fallo")
            }
            _ => {}
        }
        self.repo.update_job_execution(execution)?;
        match status {
            BatchStatus::Failed => error!("job '{}': ejecución {} FAILED: {}",
                                          job.name(),
                                          execution.id,
                                          execution.failure_message().unwrap_or_default()),
            _ => info!("job '{}': ejecución {} terminó {}", job.name(), execution.id, status),
        }
        self.listeners.publish(&JobExecutionEvent::job(kind, execution));
        Ok(())
    }

    /// Ejecuta un step y devuelve su `StepExecution` terminal. Sólo los
    /// errores del repositorio se propagan como `Err`; si el step llegó a
    /// crearse se deja FAILED antes de propagarlos.
    fn run_step(&self,
                job: &JobDefinition,
                name: &str,
                execution: &JobExecution,
                ctx: &StepContext)
                -> std::result::Result<StepExecution, StepAbort> {
        let step = job.step(name)
                      .ok_or_else(|| BatchError::Configuration(format!("job '{}': step '{}' no existe", job.name(), name)))
                      .map_err(StepAbort::before_start)?;
        let mut step_exec = self.repo
                                .create_step_execution(execution.id, name)
                                .map_err(StepAbort::before_start)?;
        match self.execute_step(step.as_ref(), execution, &mut step_exec, ctx) {
            Ok(()) => Ok(step_exec),
            Err(e) => {
                self.abandon_step(execution, &mut step_exec, &e);
                Err(StepAbort { error: e, step: Some(step_exec) })
            }
        }
    }

    fn execute_step(&self,
                    step: &dyn Step,
                    execution: &JobExecution,
                    step_exec: &mut StepExecution,
                    ctx: &StepContext)
                    -> Result<()> {
        let name = step.name();
        step_exec.transition_to(BatchStatus::Started)?;
        self.repo.update_step_execution(step_exec)?;
        self.listeners.publish(&JobExecutionEvent::step(JobEventKind::StepStarted, execution, step_exec));

        let kind = match step.execute(step_exec, ctx) {
            Ok(StepOutcome::Completed) => {
                step_exec.complete()?;
                info!("step '{}': COMPLETED (leídos={}, escritos={}, filtrados={}, commits={})",
                      name,
                      step_exec.read_count,
                      step_exec.write_count,
                      step_exec.filter_count,
                      step_exec.commit_count);
                JobEventKind::StepCompleted
            }
            Ok(StepOutcome::Stopped) => {
                step_exec.stop()?;
                warn!("step '{}': STOPPED tras {} commits", name, step_exec.commit_count);
                JobEventKind::StepStopped
            }
            Err(e) => {
                step_exec.fail(&e)?;
                error!("step '{}': FAILED: {}", name, e);
                JobEventKind::StepFailed
            }
        };
        self.repo.update_step_execution(step_exec)?;
        self.listeners.publish(&JobExecutionEvent::step(kind, execution, step_exec));
        Ok(())
    }

    /// Marca FAILED un step cuyo estado no pudo registrarse. En el
    /// repositorio sigue sin cerrar, así que se rehace la transición.
    fn abandon_step(&self, execution: &JobExecution, step_exec: &mut StepExecution, cause: &BatchError) {
        error!("step '{}': error del repositorio: {}", step_exec.step_name, cause);
        if step_exec.status != BatchStatus::Failed {
            if step_exec.status.is_terminal() {
                step_exec.status = BatchStatus::Started;
            }
            if let Err(e) = step_exec.fail(cause) {
                error!("step '{}': no se pudo marcar FAILED: {}", step_exec.step_name, e);
                return;
            }
        }
        if let Err(e) = self.repo.update_step_execution(step_exec) {
            error!("step execution {}: no se pudo registrar FAILED: {}", step_exec.id, e);
        }
        self.listeners.publish(&JobExecutionEvent::step(JobEventKind::StepFailed, execution, step_exec));
    }
}

/// Error de repositorio durante un step, con la ejecución del step si
/// llegó a crearse.
struct StepAbort {
    error: BatchError,
    step: Option<StepExecution>,
}

impl StepAbort {
    fn before_start(error: BatchError) -> Self {
        Self { error, step: None }
    }
}
