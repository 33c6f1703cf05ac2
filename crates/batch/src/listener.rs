// Archivo: listener.rs
// Propósito: eventos de ciclo de vida y lista de observadores. Cada
// listener se invoca en orden de registro con un tiempo máximo de espera;
// sus errores se registran y nunca alteran el flujo del job.
use crate::domain::{JobExecution, StepExecution};
use crate::errors::Result;
use chrono::{DateTime, Utc};
use log::{error, warn};
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Tipo de transición notificada.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobEventKind {
    JobStarted,
    JobCompleted,
    JobFailed,
    JobStopped,
    StepStarted,
    StepCompleted,
    StepFailed,
    StepStopped,
}

/// Evento con una copia de sólo lectura del estado en el momento de la
/// transición.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobExecutionEvent {
    pub kind: JobEventKind,
    pub job_execution: JobExecution,
    pub step_execution: Option<StepExecution>,
    pub timestamp: DateTime<Utc>,
}

impl JobExecutionEvent {
    pub fn job(kind: JobEventKind, job_execution: &JobExecution) -> Self {
        Self { kind, job_execution: job_execution.clone(), step_execution: None, timestamp: Utc::now() }
    }

    pub fn step(kind: JobEventKind, job_execution: &JobExecution, step: &StepExecution) -> Self {
        Self { kind,
               job_execution: job_execution.clone(),
               step_execution: Some(step.clone()),
               timestamp: Utc::now() }
    }
}

/// Observador de ciclo de vida.
pub trait JobExecutionListener: Send + Sync {
    fn on_event(&self, event: &JobExecutionEvent) -> Result<()>;
}

impl<F> JobExecutionListener for F where F: Fn(&JobExecutionEvent) -> Result<()> + Send + Sync
{
    fn on_event(&self, event: &JobExecutionEvent) -> Result<()> {
        self(event)
    }
}

/// Lista ordenada de listeners con timeout por invocación.
pub struct ListenerRegistry {
    listeners: Vec<Arc<dyn JobExecutionListener>>,
    timeout: Duration,
}

impl ListenerRegistry {
    pub fn new(timeout: Duration) -> Self {
        Self { listeners: Vec::new(), timeout }
    }

    pub fn register(&mut self, listener: Arc<dyn JobExecutionListener>) {
        self.listeners.push(listener);
    }

    /// Entrega el evento a cada listener, esperando como mucho `timeout`
    /// por cada uno. Un listener que excede el plazo sigue en su hilo pero
    /// el orquestador continúa.
    pub fn publish(&self, event: &JobExecutionEvent) {
        if self.listeners.is_empty() {
            return;
        }
        let event = Arc::new(event.clone());
        for (idx, listener) in self.listeners.iter().enumerate() {
            let (tx, rx) = mpsc::channel();
            let listener = Arc::clone(listener);
            let ev = Arc::clone(&event);
            let spawned = thread::Builder::new().name(format!("batch-listener-{}", idx))
                                                .spawn(move || {
                                                    let res = listener.on_event(&ev);
                                                    let _ = tx.send(res);
                                                });
            if let Err(e) = spawned {
                error!("listener #{}: no se pudo lanzar el hilo: {}", idx, e);
                continue;
            }
            match rx.recv_timeout(self.timeout) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("listener #{} falló en {:?}: {}", idx, event.kind, e),
                Err(RecvTimeoutError::Timeout) => {
                    warn!("listener #{} excedió el timeout de {:?} en {:?}", idx, self.timeout, event.kind)
                }
                Err(RecvTimeoutError::Disconnected) => error!("listener #{} abortó (panic) en {:?}", idx, event.kind),
            }
        }
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}
