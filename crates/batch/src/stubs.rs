// Archivo: stubs.rs
// Propósito: implementaciones en memoria para pruebas y wiring rápido.
//
// Incluye un repositorio de jobs en memoria (`InMemoryJobRepository`), un
// reader sobre un `Vec` y un writer que sólo publica los chunks confirmados.
// No son durables; se usan en demos y pruebas locales.
use crate::domain::{JobExecution, JobInstance, JobParameters, StepExecution};
use crate::errors::{BatchError, Result};
use crate::item::{ItemReader, ItemWriter, TransactionManager};
use crate::repository::JobRepository;
use chrono::Utc;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct RepoState {
    instances: BTreeMap<i64, JobInstance>,
    executions: BTreeMap<i64, JobExecution>,
    steps: BTreeMap<i64, StepExecution>,
    next_instance_id: i64,
    next_execution_id: i64,
    next_step_id: i64,
}

/// Repositorio de jobs en memoria (no durable).
#[derive(Default)]
pub struct InMemoryJobRepository {
    state: Mutex<RepoState>,
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Helper para mapear `Mutex::lock()` en un `Result` con
    /// `BatchError::Storage`.
    fn lock(&self) -> Result<MutexGuard<'_, RepoState>> {
        self.state.lock().map_err(|e| BatchError::Storage(format!("mutex poisoned: {:?}", e)))
    }

    fn with_steps(state: &RepoState, execution: &JobExecution) -> JobExecution {
        let mut out = execution.clone();
        out.step_executions = state.steps
                                   .values()
                                   .filter(|s| s.job_execution_id == execution.id)
                                   .cloned()
                                   .collect();
        out
    }
}

impl JobRepository for InMemoryJobRepository {
    fn get_or_create_job_instance(&self, job_name: &str, parameters: &JobParameters) -> Result<JobInstance> {
        let key = parameters.job_key();
        let mut state = self.lock()?;
        if let Some(existing) = state.instances.values().find(|i| i.job_name == job_name && i.job_key == key) {
            return Ok(existing.clone());
        }
        state.next_instance_id += 1;
        let instance = JobInstance { id: state.next_instance_id,
                                     job_name: job_name.to_string(),
                                     job_key: key,
                                     parameters: parameters.clone(),
                                     created_at: Utc::now() };
        state.instances.insert(instance.id, instance.clone());
        Ok(instance)
    }

    fn find_job_instance(&self, job_name: &str, parameters: &JobParameters) -> Result<Option<JobInstance>> {
        let key = parameters.job_key();
        let state = self.lock()?;
        Ok(state.instances
                .values()
                .find(|i| i.job_name == job_name && i.job_key == key)
                .cloned())
    }

    fn create_job_execution(&self, instance: &JobInstance, parameters: &JobParameters) -> Result<JobExecution> {
        let mut state = self.lock()?;
        if !state.instances.contains_key(&instance.id) {
            return Err(BatchError::NotFound(format!("job instance {}", instance.id)));
        }
        state.next_execution_id += 1;
        let execution = JobExecution::new(state.next_execution_id, instance, parameters.clone());
        state.executions.insert(execution.id, execution.clone());
        Ok(execution)
    }

    fn update_job_execution(&self, execution: &JobExecution) -> Result<()> {
        let mut state = self.lock()?;
        let stored = state.executions
                          .get_mut(&execution.id)
                          .ok_or_else(|| BatchError::NotFound(format!("job execution {}", execution.id)))?;
        if stored.status.is_terminal() {
            return Err(BatchError::Conflict(format!("job execution {} ya terminó en {}", stored.id, stored.status)));
        }
        let mut copy = execution.clone();
        copy.step_executions.clear();
        *stored = copy;
        Ok(())
    }

    fn create_step_execution(&self, job_execution_id: i64, step_name: &str) -> Result<StepExecution> {
        let mut state = self.lock()?;
        if !state.executions.contains_key(&job_execution_id) {
            return Err(BatchError::NotFound(format!("job execution {}", job_execution_id)));
        }
        state.next_step_id += 1;
        let step = StepExecution::new(state.next_step_id, job_execution_id, step_name);
        state.steps.insert(step.id, step.clone());
        Ok(step)
    }

    fn update_step_execution(&self, step: &StepExecution) -> Result<()> {
        let mut state = self.lock()?;
        let stored = state.steps
                          .get_mut(&step.id)
                          .ok_or_else(|| BatchError::NotFound(format!("step execution {}", step.id)))?;
        if stored.status.is_terminal() {
            return Err(BatchError::Conflict(format!("step execution {} ya terminó en {}", stored.id, stored.status)));
        }
        *stored = step.clone();
        Ok(())
    }

    fn get_job_execution(&self, execution_id: i64) -> Result<JobExecution> {
        let state = self.lock()?;
        let execution = state.executions
                             .get(&execution_id)
                             .ok_or_else(|| BatchError::NotFound(format!("job execution {}", execution_id)))?;
        Ok(Self::with_steps(&state, execution))
    }

    fn get_last_job_execution(&self, job_instance_id: i64) -> Result<Option<JobExecution>> {
        let state = self.lock()?;
        Ok(state.executions
                .values()
                .filter(|e| e.job_instance_id == job_instance_id)
                .max_by_key(|e| e.id)
                .map(|e| Self::with_steps(&state, e)))
    }

    fn list_job_instances(&self, job_name: &str) -> Result<Vec<JobInstance>> {
        let state = self.lock()?;
        Ok(state.instances.values().filter(|i| i.job_name == job_name).cloned().collect())
    }

    fn list_job_executions(&self, job_name: &str) -> Result<Vec<JobExecution>> {
        let state = self.lock()?;
        Ok(state.executions
                .values()
                .filter(|e| e.job_name == job_name)
                .map(|e| Self::with_steps(&state, e))
                .collect())
    }
}

/// Reader sobre una lista de items. Cuenta cuántas veces se abrió y cerró.
pub struct InMemoryItemReader<T> {
    source: Vec<T>,
    pending: VecDeque<T>,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl<T: Clone> InMemoryItemReader<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self { source: items,
               pending: VecDeque::new(),
               opened: Arc::new(AtomicUsize::new(0)),
               closed: Arc::new(AtomicUsize::new(0)) }
    }

    pub fn open_count(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.opened)
    }

    pub fn close_count(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.closed)
    }
}

impl<T: Clone + Send> ItemReader<T> for InMemoryItemReader<T> {
    /// Cada apertura reinicia el recorrido: un relanzamiento relee todo.
    fn open(&mut self) -> Result<()> {
        self.pending = self.source.iter().cloned().collect();
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn read(&mut self) -> Result<Option<T>> {
        Ok(self.pending.pop_front())
    }

    fn close(&mut self) -> Result<()> {
        self.pending.clear();
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Writer en memoria. Los items de un chunk quedan pendientes hasta
/// `after_commit`; `after_rollback` los descarta. Con `fail_on_chunk(k)`
/// el k-ésimo `write` (1-based) falla tras dejar el chunk pendiente.
pub struct InMemoryItemWriter<T> {
    committed: Arc<Mutex<Vec<T>>>,
    chunks: Arc<Mutex<Vec<usize>>>,
    pending: Vec<T>,
    writes: usize,
    fail_on_chunk: Option<usize>,
}

impl<T: Clone> InMemoryItemWriter<T> {
    pub fn new() -> Self {
        Self { committed: Arc::new(Mutex::new(Vec::new())),
               chunks: Arc::new(Mutex::new(Vec::new())),
               pending: Vec::new(),
               writes: 0,
               fail_on_chunk: None }
    }

    pub fn fail_on_chunk(mut self, chunk: usize) -> Self {
        self.fail_on_chunk = Some(chunk);
        self
    }

    /// Vista compartida de los items confirmados.
    pub fn committed(&self) -> Arc<Mutex<Vec<T>>> {
        Arc::clone(&self.committed)
    }

    /// Tamaño de cada chunk confirmado, en orden.
    pub fn committed_chunks(&self) -> Arc<Mutex<Vec<usize>>> {
        Arc::clone(&self.chunks)
    }
}

impl<T: Clone> Default for InMemoryItemWriter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send> ItemWriter<T> for InMemoryItemWriter<T> {
    fn write(&mut self, items: &[T]) -> Result<()> {
        self.writes += 1;
        self.pending.extend(items.iter().cloned());
        if self.fail_on_chunk == Some(self.writes) {
            return Err(BatchError::Storage(format!("fallo simulado en el chunk {}", self.writes)));
        }
        Ok(())
    }

    fn after_commit(&mut self) -> Result<()> {
        let mut committed = self.committed
                                .lock()
                                .map_err(|e| BatchError::Storage(format!("mutex poisoned: {:?}", e)))?;
        let mut chunks = self.chunks
                             .lock()
                             .map_err(|e| BatchError::Storage(format!("mutex poisoned: {:?}", e)))?;
        chunks.push(self.pending.len());
        committed.append(&mut self.pending);
        Ok(())
    }

    fn after_rollback(&mut self) {
        self.pending.clear();
    }
}

/// Gestor de transacciones que sólo cuenta begin/commit/rollback.
#[derive(Debug, Default)]
pub struct CountingTransactionManager {
    pub begins: AtomicUsize,
    pub commits: AtomicUsize,
    pub rollbacks: AtomicUsize,
}

impl CountingTransactionManager {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TransactionManager for CountingTransactionManager {
    fn begin(&self) -> Result<()> {
        self.begins.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        self.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
