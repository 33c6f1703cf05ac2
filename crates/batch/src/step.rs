// Archivo: step.rs
// Propósito: el trait `Step`, el step orientado a chunks (`ChunkStep`) y su
// builder, más el contexto que el launcher entrega a cada step.
use crate::chunk::{ChunkOrchestrator, ChunkOutcome};
use crate::domain::StepExecution;
use crate::errors::{BatchError, Result};
use crate::item::{ItemProcessor, ItemReader, ItemWriter, PassThroughItemProcessor, ResourcelessTransactionManager,
                  TransactionManager};
use crate::repository::JobRepository;
use log::info;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Señal de parada compartida. Se consulta sólo en fronteras de chunk.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    requested: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

/// Contexto de ejecución de un step: señal de parada y repositorio donde se
/// registran los checkpoints tras cada commit.
pub struct StepContext {
    stop: StopSignal,
    repository: Arc<dyn JobRepository>,
}

impl StepContext {
    pub fn new(stop: StopSignal, repository: Arc<dyn JobRepository>) -> Self {
        Self { stop, repository }
    }

    pub fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }

    /// Persiste los contadores actuales de la ejecución.
    pub fn checkpoint(&self, execution: &StepExecution) -> Result<()> {
        self.repository.update_step_execution(execution)
    }
}

/// Resultado de un step que no falló.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Completed,
    Stopped,
}

/// Unidad de ejecución con nombre dentro de un job.
///
/// `execute` actualiza los contadores de `execution`; las transiciones de
/// estado las realiza el launcher según el resultado.
pub trait Step: Send + Sync {
    fn name(&self) -> &str;

    fn execute(&self, execution: &mut StepExecution, ctx: &StepContext) -> Result<StepOutcome>;
}

/// Step orientado a chunks: Source → Transformer → Sink.
pub struct ChunkStep<I, O> {
    name: String,
    chunk_size: usize,
    reader: Mutex<Box<dyn ItemReader<I>>>,
    processor: Box<dyn ItemProcessor<I, O>>,
    writer: Mutex<Box<dyn ItemWriter<O>>>,
    transaction_manager: Arc<dyn TransactionManager>,
}

impl<I, O> Step for ChunkStep<I, O> {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, execution: &mut StepExecution, ctx: &StepContext) -> Result<StepOutcome> {
        let mut reader = self.reader
                             .lock()
                             .map_err(|e| BatchError::Storage(format!("mutex poisoned: {:?}", e)))?;
        let mut writer = self.writer
                             .lock()
                             .map_err(|e| BatchError::Storage(format!("mutex poisoned: {:?}", e)))?;
        info!("step '{}': inicio (chunk size {})", self.name, self.chunk_size);
        let mut orchestrator = ChunkOrchestrator::new(reader.as_mut(),
                                                      self.processor.as_ref(),
                                                      writer.as_mut(),
                                                      self.transaction_manager.as_ref(),
                                                      self.chunk_size);
        match orchestrator.run(execution, ctx)? {
            ChunkOutcome::Exhausted => Ok(StepOutcome::Completed),
            ChunkOutcome::Stopped => Ok(StepOutcome::Stopped),
        }
    }
}

/// Punto de entrada del builder: `StepBuilder::new("csv-to-db").chunk(10)`.
pub struct StepBuilder {
    name: String,
}

impl StepBuilder {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string() }
    }

    /// Inicia un step orientado a chunks. Sin `processor` el step usa un
    /// transformer identidad.
    pub fn chunk<T: 'static>(self, chunk_size: usize) -> ChunkStepBuilder<T, T> {
        ChunkStepBuilder { name: self.name,
                           chunk_size,
                           reader: None,
                           processor: Box::new(PassThroughItemProcessor::new()),
                           writer: None,
                           transaction_manager: None }
    }
}

/// Builder tipado de `ChunkStep`. Llamar a `processor` cambia el tipo de
/// salida, por lo que el writer debe configurarse después.
pub struct ChunkStepBuilder<I, O> {
    name: String,
    chunk_size: usize,
    reader: Option<Box<dyn ItemReader<I>>>,
    processor: Box<dyn ItemProcessor<I, O>>,
    writer: Option<Box<dyn ItemWriter<O>>>,
    transaction_manager: Option<Arc<dyn TransactionManager>>,
}

impl<I: 'static, O: 'static> ChunkStepBuilder<I, O> {
    pub fn reader<R>(mut self, reader: R) -> Self
        where R: ItemReader<I> + 'static
    {
        self.reader = Some(Box::new(reader));
        self
    }

    pub fn processor<P, O2>(self, processor: P) -> ChunkStepBuilder<I, O2>
        where P: ItemProcessor<I, O2> + 'static
    {
        ChunkStepBuilder { name: self.name,
                           chunk_size: self.chunk_size,
                           reader: self.reader,
                           processor: Box::new(processor),
                           writer: None,
                           transaction_manager: self.transaction_manager }
    }

    pub fn writer<W>(mut self, writer: W) -> Self
        where W: ItemWriter<O> + 'static
    {
        self.writer = Some(Box::new(writer));
        self
    }

    pub fn transaction_manager(mut self, tm: Arc<dyn TransactionManager>) -> Self {
        self.transaction_manager = Some(tm);
        self
    }

    /// Valida y construye el step. Errores de configuración se devuelven
    /// antes de cualquier ejecución.
    pub fn build(self) -> Result<ChunkStep<I, O>> {
        if self.name.trim().is_empty() {
            return Err(BatchError::Configuration("el step necesita un nombre".into()));
        }
        if self.chunk_size == 0 {
            return Err(BatchError::Configuration(format!("step '{}': chunk size debe ser positivo", self.name)));
        }
        let reader = self.reader
                         .ok_or_else(|| BatchError::Configuration(format!("step '{}': falta el reader", self.name)))?;
        let writer = self.writer
                         .ok_or_else(|| BatchError::Configuration(format!("step '{}': falta el writer", self.name)))?;
        Ok(ChunkStep { name: self.name,
                       chunk_size: self.chunk_size,
                       reader: Mutex::new(reader),
                       processor: self.processor,
                       writer: Mutex::new(writer),
                       transaction_manager: self.transaction_manager
                                                .unwrap_or_else(|| Arc::new(ResourcelessTransactionManager)) })
    }
}
