// Archivo: chunk.rs
// Propósito: el orquestador de chunks. Lee items hasta completar un chunk o
// agotar el origen, los transforma, los escribe dentro de una transacción y
// registra el progreso en la `StepExecution`.
use crate::domain::StepExecution;
use crate::errors::{BatchError, Result};
use crate::item::{ItemProcessor, ItemReader, ItemWriter, TransactionManager};
use crate::step::StepContext;
use log::{debug, warn};

/// Lote transitorio de items transformados. Sólo vive durante un ciclo de
/// commit.
#[derive(Debug)]
pub struct Chunk<T> {
    items: Vec<T>,
    /// Items extraídos del origen para formar este chunk.
    read: u64,
    /// Items descartados por el transformer.
    filtered: u64,
}

impl<T> Chunk<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self { items: Vec::with_capacity(capacity), read: 0, filtered: 0 }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn read_count(&self) -> u64 {
        self.read
    }

    pub fn filter_count(&self) -> u64 {
        self.filtered
    }
}

/// Resultado de una pasada completa del orquestador.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// El origen se agotó y todos los chunks se confirmaron.
    Exhausted,
    /// Se atendió una petición de parada en una frontera de chunk.
    Stopped,
}

/// Conduce un step orientado a chunks.
///
/// No hay pipelining: cada chunk se lee, transforma y confirma antes de
/// empezar el siguiente, de modo que los commits respetan el orden de
/// entrada.
pub struct ChunkOrchestrator<'a, I, O> {
    reader: &'a mut dyn ItemReader<I>,
    processor: &'a dyn ItemProcessor<I, O>,
    writer: &'a mut dyn ItemWriter<O>,
    transaction_manager: &'a dyn TransactionManager,
    chunk_size: usize,
}

impl<'a, I, O> ChunkOrchestrator<'a, I, O> {
    pub fn new(reader: &'a mut dyn ItemReader<I>,
               processor: &'a dyn ItemProcessor<I, O>,
               writer: &'a mut dyn ItemWriter<O>,
               transaction_manager: &'a dyn TransactionManager,
               chunk_size: usize)
               -> Self {
        Self { reader, processor, writer, transaction_manager, chunk_size }
    }

    /// Ejecuta el step completo. Abre origen y destino, procesa todos los
    /// chunks y cierra ambos incluso si hubo error; el primer error gana.
    pub fn run(&mut self, execution: &mut StepExecution, ctx: &StepContext) -> Result<ChunkOutcome> {
        if self.chunk_size == 0 {
            return Err(BatchError::Configuration(format!("step '{}': chunk size debe ser positivo",
                                                         execution.step_name)));
        }
        self.reader.open()?;
        if let Err(e) = self.writer.open() {
            if let Err(close_err) = self.reader.close() {
                warn!("step '{}': error al cerrar el origen: {}", execution.step_name, close_err);
            }
            return Err(e);
        }

        let outcome = self.process_chunks(execution, ctx);

        let reader_closed = self.reader.close();
        let writer_closed = self.writer.close();
        match outcome {
            Ok(o) => {
                reader_closed?;
                writer_closed?;
                Ok(o)
            }
            Err(e) => {
                for close_err in [reader_closed.err(), writer_closed.err()].into_iter().flatten() {
                    warn!("step '{}': error al cerrar recursos tras fallo: {}", execution.step_name, close_err);
                }
                Err(e)
            }
        }
    }

    fn process_chunks(&mut self, execution: &mut StepExecution, ctx: &StepContext) -> Result<ChunkOutcome> {
        loop {
            if ctx.stop_signal().is_requested() {
                debug!("step '{}': parada solicitada tras {} commits", execution.step_name, execution.commit_count);
                return Ok(ChunkOutcome::Stopped);
            }

            let (chunk, exhausted) = self.read_chunk()?;
            if chunk.read_count() == 0 {
                return Ok(ChunkOutcome::Exhausted);
            }

            if !chunk.is_empty() {
                self.write_chunk(&chunk, execution)?;
                execution.commit_count += 1;
            }
            execution.read_count += chunk.read_count();
            execution.filter_count += chunk.filter_count();
            execution.write_count += chunk.len() as u64;
            debug!("step '{}': chunk procesado (leídos={}, escritos={}, filtrados={})",
                   execution.step_name,
                   chunk.read_count(),
                   chunk.len(),
                   chunk.filter_count());
            ctx.checkpoint(execution)?;

            if exhausted {
                return Ok(ChunkOutcome::Exhausted);
            }
        }
    }

    /// Extrae hasta `chunk_size` items del origen aplicando el transformer.
    /// Devuelve el chunk y si el origen se agotó.
    fn read_chunk(&mut self) -> Result<(Chunk<O>, bool)> {
        let mut chunk = Chunk::with_capacity(self.chunk_size);
        while (chunk.read as usize) < self.chunk_size {
            let item = match self.reader.read()? {
                Some(item) => item,
                None => return Ok((chunk, true)),
            };
            chunk.read += 1;
            match self.processor.process(item).map_err(BatchError::into_transform_error)? {
                Some(out) => chunk.items.push(out),
                None => chunk.filtered += 1,
            }
        }
        Ok((chunk, false))
    }

    /// Escribe el chunk dentro de su propia transacción. Ante cualquier fallo
    /// se hace rollback y el writer descarta lo pendiente.
    fn write_chunk(&mut self, chunk: &Chunk<O>, execution: &mut StepExecution) -> Result<()> {
        let size = chunk.len();
        self.transaction_manager.begin().map_err(|e| e.into_write_error(size))?;

        let written = self.writer
                          .write(chunk.items())
                          .and_then(|_| self.transaction_manager.commit());
        match written {
            Ok(()) => self.writer.after_commit().map_err(|e| e.into_write_error(size)),
            Err(e) => {
                if let Err(rb) = self.transaction_manager.rollback() {
                    warn!("step '{}': rollback fallido: {}", execution.step_name, rb);
                }
                self.writer.after_rollback();
                execution.rollback_count += 1;
                Err(e.into_write_error(size))
            }
        }
    }
}
