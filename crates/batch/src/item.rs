// Archivo: item.rs
// Propósito: contratos de lectura, transformación y escritura de items, y la
// frontera transaccional que el orquestador abre alrededor de cada chunk.
use crate::errors::Result;
use std::marker::PhantomData;

/// Origen de items de un único paso (single-pass).
///
/// `open` adquiere el recurso (fichero, cursor), `read` devuelve el siguiente
/// item o `None` al agotarse y `close` lo libera. El orquestador invoca
/// `close` también en los caminos de error.
pub trait ItemReader<T>: Send {
    fn open(&mut self) -> Result<()> {
        Ok(())
    }

    fn read(&mut self) -> Result<Option<T>>;

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Transforma un item de entrada en cero o un items de salida.
///
/// Devolver `Ok(None)` descarta el item de forma deliberada (filtrado); un
/// `Err` aborta el chunk en curso.
pub trait ItemProcessor<I, O>: Send + Sync {
    fn process(&self, item: I) -> Result<Option<O>>;
}

impl<I, O, F> ItemProcessor<I, O> for F where F: Fn(I) -> Result<Option<O>> + Send + Sync
{
    fn process(&self, item: I) -> Result<Option<O>> {
        self(item)
    }
}

/// Procesador identidad para steps sin transformer.
pub struct PassThroughItemProcessor<T> {
    _marker: PhantomData<fn(T) -> T>,
}

impl<T> PassThroughItemProcessor<T> {
    pub fn new() -> Self {
        Self { _marker: PhantomData }
    }
}

impl<T> Default for PassThroughItemProcessor<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ItemProcessor<T, T> for PassThroughItemProcessor<T> {
    fn process(&self, item: T) -> Result<Option<T>> {
        Ok(Some(item))
    }
}

/// Destino de los chunks.
///
/// `write` recibe exactamente un chunk cada vez, dentro de la transacción
/// abierta por el orquestador. `after_commit`/`after_rollback` permiten a
/// sinks no transaccionales (ficheros) publicar o descartar lo escrito al
/// ritmo de esa transacción.
pub trait ItemWriter<T>: Send {
    fn open(&mut self) -> Result<()> {
        Ok(())
    }

    fn write(&mut self, items: &[T]) -> Result<()>;

    fn after_commit(&mut self) -> Result<()> {
        Ok(())
    }

    fn after_rollback(&mut self) {}

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Frontera transaccional de un chunk.
pub trait TransactionManager: Send + Sync {
    fn begin(&self) -> Result<()>;
    fn commit(&self) -> Result<()>;
    fn rollback(&self) -> Result<()>;
}

/// Gestor sin recurso: para sinks cuya atomicidad depende de los hooks
/// `after_commit`/`after_rollback` del writer.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResourcelessTransactionManager;

impl TransactionManager for ResourcelessTransactionManager {
    fn begin(&self) -> Result<()> {
        Ok(())
    }
    fn commit(&self) -> Result<()> {
        Ok(())
    }
    fn rollback(&self) -> Result<()> {
        Ok(())
    }
}
