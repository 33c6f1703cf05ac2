//! Crate `batch`: motor de procesamiento por chunks
//!
//! Este crate define los tipos de dominio de ejecución (`JobExecution`,
//! `StepExecution`, `BatchStatus`), los contratos de items (`ItemReader`,
//! `ItemProcessor`, `ItemWriter`), el orquestador de chunks con frontera
//! transaccional, la definición de jobs con reglas de flujo, el
//! `JobLauncher`/`JobOperator` y el contrato `JobRepository` con una
//! implementación en memoria útil para pruebas (`InMemoryJobRepository`).
//!
//! Diseño resumido:
//! - Chunk = unidad de commit: lee hasta N items, los transforma y los
//!   escribe en una única transacción. Un fallo revierte sólo ese chunk.
//! - Ejecución síncrona y secuencial: un step termina antes del siguiente.
//! - Cada lanzamiento crea una `JobExecution` nueva (run id creciente); un
//!   relanzamiento vuelve a ejecutar los steps desde el principio.
//!
//! Ejemplo rápido:
//! ```rust
//! use batch::stubs::{InMemoryItemReader, InMemoryItemWriter, InMemoryJobRepository};
//! use batch::{JobBuilder, JobLauncher, JobParameters, LauncherConfig, StepBuilder};
//! use std::sync::Arc;
//!
//! let step = StepBuilder::new("copy").chunk::<i32>(2)
//!                                    .reader(InMemoryItemReader::new(vec![1, 2, 3]))
//!                                    .writer(InMemoryItemWriter::new())
//!                                    .build()
//!                                    .unwrap();
//! let job = JobBuilder::new("demo").start(step).build().unwrap();
//! let launcher = JobLauncher::new(Arc::new(InMemoryJobRepository::new()), LauncherConfig::default());
//! let execution = launcher.run(&job, JobParameters::new()).unwrap();
//! assert_eq!(execution.status, batch::BatchStatus::Completed);
//! ```
pub mod chunk;
pub mod domain;
pub mod errors;
pub mod file;
pub mod item;
pub mod job;
pub mod launcher;
pub mod listener;
pub mod operator;
pub mod repository;
pub mod step;
pub mod stubs;

pub use chunk::*;
pub use domain::*;
pub use errors::*;
pub use file::*;
pub use item::*;
pub use job::*;
pub use launcher::*;
pub use listener::*;
pub use operator::*;
pub use repository::*;
pub use step::*;
