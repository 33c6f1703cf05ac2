//! Persistencia Diesel/SQLite del motor batch y de la tabla de personas.
//! Expone el módulo `schema`, la base de datos con migraciones embebidas,
//! el gestor de transacciones por chunk y los repositorios que implementan
//! `batch::JobRepository` y `people_domain::PeopleRepository`.

mod database;
mod errors;
mod job_persistence;
mod people_persistence;
pub mod schema;

pub use database::{ChunkSession, Database, DieselTransactionManager, MIGRATIONS};
pub use errors::PersistenceError;
pub use job_persistence::DieselJobRepository;
pub use people_persistence::{AgeCountCursorReader, DieselPeopleRepository, PeopleTableWriter};
