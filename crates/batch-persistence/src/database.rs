// database.rs
// Pool de conexiones SQLite, migraciones embebidas y la sesión compartida
// que usan el gestor de transacciones por chunk y los writers de tabla.
use crate::errors::{PersistenceError, Result};
use batch::{BatchError, TransactionManager};
use diesel::connection::{AnsiTransactionManager, TransactionManager as _};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool, PooledConnection};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use log::{debug, info};
use std::sync::{Arc, Mutex};
use uuid::Uuid;
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("./migrations");
pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;
pub type DbConn = PooledConnection<ConnectionManager<SqliteConnection>>;
const POOL_SIZE: u32 = 8;
/// PRAGMAs aplicados a cada conexión nueva del pool.
#[derive(Debug)]
struct SqlitePragmas;
impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for SqlitePragmas {
  fn on_acquire(&self, conn: &mut SqliteConnection) -> std::result::Result<(), diesel::r2d2::Error> {
    diesel::sql_query("PRAGMA busy_timeout = 5000;").execute(conn)
                                                    .map_err(diesel::r2d2::Error::QueryError)?;
    diesel::sql_query("PRAGMA foreign_keys = ON;").execute(conn)
                                                  .map_err(diesel::r2d2::Error::QueryError)?;
    Ok(())
  }
}
/// Base de datos SQLite (fichero o memoria compartida) con las migraciones
/// aplicadas.
#[derive(Clone)]
pub struct Database {
  pool: Arc<DbPool>,
  url: String,
}
impl Database {
  /// Abre (o crea) la base de datos y aplica las migraciones pendientes.
  /// `:memory:` se traduce a una base en memoria compartida entre las
  /// conexiones del pool.
  pub fn new(database_url: &str) -> Result<Self> {
    let url = if database_url.trim() == ":memory:" { memory_url() } else { database_url.trim().to_string() };
    let in_memory = url.contains("mode=memory");
    let manager = ConnectionManager::<SqliteConnection>::new(url.as_str());
    let mut builder = Pool::builder().max_size(POOL_SIZE).connection_customizer(Box::new(SqlitePragmas));
    if in_memory {
      // la base en memoria desaparece al cerrarse la última conexión
      builder = builder.max_lifetime(None).idle_timeout(None);
    }
    let pool = builder.build(manager)?;
    let db = Database { pool: Arc::new(pool), url };
    let mut conn = db.conn()?;
    if !in_memory {
      diesel::sql_query("PRAGMA journal_mode = WAL;").execute(&mut conn)?;
    }
    let applied = conn.run_pending_migrations(MIGRATIONS)
                      .map_err(|e| PersistenceError::Migration(e.to_string()))?;
    if !applied.is_empty() {
      info!("base de datos '{}': {} migraciones aplicadas", db.url, applied.len());
    }
    Ok(db)
  }
  /// Base en memoria con nombre único: cada llamada devuelve una base
  /// aislada.
  pub fn in_memory() -> Result<Self> {
    Self::new(&memory_url())
  }
  pub fn conn(&self) -> Result<DbConn> {
    Ok(self.pool.get()?)
  }
  /// Reserva una conexión para uso exclusivo de un step.
  pub fn session(&self) -> Result<ChunkSession> {
    Ok(ChunkSession { conn: Arc::new(Mutex::new(self.conn()?)) })
  }
  /// Gestor de transacciones por chunk sobre una sesión nueva. Los writers
  /// que participen en la transacción deben usar `manager.session()`.
  pub fn transaction_manager(&self) -> Result<DieselTransactionManager> {
    Ok(DieselTransactionManager { session: self.session()? })
  }
}
fn memory_url() -> String {
  format!("file:batch-{}?mode=memory&cache=shared", Uuid::new_v4().simple())
}
/// Conexión compartida entre el gestor de transacciones y los writers de
/// un mismo step.
#[derive(Clone)]
pub struct ChunkSession {
  conn: Arc<Mutex<DbConn>>,
}
impl ChunkSession {
  pub fn with<T>(&self, f: impl FnOnce(&mut SqliteConnection) -> Result<T>) -> Result<T> {
    let mut guard = self.conn.lock().map_err(|e| PersistenceError::Poisoned(e.to_string()))?;
    f(&mut guard)
  }
}
/// Abre, confirma y revierte la transacción de cada chunk sobre la sesión.
#[derive(Clone)]
pub struct DieselTransactionManager {
  session: ChunkSession,
}
impl DieselTransactionManager {
  pub fn new(session: ChunkSession) -> Self {
    Self { session }
  }
  pub fn session(&self) -> ChunkSession {
    self.session.clone()
  }
}
impl TransactionManager for DieselTransactionManager {
  fn begin(&self) -> batch::Result<()> {
    debug!("chunk: BEGIN");
    self.session
        .with(|c| Ok(AnsiTransactionManager::begin_transaction(c)?))
        .map_err(BatchError::from)
  }
  fn commit(&self) -> batch::Result<()> {
    debug!("chunk: COMMIT");
    self.session
        .with(|c| Ok(AnsiTransactionManager::commit_transaction(c)?))
        .map_err(BatchError::from)
  }
  fn rollback(&self) -> batch::Result<()> {
    debug!("chunk: ROLLBACK");
    self.session
        .with(|c| Ok(AnsiTransactionManager::rollback_transaction(c)?))
        .map_err(BatchError::from)
  }
}
