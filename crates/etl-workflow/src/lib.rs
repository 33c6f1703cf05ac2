//! etl-workflow: el job `etl` de ejemplo
//!
//! Carga un fichero `name,age,email` en la tabla `people` (step
//! `csv-to-db`) y exporta el recuento de personas por edad a un fichero
//! `age,count` (step `db-to-csv`). El estado de cada ejecución se guarda en
//! las tablas de metadatos batch de la misma base de datos.

pub mod config;
pub mod errors;
pub mod factory;
pub mod listener;
pub mod steps;

pub use config::EtlConfig;
pub use errors::WorkflowError;
pub use factory::{EtlJobFactory, JOB_NAME};
pub use listener::{LoggingJobListener, PeopleReportListener};

use batch::JobExecution;
use batch_persistence::Database;
use log::info;

/// Abre la base de datos configurada (o una en memoria) y ejecuta el job.
pub fn run_etl(config: &EtlConfig) -> errors::Result<JobExecution> {
  config.validate()?;
  let db = match &config.database_url {
    Some(url) => Database::new(url)?,
    None => Database::in_memory()?,
  };
  run_etl_on(config, &db)
}

/// Ejecuta el job sobre una base de datos ya abierta. Los fallos de los
/// steps se devuelven dentro de la `JobExecution`, no como `Err`.
pub fn run_etl_on(config: &EtlConfig, db: &Database) -> errors::Result<JobExecution> {
  config.validate()?;
  info!("etl: configuración {}", config.to_json()?);
  let job = EtlJobFactory::job(config, db)?;
  let launcher = EtlJobFactory::launcher(config, db);
  let params = EtlJobFactory::next_parameters(config, &launcher)?;
  let execution = launcher.run(&job, params)?;
  info!("etl: ejecución {} terminada en {} ({})", execution.id, execution.status, execution.exit_status.code);
  Ok(execution)
}
