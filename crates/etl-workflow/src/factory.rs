use crate::config::EtlConfig;
use crate::errors::Result;
use crate::listener::{LoggingJobListener, PeopleReportListener};
use crate::steps::{csv_to_db, db_to_csv};
use batch::{JobBuilder, JobDefinition, JobLauncher, JobParameters, JobParametersIncrementer, JobRepository,
            LauncherConfig, RunIdIncrementer};
use batch_persistence::{Database, DieselJobRepository, DieselPeopleRepository};
use std::sync::Arc;

pub const JOB_NAME: &str = "etl";

/// Fábrica del job ETL y de su launcher sobre una misma base de datos.
pub struct EtlJobFactory;

impl EtlJobFactory {
  /// `csv-to-db` seguido de `db-to-csv`, con `RunIdIncrementer`.
  pub fn job(config: &EtlConfig, db: &Database) -> Result<JobDefinition> {
    let job = JobBuilder::new(JOB_NAME).start(csv_to_db::build(config, db)?)
                                       .next(db_to_csv::build(config, db)?)
                                       .incrementer(Arc::new(RunIdIncrementer))
                                       .build()?;
    Ok(job)
  }

  /// Launcher con el repositorio de jobs en `db` y los listeners de
  /// trazas e informe de personas registrados.
  pub fn launcher(config: &EtlConfig, db: &Database) -> JobLauncher {
    let repo = Arc::new(DieselJobRepository::new(db.clone()));
    let mut launcher = JobLauncher::new(repo, LauncherConfig { listener_timeout: config.listener_timeout() });
    launcher.register_listener(Arc::new(LoggingJobListener));
    launcher.register_listener(Arc::new(PeopleReportListener::new(DieselPeopleRepository::new(db.clone()))));
    launcher
  }

  /// Parámetros de la próxima ejecución: los de la configuración más el
  /// siguiente `run.id` para el job.
  pub fn next_parameters(config: &EtlConfig, launcher: &JobLauncher) -> Result<JobParameters> {
    let previous = launcher.repository().list_job_instances(JOB_NAME)?.pop().map(|i| i.parameters);
    let mut params = RunIdIncrementer.next(previous.as_ref());
    for (key, entry) in config.to_job_parameters().iter() {
      params.insert(key, entry.value.clone(), entry.identifying);
    }
    Ok(params)
  }
}
