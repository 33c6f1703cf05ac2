use crate::database::Database;
use crate::errors::Result;
use crate::schema;
use crate::schema::batch_job_execution::dsl as exec_dsl;
use crate::schema::batch_job_instance::dsl as inst_dsl;
use crate::schema::batch_step_execution::dsl as step_dsl;
use batch::{BatchError, BatchStatus, ExitStatus, JobExecution, JobInstance, JobParameters, JobRepository,
            StepExecution};
use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::dsl::max;
use diesel::prelude::*;
use log::debug;
use std::str::FromStr;
// Filas Diesel de las tablas de metadatos batch
#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = schema::batch_job_instance)]
struct JobInstanceRow {
  pub id: i64,
  pub job_name: String,
  pub job_key: String,
  pub parameters: String,
  pub created_at: NaiveDateTime,
}
#[derive(Debug, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = schema::batch_job_execution, treat_none_as_null = true)]
struct JobExecutionRow {
  pub id: i64,
  pub job_instance_id: i64,
  pub job_name: String,
  pub parameters: String,
  pub status: String,
  pub exit_code: String,
  pub exit_description: String,
  pub failing_step: Option<String>,
  pub created_at: NaiveDateTime,
  pub start_time: Option<NaiveDateTime>,
  pub end_time: Option<NaiveDateTime>,
}
#[derive(Debug, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = schema::batch_step_execution, treat_none_as_null = true)]
struct StepExecutionRow {
  pub id: i64,
  pub job_execution_id: i64,
  pub step_name: String,
  pub status: String,
  pub read_count: i64,
  pub write_count: i64,
  pub filter_count: i64,
  pub skip_count: i64,
  pub commit_count: i64,
  pub rollback_count: i64,
  pub exit_code: String,
  pub exit_description: String,
  pub start_time: Option<NaiveDateTime>,
  pub end_time: Option<NaiveDateTime>,
}
fn to_naive(ts: DateTime<Utc>) -> NaiveDateTime {
  ts.naive_utc()
}
fn from_naive(ts: NaiveDateTime) -> DateTime<Utc> {
  ts.and_utc()
}
impl JobInstanceRow {
  fn into_domain(self) -> Result<JobInstance> {
    Ok(JobInstance { id: self.id,
                     job_name: self.job_name,
                     job_key: self.job_key,
                     parameters: JobParameters::from_json(&self.parameters)?,
                     created_at: from_naive(self.created_at) })
  }
}
impl JobExecutionRow {
  fn from_domain(e: &JobExecution) -> Result<Self> {
    Ok(JobExecutionRow { id: e.id,
                         job_instance_id: e.job_instance_id,
                         job_name: e.job_name.clone(),
                         parameters: e.parameters.to_json()?,
                         status: e.status.as_str().to_string(),
                         exit_code: e.exit_status.code.clone(),
                         exit_description: e.exit_status.description.clone(),
                         failing_step: e.failing_step.clone(),
                         created_at: to_naive(e.created_at),
                         start_time: e.start_time.map(to_naive),
                         end_time: e.end_time.map(to_naive) })
  }
  fn into_domain(self, steps: Vec<StepExecution>) -> Result<JobExecution> {
    Ok(JobExecution { id: self.id,
                      job_instance_id: self.job_instance_id,
                      job_name: self.job_name,
                      parameters: JobParameters::from_json(&self.parameters)?,
                      status: BatchStatus::from_str(&self.status)?,
                      exit_status: ExitStatus::new(&self.exit_code).with_description(self.exit_description),
                      failing_step: self.failing_step,
                      created_at: from_naive(self.created_at),
                      start_time: self.start_time.map(from_naive),
                      end_time: self.end_time.map(from_naive),
                      step_executions: steps })
  }
}
impl StepExecutionRow {
  fn from_domain(s: &StepExecution) -> Self {
    StepExecutionRow { id: s.id,
                       job_execution_id: s.job_execution_id,
                       step_name: s.step_name.clone(),
                       status: s.status.as_str().to_string(),
                       read_count: s.read_count as i64,
                       write_count: s.write_count as i64,
                       filter_count: s.filter_count as i64,
                       skip_count: s.skip_count as i64,
                       commit_count: s.commit_count as i64,
                       rollback_count: s.rollback_count as i64,
                       exit_code: s.exit_status.code.clone(),
                       exit_description: s.exit_status.description.clone(),
                       start_time: s.start_time.map(to_naive),
                       end_time: s.end_time.map(to_naive) }
  }
  fn into_domain(self) -> Result<StepExecution> {
    Ok(StepExecution { id: self.id,
                       job_execution_id: self.job_execution_id,
                       step_name: self.step_name,
                       status: BatchStatus::from_str(&self.status)?,
                       read_count: self.read_count.max(0) as u64,
                       write_count: self.write_count.max(0) as u64,
                       filter_count: self.filter_count.max(0) as u64,
                       skip_count: self.skip_count.max(0) as u64,
                       commit_count: self.commit_count.max(0) as u64,
                       rollback_count: self.rollback_count.max(0) as u64,
                       exit_status: ExitStatus::new(&self.exit_code).with_description(self.exit_description),
                       start_time: self.start_time.map(from_naive),
                       end_time: self.end_time.map(from_naive) })
  }
}
fn load_steps(conn: &mut SqliteConnection, execution_id: i64) -> Result<Vec<StepExecution>> {
  let rows = step_dsl::batch_step_execution.filter(step_dsl::job_execution_id.eq(execution_id))
                                           .order(step_dsl::id.asc())
                                           .load::<StepExecutionRow>(conn)?;
  rows.into_iter().map(StepExecutionRow::into_domain).collect()
}
fn load_execution(conn: &mut SqliteConnection, row: JobExecutionRow) -> Result<JobExecution> {
  let steps = load_steps(conn, row.id)?;
  row.into_domain(steps)
}
fn find_instance(conn: &mut SqliteConnection, job_name: &str, job_key: &str) -> Result<Option<JobInstanceRow>> {
  Ok(inst_dsl::batch_job_instance.filter(inst_dsl::job_name.eq(job_name))
                                 .filter(inst_dsl::job_key.eq(job_key))
                                 .first::<JobInstanceRow>(conn)
                                 .optional()?)
}
/// Repo Diesel que implementa `JobRepository` sobre las tablas
/// `batch_job_instance`, `batch_job_execution` y `batch_step_execution`.
///
/// Los ids se asignan como `max(id) + 1` dentro de una transacción
/// inmediata, lo que mantiene los run ids estrictamente crecientes.
#[derive(Clone)]
pub struct DieselJobRepository {
  db: Database,
}
impl DieselJobRepository {
  pub fn new(db: Database) -> Self {
    Self { db }
  }
  /// Ejecuta `f` en una transacción de escritura.
  fn write_tx<T>(&self, f: impl FnOnce(&mut SqliteConnection) -> Result<T>) -> batch::Result<T> {
    let mut conn = self.db.conn()?;
    Ok(conn.immediate_transaction(f)?)
  }
  fn read<T>(&self, f: impl FnOnce(&mut SqliteConnection) -> Result<T>) -> batch::Result<T> {
    let mut conn = self.db.conn()?;
    Ok(f(&mut conn)?)
  }
}
impl JobRepository for DieselJobRepository {
  fn get_or_create_job_instance(&self, job_name: &str, parameters: &JobParameters) -> batch::Result<JobInstance> {
    let key = parameters.job_key();
    self.write_tx(|c| {
          if let Some(row) = find_instance(c, job_name, &key)? {
            return row.into_domain();
          }
          let next_id = inst_dsl::batch_job_instance.select(max(inst_dsl::id)).first::<Option<i64>>(c)?.unwrap_or(0) + 1;
          let row = JobInstanceRow { id: next_id,
                                     job_name: job_name.to_string(),
                                     job_key: key.clone(),
                                     parameters: parameters.to_json()?,
                                     created_at: to_naive(Utc::now()) };
          diesel::insert_into(schema::batch_job_instance::table).values(&row).execute(c)?;
          debug!("job '{}': nueva instancia {} (clave {})", job_name, next_id, key);
          row.into_domain()
        })
  }
  fn find_job_instance(&self, job_name: &str, parameters: &JobParameters) -> batch::Result<Option<JobInstance>> {
    let key = parameters.job_key();
    self.read(|c| find_instance(c, job_name, &key)?.map(JobInstanceRow::into_domain).transpose())
  }
  fn create_job_execution(&self, instance: &JobInstance, parameters: &JobParameters) -> batch::Result<JobExecution> {
    self.write_tx(|c| {
          let exists = inst_dsl::batch_job_instance.find(instance.id)
                                                   .select(inst_dsl::id)
                                                   .first::<i64>(c)
                                                   .optional()?;
          if exists.is_none() {
            return Err(BatchError::NotFound(format!("job instance {}", instance.id)).into());
          }
          let next_id = exec_dsl::batch_job_execution.select(max(exec_dsl::id)).first::<Option<i64>>(c)?.unwrap_or(0) + 1;
          let execution = JobExecution::new(next_id, instance, parameters.clone());
          diesel::insert_into(schema::batch_job_execution::table).values(&JobExecutionRow::from_domain(&execution)?)
                                                                 .execute(c)?;
          Ok(execution)
        })
  }
  fn update_job_execution(&self, execution: &JobExecution) -> batch::Result<()> {
    self.write_tx(|c| {
          let stored = exec_dsl::batch_job_execution.find(execution.id)
                                                    .select(exec_dsl::status)
                                                    .first::<String>(c)
                                                    .optional()?
                                                    .ok_or_else(|| {
                                                      BatchError::NotFound(format!("job execution {}", execution.id))
                                                    })?;
          let stored = BatchStatus::from_str(&stored)?;
          if stored.is_terminal() {
            return Err(BatchError::Conflict(format!("job execution {} ya terminó en {}", execution.id, stored)).into());
          }
          diesel::update(exec_dsl::batch_job_execution.find(execution.id)).set(&JobExecutionRow::from_domain(execution)?)
                                                                          .execute(c)?;
          Ok(())
        })
  }
  fn create_step_execution(&self, job_execution_id: i64, step_name: &str) -> batch::Result<StepExecution> {
    self.write_tx(|c| {
          let exists = exec_dsl::batch_job_execution.find(job_execution_id)
                                                    .select(exec_dsl::id)
                                                    .first::<i64>(c)
                                                    .optional()?;
          if exists.is_none() {
            return Err(BatchError::NotFound(format!("job execution {}", job_execution_id)).into());
          }
          let next_id = step_dsl::batch_step_execution.select(max(step_dsl::id)).first::<Option<i64>>(c)?.unwrap_or(0) + 1;
          let step = StepExecution::new(next_id, job_execution_id, step_name);
          diesel::insert_into(schema::batch_step_execution::table).values(&StepExecutionRow::from_domain(&step))
                                                                  .execute(c)?;
          Ok(step)
        })
  }
  fn update_step_execution(&self, step: &StepExecution) -> batch::Result<()> {
    self.write_tx(|c| {
          let stored = step_dsl::batch_step_execution.find(step.id)
                                                     .select(step_dsl::status)
                                                     .first::<String>(c)
                                                     .optional()?
                                                     .ok_or_else(|| {
                                                       BatchError::NotFound(format!("step execution {}", step.id))
                                                     })?;
          let stored = BatchStatus::from_str(&stored)?;
          if stored.is_terminal() {
            return Err(BatchError::Conflict(format!("step execution {} ya terminó en {}", step.id, stored)).into());
          }
          diesel::update(step_dsl::batch_step_execution.find(step.id)).set(&StepExecutionRow::from_domain(step))
                                                                      .execute(c)?;
          Ok(())
        })
  }
  fn get_job_execution(&self, execution_id: i64) -> batch::Result<JobExecution> {
    self.read(|c| {
          let row = exec_dsl::batch_job_execution.find(execution_id)
                                                 .first::<JobExecutionRow>(c)
                                                 .optional()?
                                                 .ok_or_else(|| {
                                                   BatchError::NotFound(format!("job execution {}", execution_id))
                                                 })?;
          load_execution(c, row)
        })
  }
  fn get_last_job_execution(&self, job_instance_id: i64) -> batch::Result<Option<JobExecution>> {
    self.read(|c| {
          let row = exec_dsl::batch_job_execution.filter(exec_dsl::job_instance_id.eq(job_instance_id))
                                                 .order(exec_dsl::id.desc())
                                                 .first::<JobExecutionRow>(c)
                                                 .optional()?;
          row.map(|r| load_execution(c, r)).transpose()
        })
  }
  fn list_job_instances(&self, job_name: &str) -> batch::Result<Vec<JobInstance>> {
    self.read(|c| {
          let rows = inst_dsl::batch_job_instance.filter(inst_dsl::job_name.eq(job_name))
                                                 .order(inst_dsl::id.asc())
                                                 .load::<JobInstanceRow>(c)?;
          rows.into_iter().map(JobInstanceRow::into_domain).collect()
        })
  }
  fn list_job_executions(&self, job_name: &str) -> batch::Result<Vec<JobExecution>> {
    self.read(|c| {
          let rows = exec_dsl::batch_job_execution.filter(exec_dsl::job_name.eq(job_name))
                                                  .order(exec_dsl::id.asc())
                                                  .load::<JobExecutionRow>(c)?;
          rows.into_iter().map(|r| load_execution(c, r)).collect()
        })
  }
}
