use batch::stubs::{InMemoryItemReader, InMemoryItemWriter};
use batch::{BatchError, BatchStatus, JobBuilder, JobLauncher, JobOperator, JobParameter, JobParameters, JobRepository,
            LauncherConfig, RunIdIncrementer, StepBuilder};
use batch_persistence::{Database, DieselJobRepository};
use std::sync::Arc;
use tempfile::tempdir;

fn repo() -> DieselJobRepository {
  DieselJobRepository::new(Database::in_memory().expect("db"))
}

#[test]
fn instances_are_unique_per_name_and_key() {
  let repo = repo();
  let params = JobParameters::new().with_string("input", "sample-data.csv");
  let a = repo.get_or_create_job_instance("etl", &params).expect("a");
  let b = repo.get_or_create_job_instance("etl", &params).expect("b");
  assert_eq!(a.id, b.id);
  assert_eq!(a.parameters, params);

  let mut extra = params.clone();
  extra.insert("note", JobParameter::String("x".into()), false);
  assert_eq!(repo.find_job_instance("etl", &extra).expect("find").map(|i| i.id), Some(a.id));
  assert!(repo.find_job_instance("report", &params).expect("find").is_none());

  repo.get_or_create_job_instance("etl", &params.clone().with_long("run.id", 1)).expect("other");
  assert_eq!(repo.list_job_instances("etl").expect("list").len(), 2);
}

#[test]
fn execution_lifecycle_is_persisted() {
  let repo = repo();
  let instance = repo.get_or_create_job_instance("etl", &JobParameters::new()).expect("instance");
  let mut execution = repo.create_job_execution(&instance, &instance.parameters).expect("execution");
  assert_eq!(execution.status, BatchStatus::Starting);

  execution.transition_to(BatchStatus::Started).expect("started");
  repo.update_job_execution(&execution).expect("update");
  let mut step = repo.create_step_execution(execution.id, "csv-to-db").expect("step");
  step.transition_to(BatchStatus::Started).expect("step started");
  step.read_count = 5;
  step.write_count = 4;
  step.filter_count = 1;
  step.commit_count = 3;
  repo.update_step_execution(&step).expect("checkpoint");
  step.complete().expect("complete");
  repo.update_step_execution(&step).expect("step update");
  execution.transition_to(BatchStatus::Completed).expect("completed");
  execution.exit_status = batch::ExitStatus::completed();
  repo.update_job_execution(&execution).expect("final");

  let stored = repo.get_job_execution(execution.id).expect("get");
  assert_eq!(stored.status, BatchStatus::Completed);
  assert_eq!(stored.exit_status.code, "COMPLETED");
  assert!(stored.start_time.is_some() && stored.end_time.is_some());
  let stored_step = stored.step_execution("csv-to-db").expect("stored step");
  assert_eq!((stored_step.read_count, stored_step.write_count, stored_step.filter_count), (5, 4, 1));
  assert_eq!(stored_step.commit_count, 3);
  assert_eq!(stored_step.status, BatchStatus::Completed);

  let mut forged = stored.clone();
  forged.status = BatchStatus::Failed;
  assert!(matches!(repo.update_job_execution(&forged), Err(BatchError::Conflict(_))));
  let mut late = step.clone();
  late.write_count = 99;
  assert!(matches!(repo.update_step_execution(&late), Err(BatchError::Conflict(_))));
}

#[test]
fn run_ids_increase_and_missing_ids_are_not_found() {
  let repo = repo();
  let i1 = repo.get_or_create_job_instance("etl", &JobParameters::new()).expect("i1");
  let i2 = repo.get_or_create_job_instance("etl", &JobParameters::new().with_long("run.id", 7)).expect("i2");
  let mut last = 0;
  for instance in [&i1, &i2, &i1, &i2] {
    let e = repo.create_job_execution(instance, &instance.parameters).expect("execution");
    assert!(e.id > last);
    last = e.id;
  }
  assert_eq!(repo.get_last_job_execution(i2.id).expect("last").map(|e| e.id), Some(last));
  assert_eq!(repo.list_job_executions("etl").expect("executions").len(), 4);
  assert!(matches!(repo.get_job_execution(999), Err(BatchError::NotFound(_))));
  assert!(matches!(repo.create_step_execution(999, "x"), Err(BatchError::NotFound(_))));
}

#[test]
fn file_database_keeps_history_across_reopen() {
  let dir = tempdir().expect("tempdir");
  let url = dir.path().join("batch.db").to_string_lossy().to_string();
  let first_id = {
    let repo = Arc::new(DieselJobRepository::new(Database::new(&url).expect("db")));
    let launcher = Arc::new(JobLauncher::new(repo, LauncherConfig::default()));
    let mut operator = JobOperator::new(launcher);
    operator.register(job()).expect("register");
    let execution = operator.start_next_instance("numbers").expect("run");
    assert_eq!(execution.status, BatchStatus::Completed);
    execution.id
  };

  let repo = DieselJobRepository::new(Database::new(&url).expect("reopen"));
  let history = repo.list_job_executions("numbers").expect("history");
  assert_eq!(history.len(), 1);
  assert_eq!(history[0].id, first_id);
  assert_eq!(history[0].step_executions[0].write_count, 5);

  let launcher = Arc::new(JobLauncher::new(Arc::new(repo), LauncherConfig::default()));
  let mut operator = JobOperator::new(launcher);
  operator.register(job()).expect("register");
  let second = operator.start_next_instance("numbers").expect("second run");
  assert!(second.id > first_id);
  assert_eq!(second.parameters.get_long("run.id"), Some(2));
}

#[test]
fn rerun_leaves_the_previous_execution_untouched() {
  let repo = Arc::new(repo());
  let launcher = JobLauncher::new(repo.clone(), LauncherConfig::default());
  let params = JobParameters::new().with_string("input", "sample-data.csv");
  let first = launcher.run(&job(), params.clone()).expect("first");
  let before = repo.get_job_execution(first.id).expect("before");
  assert_eq!(before.status, BatchStatus::Completed);
  assert_eq!(before.step_executions[0].write_count, 5);

  let second = launcher.run(&job(), params).expect("second");
  assert_eq!(second.job_instance_id, first.job_instance_id);
  assert!(second.id > first.id);

  let after = repo.get_job_execution(first.id).expect("after");
  assert_eq!(after, before);
  assert!(after.end_time.is_some());
  assert_eq!(after.step_executions.len(), 1);
  assert_eq!((after.step_executions[0].read_count, after.step_executions[0].commit_count), (5, 3));
}

fn job() -> batch::JobDefinition {
  let step = StepBuilder::new("copy").chunk::<i32>(2)
                                     .reader(InMemoryItemReader::new(vec![1, 2, 3, 4, 5]))
                                     .writer(InMemoryItemWriter::new())
                                     .build()
                                     .expect("step");
  JobBuilder::new("numbers").start(step).incrementer(Arc::new(RunIdIncrementer)).build().expect("job")
}
