use batch::{BatchStatus, ExitStatus};
use batch_persistence::{Database, DieselPeopleRepository};
use etl_workflow::{run_etl, run_etl_on, EtlConfig, WorkflowError};
use people_domain::PeopleRepository;
use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};

fn config_for(dir: &TempDir, input: &str, chunk_size: usize) -> EtlConfig {
  let input_path = dir.path().join("in.csv");
  fs::write(&input_path, input).expect("write input");
  EtlConfig { input: input_path,
              output: dir.path().join("out").join("age-counts.csv"),
              chunk_size,
              ..EtlConfig::default() }
}

fn read(path: &Path) -> String {
  fs::read_to_string(path).expect("read output")
}

#[test]
fn loads_people_and_exports_counts_by_age() {
  let dir = tempdir().expect("tempdir");
  let config = config_for(&dir, "josh,30,josh@email.com\njane,30,jane@email.com\nbob,25,bob@email.com\n", 10);
  let execution = run_etl(&config).expect("run");

  assert_eq!(execution.status, BatchStatus::Completed);
  assert_eq!(execution.exit_status.code, ExitStatus::COMPLETED);
  assert_eq!(read(&config.output), "25,1\n30,2\n");
  let load = execution.step_execution("csv-to-db").expect("load");
  assert_eq!((load.read_count, load.write_count, load.commit_count), (3, 3, 1));
  let export = execution.step_execution("db-to-csv").expect("export");
  assert_eq!((export.read_count, export.write_count), (2, 2));
  assert_eq!(execution.parameters.get_long("run.id"), Some(1));
}

#[test]
fn small_chunks_give_the_same_output() {
  let dir = tempdir().expect("tempdir");
  let lines: String = (0..23).map(|i| format!("p{},{},p{}@email.com\n", i, i % 4, i)).collect();
  let config = config_for(&dir, &lines, 2);
  let execution = run_etl(&config).expect("run");

  assert_eq!(execution.status, BatchStatus::Completed);
  assert_eq!(execution.step_execution("csv-to-db").expect("load").commit_count, 12);
  assert_eq!(read(&config.output), "0,6\n1,6\n2,6\n3,5\n");
}

#[test]
fn malformed_record_fails_the_load_step() {
  let dir = tempdir().expect("tempdir");
  let config = config_for(&dir, "alice,30,alice@email.com\nbob,notanumber,bob@email.com\n", 10);
  let db = Database::in_memory().expect("db");
  let execution = run_etl_on(&config, &db).expect("run");

  assert_eq!(execution.status, BatchStatus::Failed);
  assert_eq!(execution.failing_step.as_deref(), Some("csv-to-db"));
  let message = execution.failure_message().expect("message");
  assert!(message.contains("línea 2"), "{}", message);
  assert!(execution.step_execution("db-to-csv").is_none());
  assert_eq!(DieselPeopleRepository::new(db).count_people().expect("count"), 0);
  assert!(!config.output.exists());
}

#[test]
fn earlier_chunks_survive_a_failure() {
  let dir = tempdir().expect("tempdir");
  let config = config_for(&dir, "alice,30,alice@email.com\nbob,notanumber,bob@email.com\n", 1);
  let db = Database::in_memory().expect("db");
  let execution = run_etl_on(&config, &db).expect("run");

  assert_eq!(execution.status, BatchStatus::Failed);
  let people = DieselPeopleRepository::new(db).list_people().expect("people");
  assert_eq!(people.len(), 1);
  assert_eq!(people[0].name(), "alice");
}

#[test]
fn age_outside_table_range_rolls_back_the_chunk() {
  let dir = tempdir().expect("tempdir");
  let config = config_for(&dir, "a,1,a@email.com\nb,2,b@email.com\nc,3,c@email.com\nd,200,d@email.com\n", 2);
  let db = Database::in_memory().expect("db");
  let execution = run_etl_on(&config, &db).expect("run");

  assert_eq!(execution.status, BatchStatus::Failed);
  let load = execution.step_execution("csv-to-db").expect("load");
  assert_eq!((load.commit_count, load.rollback_count, load.write_count), (1, 1, 2));
  assert_eq!(DieselPeopleRepository::new(db).count_people().expect("count"), 2);
}

#[test]
fn empty_input_completes_with_noop_steps() {
  let dir = tempdir().expect("tempdir");
  let config = config_for(&dir, "", 10);
  let execution = run_etl(&config).expect("run");

  assert_eq!(execution.status, BatchStatus::Completed);
  assert_eq!(execution.step_execution("csv-to-db").expect("load").exit_status.code, ExitStatus::NOOP);
  assert_eq!(read(&config.output), "");
}

#[test]
fn missing_input_file_is_reported_in_the_execution() {
  let dir = tempdir().expect("tempdir");
  let config = EtlConfig { input: dir.path().join("nope.csv"),
                           output: dir.path().join("out.csv"),
                           ..EtlConfig::default() };
  let execution = run_etl(&config).expect("run");
  assert_eq!(execution.status, BatchStatus::Failed);
  assert_eq!(execution.failing_step.as_deref(), Some("csv-to-db"));
}

#[test]
fn invalid_configuration_is_rejected_before_running() {
  let dir = tempdir().expect("tempdir");
  let config = config_for(&dir, "josh,30,josh@email.com\n", 0);
  assert!(matches!(run_etl(&config), Err(WorkflowError::Configuration(_))));
}

#[test]
fn file_database_accumulates_runs() {
  let dir = tempdir().expect("tempdir");
  let mut config = config_for(&dir, "josh,30,josh@email.com\nbob,25,bob@email.com\n", 10);
  config.database_url = Some(dir.path().join("batch.db").to_string_lossy().to_string());

  let first = run_etl(&config).expect("first");
  let second = run_etl(&config).expect("second");
  assert_eq!(second.status, BatchStatus::Completed);
  assert!(second.id > first.id);
  assert_eq!(second.parameters.get_long("run.id"), Some(2));
  assert_eq!(read(&config.output), "25,2\n30,2\n");
}

#[test]
fn database_url_from_environment_is_the_one_used() {
  let dir = tempdir().expect("tempdir");
  let db_path = dir.path().join("env.db").to_string_lossy().to_string();
  let mut config = EtlConfig::from_lookup(|key| match key {
                     "DATABASE_URL" => Some(dir.path().join("ignored.db").to_string_lossy().to_string()),
                     "BATCH_DB_URL" => Some(db_path.clone()),
                     _ => None,
                   }).expect("config");
  let base = config_for(&dir, "josh,30,josh@email.com\n", 10);
  config.input = base.input;
  config.output = base.output;

  let execution = run_etl(&config).expect("run");
  assert_eq!(execution.status, BatchStatus::Completed);
  assert!(!dir.path().join("ignored.db").exists());
  let people = DieselPeopleRepository::new(Database::new(&db_path).expect("reopen"));
  assert_eq!(people.count_people().expect("count"), 1);
}
