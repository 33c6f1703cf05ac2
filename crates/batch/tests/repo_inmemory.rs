use batch::stubs::InMemoryJobRepository;
use batch::{BatchError, BatchStatus, JobParameter, JobParameters, JobRepository};
use chrono::{TimeZone, Utc};

#[test]
fn instances_are_identified_by_name_and_identifying_parameters() {
  let repo = InMemoryJobRepository::new();
  let base = JobParameters::new().with_string("input", "a.csv");
  let a = repo.get_or_create_job_instance("etl", &base).expect("a");
  let again = repo.get_or_create_job_instance("etl", &base).expect("again");
  assert_eq!(a.id, again.id);

  let mut with_note = base.clone();
  with_note.insert("note", JobParameter::String("ignored".into()), false);
  assert_eq!(repo.get_or_create_job_instance("etl", &with_note).expect("note").id, a.id);

  let other = repo.get_or_create_job_instance("etl", &base.clone().with_long("run.id", 2)).expect("other");
  assert_ne!(other.id, a.id);
  let other_job = repo.get_or_create_job_instance("report", &base).expect("report");
  assert_ne!(other_job.id, a.id);

  assert!(repo.find_job_instance("etl", &JobParameters::new()).expect("find").is_none());
  assert_eq!(repo.list_job_instances("etl").expect("list").len(), 2);
}

#[test]
fn run_ids_strictly_increase_across_instances() {
  let repo = InMemoryJobRepository::new();
  let i1 = repo.get_or_create_job_instance("etl", &JobParameters::new()).expect("i1");
  let i2 = repo.get_or_create_job_instance("etl", &JobParameters::new().with_long("run.id", 1)).expect("i2");
  let mut last = 0;
  for instance in [&i1, &i2, &i1] {
    let e = repo.create_job_execution(instance, &instance.parameters).expect("execution");
    assert!(e.id > last);
    assert_eq!(e.status, BatchStatus::Starting);
    last = e.id;
  }
  let latest = repo.get_last_job_execution(i1.id).expect("last").expect("some");
  assert_eq!(latest.id, last);
}

#[test]
fn terminal_execution_rejects_further_updates() {
  let repo = InMemoryJobRepository::new();
  let instance = repo.get_or_create_job_instance("etl", &JobParameters::new()).expect("instance");
  let mut execution = repo.create_job_execution(&instance, &instance.parameters).expect("execution");
  execution.transition_to(BatchStatus::Started).expect("started");
  repo.update_job_execution(&execution).expect("update started");
  execution.transition_to(BatchStatus::Completed).expect("completed");
  repo.update_job_execution(&execution).expect("update completed");

  let mut forged = execution.clone();
  forged.status = BatchStatus::Failed;
  assert!(matches!(repo.update_job_execution(&forged), Err(BatchError::Conflict(_))));
  assert_eq!(repo.get_job_execution(execution.id).expect("get").status, BatchStatus::Completed);
}

#[test]
fn step_executions_are_returned_with_their_job_execution() {
  let repo = InMemoryJobRepository::new();
  let instance = repo.get_or_create_job_instance("etl", &JobParameters::new()).expect("instance");
  let execution = repo.create_job_execution(&instance, &instance.parameters).expect("execution");
  let mut step = repo.create_step_execution(execution.id, "csv-to-db").expect("step");
  step.transition_to(BatchStatus::Started).expect("started");
  step.read_count = 3;
  step.commit_count = 1;
  repo.update_step_execution(&step).expect("checkpoint");

  let loaded = repo.get_job_execution(execution.id).expect("get");
  let loaded_step = loaded.step_execution("csv-to-db").expect("step");
  assert_eq!(loaded_step.read_count, 3);
  assert_eq!(loaded_step.commit_count, 1);

  assert!(matches!(repo.get_job_execution(999), Err(BatchError::NotFound(_))));
  assert!(matches!(repo.create_step_execution(999, "x"), Err(BatchError::NotFound(_))));
}

#[test]
fn parameters_round_trip_through_json_and_keep_key() {
  let params = JobParameters::new().with_string("input", "people.csv")
                                   .with_long("run.id", 4)
                                   .with_date("at", Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
  let json = params.to_json().expect("json");
  let back = JobParameters::from_json(&json).expect("back");
  assert_eq!(back, params);
  assert_eq!(back.job_key(), params.job_key());
  assert_eq!(back.get_long("run.id"), Some(4));
}

#[test]
fn separators_and_types_inside_values_do_not_merge_instances() {
  let repo = InMemoryJobRepository::new();
  let packed = JobParameters::new().with_string("a", "1;b=2");
  let split = JobParameters::new().with_string("a", "1").with_string("b", "2");
  assert_ne!(packed.job_key(), split.job_key());
  let first = repo.get_or_create_job_instance("etl", &packed).expect("packed");
  let second = repo.get_or_create_job_instance("etl", &split).expect("split");
  assert_ne!(first.id, second.id);

  let text = JobParameters::new().with_string("run.id", "5");
  let number = JobParameters::new().with_long("run.id", 5);
  assert_ne!(text.job_key(), number.job_key());
  assert_ne!(repo.get_or_create_job_instance("etl", &text).expect("text").id,
             repo.get_or_create_job_instance("etl", &number).expect("number").id);
}
