use batch::stubs::{InMemoryItemReader, InMemoryJobRepository};
use batch::{BatchError, BatchStatus, FieldSet, FlatFileItemReader, FlatFileItemWriter, ItemReader, ItemWriter,
            JobBuilder, JobLauncher, JobParameters, LauncherConfig, StepBuilder, TransactionManager};
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::tempdir;

#[derive(Debug, Clone, PartialEq)]
struct Entry {
  name: String,
  age: i32,
  email: String,
}

fn entry_mapper(fs: &FieldSet) -> batch::Result<Entry> {
  Ok(Entry { name: fs.require("name")?.to_string(), age: fs.parse("age")?, email: fs.require("email")?.to_string() })
}

#[test]
fn reader_maps_trimmed_fields_and_skips_blank_lines() {
  let dir = tempdir().expect("tempdir");
  let path = dir.path().join("people.csv");
  fs::write(&path, "alice, 30 ,alice@email.com\n\nbob,25,bob@email.com\n").expect("write");

  let mut reader = FlatFileItemReader::from_path(&path, &["name", "age", "email"], entry_mapper);
  reader.open().expect("open");
  let mut out = Vec::new();
  while let Some(e) = reader.read().expect("read") {
    out.push(e);
  }
  reader.close().expect("close");

  assert_eq!(out,
             vec![Entry { name: "alice".into(), age: 30, email: "alice@email.com".into() },
                  Entry { name: "bob".into(), age: 25, email: "bob@email.com".into() }]);
}

#[test]
fn missing_file_is_a_read_error() {
  let dir = tempdir().expect("tempdir");
  let mut reader = FlatFileItemReader::from_path(dir.path().join("nope.csv"), &["name", "age", "email"], entry_mapper);
  assert!(matches!(reader.open(), Err(BatchError::Read(_))));
}

#[test]
fn mapper_error_becomes_parse_error_with_line() {
  let mut reader = FlatFileItemReader::from_bytes("a,1,a@x\nb,2,\n", &["name", "age", "email"], |fs: &FieldSet| {
    let email = fs.require("email")?;
    if email.is_empty() {
      return Err(BatchError::Transform("email vacío".into()));
    }
    entry_mapper(fs)
  });
  reader.open().expect("open");
  assert!(reader.read().expect("first").is_some());
  match reader.read() {
    Err(BatchError::Parse(p)) => {
      assert_eq!(p.line, 2);
      assert!(p.cause.contains("email vacío"));
    }
    other => panic!("unexpected {:?}", other),
  }
}

#[test]
fn writer_emits_one_line_per_item() {
  let dir = tempdir().expect("tempdir");
  let path = dir.path().join("out").join("ages.csv");
  let writer = FlatFileItemWriter::new(&path, |p: &(i32, i64)| vec![p.0.to_string(), p.1.to_string()]);
  let step = StepBuilder::new("dump").chunk::<(i32, i64)>(2)
                                     .reader(InMemoryItemReader::new(vec![(25, 1), (30, 2), (41, 7)]))
                                     .writer(writer)
                                     .build()
                                     .expect("step");
  let job = JobBuilder::new("dump-job").start(step).build().expect("job");
  let launcher = JobLauncher::new(Arc::new(InMemoryJobRepository::new()), LauncherConfig::default());
  let execution = launcher.run(&job, JobParameters::new()).expect("run");

  assert_eq!(execution.status, BatchStatus::Completed);
  assert_eq!(fs::read_to_string(&path).expect("read"), "25,1\n30,2\n41,7\n");
}

/// Falla el commit número `fail_at` (1-based).
struct FailingCommit {
  commits: AtomicUsize,
  fail_at: usize,
}

impl TransactionManager for FailingCommit {
  fn begin(&self) -> batch::Result<()> {
    Ok(())
  }

  fn commit(&self) -> batch::Result<()> {
    let n = self.commits.fetch_add(1, Ordering::SeqCst) + 1;
    if n == self.fail_at {
      return Err(BatchError::Storage("commit rechazado".into()));
    }
    Ok(())
  }

  fn rollback(&self) -> batch::Result<()> {
    Ok(())
  }
}

#[test]
fn rolled_back_chunk_is_truncated_from_output() {
  let dir = tempdir().expect("tempdir");
  let path = dir.path().join("ages.csv");
  let writer = FlatFileItemWriter::new(&path, |n: &i32| vec![n.to_string()]);
  let step = StepBuilder::new("dump").chunk::<i32>(2)
                                     .reader(InMemoryItemReader::new(vec![1, 2, 3, 4, 5]))
                                     .writer(writer)
                                     .transaction_manager(Arc::new(FailingCommit { commits: AtomicUsize::new(0),
                                                                                   fail_at: 2 }))
                                     .build()
                                     .expect("step");
  let job = JobBuilder::new("dump-job").start(step).build().expect("job");
  let launcher = JobLauncher::new(Arc::new(InMemoryJobRepository::new()), LauncherConfig::default());
  let execution = launcher.run(&job, JobParameters::new()).expect("run");

  assert_eq!(execution.status, BatchStatus::Failed);
  assert_eq!(fs::read_to_string(&path).expect("read"), "1\n2\n");
  let se = execution.step_execution("dump").expect("step");
  assert_eq!(se.rollback_count, 1);
  assert_eq!(se.commit_count, 1);
}

#[test]
fn writer_truncates_existing_file_on_open() {
  let dir = tempdir().expect("tempdir");
  let path = dir.path().join("ages.csv");
  fs::write(&path, "old,content\n").expect("seed");
  let mut writer = FlatFileItemWriter::new(&path, |n: &i32| vec![n.to_string()]);
  writer.open().expect("open");
  writer.close().expect("close");
  assert_eq!(fs::read_to_string(&path).expect("read"), "");
}

#[test]
fn invalid_utf8_keeps_line_number_and_original_text() {
  let mut reader = FlatFileItemReader::from_bytes(&b"alice,30,alice@email.com\nbo\xffb,31,bob@email.com\n"[..],
                                                  &["name", "age", "email"],
                                                  entry_mapper);
  reader.open().expect("open");
  assert!(reader.read().expect("first").is_some());
  match reader.read() {
    Err(BatchError::Parse(p)) => {
      assert_eq!(p.line, 2);
      assert_eq!(p.raw, "bo\u{fffd}b,31,bob@email.com");
      assert!(p.cause.contains("UTF-8"), "{}", p.cause);
    }
    other => panic!("unexpected {:?}", other),
  }
}

#[test]
fn mapper_errors_carry_the_line_as_written() {
  let mut reader =
    FlatFileItemReader::from_bytes("  bob,\"x,y\",bob@email.com \r\n", &["name", "age", "email"], entry_mapper);
  reader.open().expect("open");
  match reader.read() {
    Err(BatchError::Parse(p)) => {
      assert_eq!(p.line, 1);
      assert_eq!(p.raw, "  bob,\"x,y\",bob@email.com ");
      assert!(p.cause.contains("x,y"), "{}", p.cause);
    }
    other => panic!("unexpected {:?}", other),
  }
}
