use batch::{BatchError, JobEventKind, JobExecutionEvent, JobExecutionListener};
use log::{info, warn};
use people_domain::PeopleRepository;

/// Traza cada transición de job y step.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingJobListener;

impl JobExecutionListener for LoggingJobListener {
  fn on_event(&self, event: &JobExecutionEvent) -> batch::Result<()> {
    let job = &event.job_execution;
    match (&event.step_execution, event.kind) {
      (Some(step), JobEventKind::StepFailed) => {
        warn!("[{}#{}] {:?} '{}': {}", job.job_name, job.id, event.kind, step.step_name, step.exit_status.description)
      }
      (Some(step), _) => info!("[{}#{}] {:?} '{}' (leídos={}, escritos={}, filtrados={}, commits={}, rollbacks={})",
                               job.job_name,
                               job.id,
                               event.kind,
                               step.step_name,
                               step.read_count,
                               step.write_count,
                               step.filter_count,
                               step.commit_count,
                               step.rollback_count),
      (None, _) => {
        info!("[{}#{}] {:?} (estado {}, salida {})", job.job_name, job.id, event.kind, job.status, job.exit_status.code)
      }
    }
    Ok(())
  }
}

/// Al terminar el job lista todas las personas cargadas en la tabla.
pub struct PeopleReportListener<R> {
  repo: R,
}

impl<R: PeopleRepository> PeopleReportListener<R> {
  pub fn new(repo: R) -> Self {
    Self { repo }
  }

  /// Líneas del informe: una por persona, en orden de inserción.
  pub fn report(&self) -> batch::Result<Vec<String>> {
    let people = self.repo.list_people().map_err(|e| BatchError::Storage(e.to_string()))?;
    Ok(people.iter().map(|p| p.to_string()).collect())
  }
}

impl<R: PeopleRepository> JobExecutionListener for PeopleReportListener<R> {
  fn on_event(&self, event: &JobExecutionEvent) -> batch::Result<()> {
    if !matches!(event.kind, JobEventKind::JobCompleted | JobEventKind::JobFailed | JobEventKind::JobStopped) {
      return Ok(());
    }
    let lines = self.report()?;
    info!("job execution event: {:?} (ejecución {}), {} personas", event.kind, event.job_execution.id, lines.len());
    for line in lines {
      info!("{}", line);
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use people_domain::{InMemoryPeopleRepository, Person};

  #[test]
  fn report_lists_people_in_insertion_order() {
    let repo = InMemoryPeopleRepository::default();
    repo.save_all(&[Person::new("josh", 30, "josh@email.com").unwrap(),
                    Person::new("jane", 25, "jane@email.com").unwrap()])
        .unwrap();
    let listener = PeopleReportListener::new(repo);
    let lines = listener.report().unwrap();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("josh"));
  }
}
