use crate::config::EtlConfig;
use crate::errors::Result;
use batch::{ChunkStep, FlatFileItemWriter, StepBuilder};
use batch_persistence::{AgeCountCursorReader, Database};
use people_domain::AgeCount;

pub const STEP_NAME: &str = "db-to-csv";

/// Step `db-to-csv`: página de lectura = chunk size; una línea `age,count`
/// por grupo, en orden de edad.
pub fn build(config: &EtlConfig, db: &Database) -> Result<ChunkStep<AgeCount, AgeCount>> {
  let step = StepBuilder::new(STEP_NAME).chunk::<AgeCount>(config.chunk_size)
                                        .reader(AgeCountCursorReader::new(db.clone(), config.chunk_size))
                                        .writer(FlatFileItemWriter::new(&config.output, AgeCount::to_fields))
                                        .build()?;
  Ok(step)
}
