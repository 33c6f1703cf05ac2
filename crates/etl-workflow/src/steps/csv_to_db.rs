use crate::config::EtlConfig;
use crate::errors::Result;
use batch::{ChunkStep, FieldSet, FlatFileItemReader, StepBuilder};
use batch_persistence::{Database, PeopleTableWriter};
use people_domain::Person;
use std::sync::Arc;

pub const STEP_NAME: &str = "csv-to-db";
/// Nombres posicionales de los campos de entrada.
pub const FIELD_NAMES: [&str; 3] = ["name", "age", "email"];

/// Convierte un registro en `Person`. Cualquier fallo de validación del
/// dominio se reporta como registro mal formado.
pub fn map_person(fields: &FieldSet) -> batch::Result<Person> {
  let name = fields.require("name")?;
  let age: i32 = fields.parse("age")?;
  let email = fields.require("email")?;
  Person::new(name, age, email).map_err(|e| fields.error(e.to_string()))
}

/// Lector del fichero de entrada configurado.
pub fn reader(config: &EtlConfig) -> FlatFileItemReader<Person> {
  FlatFileItemReader::from_path(&config.input, &FIELD_NAMES, map_person)
}

/// Step `csv-to-db`. El writer y el gestor de transacciones comparten
/// sesión, así cada chunk se inserta en su propia transacción.
pub fn build(config: &EtlConfig, db: &Database) -> Result<ChunkStep<Person, Person>> {
  let tm = db.transaction_manager()?;
  let writer = PeopleTableWriter::new(tm.session());
  let step = StepBuilder::new(STEP_NAME).chunk::<Person>(config.chunk_size)
                                        .reader(reader(config))
                                        .writer(writer)
                                        .transaction_manager(Arc::new(tm))
                                        .build()?;
  Ok(step)
}

#[cfg(test)]
mod tests {
  use super::*;
  use batch::{BatchError, ItemReader};

  fn read_all(bytes: &str) -> Vec<batch::Result<Person>> {
    let mut reader = FlatFileItemReader::from_bytes(bytes, &FIELD_NAMES, map_person);
    reader.open().unwrap();
    let mut out = Vec::new();
    loop {
      match reader.read() {
        Ok(Some(p)) => out.push(Ok(p)),
        Ok(None) => break,
        Err(e) => {
          out.push(Err(e));
          break;
        }
      }
    }
    out
  }

  #[test]
  fn maps_valid_lines() {
    let people = read_all("josh, 30 ,josh@email.com\njane,25,jane@email.com\n");
    assert_eq!(people.len(), 2);
    assert_eq!(people[0].as_ref().unwrap(), &Person::new("josh", 30, "josh@email.com").unwrap());
  }

  #[test]
  fn domain_violations_are_parse_errors() {
    let out = read_all("josh,30,josh@email.com\njane,-4,jane@email.com\n");
    match &out[1] {
      Err(BatchError::Parse(p)) => {
        assert_eq!(p.line, 2);
        assert!(p.raw.contains("jane"));
      }
      other => panic!("se esperaba ParseError: {:?}", other),
    }
  }
}
