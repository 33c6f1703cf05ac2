use crate::database::{ChunkSession, Database};
use crate::errors::{PersistenceError, Result};
use crate::schema;
use crate::schema::people::dsl as people_dsl;
use batch::{BatchError, ItemReader, ItemWriter};
use diesel::dsl::count_star;
use diesel::prelude::*;
use log::{debug, info};
use people_domain::{AgeCount, DomainError, PeopleRepository, Person};
use std::collections::VecDeque;
// Fila Diesel de la tabla people
#[derive(Debug, Insertable)]
#[diesel(table_name = schema::people)]
struct NewPersonRow<'a> {
  pub name: &'a str,
  pub age: i32,
  pub email: &'a str,
}
impl<'a> From<&'a Person> for NewPersonRow<'a> {
  fn from(p: &'a Person) -> Self {
    NewPersonRow { name: p.name(), age: p.age(), email: p.email() }
  }
}
fn insert_people(conn: &mut SqliteConnection, people: &[Person]) -> Result<usize> {
  let mut inserted = 0;
  for p in people {
    inserted += diesel::insert_into(schema::people::table).values(NewPersonRow::from(p)).execute(conn)?;
  }
  Ok(inserted)
}
fn load_age_counts(conn: &mut SqliteConnection, page: Option<(i64, i64)>) -> Result<Vec<AgeCount>> {
  let query = people_dsl::people.group_by(people_dsl::age)
                                .select((people_dsl::age, count_star()))
                                .order(people_dsl::age.asc());
  let rows: Vec<(i32, i64)> = match page {
    Some((limit, offset)) => query.limit(limit).offset(offset).load(conn)?,
    None => query.load(conn)?,
  };
  Ok(rows.into_iter().map(|(age, count)| AgeCount::new(age, count)).collect())
}
/// Writer de chunks sobre la tabla `people`. Inserta dentro de la
/// transacción abierta por `DieselTransactionManager` sobre la misma sesión;
/// nunca confirma por su cuenta.
pub struct PeopleTableWriter {
  session: ChunkSession,
}
impl PeopleTableWriter {
  pub fn new(session: ChunkSession) -> Self {
    Self { session }
  }
}
impl ItemWriter<Person> for PeopleTableWriter {
  fn write(&mut self, items: &[Person]) -> batch::Result<()> {
    let n = self.session.with(|c| insert_people(c, items))?;
    debug!("people: {} filas insertadas (pendientes de commit)", n);
    Ok(())
  }
}
/// Lee el agregado `GROUP BY age` página a página, en orden de edad.
pub struct AgeCountCursorReader {
  db: Database,
  page_size: i64,
  offset: i64,
  buffer: VecDeque<AgeCount>,
  exhausted: bool,
}
impl AgeCountCursorReader {
  pub fn new(db: Database, page_size: usize) -> Self {
    Self { db, page_size: page_size.max(1) as i64, offset: 0, buffer: VecDeque::new(), exhausted: false }
  }
  fn fetch_page(&mut self) -> Result<()> {
    let mut conn = self.db.conn()?;
    let page = load_age_counts(&mut conn, Some((self.page_size, self.offset)))?;
    debug!("age counts: página offset={} con {} filas", self.offset, page.len());
    self.exhausted = (page.len() as i64) < self.page_size;
    self.offset += page.len() as i64;
    self.buffer.extend(page);
    Ok(())
  }
}
impl ItemReader<AgeCount> for AgeCountCursorReader {
  fn open(&mut self) -> batch::Result<()> {
    self.offset = 0;
    self.buffer.clear();
    self.exhausted = false;
    Ok(())
  }
  fn read(&mut self) -> batch::Result<Option<AgeCount>> {
    if self.buffer.is_empty() && !self.exhausted {
      self.fetch_page().map_err(|e| BatchError::Read(e.to_string()))?;
    }
    Ok(self.buffer.pop_front())
  }
  fn close(&mut self) -> batch::Result<()> {
    self.buffer.clear();
    Ok(())
  }
}
/// Repo Diesel que implementa `PeopleRepository`.
#[derive(Clone)]
pub struct DieselPeopleRepository {
  db: Database,
}
impl DieselPeopleRepository {
  pub fn new(db: Database) -> Self {
    Self { db }
  }
}
impl PeopleRepository for DieselPeopleRepository {
  fn save_all(&self, people: &[Person]) -> std::result::Result<usize, DomainError> {
    let mut conn = self.db.conn()?;
    let n = conn.transaction::<_, PersistenceError, _>(|c| insert_people(c, people))?;
    info!("people: {} filas guardadas", n);
    Ok(n)
  }
  fn list_people(&self) -> std::result::Result<Vec<Person>, DomainError> {
    let mut conn = self.db.conn()?;
    let rows = people_dsl::people.select((people_dsl::name, people_dsl::age, people_dsl::email))
                                 .order(people_dsl::id.asc())
                                 .load::<(String, i32, String)>(&mut conn)
                                 .map_err(PersistenceError::from)?;
    rows.into_iter().map(|(name, age, email)| Person::new(&name, age, &email)).collect()
  }
  fn count_people(&self) -> std::result::Result<i64, DomainError> {
    let mut conn = self.db.conn()?;
    Ok(people_dsl::people.count().get_result::<i64>(&mut conn).map_err(PersistenceError::from)?)
  }
  fn count_by_age(&self) -> std::result::Result<Vec<AgeCount>, DomainError> {
    let mut conn = self.db.conn()?;
    Ok(load_age_counts(&mut conn, None)?)
  }
  fn delete_all(&self) -> std::result::Result<usize, DomainError> {
    let mut conn = self.db.conn()?;
    let n = diesel::delete(people_dsl::people).execute(&mut conn).map_err(PersistenceError::from)?;
    info!("people: {} filas borradas", n);
    Ok(n)
  }
}
