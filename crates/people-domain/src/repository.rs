use crate::{AgeCount, DomainError, Person, MAX_AGE};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Operaciones de consulta y mantenimiento sobre la tabla de personas.
pub trait PeopleRepository: Send + Sync {
    /// Inserta personas en orden y devuelve cuántas se guardaron.
    fn save_all(&self, people: &[Person]) -> Result<usize, DomainError>;

    /// Todas las personas en orden de inserción.
    fn list_people(&self) -> Result<Vec<Person>, DomainError>;

    fn count_people(&self) -> Result<i64, DomainError>;

    /// Agregado `GROUP BY age`, ordenado por edad ascendente.
    fn count_by_age(&self) -> Result<Vec<AgeCount>, DomainError>;

    /// Vacía la tabla y devuelve las filas borradas.
    fn delete_all(&self) -> Result<usize, DomainError>;
}

/// Implementación en memoria para tests y desarrollo.
#[derive(Clone, Default)]
pub struct InMemoryPeopleRepository {
    people: Arc<Mutex<Vec<Person>>>,
}

impl InMemoryPeopleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<Person>>, DomainError> {
        self.people
            .lock()
            .map_err(|e| DomainError::ExternalError(format!("Mutex 'people' poisoned: {}", e)))
    }
}

impl PeopleRepository for InMemoryPeopleRepository {
    fn save_all(&self, people: &[Person]) -> Result<usize, DomainError> {
        if let Some(p) = people.iter().find(|p| !p.has_storable_age()) {
            return Err(DomainError::AgeOutOfRange { name: p.name().to_string(), age: p.age(), max: MAX_AGE });
        }
        let mut guard = self.lock()?;
        guard.extend(people.iter().cloned());
        Ok(people.len())
    }

    fn list_people(&self) -> Result<Vec<Person>, DomainError> {
        Ok(self.lock()?.clone())
    }

    fn count_people(&self) -> Result<i64, DomainError> {
        Ok(self.lock()?.len() as i64)
    }

    fn count_by_age(&self) -> Result<Vec<AgeCount>, DomainError> {
        let guard = self.lock()?;
        let mut counts: BTreeMap<i32, i64> = BTreeMap::new();
        for p in guard.iter() {
            *counts.entry(p.age()).or_insert(0) += 1;
        }
        Ok(counts.into_iter().map(|(age, count)| AgeCount::new(age, count)).collect())
    }

    fn delete_all(&self) -> Result<usize, DomainError> {
        let mut guard = self.lock()?;
        let n = guard.len();
        guard.clear();
        Ok(n)
    }
}
