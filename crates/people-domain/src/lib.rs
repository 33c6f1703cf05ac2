mod age_count;
mod errors;
mod person;
mod repository;

pub use age_count::AgeCount;
pub use errors::DomainError;
pub use person::{Person, MAX_AGE};
pub use repository::{InMemoryPeopleRepository, PeopleRepository};
