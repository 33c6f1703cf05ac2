use people_domain::{AgeCount, DomainError, InMemoryPeopleRepository, PeopleRepository, Person};

fn person(name: &str, age: i32) -> Person {
  Person::new(name, age, &format!("{}@email.com", name)).expect("person")
}

#[test]
fn count_by_age_groups_and_orders_ascending() {
  let repo = InMemoryPeopleRepository::new();
  repo.save_all(&[person("josh", 30), person("jane", 30), person("bob", 25)]).expect("save");

  assert_eq!(repo.count_people().expect("count"), 3);
  assert_eq!(repo.count_by_age().expect("by age"), vec![AgeCount::new(25, 1), AgeCount::new(30, 2)]);
  let names: Vec<String> = repo.list_people().expect("list").iter().map(|p| p.name().to_string()).collect();
  assert_eq!(names, vec!["josh", "jane", "bob"]);
}

#[test]
fn out_of_range_age_rejects_whole_batch() {
  let repo = InMemoryPeopleRepository::new();
  let err = repo.save_all(&[person("ok", 10), person("old", 200)]).unwrap_err();
  assert!(matches!(err, DomainError::AgeOutOfRange { age: 200, .. }));
  assert_eq!(repo.count_people().expect("count"), 0);
}

#[test]
fn delete_all_empties_the_table() {
  let repo = InMemoryPeopleRepository::new();
  repo.save_all(&[person("lois", 1), person("tammy", 2)]).expect("save");
  assert_eq!(repo.delete_all().expect("delete"), 2);
  assert!(repo.list_people().expect("list").is_empty());
  assert!(repo.count_by_age().expect("by age").is_empty());
}

#[test]
fn age_count_renders_as_output_line() {
  let c = AgeCount::new(41, 7);
  assert_eq!(c.to_string(), "41,7");
  assert_eq!(c.to_fields(), vec!["41".to_string(), "7".to_string()]);
  let json = serde_json::to_string(&c).expect("json");
  assert!(json.contains("\"age\":41"));
}
