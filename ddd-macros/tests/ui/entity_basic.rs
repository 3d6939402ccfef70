use ddd_domain::domain_event::Notification;
use ddd_domain::entity::Entity;
use ddd_macros::entity;

#[entity]
struct Account {
    name: String,
}

#[entity(id = i64, debug = false)]
#[derive(Clone)]
struct Counter {
    value: u32,
}

impl std::fmt::Debug for Counter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Counter({})", self.value)
    }
}

fn main() {
    let mut a = Account {
        name: "alice".into(),
        ..Default::default()
    };
    assert!(a.is_transient());
    a.set_id("acc-1".to_string());
    assert_eq!(a.id(), "acc-1");
    assert_eq!(a.name, "alice");

    a.add_domain_event(Notification::new("account.opened", Default::default()));
    assert_eq!(a.domain_events().len(), 1);
    a.clear_domain_events();
    assert!(a.domain_events().is_empty());

    let c = Counter::default();
    assert_eq!(*c.id(), 0);
    assert_eq!(format!("{:?}", c.clone()), "Counter(0)");
}
