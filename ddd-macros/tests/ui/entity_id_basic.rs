use ddd_domain::entity::Identity;
use ddd_macros::entity_id;
use uuid::Uuid;

#[entity_id]
struct UserId(Uuid);

#[entity_id]
struct TicketNo(u64);

fn main() {
    let id = UserId::new(Uuid::new_v4());
    let parsed: UserId = id.to_string().parse().unwrap();
    assert_eq!(parsed, id);
    assert!(!id.is_default());
    assert!(UserId::default().is_default());

    let generated = TicketNo::generate(7).unwrap();
    assert_eq!(generated, TicketNo::from(7));
    assert_eq!(u64::from(generated), 7);
    assert_eq!(format!("{}", TicketNo::new(3)), "3");
    assert!(TicketNo::generate(0).is_ok());
}
