use ddd_domain::domain_event::DomainEvent;
use ddd_domain::entity::Entity;
use ddd_macros::{domain_event, entity};
use uuid::Uuid;

#[domain_event]
enum OrderEvent {
    Placed { total: i64 },
    Cancelled,
}

#[entity(id = Uuid, event = OrderEvent)]
#[derive(Clone)]
struct Order {
    total: i64,
}

fn main() {
    let mut order = Order {
        id: Uuid::new_v4(),
        total: 42,
        ..Default::default()
    };
    assert!(!order.is_transient());

    order.add_domain_event(OrderEvent::Placed { total: 42 });
    order.add_domain_event(OrderEvent::Cancelled);

    let types: Vec<&str> = order.domain_events().iter().map(|e| e.event_type()).collect();
    assert_eq!(types, vec!["OrderEvent.Placed", "OrderEvent.Cancelled"]);
}
