use ddd_domain::domain_event::DomainEvent;
use ddd_macros::domain_event;

#[domain_event(version = 2)]
enum AccountEvent {
    Opened { owner: String },
    #[event(event_type = "account.closed", event_version = 5)]
    Closed { reason: String },
}

fn main() {
    let opened = AccountEvent::Opened {
        owner: "alice".into(),
    };
    assert_eq!(opened.event_type(), "AccountEvent.Opened");
    assert_eq!(opened.event_version(), 2);

    let closed = AccountEvent::Closed {
        reason: "requested".into(),
    };
    assert_eq!(closed.event_type(), "account.closed");
    assert_eq!(closed.event_version(), 5);
    assert_eq!(closed.clone(), closed);
}
