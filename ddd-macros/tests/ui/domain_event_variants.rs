use ddd_domain::domain_event::DomainEvent;
use ddd_macros::domain_event;

#[domain_event]
enum MixedEvent {
    Started,
    Renamed(String),
    Moved(i32, i32),
    #[event(event_version = 3)]
    Completed { result: i32 },
}

fn main() {
    assert_eq!(MixedEvent::Started.event_type(), "MixedEvent.Started");
    assert_eq!(MixedEvent::Renamed("x".into()).event_type(), "MixedEvent.Renamed");
    assert_eq!(MixedEvent::Moved(1, 2).event_version(), 1);
    assert_eq!(MixedEvent::Completed { result: 1 }.event_version(), 3);
}
