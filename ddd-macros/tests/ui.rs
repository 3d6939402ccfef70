#[test]
fn ui() {
    let t = trybuild::TestCases::new();
    t.pass("tests/ui/entity_basic.rs");
    t.pass("tests/ui/entity_custom_event.rs");
    t.pass("tests/ui/entity_id_basic.rs");
    t.pass("tests/ui/domain_event_basic.rs");
    t.pass("tests/ui/domain_event_variants.rs");
}
