//! 仓储 + 工作单元 + 事件分发 端到端场景
use async_trait::async_trait;
use ddd_domain::{
    aggregate_root::AggregateRoot,
    domain_event::{Notification, SerializedEvent},
    entity::Entity,
    error::{DomainError, DomainResult},
    eventing::{DomainEventDispatcher, EventBus},
    persist::{FaultKind, InMemoryStore, RetryStrategy},
    repository::{GenericRepository, Repository},
    specification::FnSpecification,
    unit_of_work::{TransactionalUnitOfWork, UnitOfWork},
    validation::{LengthRule, ValidatorChain},
};
use ddd_macros::entity;
use serde_json::json;
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

#[entity(id = i64)]
#[derive(Clone)]
struct Request {
    name: String,
}

impl AggregateRoot for Request {
    const TYPE: &'static str = "request";
}

fn request(name: &str) -> Request {
    Request {
        name: name.to_string(),
        ..Default::default()
    }
}

#[derive(Default)]
struct SpyBus {
    published: AtomicUsize,
    failing: AtomicBool,
}

impl SpyBus {
    fn published(&self) -> usize {
        self.published.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventBus for SpyBus {
    async fn publish(&self, _event: &SerializedEvent) -> DomainResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DomainError::event_bus("subscriber unavailable"));
        }
        self.published.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Fixture {
    store: InMemoryStore,
    bus: Arc<SpyBus>,
    uow: Arc<TransactionalUnitOfWork<InMemoryStore>>,
    repo: GenericRepository<Request, InMemoryStore>,
}

impl Fixture {
    fn new() -> Self {
        Self::on(InMemoryStore::new(), Arc::new(SpyBus::default()), RetryStrategy::none())
    }

    fn on(store: InMemoryStore, bus: Arc<SpyBus>, retry: RetryStrategy) -> Self {
        let uow = Arc::new(
            TransactionalUnitOfWork::builder()
                .store(store.clone())
                .dispatcher(DomainEventDispatcher::new(bus.clone()))
                .retry(retry)
                .build(),
        );
        let repo = GenericRepository::builder()
            .unit_of_work(uow.clone())
            .validators(
                ValidatorChain::new().with(LengthRule::new("name", 3, 10, |r: &Request| {
                    r.name.as_str()
                })),
            )
            .build();
        Self {
            store,
            bus,
            uow,
            repo,
        }
    }

    /// 同一存储上的新作用域
    fn reopen(&self) -> Self {
        Self::on(self.store.clone(), self.bus.clone(), RetryStrategy::none())
    }
}

#[tokio::test]
async fn add_and_commit_publishes_attached_event() {
    let fx = Fixture::new();
    let mut entity = request("Test");
    entity.add_domain_event(Notification::new("request.created", json!({ "name": "Test" })));

    let id = fx.repo.add(entity).await.unwrap();
    assert_ne!(id, 0);
    assert!(fx.uow.save_entities().await.unwrap());

    assert_eq!(fx.bus.published(), 1);
    assert!(fx.store.save_count() >= 1);
    let tracked = fx.repo.get_by_id(&id).await.unwrap();
    assert!(tracked.domain_events().is_empty());

    let stored = fx.reopen().repo.get_by_id(&id).await.unwrap();
    assert_eq!(stored.name, "Test");
}

#[tokio::test]
async fn add_and_commit_without_events_publishes_nothing() {
    let fx = Fixture::new();
    fx.repo.add(request("Test")).await.unwrap();
    fx.uow.save_entities().await.unwrap();

    assert_eq!(fx.bus.published(), 0);
    assert!(fx.store.save_count() >= 1);
    assert_eq!(fx.store.row_count("request").await, 1);
}

#[tokio::test]
async fn re_adding_a_persisted_entity_is_a_no_op() {
    let fx = Fixture::new();
    let id = fx.repo.add(request("Test")).await.unwrap();
    fx.uow.save_entities().await.unwrap();

    let persisted = fx.repo.get_by_id(&id).await.unwrap();
    assert_eq!(fx.repo.add(persisted).await.unwrap(), id);
    fx.uow.save_entities().await.unwrap();
    assert_eq!(fx.store.row_count("request").await, 1);
}

#[tokio::test]
async fn invalid_update_keeps_stored_name() {
    let fx = Fixture::new();
    let id = fx.repo.add(request("Test")).await.unwrap();
    fx.uow.save_entities().await.unwrap();

    let scope = fx.reopen();
    for bad in ["ab", "NA", "far too long a name"] {
        let mut entity = scope.repo.get_by_id(&id).await.unwrap();
        entity.name = bad.to_string();
        let err = scope.repo.update(entity).await.unwrap_err();
        assert_eq!(err.violations().map(<[_]>::len), Some(1), "{bad}");
    }
    scope.uow.save_entities().await.unwrap();

    assert_eq!(fx.reopen().repo.get_by_id(&id).await.unwrap().name, "Test");
}

#[tokio::test]
async fn valid_update_replaces_fields() {
    let fx = Fixture::new();
    let id = fx.repo.add(request("Test")).await.unwrap();
    fx.uow.save_entities().await.unwrap();

    let mut entity = fx.repo.get_by_id(&id).await.unwrap();
    entity.name = "Renamed".to_string();
    fx.repo.update(entity).await.unwrap();
    fx.uow.save_entities().await.unwrap();

    assert_eq!(fx.reopen().repo.get_by_id(&id).await.unwrap().name, "Renamed");
}

#[tokio::test]
async fn update_rejects_transient_and_missing_entities() {
    let fx = Fixture::new();

    let err = fx.repo.update(request("Test")).await.unwrap_err();
    assert!(matches!(err, DomainError::InvalidState { .. }));

    let mut ghost = request("Ghost");
    ghost.set_id(42);
    let err = fx.repo.update(ghost).await.unwrap_err();
    assert!(matches!(err, DomainError::NotFound { .. }));
}

#[tokio::test]
async fn remove_requires_a_persisted_id() {
    let fx = Fixture::new();
    assert!(matches!(
        fx.repo.remove(&0).await,
        Err(DomainError::NullArgument { name: "id" })
    ));
    assert!(matches!(
        fx.repo.remove(&99).await,
        Err(DomainError::NotFound { .. })
    ));

    let id = fx.repo.add(request("Test")).await.unwrap();
    fx.uow.save_entities().await.unwrap();

    fx.repo.remove(&id).await.unwrap();
    assert!(fx.repo.find_by_id(&id).await.unwrap().is_none());
    fx.uow.save_entities().await.unwrap();

    assert!(fx.reopen().repo.find_by_id(&id).await.unwrap().is_none());
    assert_eq!(fx.store.row_count("request").await, 0);
}

#[tokio::test]
async fn events_of_removed_entity_are_still_published() {
    let fx = Fixture::new();
    let id = fx.repo.add(request("Test")).await.unwrap();
    fx.uow.save_entities().await.unwrap();

    let mut entity = fx.repo.get_by_id(&id).await.unwrap();
    entity.add_domain_event(Notification::new("request.removed", json!({})));
    fx.repo.update(entity).await.unwrap();
    fx.repo.remove(&id).await.unwrap();
    fx.uow.save_entities().await.unwrap();

    assert_eq!(fx.bus.published(), 1);
    assert_eq!(fx.store.row_count("request").await, 0);
}

#[tokio::test]
async fn batch_with_one_invalid_element_stages_nothing() {
    let fx = Fixture::new();
    let err = fx
        .repo
        .add_range(vec![request("Alpha"), request("ab"), request("Gamma")])
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Validation { .. }));

    fx.uow.save_entities().await.unwrap();
    assert_eq!(fx.store.row_count("request").await, 0);
}

#[tokio::test]
async fn queries_apply_specifications() {
    let fx = Fixture::new();
    fx.repo
        .add_range(vec![request("Alpha"), request("Beta"), request("Avocado")])
        .await
        .unwrap();

    let starts_with_a = FnSpecification::new(|r: &Request| r.name.starts_with('A'));
    // 未提交的新增对本作用域内的查询可见
    assert_eq!(fx.repo.filter(&starts_with_a).await.unwrap().len(), 2);
    fx.uow.save_entities().await.unwrap();

    let scope = fx.reopen();
    let names: Vec<String> = scope
        .repo
        .filter(&starts_with_a)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.name)
        .collect();
    assert_eq!(names, vec!["Alpha", "Avocado"]);

    let first = scope.repo.first_or_default(&starts_with_a).await.unwrap();
    assert_eq!(first.map(|r| r.name).as_deref(), Some("Alpha"));
    assert_eq!(scope.repo.list().await.unwrap().len(), 3);

    let none = FnSpecification::new(|r: &Request| r.name.is_empty());
    assert!(scope.repo.first_or_default(&none).await.unwrap().is_none());
}

#[tokio::test]
async fn second_dispatch_publishes_nothing() {
    let fx = Fixture::new();
    let mut entity = request("Test");
    entity.add_domain_event(Notification::new("a", json!({})));
    entity.add_domain_event(Notification::new("b", json!({})));
    fx.repo.add(entity).await.unwrap();

    fx.uow.save_entities().await.unwrap();
    assert_eq!(fx.bus.published(), 2);
    assert_eq!(fx.uow.dispatch_domain_events().await.unwrap(), 0);
    assert_eq!(fx.bus.published(), 2);
}

#[tokio::test]
async fn publish_failure_leaves_data_durable_and_events_queued() {
    let fx = Fixture::new();
    fx.bus.failing.store(true, Ordering::SeqCst);
    let mut entity = request("Test");
    entity.add_domain_event(Notification::new("request.created", json!({})));
    let id = fx.repo.add(entity).await.unwrap();

    let err = fx.uow.save_entities().await.unwrap_err();
    assert!(matches!(err, DomainError::Publish { .. }));
    assert_eq!(fx.store.row_count("request").await, 1);
    assert_eq!(fx.repo.get_by_id(&id).await.unwrap().domain_events().len(), 1);

    fx.bus.failing.store(false, Ordering::SeqCst);
    assert_eq!(fx.uow.dispatch_domain_events().await.unwrap(), 1);
    assert_eq!(fx.bus.published(), 1);
}

#[tokio::test]
async fn transient_failures_within_bound_write_once() {
    let store = InMemoryStore::new();
    store.fail_next_flushes(2, FaultKind::Transient).await;
    let fx = Fixture::on(
        store,
        Arc::new(SpyBus::default()),
        RetryStrategy::fixed(3, Duration::from_millis(1)),
    );

    fx.repo.add(request("Test")).await.unwrap();
    assert!(fx.uow.save_entities().await.unwrap());

    assert_eq!(fx.store.flush_attempts(), 3);
    assert_eq!(fx.store.save_count(), 1);
    assert_eq!(fx.store.row_count("request").await, 1);
}

#[tokio::test]
async fn transient_failures_beyond_bound_are_fatal() {
    let store = InMemoryStore::new().transactional();
    store.fail_next_flushes(10, FaultKind::Transient).await;
    let fx = Fixture::on(
        store,
        Arc::new(SpyBus::default()),
        RetryStrategy::fixed(2, Duration::from_millis(1)),
    );
    let mut entity = request("Test");
    entity.add_domain_event(Notification::new("request.created", json!({})));
    fx.repo.add(entity).await.unwrap();

    let err = fx.uow.save_entities().await.unwrap_err();
    assert!(matches!(err, DomainError::RetriesExhausted { attempts: 3, .. }));
    assert!(err.is_persistence());
    assert_eq!(fx.store.rollback_count(), 3);
    assert_eq!(fx.store.row_count("request").await, 0);
    assert_eq!(fx.bus.published(), 0);
}

#[tokio::test]
async fn permanent_failure_is_not_retried() {
    let store = InMemoryStore::new();
    store.fail_next_flushes(1, FaultKind::Permanent).await;
    let fx = Fixture::on(
        store,
        Arc::new(SpyBus::default()),
        RetryStrategy::fixed(5, Duration::from_millis(1)),
    );
    fx.repo.add(request("Test")).await.unwrap();

    let err = fx.uow.save_entities().await.unwrap_err();
    assert!(matches!(err, DomainError::Persistence { .. }));
    assert_eq!(fx.store.flush_attempts(), 1);
}

#[tokio::test]
async fn cancellation_before_commit_is_reported() {
    let fx = Fixture::new();
    fx.repo.add(request("Test")).await.unwrap();
    fx.uow.cancellation_token().cancel();

    assert!(matches!(
        fx.uow.save_entities().await,
        Err(DomainError::Cancelled)
    ));
    assert!(matches!(fx.repo.list().await, Err(DomainError::Cancelled)));
    assert_eq!(fx.store.row_count("request").await, 0);
}

#[tokio::test]
async fn update_before_commit_keeps_staged_event() {
    let fx = Fixture::new();
    let mut entity = request("Test");
    entity.add_domain_event(Notification::new("request.created", json!({})));
    let id = fx.repo.add(entity).await.unwrap();

    // 新构造的实例不携带已暂存的事件
    fx.repo
        .update(Request {
            id,
            name: "Renamed".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    fx.uow.save_entities().await.unwrap();

    assert_eq!(fx.bus.published(), 1);
    let stored = fx.reopen().repo.get_by_id(&id).await.unwrap();
    assert_eq!(stored.name, "Renamed");
}

#[tokio::test]
async fn update_after_failed_publish_keeps_queued_event() {
    let fx = Fixture::new();
    fx.bus.failing.store(true, Ordering::SeqCst);
    let mut entity = request("Test");
    entity.add_domain_event(Notification::new("request.created", json!({})));
    let id = fx.repo.add(entity).await.unwrap();
    assert!(matches!(
        fx.uow.save_entities().await,
        Err(DomainError::Publish { .. })
    ));

    fx.bus.failing.store(false, Ordering::SeqCst);
    fx.repo
        .update(Request {
            id,
            name: "Renamed".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    fx.uow.save_entities().await.unwrap();

    assert_eq!(fx.bus.published(), 1);
    assert_eq!(fx.uow.dispatch_domain_events().await.unwrap(), 0);
}

#[tokio::test]
async fn update_of_fetched_copy_publishes_each_event_once() {
    let fx = Fixture::new();
    fx.bus.failing.store(true, Ordering::SeqCst);
    let mut entity = request("Test");
    entity.add_domain_event(Notification::new("request.created", json!({})));
    let id = fx.repo.add(entity).await.unwrap();
    assert!(fx.uow.save_entities().await.is_err());

    // 读取的副本已含未发布的事件
    let mut fetched = fx.repo.get_by_id(&id).await.unwrap();
    assert_eq!(fetched.domain_events().len(), 1);
    fetched.name = "Renamed".into();
    fetched.add_domain_event(Notification::new("request.renamed", json!({})));
    fx.repo.update(fetched).await.unwrap();

    fx.bus.failing.store(false, Ordering::SeqCst);
    fx.uow.save_entities().await.unwrap();
    assert_eq!(fx.bus.published(), 2);
}

#[tokio::test]
async fn transient_commit_failure_reruns_whole_transaction() {
    let store = InMemoryStore::new().transactional();
    store.fail_next_commits(1, FaultKind::Transient).await;
    let fx = Fixture::on(
        store,
        Arc::new(SpyBus::default()),
        RetryStrategy::fixed(2, Duration::from_millis(1)),
    );
    let mut entity = request("Test");
    entity.add_domain_event(Notification::new("request.created", json!({})));
    fx.repo.add(entity).await.unwrap();

    assert!(fx.uow.save_entities().await.unwrap());
    assert_eq!(fx.store.flush_attempts(), 2);
    assert_eq!(fx.store.save_count(), 1);
    assert_eq!(fx.store.row_count("request").await, 1);
    assert_eq!(fx.bus.published(), 1);
}

#[tokio::test]
async fn permanent_commit_failure_writes_nothing() {
    let store = InMemoryStore::new().transactional();
    store.fail_next_commits(1, FaultKind::Permanent).await;
    let fx = Fixture::on(
        store,
        Arc::new(SpyBus::default()),
        RetryStrategy::fixed(2, Duration::from_millis(1)),
    );
    fx.repo.add(request("Test")).await.unwrap();

    let err = fx.uow.save_entities().await.unwrap_err();
    assert!(matches!(err, DomainError::Persistence { .. }));
    assert_eq!(fx.store.flush_attempts(), 1);
    assert_eq!(fx.store.row_count("request").await, 0);
}
