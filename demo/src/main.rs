use anyhow::Result;
use async_trait::async_trait;
use ddd_application::{
    IdempotentCommandHandler, RequestTableConfig, StoreRequestManager, command::Command,
    command_handler::CommandHandler, context::AppContext, error::AppError,
    idempotency::CLIENT_REQUEST_TYPE,
};
use ddd_domain::{
    aggregate_root::AggregateRoot,
    config::PersistenceConfig,
    entity::Entity,
    eventing::{EventBus, InMemoryEventBus},
    persist::InMemoryStore,
    repository::{GenericRepository, Repository},
    unit_of_work::TransactionalUnitOfWork,
    validation::{LengthRule, ValidatorChain},
};
use ddd_macros::{domain_event, entity, entity_id};
use futures_util::StreamExt;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[entity_id]
struct CustomerId(i64);

#[domain_event]
enum CustomerEvent {
    #[event(event_type = "customer.registered")]
    Registered { name: String },
    #[event(event_type = "customer.renamed")]
    Renamed { from: String, to: String },
}

#[entity(id = CustomerId, event = CustomerEvent)]
#[derive(Clone)]
struct Customer {
    name: String,
}

impl AggregateRoot for Customer {
    const TYPE: &'static str = "customer";
}

fn customer_rules() -> ValidatorChain<Customer> {
    ValidatorChain::new().with(LengthRule::new("name", 3, 10, |c: &Customer| c.name.as_str()))
}

struct RegisterCustomer {
    name: String,
}

impl Command for RegisterCustomer {
    const NAME: &'static str = "RegisterCustomer";
}

struct RegisterCustomerHandler {
    customers: GenericRepository<Customer, InMemoryStore>,
}

#[async_trait]
impl CommandHandler<RegisterCustomer> for RegisterCustomerHandler {
    async fn handle(&self, _ctx: &AppContext, cmd: RegisterCustomer) -> Result<(), AppError> {
        let mut customer = Customer {
            name: cmd.name.clone(),
            ..Default::default()
        };
        customer.add_domain_event(CustomerEvent::Registered { name: cmd.name });

        let id = self.customers.add(customer).await?;
        self.customers.unit_of_work().save_entities().await?;
        info!(%id, "customer registered");
        Ok(())
    }
}

/// 每个请求一个工作单元
struct Scope {
    uow: Arc<TransactionalUnitOfWork<InMemoryStore>>,
}

impl Scope {
    fn open(store: &InMemoryStore, bus: Arc<dyn EventBus>, config: &PersistenceConfig) -> Result<Self> {
        let uow = TransactionalUnitOfWork::from_config(store.clone(), Some(bus), config)?;
        Ok(Self { uow: Arc::new(uow) })
    }

    fn customers(&self) -> GenericRepository<Customer, InMemoryStore> {
        GenericRepository::builder()
            .unit_of_work(self.uow.clone())
            .validators(customer_rules())
            .build()
    }

    fn register_handler(
        &self,
    ) -> IdempotentCommandHandler<RegisterCustomerHandler, StoreRequestManager<InMemoryStore>, Uuid>
    {
        IdempotentCommandHandler::new(
            RegisterCustomerHandler {
                customers: self.customers(),
            },
            Arc::new(StoreRequestManager::new(self.uow.clone())),
        )
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();

    let config = PersistenceConfig::from_json(
        r#"{ "retry": { "max_retry_count": 3, "base_delay_ms": 50, "max_retry_delay_ms": 200 } }"#,
    )?;
    let mapping = RequestTableConfig::default().register(config.store_mapping());
    let store = InMemoryStore::with_mapping(mapping).transactional();

    let bus = Arc::new(InMemoryEventBus::default());
    let mut events = bus.subscribe();
    let listener = tokio::spawn(async move {
        let mut received = 0usize;
        while let Some(event) = events.next().await {
            match event {
                Ok(e) => {
                    received += 1;
                    info!(
                        event_type = e.event_type(),
                        aggregate_id = e.aggregate_id(),
                        payload = %e.payload(),
                        "event received"
                    );
                }
                Err(err) => warn!(error = %err, "event stream lagged"),
            }
        }
        received
    });
    let bus: Arc<dyn EventBus> = bus;

    // 注册，并以相同幂等键重放
    let ctx = AppContext::with_idempotency_key(Uuid::new_v4().to_string());
    for _ in 0..2 {
        let scope = Scope::open(&store, bus.clone(), &config)?;
        scope
            .register_handler()
            .handle(&ctx, RegisterCustomer { name: "Alice".into() })
            .await?;
    }

    // 不合法的名称在暂存前即被拒绝
    {
        let scope = Scope::open(&store, bus.clone(), &config)?;
        let ctx = AppContext::with_idempotency_key(Uuid::new_v4().to_string());
        if let Err(err) = scope
            .register_handler()
            .handle(&ctx, RegisterCustomer { name: "Al".into() })
            .await
        {
            warn!(error = %err, "registration rejected");
        }
    }

    // 改名
    {
        let scope = Scope::open(&store, bus.clone(), &config)?;
        let customers = scope.customers();
        if let Some(mut alice) = customers.list().await?.into_iter().next() {
            let from = std::mem::replace(&mut alice.name, "Alicia".to_string());
            let to = alice.name.clone();
            alice.add_domain_event(CustomerEvent::Renamed { from, to });
            customers.update(alice).await?;
            customers.unit_of_work().save_entities().await?;
        }
    }

    {
        let scope = Scope::open(&store, bus.clone(), &config)?;
        for customer in scope.customers().list().await? {
            info!(id = %customer.id(), name = %customer.name, "stored customer");
        }
    }
    info!(
        customers = store.row_count(Customer::TYPE).await,
        requests = store.row_count(CLIENT_REQUEST_TYPE).await,
        tables = ?store.tables().await,
        saves = store.save_count(),
        "store summary"
    );

    // 关闭最后一个发送端后订阅流结束
    drop(bus);
    let received = listener.await?;
    info!(received, "done");
    Ok(())
}
