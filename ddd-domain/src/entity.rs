//! 实体（Entity）基础抽象
//!
//! 为聚合与实体提供统一的标识（Id）、瞬态判断与待发布领域事件队列。
//!
use crate::{
    domain_event::DomainEvent,
    error::{DomainError, DomainResult},
};
use std::{fmt, hash::Hash, slice::Iter, str::FromStr};
use uuid::Uuid;

/// 实体标识类型
///
/// 默认值（`Default`）即“尚未持久化”的哨兵值；`generate` 用于存储为瞬态实体分配标识。
pub trait Identity:
    Clone + Default + Eq + Hash + fmt::Display + fmt::Debug + FromStr + Send + Sync + 'static
{
    /// 根据存储分配的序列号生成标识（随机类标识可忽略该序列号）
    ///
    /// 序列号超出标识类型的取值范围时返回错误。
    fn generate(sequence: u64) -> DomainResult<Self>;

    /// 是否为默认值（未分配）
    fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

impl Identity for Uuid {
    fn generate(_sequence: u64) -> DomainResult<Self> {
        Ok(Uuid::new_v4())
    }
}

impl Identity for String {
    fn generate(_sequence: u64) -> DomainResult<Self> {
        Ok(ulid::Ulid::new().to_string())
    }
}

macro_rules! sequential_identity {
    ($($ty:ty),*) => {
        $(
            impl Identity for $ty {
                fn generate(sequence: u64) -> DomainResult<Self> {
                    <$ty>::try_from(sequence).map_err(|_| {
                        DomainError::persistence(format!(
                            "sequence {sequence} overflows {}",
                            stringify!($ty)
                        ))
                    })
                }
            }
        )*
    };
}

sequential_identity!(i32, i64, u32, u64);

/// 具备唯一标识与领域事件队列的实体抽象
pub trait Entity: Send + Sync {
    /// 实体标识类型
    type Id: Identity;
    /// 实体产生的领域事件类型
    type Event: DomainEvent;

    /// 获取实体标识
    fn id(&self) -> &Self::Id;

    /// 设置实体标识（由调用方在添加前或由存储在插入时分配）
    fn set_id(&mut self, id: Self::Id);

    /// 待发布的领域事件
    fn domain_events(&self) -> &DomainEvents<Self::Event>;

    fn domain_events_mut(&mut self) -> &mut DomainEvents<Self::Event>;

    /// 标识仍为默认值时视为瞬态（尚未持久化）
    fn is_transient(&self) -> bool {
        self.id().is_default()
    }

    /// 追加领域事件，提交前可多次调用
    fn add_domain_event(&mut self, event: Self::Event) {
        self.domain_events_mut().push(event);
    }

    /// 清空领域事件队列（幂等），仅由事件分发器在发布成功后调用
    fn clear_domain_events(&mut self) {
        self.domain_events_mut().clear();
    }
}

/// 领域事件队列：保持插入顺序，允许重复
#[derive(Debug, Clone, PartialEq)]
pub struct DomainEvents<E> {
    events: Vec<E>,
}

impl<E> Default for DomainEvents<E> {
    fn default() -> Self {
        Self { events: Vec::new() }
    }
}

impl<E> DomainEvents<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: E) {
        self.events.push(event);
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> Iter<'_, E> {
        self.events.iter()
    }

    pub fn as_slice(&self) -> &[E] {
        &self.events
    }

    /// 以当前队列为基础合并 `incoming`
    ///
    /// `incoming` 以当前队列开头时视为它的延续（例如读取副本后追加的事件），
    /// 直接采用；否则追加在当前队列之后。
    pub fn merged_with(mut self, incoming: Self) -> Self
    where
        E: PartialEq,
    {
        if incoming.events.starts_with(&self.events) {
            return incoming;
        }
        self.events.extend(incoming.events);
        self
    }
}

impl<'a, E> IntoIterator for &'a DomainEvents<E> {
    type Item = &'a E;
    type IntoIter = Iter<'a, E>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}
