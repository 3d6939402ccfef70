//! 变更跟踪（ChangeTracker）
//!
//! 工作单元内的身份映射与显式脏集合：按聚合类型分组，组内保持跟踪顺序。
//! 组之间通过类型擦除的 `TrackedSet` 统一生成暂存变更、收集与清空领域事件。
//!
use crate::{
    aggregate_root::AggregateRoot,
    domain_event::SerializedEvent,
    entity::Entity,
    error::{DomainError, DomainResult},
    persist::{SerializedEntity, StagedChange},
};
use std::any::Any;

/// 被跟踪实体的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// 与存储一致
    Unchanged,
    /// 待插入
    Added,
    /// 待更新
    Modified,
    /// 待删除
    Deleted,
    /// 已从存储删除，仅为分发剩余领域事件而保留
    Detached,
}

impl EntryState {
    /// 对读取可见（未删除）
    pub fn is_visible(self) -> bool {
        !matches!(self, EntryState::Deleted | EntryState::Detached)
    }
}

#[derive(Debug)]
pub(crate) struct TrackedEntry<A> {
    pub(crate) entity: A,
    pub(crate) state: EntryState,
}

impl<A> TrackedEntry<A>
where
    A: AggregateRoot,
{
    /// 替换被跟踪的实例，合并两者的待发布事件
    pub(crate) fn replace_entity(&mut self, mut entity: A) {
        let pending = std::mem::take(self.entity.domain_events_mut());
        let incoming = std::mem::take(entity.domain_events_mut());
        *entity.domain_events_mut() = pending.merged_with(incoming);
        self.entity = entity;
    }
}

/// 单一聚合类型的跟踪集合
#[derive(Debug)]
pub(crate) struct EntrySet<A> {
    entries: Vec<TrackedEntry<A>>,
}

impl<A> Default for EntrySet<A> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<A> EntrySet<A>
where
    A: AggregateRoot,
{
    pub(crate) fn find(&self, id: &A::Id) -> Option<&TrackedEntry<A>> {
        self.entries.iter().find(|e| e.entity.id() == id)
    }

    pub(crate) fn find_mut(&mut self, id: &A::Id) -> Option<&mut TrackedEntry<A>> {
        self.entries.iter_mut().find(|e| e.entity.id() == id)
    }

    pub(crate) fn push(&mut self, entity: A, state: EntryState) {
        self.entries.push(TrackedEntry { entity, state });
    }

    pub(crate) fn remove(&mut self, id: &A::Id) {
        self.entries.retain(|e| e.entity.id() != id);
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = &TrackedEntry<A>> {
        self.entries.iter()
    }
}

/// 类型擦除后的跟踪集合
pub(crate) trait TrackedSet: Send + Sync {
    fn aggregate_type(&self) -> &'static str;

    fn staged_changes(&self) -> DomainResult<Vec<StagedChange>>;

    fn pending_events(&self) -> DomainResult<Vec<SerializedEvent>>;

    /// 清空全部非空事件队列，返回涉及的实体数
    fn clear_events(&mut self) -> usize;

    fn accept_changes(&mut self);

    fn len(&self) -> usize;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<A> TrackedSet for EntrySet<A>
where
    A: AggregateRoot,
{
    fn aggregate_type(&self) -> &'static str {
        A::TYPE
    }

    fn staged_changes(&self) -> DomainResult<Vec<StagedChange>> {
        let mut changes = Vec::new();
        for entry in &self.entries {
            let change = match entry.state {
                EntryState::Added => StagedChange::insert,
                EntryState::Modified => StagedChange::update,
                EntryState::Deleted => StagedChange::delete,
                EntryState::Unchanged | EntryState::Detached => continue,
            };
            changes.push(change(SerializedEntity::from_aggregate(&entry.entity)?));
        }
        Ok(changes)
    }

    fn pending_events(&self) -> DomainResult<Vec<SerializedEvent>> {
        let mut events = Vec::new();
        for entry in &self.entries {
            for event in entry.entity.domain_events() {
                events.push(SerializedEvent::from_domain_event(&entry.entity, event)?);
            }
        }
        Ok(events)
    }

    fn clear_events(&mut self) -> usize {
        let mut touched = 0;
        for entry in &mut self.entries {
            if !entry.entity.domain_events().is_empty() {
                entry.entity.clear_domain_events();
                touched += 1;
            }
        }
        self.entries.retain(|e| e.state != EntryState::Detached);
        touched
    }

    fn accept_changes(&mut self) {
        for entry in &mut self.entries {
            entry.state = match entry.state {
                EntryState::Added | EntryState::Modified => EntryState::Unchanged,
                EntryState::Deleted => EntryState::Detached,
                other => other,
            };
        }
        self.entries
            .retain(|e| e.state != EntryState::Detached || !e.entity.domain_events().is_empty());
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// 工作单元的跟踪状态，按首次接触的顺序保存各聚合类型
#[derive(Default)]
pub struct ChangeTracker {
    sets: Vec<Box<dyn TrackedSet>>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set<A>(&self) -> Option<&EntrySet<A>>
    where
        A: AggregateRoot,
    {
        self.sets
            .iter()
            .find_map(|s| s.as_any().downcast_ref::<EntrySet<A>>())
    }

    pub(crate) fn set_mut<A>(&mut self) -> DomainResult<&mut EntrySet<A>>
    where
        A: AggregateRoot,
    {
        if self.set::<A>().is_none() {
            self.sets.push(Box::new(EntrySet::<A>::default()));
        }
        self.sets
            .iter_mut()
            .find_map(|s| s.as_any_mut().downcast_mut::<EntrySet<A>>())
            .ok_or_else(|| DomainError::TypeMismatch {
                expected: A::TYPE.to_string(),
                found: "untracked aggregate type".to_string(),
            })
    }

    /// 被跟踪实体的状态
    pub fn state_of<A>(&self, id: &A::Id) -> Option<EntryState>
    where
        A: AggregateRoot,
    {
        self.set::<A>().and_then(|s| s.find(id)).map(|e| e.state)
    }

    /// 全部被跟踪的实体数（含待分发事件的已删除实体）
    pub fn tracked_len(&self) -> usize {
        self.sets.iter().map(|s| s.len()).sum()
    }

    /// 按跟踪顺序生成本次提交的暂存变更
    pub fn staged_changes(&self) -> DomainResult<Vec<StagedChange>> {
        let mut changes = Vec::new();
        for set in &self.sets {
            changes.extend(set.staged_changes()?);
        }
        Ok(changes)
    }

    /// 收集所有非空队列中的事件：组内按实体跟踪顺序、实体内按插入顺序
    pub fn pending_events(&self) -> DomainResult<Vec<SerializedEvent>> {
        let mut events = Vec::new();
        for set in &self.sets {
            events.extend(set.pending_events()?);
        }
        Ok(events)
    }

    pub fn clear_events(&mut self) -> usize {
        self.sets.iter_mut().map(|s| s.clear_events()).sum()
    }

    /// 提交成功后调用：新增/修改转为一致，删除的实体脱离跟踪
    pub fn accept_changes(&mut self) {
        for set in &mut self.sets {
            set.accept_changes();
        }
    }

    pub fn clear(&mut self) {
        self.sets.clear();
    }

    /// 当前跟踪的聚合类型（按首次接触顺序）
    pub fn aggregate_types(&self) -> Vec<&'static str> {
        self.sets.iter().map(|s| s.aggregate_type()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain_event::Notification;
    use ddd_macros::entity;
    use serde_json::json;

    #[entity(id = i64)]
    #[derive(Clone)]
    struct Order {
        total: i64,
    }

    impl AggregateRoot for Order {
        const TYPE: &'static str = "order";
    }

    #[entity(id = i64)]
    #[derive(Clone)]
    struct Invoice {
        number: String,
    }

    impl AggregateRoot for Invoice {
        const TYPE: &'static str = "invoice";
    }

    fn order(id: i64, events: &[&str]) -> Order {
        let mut o = Order {
            id,
            total: id * 10,
            ..Default::default()
        };
        for e in events {
            o.add_domain_event(Notification::new(*e, json!({})));
        }
        o
    }

    #[test]
    fn staged_changes_follow_entry_state() {
        let mut tracker = ChangeTracker::new();
        let set = tracker.set_mut::<Order>().unwrap();
        set.push(order(1, &[]), EntryState::Added);
        set.push(order(2, &[]), EntryState::Unchanged);
        set.push(order(3, &[]), EntryState::Modified);
        set.push(order(4, &[]), EntryState::Deleted);

        let kinds: Vec<_> = tracker
            .staged_changes()
            .unwrap()
            .iter()
            .map(|c| (c.kind, c.row.aggregate_id().to_string()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (crate::persist::ChangeKind::Insert, "1".to_string()),
                (crate::persist::ChangeKind::Update, "3".to_string()),
                (crate::persist::ChangeKind::Delete, "4".to_string()),
            ]
        );
    }

    #[test]
    fn events_are_harvested_across_types_in_tracking_order() {
        let mut tracker = ChangeTracker::new();
        tracker
            .set_mut::<Order>()
            .unwrap()
            .push(order(1, &["o1.a", "o1.b"]), EntryState::Added);
        let mut invoice = Invoice {
            id: 9,
            number: "INV-9".into(),
            ..Default::default()
        };
        invoice.add_domain_event(Notification::new("i9.a", json!({})));
        tracker
            .set_mut::<Invoice>()
            .unwrap()
            .push(invoice, EntryState::Unchanged);
        tracker
            .set_mut::<Order>()
            .unwrap()
            .push(order(2, &["o2.a"]), EntryState::Modified);

        let types: Vec<String> = tracker
            .pending_events()
            .unwrap()
            .iter()
            .map(|e| e.event_type().to_string())
            .collect();
        assert_eq!(types, vec!["o1.a", "o1.b", "o2.a", "i9.a"]);
        assert_eq!(tracker.aggregate_types(), vec!["order", "invoice"]);

        assert_eq!(tracker.clear_events(), 3);
        assert!(tracker.pending_events().unwrap().is_empty());
        assert_eq!(tracker.clear_events(), 0);
    }

    #[test]
    fn deleted_entities_stay_until_their_events_are_cleared() {
        let mut tracker = ChangeTracker::new();
        let set = tracker.set_mut::<Order>().unwrap();
        set.push(order(1, &["removed"]), EntryState::Deleted);
        set.push(order(2, &[]), EntryState::Deleted);

        tracker.accept_changes();
        assert_eq!(tracker.state_of::<Order>(&1), Some(EntryState::Detached));
        assert_eq!(tracker.state_of::<Order>(&2), None);
        assert!(tracker.staged_changes().unwrap().is_empty());

        assert_eq!(tracker.pending_events().unwrap().len(), 1);
        tracker.clear_events();
        assert_eq!(tracker.tracked_len(), 0);
    }
}
