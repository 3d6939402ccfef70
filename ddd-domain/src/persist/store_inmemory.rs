//! 内存版存储（InMemoryStore）
//!
//! 满足 `Store` 协议的进程内实现，按 `StoreMapping` 解析出的表名分表保存行：
//! - `flush`：整批校验后一次性应用，任一条变更冲突则整批不生效；
//! - 可选事务模式：`begin_transaction` 返回独占事务，提交时才对外可见；
//! - 故障注入：让接下来的若干次 flush/commit 以瞬时或永久错误失败；
//! - 典型用途：测试环境、示例与本地开发。
//!
use crate::{
    error::{DomainError, DomainResult as Result},
    persist::{
        ChangeKind, SerializedEntity, StagedChange, Store, StoreMapping, StoreTransaction,
        TableName,
    },
};
use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};
use tokio::sync::Mutex;
use tracing::debug;

/// 注入故障的类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    Transient,
    Permanent,
}

/// 注入故障的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultStage {
    Flush,
    Commit,
}

#[derive(Debug)]
struct FaultPlan {
    remaining: usize,
    kind: FaultKind,
    stage: FaultStage,
}

#[derive(Debug, Default, Clone)]
struct Table {
    // aggregate_id -> (插入序号, 行)
    rows: HashMap<String, (u64, SerializedEntity)>,
}

#[derive(Debug, Default)]
struct State {
    tables: HashMap<TableName, Table>,
    sequences: HashMap<String, u64>,
    fault: Option<FaultPlan>,
    next_ordinal: u64,
}

impl State {
    fn take_fault(&mut self, stage: FaultStage) -> Option<DomainError> {
        let plan = self.fault.as_mut()?;
        if plan.stage != stage || plan.remaining == 0 {
            return None;
        }
        plan.remaining -= 1;
        let err = match plan.kind {
            FaultKind::Transient => DomainError::transient(format!("injected {stage:?} failure")),
            FaultKind::Permanent => DomainError::persistence(format!("injected {stage:?} failure")),
        };
        if plan.remaining == 0 {
            self.fault = None;
        }
        Some(err)
    }

    /// 整批应用：先在副本上执行，全部成功后再替换
    fn apply(&mut self, mapping: &StoreMapping, changes: &[StagedChange]) -> Result<usize> {
        let mut tables = self.tables.clone();
        let mut ordinal = self.next_ordinal;

        for change in changes {
            let row = &change.row;
            let table = tables
                .entry(mapping.table_for(row.aggregate_type()))
                .or_default();
            let id = row.aggregate_id().to_string();

            match change.kind {
                ChangeKind::Insert => {
                    if table.rows.contains_key(&id) {
                        return Err(DomainError::persistence(format!(
                            "duplicate key: {}/{}",
                            row.aggregate_type(),
                            id
                        )));
                    }
                    table.rows.insert(id, (ordinal, row.clone()));
                    ordinal += 1;
                }
                ChangeKind::Update => match table.rows.get_mut(&id) {
                    Some((_, existing)) => *existing = row.clone(),
                    None => {
                        return Err(DomainError::persistence(format!(
                            "update affected no rows: {}/{}",
                            row.aggregate_type(),
                            id
                        )));
                    }
                },
                ChangeKind::Delete => {
                    if table.rows.remove(&id).is_none() {
                        return Err(DomainError::persistence(format!(
                            "delete affected no rows: {}/{}",
                            row.aggregate_type(),
                            id
                        )));
                    }
                }
            }
        }

        self.tables = tables;
        self.next_ordinal = ordinal;
        Ok(changes.len())
    }
}

#[derive(Debug, Default)]
struct Counters {
    flush_attempts: AtomicUsize,
    saves: AtomicUsize,
    rollbacks: AtomicUsize,
}

/// 内存存储，可克隆，克隆体共享同一份数据
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    mapping: Arc<StoreMapping>,
    transactional: bool,
    state: Arc<Mutex<State>>,
    counters: Arc<Counters>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mapping(mapping: StoreMapping) -> Self {
        Self {
            mapping: Arc::new(mapping),
            ..Self::default()
        }
    }

    /// 启用显式事务模式
    pub fn transactional(mut self) -> Self {
        self.transactional = true;
        self
    }

    pub fn mapping(&self) -> &StoreMapping {
        &self.mapping
    }

    /// 让接下来的 `count` 次 flush 失败
    pub async fn fail_next_flushes(&self, count: usize, kind: FaultKind) {
        self.inject(count, kind, FaultStage::Flush).await;
    }

    /// 让接下来的 `count` 次事务提交失败
    pub async fn fail_next_commits(&self, count: usize, kind: FaultKind) {
        self.inject(count, kind, FaultStage::Commit).await;
    }

    async fn inject(&self, count: usize, kind: FaultKind, stage: FaultStage) {
        let mut state = self.state.lock().await;
        state.fault = (count > 0).then_some(FaultPlan {
            remaining: count,
            kind,
            stage,
        });
    }

    /// 直接写入一行（绕过工作单元，用于准备测试数据）
    pub async fn seed(&self, row: SerializedEntity) -> Result<()> {
        let mut state = self.state.lock().await;
        state.apply(&self.mapping, &[StagedChange::insert(row)])?;
        Ok(())
    }

    /// 调用 flush（含事务内 flush）的总次数，无论成功与否
    pub fn flush_attempts(&self) -> usize {
        self.counters.flush_attempts.load(Ordering::SeqCst)
    }

    /// 成功落盘的次数（非事务 flush 或事务 commit）
    pub fn save_count(&self) -> usize {
        self.counters.saves.load(Ordering::SeqCst)
    }

    pub fn rollback_count(&self) -> usize {
        self.counters.rollbacks.load(Ordering::SeqCst)
    }

    /// 某聚合类型当前已提交的行数
    pub async fn row_count(&self, aggregate_type: &str) -> usize {
        let table = self.mapping.table_for(aggregate_type);
        let state = self.state.lock().await;
        state.tables.get(&table).map_or(0, |t| t.rows.len())
    }

    /// 当前存在数据的表名
    pub async fn tables(&self) -> Vec<TableName> {
        let state = self.state.lock().await;
        state
            .tables
            .iter()
            .filter(|(_, t)| !t.rows.is_empty())
            .map(|(name, _)| name.clone())
            .collect()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn next_sequence(&self, aggregate_type: &str) -> Result<u64> {
        let mut state = self.state.lock().await;
        let seq = state.sequences.entry(aggregate_type.to_string()).or_insert(0);
        *seq += 1;
        Ok(*seq)
    }

    async fn load(
        &self,
        aggregate_type: &str,
        aggregate_id: &str,
    ) -> Result<Option<SerializedEntity>> {
        let table = self.mapping.table_for(aggregate_type);
        let state = self.state.lock().await;
        Ok(state
            .tables
            .get(&table)
            .and_then(|t| t.rows.get(aggregate_id))
            .map(|(_, row)| row.clone()))
    }

    async fn load_all(&self, aggregate_type: &str) -> Result<Vec<SerializedEntity>> {
        let table = self.mapping.table_for(aggregate_type);
        let state = self.state.lock().await;
        let mut rows: Vec<_> = state
            .tables
            .get(&table)
            .map(|t| t.rows.values().cloned().collect())
            .unwrap_or_default();
        rows.sort_by_key(|(ordinal, _)| *ordinal);
        Ok(rows.into_iter().map(|(_, row)| row).collect())
    }

    async fn flush(&self, changes: &[StagedChange]) -> Result<usize> {
        self.counters.flush_attempts.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().await;
        if let Some(err) = state.take_fault(FaultStage::Flush) {
            return Err(err);
        }
        let affected = state.apply(&self.mapping, changes)?;
        self.counters.saves.fetch_add(1, Ordering::SeqCst);
        debug!(affected, "in-memory store flushed");
        Ok(affected)
    }

    async fn begin_transaction(&self) -> Result<Option<Box<dyn StoreTransaction>>> {
        if !self.transactional {
            return Ok(None);
        }
        Ok(Some(Box::new(InMemoryTransaction {
            store: self.clone(),
            pending: Vec::new(),
        })))
    }
}

/// 内存事务：flush 只暂存，commit 时整批应用
struct InMemoryTransaction {
    store: InMemoryStore,
    pending: Vec<StagedChange>,
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn flush(&mut self, changes: &[StagedChange]) -> Result<usize> {
        self.store
            .counters
            .flush_attempts
            .fetch_add(1, Ordering::SeqCst);
        let mut state = self.store.state.lock().await;
        if let Some(err) = state.take_fault(FaultStage::Flush) {
            return Err(err);
        }
        self.pending.extend_from_slice(changes);
        Ok(changes.len())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let mut state = self.store.state.lock().await;
        if let Some(err) = state.take_fault(FaultStage::Commit) {
            return Err(err);
        }
        let affected = state.apply(&self.store.mapping, &self.pending)?;
        self.store.counters.saves.fetch_add(1, Ordering::SeqCst);
        debug!(affected, "in-memory transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.store.counters.rollbacks.fetch_add(1, Ordering::SeqCst);
        debug!(discarded = self.pending.len(), "in-memory transaction rolled back");
        Ok(())
    }
}
