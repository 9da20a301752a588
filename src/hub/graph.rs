//! Hub 计算图
//!
//! 提供节点 arena 与变更传播：
//! - 节点按创建顺序编号，订阅只能指向已存在的节点，ID 顺序即拓扑序
//! - 源节点写入后按 ID 升序推进工作队列，菱形依赖中每个节点只在全部上游就绪后计算一次
//! - 某个节点失败不会阻断其它分支，失败节点的下游保持旧结果
//! - 所有操作同步完成，调用返回时整张图已收敛

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use super::node::{ChainHub, Node, Slot, SourceNode};
use super::pairs::PairHub;
use super::{Handle, HubEvent, Indicator, NodeId, PairIndicator, Provider, SourceHandle};
use crate::series::{CacheAct, Series, SeriesCache, Timestamp};
use crate::utils::config::HubConfig;
use crate::{HubError, Result};

/// 跨线程共享的计算图 (同一时刻只有一个写入者)
pub type SharedGraph = Arc<Mutex<HubGraph>>;

/// 计算图
pub struct HubGraph {
    slots: Vec<Slot>,
    config: HubConfig,
}

impl Default for HubGraph {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            config: HubConfig::default(),
        }
    }
}

impl HubGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: HubConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            slots: Vec::new(),
            config,
        })
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn into_shared(self) -> SharedGraph {
        Arc::new(Mutex::new(self))
    }

    pub fn node_count(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub(crate) fn slots_mut(&mut self) -> &mut [Slot] {
        &mut self.slots
    }

    // ═══════════════════════════════════════════════════════════════════════
    // 节点管理
    // ═══════════════════════════════════════════════════════════════════════

    /// 新建源节点
    pub fn add_source<T>(&mut self, name: impl Into<String>) -> SourceHandle<T>
    where
        T: Series + Clone + PartialEq + Send + 'static,
    {
        let name = name.into();
        log::info!("Source {} created", name);
        let node = SourceNode::<T>::new(name, self.config.overflow_threshold);
        SourceHandle::new(self.insert_node(Box::new(node)))
    }

    /// 在 provider 上挂接单上游公式，并用上游现有历史完成回填
    ///
    /// 回填失败 (构造错误) 时节点不会进入图
    pub fn attach<I, F>(&mut self, provider: &impl Provider<I>, formula: F) -> Result<Handle<F::Output>>
    where
        I: Series + Send + 'static,
        F: Indicator<I>,
    {
        let provider_id = provider.node_id();
        self.slot(provider_id)?;

        let mut node = ChainHub::<I, F>::new(formula, provider_id);
        if let Err(err) = node.rebuild(&self.slots) {
            log::warn!("{}: construction failed: {}", node.name(), err);
            return Err(err);
        }

        log::info!("{} attached to {} ({} records)", node.name(), self.slots[provider_id.0].node.name(), node.len());
        Ok(Handle::new(self.insert_node(Box::new(node))))
    }

    /// 挂接双上游公式，两侧现有历史必须按位置对齐
    pub fn attach_pair<I, F>(
        &mut self,
        a: &impl Provider<I>,
        b: &impl Provider<I>,
        formula: F,
    ) -> Result<Handle<F::Output>>
    where
        I: Series + Send + 'static,
        F: PairIndicator<I>,
    {
        let (a, b) = (a.node_id(), b.node_id());
        self.slot(a)?;
        self.slot(b)?;

        let mut node = PairHub::<I, F>::new(formula, a, b);
        if let Err(err) = node.rebuild(&self.slots) {
            log::warn!("{}: construction failed: {}", node.name(), err);
            return Err(err);
        }

        log::info!("{} attached to {} and {}", node.name(), a, b);
        Ok(Handle::new(self.insert_node(Box::new(node))))
    }

    fn insert_node(&mut self, node: Box<dyn Node>) -> NodeId {
        let id = NodeId(self.slots.len());
        let providers = node.providers().to_vec();
        self.slots.push(Slot::new(node));
        for provider in providers {
            self.subscribe(provider, id);
        }
        id
    }

    fn subscribe(&mut self, provider: NodeId, observer: NodeId) {
        let observers = &mut self.slots[provider.0].observers;
        if !observers.contains(&observer) {
            observers.push(observer);
        }
    }

    fn slot(&self, id: NodeId) -> Result<&Slot> {
        self.slots.get(id.0).ok_or(HubError::NodeNotFound(id))
    }

    fn source_mut<T>(&mut self, id: NodeId) -> Result<&mut SourceNode<T>>
    where
        T: Series + Clone + PartialEq + Send + 'static,
    {
        self.slots
            .get_mut(id.0)
            .ok_or(HubError::NodeNotFound(id))?
            .node
            .as_any_mut()
            .downcast_mut::<SourceNode<T>>()
            .ok_or(HubError::TypeMismatch(id))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // 写入 (只有源节点接受)
    // ═══════════════════════════════════════════════════════════════════════

    /// 写入一条记录：追加/迟到插入/原位修正/幂等重发
    pub fn add<T>(&mut self, source: &SourceHandle<T>, record: T) -> Result<CacheAct>
    where
        T: Series + Clone + PartialEq + Send + 'static,
    {
        let id = source.node_id();
        let act = {
            let node = self.source_mut::<T>(id)?;
            node.ensure_healthy()?;
            node.plan(&record)
        };

        if !matches!(act, CacheAct::NoopResend(_)) {
            self.check_retained(id, act.index())?;
        }

        // 被拒绝的写入不计入溢出保护
        let events = {
            let node = self.source_mut::<T>(id)?;
            node.track_arrival(record.timestamp())?;
            node.commit(act, record)?
        };
        self.propagate(id, events)?;
        self.auto_prune()?;
        Ok(act)
    }

    /// 迟到记录写入 (与 `add` 相同的判定，位置由时间键决定)
    pub fn insert<T>(&mut self, source: &SourceHandle<T>, record: T) -> Result<CacheAct>
    where
        T: Series + Clone + PartialEq + Send + 'static,
    {
        let timestamp = record.timestamp();
        let act = self.add(source, record)?;
        log::debug!("Late arrival at {} resolved as {:?}", timestamp, act);
        Ok(act)
    }

    /// 批量写入，`ordered = false` 时先按时间键排序 (同一时间键后写覆盖先写)
    ///
    /// 返回真正改变了缓存的记录数
    pub fn add_batch<T>(&mut self, source: &SourceHandle<T>, mut records: Vec<T>, ordered: bool) -> Result<usize>
    where
        T: Series + Clone + PartialEq + Send + 'static,
    {
        if !ordered {
            records.sort_by_key(|r| r.timestamp());
        }

        let mut applied = 0;
        for record in records {
            if !matches!(self.add(source, record)?, CacheAct::NoopResend(_)) {
                applied += 1;
            }
        }
        Ok(applied)
    }

    /// 按位置删除
    pub fn remove_at<T>(&mut self, source: &SourceHandle<T>, index: usize) -> Result<T>
    where
        T: Series + Clone + PartialEq + Send + 'static,
    {
        let id = source.node_id();
        {
            let node = self.source_mut::<T>(id)?;
            node.ensure_healthy()?;
            node.cache().get(index)?;
        }
        self.check_retained(id, index)?;

        let (removed, events) = self.source_mut::<T>(id)?.delete(index)?;
        self.propagate(id, events)?;
        Ok(removed)
    }

    /// 删除与 record 完全一致的缓存记录，返回其原位置
    pub fn remove<T>(&mut self, source: &SourceHandle<T>, record: &T) -> Result<usize>
    where
        T: Series + Clone + PartialEq + Send + 'static,
    {
        let timestamp = record.timestamp();
        let index = {
            let cache = self.cache(source)?;
            cache
                .position_of(timestamp, true)
                .filter(|&i| &cache[i] == record)
                .ok_or(HubError::RecordNotFound(timestamp))?
        };
        self.remove_at(source, index)?;
        Ok(index)
    }

    /// 删除 [from, len)，返回删除数量
    pub fn remove_range<T>(&mut self, source: &SourceHandle<T>, from: usize) -> Result<usize>
    where
        T: Series + Clone + PartialEq + Send + 'static,
    {
        let id = source.node_id();
        self.source_mut::<T>(id)?.ensure_healthy()?;
        if from < self.slot(id)?.node.len() {
            self.check_retained(id, from)?;
        }

        let (removed, events) = self.source_mut::<T>(id)?.truncate_from(from)?;
        self.propagate(id, events)?;
        Ok(removed)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // 查询
    // ═══════════════════════════════════════════════════════════════════════

    pub fn cache<T: 'static>(&self, provider: &impl Provider<T>) -> Result<&SeriesCache<T>> {
        let id = provider.node_id();
        self.slot(id)?
            .node
            .cache_any()
            .downcast_ref::<SeriesCache<T>>()
            .ok_or(HubError::TypeMismatch(id))
    }

    /// 节点当前的全部输出 (按时间升序)
    pub fn results<T: Series + 'static>(&self, provider: &impl Provider<T>) -> Result<&[T]> {
        self.cache(provider).map(|c| c.as_slice())
    }

    pub fn name_of(&self, id: NodeId) -> Result<&str> {
        Ok(self.slot(id)?.node.name())
    }

    pub fn subscriber_count(&self, id: NodeId) -> Result<usize> {
        Ok(self.slot(id)?.observers.len())
    }

    pub fn is_faulted(&self, id: NodeId) -> Result<bool> {
        Ok(self.slot(id)?.node.is_faulted())
    }

    pub fn reset_fault(&mut self, id: NodeId) -> Result<()> {
        self.slot(id)?;
        self.slots[id.0].node.reset_fault();
        log::info!("{}: fault cleared", self.slots[id.0].node.name());
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // 订阅管理
    // ═══════════════════════════════════════════════════════════════════════

    /// 停止接收上游通知，已有结果保留但不再更新
    pub fn unsubscribe(&mut self, id: NodeId) -> Result<()> {
        let providers = self.slot(id)?.node.providers().to_vec();
        for provider in providers {
            self.slots[provider.0].observers.retain(|o| *o != id);
        }
        log::info!("{}: unsubscribed", self.slots[id.0].node.name());
        Ok(())
    }

    /// 通知所有订阅者结束，返回解除订阅的数量
    pub fn end_transmission(&mut self, id: NodeId) -> Result<usize> {
        let observers = self.slot(id)?.observers.clone();
        for observer in &observers {
            self.unsubscribe(*observer)?;
        }
        log::info!("{}: transmission ended ({} observers)", self.slots[id.0].node.name(), observers.len());
        Ok(observers.len())
    }

    /// 重新订阅上游并基于上游当前内容重建自身及下游
    pub fn reinitialize(&mut self, id: NodeId) -> Result<()> {
        let providers = self.slot(id)?.node.providers().to_vec();
        for provider in providers {
            self.subscribe(provider, id);
        }
        self.rebuild(id)
    }

    /// 基于上游保留的历史完整重建自身及所有下游
    pub fn rebuild(&mut self, id: NodeId) -> Result<()> {
        self.slot(id)?;
        let mut first_error = None;
        for node in self.affected_nodes(id) {
            let (upstream, rest) = self.slots.split_at_mut(node.0);
            if let Err(err) = rest[0].node.rebuild(upstream) {
                log::warn!("{}: rebuild failed: {}", rest[0].node.name(), err);
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// 从 timestamp 起 (含) 重算，结果变化的部分继续向下游传播
    pub fn rebuild_since<T>(&mut self, provider: &impl Provider<T>, timestamp: Timestamp) -> Result<()>
    where
        T: Series + 'static,
    {
        let id = provider.node_id();
        let start = self.cache(provider)?.insertion_point(timestamp);
        let events = {
            let (upstream, rest) = self.slots.split_at_mut(id.0);
            rest[0].node.react(upstream, start)?
        };
        self.propagate(id, events)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // 传播
    // ═══════════════════════════════════════════════════════════════════════

    /// 自身 + 全部下游 (按拓扑序)
    fn affected_nodes(&self, origin: NodeId) -> Vec<NodeId> {
        let mut affected = HashSet::new();
        let mut queue = VecDeque::from([origin]);

        while let Some(id) = queue.pop_front() {
            if affected.insert(id) {
                queue.extend(self.slots[id.0].observers.iter().copied());
            }
        }

        let mut ordered: Vec<NodeId> = affected.into_iter().collect();
        ordered.sort();
        ordered
    }

    /// 位置 index 的变更是否会让某个下游需要已裁剪的历史
    ///
    /// 按传播时的顺序推演每个节点收到的最小起点：向前看的节点
    /// 会把起点再往前推 right_span 个位置
    fn check_retained(&self, origin: NodeId, index: usize) -> Result<()> {
        let mut starts = BTreeMap::from([(origin, index)]);
        while let Some((id, start)) = starts.pop_first() {
            let slot = &self.slots[id.0];
            slot.node.check_retained(start)?;

            let emitted = start.saturating_sub(slot.node.right_span());
            for observer in &slot.observers {
                starts
                    .entry(*observer)
                    .and_modify(|s| *s = (*s).min(emitted))
                    .or_insert(emitted);
            }
        }
        Ok(())
    }

    /// 每个节点因上游向前看而额外回退的最大位置数
    pub(crate) fn upstream_leads(&self) -> Vec<usize> {
        let mut leads = vec![0; self.slots.len()];
        for (index, slot) in self.slots.iter().enumerate() {
            let lead = slot
                .node
                .providers()
                .iter()
                .map(|p| leads[p.0] + self.slots[p.0].node.right_span())
                .max()
                .unwrap_or(0);
            leads[index] = lead;
        }
        leads
    }

    fn enqueue(&self, pending: &mut BTreeMap<NodeId, usize>, from: NodeId, events: &[HubEvent]) {
        let Some(start) = events.iter().map(HubEvent::start).min() else {
            return;
        };
        for observer in &self.slots[from.0].observers {
            pending
                .entry(*observer)
                .and_modify(|s| *s = (*s).min(start))
                .or_insert(start);
        }
    }

    /// 把 origin 的事件推到整张图
    pub(crate) fn propagate(&mut self, origin: NodeId, events: Vec<HubEvent>) -> Result<()> {
        let mut pending = BTreeMap::new();
        self.enqueue(&mut pending, origin, &events);

        let mut first_error = None;
        while let Some((id, start)) = pending.pop_first() {
            let (upstream, rest) = self.slots.split_at_mut(id.0);
            let slot = &mut rest[0];
            match slot.node.react(upstream, start) {
                Ok(events) => self.enqueue(&mut pending, id, &events),
                Err(err) => {
                    log::warn!("{}: update from position {} failed: {}", slot.node.name(), start, err);
                    first_error.get_or_insert(err);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
