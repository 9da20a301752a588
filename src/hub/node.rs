//! 图节点
//!
//! - `Node`: arena 中的类型擦除节点，供图统一调度
//! - `HubCore`: 输出缓存 + 逐位置状态检查点 + 重建协议
//! - `SourceNode`: 接受外部写入的根节点
//! - `ChainHub`: 单上游公式节点

use std::any::Any;
use std::collections::VecDeque;
use std::marker::PhantomData;

use super::{HubEvent, Indicator, NodeId, Window};
use crate::series::{CacheAct, Series, SeriesCache, Timestamp};
use crate::{HubError, Result};

// ═══════════════════════════════════════════════════════════════════════════
// Node trait
// ═══════════════════════════════════════════════════════════════════════════

/// arena 槽位：节点 + 订阅者
pub(crate) struct Slot {
    pub(crate) node: Box<dyn Node>,
    pub(crate) observers: Vec<NodeId>,
}

impl Slot {
    pub(crate) fn new(node: Box<dyn Node>) -> Self {
        Self {
            node,
            observers: Vec::new(),
        }
    }
}

/// 图节点
///
/// `upstream` 是 arena 中 ID 小于本节点的全部槽位，上游一定在其中
pub(crate) trait Node: Send {
    fn name(&self) -> &str;

    fn len(&self) -> usize;

    fn providers(&self) -> &[NodeId];

    /// 裁剪后必须保留的最少记录数 (不含上游向前看带来的额外回退)
    fn required_history(&self) -> usize;

    /// 上游从 start 起变化时，本节点的输出从 `start - right_span` 起失效
    fn right_span(&self) -> usize {
        0
    }

    /// 从 start 起的上游变化能否只用保留的历史处理
    fn check_retained(&self, start: usize) -> Result<()>;

    fn is_faulted(&self) -> bool;

    fn reset_fault(&mut self);

    /// 上游从 start 起发生变化，同步自身并返回要转发的事件
    fn react(&mut self, upstream: &[Slot], start: usize) -> Result<Vec<HubEvent>>;

    /// 基于上游当前全部内容完整重建
    fn rebuild(&mut self, upstream: &[Slot]) -> Result<Vec<HubEvent>>;

    fn prune_front(&mut self, count: usize) -> usize;

    /// 输出缓存 (`SeriesCache<Output>`)
    fn cache_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// 取上游的类型化缓存
pub(crate) fn provider_cache<T: 'static>(upstream: &[Slot], id: NodeId) -> Result<&SeriesCache<T>> {
    upstream
        .get(id.0)
        .ok_or(HubError::NodeNotFound(id))?
        .node
        .cache_any()
        .downcast_ref::<SeriesCache<T>>()
        .ok_or(HubError::TypeMismatch(id))
}

// ═══════════════════════════════════════════════════════════════════════════
// HubCore - 输出缓存 + 状态检查点
// ═══════════════════════════════════════════════════════════════════════════

/// 计算节点的公共部分
///
/// `states[i]` 是计算完位置 `i` 之后的私有状态，与 `cache` 逐位对齐。
/// 从位置 `p` 回滚只需截断两者并以 `states[p - 1]` 为起点重算。
pub(crate) struct HubCore<O, S> {
    pub(crate) name: String,
    pub(crate) cache: SeriesCache<O>,
    pub(crate) states: VecDeque<S>,
    /// 增量重算的最小起点 (裁剪后)
    floor: usize,
    /// 额外保留的右侧窗口
    right_span: usize,
    /// 是否裁剪过自身的头部
    pruned: bool,
    /// 上次同步失败的起点，下次同步至少从这里开始
    dirty_from: Option<usize>,
}

impl<O, S> HubCore<O, S>
where
    O: Series + Clone + PartialEq,
    S: Clone,
{
    pub(crate) fn new(name: String, lookback: usize, right_span: usize) -> Self {
        Self {
            name,
            cache: SeriesCache::new(),
            states: VecDeque::new(),
            floor: lookback.max(1),
            right_span,
            pruned: false,
            dirty_from: None,
        }
    }

    pub(crate) fn required_history(&self) -> usize {
        self.floor + self.right_span
    }

    pub(crate) fn dirty_from(&self) -> Option<usize> {
        self.dirty_from
    }

    pub(crate) fn clear_fault(&mut self) {
        self.dirty_from = None;
    }

    /// 实际重算起点：计入上次失败的位置
    fn effective_start(&self, start: usize) -> usize {
        self.dirty_from
            .map_or(start, |dirty| dirty.min(start))
            .min(self.cache.len())
    }

    /// 与 `resync` 相同的判定，但不做任何修改
    pub(crate) fn check_resync(&self, start: usize) -> Result<()> {
        let start = self.effective_start(start);
        if start < self.cache.len() {
            self.check_start(start)?;
        }
        Ok(())
    }

    /// 有效起点 start 是否落在已裁剪的历史中
    pub(crate) fn check_start(&self, start: usize) -> Result<()> {
        if self.pruned && start < self.floor {
            return Err(HubError::StaleState {
                index: start,
                floor: self.floor,
            });
        }
        Ok(())
    }

    /// 从 start 起重算到 target
    ///
    /// `step(outputs, prev, index)` 计算单个位置，outputs 为 `[0, index)` 的输出。
    /// 任一位置失败则恢复原有缓存与检查点，并记住 start 以便下次重试。
    pub(crate) fn resync<F>(
        &mut self,
        start: usize,
        target: usize,
        offset: usize,
        step: F,
    ) -> Result<Vec<HubEvent>>
    where
        F: FnMut(&[O], Option<&S>, usize) -> Result<(O, S)>,
    {
        let start = self.effective_start(start);
        if start < self.cache.len() {
            if let Err(err) = self.check_start(start) {
                // 缓存已与上游脱节，只能通过完整重建恢复
                self.dirty_from = Some(start);
                log::warn!("{}: cannot resync from position {}: {}", self.name, start, err);
                return Err(err);
            }
        }
        self.sync_from(start, target, offset, step)
    }

    /// 丢弃全部输出，从位置 0 完整重建
    pub(crate) fn rebuild_all<F>(&mut self, target: usize, offset: usize, step: F) -> Result<Vec<HubEvent>>
    where
        F: FnMut(&[O], Option<&S>, usize) -> Result<(O, S)>,
    {
        let was_pruned = std::mem::replace(&mut self.pruned, false);
        let result = self.sync_from(0, target, offset, step);
        if result.is_err() {
            self.pruned = was_pruned;
        }
        result
    }

    fn sync_from<F>(&mut self, start: usize, target: usize, offset: usize, mut step: F) -> Result<Vec<HubEvent>>
    where
        F: FnMut(&[O], Option<&S>, usize) -> Result<(O, S)>,
    {
        let old_len = self.cache.len();
        let old_offset = self.cache.offset();
        if start == 0 {
            self.cache.set_offset(offset);
        }

        let tail = self.cache.split_off(start);
        let tail_states = self.states.split_off(start.min(self.states.len()));

        for index in start..target {
            let computed = {
                let prev = index.checked_sub(1).and_then(|p| self.states.get(p));
                step(self.cache.as_slice(), prev, index)
            };
            let appended = computed.and_then(|(output, state)| self.cache.append(output).map(|_| state));

            match appended {
                Ok(state) => self.states.push_back(state),
                Err(err) => {
                    self.cache.restore(start, tail);
                    self.states.truncate(start);
                    self.states.extend(tail_states);
                    self.cache.set_offset(old_offset);
                    self.dirty_from = Some(start);
                    log::warn!("{}: sync from position {} failed at {}: {}", self.name, start, index, err);
                    return Err(err);
                }
            }
        }

        self.dirty_from = None;
        let new_len = self.cache.len();
        if start < old_len {
            log::debug!("{}: rebuilt from position {} ({} -> {} records)", self.name, start, old_len, new_len);
        }

        // 与旧尾部比较，只把真正变化的部分通知下游
        let fresh = &self.cache.as_slice()[start..];
        let first_diff = tail.iter().zip(fresh).position(|(old, new)| old != new);
        let events = match first_diff {
            Some(k) => vec![HubEvent::Rebuild { from: start + k }],
            None if new_len > old_len => (old_len..new_len).map(|index| HubEvent::Append { index }).collect(),
            None if new_len < old_len => vec![HubEvent::Rebuild { from: new_len }],
            None => Vec::new(),
        };
        Ok(events)
    }

    pub(crate) fn prune_front(&mut self, count: usize) -> usize {
        let pruned = self.cache.prune_front(count);
        let drain = pruned.min(self.states.len());
        self.states.drain(..drain);
        if pruned > 0 {
            self.pruned = true;
            self.dirty_from = self.dirty_from.map(|d| d.saturating_sub(pruned));
        }
        pruned
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// SourceNode - 根节点
// ═══════════════════════════════════════════════════════════════════════════

/// 接受外部写入的根节点
pub(crate) struct SourceNode<T> {
    name: String,
    cache: SeriesCache<T>,
    last_arrival: Option<Timestamp>,
    repeat_count: u32,
    overflow_threshold: u32,
    faulted: bool,
    pruned: bool,
}

impl<T> SourceNode<T>
where
    T: Series + Clone + PartialEq + Send + 'static,
{
    pub(crate) fn new(name: String, overflow_threshold: u32) -> Self {
        Self {
            name,
            cache: SeriesCache::new(),
            last_arrival: None,
            repeat_count: 0,
            overflow_threshold,
            faulted: false,
            pruned: false,
        }
    }

    pub(crate) fn cache(&self) -> &SeriesCache<T> {
        &self.cache
    }

    pub(crate) fn ensure_healthy(&self) -> Result<()> {
        if self.faulted {
            return Err(HubError::Faulted {
                node: self.name.clone(),
                from: self.cache.len(),
            });
        }
        Ok(())
    }

    /// 同一时间键连续到达计数，超过阈值则进入故障状态
    pub(crate) fn track_arrival(&mut self, timestamp: Timestamp) -> Result<()> {
        if self.last_arrival == Some(timestamp) {
            self.repeat_count += 1;
            if self.repeat_count > self.overflow_threshold {
                self.faulted = true;
                log::warn!(
                    "{}: {} consecutive arrivals at {}, marking faulted",
                    self.name,
                    self.repeat_count,
                    timestamp
                );
                return Err(HubError::Overflow {
                    node: self.name.clone(),
                    count: self.repeat_count,
                });
            }
        } else {
            self.last_arrival = Some(timestamp);
            self.repeat_count = 0;
        }
        Ok(())
    }

    pub(crate) fn plan(&self, record: &T) -> CacheAct {
        self.cache.classify(record)
    }

    pub(crate) fn commit(&mut self, act: CacheAct, record: T) -> Result<Vec<HubEvent>> {
        self.cache.apply(act, record)?;
        Ok(match act {
            CacheAct::Append(index) => vec![HubEvent::Append { index }],
            CacheAct::Insert(from) | CacheAct::Update(from) | CacheAct::Delete(from) => {
                vec![HubEvent::Rebuild { from }]
            }
            CacheAct::NoopResend(_) => Vec::new(),
        })
    }

    pub(crate) fn delete(&mut self, index: usize) -> Result<(T, Vec<HubEvent>)> {
        let removed = self.cache.remove_at(index)?;
        Ok((removed, vec![HubEvent::Rebuild { from: index }]))
    }

    /// 删除 [from, len)，返回删除数量
    pub(crate) fn truncate_from(&mut self, from: usize) -> Result<(usize, Vec<HubEvent>)> {
        let len = self.cache.len();
        if from > len {
            return Err(HubError::OutOfRange { index: from, len });
        }
        let removed = self.cache.split_off(from).len();
        let events = if removed > 0 {
            vec![HubEvent::Rebuild { from }]
        } else {
            Vec::new()
        };
        Ok((removed, events))
    }
}

impl<T> Node for SourceNode<T>
where
    T: Series + Clone + PartialEq + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> usize {
        self.cache.len()
    }

    fn providers(&self) -> &[NodeId] {
        &[]
    }

    fn required_history(&self) -> usize {
        1
    }

    fn check_retained(&self, start: usize) -> Result<()> {
        if self.pruned && start < 1 {
            return Err(HubError::StaleState { index: start, floor: 1 });
        }
        Ok(())
    }

    fn is_faulted(&self) -> bool {
        self.faulted
    }

    fn reset_fault(&mut self) {
        self.faulted = false;
        self.repeat_count = 0;
        self.last_arrival = None;
    }

    fn react(&mut self, _upstream: &[Slot], _start: usize) -> Result<Vec<HubEvent>> {
        Ok(Vec::new())
    }

    /// 源节点没有上游，重建即要求下游整体重算
    fn rebuild(&mut self, _upstream: &[Slot]) -> Result<Vec<HubEvent>> {
        Ok(vec![HubEvent::Rebuild { from: 0 }])
    }

    fn prune_front(&mut self, count: usize) -> usize {
        let pruned = self.cache.prune_front(count);
        if pruned > 0 {
            self.pruned = true;
        }
        pruned
    }

    fn cache_any(&self) -> &dyn Any {
        &self.cache
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// ChainHub - 单上游公式节点
// ═══════════════════════════════════════════════════════════════════════════

pub(crate) struct ChainHub<I, F: Indicator<I>>
where
    I: Series,
{
    formula: F,
    providers: [NodeId; 1],
    core: HubCore<F::Output, F::State>,
    _input: PhantomData<fn(&I)>,
}

impl<I, F> ChainHub<I, F>
where
    I: Series + Send + 'static,
    F: Indicator<I>,
{
    pub(crate) fn new(formula: F, provider: NodeId) -> Self {
        let core = HubCore::new(formula.name(), formula.lookback(), formula.right_span());
        Self {
            formula,
            providers: [provider],
            core,
            _input: PhantomData,
        }
    }

    fn sync(&mut self, upstream: &[Slot], start: Option<usize>) -> Result<Vec<HubEvent>> {
        let inputs = provider_cache::<I>(upstream, self.providers[0])?;
        let formula = &self.formula;
        let offset = inputs.offset();
        let step = |outputs: &[F::Output], prev: Option<&F::State>, index: usize| {
            formula.compute(&Window::new(inputs.as_slice(), outputs, offset), prev, index)
        };

        match start {
            // 向前看的公式：start 之前 right_span 个位置的输出依赖 start 处的输入
            Some(start) => {
                let start = start.saturating_sub(formula.right_span());
                self.core.resync(start, inputs.len(), offset, step)
            }
            None => self.core.rebuild_all(inputs.len(), offset, step),
        }
    }
}

impl<I, F> Node for ChainHub<I, F>
where
    I: Series + Send + 'static,
    F: Indicator<I>,
{
    fn name(&self) -> &str {
        &self.core.name
    }

    fn len(&self) -> usize {
        self.core.cache.len()
    }

    fn providers(&self) -> &[NodeId] {
        &self.providers
    }

    fn required_history(&self) -> usize {
        self.core.required_history()
    }

    fn right_span(&self) -> usize {
        self.formula.right_span()
    }

    fn check_retained(&self, start: usize) -> Result<()> {
        self.core.check_resync(start.saturating_sub(self.formula.right_span()))
    }

    fn is_faulted(&self) -> bool {
        self.core.dirty_from().is_some()
    }

    fn reset_fault(&mut self) {
        self.core.clear_fault();
    }

    fn react(&mut self, upstream: &[Slot], start: usize) -> Result<Vec<HubEvent>> {
        self.sync(upstream, Some(start))
    }

    fn rebuild(&mut self, upstream: &[Slot]) -> Result<Vec<HubEvent>> {
        self.sync(upstream, None)
    }

    fn prune_front(&mut self, count: usize) -> usize {
        self.core.prune_front(count)
    }

    fn cache_any(&self) -> &dyn Any {
        &self.core.cache
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
