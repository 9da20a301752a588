//! 配对同步
//!
//! 两个上游按位置对齐消费：位置 i 只有在两边都已到达、且时间键一致时才计算。
//! 对齐长度为 `min(len_a, len_b)`，较快的一侧只是暂时领先。

use std::any::Any;
use std::marker::PhantomData;

use super::node::{provider_cache, HubCore, Node, Slot};
use super::{trailing_slice, HubEvent, NodeId, PairIndicator};
use crate::series::{Series, SeriesCache};
use crate::{HubError, Result};

/// 配对公式看到的两个上游与自身已有输出
#[derive(Debug)]
pub struct PairWindow<'a, I, O> {
    a: &'a [I],
    b: &'a [I],
    outputs: &'a [O],
    offset: usize,
}

impl<'a, I, O> PairWindow<'a, I, O> {
    pub fn new(a: &'a [I], b: &'a [I], outputs: &'a [O], offset: usize) -> Self {
        Self { a, b, outputs, offset }
    }

    pub fn a(&self) -> &'a [I] {
        self.a
    }

    pub fn b(&self) -> &'a [I] {
        self.b
    }

    pub fn outputs(&self) -> &'a [O] {
        self.outputs
    }

    /// 位置 index 的两侧记录
    pub fn input(&self, index: usize) -> Result<(&'a I, &'a I)> {
        match (self.a.get(index), self.b.get(index)) {
            (Some(a), Some(b)) => Ok((a, b)),
            _ => Err(HubError::OutOfRange {
                index,
                len: self.a.len().min(self.b.len()),
            }),
        }
    }

    pub fn position(&self, index: usize) -> usize {
        self.offset + index
    }

    /// 两侧 `[index + 1 - periods, index]`
    pub fn trailing(&self, index: usize, periods: usize) -> Option<(&'a [I], &'a [I])> {
        let a = trailing_slice(self.a, self.offset, index, periods)?;
        let b = trailing_slice(self.b, self.offset, index, periods)?;
        Some((a, b))
    }
}

/// 位置 index 的时间键必须一致
pub(crate) fn check_aligned<I: Series>(a: &[I], b: &[I], index: usize) -> Result<()> {
    let (left, right) = match (a.get(index), b.get(index)) {
        (Some(left), Some(right)) => (left.timestamp(), right.timestamp()),
        _ => {
            return Err(HubError::OutOfRange {
                index,
                len: a.len().min(b.len()),
            })
        }
    };
    if left != right {
        return Err(HubError::Alignment { index, left, right });
    }
    Ok(())
}

/// 双上游公式节点
pub(crate) struct PairHub<I, F: PairIndicator<I>>
where
    I: Series,
{
    formula: F,
    providers: [NodeId; 2],
    core: HubCore<F::Output, F::State>,
    _input: PhantomData<fn(&I)>,
}

impl<I, F> PairHub<I, F>
where
    I: Series + Send + 'static,
    F: PairIndicator<I>,
{
    pub(crate) fn new(formula: F, a: NodeId, b: NodeId) -> Self {
        let core = HubCore::new(formula.name(), formula.lookback(), 0);
        Self {
            formula,
            providers: [a, b],
            core,
            _input: PhantomData,
        }
    }

    fn sync(&mut self, upstream: &[Slot], start: Option<usize>) -> Result<Vec<HubEvent>> {
        let a: &SeriesCache<I> = provider_cache(upstream, self.providers[0])?;
        let b: &SeriesCache<I> = provider_cache(upstream, self.providers[1])?;
        let target = a.len().min(b.len());
        let offset = a.offset();
        let formula = &self.formula;

        let step = |outputs: &[F::Output], prev: Option<&F::State>, index: usize| {
            check_aligned(a.as_slice(), b.as_slice(), index)?;
            let window = PairWindow::new(a.as_slice(), b.as_slice(), outputs, offset);
            formula.compute(&window, prev, index)
        };

        match start {
            Some(start) => self.core.resync(start, target, offset, step),
            None => self.core.rebuild_all(target, offset, step),
        }
    }
}

impl<I, F> Node for PairHub<I, F>
where
    I: Series + Send + 'static,
    F: PairIndicator<I>,
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

    fn check_retained(&self, start: usize) -> Result<()> {
        self.core.check_resync(start)
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
