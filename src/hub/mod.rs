//! 增量计算 Hub 框架
//!
//! 一个小型的通用数据流引擎：
//! - 公式能力 (`Indicator` / `PairIndicator`) - 窗口 + 上一位置状态 -> 输出 + 新状态
//! - 节点 (node) - 源节点、链式 Hub、状态检查点与重建协议
//! - 图 (graph) - 节点 arena、订阅边、同步传播
//! - 配对同步 (pairs) - 两个上游按位置对齐消费
//! - 裁剪 (prune) - 有界缓存管理
//!
//! 核心不变量：任意顺序的追加/插入/删除/重发之后，每个节点的缓存
//! 都等于对最终有序去重输入做一次性批量计算的结果。

pub mod graph;
pub mod node;
pub mod pairs;
pub mod prune;

pub use graph::*;
pub use pairs::PairWindow;

use std::fmt;
use std::marker::PhantomData;

use crate::series::Series;
use crate::{HubError, Result};

// ═══════════════════════════════════════════════════════════════════════════
// 公式能力
// ═══════════════════════════════════════════════════════════════════════════

/// 单上游公式
///
/// 设计原则:
/// 1. 纯函数: `compute` 只读窗口和上一位置的状态，不持有可变字段
/// 2. 状态外置: 私有增量状态 (`State`) 由引擎按位置保存为检查点，
///    回滚即恢复 `index - 1` 处的检查点
/// 3. 一进一出: 位置 `index` 的输出时间键等于输入 `index` 的时间键
pub trait Indicator<I: Series>: Send + 'static {
    /// 输出记录
    type Output: Series + Clone + PartialEq + Send + 'static;

    /// 私有增量状态，无状态公式使用 `()`
    type State: Clone + Send + 'static;

    fn name(&self) -> String;

    /// 计算一个输出所需的输入数量 (含当前位置)
    fn lookback(&self) -> usize;

    /// 向前看的位置数 (右侧窗口)，普通公式为 0
    ///
    /// 位置 `i` 的输出在 `i + right_span` 到达之前是临时值
    fn right_span(&self) -> usize {
        0
    }

    /// 计算位置 `index` 的输出
    ///
    /// `window.outputs()` 恰好包含 `[0, index)` 的已确定输出
    fn compute(
        &self,
        window: &Window<'_, I, Self::Output>,
        prev: Option<&Self::State>,
        index: usize,
    ) -> Result<(Self::Output, Self::State)>;
}

/// 双上游 (配对) 公式
pub trait PairIndicator<I: Series>: Send + 'static {
    type Output: Series + Clone + PartialEq + Send + 'static;

    type State: Clone + Send + 'static;

    fn name(&self) -> String;

    fn lookback(&self) -> usize;

    fn compute(
        &self,
        window: &PairWindow<'_, I, Self::Output>,
        prev: Option<&Self::State>,
        index: usize,
    ) -> Result<(Self::Output, Self::State)>;
}

// ═══════════════════════════════════════════════════════════════════════════
// 计算窗口
// ═══════════════════════════════════════════════════════════════════════════

/// 公式看到的上游缓存与自身已有输出
#[derive(Debug)]
pub struct Window<'a, I, O> {
    inputs: &'a [I],
    outputs: &'a [O],
    offset: usize,
}

impl<'a, I, O> Window<'a, I, O> {
    pub fn new(inputs: &'a [I], outputs: &'a [O], offset: usize) -> Self {
        Self {
            inputs,
            outputs,
            offset,
        }
    }

    pub fn inputs(&self) -> &'a [I] {
        self.inputs
    }

    pub fn outputs(&self) -> &'a [O] {
        self.outputs
    }

    pub fn input(&self, index: usize) -> Result<&'a I> {
        self.inputs.get(index).ok_or(HubError::OutOfRange {
            index,
            len: self.inputs.len(),
        })
    }

    pub fn output(&self, index: usize) -> Result<&'a O> {
        self.outputs.get(index).ok_or(HubError::OutOfRange {
            index,
            len: self.outputs.len(),
        })
    }

    /// 绝对位置 (计入已裁剪的记录)
    pub fn position(&self, index: usize) -> usize {
        self.offset + index
    }

    /// `[index + 1 - periods, index]`，预热不足或缓存不足时为 None
    pub fn trailing(&self, index: usize, periods: usize) -> Option<&'a [I]> {
        trailing_slice(self.inputs, self.offset, index, periods)
    }

    /// `(index, index + span]`，右侧上下文尚未到齐时为 None
    pub fn leading(&self, index: usize, span: usize) -> Option<&'a [I]> {
        let end = index.checked_add(span)?;
        if end < self.inputs.len() {
            Some(&self.inputs[index + 1..=end])
        } else {
            None
        }
    }
}

pub(crate) fn trailing_slice<I>(
    inputs: &[I],
    offset: usize,
    index: usize,
    periods: usize,
) -> Option<&[I]> {
    let periods = periods.max(1);
    if index >= inputs.len() || offset + index + 1 < periods || index + 1 < periods {
        return None;
    }
    Some(&inputs[index + 1 - periods..=index])
}

// ═══════════════════════════════════════════════════════════════════════════
// 传播事件
// ═══════════════════════════════════════════════════════════════════════════

/// 上游发往下游的变更通知
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubEvent {
    /// 尾部新增了位置 index
    Append { index: usize },
    /// 从 from 起 (含) 的位置已失效，需要重建
    Rebuild { from: usize },
}

impl HubEvent {
    /// 下游需要从哪个位置开始同步
    pub fn start(&self) -> usize {
        match *self {
            HubEvent::Append { index } => index,
            HubEvent::Rebuild { from } => from,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// 节点句柄
// ═══════════════════════════════════════════════════════════════════════════

/// 节点 ID (arena 下标)，按创建顺序递增，天然是拓扑序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 可被订阅的节点 (输出记录类型为 T)
pub trait Provider<T> {
    fn node_id(&self) -> NodeId;
}

/// 计算 Hub 句柄，同时也是其订阅句柄
pub struct Handle<T> {
    id: NodeId,
    _marker: PhantomData<fn() -> T>,
}

/// 源节点句柄，只有源节点接受外部写入
pub struct SourceHandle<T> {
    id: NodeId,
    _marker: PhantomData<fn() -> T>,
}

macro_rules! impl_handle {
    ($handle:ident) => {
        impl<T> $handle<T> {
            pub(crate) fn new(id: NodeId) -> Self {
                Self {
                    id,
                    _marker: PhantomData,
                }
            }

            pub fn id(&self) -> NodeId {
                self.id
            }
        }

        impl<T> Clone for $handle<T> {
            fn clone(&self) -> Self {
                *self
            }
        }

        impl<T> Copy for $handle<T> {}

        impl<T> fmt::Debug for $handle<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($handle), self.id)
            }
        }

        impl<T> Provider<T> for $handle<T> {
            fn node_id(&self) -> NodeId {
                self.id
            }
        }
    };
}

impl_handle!(Handle);
impl_handle!(SourceHandle);
