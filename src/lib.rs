//! # QAINDICATOR-RS
//!
//! 增量指标计算引擎 - 批量/流式/可变历史三种模式结果一致
//!
//! ## 核心能力
//!
//! - **有序缓存**: 时间键严格递增，二分定位，尾部 O(1) 追加
//! - **可变历史**: 乱序插入/原位修正/删除/幂等重发，下游自动回滚重算
//! - **计算图**: 源节点 -> 链式 Hub -> 配对 Hub，菱形依赖按拓扑序传播
//! - **状态检查点**: 每个位置保存私有增量状态，回滚即恢复，与批量计算逐位一致
//! - **有界缓存**: 全图按相同数量裁剪头部，保持跨节点位置对齐
//! - **配对同步**: 两个上游按位置对齐，时间键不一致即报错
//!
//! ## 架构设计
//!
//! ```text
//! 外部写入 (add / insert / remove)
//!     ↓
//! SourceNode (series/cache) ── 判定 Append / Insert / Update / Delete / NoopResend
//!     ↓  HubEvent::Append / HubEvent::Rebuild
//! ChainHub / PairHub (hub/node, hub/pairs) ← Indicator / PairIndicator 公式
//!     ↓
//! 下游 Hub ... (hub/graph 按节点 ID 升序传播)
//! ```
//!
//! ## 使用示例
//!
//! ```
//! use qaindicator::indicators::Sma;
//! use qaindicator::{HubGraph, TimeValue};
//! use chrono::{TimeZone, Utc};
//!
//! let mut graph = HubGraph::new();
//! let prices = graph.add_source::<TimeValue>("prices");
//! let sma = graph.attach(&prices, Sma::new(2).unwrap()).unwrap();
//!
//! for (i, v) in [1.0, 2.0, 3.0].iter().enumerate() {
//!     let ts = Utc.timestamp_opt(1_700_000_000 + i as i64 * 60, 0).unwrap();
//!     graph.add(&prices, TimeValue::new(ts, *v)).unwrap();
//! }
//!
//! let results = graph.results(&sma).unwrap();
//! assert_eq!(results[2].sma, Some(2.5));
//! ```

// ============================================================================
// 外部依赖
// ============================================================================

// 并发工具
pub use parking_lot;

// 序列化
pub use serde;

// 时间
pub use chrono;

// 日志
pub use log;

// 错误处理
pub use thiserror;

// ============================================================================
// 内部模块
// ============================================================================

/// 时间序列记录与有序缓存
pub mod series;

/// Hub 计算图 (节点/传播/配对/裁剪)
pub mod hub;

/// 批量计算入口 (与流式结果逐位一致)
pub mod batch;

/// 内置指标公式
pub mod indicators;

/// 工具模块
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

// ============================================================================
// 重导出常用类型
// ============================================================================

pub use hub::{
    Handle, HubEvent, HubGraph, Indicator, NodeId, PairIndicator, PairWindow, Provider,
    SharedGraph, SourceHandle, Window,
};
pub use series::{CacheAct, Quote, Reusable, Series, SeriesCache, TimeValue, Timestamp};
pub use utils::config::HubConfig;

// ============================================================================
// 全局错误类型
// ============================================================================

/// 计算图错误类型
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HubError {
    #[error("Configuration error in {indicator}: {reason}")]
    Configuration { indicator: String, reason: String },

    #[error("Timestamp mismatch at position {index}: {left} != {right}")]
    Alignment {
        index: usize,
        left: Timestamp,
        right: Timestamp,
    },

    #[error("Position {index} out of range (len {len})")]
    OutOfRange { index: usize, len: usize },

    #[error("Position {index} requires pruned history (retained floor {floor})")]
    StaleState { index: usize, floor: usize },

    #[error("Timestamp ordering violated at position {index}")]
    Sequence { index: usize },

    #[error("Overflow in {node}: {count} consecutive arrivals with the same timestamp")]
    Overflow { node: String, count: u32 },

    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Node {0} does not carry the requested record type")]
    TypeMismatch(NodeId),

    #[error("Record not found: {0}")]
    RecordNotFound(Timestamp),

    #[error("Node {node} is faulted (dirty from position {from})")]
    Faulted { node: String, from: usize },
}

pub type Result<T> = std::result::Result<T, HubError>;

// ============================================================================
// 测试模块
// ============================================================================
