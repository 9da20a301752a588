//! 时间序列记录
//!
//! 图中流动的最小单元：
//! - `Series`: 带严格有序时间键的记录
//! - `Reusable`: 可作为下游链式输入的单值记录
//! - `Quote` / `TimeValue`: 内置的行情与单值记录
//! - `SeriesCache`: 按时间排序、可二分定位的有序缓存

pub mod cache;

pub use cache::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 时间键 (同一缓存内严格递增、不重复)
pub type Timestamp = DateTime<Utc>;

/// 时间序列记录
pub trait Series {
    fn timestamp(&self) -> Timestamp;
}

/// 可复用记录 - 能作为链式 Hub 的输入
///
/// `value()` 返回 NaN 表示该位置无值 (预热期等)
pub trait Reusable: Series {
    fn value(&self) -> f64;
}

/// `Option<f64>` -> 链式输入值
#[inline]
pub(crate) fn value_or_nan(value: Option<f64>) -> f64 {
    value.unwrap_or(f64::NAN)
}

/// 非有限值 -> None
#[inline]
pub(crate) fn finite(value: f64) -> Option<f64> {
    if value.is_finite() {
        Some(value)
    } else {
        None
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// 内置记录类型
// ═══════════════════════════════════════════════════════════════════════════

/// OHLCV 行情
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub timestamp: Timestamp,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Quote {
    pub fn new(timestamp: Timestamp, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

impl Series for Quote {
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

impl Reusable for Quote {
    /// 链式使用时默认取收盘价
    fn value(&self) -> f64 {
        self.close
    }
}

/// 单值记录
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeValue {
    pub timestamp: Timestamp,
    pub value: f64,
}

impl TimeValue {
    pub fn new(timestamp: Timestamp, value: f64) -> Self {
        Self { timestamp, value }
    }
}

impl Series for TimeValue {
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

impl Reusable for TimeValue {
    fn value(&self) -> f64 {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_quote_reusable_value() {
        let ts = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let quote = Quote::new(ts, 10.0, 12.0, 9.0, 11.0, 1000.0);

        assert_eq!(quote.timestamp(), ts);
        assert_eq!(quote.value(), 11.0);
    }

    #[test]
    fn test_finite_helpers() {
        assert_eq!(finite(1.5), Some(1.5));
        assert_eq!(finite(f64::NAN), None);
        assert_eq!(finite(f64::INFINITY), None);
        assert!(value_or_nan(None).is_nan());
    }
}
