//! 内置指标公式
//!
//! 每个公式都是纯函数：窗口 + 上一位置的状态 -> 输出 + 新状态。
//! 同一个公式值既可以挂到 `HubGraph` 上流式计算，也可以交给 `batch::compute`。
//!
//! - 行情分量: `QuotePart`
//! - 趋势: `Sma`, `Ema`, `Dpo`
//! - 动量: `Rsi`
//! - 波动: `StdDev`
//! - 量价: `Adl`
//! - 形态 (向前看): `Fractal`
//! - 配对: `Correlation`, `Beta`

pub mod adl;
pub mod beta;
pub mod correlation;
pub mod dpo;
pub mod ema;
pub mod fractal;
pub mod quote_part;
pub mod rsi;
pub mod sma;
pub mod stddev;
pub mod welford;

pub use adl::*;
pub use beta::*;
pub use correlation::*;
pub use dpo::*;
pub use ema::*;
pub use fractal::*;
pub use quote_part::*;
pub use rsi::*;
pub use sma::*;
pub use stddev::*;
pub use welford::*;

use crate::series::Reusable;
use crate::{HubError, Result};

/// 参数校验：value >= min
pub(crate) fn require_at_least(indicator: &str, param: &str, value: usize, min: usize) -> Result<()> {
    if value < min {
        return Err(HubError::Configuration {
            indicator: indicator.to_string(),
            reason: format!("{} must be at least {} (got {})", param, min, value),
        });
    }
    Ok(())
}

/// 窗口内全部为有限值时取出
pub(crate) fn finite_values<I: Reusable>(window: &[I]) -> Option<Vec<f64>> {
    window
        .iter()
        .map(|r| {
            let v = r.value();
            v.is_finite().then_some(v)
        })
        .collect()
}
