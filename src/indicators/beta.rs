//! Beta 系数 (配对公式)
//!
//! a 为评估序列，b 为市场序列，在 period 个收益率上计算 `cov(a, b) / var(b)`。
//! Up/Down 只使用市场收益为正/为负的位置。

use serde::{Deserialize, Serialize};

use super::{finite_values, require_at_least, CoMoments};
use crate::hub::{PairIndicator, PairWindow};
use crate::series::{finite, value_or_nan, Reusable, Series, Timestamp};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BetaResult {
    pub timestamp: Timestamp,
    pub beta: Option<f64>,
    pub beta_up: Option<f64>,
    pub beta_down: Option<f64>,
    pub ratio: Option<f64>,
    pub convexity: Option<f64>,
    pub returns_eval: Option<f64>,
    pub returns_mrkt: Option<f64>,
}

impl Series for BetaResult {
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

impl Reusable for BetaResult {
    fn value(&self) -> f64 {
        value_or_nan(self.beta)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BetaType {
    Standard,
    Up,
    Down,
    All,
}

#[derive(Debug, Clone, Copy)]
pub struct Beta {
    period: usize,
    beta_type: BetaType,
}

/// 单期收益率，前值为 0 时记为 0
fn period_return(prev: f64, current: f64) -> f64 {
    if prev != 0.0 {
        current / prev - 1.0
    } else {
        0.0
    }
}

fn beta_of(pairs: impl Iterator<Item = (f64, f64)>) -> Option<f64> {
    let moments = CoMoments::from_pairs(pairs);
    let var_mrkt = moments.b.variance();
    if moments.count() == 0 || var_mrkt == 0.0 {
        return None;
    }
    finite(moments.covariance() / var_mrkt)
}

impl Beta {
    pub fn new(period: usize, beta_type: BetaType) -> Result<Self> {
        require_at_least("BETA", "period", period, 1)?;
        Ok(Self { period, beta_type })
    }

    fn wants(&self, beta_type: BetaType) -> bool {
        self.beta_type == BetaType::All || self.beta_type == beta_type
    }
}

impl<I: Reusable + 'static> PairIndicator<I> for Beta {
    type Output = BetaResult;
    type State = ();

    fn name(&self) -> String {
        format!("BETA({},{:?})", self.period, self.beta_type)
    }

    fn lookback(&self) -> usize {
        self.period + 1
    }

    fn compute(&self, window: &PairWindow<'_, I, BetaResult>, _prev: Option<&()>, index: usize) -> Result<(BetaResult, ())> {
        let (eval, mrkt) = window.input(index)?;
        let mut result = BetaResult {
            timestamp: eval.timestamp(),
            beta: None,
            beta_up: None,
            beta_down: None,
            ratio: None,
            convexity: None,
            returns_eval: None,
            returns_mrkt: None,
        };

        if index > 0 {
            let (prev_eval, prev_mrkt) = window.input(index - 1)?;
            result.returns_eval = finite(period_return(prev_eval.value(), eval.value()));
            result.returns_mrkt = finite(period_return(prev_mrkt.value(), mrkt.value()));
        }

        let values = window
            .trailing(index, self.period + 1)
            .and_then(|(a, b)| Some((finite_values(a)?, finite_values(b)?)));

        if let Some((a, b)) = values {
            let returns: Vec<(f64, f64)> = (1..a.len())
                .map(|k| (period_return(a[k - 1], a[k]), period_return(b[k - 1], b[k])))
                .collect();

            if self.wants(BetaType::Standard) {
                result.beta = beta_of(returns.iter().copied());
            }
            if self.wants(BetaType::Up) {
                result.beta_up = beta_of(returns.iter().copied().filter(|&(_, m)| m > 0.0));
            }
            if self.wants(BetaType::Down) {
                result.beta_down = beta_of(returns.iter().copied().filter(|&(_, m)| m < 0.0));
            }

            if let (BetaType::All, Some(up), Some(down)) = (self.beta_type, result.beta_up, result.beta_down) {
                result.ratio = (down != 0.0).then(|| up / down);
                result.convexity = Some((up - down) * (up - down));
            }
        }
        Ok((result, ()))
    }
}
