//! 指数移动平均
//!
//! 以前 period 个值的 SMA 作为种子，之后 `ema = prev + k * (x - prev)`，`k = 2 / (period + 1)`。
//! 输入缺失 (NaN) 时状态清空，之后重新以 SMA 播种。

use serde::{Deserialize, Serialize};

use super::{finite_values, require_at_least};
use crate::hub::{Indicator, Window};
use crate::series::{value_or_nan, Reusable, Series, Timestamp};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmaResult {
    pub timestamp: Timestamp,
    pub ema: Option<f64>,
}

impl Series for EmaResult {
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

impl Reusable for EmaResult {
    fn value(&self) -> f64 {
        value_or_nan(self.ema)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Ema {
    period: usize,
    k: f64,
}

impl Ema {
    pub fn new(period: usize) -> Result<Self> {
        require_at_least("EMA", "period", period, 1)?;
        Ok(Self {
            period,
            k: 2.0 / (period as f64 + 1.0),
        })
    }
}

impl<I: Reusable + 'static> Indicator<I> for Ema {
    type Output = EmaResult;
    /// 上一位置的 EMA
    type State = Option<f64>;

    fn name(&self) -> String {
        format!("EMA({})", self.period)
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(
        &self,
        window: &Window<'_, I, EmaResult>,
        prev: Option<&Option<f64>>,
        index: usize,
    ) -> Result<(EmaResult, Option<f64>)> {
        let input = window.input(index)?;
        let x = input.value();

        let ema = match prev.copied().flatten() {
            Some(last) if x.is_finite() => Some(last + self.k * (x - last)),
            Some(_) => None,
            None => window
                .trailing(index, self.period)
                .and_then(finite_values)
                .map(|values| values.iter().sum::<f64>() / self.period as f64),
        };

        Ok((
            EmaResult {
                timestamp: input.timestamp(),
                ema,
            },
            ema,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch;
    use crate::testing::{assert_close, values};

    fn emas(raw: &[f64], period: usize) -> Vec<Option<f64>> {
        batch::compute(&Ema::new(period).unwrap(), &values(raw))
            .unwrap()
            .iter()
            .map(|r| r.ema)
            .collect()
    }

    #[test]
    fn test_ema_seed_and_increment() {
        let results = emas(&[2.0, 4.0, 6.0, 8.0], 3);

        assert_eq!(results[0], None);
        assert_eq!(results[1], None);
        // 种子 = SMA(2, 4, 6)
        assert_close(results[2], Some(4.0));
        // 4 + 0.5 * (8 - 4)
        assert_close(results[3], Some(6.0));
    }

    #[test]
    fn test_ema_reseeds_after_gap() {
        let results = emas(&[1.0, 2.0, f64::NAN, 4.0, 6.0], 2);

        assert_close(results[1], Some(1.5));
        assert_eq!(results[2], None);
        assert_eq!(results[3], None);
        assert_close(results[4], Some(5.0));
    }
}
