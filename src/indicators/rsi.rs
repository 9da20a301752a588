//! 相对强弱指数 (Wilder 平滑)

use serde::{Deserialize, Serialize};

use super::{finite_values, require_at_least};
use crate::hub::{Indicator, Window};
use crate::series::{value_or_nan, Reusable, Series, Timestamp};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RsiResult {
    pub timestamp: Timestamp,
    pub rsi: Option<f64>,
}

impl Series for RsiResult {
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

impl Reusable for RsiResult {
    fn value(&self) -> f64 {
        value_or_nan(self.rsi)
    }
}

/// 平均涨幅 / 平均跌幅
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RsiState {
    pub avg_gain: f64,
    pub avg_loss: f64,
}

impl RsiState {
    fn rsi(&self) -> f64 {
        if self.avg_loss > 0.0 {
            100.0 - 100.0 / (1.0 + self.avg_gain / self.avg_loss)
        } else {
            100.0
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Rsi {
    period: usize,
}

impl Rsi {
    pub fn new(period: usize) -> Result<Self> {
        require_at_least("RSI", "period", period, 1)?;
        Ok(Self { period })
    }

    /// 用 period + 1 个值的 period 个变化量做初始平均
    fn seed(&self, values: &[f64]) -> RsiState {
        let (gain, loss) = values.windows(2).fold((0.0, 0.0), |(gain, loss), w| {
            let change = w[1] - w[0];
            (gain + change.max(0.0), loss + (-change).max(0.0))
        });
        RsiState {
            avg_gain: gain / self.period as f64,
            avg_loss: loss / self.period as f64,
        }
    }
}

impl<I: Reusable + 'static> Indicator<I> for Rsi {
    type Output = RsiResult;
    type State = Option<RsiState>;

    fn name(&self) -> String {
        format!("RSI({})", self.period)
    }

    fn lookback(&self) -> usize {
        self.period + 1
    }

    fn compute(
        &self,
        window: &Window<'_, I, RsiResult>,
        prev: Option<&Option<RsiState>>,
        index: usize,
    ) -> Result<(RsiResult, Option<RsiState>)> {
        let timestamp = window.input(index)?.timestamp();

        let state = match prev.copied().flatten() {
            Some(last) => {
                let change = window.input(index)?.value() - window.input(index - 1)?.value();
                change.is_finite().then(|| {
                    let p = self.period as f64;
                    RsiState {
                        avg_gain: (last.avg_gain * (p - 1.0) + change.max(0.0)) / p,
                        avg_loss: (last.avg_loss * (p - 1.0) + (-change).max(0.0)) / p,
                    }
                })
            }
            None => window
                .trailing(index, self.period + 1)
                .and_then(finite_values)
                .map(|values| self.seed(&values)),
        };

        let rsi = state.map(|s| s.rsi());
        Ok((RsiResult { timestamp, rsi }, state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch;
    use crate::testing::{assert_close, values};

    #[test]
    fn test_rsi_seed() {
        // 变化量: +1, -1 -> 平均涨跌各 0.5 -> RSI 50
        let results = batch::compute(&Rsi::new(2).unwrap(), &values(&[10.0, 11.0, 10.0, 12.0])).unwrap();

        assert_eq!(results[0].rsi, None);
        assert_eq!(results[1].rsi, None);
        assert_close(results[2].rsi, Some(50.0));

        // 平滑: gain = (0.5 + 2) / 2 = 1.25, loss = 0.25 -> RS 5
        assert_close(results[3].rsi, Some(100.0 - 100.0 / 6.0));
    }

    #[test]
    fn test_rsi_all_gains() {
        let results = batch::compute(&Rsi::new(3).unwrap(), &values(&[1.0, 2.0, 3.0, 4.0, 5.0])).unwrap();
        assert_close(results[3].rsi, Some(100.0));
        assert_close(results[4].rsi, Some(100.0));
    }
}
