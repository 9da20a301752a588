//! 去趋势价格震荡 (向前看的公式)
//!
//! `dpo[i] = x[i] - sma[i + offset]`，`offset = period / 2 + 1`。
//! 位置 i 要等 `i + offset` 到达后才有值。

use serde::{Deserialize, Serialize};

use super::{finite_values, require_at_least};
use crate::hub::{Indicator, Window};
use crate::series::{value_or_nan, Reusable, Series, Timestamp};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DpoResult {
    pub timestamp: Timestamp,
    pub dpo: Option<f64>,
    pub sma: Option<f64>,
}

impl Series for DpoResult {
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

impl Reusable for DpoResult {
    fn value(&self) -> f64 {
        value_or_nan(self.dpo)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Dpo {
    period: usize,
    offset: usize,
}

impl Dpo {
    pub fn new(period: usize) -> Result<Self> {
        require_at_least("DPO", "period", period, 2)?;
        Ok(Self {
            period,
            offset: period / 2 + 1,
        })
    }

    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl<I: Reusable + 'static> Indicator<I> for Dpo {
    type Output = DpoResult;
    type State = ();

    fn name(&self) -> String {
        format!("DPO({})", self.period)
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(self.offset).max(1)
    }

    fn right_span(&self) -> usize {
        self.offset
    }

    fn compute(&self, window: &Window<'_, I, DpoResult>, _prev: Option<&()>, index: usize) -> Result<(DpoResult, ())> {
        let input = window.input(index)?;
        let sma = window
            .trailing(index + self.offset, self.period)
            .and_then(finite_values)
            .map(|values| values.iter().sum::<f64>() / self.period as f64);
        let dpo = sma.and_then(|sma| {
            let x = input.value();
            x.is_finite().then(|| x - sma)
        });

        Ok((
            DpoResult {
                timestamp: input.timestamp(),
                dpo,
                sma,
            },
            (),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch;
    use crate::testing::{assert_close, values};

    #[test]
    fn test_dpo_lookahead() {
        // period 4 -> offset 3
        let dpo = Dpo::new(4).unwrap();
        assert_eq!(dpo.offset(), 3);

        let raw: Vec<f64> = (1..=8).map(|v| v as f64).collect();
        let results = batch::compute(&dpo, &values(&raw)).unwrap();

        // dpo[0] = x[0] - sma[3] = 1 - 2.5
        assert_close(results[0].dpo, Some(-1.5));
        assert_close(results[0].sma, Some(2.5));
        assert_close(results[4].dpo, Some(5.0 - 6.5));
        // 右侧 3 个位置尚未到齐
        assert_eq!(results[5].dpo, None);
        assert_eq!(results[7].sma, None);
    }
}
