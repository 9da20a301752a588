//! 累积/派发线 (Accumulation / Distribution Line)

use serde::{Deserialize, Serialize};

use crate::hub::{Indicator, Window};
use crate::series::{Quote, Reusable, Series, Timestamp};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdlResult {
    pub timestamp: Timestamp,
    pub money_flow_multiplier: f64,
    pub money_flow_volume: f64,
    pub adl: f64,
}

impl Series for AdlResult {
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

impl Reusable for AdlResult {
    fn value(&self) -> f64 {
        self.adl
    }
}

/// 状态为上一位置的累积值，回滚只需恢复检查点
#[derive(Debug, Clone, Copy, Default)]
pub struct Adl;

impl Indicator<Quote> for Adl {
    type Output = AdlResult;
    type State = f64;

    fn name(&self) -> String {
        "ADL".to_string()
    }

    fn lookback(&self) -> usize {
        1
    }

    fn compute(&self, window: &Window<'_, Quote, AdlResult>, prev: Option<&f64>, index: usize) -> Result<(AdlResult, f64)> {
        let q = window.input(index)?;

        let money_flow_multiplier = if q.high == q.low {
            0.0
        } else {
            ((q.close - q.low) - (q.high - q.close)) / (q.high - q.low)
        };
        let money_flow_volume = money_flow_multiplier * q.volume;
        let adl = prev.copied().unwrap_or(0.0) + money_flow_volume;

        Ok((
            AdlResult {
                timestamp: q.timestamp(),
                money_flow_multiplier,
                money_flow_volume,
                adl,
            },
            adl,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch;
    use crate::testing::ts;

    #[test]
    fn test_adl_accumulates() {
        let quotes = vec![
            // 收在最高价: 乘数 1
            Quote::new(ts(0), 10.0, 12.0, 8.0, 12.0, 100.0),
            // 收在最低价: 乘数 -1
            Quote::new(ts(1), 12.0, 13.0, 9.0, 9.0, 50.0),
            // 无振幅
            Quote::new(ts(2), 9.0, 9.0, 9.0, 9.0, 70.0),
        ];
        let results = batch::compute(&Adl, &quotes).unwrap();

        assert_eq!(results[0].adl, 100.0);
        assert_eq!(results[1].money_flow_multiplier, -1.0);
        assert_eq!(results[1].adl, 50.0);
        assert_eq!(results[2].money_flow_volume, 0.0);
        assert_eq!(results[2].value(), 50.0);
    }
}
