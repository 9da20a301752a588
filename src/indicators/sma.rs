//! 简单移动平均

use serde::{Deserialize, Serialize};

use super::{finite_values, require_at_least};
use crate::hub::{Indicator, Window};
use crate::series::{value_or_nan, Reusable, Series, Timestamp};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmaResult {
    pub timestamp: Timestamp,
    pub sma: Option<f64>,
}

impl Series for SmaResult {
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

impl Reusable for SmaResult {
    fn value(&self) -> f64 {
        value_or_nan(self.sma)
    }
}

/// SMA(period)
///
/// 窗口内任一值缺失 (NaN) 时输出 None
#[derive(Debug, Clone, Copy)]
pub struct Sma {
    period: usize,
}

impl Sma {
    pub fn new(period: usize) -> Result<Self> {
        require_at_least("SMA", "period", period, 1)?;
        Ok(Self { period })
    }

    pub fn period(&self) -> usize {
        self.period
    }
}

impl<I: Reusable + 'static> Indicator<I> for Sma {
    type Output = SmaResult;
    type State = ();

    fn name(&self) -> String {
        format!("SMA({})", self.period)
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, window: &Window<'_, I, SmaResult>, _prev: Option<&()>, index: usize) -> Result<(SmaResult, ())> {
        let timestamp = window.input(index)?.timestamp();
        let sma = window
            .trailing(index, self.period)
            .and_then(finite_values)
            .map(|values| values.iter().sum::<f64>() / self.period as f64);
        Ok((SmaResult { timestamp, sma }, ()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch;
    use crate::testing::values;
    use crate::HubError;

    #[test]
    fn test_sma_values() {
        let results = batch::compute(&Sma::new(2).unwrap(), &values(&[1.0, 3.0, 5.0, 7.0])).unwrap();
        let smas: Vec<Option<f64>> = results.iter().map(|r| r.sma).collect();
        assert_eq!(smas, vec![None, Some(2.0), Some(4.0), Some(6.0)]);
        assert!(results[0].value().is_nan());
    }

    #[test]
    fn test_sma_gap_in_window() {
        let results = batch::compute(&Sma::new(2).unwrap(), &values(&[1.0, f64::NAN, 5.0, 7.0])).unwrap();
        let smas: Vec<Option<f64>> = results.iter().map(|r| r.sma).collect();
        assert_eq!(smas, vec![None, None, None, Some(6.0)]);
    }

    #[test]
    fn test_sma_invalid_period() {
        assert!(matches!(Sma::new(0), Err(HubError::Configuration { .. })));
    }
}
