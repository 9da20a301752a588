//! 滚动标准差 (总体) 与 Z 分数

use serde::{Deserialize, Serialize};

use super::{finite_values, require_at_least, WelfordStats};
use crate::hub::{Indicator, Window};
use crate::series::{value_or_nan, Reusable, Series, Timestamp};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StdDevResult {
    pub timestamp: Timestamp,
    pub std_dev: Option<f64>,
    pub mean: Option<f64>,
    pub z_score: Option<f64>,
}

impl Series for StdDevResult {
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

impl Reusable for StdDevResult {
    fn value(&self) -> f64 {
        value_or_nan(self.std_dev)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StdDev {
    period: usize,
}

impl StdDev {
    pub fn new(period: usize) -> Result<Self> {
        require_at_least("STDEV", "period", period, 2)?;
        Ok(Self { period })
    }
}

impl<I: Reusable + 'static> Indicator<I> for StdDev {
    type Output = StdDevResult;
    type State = ();

    fn name(&self) -> String {
        format!("STDEV({})", self.period)
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, window: &Window<'_, I, StdDevResult>, _prev: Option<&()>, index: usize) -> Result<(StdDevResult, ())> {
        let input = window.input(index)?;
        let mut result = StdDevResult {
            timestamp: input.timestamp(),
            std_dev: None,
            mean: None,
            z_score: None,
        };

        if let Some(values) = window.trailing(index, self.period).and_then(finite_values) {
            let stats = WelfordStats::from_values(values);
            let std_dev = stats.std();
            result.std_dev = Some(std_dev);
            result.mean = Some(stats.mean);
            result.z_score = (std_dev != 0.0).then(|| (input.value() - stats.mean) / std_dev);
        }
        Ok((result, ()))
    }
}
