//! 威廉分形 (向前看的公式)
//!
//! 位置 i 是否为分形取决于其后 right_span 个位置，所以 i 的输出在
//! `i + right_span` 到达之前都是临时值，之后的修正会重新打开它。

use serde::{Deserialize, Serialize};

use super::require_at_least;
use crate::hub::{Indicator, Window};
use crate::series::{Quote, Series, Timestamp};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FractalResult {
    pub timestamp: Timestamp,
    /// 顶分形 (局部最高)
    pub fractal_bear: Option<f64>,
    /// 底分形 (局部最低)
    pub fractal_bull: Option<f64>,
}

impl Series for FractalResult {
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

/// 比较用的价格
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndType {
    /// 最高价/最低价
    HighLow,
    /// 收盘价
    Close,
}

#[derive(Debug, Clone, Copy)]
pub struct Fractal {
    left_span: usize,
    right_span: usize,
    end_type: EndType,
}

impl Fractal {
    pub fn new(window_span: usize) -> Result<Self> {
        Self::with_spans(window_span, window_span, EndType::HighLow)
    }

    pub fn with_spans(left_span: usize, right_span: usize, end_type: EndType) -> Result<Self> {
        require_at_least("FRACTAL", "left_span", left_span, 2)?;
        require_at_least("FRACTAL", "right_span", right_span, 2)?;
        Ok(Self {
            left_span,
            right_span,
            end_type,
        })
    }

    fn high_low(&self, q: &Quote) -> (f64, f64) {
        match self.end_type {
            EndType::HighLow => (q.high, q.low),
            EndType::Close => (q.close, q.close),
        }
    }
}

impl Indicator<Quote> for Fractal {
    type Output = FractalResult;
    type State = ();

    fn name(&self) -> String {
        format!("FRACTAL({},{},{:?})", self.left_span, self.right_span, self.end_type)
    }

    fn lookback(&self) -> usize {
        self.left_span + 1
    }

    fn right_span(&self) -> usize {
        self.right_span
    }

    fn compute(&self, window: &Window<'_, Quote, FractalResult>, _prev: Option<&()>, index: usize) -> Result<(FractalResult, ())> {
        let center = window.input(index)?;
        let mut result = FractalResult {
            timestamp: center.timestamp(),
            fractal_bear: None,
            fractal_bull: None,
        };

        let wings = window
            .trailing(index, self.left_span + 1)
            .zip(window.leading(index, self.right_span));

        if let Some((left, right)) = wings {
            let (high, low) = self.high_low(center);
            // left 的最后一个是 center 自身
            let others = left[..self.left_span].iter().chain(right);

            let (mut is_high, mut is_low) = (true, true);
            for wing in others {
                let (wing_high, wing_low) = self.high_low(wing);
                is_high &= high > wing_high;
                is_low &= low < wing_low;
            }

            result.fractal_bear = is_high.then_some(high);
            result.fractal_bull = is_low.then_some(low);
        }
        Ok((result, ()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch;
    use crate::testing::ts;

    fn quote(i: usize, high: f64, low: f64) -> Quote {
        Quote::new(ts(i), low, high, low, high, 1.0)
    }

    #[test]
    fn test_fractal_peak_and_trough() {
        let highs = [1.0, 2.0, 5.0, 2.0, 1.0, 2.0, 3.0];
        let lows = [0.5, 0.4, 0.6, 0.3, 0.1, 0.2, 0.3];
        let quotes: Vec<Quote> = (0..7).map(|i| quote(i, highs[i], lows[i])).collect();

        let results = batch::compute(&Fractal::new(2).unwrap(), &quotes).unwrap();

        assert_eq!(results[2].fractal_bear, Some(5.0));
        assert_eq!(results[2].fractal_bull, None);
        assert_eq!(results[4].fractal_bull, Some(0.1));
        // 右侧上下文未到齐
        assert_eq!(results[5].fractal_bull, None);
        assert_eq!(results[6].fractal_bear, None);
    }

    #[test]
    fn test_fractal_ties_are_not_fractals() {
        let quotes: Vec<Quote> = (0..5).map(|i| quote(i, 2.0, 1.0)).collect();
        let results = batch::compute(&Fractal::new(2).unwrap(), &quotes).unwrap();
        assert!(results.iter().all(|r| r.fractal_bear.is_none() && r.fractal_bull.is_none()));
    }

    #[test]
    fn test_fractal_invalid_span() {
        assert!(Fractal::new(1).is_err());
        let fractal = Fractal::with_spans(2, 3, EndType::Close).unwrap();
        assert_eq!(Indicator::<Quote>::right_span(&fractal), 3);
    }
}
