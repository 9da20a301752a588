//! 行情分量 - 把 OHLCV 行情转换为可链式使用的单值序列

use serde::{Deserialize, Serialize};

use crate::hub::{Indicator, Window};
use crate::series::{Quote, TimeValue};
use crate::Result;

/// 取值方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandlePart {
    Open,
    High,
    Low,
    Close,
    Volume,
    /// (H + L) / 2
    HL2,
    /// (H + L + C) / 3
    HLC3,
    /// (O + C) / 2
    OC2,
    /// (O + H + L) / 3
    OHL3,
    /// (O + H + L + C) / 4
    OHLC4,
}

impl CandlePart {
    pub fn value_of(&self, q: &Quote) -> f64 {
        match self {
            CandlePart::Open => q.open,
            CandlePart::High => q.high,
            CandlePart::Low => q.low,
            CandlePart::Close => q.close,
            CandlePart::Volume => q.volume,
            CandlePart::HL2 => (q.high + q.low) / 2.0,
            CandlePart::HLC3 => (q.high + q.low + q.close) / 3.0,
            CandlePart::OC2 => (q.open + q.close) / 2.0,
            CandlePart::OHL3 => (q.open + q.high + q.low) / 3.0,
            CandlePart::OHLC4 => (q.open + q.high + q.low + q.close) / 4.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct QuotePart {
    pub part: CandlePart,
}

impl QuotePart {
    pub fn new(part: CandlePart) -> Self {
        Self { part }
    }
}

impl Indicator<Quote> for QuotePart {
    type Output = TimeValue;
    type State = ();

    fn name(&self) -> String {
        format!("QUOTEPART({})", format!("{:?}", self.part).to_uppercase())
    }

    fn lookback(&self) -> usize {
        1
    }

    fn compute(&self, window: &Window<'_, Quote, TimeValue>, _prev: Option<&()>, index: usize) -> Result<(TimeValue, ())> {
        let quote = window.input(index)?;
        Ok((TimeValue::new(quote.timestamp, self.part.value_of(quote)), ()))
    }
}
