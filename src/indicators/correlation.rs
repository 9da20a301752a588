//! 相关系数 (配对公式)

use serde::{Deserialize, Serialize};

use super::{finite_values, require_at_least, CoMoments};
use crate::hub::{PairIndicator, PairWindow};
use crate::series::{value_or_nan, Reusable, Series, Timestamp};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrResult {
    pub timestamp: Timestamp,
    pub variance_a: Option<f64>,
    pub variance_b: Option<f64>,
    pub covariance: Option<f64>,
    pub correlation: Option<f64>,
    pub r_squared: Option<f64>,
}

impl Series for CorrResult {
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

impl Reusable for CorrResult {
    fn value(&self) -> f64 {
        value_or_nan(self.correlation)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Correlation {
    period: usize,
}

impl Correlation {
    pub fn new(period: usize) -> Result<Self> {
        require_at_least("CORR", "period", period, 2)?;
        Ok(Self { period })
    }
}

impl<I: Reusable + 'static> PairIndicator<I> for Correlation {
    type Output = CorrResult;
    type State = ();

    fn name(&self) -> String {
        format!("CORR({})", self.period)
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, window: &PairWindow<'_, I, CorrResult>, _prev: Option<&()>, index: usize) -> Result<(CorrResult, ())> {
        let mut result = CorrResult {
            timestamp: window.input(index)?.0.timestamp(),
            variance_a: None,
            variance_b: None,
            covariance: None,
            correlation: None,
            r_squared: None,
        };

        let values = window
            .trailing(index, self.period)
            .and_then(|(a, b)| Some((finite_values(a)?, finite_values(b)?)));

        if let Some((a, b)) = values {
            let moments = CoMoments::from_pairs(a.into_iter().zip(b));
            let (var_a, var_b, cov) = (moments.a.variance(), moments.b.variance(), moments.covariance());

            result.variance_a = Some(var_a);
            result.variance_b = Some(var_b);
            result.covariance = Some(cov);

            let divisor = (var_a * var_b).sqrt();
            if divisor != 0.0 {
                let correlation = cov / divisor;
                result.correlation = Some(correlation);
                result.r_squared = Some(correlation * correlation);
            }
        }
        Ok((result, ()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch;
    use crate::testing::{assert_close, values};

    #[test]
    fn test_perfect_correlation() {
        let a = values(&[1.0, 2.0, 3.0, 4.0]);
        let b = values(&[2.0, 4.0, 6.0, 8.0]);
        let results = batch::compute_pair(&Correlation::new(3).unwrap(), &a, &b).unwrap();

        assert_eq!(results[1].correlation, None);
        assert_close(results[2].correlation, Some(1.0));
        assert_close(results[3].r_squared, Some(1.0));
    }

    #[test]
    fn test_inverse_and_flat() {
        let a = values(&[1.0, 2.0, 3.0]);
        let b = values(&[3.0, 2.0, 1.0]);
        let results = batch::compute_pair(&Correlation::new(3).unwrap(), &a, &b).unwrap();
        assert_close(results[2].correlation, Some(-1.0));

        let flat = values(&[5.0, 5.0, 5.0]);
        let results = batch::compute_pair(&Correlation::new(3).unwrap(), &a, &flat).unwrap();
        assert_close(results[2].variance_b, Some(0.0));
        assert_eq!(results[2].correlation, None);
    }
}
