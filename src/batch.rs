//! 批量计算
//!
//! 一次性对完整有序输入计算。与 Hub 走同一条逐位置计算路径，
//! 所以流式/乱序写入收敛后的结果与这里逐位相同。

use crate::hub::node::HubCore;
use crate::hub::pairs::check_aligned;
use crate::hub::{Indicator, PairIndicator, PairWindow, Window};
use crate::series::Series;
use crate::{HubError, Result};

/// 输入必须严格按时间升序且无重复
fn check_sequence<I: Series>(inputs: &[I]) -> Result<()> {
    match inputs
        .windows(2)
        .position(|w| w[0].timestamp() >= w[1].timestamp())
    {
        Some(i) => Err(HubError::Sequence { index: i + 1 }),
        None => Ok(()),
    }
}

/// 单上游批量计算
pub fn compute<I, F>(formula: &F, inputs: &[I]) -> Result<Vec<F::Output>>
where
    I: Series,
    F: Indicator<I>,
{
    check_sequence(inputs)?;

    let mut core: HubCore<F::Output, F::State> =
        HubCore::new(formula.name(), formula.lookback(), formula.right_span());
    core.rebuild_all(inputs.len(), 0, |outputs, prev, index| {
        formula.compute(&Window::new(inputs, outputs, 0), prev, index)
    })?;
    Ok(core.cache.as_slice().to_vec())
}

/// 双上游批量计算，两侧按位置对齐，长度取较短一侧
pub fn compute_pair<I, F>(formula: &F, a: &[I], b: &[I]) -> Result<Vec<F::Output>>
where
    I: Series,
    F: PairIndicator<I>,
{
    check_sequence(a)?;
    check_sequence(b)?;

    let mut core: HubCore<F::Output, F::State> = HubCore::new(formula.name(), formula.lookback(), 0);
    core.rebuild_all(a.len().min(b.len()), 0, |outputs, prev, index| {
        check_aligned(a, b, index)?;
        formula.compute(&PairWindow::new(a, b, outputs, 0), prev, index)
    })?;
    Ok(core.cache.as_slice().to_vec())
}

/// 排序并去重 (同一时间键保留最后一条)，得到批量计算可接受的输入
pub fn normalize<T: Series>(mut records: Vec<T>) -> Vec<T> {
    records.sort_by_key(|r| r.timestamp());

    let mut normalized: Vec<T> = Vec::with_capacity(records.len());
    for record in records {
        match normalized.last_mut() {
            Some(last) if last.timestamp() == record.timestamp() => *last = record,
            _ => normalized.push(record),
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::Sma;
    use crate::series::TimeValue;
    use crate::testing::{ts, values};

    #[test]
    fn test_compute_sma() {
        let results = compute(&Sma::new(3).unwrap(), &values(&[1.0, 2.0, 3.0, 4.0, 5.0])).unwrap();
        let smas: Vec<Option<f64>> = results.iter().map(|r| r.sma).collect();
        assert_eq!(smas, vec![None, None, Some(2.0), Some(3.0), Some(4.0)]);
    }

    #[test]
    fn test_compute_rejects_unordered_input() {
        let mut inputs = values(&[1.0, 2.0, 3.0]);
        inputs.swap(1, 2);
        assert!(matches!(
            compute(&Sma::new(2).unwrap(), &inputs),
            Err(HubError::Sequence { index: 1 })
        ));
    }

    #[test]
    fn test_normalize_last_write_wins() {
        let records = vec![
            TimeValue::new(ts(2), 3.0),
            TimeValue::new(ts(0), 1.0),
            TimeValue::new(ts(2), 30.0),
            TimeValue::new(ts(1), 2.0),
        ];
        let normalized = normalize(records);
        let raw: Vec<f64> = normalized.iter().map(|r| r.value).collect();
        assert_eq!(raw, vec![1.0, 2.0, 30.0]);
    }

    #[test]
    fn test_compute_empty() {
        let empty: Vec<TimeValue> = Vec::new();
        assert!(compute(&Sma::new(3).unwrap(), &empty).unwrap().is_empty());
    }
}
