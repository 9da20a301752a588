//! 单元测试公共工具

use chrono::{Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::series::{Quote, TimeValue, Timestamp};

/// 第 i 个时间键 (间隔 1 分钟)
pub(crate) fn ts(i: usize) -> Timestamp {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::minutes(i as i64)
}

pub(crate) fn values(raw: &[f64]) -> Vec<TimeValue> {
    raw.iter()
        .enumerate()
        .map(|(i, v)| TimeValue::new(ts(i), *v))
        .collect()
}

/// 随机游走行情
pub(crate) fn random_quotes(count: usize, seed: u64) -> Vec<Quote> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut close = 100.0;
    (0..count)
        .map(|i| {
            let open = close;
            close = (open + rng.gen_range(-2.0..2.0_f64)).max(1.0);
            let high = open.max(close) + rng.gen_range(0.0..1.0);
            let low = (open.min(close) - rng.gen_range(0.0..1.0)).max(0.5);
            let volume = rng.gen_range(1_000.0..5_000.0);
            Quote::new(ts(i), open, high, low, close, volume)
        })
        .collect()
}

pub(crate) fn random_values(count: usize, seed: u64) -> Vec<TimeValue> {
    random_quotes(count, seed)
        .into_iter()
        .map(|q| TimeValue::new(q.timestamp, q.close))
        .collect()
}

pub(crate) fn assert_close(actual: Option<f64>, expected: Option<f64>) {
    match (actual, expected) {
        (Some(a), Some(e)) => assert!((a - e).abs() < 1e-9, "{} != {}", a, e),
        (a, e) => assert_eq!(a, e),
    }
}
