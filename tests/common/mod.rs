// 集成测试公共工具

#![allow(dead_code)]

use chrono::{Duration, TimeZone, Utc};
use qaindicator::{Quote, TimeValue, Timestamp};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// 第 i 个时间键 (间隔 1 分钟)
pub fn ts(i: usize) -> Timestamp {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::minutes(i as i64)
}

pub fn values(raw: &[f64]) -> Vec<TimeValue> {
    raw.iter()
        .enumerate()
        .map(|(i, v)| TimeValue::new(ts(i), *v))
        .collect()
}

pub fn random_quote(rng: &mut StdRng, i: usize, base: f64) -> Quote {
    let open = base + rng.gen_range(-2.0..2.0);
    let close = base + rng.gen_range(-2.0..2.0);
    let high = open.max(close) + rng.gen_range(0.0..1.0);
    let low = open.min(close) - rng.gen_range(0.0..1.0);
    Quote::new(ts(i), open, high, low, close, rng.gen_range(1_000.0..5_000.0))
}

/// 随机游走行情
pub fn random_quotes(count: usize, seed: u64) -> Vec<Quote> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut base = 100.0;
    (0..count)
        .map(|i| {
            base += rng.gen_range(-1.5..1.5);
            random_quote(&mut rng, i, base)
        })
        .collect()
}

pub fn random_values(count: usize, seed: u64) -> Vec<TimeValue> {
    random_quotes(count, seed)
        .into_iter()
        .map(|q| TimeValue::new(q.timestamp, q.close))
        .collect()
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
