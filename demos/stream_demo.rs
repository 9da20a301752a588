//! 流式指标计算示例
//!
//! 演示如何使用 Hub 计算图：
//! 1. 加载配置并创建计算图
//! 2. 建立源节点和链式/配对 Hub
//! 3. 流式写入、迟到插入、修正与删除
//! 4. 与批量计算结果对比
//!
//! 运行: cargo run --example stream_demo

use chrono::{Duration, TimeZone, Utc};
use qaindicator::batch;
use qaindicator::indicators::{Correlation, Ema, QuotePart, CandlePart, Rsi, Sma};
use qaindicator::{HubConfig, HubGraph, Quote, Timestamp};

fn ts(i: usize) -> Timestamp {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::minutes(i as i64)
}

fn quote(i: usize, close: f64) -> Quote {
    Quote::new(ts(i), close - 0.5, close + 1.0, close - 1.0, close, 1_000.0 + i as f64 * 10.0)
}

fn main() -> qaindicator::Result<()> {
    // 初始化日志
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("=== Hub 流式计算示例 ===\n");

    // ============================================================================
    // 1. 创建计算图
    // ============================================================================
    let config = HubConfig::load_default().unwrap_or_else(|e| {
        log::warn!("{}, using defaults", e);
        HubConfig::default()
    });
    log::info!("1. 创建计算图 {:?}", config);
    let mut graph = HubGraph::with_config(config)?;

    // ============================================================================
    // 2. 建立节点
    // ============================================================================
    log::info!("2. 建立节点");
    let quotes = graph.add_source::<Quote>("IX2401");
    let close = graph.attach(&quotes, QuotePart::new(CandlePart::Close))?;
    let volume = graph.attach(&quotes, QuotePart::new(CandlePart::Volume))?;
    let sma = graph.attach(&close, Sma::new(5)?)?;
    let ema = graph.attach(&sma, Ema::new(3)?)?;
    let rsi = graph.attach(&close, Rsi::new(6)?)?;
    let corr = graph.attach_pair(&close, &volume, Correlation::new(8)?)?;
    log::info!("   {} 个节点", graph.node_count());

    // ============================================================================
    // 3. 流式写入
    // ============================================================================
    log::info!("3. 流式写入 30 根 K 线");
    let mut truth: Vec<Quote> = (0..30)
        .map(|i| quote(i, 100.0 + (i as f64 * 0.7).sin() * 3.0))
        .collect();
    for q in truth.iter().filter(|q| q.timestamp != ts(12)) {
        graph.add(&quotes, *q)?;
    }

    // 迟到的 K 线
    log::info!("   迟到插入: {:?}", graph.insert(&quotes, truth[12])?);

    // 修正最后一根
    truth[29] = quote(29, 110.0);
    log::info!("   修正: {:?}", graph.add(&quotes, truth[29])?);

    // 删除一根
    let removed = graph.remove(&quotes, &truth[20])?;
    truth.remove(20);
    log::info!("   删除位置 {}", removed);

    // ============================================================================
    // 4. 查看结果
    // ============================================================================
    log::info!("4. 最新结果");
    let last = |n: usize| n.saturating_sub(1);
    let smas = graph.results(&sma)?;
    let emas = graph.results(&ema)?;
    let rsis = graph.results(&rsi)?;
    let corrs = graph.results(&corr)?;
    let i = last(smas.len());
    log::info!(
        "   {} sma={:?} ema={:?} rsi={:?} corr={:?}",
        smas[i].timestamp,
        smas[i].sma,
        emas[i].ema,
        rsis[i].rsi,
        corrs[i].correlation
    );

    // ============================================================================
    // 5. 与批量计算对比
    // ============================================================================
    let closes = batch::compute(&QuotePart::new(CandlePart::Close), &truth)?;
    let expected = batch::compute(&Rsi::new(6)?, &closes)?;
    if expected.as_slice() == rsis {
        log::info!("5. 流式结果与批量计算一致 ({} 条)", expected.len());
    } else {
        log::error!("5. 流式结果与批量计算不一致");
    }

    Ok(())
}
