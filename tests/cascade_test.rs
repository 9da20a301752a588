// 级联与菱形依赖测试
//
// 运行：cargo test --test cascade_test -- --nocapture

mod common;

use common::{init_logger, random_values, ts, values};
use qaindicator::batch;
use qaindicator::indicators::*;
use qaindicator::{HubError, HubGraph, Indicator, Result, TimeValue, Window};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// ============================================================================
// A -> B -> C 级联
// ============================================================================

#[test]
fn test_three_level_cascade_after_interior_update() {
    init_logger();
    let (ema_f, sma_f) = (Ema::new(3).unwrap(), Sma::new(2).unwrap());

    let mut graph = HubGraph::new();
    let prices = graph.add_source::<TimeValue>("prices");
    let a = graph.attach(&prices, ema_f).unwrap();
    let b = graph.attach(&a, ema_f).unwrap();
    let c = graph.attach(&b, sma_f).unwrap();

    let mut truth = random_values(40, 21);
    graph.add_batch(&prices, truth.clone(), true).unwrap();

    // 修正中间位置
    truth[17].value += 5.0;
    graph.add(&prices, truth[17]).unwrap();

    let a_batch = batch::compute(&ema_f, &truth).unwrap();
    let b_batch = batch::compute(&ema_f, &a_batch).unwrap();
    let c_batch = batch::compute(&sma_f, &b_batch).unwrap();

    assert_eq!(graph.results(&a).unwrap(), a_batch.as_slice());
    assert_eq!(graph.results(&b).unwrap(), b_batch.as_slice());
    assert_eq!(graph.results(&c).unwrap(), c_batch.as_slice());
    println!("cascade ok: {} nodes", graph.node_count());
}

#[test]
fn test_unsubscribed_branch_freezes_until_reinitialized() {
    let ema_f = Ema::new(3).unwrap();
    let mut graph = HubGraph::new();
    let prices = graph.add_source::<TimeValue>("prices");
    let a = graph.attach(&prices, ema_f).unwrap();
    let b = graph.attach(&a, ema_f).unwrap();

    let truth = random_values(30, 4);
    graph.add_batch(&prices, truth[..20].to_vec(), true).unwrap();

    graph.unsubscribe(a.id()).unwrap();
    graph.add_batch(&prices, truth[20..].to_vec(), true).unwrap();
    assert_eq!(graph.results(&a).unwrap().len(), 20);
    assert_eq!(graph.results(&b).unwrap().len(), 20);

    graph.reinitialize(a.id()).unwrap();
    let a_batch = batch::compute(&ema_f, &truth).unwrap();
    assert_eq!(graph.results(&a).unwrap(), a_batch.as_slice());
    assert_eq!(graph.results(&b).unwrap(), batch::compute(&ema_f, &a_batch).unwrap().as_slice());
}

// ============================================================================
// 菱形依赖: prices -> SMA(3), SMA(5) -> CORR
// ============================================================================

#[test]
fn test_diamond_converges_under_random_mutations() {
    let (fast, slow, corr_f) = (Sma::new(3).unwrap(), Sma::new(5).unwrap(), Correlation::new(4).unwrap());

    let mut graph = HubGraph::new();
    let prices = graph.add_source::<TimeValue>("prices");
    let fast_h = graph.attach(&prices, fast).unwrap();
    let slow_h = graph.attach(&prices, slow).unwrap();
    let corr = graph.attach_pair(&fast_h, &slow_h, corr_f).unwrap();

    let pool = random_values(30, 8);
    let mut rng = StdRng::seed_from_u64(99);
    let mut present = vec![false; pool.len()];

    for _ in 0..200 {
        let i = rng.gen_range(0..pool.len());
        if present[i] && rng.gen_bool(0.4) {
            graph.remove(&prices, &pool[i]).unwrap();
            present[i] = false;
        } else {
            graph.add(&prices, pool[i]).unwrap();
            present[i] = true;
        }

        let truth: Vec<TimeValue> = pool
            .iter()
            .zip(&present)
            .filter(|(_, p)| **p)
            .map(|(r, _)| *r)
            .collect();
        let fast_batch = batch::compute(&fast, &truth).unwrap();
        let slow_batch = batch::compute(&slow, &truth).unwrap();
        let corr_batch = batch::compute_pair(&corr_f, &fast_batch, &slow_batch).unwrap();

        assert_eq!(graph.results(&corr).unwrap(), corr_batch.as_slice());
    }
}

// ============================================================================
// 故障隔离
// ============================================================================

/// 拒绝负数输入的公式
struct NonNegative;

impl Indicator<TimeValue> for NonNegative {
    type Output = TimeValue;
    type State = ();

    fn name(&self) -> String {
        "NONNEG".to_string()
    }

    fn lookback(&self) -> usize {
        1
    }

    fn compute(&self, window: &Window<'_, TimeValue, TimeValue>, _prev: Option<&()>, index: usize) -> Result<(TimeValue, ())> {
        let input = window.input(index)?;
        if input.value < 0.0 {
            return Err(HubError::Configuration {
                indicator: self.name(),
                reason: format!("negative input at {}", input.timestamp),
            });
        }
        Ok((*input, ()))
    }
}

#[test]
fn test_failing_branch_does_not_block_siblings() {
    let mut graph = HubGraph::new();
    let prices = graph.add_source::<TimeValue>("prices");
    let sma = graph.attach(&prices, Sma::new(2).unwrap()).unwrap();
    let strict = graph.attach(&prices, NonNegative).unwrap();
    let downstream = graph.attach(&strict, Ema::new(2).unwrap()).unwrap();
    graph.add_batch(&prices, values(&[1.0, 2.0, 3.0]), true).unwrap();

    let err = graph.add(&prices, TimeValue::new(ts(3), -1.0)).unwrap_err();
    assert!(matches!(err, HubError::Configuration { .. }));

    // 兄弟分支正常更新，失败分支及其下游保持旧结果
    assert_eq!(graph.results(&sma).unwrap().len(), 4);
    assert_eq!(graph.results(&strict).unwrap().len(), 3);
    assert_eq!(graph.results(&downstream).unwrap().len(), 3);
    assert!(graph.is_faulted(strict.id()).unwrap());

    // 修正数据后自动从失败位置恢复
    graph.add(&prices, TimeValue::new(ts(3), 4.0)).unwrap();
    assert!(!graph.is_faulted(strict.id()).unwrap());
    assert_eq!(graph.results(&strict).unwrap()[3].value, 4.0);
    assert_eq!(graph.results(&downstream).unwrap().len(), 4);
}

#[test]
fn test_construction_failure_leaves_graph_unchanged() {
    let mut graph = HubGraph::new();
    let prices = graph.add_source::<TimeValue>("prices");
    graph.add_batch(&prices, values(&[1.0, -2.0]), true).unwrap();

    assert!(graph.attach(&prices, NonNegative).is_err());
    assert_eq!(graph.node_count(), 1);
    assert_eq!(graph.subscriber_count(prices.id()).unwrap(), 0);
}
