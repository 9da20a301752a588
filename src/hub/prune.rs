//! 有界缓存管理
//!
//! 同一连通分量内的所有存活节点从头部裁剪相同数量的记录，
//! 保证裁剪后位置 i 在各节点间仍然对应同一个时间键。
//! 每个节点至少保留 `required_history` 条，再加上上游向前看节点累计的回退量，
//! 以便后续追加与就近修正仍可增量计算。

use super::graph::HubGraph;
use super::NodeId;
use crate::{HubError, Result};

impl HubGraph {
    /// 按 max_size 裁剪所有存活节点，返回被裁剪最多的分量的裁剪数
    pub fn prune(&mut self, max_size: usize) -> Result<usize> {
        if max_size == 0 {
            return Err(HubError::Configuration {
                indicator: "prune".to_string(),
                reason: "max_size must be greater than 0".to_string(),
            });
        }

        let live = self.live_nodes();
        let components = self.components(&live);
        let leads = self.upstream_leads();

        // 分量 -> 可裁剪数量 (分量内取最小)
        let mut counts: Vec<Option<usize>> = vec![None; self.node_count()];
        for (index, slot) in self.slots().iter().enumerate() {
            if !live[index] {
                continue;
            }
            let node = &slot.node;
            let excess = if node.is_faulted() {
                0
            } else {
                node.len()
                    .saturating_sub(max_size.max(node.required_history() + leads[index]))
            };
            let root = components[index];
            counts[root] = Some(counts[root].map_or(excess, |c| c.min(excess)));
        }

        let mut pruned_max = 0;
        for index in 0..self.node_count() {
            if !live[index] {
                continue;
            }
            let count = counts[components[index]].unwrap_or(0);
            if count > 0 {
                self.slots_mut()[index].node.prune_front(count);
                pruned_max = pruned_max.max(count);
            }
        }

        if pruned_max > 0 {
            log::debug!("Pruned up to {} records per node (max_size {})", pruned_max, max_size);
        }
        Ok(pruned_max)
    }

    /// 配置了 max_cache_size 时每次写入后自动裁剪
    pub(crate) fn auto_prune(&mut self) -> Result<()> {
        if let Some(max_size) = self.config().max_cache_size {
            self.prune(max_size)?;
        }
        Ok(())
    }

    /// 存活节点：源节点，或订阅着全部上游且上游都存活的计算节点
    pub(crate) fn live_nodes(&self) -> Vec<bool> {
        let slots = self.slots();
        let mut live = vec![false; slots.len()];
        for (index, slot) in slots.iter().enumerate() {
            let providers = slot.node.providers();
            live[index] = providers.iter().all(|p| {
                live[p.0] && slots[p.0].observers.contains(&NodeId(index))
            });
        }
        live
    }

    /// 存活边构成的连通分量 (并查集)，返回每个节点的分量根
    fn components(&self, live: &[bool]) -> Vec<usize> {
        fn find(parent: &mut [usize], mut i: usize) -> usize {
            while parent[i] != i {
                parent[i] = parent[parent[i]];
                i = parent[i];
            }
            i
        }

        let mut parent: Vec<usize> = (0..live.len()).collect();
        for (index, slot) in self.slots().iter().enumerate() {
            if !live[index] {
                continue;
            }
            for provider in slot.node.providers() {
                let (a, b) = (find(&mut parent, index), find(&mut parent, provider.0));
                if a != b {
                    parent[a] = b;
                }
            }
        }
        (0..live.len()).map(|i| find(&mut parent, i)).collect()
    }
}
