//! 有序缓存
//!
//! 按时间键严格递增排列的记录序列，由唯一的节点独占：
//! - 二分定位 O(log n)
//! - 尾部追加 O(1) 快速路径
//! - 中间插入/删除 (后续位置整体平移)
//! - 头部裁剪 (offset 记录累计裁剪数量，保留绝对位置语义)

use super::{Series, Timestamp};
use crate::{HubError, Result};

// ═══════════════════════════════════════════════════════════════════════════
// 缓存动作
// ═══════════════════════════════════════════════════════════════════════════

/// 一次缓存变更的判定结果
///
/// 携带的 `usize` 为变更发生的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheAct {
    /// 新的尾部记录
    Append(usize),
    /// 迟到记录，插入到中间位置
    Insert(usize),
    /// 相同时间键、不同内容：原位覆盖
    Update(usize),
    /// 删除
    Delete(usize),
    /// 相同时间键、相同内容：幂等重发，不做任何事
    NoopResend(usize),
}

impl CacheAct {
    pub fn index(&self) -> usize {
        match *self {
            CacheAct::Append(i)
            | CacheAct::Insert(i)
            | CacheAct::Update(i)
            | CacheAct::Delete(i)
            | CacheAct::NoopResend(i) => i,
        }
    }

    /// 是否改变了已有位置 (需要重建而不是追加)
    pub fn is_interior(&self) -> bool {
        matches!(
            self,
            CacheAct::Insert(_) | CacheAct::Update(_) | CacheAct::Delete(_)
        )
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// SeriesCache
// ═══════════════════════════════════════════════════════════════════════════

/// 有序记录缓存
///
/// 头部裁剪只前移 `head`，死区不小于存活区时才整体压缩，
/// 对外始终是一段连续切片。
#[derive(Debug, Clone)]
pub struct SeriesCache<T> {
    items: Vec<T>,
    /// `items[..head]` 是已裁剪、待压缩的记录
    head: usize,
    /// 累计从头部裁剪掉的记录数
    offset: usize,
}

impl<T> Default for SeriesCache<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            head: 0,
            offset: 0,
        }
    }
}

impl<T> SeriesCache<T> {
    pub fn len(&self) -> usize {
        self.items.len() - self.head
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items[self.head..]
    }

    pub fn last(&self) -> Option<&T> {
        self.as_slice().last()
    }

    /// 按位置读取，越界为 OutOfRange
    pub fn get(&self, index: usize) -> Result<&T> {
        self.as_slice().get(index).ok_or(HubError::OutOfRange {
            index,
            len: self.len(),
        })
    }

    /// 从头部裁剪最多 count 条，返回实际裁剪数
    pub fn prune_front(&mut self, count: usize) -> usize {
        let count = count.min(self.len());
        self.head += count;
        self.offset += count;
        if self.head >= self.len() {
            self.items.drain(..self.head);
            self.head = 0;
        }
        count
    }

    /// 清空 (offset 保留)
    pub fn clear(&mut self) {
        self.items.clear();
        self.head = 0;
    }

    /// 截断并取走 [at, len) 的尾部
    pub(crate) fn split_off(&mut self, at: usize) -> Vec<T> {
        let at = at.min(self.len());
        self.items.split_off(self.head + at)
    }

    /// 恢复 `split_off` 取走的尾部 (失败回滚用)
    pub(crate) fn restore(&mut self, at: usize, tail: Vec<T>) {
        self.items.truncate(self.head + at);
        self.items.extend(tail);
    }

    pub(crate) fn set_offset(&mut self, offset: usize) {
        self.offset = offset;
    }
}

impl<T: Series> SeriesCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_offset(offset: usize) -> Self {
        Self {
            offset,
            ..Self::default()
        }
    }

    /// 第一个时间键 >= timestamp 的位置 (全部更小时返回 len)
    pub fn insertion_point(&self, timestamp: Timestamp) -> usize {
        self.as_slice().partition_point(|r| r.timestamp() < timestamp)
    }

    /// 定位记录
    ///
    /// - `exact = true`: 仅在时间键完全相等时返回
    /// - `exact = false`: 返回第一个时间键 >= timestamp 的位置
    pub fn position_of(&self, timestamp: Timestamp, exact: bool) -> Option<usize> {
        let index = self.insertion_point(timestamp);
        match self.as_slice().get(index) {
            Some(found) if !exact || found.timestamp() == timestamp => Some(index),
            _ => None,
        }
    }

    /// 判定一条到达记录应执行的动作
    pub fn classify(&self, record: &T) -> CacheAct
    where
        T: PartialEq,
    {
        let len = self.len();
        let timestamp = record.timestamp();

        // 快速路径：比当前最大时间键更新
        match self.last() {
            None => return CacheAct::Append(0),
            Some(last) if timestamp > last.timestamp() => return CacheAct::Append(len),
            _ => {}
        }

        let index = self.insertion_point(timestamp);
        match self.as_slice().get(index) {
            Some(existing) if existing.timestamp() == timestamp => {
                if existing == record {
                    CacheAct::NoopResend(index)
                } else {
                    CacheAct::Update(index)
                }
            }
            _ => CacheAct::Insert(index),
        }
    }

    /// 尾部追加，返回新记录的位置
    pub fn append(&mut self, record: T) -> Result<usize> {
        let index = self.len();
        if let Some(last) = self.last() {
            if record.timestamp() <= last.timestamp() {
                return Err(HubError::Sequence { index });
            }
        }
        self.items.push(record);
        Ok(index)
    }

    /// 在 index 处插入，后续位置后移
    pub fn insert_at(&mut self, index: usize, record: T) -> Result<()> {
        let len = self.len();
        if index > len {
            return Err(HubError::OutOfRange { index, len });
        }

        let live = self.as_slice();
        let timestamp = record.timestamp();
        let after_prev = index == 0 || live[index - 1].timestamp() < timestamp;
        let before_next = index == len || timestamp < live[index].timestamp();
        if !(after_prev && before_next) {
            return Err(HubError::Sequence { index });
        }

        self.items.insert(self.head + index, record);
        Ok(())
    }

    /// 原位覆盖 (时间键必须一致)，返回旧记录
    pub fn replace_at(&mut self, index: usize, record: T) -> Result<T> {
        let len = self.len();
        if index >= len {
            return Err(HubError::OutOfRange { index, len });
        }

        let slot = &mut self.items[self.head + index];
        if slot.timestamp() != record.timestamp() {
            return Err(HubError::Sequence { index });
        }

        Ok(std::mem::replace(slot, record))
    }

    /// 删除 index 处记录，后续位置前移
    pub fn remove_at(&mut self, index: usize) -> Result<T> {
        let len = self.len();
        if index >= len {
            return Err(HubError::OutOfRange { index, len });
        }
        Ok(self.items.remove(self.head + index))
    }

    /// 执行 `classify` 给出的动作
    pub fn apply(&mut self, act: CacheAct, record: T) -> Result<()> {
        match act {
            CacheAct::Append(_) => self.append(record).map(|_| ()),
            CacheAct::Insert(index) => self.insert_at(index, record),
            CacheAct::Update(index) => self.replace_at(index, record).map(|_| ()),
            CacheAct::Delete(index) => self.remove_at(index).map(|_| ()),
            CacheAct::NoopResend(_) => Ok(()),
        }
    }
}

impl<T> std::ops::Index<usize> for SeriesCache<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.as_slice()[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::TimeValue;
    use crate::testing::{ts, values};

    fn cache_of(raw: &[f64]) -> SeriesCache<TimeValue> {
        let mut cache = SeriesCache::new();
        for v in values(raw) {
            cache.append(v).unwrap();
        }
        cache
    }

    #[test]
    fn test_position_of_exact_and_nearest() {
        let cache = cache_of(&[1.0, 2.0, 3.0]);

        assert_eq!(cache.position_of(ts(1), true), Some(1));
        assert_eq!(cache.position_of(ts(1), false), Some(1));

        // 两个时间键之间
        let between = ts(1) + chrono::Duration::seconds(1);
        assert_eq!(cache.position_of(between, true), None);
        assert_eq!(cache.position_of(between, false), Some(2));

        // 超出末尾
        assert_eq!(cache.position_of(ts(10), false), None);
    }

    #[test]
    fn test_classify() {
        let cache = cache_of(&[1.0, 2.0, 3.0]);

        assert_eq!(cache.classify(&TimeValue::new(ts(3), 4.0)), CacheAct::Append(3));
        assert_eq!(cache.classify(&TimeValue::new(ts(1), 2.0)), CacheAct::NoopResend(1));
        assert_eq!(cache.classify(&TimeValue::new(ts(1), 9.0)), CacheAct::Update(1));

        let late = TimeValue::new(ts(0) + chrono::Duration::seconds(5), 7.0);
        assert_eq!(cache.classify(&late), CacheAct::Insert(1));

        let empty: SeriesCache<TimeValue> = SeriesCache::new();
        assert_eq!(empty.classify(&TimeValue::new(ts(0), 1.0)), CacheAct::Append(0));
    }

    #[test]
    fn test_insert_and_remove_shift_positions() {
        let mut cache = cache_of(&[1.0, 2.0, 3.0]);
        let late = TimeValue::new(ts(0) + chrono::Duration::seconds(5), 7.0);

        cache.insert_at(1, late).unwrap();
        assert_eq!(cache.len(), 4);
        assert_eq!(cache[1].value, 7.0);
        assert_eq!(cache[2].value, 2.0);

        let removed = cache.remove_at(1).unwrap();
        assert_eq!(removed.value, 7.0);
        assert_eq!(cache[1].value, 2.0);
    }

    #[test]
    fn test_ordering_violations() {
        let mut cache = cache_of(&[1.0, 2.0, 3.0]);

        // 追加不更新的时间键
        assert!(matches!(
            cache.append(TimeValue::new(ts(1), 0.0)),
            Err(HubError::Sequence { index: 3 })
        ));

        // 插入到错误位置
        assert!(matches!(
            cache.insert_at(0, TimeValue::new(ts(2), 0.0)),
            Err(HubError::Sequence { index: 0 })
        ));

        // 覆盖时时间键不一致
        assert!(matches!(
            cache.replace_at(0, TimeValue::new(ts(2), 0.0)),
            Err(HubError::Sequence { index: 0 })
        ));
    }

    #[test]
    fn test_out_of_range() {
        let mut cache = cache_of(&[1.0]);

        assert!(matches!(cache.get(1), Err(HubError::OutOfRange { index: 1, len: 1 })));
        assert!(matches!(cache.remove_at(5), Err(HubError::OutOfRange { index: 5, len: 1 })));
        assert!(matches!(
            cache.insert_at(3, TimeValue::new(ts(9), 0.0)),
            Err(HubError::OutOfRange { index: 3, len: 1 })
        ));
    }

    #[test]
    fn test_prune_front_tracks_offset() {
        let mut cache = cache_of(&[1.0, 2.0, 3.0, 4.0]);

        assert_eq!(cache.prune_front(3), 3);
        assert_eq!(cache.offset(), 3);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache[0].value, 4.0);

        // 超量裁剪只裁到空
        assert_eq!(cache.prune_front(10), 1);
        assert_eq!(cache.offset(), 4);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_rolling_prune_compacts_dead_prefix() {
        let mut cache: SeriesCache<TimeValue> = SeriesCache::new();
        for (i, v) in values(&(0..200).map(|v| v as f64).collect::<Vec<_>>()).into_iter().enumerate() {
            cache.append(v).unwrap();
            if cache.len() > 10 {
                assert_eq!(cache.prune_front(1), 1);
            }
            assert!(cache.items.len() <= 2 * 10 + 1, "step {}", i);
        }

        assert_eq!(cache.len(), 10);
        assert_eq!(cache.offset(), 190);
        assert_eq!(cache[0].value, 190.0);
        assert_eq!(cache.get(9).unwrap().value, 199.0);
        assert_eq!(cache.position_of(ts(195), true), Some(5));

        // 死区存在时的中间变更与回滚
        let tail = cache.split_off(8);
        assert_eq!(tail.len(), 2);
        cache.restore(8, tail);
        cache.remove_at(0).unwrap();
        assert_eq!(cache[0].value, 191.0);
        assert_eq!(cache.len(), 9);
    }

    #[test]
    fn test_split_off_and_restore() {
        let mut cache = cache_of(&[1.0, 2.0, 3.0]);

        let tail = cache.split_off(1);
        assert_eq!(cache.len(), 1);
        assert_eq!(tail.len(), 2);

        cache.append(TimeValue::new(ts(1), 99.0)).unwrap();
        cache.restore(1, tail);
        assert_eq!(cache.len(), 3);
        assert_eq!(cache[1].value, 2.0);
    }
}
