//! 页生命周期区间统计。
//!
//! # 统计口径（What）
//! - `allocate_to_containerize`：借出到装箱；
//! - `containerize_to_release`：装箱到归还（未装箱直接归还的页不计入）；
//! - `release_to_allocate`：归还到下一次借出（首次借出不计入）；
//! - `allocate_to_release`：借出到归还。
//!
//! 每个区间只由一侧线程写入：前两项中的“装箱”与第三项属于分配侧，其余属于归还侧。
//! 因此每个统计量各自持有一把自旋锁，锁内只做几次算术运算，两侧不会相互等待。

use std::{fmt, time::Duration};

/// 流式区间统计：次数、平均、最小、最大。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IntervalStats {
    count: u64,
    total: Duration,
    min: Option<Duration>,
    max: Duration,
}

impl IntervalStats {
    /// 记录一次区间耗时。
    pub fn record(&mut self, sample: Duration) {
        self.count += 1;
        self.total = self.total.saturating_add(sample);
        self.min = Some(self.min.map_or(sample, |min| min.min(sample)));
        self.max = self.max.max(sample);
    }

    /// 样本数。
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 平均耗时；无样本时为 `None`。
    pub fn mean(&self) -> Option<Duration> {
        if self.count == 0 {
            return None;
        }
        let nanos = self.total.as_nanos() / u128::from(self.count);
        Some(Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX)))
    }

    /// 最小耗时。
    pub fn min(&self) -> Option<Duration> {
        self.min
    }

    /// 最大耗时；无样本时为 `None`。
    pub fn max(&self) -> Option<Duration> {
        (self.count > 0).then_some(self.max)
    }
}

impl fmt::Display for IntervalStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.mean(), self.min(), self.max()) {
            (Some(mean), Some(min), Some(max)) => write!(
                f,
                "n={} mean={:?} min={:?} max={:?}",
                self.count, mean, min, max
            ),
            _ => f.write_str("n=0"),
        }
    }
}

/// 四类区间统计的快照。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolTiming {
    /// 借出到装箱。
    pub allocate_to_containerize: IntervalStats,
    /// 装箱到归还。
    pub containerize_to_release: IntervalStats,
    /// 归还到再次借出。
    pub release_to_allocate: IntervalStats,
    /// 借出到归还。
    pub allocate_to_release: IntervalStats,
}

/// 页池内部持有的统计写入端。
#[derive(Debug, Default)]
pub(crate) struct TimingRecorder {
    allocate_to_containerize: spin::Mutex<IntervalStats>,
    containerize_to_release: spin::Mutex<IntervalStats>,
    release_to_allocate: spin::Mutex<IntervalStats>,
    allocate_to_release: spin::Mutex<IntervalStats>,
}

impl TimingRecorder {
    pub(crate) fn on_containerize(&self, since_allocate: Duration) {
        self.allocate_to_containerize.lock().record(since_allocate);
    }

    pub(crate) fn on_allocate(&self, since_release: Duration) {
        self.release_to_allocate.lock().record(since_release);
    }

    pub(crate) fn on_release(&self, since_allocate: Duration, since_containerize: Option<Duration>) {
        self.allocate_to_release.lock().record(since_allocate);
        if let Some(held) = since_containerize {
            self.containerize_to_release.lock().record(held);
        }
    }

    pub(crate) fn snapshot(&self) -> PoolTiming {
        PoolTiming {
            allocate_to_containerize: *self.allocate_to_containerize.lock(),
            containerize_to_release: *self.containerize_to_release.lock(),
            release_to_allocate: *self.release_to_allocate.lock(),
            allocate_to_release: *self.allocate_to_release.lock(),
        }
    }
}
