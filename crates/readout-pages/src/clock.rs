//! 页生命周期计时所用的时钟抽象。
//!
//! # 设计背景（Why）
//! - 页池统计“借出→装箱→归还→再借出”的各段耗时；直接读取系统时钟会让测试依赖真实流逝的时间。
//! - 通过 [`Clock`] 注入时间源：生产环境使用 [`SystemClock`]，测试使用 [`MockClock`] 手动推进。
//!
//! # 契约说明（What）
//! - `now` 必须单调不减；页池以构造时读取的时刻为锚点，把所有时间戳存为相对纳秒数。

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

/// 单调时间源。
pub trait Clock: Send + Sync + 'static {
    /// 返回当前时刻。
    fn now(&self) -> Instant;
}

/// 基于 [`Instant::now`] 的系统时钟。
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// 可手动推进的虚拟时钟。
///
/// 克隆体共享同一条时间线：测试持有一份用于 `advance`，另一份注入页池。
#[derive(Clone, Debug)]
pub struct MockClock {
    origin: Instant,
    elapsed: Arc<spin::Mutex<Duration>>,
}

impl MockClock {
    /// 以当前真实时刻为原点创建虚拟时钟。
    pub fn new() -> Self {
        Self::with_origin(Instant::now())
    }

    /// 以指定时刻为原点创建虚拟时钟。
    pub fn with_origin(origin: Instant) -> Self {
        Self {
            origin,
            elapsed: Arc::new(spin::Mutex::new(Duration::ZERO)),
        }
    }

    /// 推进虚拟时间。
    pub fn advance(&self, delta: Duration) {
        let mut elapsed = self.elapsed.lock();
        *elapsed = elapsed.saturating_add(delta);
    }

    /// 自原点以来累计推进的时间。
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock()
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_clock_clones_share_timeline() {
        let clock = MockClock::new();
        let injected = clock.clone();
        let start = injected.now();
        clock.advance(Duration::from_millis(5));
        assert_eq!(injected.now() - start, Duration::from_millis(5));
        assert_eq!(injected.elapsed(), Duration::from_millis(5));
    }
}
