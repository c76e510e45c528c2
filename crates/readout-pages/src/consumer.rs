//! 批量推送：逐项调用单项推送原语，分别统计成功与失败。
//!
//! 批次中任何一项失败都不会中断后续项的推送；批次只要有一项失败就计为“部分失败批次”。

use std::fmt;

/// 单项推送原语。
pub trait Consumer<T: ?Sized> {
    /// 推送失败的原因。
    type Error: fmt::Display;

    /// 推送一项。
    fn push(&mut self, item: &T) -> Result<(), Self::Error>;
}

impl<T: ?Sized, E: fmt::Display, F> Consumer<T> for F
where
    F: FnMut(&T) -> Result<(), E>,
{
    type Error = E;

    fn push(&mut self, item: &T) -> Result<(), E> {
        self(item)
    }
}

/// 一个批次的推送结果。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// 推送成功的项数。
    pub succeeded: usize,
    /// 推送失败的项数。
    pub failed: usize,
}

impl BatchOutcome {
    /// 批次是否全部成功（空批次视为成功）。
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// 批次总项数。
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// 跨批次的累计计数。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchTotals {
    /// 全部成功的批次数。
    pub batches_succeeded: u64,
    /// 至少一项失败的批次数。
    pub batches_failed: u64,
    /// 推送成功的总项数。
    pub items_succeeded: u64,
    /// 推送失败的总项数。
    pub items_failed: u64,
}

/// 包装单项推送原语，提供批量推送与累计统计。
#[derive(Debug, Default)]
pub struct BatchConsumer<C> {
    inner: C,
    totals: BatchTotals,
}

impl<C> BatchConsumer<C> {
    /// 包装一个单项推送原语。
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            totals: BatchTotals::default(),
        }
    }

    /// 推送一个批次，返回本批次的成功与失败项数。
    pub fn push_batch<'a, T, I>(&mut self, items: I) -> BatchOutcome
    where
        T: ?Sized + 'a,
        I: IntoIterator<Item = &'a T>,
        C: Consumer<T>,
    {
        let mut outcome = BatchOutcome::default();
        for (index, item) in items.into_iter().enumerate() {
            match self.inner.push(item) {
                Ok(()) => outcome.succeeded += 1,
                Err(error) => {
                    tracing::debug!(index, %error, "批次中单项推送失败");
                    outcome.failed += 1;
                }
            }
        }

        self.totals.items_succeeded += outcome.succeeded as u64;
        self.totals.items_failed += outcome.failed as u64;
        if outcome.is_success() {
            self.totals.batches_succeeded += 1;
        } else {
            self.totals.batches_failed += 1;
        }
        outcome
    }

    /// 累计计数。
    pub fn totals(&self) -> BatchTotals {
        self.totals
    }

    /// 内部推送原语的共享引用。
    pub fn get_ref(&self) -> &C {
        &self.inner
    }

    /// 内部推送原语的可变引用。
    pub fn get_mut(&mut self) -> &mut C {
        &mut self.inner
    }

    /// 取回内部推送原语。
    pub fn into_inner(self) -> C {
        self.inner
    }
}
