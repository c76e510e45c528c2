//! 单生产者/单消费者的空闲页序号队列。
//!
//! # 设计背景（Why）
//! - 分配线程只出队、归还线程只入队，两端各自独占一个游标，无需任何锁；
//! - 容量等于页数：任何时刻空闲页不会多于总页数，正常使用下入队不会失败。
//!
//! # 实现要点（How）
//! - `head`/`tail` 是单调递增的计数器，取模定位槽位，`tail - head` 即为队列长度；
//! - 入队：写槽位后以 `Release` 发布 `tail`；出队：以 `Acquire` 读取 `tail` 后读槽位，
//!   再以 `Release` 发布 `head`，让入队端复用槽位前能看到读取已完成；
//! - 启用 `cfg(loom)` 时切换到 Loom 原子类型，以便模型检查所有交错。

#[cfg(loom)]
use loom::sync::atomic::{AtomicUsize, Ordering};
#[cfg(not(loom))]
use std::sync::atomic::{AtomicUsize, Ordering};

/// 定长环形队列，元素为页序号。
#[derive(Debug)]
pub struct FreePageQueue {
    slots: Box<[AtomicUsize]>,
    head: AtomicUsize,
    tail: AtomicUsize,
}

impl FreePageQueue {
    /// 创建容量为 `capacity` 的空队列。
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| AtomicUsize::new(0)).collect(),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    /// 创建容量为 `capacity` 且按序号 `0..capacity` 装满的队列。
    pub fn filled(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(AtomicUsize::new).collect(),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(capacity),
        }
    }

    /// 入队；队列已满时原样退回序号。只能由归还侧调用。
    pub fn push(&self, id: usize) -> Result<(), usize> {
        let capacity = self.slots.len();
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        if capacity == 0 || tail.wrapping_sub(head) >= capacity {
            return Err(id);
        }
        self.slots[tail % capacity].store(id, Ordering::Relaxed);
        self.tail.store(tail.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    /// 出队；队列为空时返回 `None`。只能由分配侧调用。
    pub fn pop(&self) -> Option<usize> {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        if head == tail {
            return None;
        }
        let id = self.slots[head % self.slots.len()].load(Ordering::Relaxed);
        self.head.store(head.wrapping_add(1), Ordering::Release);
        Some(id)
    }

    /// 当前排队的序号数。两端并发推进时只是近似值。
    pub fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Acquire);
        let head = self.head.load(Ordering::Acquire);
        tail.wrapping_sub(head).min(self.slots.len())
    }

    /// 队列是否为空。
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 队列容量。
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    #[test]
    fn filled_queue_yields_ids_in_order_then_empties() {
        let queue = FreePageQueue::filled(3);
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.pop(), Some(0));
        assert_eq!(queue.pop(), Some(1));
        assert_eq!(queue.pop(), Some(2));
        assert_eq!(queue.pop(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn push_rejects_beyond_capacity_and_wraps_around() {
        let queue = FreePageQueue::with_capacity(2);
        assert_eq!(queue.push(7), Ok(()));
        assert_eq!(queue.push(8), Ok(()));
        assert_eq!(queue.push(9), Err(9));
        assert_eq!(queue.pop(), Some(7));
        assert_eq!(queue.push(9), Ok(()));
        assert_eq!(queue.pop(), Some(8));
        assert_eq!(queue.pop(), Some(9));
        assert_eq!(queue.capacity(), 2);
    }

    #[test]
    fn zero_capacity_queue_never_accepts() {
        let queue = FreePageQueue::with_capacity(0);
        assert_eq!(queue.push(0), Err(0));
        assert_eq!(queue.pop(), None);
    }
}
