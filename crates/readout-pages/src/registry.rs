//! 以页序号为下标的页元数据表。
//!
//! # 设计背景（Why）
//! - 空闲队列只回答“下一页是谁”，回答不了“这一页现在归谁”；后者由逐页原子状态承担，
//!   是判断重复归还、过期句柄与多持有者的唯一依据。
//! - 时间戳以“相对页池锚点的纳秒数”存入 `AtomicU64`，`u64::MAX` 表示尚未发生。
//!
//! # 状态机（What）
//! ```text
//! Free --allocate--> CheckedOut --new_container--> Containerized
//!   ^                    |                              |
//!   +------release-------+---------容器丢弃-------------+
//! ```

use std::{
    ptr::NonNull,
    sync::atomic::{AtomicU8, AtomicU32, AtomicU64, Ordering},
    time::Duration,
};

/// 时间戳哨兵值：事件尚未发生。
pub(crate) const NEVER: u64 = u64::MAX;

/// 单页的归属状态。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PageState {
    /// 在空闲队列中等待借出。
    Free = 0,
    /// 已借出，尚未装箱。
    CheckedOut = 1,
    /// 已交给容器。
    Containerized = 2,
}

impl PageState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            1 => Self::CheckedOut,
            2 => Self::Containerized,
            _ => Self::Free,
        }
    }
}

/// 单页元数据的只读快照。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageDescriptor {
    /// 页序号，等于 `(address - 首页地址) / 页尺寸`。
    pub id: usize,
    /// 页起始地址。
    pub address: NonNull<u8>,
    /// 当前状态。
    pub state: PageState,
    /// 借出代数，每次借出加一。
    pub generation: u32,
    /// 最近一次借出时刻（相对页池创建）。
    pub time_allocated: Option<Duration>,
    /// 最近一次装箱时刻。
    pub time_containerized: Option<Duration>,
    /// 最近一次归还时刻。
    pub time_released: Option<Duration>,
    /// 被装箱的累计次数。
    pub use_count: u32,
}

#[derive(Debug)]
pub(crate) struct PageSlot {
    state: AtomicU8,
    generation: AtomicU32,
    time_allocated: AtomicU64,
    time_containerized: AtomicU64,
    time_released: AtomicU64,
    use_count: AtomicU32,
}

impl PageSlot {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(PageState::Free as u8),
            generation: AtomicU32::new(0),
            time_allocated: AtomicU64::new(NEVER),
            time_containerized: AtomicU64::new(NEVER),
            time_released: AtomicU64::new(NEVER),
            use_count: AtomicU32::new(0),
        }
    }

    /// 原子地把状态从 `from` 切换到 `to`；失败时返回实际状态。
    pub(crate) fn transition(&self, from: PageState, to: PageState) -> Result<(), PageState> {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(PageState::from_raw)
    }

    pub(crate) fn state(&self) -> PageState {
        PageState::from_raw(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn generation(&self) -> u32 {
        self.generation.load(Ordering::Acquire)
    }

    /// 借出时调用：推进代数并记录借出时刻，返回新代数与上次归还时刻。
    pub(crate) fn mark_allocated(&self, now: u64) -> (u32, Option<u64>) {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel).wrapping_add(1);
        self.time_allocated.store(now, Ordering::Release);
        self.time_containerized.store(NEVER, Ordering::Release);
        (generation, occurred(self.time_released.load(Ordering::Acquire)))
    }

    /// 装箱时调用：累加使用次数并记录装箱时刻，返回借出时刻。
    pub(crate) fn mark_containerized(&self, now: u64) -> Option<u64> {
        self.use_count.fetch_add(1, Ordering::AcqRel);
        self.time_containerized.store(now, Ordering::Release);
        occurred(self.time_allocated.load(Ordering::Acquire))
    }

    /// 归还时调用：记录归还时刻，返回借出与装箱时刻。
    pub(crate) fn mark_released(&self, now: u64) -> (Option<u64>, Option<u64>) {
        self.time_released.store(now, Ordering::Release);
        (
            occurred(self.time_allocated.load(Ordering::Acquire)),
            occurred(self.time_containerized.load(Ordering::Acquire)),
        )
    }

    pub(crate) fn use_count(&self) -> u32 {
        self.use_count.load(Ordering::Acquire)
    }
}

fn occurred(raw: u64) -> Option<u64> {
    (raw != NEVER).then_some(raw)
}

/// 页元数据表与页地址换算。
#[derive(Debug)]
pub(crate) struct PageRegistry {
    first_page: usize,
    page_size: usize,
    slots: Box<[PageSlot]>,
}

impl PageRegistry {
    /// `first_page` 为首页地址的数值，仅用于比较与换算，不会被解引用。
    pub(crate) fn new(first_page: usize, page_size: usize, page_count: usize) -> Self {
        Self {
            first_page,
            page_size,
            slots: (0..page_count).map(|_| PageSlot::new()).collect(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn slot(&self, id: usize) -> Option<&PageSlot> {
        self.slots.get(id)
    }

    /// 地址到页序号的 O(1) 换算，只接受页起始地址。
    pub(crate) fn id_of(&self, address: usize) -> Option<usize> {
        let delta = address.checked_sub(self.first_page)?;
        if delta % self.page_size != 0 {
            return None;
        }
        let id = delta / self.page_size;
        (id < self.slots.len()).then_some(id)
    }

    /// 页序号到首页的字节偏移。
    pub(crate) fn offset_of(&self, id: usize) -> usize {
        id * self.page_size
    }

    pub(crate) fn descriptor(&self, id: usize, address: NonNull<u8>) -> Option<PageDescriptor> {
        let slot = self.slot(id)?;
        let to_duration = |raw: u64| occurred(raw).map(Duration::from_nanos);
        Some(PageDescriptor {
            id,
            address,
            state: slot.state(),
            generation: slot.generation(),
            time_allocated: to_duration(slot.time_allocated.load(Ordering::Acquire)),
            time_containerized: to_duration(slot.time_containerized.load(Ordering::Acquire)),
            time_released: to_duration(slot.time_released.load(Ordering::Acquire)),
            use_count: slot.use_count(),
        })
    }
}
