//! 页池主体：借出、归还、装箱与查询。
//!
//! # 设计背景（Why）
//! - 页池句柄 [`PagePool`] 是对共享状态的 `Arc` 包装，可自由克隆给生产者与消费者线程；
//!   容器同样持有这份 `Arc`，因此最后一个容器释放之前内存块不会被回收。
//!
//! # 实现要点（How）
//! - 分配侧：从空闲队列出队，再以 CAS 把页状态从 `Free` 切到 `CheckedOut`；CAS 失败说明
//!   队列里出现了非空闲页（只可能源于违反单消费者前置条件），记录告警后跳过；
//! - 归还侧：先校验地址与状态，再切回 `Free` 并入队；任何校验失败都直接返回错误，
//!   空闲队列保持原样；
//! - 时间戳在状态切换之前写入，借助状态 CAS 与队列游标的 `Release/Acquire` 对另一侧可见。

use std::{
    fmt,
    ptr::NonNull,
    sync::Arc,
    time::{Duration, Instant},
};

use readout_codec_frame::{FRAME_HEADER_SIZE, FrameHeader};

use crate::{
    clock::{Clock, SystemClock},
    config::{PoolConfig, PoolLayout},
    container::PageContainer,
    error::PoolError,
    free_queue::FreePageQueue,
    memory::MemoryBlock,
    registry::{NEVER, PageDescriptor, PageRegistry, PageState},
    stats::{PoolTiming, TimingRecorder},
};

/// 每页开头为帧头预留的字节数；页本身即可作为一个帧被解码。
pub const HEADER_RESERVED_SPACE: usize = FRAME_HEADER_SIZE;

/// 一次借出的凭据：页序号、借出代数与页地址。
///
/// 句柄只是标识，持有句柄不等于拥有页内容的访问权；访问页内容请使用 [`PageContainer`]。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PageHandle {
    id: usize,
    generation: u32,
    address: NonNull<u8>,
}

// SAFETY: 句柄只携带地址数值，自身从不解引用；页访问纪律由页池状态机约束。
unsafe impl Send for PageHandle {}
// SAFETY: 同上。
unsafe impl Sync for PageHandle {}

impl PageHandle {
    /// 页序号。
    pub fn id(&self) -> usize {
        self.id
    }

    /// 借出代数。
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// 页起始地址。
    pub fn address(&self) -> NonNull<u8> {
        self.address
    }
}

/// 页池构造器。
#[must_use]
pub struct PagePoolBuilder {
    block: MemoryBlock,
    config: PoolConfig,
    clock: Option<Arc<dyn Clock>>,
}

impl PagePoolBuilder {
    /// 声明内存块长度，覆盖内存块自带的长度。
    pub fn base_size(mut self, base_size: usize) -> Self {
        self.config.base_size = base_size;
        self
    }

    /// 首页相对块基址的偏移。
    pub fn first_page_offset(mut self, offset: usize) -> Self {
        self.config.first_page_offset = offset;
        self
    }

    /// 注入时钟，默认使用 [`SystemClock`]。
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// 校验参数并创建页池；失败时内存块随构造器一起丢弃，释放回调照常执行。
    pub fn build(self) -> Result<PagePool, PoolError> {
        let layout = self.config.layout(self.block.size())?;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let anchor = clock.now();
        let first_page = self
            .block
            .base()
            .as_ptr()
            .addr()
            .wrapping_add(layout.first_page_offset);

        if layout.page_count < self.config.page_count {
            tracing::info!(
                requested = self.config.page_count,
                fitted = layout.page_count,
                "内存块不足，页数已按块长度截断"
            );
        }
        tracing::info!(
            page_size = layout.page_size,
            page_count = layout.page_count,
            base_size = layout.base_size,
            first_page_offset = layout.first_page_offset,
            "页池已创建"
        );

        Ok(PagePool {
            inner: Arc::new(PoolShared {
                registry: PageRegistry::new(first_page, layout.page_size, layout.page_count),
                free: FreePageQueue::filled(layout.page_count),
                timing: TimingRecorder::default(),
                block: self.block,
                layout,
                clock,
                anchor,
            }),
        })
    }
}

/// 定长页池句柄，克隆后共享同一组页。
#[derive(Clone)]
pub struct PagePool {
    inner: Arc<PoolShared>,
}

pub(crate) struct PoolShared {
    block: MemoryBlock,
    layout: PoolLayout,
    registry: PageRegistry,
    free: FreePageQueue,
    clock: Arc<dyn Clock>,
    anchor: Instant,
    timing: TimingRecorder,
}

impl PagePool {
    /// 以内存块、页尺寸与页数开始构造页池。
    pub fn builder(block: MemoryBlock, page_size: usize, page_count: usize) -> PagePoolBuilder {
        PagePoolBuilder {
            block,
            config: PoolConfig::new(page_size, page_count),
            clock: None,
        }
    }

    /// 以完整参数直接构造页池。
    pub fn from_config(config: &PoolConfig, block: MemoryBlock) -> Result<Self, PoolError> {
        PagePoolBuilder {
            block,
            config: config.clone(),
            clock: None,
        }
        .build()
    }

    /// 按参数推算的长度分配零填充堆内存，并在其上构造页池。
    pub fn with_heap_block(config: &PoolConfig) -> Result<Self, PoolError> {
        let layout = config.layout(None)?;
        Self::from_config(config, MemoryBlock::zeroed(layout.base_size))
    }

    /// 借出一页；没有空闲页时返回 `None`。只能由分配侧调用。
    pub fn allocate(&self) -> Option<PageHandle> {
        self.inner.allocate()
    }

    /// 以句柄归还一页。只能由归还侧调用。
    pub fn release(&self, handle: PageHandle) -> Result<(), PoolError> {
        let slot = self
            .inner
            .registry
            .slot(handle.id)
            .filter(|_| self.inner.page_address(handle.id) == Some(handle.address))
            .ok_or(PoolError::UnknownPage {
                address: handle.address.as_ptr().addr(),
            })?;
        let current = slot.generation();
        if current != handle.generation {
            tracing::warn!(id = handle.id, handle = handle.generation, current, "拒绝过期句柄");
            return Err(PoolError::StaleHandle {
                id: handle.id,
                handle: handle.generation,
                current,
            });
        }
        self.inner.release_page(handle.id, PageState::CheckedOut)
    }

    /// 以页起始地址归还一页。只能由归还侧调用。
    pub fn release_address(&self, address: *const u8) -> Result<(), PoolError> {
        let id = self
            .inner
            .registry
            .id_of(address.addr())
            .ok_or(PoolError::UnknownPage {
                address: address.addr(),
            })?;
        self.inner.release_page(id, PageState::CheckedOut)
    }

    /// 地址是否恰好是本池某一页的起始地址。O(1)。
    pub fn is_valid(&self, address: *const u8) -> bool {
        self.inner.registry.id_of(address.addr()).is_some()
    }

    /// 句柄是否属于本池且代数与当前借出一致。
    pub fn is_valid_handle(&self, handle: &PageHandle) -> bool {
        self.inner.page_address(handle.id) == Some(handle.address)
            && self
                .inner
                .registry
                .slot(handle.id)
                .is_some_and(|slot| slot.generation() == handle.generation && slot.state() != PageState::Free)
    }

    /// 把一页装入容器；`page` 为 `None` 时先借出一页。
    ///
    /// 容器创建时在页开头写入一个负载长度为单页上限的基础帧头，页的其余字节保持不变。
    pub fn new_container(&self, page: Option<PageHandle>) -> Result<PageContainer, PoolError> {
        let handle = match page {
            Some(handle) => handle,
            None => self.inner.allocate().ok_or(PoolError::Exhausted)?,
        };
        self.inner.containerize(handle)?;
        let header = FrameHeader::base(self.max_payload_size() as u32);
        // SAFETY: 页刚切换到 `Containerized`，本调用是它唯一的访问者；页尺寸不小于帧头长度。
        unsafe {
            std::ptr::copy_nonoverlapping(
                header.to_bytes().as_ptr(),
                handle.address.as_ptr(),
                FRAME_HEADER_SIZE,
            );
        }
        Ok(PageContainer::new(Arc::clone(&self.inner), handle, header))
    }

    /// 单页字节数。
    pub fn page_size(&self) -> usize {
        self.inner.layout.page_size
    }

    /// 实际页数。
    pub fn total_pages(&self) -> usize {
        self.inner.registry.len()
    }

    /// 当前空闲页数。两侧并发推进时只是近似值。
    pub fn pages_available(&self) -> usize {
        self.inner.free.len()
    }

    /// 当前借出（含已装箱）的页数。
    pub fn pages_outstanding(&self) -> usize {
        self.total_pages().saturating_sub(self.pages_available())
    }

    /// 内存块基址。
    pub fn base_address(&self) -> NonNull<u8> {
        self.inner.block.base()
    }

    /// 内存块字节数。
    pub fn base_size(&self) -> usize {
        self.inner.layout.base_size
    }

    /// 首页偏移。
    pub fn first_page_offset(&self) -> usize {
        self.inner.layout.first_page_offset
    }

    /// 单页可用负载字节数。
    pub fn max_payload_size(&self) -> usize {
        self.inner.layout.max_payload_size()
    }

    /// 页元数据快照。
    pub fn descriptor(&self, id: usize) -> Option<PageDescriptor> {
        let address = self.inner.page_address(id)?;
        self.inner.registry.descriptor(id, address)
    }

    /// 生命周期区间统计快照。
    pub fn timing(&self) -> PoolTiming {
        self.inner.timing.snapshot()
    }
}

impl fmt::Debug for PagePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PagePool")
            .field("page_size", &self.page_size())
            .field("total_pages", &self.total_pages())
            .field("pages_available", &self.pages_available())
            .field("base_address", &self.base_address())
            .finish()
    }
}

impl PoolShared {
    fn now(&self) -> u64 {
        let elapsed = self.clock.now().saturating_duration_since(self.anchor);
        u64::try_from(elapsed.as_nanos()).unwrap_or(NEVER - 1).min(NEVER - 1)
    }

    fn page_address(&self, id: usize) -> Option<NonNull<u8>> {
        if id >= self.registry.len() {
            return None;
        }
        let offset = self.layout.first_page_offset + self.registry.offset_of(id);
        // SAFETY: `id` 在页数范围内，布局保证 `offset` 落在内存块之内，偏移后的指针非空。
        Some(unsafe { self.block.base().add(offset) })
    }

    fn allocate(&self) -> Option<PageHandle> {
        loop {
            let Some(id) = self.free.pop() else {
                tracing::debug!(total = self.registry.len(), "页池已耗尽");
                return None;
            };
            let Some(slot) = self.registry.slot(id) else {
                tracing::warn!(id, "空闲队列中出现越界页序号，已丢弃");
                continue;
            };
            if let Err(actual) = slot.transition(PageState::Free, PageState::CheckedOut) {
                tracing::warn!(id, ?actual, "空闲队列中出现非空闲页，已跳过");
                continue;
            }
            let now = self.now();
            let (generation, released) = slot.mark_allocated(now);
            if let Some(released) = released {
                self.timing.on_allocate(nanos_between(released, now));
            }
            let address = self.page_address(id)?;
            return Some(PageHandle {
                id,
                generation,
                address,
            });
        }
    }

    fn containerize(&self, handle: PageHandle) -> Result<(), PoolError> {
        if self.page_address(handle.id) != Some(handle.address) {
            return Err(PoolError::UnknownPage {
                address: handle.address.as_ptr().addr(),
            });
        }
        let slot = self
            .registry
            .slot(handle.id)
            .ok_or(PoolError::UnknownPage {
                address: handle.address.as_ptr().addr(),
            })?;
        let current = slot.generation();
        if current != handle.generation {
            return Err(PoolError::StaleHandle {
                id: handle.id,
                handle: handle.generation,
                current,
            });
        }
        slot.transition(PageState::CheckedOut, PageState::Containerized)
            .map_err(|actual| match actual {
                PageState::Containerized => PoolError::OwnedByContainer { id: handle.id },
                _ => PoolError::NotCheckedOut { id: handle.id },
            })?;
        let now = self.now();
        if let Some(allocated) = slot.mark_containerized(now) {
            self.timing.on_containerize(nanos_between(allocated, now));
        }
        Ok(())
    }

    /// 把处于 `expected` 状态的页归还空闲队列。
    pub(crate) fn release_page(&self, id: usize, expected: PageState) -> Result<(), PoolError> {
        let slot = self.registry.slot(id).ok_or(PoolError::NotCheckedOut { id })?;
        let state = slot.state();
        if state != expected {
            tracing::warn!(id, ?state, ?expected, "拒绝非法归还");
            return Err(match state {
                PageState::Containerized => PoolError::OwnedByContainer { id },
                _ => PoolError::NotCheckedOut { id },
            });
        }

        let now = self.now();
        let (allocated, containerized) = slot.mark_released(now);
        if let Some(allocated) = allocated {
            self.timing.on_release(
                nanos_between(allocated, now),
                containerized.map(|at| nanos_between(at, now)),
            );
        }

        if let Err(actual) = slot.transition(expected, PageState::Free) {
            tracing::warn!(id, ?actual, "页状态在归还过程中被并发修改");
            return Err(PoolError::NotCheckedOut { id });
        }
        self.free.push(id).map_err(|id| {
            tracing::error!(id, "空闲队列已满，页无法入队");
            PoolError::QueueOverflow { id }
        })
    }

    pub(crate) fn payload_ptr(&self, handle: &PageHandle) -> NonNull<u8> {
        // SAFETY: 页尺寸不小于帧头预留空间，负载起点仍在页内。
        unsafe { handle.address.add(HEADER_RESERVED_SPACE) }
    }

    pub(crate) fn max_payload_size(&self) -> usize {
        self.layout.max_payload_size()
    }

    pub(crate) fn page_size(&self) -> usize {
        self.layout.page_size
    }

    pub(crate) fn use_count(&self, id: usize) -> u32 {
        self.registry.slot(id).map_or(0, |slot| slot.use_count())
    }
}

impl Drop for PoolShared {
    fn drop(&mut self) {
        let timing = self.timing.snapshot();
        tracing::info!(
            total_pages = self.registry.len(),
            outstanding = self.registry.len().saturating_sub(self.free.len()),
            allocate_to_containerize = %timing.allocate_to_containerize,
            containerize_to_release = %timing.containerize_to_release,
            release_to_allocate = %timing.release_to_allocate,
            allocate_to_release = %timing.allocate_to_release,
            "页池销毁，生命周期统计汇总"
        );
    }
}

fn nanos_between(earlier: u64, later: u64) -> Duration {
    Duration::from_nanos(later.saturating_sub(earlier))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(page_size: usize, page_count: usize) -> PagePool {
        PagePool::with_heap_block(&PoolConfig::new(page_size, page_count)).expect("页池")
    }

    #[test]
    fn allocation_walks_pages_in_address_order() {
        let pool = pool(64, 3);
        let ids: Vec<_> = std::iter::from_fn(|| pool.allocate()).map(|h| h.id()).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(pool.pages_outstanding(), 3);
    }

    #[test]
    fn generation_advances_on_each_checkout() {
        let pool = pool(64, 1);
        let first = pool.allocate().expect("第一次借出");
        pool.release(first).expect("归还");
        let second = pool.allocate().expect("第二次借出");
        assert_eq!(first.id(), second.id());
        assert_eq!(second.generation(), first.generation() + 1);
        assert!(!pool.is_valid_handle(&first));
        assert!(pool.is_valid_handle(&second));
    }

    #[test]
    fn containerized_page_rejects_raw_release() {
        let pool = pool(64, 1);
        let handle = pool.allocate().expect("借出");
        let container = pool.new_container(Some(handle)).expect("装箱");
        assert!(matches!(
            pool.release(handle),
            Err(PoolError::OwnedByContainer { id: 0 })
        ));
        assert!(matches!(
            pool.new_container(Some(handle)),
            Err(PoolError::OwnedByContainer { id: 0 })
        ));
        drop(container);
        assert_eq!(pool.pages_available(), 1);
    }
}
