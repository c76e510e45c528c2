//! 外部内存块的所有权包装。
//!
//! # 设计背景（Why）
//! - 页池本身不分配内存：内存块可能来自 DMA 映射、大页或测试里的普通堆分配；
//!   唯一的共同点是“池销毁时需要通知提供方回收”。
//! - 把基址、长度与释放回调收拢进 [`MemoryBlock`]，回调只在 `Drop` 中以 `Option::take` 取出执行，
//!   从类型上保证恰好一次。
//!
//! # 契约说明（What）
//! - 只有 `unsafe` 的 [`MemoryBlock::from_raw`] 可以不声明长度（`size() == None`），此时页池按
//!   “首页偏移 + 页数 × 页尺寸”推算；安全构造函数总是携带真实长度，零长度块会被页池拒绝；
//! - 页池以共享引用持有内存块，块内字节的读写纪律由页状态机负责，块本身不做任何访问。

use std::{fmt, ptr::NonNull};

/// 内存块释放回调，参数为块基址与块长度（未声明长度时为 0）。
pub type ReleaseCallback = Box<dyn FnOnce(NonNull<u8>, usize) + Send + 'static>;

/// 页池底层的连续内存块。
pub struct MemoryBlock {
    base: NonNull<u8>,
    size: Option<usize>,
    release: Option<ReleaseCallback>,
}

// SAFETY: `MemoryBlock` 只保存基址与长度，自身从不解引用；构造契约要求该内存在块存活期间
// 独占地交给页池使用，跨线程的具体访问由页状态机保证同一页同一时刻只有一个写者。
unsafe impl Send for MemoryBlock {}
// SAFETY: 同上，共享引用只暴露基址与长度这两个不可变值。
unsafe impl Sync for MemoryBlock {}

impl MemoryBlock {
    /// 以调用方提供的原始内存构造内存块。`size == 0` 表示未声明长度。
    ///
    /// # Safety
    /// - 若 `size > 0`，`[base, base + size)` 必须是已初始化、可读写的内存；
    ///   若 `size == 0`，页池推算出的整段范围必须满足同样条件；
    /// - 在本块被丢弃（且 `release` 被调用）之前，该内存不得被其他代码访问或释放。
    pub unsafe fn from_raw(base: NonNull<u8>, size: usize, release: Option<ReleaseCallback>) -> Self {
        let size = (size != 0).then_some(size);
        Self {
            base,
            size,
            release,
        }
    }

    /// 以一段堆内存构造内存块，池销毁时随之释放。
    pub fn from_boxed(bytes: Box<[u8]>) -> Self {
        let size = bytes.len();
        let base = NonNull::from(Box::leak(bytes)).cast::<u8>();
        Self {
            base,
            size: Some(size),
            release: Some(Box::new(move |base: NonNull<u8>, size: usize| {
                let slice = std::ptr::slice_from_raw_parts_mut(base.as_ptr(), size);
                // SAFETY: `slice` 正是上面 `Box::leak` 得到的同一段分配，且回调只会执行一次。
                drop(unsafe { Box::from_raw(slice) });
            })),
        }
    }

    /// 分配 `size` 字节的零填充堆内存作为内存块。
    pub fn zeroed(size: usize) -> Self {
        Self::from_boxed(vec![0u8; size].into_boxed_slice())
    }

    /// 块基址。
    pub fn base(&self) -> NonNull<u8> {
        self.base
    }

    /// 块长度；`None` 表示调用方未声明。
    pub fn size(&self) -> Option<usize> {
        self.size
    }

    /// 是否注册了释放回调。
    pub fn has_release_callback(&self) -> bool {
        self.release.is_some()
    }
}

impl fmt::Debug for MemoryBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryBlock")
            .field("base", &self.base)
            .field("size", &self.size)
            .field("release", &self.release.is_some())
            .finish()
    }
}

impl Drop for MemoryBlock {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            tracing::debug!(base = ?self.base, size = ?self.size, "调用内存块释放回调");
            release(self.base, self.size.unwrap_or(0));
        }
    }
}
