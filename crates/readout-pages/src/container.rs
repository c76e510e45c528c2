//! 引用计数的页容器。
//!
//! # 设计背景（Why）
//! - 一页数据在流水线中可能被多个消费者同时引用；最后一个引用消失时页必须自动回到池中。
//! - 容器内部持有页池共享状态的 `Arc`，因此“池句柄先被丢弃”不会让容器悬空，
//!   内存块的释放回调会推迟到最后一个容器释放之后。
//!
//! # 契约说明（What）
//! - 克隆只增加引用计数，不复制页内容；
//! - 只读访问随时可用；可变访问仅在容器未被共享时可用（[`Arc::get_mut`]）；
//! - 最后一个克隆被丢弃时，页在归还侧归还，调用方需保证丢弃发生在唯一的归还线程上。

use std::{fmt, sync::Arc};

use readout_codec_frame::{FRAME_HEADER_SIZE, FrameHeader};

use crate::{
    error::PoolError,
    pool::{PageHandle, PoolShared},
    registry::PageState,
};

/// 装有一页数据的共享容器。
#[derive(Clone)]
pub struct PageContainer {
    inner: Arc<ContainerInner>,
}

struct ContainerInner {
    pool: Arc<PoolShared>,
    handle: PageHandle,
    header: FrameHeader,
}

impl PageContainer {
    pub(crate) fn new(pool: Arc<PoolShared>, handle: PageHandle, header: FrameHeader) -> Self {
        Self {
            inner: Arc::new(ContainerInner {
                pool,
                handle,
                header,
            }),
        }
    }

    /// 容器持有的页。
    pub fn handle(&self) -> PageHandle {
        self.inner.handle
    }

    /// 当前写在页开头的帧头。
    pub fn header(&self) -> &FrameHeader {
        &self.inner.header
    }

    /// 单页可用负载字节数。
    pub fn capacity(&self) -> usize {
        self.inner.pool.max_payload_size()
    }

    /// 本页累计被装箱的次数。
    pub fn use_count(&self) -> u32 {
        self.inner.pool.use_count(self.inner.handle.id())
    }

    /// 共享该页的容器数量。
    pub fn holders(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// 整页字节（帧头 + 全部负载区）。
    pub fn page(&self) -> &[u8] {
        // SAFETY: 页处于 `Containerized` 状态，池不会再把它借给别人；可变借用只能经由
        // `&mut self` 且要求独占，因此这里不存在并发写者。页长度即页尺寸。
        unsafe {
            std::slice::from_raw_parts(
                self.inner.handle.address().as_ptr(),
                self.inner.pool.page_size(),
            )
        }
    }

    /// 负载区（帧头之后的全部字节）。
    pub fn payload(&self) -> &[u8] {
        &self.page()[FRAME_HEADER_SIZE..]
    }

    /// 按当前帧头声明的负载长度截取的完整帧，可直接交给解码器。
    pub fn frame(&self) -> &[u8] {
        let declared = (self.inner.header.payload_size as usize).min(self.capacity());
        &self.page()[..FRAME_HEADER_SIZE + declared]
    }

    /// 可变负载区；容器被共享时返回 `None`。
    pub fn payload_mut(&mut self) -> Option<&mut [u8]> {
        let inner = Arc::get_mut(&mut self.inner)?;
        let payload = inner.pool.payload_ptr(&inner.handle);
        let len = inner.pool.max_payload_size();
        // SAFETY: `Arc::get_mut` 成功说明没有其他容器克隆，`&mut self` 排除了同一容器上的
        // 其他借用；负载区位于页内且长度为单页负载上限。
        Some(unsafe { std::slice::from_raw_parts_mut(payload.as_ptr(), len) })
    }

    /// 改写页开头的帧头，通常在填充负载后声明实际负载长度与序列号。
    ///
    /// 容器被共享时返回 [`PoolError::ContainerShared`]；声明的负载长度超过单页上限时返回
    /// [`PoolError::PayloadTooLarge`]。
    pub fn write_header(&mut self, header: FrameHeader) -> Result<(), PoolError> {
        let max = self.capacity();
        if header.payload_size as usize > max {
            return Err(PoolError::PayloadTooLarge {
                requested: header.payload_size as usize,
                max,
            });
        }
        let inner = Arc::get_mut(&mut self.inner).ok_or(PoolError::ContainerShared)?;
        // SAFETY: 同 `payload_mut`，容器独占页；页尺寸不小于帧头长度。
        unsafe {
            std::ptr::copy_nonoverlapping(
                header.to_bytes().as_ptr(),
                inner.handle.address().as_ptr(),
                FRAME_HEADER_SIZE,
            );
        }
        inner.header = header;
        Ok(())
    }
}

impl fmt::Debug for PageContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageContainer")
            .field("handle", &self.inner.handle)
            .field("header", &self.inner.header)
            .field("holders", &self.holders())
            .finish()
    }
}

impl Drop for ContainerInner {
    fn drop(&mut self) {
        if let Err(error) = self
            .pool
            .release_page(self.handle.id(), PageState::Containerized)
        {
            tracing::warn!(id = self.handle.id(), %error, "容器释放时归还页失败");
        }
    }
}
