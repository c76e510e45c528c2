#![warn(missing_docs)]

//! `readout-pages` 在调用方提供的内存块上划分定长数据页，并在生产者与消费者两个阶段之间流转。
//!
//! # 模块定位（Why）
//! - 硬件把原始数据直接写入一块预先映射好的内存；采集流水线需要把这块内存切成定长页，
//!   由“填页”的生产者线程借出、由“排空”的消费者线程归还，全程不能引入共享锁。
//! - 页内容遵循 `readout-codec-frame` 的帧格式：每页开头 32 字节是帧头，其余为负载。
//!
//! # 设计概要（How）
//! - `memory`：包装外部内存块及其释放回调，保证回调在池彻底销毁时恰好执行一次；
//! - `registry`：以页序号为下标的页元数据（状态、代数、时间戳、使用次数），是合法性判断的唯一依据；
//! - `free_queue`：单生产者/单消费者的定长环形队列，存放空闲页序号；
//! - `pool`：对外的 [`PagePool`]，提供 `allocate`/`release`/`new_container` 等操作；
//! - `container`：[`PageContainer`] 以引用计数共享一页，最后一个持有者释放时自动归还；
//! - `stats` / `clock`：四类页生命周期区间统计与可注入时钟；
//! - `config`：可从 TOML 读取的池参数；
//! - `consumer`：逐项推送、分别统计成功与失败的批量消费者。
//!
//! # 并发契约（What）
//! - 一个线程只做分配（`allocate`/`new_container`），另一个线程只做归还（`release` 或丢弃容器），
//!   二者可以并行且无需外部加锁；
//! - 两个线程并发调用同一操作需要调用方自行加锁。即便违反该前置条件，逐页原子状态机也保证
//!   同一页不会被同时借出两次，后果仅限于统计失真或空闲页丢失，不会破坏内存安全。

mod clock;
mod config;
mod consumer;
mod container;
mod error;
mod free_queue;
mod memory;
mod pool;
mod registry;
mod stats;

pub use crate::{
    clock::{Clock, MockClock, SystemClock},
    config::{PoolConfig, PoolLayout},
    consumer::{BatchConsumer, BatchOutcome, BatchTotals, Consumer},
    container::PageContainer,
    error::PoolError,
    free_queue::FreePageQueue,
    memory::{MemoryBlock, ReleaseCallback},
    pool::{HEADER_RESERVED_SPACE, PageHandle, PagePool, PagePoolBuilder},
    registry::{PageDescriptor, PageState},
    stats::{IntervalStats, PoolTiming},
};
