//! 页池错误类型定义。
//!
//! 构造阶段与运行阶段的错误共用一个枚举，调用方用 [`PoolError::is_construction`] 区分二者。

use thiserror::Error;

/// 页池构造与页流转过程中的错误。
///
/// # 契约说明（What）
/// - 构造阶段的错误（`InvalidConfig`/`PageTooSmall`/`BlockTooSmall`/`ConfigParse`）意味着池不可用；
/// - 运行阶段的错误（其余变体）只影响当前调用，池状态保持一致，调用方可以记录后继续运行；
/// - 所有“非法归还”都以错误返回，绝不会静默修改空闲队列。
#[derive(Debug, Error)]
pub enum PoolError {
    /// 参数本身不合法（为 0、溢出或相互矛盾）。
    #[error("页池参数 `{field}` 不合法: {reason}")]
    InvalidConfig {
        /// 出错的参数名。
        field: &'static str,
        /// 不合法的原因。
        reason: String,
    },

    /// 页尺寸小于帧头预留空间，页内放不下帧头。
    #[error("页尺寸 {page_size} 小于帧头预留空间 {reserved}")]
    PageTooSmall {
        /// 请求的页尺寸。
        page_size: usize,
        /// 帧头预留字节数。
        reserved: usize,
    },

    /// 内存块扣除首页偏移后连一页都放不下。
    #[error(
        "内存块容纳不下任何页: base_size = {base_size}, first_page_offset = {first_page_offset}, page_size = {page_size}"
    )]
    BlockTooSmall {
        /// 内存块（或配置声明的）字节数。
        base_size: usize,
        /// 首页偏移。
        first_page_offset: usize,
        /// 页尺寸。
        page_size: usize,
    },

    /// TOML 配置解析失败。
    #[error("页池配置解析失败: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// 没有空闲页可供借出。
    #[error("页池已耗尽")]
    Exhausted,

    /// 地址不是本池任何一页的起始地址。
    #[error("地址 0x{address:X} 不是本池的页起始地址")]
    UnknownPage {
        /// 被拒绝的地址。
        address: usize,
    },

    /// 页当前处于空闲状态，不能重复归还。
    #[error("页 #{id} 未被借出，拒绝重复归还")]
    NotCheckedOut {
        /// 页序号。
        id: usize,
    },

    /// 页已交给容器，只能通过丢弃容器归还。
    #[error("页 #{id} 由容器持有，只能通过丢弃容器归还")]
    OwnedByContainer {
        /// 页序号。
        id: usize,
    },

    /// 句柄属于更早的一次借出，页已被归还并重新借出。
    #[error("页 #{id} 的句柄已过期: 句柄代数 {handle}, 当前代数 {current}")]
    StaleHandle {
        /// 页序号。
        id: usize,
        /// 句柄记录的代数。
        handle: u32,
        /// 页当前的代数。
        current: u32,
    },

    /// 空闲队列已满；仅在违反单生产者/单消费者前置条件时出现。
    #[error("空闲队列已满，页 #{id} 无法入队")]
    QueueOverflow {
        /// 未能入队的页序号。
        id: usize,
    },

    /// 容器仍被共享，拒绝可变访问。
    #[error("容器仍有其他持有者，无法修改页内容")]
    ContainerShared,

    /// 声明的负载长度超出页的可用负载。
    #[error("负载长度 {requested} 超过单页上限 {max}")]
    PayloadTooLarge {
        /// 声明的负载长度。
        requested: usize,
        /// 单页负载上限。
        max: usize,
    },
}

impl PoolError {
    /// 是否为构造阶段错误。
    pub fn is_construction(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig { .. }
                | Self::PageTooSmall { .. }
                | Self::BlockTooSmall { .. }
                | Self::ConfigParse(_)
        )
    }
}
