//! 帧解码错误类型定义。
//!
//! # 教案定位（Why）
//! - 分析工具与消费者阶段需要知道“在哪个字节、哪一项校验”出了问题，才能回溯到采集链路中的具体设备；
//! - 错误分为两级：顶层帧头错误终止整段缓冲，子记录错误只终止当前帧。
//!
//! # 使用契约（What）
//! - 所有偏移均为相对于被解码缓冲起点的字节偏移；子记录额外携带其在帧负载内的偏移；
//! - [`FrameError::check`] 返回失败校验项的稳定名称，适合作为日志字段或指标标签；
//! - 生产者写子记录时的空间不足是另一类错误（[`SubRecordSpaceError`]），不混入解码违规。

use thiserror::Error;

use crate::header::{BLOCK_TYPE_BASE, FRAME_HEADER_SIZE};

/// 帧解码过程中可能出现的错误。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// 帧头类型标记不是唯一合法值。
    #[error(
        "帧头 @ 0x{offset:08X} 校验 block_type 失败：读到 0x{found:02X}，期望 0x{expected:02X}",
        expected = BLOCK_TYPE_BASE
    )]
    BlockType {
        /// 帧头起始偏移。
        offset: usize,
        /// 实际读到的类型标记。
        found: u8,
    },
    /// 帧头长度字段不等于固定帧头长度。
    #[error(
        "帧头 @ 0x{offset:08X} 校验 header_size 失败：读到 {found}，期望 {expected}",
        expected = FRAME_HEADER_SIZE
    )]
    HeaderSize {
        /// 帧头起始偏移。
        offset: usize,
        /// 实际读到的帧头长度。
        found: u32,
    },
    /// 帧头声明的负载超出缓冲剩余字节。
    #[error(
        "帧头 @ 0x{offset:08X} 校验 payload_size 失败：声明 {declared} 字节负载，仅剩 {available} 字节"
    )]
    TruncatedPayload {
        /// 帧头起始偏移。
        offset: usize,
        /// 声明的负载长度。
        declared: usize,
        /// 帧头之后实际剩余的字节数。
        available: usize,
    },
    /// 负载剩余字节不足以读取子记录长度字段。
    #[error(
        "帧 @ 0x{frame_offset:08X} + {record_offset} 校验 sub_record_header 失败：仅剩 {remaining} 字节"
    )]
    SubRecordTruncated {
        /// 所属帧的帧头偏移。
        frame_offset: usize,
        /// 子记录在帧负载内的偏移。
        record_offset: usize,
        /// 负载剩余字节数。
        remaining: usize,
    },
    /// 子记录长度字段为 0，游标无法前进。
    #[error(
        "帧 @ 0x{frame_offset:08X} + {record_offset} 校验 sub_record_length 失败：第 {index} 条子记录长度为 0"
    )]
    SubRecordZeroLength {
        /// 所属帧的帧头偏移。
        frame_offset: usize,
        /// 子记录在帧负载内的偏移。
        record_offset: usize,
        /// 子记录在帧内的序号（从 0 开始）。
        index: usize,
    },
    /// 子记录声明的长度越过了帧负载末尾。
    #[error(
        "帧 @ 0x{frame_offset:08X} + {record_offset} 校验 sub_record_bounds 失败：声明 {declared_bytes} 字节，负载仅剩 {available} 字节"
    )]
    SubRecordOverrun {
        /// 所属帧的帧头偏移。
        frame_offset: usize,
        /// 子记录在帧负载内的偏移。
        record_offset: usize,
        /// 长度字段换算出的字节数。
        declared_bytes: usize,
        /// 负载剩余字节数。
        available: usize,
    },
}

impl FrameError {
    /// 是否为顶层结构错误（会终止整段缓冲的解码）。
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::BlockType { .. } | Self::HeaderSize { .. } | Self::TruncatedPayload { .. }
        )
    }

    /// 失败校验项的稳定名称。
    pub fn check(&self) -> &'static str {
        match self {
            Self::BlockType { .. } => "block_type",
            Self::HeaderSize { .. } => "header_size",
            Self::TruncatedPayload { .. } => "payload_size",
            Self::SubRecordTruncated { .. } => "sub_record_header",
            Self::SubRecordZeroLength { .. } => "sub_record_length",
            Self::SubRecordOverrun { .. } => "sub_record_bounds",
        }
    }

    /// 出错位置相对于缓冲起点的绝对字节偏移。
    pub fn offset(&self) -> usize {
        match self {
            Self::BlockType { offset, .. }
            | Self::HeaderSize { offset, .. }
            | Self::TruncatedPayload { offset, .. } => *offset,
            Self::SubRecordTruncated {
                frame_offset,
                record_offset,
                ..
            }
            | Self::SubRecordZeroLength {
                frame_offset,
                record_offset,
                ..
            }
            | Self::SubRecordOverrun {
                frame_offset,
                record_offset,
                ..
            } => frame_offset + FRAME_HEADER_SIZE + record_offset,
        }
    }

    /// 子记录违规所在的帧头偏移与帧内偏移；顶层结构错误返回 `None`。
    pub fn sub_record_position(&self) -> Option<(usize, usize)> {
        match self {
            Self::SubRecordTruncated {
                frame_offset,
                record_offset,
                ..
            }
            | Self::SubRecordZeroLength {
                frame_offset,
                record_offset,
                ..
            }
            | Self::SubRecordOverrun {
                frame_offset,
                record_offset,
                ..
            } => Some((*frame_offset, *record_offset)),
            Self::BlockType { .. } | Self::HeaderSize { .. } | Self::TruncatedPayload { .. } => None,
        }
    }
}

/// 生产者写入子记录长度字段失败：长度为 0，或目标切片放不下整条子记录。
///
/// 这是写入侧的前置条件错误，与解码时发现的 [`FrameError`] 无关，因此不携带缓冲偏移。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("子记录需要 {required} 字节，目标空间仅 {available} 字节")]
pub struct SubRecordSpaceError {
    /// 子记录总字节数。
    pub required: usize,
    /// 目标切片长度。
    pub available: usize,
}
