//! 数据块帧头的线格式定义。
//!
//! # 布局（What）
//! 帧头固定 32 字节，所有多字节字段均为小端序：
//!
//! | 偏移 | 长度 | 字段 |
//! |------|------|------|
//! | 0 | 1 | `block_type`（`0xBB` 表示基础帧头） |
//! | 1 | 3 | 保留，写入 0 |
//! | 4 | 4 | `header_size`（必须等于 32） |
//! | 8 | 4 | `payload_size` |
//! | 12 | 4 | 保留，写入 0 |
//! | 16 | 8 | `sequence_id` |
//! | 24 | 4 | `link_id` |
//! | 28 | 4 | `equipment_id`（有符号） |
//!
//! 子记录以 `u16` 小端长度字段开头，单位为 32 字节字（word）。

use bytes::{Buf, BufMut};

use crate::error::SubRecordSpaceError;

/// 帧头固定长度（字节）。
pub const FRAME_HEADER_SIZE: usize = 32;

/// 唯一被识别的帧头类型标记。
pub const BLOCK_TYPE_BASE: u8 = 0xBB;

/// 子记录长度字段的计量单位（字节）。
pub const SUB_RECORD_WORD_SIZE: usize = 32;

/// 子记录长度字段本身占用的字节数。
pub const SUB_RECORD_LENGTH_FIELD_SIZE: usize = 2;

/// 顶层帧头。
///
/// # 契约说明（What）
/// - 结构体只承载字段值，不保证合法性；合法性由 [`FrameHeader::is_base`] 与解码器的校验决定；
/// - `payload_size` 个字节紧跟在帧头之后。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameHeader {
    /// 帧头类型标记，合法值仅有 [`BLOCK_TYPE_BASE`]。
    pub block_type: u8,
    /// 帧头长度，合法值仅有 [`FRAME_HEADER_SIZE`]。
    pub header_size: u32,
    /// 紧随帧头的负载长度（字节）。
    pub payload_size: u32,
    /// 单调递增的数据块序号。
    pub sequence_id: u64,
    /// 数据来源链路编号。
    pub link_id: u32,
    /// 数据来源设备编号，`-1` 表示未定义。
    pub equipment_id: i32,
}

impl FrameHeader {
    /// 构造一个类型与长度字段均合法的基础帧头，其余标识字段置零（`equipment_id` 为 -1）。
    #[must_use]
    pub const fn base(payload_size: u32) -> Self {
        Self {
            block_type: BLOCK_TYPE_BASE,
            header_size: FRAME_HEADER_SIZE as u32,
            payload_size,
            sequence_id: 0,
            link_id: 0,
            equipment_id: -1,
        }
    }

    /// 以链式方式设置序号。
    #[must_use]
    pub const fn with_sequence_id(mut self, sequence_id: u64) -> Self {
        self.sequence_id = sequence_id;
        self
    }

    /// 以链式方式设置链路与设备编号。
    #[must_use]
    pub const fn with_source(mut self, link_id: u32, equipment_id: i32) -> Self {
        self.link_id = link_id;
        self.equipment_id = equipment_id;
        self
    }

    /// 类型与长度字段是否均为唯一合法值。
    pub fn is_base(&self) -> bool {
        self.block_type == BLOCK_TYPE_BASE && self.header_size as usize == FRAME_HEADER_SIZE
    }

    /// 从切片头部读取帧头；不足 32 字节时返回 `None`。
    ///
    /// 读取不做任何合法性判断，调用方据此决定是报告错误还是继续。
    pub fn parse(src: &[u8]) -> Option<Self> {
        if src.len() < FRAME_HEADER_SIZE {
            return None;
        }
        let mut buf = &src[..FRAME_HEADER_SIZE];
        let block_type = buf.get_u8();
        buf.advance(3);
        let header_size = buf.get_u32_le();
        let payload_size = buf.get_u32_le();
        buf.advance(4);
        let sequence_id = buf.get_u64_le();
        let link_id = buf.get_u32_le();
        let equipment_id = buf.get_i32_le();
        Some(Self {
            block_type,
            header_size,
            payload_size,
            sequence_id,
            link_id,
            equipment_id,
        })
    }

    /// 将帧头编码为 32 字节，保留字段写零。
    pub fn to_bytes(&self) -> [u8; FRAME_HEADER_SIZE] {
        let mut out = [0u8; FRAME_HEADER_SIZE];
        let mut dst = &mut out[..];
        dst.put_u8(self.block_type);
        dst.put_bytes(0, 3);
        dst.put_u32_le(self.header_size);
        dst.put_u32_le(self.payload_size);
        dst.put_bytes(0, 4);
        dst.put_u64_le(self.sequence_id);
        dst.put_u32_le(self.link_id);
        dst.put_i32_le(self.equipment_id);
        out
    }
}

/// 在 `dst` 起始处写入子记录长度字段，返回该子记录的总字节数。
///
/// # 契约说明（What）
/// - `length_in_words` 以 32 字节为单位，必须大于 0；
/// - `dst` 至少需要容纳整条子记录（`length_in_words * 32` 字节），否则返回
///   [`SubRecordSpaceError`]；
/// - 只写入长度字段，子记录其余内容由生产者自行填充。
pub fn write_sub_record_length(
    dst: &mut [u8],
    length_in_words: u16,
) -> Result<usize, SubRecordSpaceError> {
    let required = usize::from(length_in_words) * SUB_RECORD_WORD_SIZE;
    if length_in_words == 0 || dst.len() < required {
        return Err(SubRecordSpaceError {
            required,
            available: dst.len(),
        });
    }
    let mut field = &mut dst[..SUB_RECORD_LENGTH_FIELD_SIZE];
    field.put_u16_le(length_in_words);
    Ok(required)
}
