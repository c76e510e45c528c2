#![warn(missing_docs)]

//! # readout-codec-frame
//!
//! ## 教案目的（Why）
//! - **定位**：采集链路中数据块（Data Block）的线格式编解码，负责识别顶层帧头并遍历帧负载内的长度前缀子记录。
//! - **架构角色**：位于页池（`readout-pages`）之上，消费者阶段与离线分析工具 `read-raw` 都通过本 crate 校验页内容。
//! - **设计策略**：仅解析帧结构与子记录长度字段，不解释子记录的业务语义；发现结构破坏时给出精确偏移与校验项名称。
//!
//! ## 交互契约（What）
//! - **输入**：任意 `&[u8]`，可以是一张页的完整内容（帧头 + 负载），也可以是整个文件。
//! - **输出**：[`FrameDecoder`] 逐步产出 [`DecodeEvent`]；[`decode`] / [`decode_with_dump`] 汇总为 [`DecodeReport`]。
//! - **失败语义**：顶层帧头损坏时立即终止整段缓冲的扫描；子记录损坏只终止当前帧，随后从下一帧边界继续。
//!
//! ## 实现策略（How）
//! - `header` 固定 32 字节小端帧头布局，借助 `bytes::Buf`/`BufMut` 读写字段；
//! - `decode` 以显式状态机（`ScanningFrame`/`ScanningSubRecord`/`Done`/`Error`）推进游标；
//! - `dump` 提供与校验正交的人类可读输出。
//!
//! ## 风险提示（Trade-offs）
//! - 顶层帧头错位后无法安全地重新同步，因此选择 fail-fast，而非尝试按固定步长跳跃。
//! - 长度为 0 或越过负载末尾的子记录一律视为错误，避免游标无法前进导致死循环。

mod decode;
pub mod dump;
mod error;
mod header;

pub use crate::{
    decode::{
        DecodeEvent, DecodeOptions, DecodeReport, DecodeState, Frame, FrameDecoder, SubRecord,
        SubRecords, ViolationVec, decode, decode_with_dump,
    },
    dump::{DataDump, DumpOptions},
    error::{FrameError, SubRecordSpaceError},
    header::{
        BLOCK_TYPE_BASE, FRAME_HEADER_SIZE, FrameHeader, SUB_RECORD_LENGTH_FIELD_SIZE,
        SUB_RECORD_WORD_SIZE, write_sub_record_length,
    },
};
