//! 人类可读的帧 / 子记录 / 负载输出。
//!
//! 输出与校验相互独立：解码器始终执行同一套扫描，本模块只决定是否把扫描到的结构打印出来。
//! 输出格式面向终端排障，字段名保持与线格式一致，便于与十六进制编辑器对照。

use std::io::{self, Write};

use crate::{
    decode::{Frame, SubRecord},
    error::FrameError,
    header::{FRAME_HEADER_SIZE, SUB_RECORD_LENGTH_FIELD_SIZE},
};

/// 负载十六进制输出的范围。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataDump {
    /// 不输出负载。
    #[default]
    Off,
    /// 输出整段负载。
    All,
    /// 只输出前 N 个字节（超过负载长度时按负载长度截断）。
    Leading(usize),
}

impl DataDump {
    /// 按命令行约定解析：0 关闭，负数输出全部，正数输出前 N 字节。
    pub fn from_option(value: i64) -> Self {
        match value {
            0 => Self::Off,
            v if v < 0 => Self::All,
            v => Self::Leading(usize::try_from(v).unwrap_or(usize::MAX)),
        }
    }

    /// 对给定长度的负载，实际需要输出的字节数。
    pub fn limit(&self, payload_len: usize) -> usize {
        match self {
            Self::Off => 0,
            Self::All => payload_len,
            Self::Leading(n) => payload_len.min(*n),
        }
    }

    /// 是否需要输出负载。
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Off)
    }
}

/// 三个相互独立的输出开关。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DumpOptions {
    /// 输出每个顶层帧头。
    pub frame_headers: bool,
    /// 输出每条子记录的位置与长度。
    pub sub_records: bool,
    /// 负载十六进制输出范围。
    pub data: DataDump,
}

impl DumpOptions {
    /// 是否有任意一项输出被启用。
    pub fn any(&self) -> bool {
        self.frame_headers || self.sub_records || self.data.is_enabled()
    }
}

/// 输出帧头各字段；`ordinal` 为帧序号（从 1 开始）。
pub fn write_frame_header<W: Write + ?Sized>(
    out: &mut W,
    ordinal: usize,
    frame: &Frame<'_>,
) -> io::Result<()> {
    let header = frame.header();
    writeln!(out, "Block header {ordinal} @ {}", frame.offset())?;
    writeln!(out, "\tblockType = 0x{:02X}", header.block_type)?;
    writeln!(out, "\theaderSize = {}", header.header_size)?;
    writeln!(out, "\tdataSize = {}", header.payload_size)?;
    writeln!(out, "\tid = {}", header.sequence_id)?;
    writeln!(out, "\tlinkId = {}", header.link_id)?;
    writeln!(out, "\tequipmentId = {}", header.equipment_id)?;
    writeln!(out, "\tdata @ {}", frame.payload_offset())
}

/// 以每行 16 字节的十六进制形式输出负载。
pub fn write_payload<W: Write + ?Sized>(
    out: &mut W,
    ordinal: usize,
    frame: &Frame<'_>,
    data: DataDump,
) -> io::Result<()> {
    let payload = frame.payload();
    let limit = data.limit(payload.len());
    write!(out, "Data page {ordinal} @ {}", frame.payload_offset())?;
    for (i, byte) in payload[..limit].iter().enumerate() {
        if i % 16 == 0 {
            write!(out, "\n\t")?;
        }
        write!(out, "{byte:02X} ")?;
    }
    writeln!(out, "\n\t...")
}

/// 输出子记录在帧内的位置与长度。
pub fn write_sub_record<W: Write + ?Sized>(out: &mut W, record: &SubRecord<'_>) -> io::Result<()> {
    writeln!(
        out,
        "Sub-record {} @ 0x{:08X} + {}: length = {} words ({} bytes)",
        record.index(),
        record.frame_offset(),
        record.offset_in_payload(),
        record.length_in_words(),
        record.bytes().len()
    )
}

/// 输出未通过校验的子记录：位置、失败的校验项以及长度字段的原始字节。
///
/// `buffer` 必须是产生 `error` 的同一段被解码缓冲；顶层结构错误不输出任何内容。
pub fn write_invalid_sub_record<W: Write + ?Sized>(
    out: &mut W,
    buffer: &[u8],
    error: &FrameError,
) -> io::Result<()> {
    let Some((frame_offset, record_offset)) = error.sub_record_position() else {
        return Ok(());
    };
    let start = (frame_offset + FRAME_HEADER_SIZE + record_offset).min(buffer.len());
    let end = (start + SUB_RECORD_LENGTH_FIELD_SIZE).min(buffer.len());
    write!(
        out,
        "Sub-record @ 0x{frame_offset:08X} + {record_offset}: INVALID ({}), length field =",
        error.check()
    )?;
    for byte in &buffer[start..end] {
        write!(out, " {byte:02X}")?;
    }
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_value_maps_to_dump_range() {
        assert_eq!(DataDump::from_option(0), DataDump::Off);
        assert_eq!(DataDump::from_option(-1), DataDump::All);
        assert_eq!(DataDump::from_option(16), DataDump::Leading(16));
        assert_eq!(DataDump::Leading(16).limit(8), 8);
        assert_eq!(DataDump::All.limit(8), 8);
        assert_eq!(DataDump::Off.limit(8), 0);
    }

    #[test]
    fn invalid_sub_record_shows_raw_length_field() {
        let mut buffer = vec![0u8; FRAME_HEADER_SIZE + 64];
        buffer[FRAME_HEADER_SIZE + 32] = 0x07;
        let error = FrameError::SubRecordOverrun {
            frame_offset: 0,
            record_offset: 32,
            declared_bytes: 224,
            available: 32,
        };
        let mut out = Vec::new();
        write_invalid_sub_record(&mut out, &buffer, &error).expect("写入内存");
        assert_eq!(
            String::from_utf8(out).expect("UTF-8"),
            "Sub-record @ 0x00000000 + 32: INVALID (sub_record_bounds), length field = 07 00\n"
        );

        let mut out = Vec::new();
        let structural = FrameError::BlockType { offset: 0, found: 0 };
        write_invalid_sub_record(&mut out, &buffer, &structural).expect("写入内存");
        assert!(out.is_empty());
    }
}
