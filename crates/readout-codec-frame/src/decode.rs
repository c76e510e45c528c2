//! 帧流解码状态机。
//!
//! # 教案定位（Why）
//! - 数据页内是“帧头 + 负载”的重复结构，负载内又是若干长度前缀子记录；消费者在不了解子记录语义的前提下，
//!   仍需确认结构完整并定位第一处损坏。
//!
//! # 状态转换（How）
//! - `ScanningFrame`：在 `offset` 处读取 32 字节帧头；剩余不足一个帧头时进入 `Done`；类型或长度字段非法、
//!   负载越界时进入 `Error` 并不再读取后续帧；否则产出 [`DecodeEvent::Frame`]，按需进入 `ScanningSubRecord`。
//! - `ScanningSubRecord`：逐条读取子记录长度字段并前进 `length * 32` 字节；出现长度为 0、越界或截断时
//!   产出 [`DecodeEvent::Violation`] 并结束本帧；游标到达负载末尾后回到 `ScanningFrame`。
//!
//! # 契约说明（What）
//! - 解码器只借用输入缓冲，产出的 [`Frame`]/[`SubRecord`] 都是零拷贝视图；
//! - 每次 [`FrameDecoder::step`] 至多产出一个事件，终态之后始终返回 `None`。

use std::io::{self, Write};

use bytes::Buf;
use smallvec::SmallVec;

use crate::{
    dump::{self, DumpOptions},
    error::FrameError,
    header::{
        BLOCK_TYPE_BASE, FRAME_HEADER_SIZE, FrameHeader, SUB_RECORD_LENGTH_FIELD_SIZE,
        SUB_RECORD_WORD_SIZE,
    },
};

/// 违规列表的内联容量；多数缓冲至多出现一两处损坏。
pub type ViolationVec = SmallVec<[FrameError; 4]>;

/// 解码状态机所处的状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeState {
    /// 期待下一个顶层帧头。
    ScanningFrame,
    /// 正在遍历某个帧负载内的子记录。
    ScanningSubRecord,
    /// 缓冲已消费完毕（或剩余字节不足一个帧头）。
    Done,
    /// 顶层结构错误，后续帧不再读取。
    Error,
}

impl DecodeState {
    /// 是否已到达终态。
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

/// 一个通过结构校验的顶层帧。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    offset: usize,
    header: FrameHeader,
    payload: &'a [u8],
}

impl<'a> Frame<'a> {
    /// 帧头在被解码缓冲中的偏移。
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// 负载在被解码缓冲中的偏移。
    pub fn payload_offset(&self) -> usize {
        self.offset + FRAME_HEADER_SIZE
    }

    /// 帧头字段。
    pub fn header(&self) -> &FrameHeader {
        &self.header
    }

    /// 负载视图，长度等于 `header().payload_size`。
    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }

    /// 遍历本帧负载中的子记录。
    pub fn sub_records(&self) -> SubRecords<'a> {
        SubRecords::new(self.offset, self.payload)
    }
}

/// 帧负载中的一条子记录。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubRecord<'a> {
    frame_offset: usize,
    offset_in_payload: usize,
    index: usize,
    length_in_words: u16,
    bytes: &'a [u8],
}

impl<'a> SubRecord<'a> {
    /// 所属帧的帧头偏移。
    pub fn frame_offset(&self) -> usize {
        self.frame_offset
    }

    /// 子记录在帧负载内的偏移。
    pub fn offset_in_payload(&self) -> usize {
        self.offset_in_payload
    }

    /// 子记录在帧内的序号（从 0 开始）。
    pub fn index(&self) -> usize {
        self.index
    }

    /// 长度字段原值（单位 32 字节）。
    pub fn length_in_words(&self) -> u16 {
        self.length_in_words
    }

    /// 整条子记录（含长度字段）。
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }
}

/// 子记录迭代器，遇到第一处错误后产出该错误并结束。
#[derive(Debug, Clone)]
pub struct SubRecords<'a> {
    frame_offset: usize,
    payload: &'a [u8],
    cursor: usize,
    index: usize,
    finished: bool,
}

impl<'a> SubRecords<'a> {
    fn new(frame_offset: usize, payload: &'a [u8]) -> Self {
        Self {
            frame_offset,
            payload,
            cursor: 0,
            index: 0,
            finished: false,
        }
    }

    fn fail(&mut self, error: FrameError) -> Option<Result<SubRecord<'a>, FrameError>> {
        self.finished = true;
        Some(Err(error))
    }
}

impl<'a> Iterator for SubRecords<'a> {
    type Item = Result<SubRecord<'a>, FrameError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished || self.cursor >= self.payload.len() {
            self.finished = true;
            return None;
        }

        let remaining = self.payload.len() - self.cursor;
        if remaining < SUB_RECORD_LENGTH_FIELD_SIZE {
            return self.fail(FrameError::SubRecordTruncated {
                frame_offset: self.frame_offset,
                record_offset: self.cursor,
                remaining,
            });
        }

        let mut field = &self.payload[self.cursor..self.cursor + SUB_RECORD_LENGTH_FIELD_SIZE];
        let length_in_words = field.get_u16_le();
        if length_in_words == 0 {
            return self.fail(FrameError::SubRecordZeroLength {
                frame_offset: self.frame_offset,
                record_offset: self.cursor,
                index: self.index,
            });
        }

        let size = usize::from(length_in_words) * SUB_RECORD_WORD_SIZE;
        if size > remaining {
            return self.fail(FrameError::SubRecordOverrun {
                frame_offset: self.frame_offset,
                record_offset: self.cursor,
                declared_bytes: size,
                available: remaining,
            });
        }

        let record = SubRecord {
            frame_offset: self.frame_offset,
            offset_in_payload: self.cursor,
            index: self.index,
            length_in_words,
            bytes: &self.payload[self.cursor..self.cursor + size],
        };
        self.cursor += size;
        self.index += 1;
        Some(Ok(record))
    }
}

/// 解码器每一步产出的事件。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeEvent<'a> {
    /// 一个通过结构校验的顶层帧。
    Frame(Frame<'a>),
    /// 当前帧负载内的一条子记录。
    SubRecord(SubRecord<'a>),
    /// 结构违规；顶层违规之后解码器进入 `Error`，子记录违规之后回到下一帧。
    Violation(FrameError),
}

/// 帧流解码器。
///
/// # 使用方式（How）
/// - 逐步驱动：反复调用 [`FrameDecoder::step`]，或直接当作 `Iterator` 使用；
/// - 汇总驱动：调用 [`decode`] / [`decode_with_dump`] 获得 [`DecodeReport`]。
///
/// # 契约说明（What）
/// - `with_sub_records(false)` 时只校验顶层帧头，负载整体跳过；
/// - 解码是纯同步扫描，不分配、不阻塞。
#[derive(Debug, Clone)]
pub struct FrameDecoder<'a> {
    buffer: &'a [u8],
    offset: usize,
    state: DecodeState,
    scan_sub_records: bool,
    current: Option<SubRecords<'a>>,
}

impl<'a> FrameDecoder<'a> {
    /// 创建从缓冲起点开始、默认遍历子记录的解码器。
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            offset: 0,
            state: DecodeState::ScanningFrame,
            scan_sub_records: true,
            current: None,
        }
    }

    /// 设置是否遍历帧负载内的子记录。
    #[must_use]
    pub fn with_sub_records(mut self, enabled: bool) -> Self {
        self.scan_sub_records = enabled;
        self
    }

    /// 当前状态。
    pub fn state(&self) -> DecodeState {
        self.state
    }

    /// 顶层游标：下一帧（或出错帧）的帧头偏移。
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// 推进状态机，至多产出一个事件；到达终态后返回 `None`。
    pub fn step(&mut self) -> Option<DecodeEvent<'a>> {
        loop {
            match self.state {
                DecodeState::Done | DecodeState::Error => return None,
                DecodeState::ScanningFrame => {
                    if let Some(event) = self.scan_frame() {
                        return Some(event);
                    }
                }
                DecodeState::ScanningSubRecord => {
                    let next = self.current.as_mut().and_then(Iterator::next);
                    match next {
                        Some(Ok(record)) => return Some(DecodeEvent::SubRecord(record)),
                        Some(Err(error)) => {
                            self.finish_frame();
                            return Some(DecodeEvent::Violation(error));
                        }
                        None => self.finish_frame(),
                    }
                }
            }
        }
    }

    fn scan_frame(&mut self) -> Option<DecodeEvent<'a>> {
        let offset = self.offset;
        let Some(header) = FrameHeader::parse(&self.buffer[offset..]) else {
            self.state = DecodeState::Done;
            return None;
        };

        if header.block_type != BLOCK_TYPE_BASE {
            return Some(self.fail(FrameError::BlockType {
                offset,
                found: header.block_type,
            }));
        }
        if header.header_size as usize != FRAME_HEADER_SIZE {
            return Some(self.fail(FrameError::HeaderSize {
                offset,
                found: header.header_size,
            }));
        }

        let payload_start = offset + FRAME_HEADER_SIZE;
        let declared = header.payload_size as usize;
        let available = self.buffer.len() - payload_start;
        if declared > available {
            return Some(self.fail(FrameError::TruncatedPayload {
                offset,
                declared,
                available,
            }));
        }

        let frame = Frame {
            offset,
            header,
            payload: &self.buffer[payload_start..payload_start + declared],
        };
        if self.scan_sub_records {
            self.current = Some(frame.sub_records());
            self.state = DecodeState::ScanningSubRecord;
        } else {
            self.offset = payload_start + declared;
        }
        Some(DecodeEvent::Frame(frame))
    }

    fn finish_frame(&mut self) {
        if let Some(records) = self.current.take() {
            self.offset = records.frame_offset + FRAME_HEADER_SIZE + records.payload.len();
        }
        self.state = DecodeState::ScanningFrame;
    }

    fn fail(&mut self, error: FrameError) -> DecodeEvent<'a> {
        self.state = DecodeState::Error;
        DecodeEvent::Violation(error)
    }
}

impl<'a> Iterator for FrameDecoder<'a> {
    type Item = DecodeEvent<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.step()
    }
}

/// 汇总解码参数：是否遍历子记录，以及输出开关。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// 是否遍历子记录并校验其长度字段。
    pub scan_sub_records: bool,
    /// 人类可读输出开关，与校验互不影响。
    pub dump: DumpOptions,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            scan_sub_records: true,
            dump: DumpOptions::default(),
        }
    }
}

/// 一次完整解码的汇总结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeReport {
    /// 通过结构校验的顶层帧数量。
    pub frames: usize,
    /// 成功提取的子记录数量。
    pub sub_records: usize,
    /// 解码停止时的顶层游标（字节）。
    pub bytes_scanned: usize,
    /// 按出现顺序记录的违规。
    pub violations: ViolationVec,
    /// 解码结束时的终态。
    pub final_state: DecodeState,
}

impl DecodeReport {
    /// 没有任何违规且正常结束。
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty() && self.final_state == DecodeState::Done
    }

    /// 顶层结构违规（至多一个）。
    pub fn structural_error(&self) -> Option<&FrameError> {
        self.violations.iter().find(|error| error.is_structural())
    }
}

/// 只收集违规、不输出的解码。
pub fn decode(buffer: &[u8], scan_sub_records: bool) -> DecodeReport {
    let options = DecodeOptions {
        scan_sub_records,
        dump: DumpOptions::default(),
    };
    // io::sink 不会失败
    decode_with_dump(buffer, &options, &mut io::sink()).unwrap_or_else(|_| DecodeReport {
        frames: 0,
        sub_records: 0,
        bytes_scanned: 0,
        violations: ViolationVec::new(),
        final_state: DecodeState::Error,
    })
}

/// 解码并按 `options.dump` 输出人类可读内容。
///
/// # 契约说明（What）
/// - 违规同时记录在报告中并以 `warn` 级别写入 tracing 日志；
/// - 子记录输出开关会隐式启用子记录遍历，未通过校验的子记录也会被输出；
/// - 只有写出失败才会返回 `Err`，结构违规不会。
pub fn decode_with_dump<W: Write + ?Sized>(
    buffer: &[u8],
    options: &DecodeOptions,
    out: &mut W,
) -> io::Result<DecodeReport> {
    let scan = options.scan_sub_records || options.dump.sub_records;
    let mut decoder = FrameDecoder::new(buffer).with_sub_records(scan);
    let mut frames = 0usize;
    let mut sub_records = 0usize;
    let mut violations = ViolationVec::new();

    while let Some(event) = decoder.step() {
        match event {
            DecodeEvent::Frame(frame) => {
                frames += 1;
                if options.dump.frame_headers {
                    dump::write_frame_header(out, frames, &frame)?;
                }
                if options.dump.data.is_enabled() {
                    dump::write_payload(out, frames, &frame, options.dump.data)?;
                }
            }
            DecodeEvent::SubRecord(record) => {
                sub_records += 1;
                if options.dump.sub_records {
                    dump::write_sub_record(out, &record)?;
                }
            }
            DecodeEvent::Violation(error) => {
                if options.dump.sub_records {
                    dump::write_invalid_sub_record(out, buffer, &error)?;
                }
                tracing::warn!(
                    offset = error.offset(),
                    check = error.check(),
                    structural = error.is_structural(),
                    "{error}"
                );
                violations.push(error);
            }
        }
    }

    Ok(DecodeReport {
        frames,
        sub_records,
        bytes_scanned: decoder.offset(),
        violations,
        final_state: decoder.state(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::write_sub_record_length;

    fn frame_with_records(words: &[u16]) -> Vec<u8> {
        let payload_len: usize = words.iter().map(|w| usize::from(*w).max(1) * 32).sum();
        let mut buffer = FrameHeader::base(payload_len as u32).to_bytes().to_vec();
        let mut payload = vec![0u8; payload_len];
        let mut cursor = 0;
        for &w in words {
            if w == 0 {
                cursor += 32;
                continue;
            }
            cursor += write_sub_record_length(&mut payload[cursor..], w).expect("写入子记录长度");
        }
        buffer.extend_from_slice(&payload);
        buffer
    }

    #[test]
    fn empty_buffer_is_done_without_events() {
        let mut decoder = FrameDecoder::new(&[]);
        assert_eq!(decoder.step(), None);
        assert_eq!(decoder.state(), DecodeState::Done);
    }

    #[test]
    fn trailing_bytes_shorter_than_header_end_the_scan() {
        let mut buffer = frame_with_records(&[1]);
        buffer.extend_from_slice(&[0xBB; 10]);
        let report = decode(&buffer, true);
        assert!(report.is_clean());
        assert_eq!(report.frames, 1);
        assert_eq!(report.bytes_scanned, 64);
    }

    #[test]
    fn frame_without_sub_record_scan_skips_payload() {
        let buffer = frame_with_records(&[0]);
        let events: Vec<_> = FrameDecoder::new(&buffer).with_sub_records(false).collect();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], DecodeEvent::Frame(_)));
    }

    #[test]
    fn overrun_sub_record_is_reported_with_its_position() {
        let mut buffer = frame_with_records(&[1, 1]);
        // 第二条子记录声明 4 个字，超出负载末尾
        buffer[FRAME_HEADER_SIZE + 32] = 4;
        let report = decode(&buffer, true);
        assert_eq!(report.sub_records, 1);
        assert_eq!(
            report.violations.as_slice(),
            &[FrameError::SubRecordOverrun {
                frame_offset: 0,
                record_offset: 32,
                declared_bytes: 128,
                available: 32,
            }]
        );
        assert_eq!(report.final_state, DecodeState::Done);
    }

    #[test]
    fn truncated_payload_is_structural() {
        let mut buffer = FrameHeader::base(128).to_bytes().to_vec();
        buffer.extend_from_slice(&[1, 0]);
        let report = decode(&buffer, true);
        assert_eq!(report.frames, 0);
        assert_eq!(report.final_state, DecodeState::Error);
        assert_eq!(
            report.structural_error(),
            Some(&FrameError::TruncatedPayload {
                offset: 0,
                declared: 128,
                available: 2,
            })
        );
    }

    #[test]
    fn odd_tail_in_payload_is_a_truncated_sub_record() {
        let mut buffer = FrameHeader::base(33).to_bytes().to_vec();
        let mut payload = vec![0u8; 33];
        write_sub_record_length(&mut payload, 1).expect("写入子记录长度");
        buffer.extend_from_slice(&payload);
        let report = decode(&buffer, true);
        assert_eq!(report.sub_records, 1);
        assert_eq!(report.violations[0].check(), "sub_record_header");
        assert_eq!(report.violations[0].offset(), FRAME_HEADER_SIZE + 32);
    }
}
