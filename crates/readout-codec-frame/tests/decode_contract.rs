//! `decode_contract` 集成测试：以公开 API 验证帧流解码的结构契约。
//!
//! # 测试目标（Why）
//! - 覆盖“合法帧 / 帧头损坏 / 子记录长度为 0 / 输出开关”四类典型输入；
//! - 从外部 crate 视角构造字节流，确保线格式与文档一致，而非依赖内部辅助函数。

use readout_codec_frame::{
    BLOCK_TYPE_BASE, DataDump, DecodeEvent, DecodeOptions, DecodeState, DumpOptions,
    FRAME_HEADER_SIZE, FrameDecoder, FrameError, FrameHeader, decode, decode_with_dump,
    write_sub_record_length,
};

/// 帮助函数：构造一个负载由若干子记录组成的帧。
///
/// `words` 中的每个元素是一条子记录的长度字段；为 0 时仍占用 32 字节，便于构造损坏样本。
fn frame(sequence_id: u64, words: &[u16]) -> Vec<u8> {
    let payload_len: usize = words.iter().map(|w| usize::from(*w).max(1) * 32).sum();
    let header = FrameHeader::base(payload_len as u32).with_sequence_id(sequence_id);
    let mut bytes = header.to_bytes().to_vec();
    let mut payload = vec![0u8; payload_len];
    let mut cursor = 0;
    for &w in words {
        if w == 0 {
            cursor += 32;
        } else {
            cursor += write_sub_record_length(&mut payload[cursor..], w).expect("写入子记录长度");
        }
    }
    bytes.extend_from_slice(&payload);
    bytes
}

/// 负载 64 字节、单条 2 字长子记录：零违规、恰好一条子记录。
#[test]
fn well_formed_frame_yields_one_sub_record() {
    let buffer = frame(1, &[2]);
    assert_eq!(buffer.len(), FRAME_HEADER_SIZE + 64);

    let report = decode(&buffer, true);
    assert!(report.is_clean(), "合法帧不应产生违规: {:?}", report.violations);
    assert_eq!(report.frames, 1);
    assert_eq!(report.sub_records, 1);
    assert_eq!(report.bytes_scanned, buffer.len());
}

/// 帧头类型被破坏：恰好一个结构错误，且不再读取其后的任何帧。
#[test]
fn corrupt_block_type_stops_the_scan() {
    let mut buffer = frame(1, &[1]);
    let second_offset = buffer.len();
    buffer.extend_from_slice(&frame(2, &[1]));
    buffer.extend_from_slice(&frame(3, &[1]));
    buffer[second_offset] = 0xEE;

    let mut decoder = FrameDecoder::new(&buffer);
    let events: Vec<_> = decoder.by_ref().collect();
    assert_eq!(decoder.state(), DecodeState::Error);
    assert_eq!(decoder.offset(), second_offset);

    let violations: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            DecodeEvent::Violation(error) => Some(error.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(
        violations,
        vec![FrameError::BlockType {
            offset: second_offset,
            found: 0xEE
        }]
    );
    let frames = events
        .iter()
        .filter(|event| matches!(event, DecodeEvent::Frame(_)))
        .count();
    assert_eq!(frames, 1, "损坏帧之后的帧不得被读取");
    assert!(violations[0].to_string().contains("block_type"));
}

/// 帧头长度字段错误同样是结构错误。
#[test]
fn wrong_header_size_is_structural() {
    let mut header = FrameHeader::base(0);
    header.header_size = 40;
    let report = decode(&header.to_bytes(), true);
    assert_eq!(report.final_state, DecodeState::Error);
    assert_eq!(
        report.structural_error(),
        Some(&FrameError::HeaderSize {
            offset: 0,
            found: 40
        })
    );
}

/// 子记录长度为 0：报告子记录错误、不挂起，并继续解码下一帧。
#[test]
fn zero_length_sub_record_does_not_hang_and_next_frame_proceeds() {
    let mut buffer = frame(1, &[1, 0, 1]);
    buffer.extend_from_slice(&frame(2, &[2]));

    let report = decode(&buffer, true);
    assert_eq!(report.frames, 2, "下一帧必须继续被解码");
    assert_eq!(report.sub_records, 2, "第一帧损坏点之前一条 + 第二帧一条");
    assert_eq!(report.final_state, DecodeState::Done);
    assert_eq!(
        report.violations.as_slice(),
        &[FrameError::SubRecordZeroLength {
            frame_offset: 0,
            record_offset: 32,
            index: 1,
        }]
    );
    assert!(report.structural_error().is_none());
}

/// 关闭子记录遍历时，损坏的子记录不会被发现，帧计数不受影响。
#[test]
fn header_only_scan_ignores_sub_records() {
    let buffer = frame(1, &[0]);
    let report = decode(&buffer, false);
    assert!(report.is_clean());
    assert_eq!(report.sub_records, 0);
}

/// 输出开关与校验正交：开启输出后违规统计不变，且输出包含帧头字段与十六进制负载。
#[test]
fn dump_toggles_do_not_change_validation() {
    let buffer = frame(7, &[1, 0]);
    let options = DecodeOptions {
        scan_sub_records: true,
        dump: DumpOptions {
            frame_headers: true,
            sub_records: true,
            data: DataDump::Leading(4),
        },
    };
    let mut out = Vec::new();
    let dumped = decode_with_dump(&buffer, &options, &mut out).expect("写入内存不会失败");
    let silent = decode(&buffer, true);
    assert_eq!(dumped, silent);

    let text = String::from_utf8(out).expect("输出为 UTF-8");
    assert!(text.contains(&format!("blockType = 0x{BLOCK_TYPE_BASE:02X}")));
    assert!(text.contains("id = 7"));
    assert!(text.contains("Data page 1 @ 32\n\t01 00 00 00 \n\t..."));
    assert!(text.contains("Sub-record 0 @ 0x00000000 + 0: length = 1 words (32 bytes)"));
    assert!(text.contains(
        "Sub-record @ 0x00000000 + 32: INVALID (sub_record_length), length field = 00 00"
    ));
}

/// 损坏的子记录只在子记录输出开启时打印，且位于下一帧的帧头之前。
#[test]
fn corrupt_sub_record_is_dumped_before_the_next_frame() {
    let mut buffer = frame(1, &[1, 1]);
    buffer.extend_from_slice(&frame(2, &[1]));
    // 第一帧的第二条子记录声明 9 个字，越过负载末尾
    buffer[FRAME_HEADER_SIZE + 32] = 9;

    let headers_only = DecodeOptions {
        scan_sub_records: true,
        dump: DumpOptions {
            frame_headers: true,
            ..DumpOptions::default()
        },
    };
    let mut out = Vec::new();
    decode_with_dump(&buffer, &headers_only, &mut out).expect("写入内存不会失败");
    assert!(!String::from_utf8(out).expect("输出为 UTF-8").contains("INVALID"));

    let with_records = DecodeOptions {
        scan_sub_records: true,
        dump: DumpOptions {
            frame_headers: true,
            sub_records: true,
            data: DataDump::Off,
        },
    };
    let mut out = Vec::new();
    let report = decode_with_dump(&buffer, &with_records, &mut out).expect("写入内存不会失败");
    assert_eq!(report.frames, 2);
    assert_eq!(report.violations[0].check(), "sub_record_bounds");

    let text = String::from_utf8(out).expect("输出为 UTF-8");
    let invalid = text
        .find("Sub-record @ 0x00000000 + 32: INVALID (sub_record_bounds), length field = 09 00")
        .expect("输出损坏的子记录");
    let second = text.find("Block header 2 @ 96").expect("输出第二帧");
    assert!(invalid < second);
}

/// 子记录输出开关会隐式启用遍历。
#[test]
fn sub_record_dump_implies_scan() {
    let buffer = frame(1, &[1, 1]);
    let options = DecodeOptions {
        scan_sub_records: false,
        dump: DumpOptions {
            sub_records: true,
            ..DumpOptions::default()
        },
    };
    let report = decode_with_dump(&buffer, &options, &mut std::io::sink()).expect("sink");
    assert_eq!(report.sub_records, 2);
}
