use std::{
    fs::{self, File},
    io::{Read, Write},
    path::Path,
};

use readout_codec_frame::{DecodeReport, decode_with_dump};

use crate::{
    error::ToolError,
    options::{FileType, ReadRawOptions},
};

/// 读取整份输入文件，按参数解码并把结构输出写入 `out`。
///
/// # 契约说明（What）
/// - `fileType=lz4` 的文件先按 LZ4 帧格式整体解压，再交给解码器；
/// - 文件无法读取或解压、输出无法写出时返回错误；
/// - 数据违规不视为失败：它们以告警日志记录，并保留在返回的 [`DecodeReport`] 中；
/// - 结束时以一条 `info` 日志汇总帧数、子记录数与扫描字节数。
pub fn read_raw<W: Write + ?Sized>(
    options: &ReadRawOptions,
    out: &mut W,
) -> Result<DecodeReport, ToolError> {
    let path = &options.file_path;
    let buffer = load(path, options.file_type)?;
    tracing::info!(
        path = %path.display(),
        file_type = options.file_type.as_str(),
        size = buffer.len(),
        "开始解析原始数据文件"
    );

    let report = decode_with_dump(&buffer, &options.decode_options(), out)
        .map_err(ToolError::Output)?;

    if let Some(error) = report.structural_error() {
        tracing::warn!(offset = error.offset(), check = error.check(), "帧流结构损坏，解析提前终止");
    }
    tracing::info!(
        frames = report.frames,
        sub_records = report.sub_records,
        bytes = report.bytes_scanned,
        violations = report.violations.len(),
        "解析完成"
    );
    Ok(report)
}

fn load(path: &Path, file_type: FileType) -> Result<Vec<u8>, ToolError> {
    let io_error = |source| ToolError::Io {
        path: path.to_path_buf(),
        source,
    };
    match file_type {
        FileType::Plain => fs::read(path).map_err(io_error),
        FileType::Lz4 => {
            let file = File::open(path).map_err(io_error)?;
            let mut buffer = Vec::new();
            lz4_flex::frame::FrameDecoder::new(file)
                .read_to_end(&mut buffer)
                .map_err(|source| ToolError::Decompress {
                    path: path.to_path_buf(),
                    source,
                })?;
            Ok(buffer)
        }
    }
}
