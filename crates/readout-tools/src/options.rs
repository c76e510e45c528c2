//! `read-raw` 的 `key=value` 参数解析。
//!
//! # 契约说明（What）
//! - 首个不含 `=` 的参数视为文件路径，与 `filePath=` 等价；其后的裸参数被忽略并告警；
//! - 未知键、无法解析的值都只记录告警并跳过，不会中止解析；
//! - 缺省值：`validateRDH=1`，其余输出开关关闭，`fileType=plain`。

use std::path::PathBuf;

use readout_codec_frame::{DataDump, DecodeOptions, DumpOptions};

use crate::error::ToolError;

/// 命令行用法说明。
pub const USAGE: &str = "\
用法: read-raw <文件路径> [key=value ...]
  filePath=<路径>              输入文件（也可作为首个裸参数给出）
  fileType=plain|lz4           输入文件格式，默认 plain
  dumpRDH=0|1                  输出每条子记录的位置与长度
  validateRDH=0|1              遍历并校验子记录，默认 1
  dumpDataBlockHeader=0|1      输出每个帧头
  dumpData=<n>                 输出负载：0 关闭，-1 全部，n 为前 n 字节";

/// 输入文件格式。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FileType {
    /// 未压缩的帧流。
    #[default]
    Plain,
    /// LZ4 压缩的帧流。
    Lz4,
}

impl FileType {
    /// 参数中的名称。
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Lz4 => "lz4",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "plain" => Some(Self::Plain),
            "lz4" => Some(Self::Lz4),
            _ => None,
        }
    }
}

/// 解析后的 `read-raw` 参数。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadRawOptions {
    /// 输入文件路径。
    pub file_path: PathBuf,
    /// 输入文件格式。
    pub file_type: FileType,
    /// 输出子记录。
    pub dump_rdh: bool,
    /// 遍历并校验子记录。
    pub validate_rdh: bool,
    /// 输出帧头。
    pub dump_data_block_header: bool,
    /// 负载输出范围。
    pub dump_data: DataDump,
}

impl ReadRawOptions {
    /// 以默认开关构造指定文件的参数。
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
            file_type: FileType::Plain,
            dump_rdh: false,
            validate_rdh: true,
            dump_data_block_header: false,
            dump_data: DataDump::Off,
        }
    }

    /// 解析命令行参数（不含程序名）。
    pub fn parse<I, S>(args: I) -> Result<Self, ToolError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut file_path: Option<PathBuf> = None;
        let mut options = Self::new(PathBuf::new());
        let mut seen_any = false;

        for arg in args {
            seen_any = true;
            let arg = arg.as_ref();
            let Some((key, value)) = arg.split_once('=') else {
                if file_path.is_none() {
                    file_path = Some(PathBuf::from(arg));
                } else {
                    tracing::warn!(argument = arg, "忽略多余的裸参数");
                }
                continue;
            };

            match key {
                "filePath" => file_path = Some(PathBuf::from(value)),
                "fileType" => match FileType::parse(value) {
                    Some(file_type) => options.file_type = file_type,
                    None => skip(key, value),
                },
                "dumpRDH" => set_flag(&mut options.dump_rdh, key, value),
                "validateRDH" => set_flag(&mut options.validate_rdh, key, value),
                "dumpDataBlockHeader" => {
                    set_flag(&mut options.dump_data_block_header, key, value)
                }
                "dumpData" => match value.trim().parse::<i64>() {
                    Ok(n) => options.dump_data = DataDump::from_option(n),
                    Err(_) => skip(key, value),
                },
                _ => tracing::warn!(key, value, "未知参数，已忽略"),
            }
        }

        if !seen_any {
            return Err(ToolError::Usage { usage: USAGE });
        }
        options.file_path = file_path
            .filter(|path| !path.as_os_str().is_empty())
            .ok_or(ToolError::MissingPath)?;
        Ok(options)
    }

    /// 转换为解码器参数。
    pub fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            scan_sub_records: self.validate_rdh,
            dump: DumpOptions {
                frame_headers: self.dump_data_block_header,
                sub_records: self.dump_rdh,
                data: self.dump_data,
            },
        }
    }
}

fn set_flag(flag: &mut bool, key: &str, value: &str) {
    match value.trim().parse::<i64>() {
        Ok(n) => *flag = n != 0,
        Err(_) => skip(key, value),
    }
}

fn skip(key: &str, value: &str) {
    tracing::warn!(key, value, "参数值无法解析，已忽略");
}
