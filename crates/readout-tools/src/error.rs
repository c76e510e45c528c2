//! `read-raw` 的致命错误。
//!
//! 数据本身的违规不会出现在这里：它们随 `DecodeReport` 返回，只有“无法继续解析”的情况才会中止工具。

use std::{io, path::PathBuf};

use thiserror::Error;

/// `read-raw` 的致命错误；数据本身的违规不属于此类，而是随解码报告返回。
#[derive(Debug, Error)]
pub enum ToolError {
    /// 没有提供任何参数。
    #[error("缺少参数\n{usage}")]
    Usage {
        /// 打印给用户的用法说明。
        usage: &'static str,
    },

    /// 参数中没有文件路径。
    #[error("未指定文件路径（首个裸参数或 filePath=）")]
    MissingPath,

    /// 读取输入文件失败。
    #[error("读取文件 {} 失败: {source}", .path.display())]
    Io {
        /// 输入文件路径。
        path: PathBuf,
        /// 底层 I/O 错误。
        #[source]
        source: io::Error,
    },

    /// 输入文件不是合法的 LZ4 帧流。
    #[error("解压文件 {} 失败: {source}", .path.display())]
    Decompress {
        /// 输入文件路径。
        path: PathBuf,
        /// 解压器报告的错误。
        #[source]
        source: io::Error,
    },

    /// 写出结构输出失败。
    #[error("写出解析结果失败: {0}")]
    Output(#[source] io::Error),

    /// 全局日志订阅者已被设置。
    #[error("安装日志订阅者失败: {0}")]
    Logging(#[from] tracing::subscriber::SetGlobalDefaultError),
}
