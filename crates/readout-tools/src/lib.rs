#![warn(missing_docs)]

//! `readout-tools`：原始数据文件的离线解析工具。
//!
//! # 模块定位（Why）
//! - 采集链路落盘的原始文件由连续的帧组成；排障时需要在不启动采集程序的情况下检查帧头、
//!   子记录与负载内容，本 crate 提供 `read-raw` 命令行工具及其可测试的库入口。
//!
//! # 结构（How）
//! - `options`：`key=value` 形式的命令行参数解析；
//! - `run`：读取（必要时解压）文件、驱动解码器并汇总结果；
//! - `logging`：安装输出到 stderr 的 `tracing` 订阅者，stdout 专用于结构输出。

mod error;
pub mod logging;
mod options;
mod run;

pub use crate::{
    error::ToolError,
    options::{FileType, ReadRawOptions, USAGE},
    run::read_raw,
};
