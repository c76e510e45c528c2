//! 命令行工具的日志安装。
//!
//! 过滤规则优先读取 `RUST_LOG`，缺省为 `info`；日志写到 stderr，避免与 stdout 上的结构输出交错。

use tracing_subscriber::{EnvFilter, layer::SubscriberExt};

use crate::error::ToolError;

/// 安装全局 `tracing` 订阅者；进程内只能成功一次。
pub fn install() -> Result<(), ToolError> {
    let subscriber = tracing_subscriber::registry()
        .with(build_env_filter())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr));
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn build_env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}
