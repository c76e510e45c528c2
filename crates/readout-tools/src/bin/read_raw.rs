//! `read-raw`：离线解析原始数据文件。
//!
//! # 使用方法
//! ```bash
//! cargo run -p readout-tools --bin read-raw -- run.raw dumpDataBlockHeader=1 dumpData=64
//! ```
//! 结构输出写到 stdout，日志写到 stderr（`RUST_LOG` 可调整级别）。

use std::{
    env,
    io::{self, BufWriter, Write},
};

use readout_tools::{ReadRawOptions, ToolError, logging, read_raw};

fn main() {
    if let Err(error) = run() {
        eprintln!("read-raw 失败: {error}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), ToolError> {
    logging::install()?;
    let options = ReadRawOptions::parse(env::args().skip(1))?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    read_raw(&options, &mut out)?;
    out.flush().map_err(ToolError::Output)
}
