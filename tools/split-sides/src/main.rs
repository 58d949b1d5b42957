//! 将被试目录中的髌骨、胫骨、腓骨掩码拆分为左右两侧.
//!
//! 环境变量:
//!
//! - `BONE_SPLIT_ROOT`: 被试根目录, 默认为 `output`;
//! - `BONE_SPLIT_LOG`: 追加写入的日志文件, 默认为 `log/splitting.log`.
//!
//! 运行汇总写入日志文件所在目录的 `summary.json`.
//! 存在需要人工介入的骨骼或中止的被试时, 退出码为 2.

mod result;
mod runner;

use std::process::ExitCode;

fn main() -> anyhow::Result<ExitCode> {
    utils::init_logger()?;

    let summary = runner::run()?;
    result::analyze(&summary)?;

    Ok(if summary.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}
