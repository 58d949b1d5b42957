//! 运行配置. 所有配置项都来自环境变量, 未设置时使用默认值.

use bone_berry::consts::{DEFAULT_LOG_FILE, DEFAULT_ROOT_DIR};
use std::env;
use std::path::{Path, PathBuf};

/// 被试根目录环境变量.
pub const ROOT_DIR_ENV: &str = "BONE_SPLIT_ROOT";

/// 日志文件环境变量.
pub const LOG_FILE_ENV: &str = "BONE_SPLIT_LOG";

/// 运行汇总的文件名, 与日志文件位于同一目录.
pub const SUMMARY_FILE: &str = "summary.json";

/// 读取非空环境变量.
fn non_empty_var(key: &str) -> Option<PathBuf> {
    env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// 获取被试根目录.
///
/// 1. 若环境变量 `$BONE_SPLIT_ROOT` 非空, 则返回其值;
/// 2. 否则, 返回 `output`.
pub fn root_dir_from_env_or_default() -> PathBuf {
    non_empty_var(ROOT_DIR_ENV).unwrap_or_else(|| PathBuf::from(DEFAULT_ROOT_DIR))
}

/// 获取日志文件路径.
///
/// 1. 若环境变量 `$BONE_SPLIT_LOG` 非空, 则返回其值;
/// 2. 否则, 返回 `log/splitting.log`.
pub fn log_file_from_env_or_default() -> PathBuf {
    non_empty_var(LOG_FILE_ENV).unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE))
}

/// 日志文件旁的运行汇总路径.
pub fn summary_path_for(log_file: &Path) -> PathBuf {
    log_file.with_file_name(SUMMARY_FILE)
}
