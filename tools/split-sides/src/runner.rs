//! 程序运行函数.

use anyhow::{ensure, Context};
use bone_berry::pipeline::{self, RunSummary};
use bone_berry::{FileJournal, Level, NiftiStore};
use utils::loader;

/// 实际运行.
pub fn run() -> anyhow::Result<RunSummary> {
    let root = loader::root_dir_from_env_or_default();
    ensure!(root.is_dir(), "{} is not a directory", root.display());
    let log_file = loader::log_file_from_env_or_default();

    let mut journal = FileJournal::open(&log_file)
        .with_context(|| format!("cannot open log file {}", log_file.display()))?;
    log::info!("Splitting bones under {}...", root.display());

    let summary = pipeline::run_root(&root, &NiftiStore, &mut journal)?;
    log::info!(
        "{} info / {} error entries appended to {}",
        journal.count(Level::Info),
        journal.count(Level::Error),
        journal.path().display()
    );
    journal
        .finish()
        .with_context(|| format!("cannot write log file {}", log_file.display()))?;

    crate::result::save(&summary, &loader::summary_path_for(&log_file))?;
    Ok(summary)
}
