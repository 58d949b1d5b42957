//! 运行结果.

use anyhow::Context;
use bone_berry::pipeline::{BoneOutcome, RunSummary, SubjectReport};
use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// 将单个被试的结果写进 `w` 中.
fn describe_into<W: Write>(r: &SubjectReport, w: &mut W) -> io::Result<()> {
    const S4: &str = "    ";

    writeln!(w, "Subject `{}`:", r.subject)?;
    writeln!(w, "{S4}Pruned files: {}", r.pruned.len())?;
    writeln!(w, "{S4}Femur references: {:?}", r.references)?;
    for (bone, outcome) in r.bones.iter() {
        let text = match outcome {
            BoneOutcome::Resolved {
                saved,
                confidence,
                original_removed,
            } => format!(
                "saved {saved:?} ({confidence:?}){}",
                if *original_removed {
                    ""
                } else {
                    ", original NOT removed"
                }
            ),
            BoneOutcome::Empty => "empty, deleted".to_string(),
            BoneOutcome::MissingInput => "missing".to_string(),
            BoneOutcome::FormatError { reason } => format!("unreadable: {reason}"),
            BoneOutcome::Unresolved { reason } => format!("unresolved: {reason}"),
            BoneOutcome::SaveFailed => "nothing saved".to_string(),
        };
        let mark = if outcome.needs_attention() { "!" } else { " " };
        writeln!(w, "{S4}{mark}{bone}: {text}")?;
    }
    Ok(())
}

/// 在终端打印运行结果.
pub fn analyze(summary: &RunSummary) -> io::Result<()> {
    let stdout = io::stdout();
    let mut w = stdout.lock();

    utils::sep();
    for report in summary.subjects.iter() {
        describe_into(report, &mut w)?;
        utils::sep();
    }
    for (subject, reason) in summary.failed.iter() {
        writeln!(w, "Subject `{subject}` aborted: {reason}")?;
    }
    writeln!(
        w,
        "{} subjects processed, {} aborted, {} bones need attention",
        summary.subjects.len(),
        summary.failed.len(),
        summary.attention_count()
    )
}

/// 将运行结果以 json 格式写入 `path`.
pub fn save(summary: &RunSummary, path: &Path) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(summary)?;
    fs::write(path, text).with_context(|| format!("cannot write summary {}", path.display()))
}
