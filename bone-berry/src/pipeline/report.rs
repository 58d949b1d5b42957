//! 被试处理结果.

use std::path::PathBuf;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::post_proc::{Confidence, UnresolvedReason};
use crate::{BoneClass, Side};

/// 单个骨骼类别的最终处理结果.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case", tag = "outcome"))]
pub enum BoneOutcome {
    /// 至少一侧已保存, 原始文件已删除 (或删除失败, 见 `original_removed`).
    Resolved {
        /// 已保存的侧.
        saved: Vec<Side>,
        /// 可信程度.
        confidence: Confidence,
        /// 原始文件是否已被删除.
        original_removed: bool,
    },

    /// 掩码为空, 文件已删除.
    Empty,

    /// 文件不存在.
    MissingInput,

    /// 文件无法解析.
    FormatError {
        /// 原因.
        reason: String,
    },

    /// 无法判定, 原始文件保持原样.
    Unresolved {
        /// 原因.
        reason: UnresolvedReason,
    },

    /// 判定成功, 但没有任何一侧保存成功. 原始文件保持原样.
    SaveFailed,
}

impl BoneOutcome {
    /// 该结果是否需要人工介入 (失败或无法判定).
    ///
    /// 文件缺失不计入, 因为已处理过的被试目录本来就不包含原始文件.
    pub fn needs_attention(&self) -> bool {
        match self {
            BoneOutcome::Resolved {
                original_removed, ..
            } => !original_removed,
            BoneOutcome::Empty | BoneOutcome::MissingInput => false,
            BoneOutcome::FormatError { .. } | BoneOutcome::SaveFailed => true,
            BoneOutcome::Unresolved { reason } => reason.is_error(),
        }
    }
}

/// 一个被试的处理记录. 在内存中构建, 处理结束时一次性交给调用者.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SubjectReport {
    /// 被试名 (目录名).
    pub subject: String,

    /// 被试目录.
    pub dir: PathBuf,

    /// 修剪阶段删除的文件.
    pub pruned: Vec<PathBuf>,

    /// 可用的股骨参照物.
    pub references: Vec<Side>,

    /// 每个目标骨骼类别的结果, 按处理顺序排列.
    pub bones: Vec<(BoneClass, BoneOutcome)>,
}

impl SubjectReport {
    /// 创建空记录.
    pub fn new(subject: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            subject: subject.into(),
            dir: dir.into(),
            ..Default::default()
        }
    }

    /// 获取某个骨骼类别的结果.
    pub fn outcome(&self, bone: BoneClass) -> Option<&BoneOutcome> {
        self.bones.iter().find(|(b, _)| *b == bone).map(|(_, o)| o)
    }

    /// 需要人工介入的骨骼类别个数.
    pub fn attention_count(&self) -> usize {
        self.bones
            .iter()
            .filter(|(_, o)| o.needs_attention())
            .count()
    }
}

/// 整次运行的汇总.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RunSummary {
    /// 成功走完流水线的被试.
    pub subjects: Vec<SubjectReport>,

    /// 中途中止的被试及原因.
    pub failed: Vec<(String, String)>,
}

impl RunSummary {
    /// 是否一切正常 (没有中止的被试, 也没有需要人工介入的骨骼类别).
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.subjects.iter().all(|s| s.attention_count() == 0)
    }

    /// 需要人工介入的骨骼类别总数.
    pub fn attention_count(&self) -> usize {
        self.subjects.iter().map(SubjectReport::attention_count).sum()
    }
}
