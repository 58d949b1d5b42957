//! 运行日志.
//!
//! 流水线的每一个决策分支都会生成一条 [`Event`], 交给调用者注入的 [`Journal`].
//! 日志的生命周期与一次运行绑定, 不存在全局状态.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, LineWriter, Write};
use std::path::{Path, PathBuf};

use crate::post_proc::{Confidence, UnresolvedReason};
use crate::{BoneClass, Side};

/// 日志级别.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum Level {
    /// 决策分支与文件操作.
    Info,

    /// 无法处理或无法判定的情况.
    Error,
}

impl From<Level> for log::Level {
    fn from(l: Level) -> Self {
        match l {
            Level::Info => log::Level::Info,
            Level::Error => log::Level::Error,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // `pad` 使宽度等格式参数生效.
        f.pad(match self {
            Level::Info => "INFO",
            Level::Error => "ERROR",
        })
    }
}

/// 流水线事件.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// 无关文件被删除.
    Pruned(PathBuf),

    /// 删除文件失败.
    DeleteFailed {
        /// 文件.
        file: PathBuf,
        /// 原因.
        reason: String,
    },

    /// 空掩码文件被删除.
    EmptyDeleted(PathBuf),

    /// 某一侧股骨参照物可用.
    ReferenceAvailable(Side),

    /// 股骨参照物文件存在但无法读取, 视为缺失.
    ReferenceUnreadable {
        /// 文件.
        file: PathBuf,
        /// 原因.
        reason: String,
    },

    /// 掩码体素各向异性, 但判定只使用体素索引.
    Anisotropic {
        /// 骨骼类别.
        bone: BoneClass,
        /// `(z, h, w)` 体素分辨率, 毫米.
        pix_dim: [f64; 3],
    },

    /// 拆分得到的连通域个数 (最多记录两个).
    Components {
        /// 骨骼类别.
        bone: BoneClass,
        /// 连通域个数, 1 或 2.
        count: usize,
    },

    /// 连通域被判定到某一侧.
    Assigned {
        /// 骨骼类别.
        bone: BoneClass,
        /// 所在侧.
        side: Side,
        /// 可信程度.
        confidence: Confidence,
    },

    /// 判定结果已保存.
    Saved(PathBuf),

    /// 判定结果保存失败.
    SaveFailed {
        /// 目标文件.
        file: PathBuf,
        /// 原因.
        reason: String,
    },

    /// 原始文件在判定完成后被删除.
    OriginalDeleted(PathBuf),

    /// 期望的骨骼文件不存在.
    MissingInput(PathBuf),

    /// 骨骼文件存在但无法解析.
    Malformed {
        /// 文件.
        file: PathBuf,
        /// 原因.
        reason: String,
    },

    /// 无法判定, 原始文件保持原样.
    Unresolved {
        /// 骨骼类别.
        bone: BoneClass,
        /// 原因.
        reason: UnresolvedReason,
    },

    /// 被试处理中止.
    SubjectFailed(String),
}

impl Event {
    /// 事件的日志级别.
    pub fn level(&self) -> Level {
        match self {
            Event::DeleteFailed { .. }
            | Event::ReferenceUnreadable { .. }
            | Event::SaveFailed { .. }
            | Event::MissingInput(_)
            | Event::Malformed { .. }
            | Event::SubjectFailed(_) => Level::Error,
            Event::Unresolved { reason, .. } if reason.is_error() => Level::Error,
            _ => Level::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Pruned(p) => write!(f, "{} deleted!", p.display()),
            Event::DeleteFailed { file, reason } => {
                write!(f, "cannot delete {}: {reason}", file.display())
            }
            Event::EmptyDeleted(p) => write!(f, "{} deleted because empty!", p.display()),
            Event::ReferenceAvailable(side) => {
                write!(f, "{side} femur segmentation as reference available!")
            }
            Event::ReferenceUnreadable { file, reason } => write!(
                f,
                "{} cannot be read and is ignored as reference: {reason}",
                file.display()
            ),
            Event::Anisotropic { bone, pix_dim } => write!(
                f,
                "{bone} has anisotropic voxels {pix_dim:?} (z, h, w); sides are decided in voxel index space"
            ),
            Event::Components { bone, count: 1 } => {
                write!(f, "{bone}: only one component available!")
            }
            Event::Components { bone, count } => write!(f, "{bone}: {count} components available!"),
            Event::Assigned {
                bone,
                side,
                confidence: Confidence::Geometric,
            } => write!(f, "{bone}: component is {side}!"),
            Event::Assigned {
                bone,
                side,
                confidence: Confidence::ToBeVerified,
            } => write!(
                f,
                "{bone}: only one femur reference, component will be considered {side}! To be verified!"
            ),
            Event::Saved(p) => write!(f, "{} saved!", p.display()),
            Event::SaveFailed { file, reason } => {
                write!(f, "cannot save {}: {reason}", file.display())
            }
            Event::OriginalDeleted(p) => {
                write!(f, "{} deleted after assigning side!", p.display())
            }
            Event::MissingInput(p) => write!(f, "{} is missing!", p.display()),
            Event::Malformed { file, reason } => {
                write!(f, "{} cannot be parsed: {reason}", file.display())
            }
            Event::Unresolved { bone, reason } => {
                write!(f, "{bone}: side assignment failed ({reason}), file left untouched")
            }
            Event::SubjectFailed(reason) => write!(f, "subject aborted: {reason}"),
        }
    }
}

/// 日志接收端. 由调用者创建并注入流水线.
pub trait Journal {
    /// 记录被试 `subject` 的一条事件.
    fn record(&mut self, subject: &str, event: Event);
}

/// 将一条事件同时转发给 `log` 门面.
#[inline]
fn forward(subject: &str, event: &Event) {
    log::log!(log::Level::from(event.level()), "{subject}: {event}");
}

/// 追加写入文件的日志. 每条事件占一行, 格式为 `LEVEL subject: message`.
///
/// 写入失败不会打断流水线; 第一个 I/O 错误会被保留,
/// 可通过 [`FileJournal::finish`] 取回.
#[derive(Debug)]
pub struct FileJournal {
    path: PathBuf,
    writer: LineWriter<File>,
    failure: Option<io::Error>,
    counts: [usize; 2],
}

impl FileJournal {
    /// 以追加模式打开 `path`. 父目录不存在时会被创建.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref().to_owned();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: LineWriter::new(file),
            failure: None,
            counts: [0; 2],
        })
    }

    /// 日志文件路径.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 目前为止记录的某一级别事件个数.
    #[inline]
    pub fn count(&self, level: Level) -> usize {
        self.counts[level as usize]
    }

    /// 刷新并关闭日志. 返回运行期间第一个写入错误 (若有).
    pub fn finish(mut self) -> io::Result<()> {
        if let Some(e) = self.failure.take() {
            return Err(e);
        }
        self.writer.flush()
    }
}

impl Journal for FileJournal {
    fn record(&mut self, subject: &str, event: Event) {
        forward(subject, &event);
        self.counts[event.level() as usize] += 1;
        let line = format!("{:<5} {subject}: {event}", event.level());
        if let Err(e) = writeln!(self.writer, "{line}") {
            self.failure.get_or_insert(e);
        }
    }
}

/// 保存在内存中的日志, 用于测试和嵌入式调用.
#[derive(Debug, Default)]
pub struct MemoryJournal {
    entries: Vec<(String, Event)>,
}

impl MemoryJournal {
    /// 创建空日志.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 所有 (被试, 事件) 记录, 按记录顺序排列.
    #[inline]
    pub fn entries(&self) -> &[(String, Event)] {
        &self.entries
    }

    /// 所有事件, 按记录顺序排列.
    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.entries.iter().map(|(_, e)| e)
    }

    /// 某一级别的事件个数.
    pub fn count(&self, level: Level) -> usize {
        self.events().filter(|e| e.level() == level).count()
    }

    /// 清空.
    #[inline]
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Journal for MemoryJournal {
    fn record(&mut self, subject: &str, event: Event) {
        forward(subject, &event);
        self.entries.push((subject.to_owned(), event));
    }
}
