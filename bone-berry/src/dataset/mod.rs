//! 被试目录操作.
//!
//! 提供迭代器风格的被试目录获取模式. 所有列举结果都按文件名字典序排列,
//! 保证日志可复现.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use itertools::Itertools;

use crate::consts::{BONE_KEYWORDS, PARTIAL_PREFIX};

/// 文件名是否包含任一骨骼关键字. 中断保存残留的临时文件不算在内.
#[inline]
pub fn is_recognized(file_name: &str) -> bool {
    !file_name.starts_with(PARTIAL_PREFIX) && BONE_KEYWORDS.iter().any(|k| file_name.contains(k))
}

/// 列出 `dir` 下的所有普通文件, 按文件名字典序排列.
pub fn sorted_files<P: AsRef<Path>>(dir: P) -> io::Result<Vec<PathBuf>> {
    sorted_entries(dir.as_ref(), |t| t.is_file())
}

/// 从根目录 `root` 创建被试目录加载器. `root` 的每个直接子目录都是一个被试.
///
/// 目录在创建时被一次性列举并排序, 之后的迭代不再访问文件系统.
pub fn subject_loader<P: AsRef<Path>>(root: P) -> io::Result<SubjectLoader> {
    let mut data = sorted_entries(root.as_ref(), |t| t.is_dir())?;
    data.reverse();
    Ok(SubjectLoader { data_rev: data })
}

/// 被试目录加载器. 每次迭代返回 (被试名, 被试目录).
#[derive(Debug)]
pub struct SubjectLoader {
    data_rev: Vec<PathBuf>,
}

impl Iterator for SubjectLoader {
    type Item = (String, PathBuf);

    fn next(&mut self) -> Option<Self::Item> {
        let dir = self.data_rev.pop()?;
        Some((subject_name(&dir), dir))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.data_rev.len(), Some(self.data_rev.len()))
    }
}

impl ExactSizeIterator for SubjectLoader {
    #[inline]
    fn len(&self) -> usize {
        self.data_rev.len()
    }
}

/// 以目录名作为被试名.
pub fn subject_name(dir: &Path) -> String {
    dir.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| dir.display().to_string())
}

/// 列出 `dir` 下文件类型满足 `pred` 的条目, 按文件名排序.
fn sorted_entries(dir: &Path, pred: fn(&fs::FileType) -> bool) -> io::Result<Vec<PathBuf>> {
    let mut ans = Vec::with_capacity(8);
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if pred(&entry.file_type()?) {
            ans.push(entry.path());
        }
    }
    Ok(ans
        .into_iter()
        .sorted_by(|a, b| a.file_name().cmp(&b.file_name()))
        .collect())
}
