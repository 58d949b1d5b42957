//! 运行时错误.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// 读写、删除体数据文件时的错误.
#[derive(Debug, Error)]
pub enum VolumeError {
    /// 路径不存在.
    #[error("volume file `{}` does not exist", .0.display())]
    NotFound(PathBuf),

    /// 文件存在, 但无法被解析为 nifti 体数据.
    #[error("cannot read `{}` as a nifti volume: {source}", .path.display())]
    Nifti {
        /// 出错的文件.
        path: PathBuf,
        /// 底层 nifti 错误.
        #[source]
        source: nifti::NiftiError,
    },

    /// 文件可以解析, 但不是三维体数据.
    #[error("`{}` is not a 3D volume: {reason}", .path.display())]
    Shape {
        /// 出错的文件.
        path: PathBuf,
        /// 具体原因.
        reason: String,
    },

    /// 其他底层 I/O 错误.
    #[error("i/o error on `{}`: {source}", .path.display())]
    Io {
        /// 出错的文件.
        path: PathBuf,
        /// 底层 I/O 错误.
        #[source]
        source: io::Error,
    },
}

impl VolumeError {
    /// 是否是 "文件不存在" 错误.
    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self, VolumeError::NotFound(_))
    }

    /// 是否是 "文件格式错误" (存在但无法解析).
    #[inline]
    pub fn is_format(&self) -> bool {
        matches!(self, VolumeError::Nifti { .. } | VolumeError::Shape { .. })
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        if source.kind() == io::ErrorKind::NotFound {
            VolumeError::NotFound(path)
        } else {
            VolumeError::Io { path, source }
        }
    }
}

/// 被试级别的错误. 出现时该被试的处理终止, 但整体运行继续.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// 无法列出目录内容.
    #[error("cannot list directory `{}`: {source}", .path.display())]
    Io {
        /// 出错的目录.
        path: PathBuf,
        /// 底层 I/O 错误.
        #[source]
        source: io::Error,
    },
}
