//! 体数据文件的持久化存储.

use std::fs;
use std::path::Path;

use crate::consts::PARTIAL_PREFIX;
use crate::error::VolumeError;
use crate::BoneMask;

/// 体数据文件的加载、保存与删除.
///
/// 流水线只通过该 trait 访问文件系统中的掩码文件.
pub trait VolumeStore {
    /// 从 `path` 加载掩码.
    ///
    /// 路径不存在时返回 `Err(VolumeError::NotFound)`;
    /// 文件无法解析时返回格式错误.
    fn load(&self, path: &Path) -> Result<BoneMask, VolumeError>;

    /// 将 `mask` 保存到 `path`, 已存在的文件会被覆盖.
    /// `path` 所在目录必须已经存在.
    fn save(&self, mask: &BoneMask, path: &Path) -> Result<(), VolumeError>;

    /// 删除 `path`. 路径不存在时返回 `Err(VolumeError::NotFound)`.
    fn delete(&self, path: &Path) -> Result<(), VolumeError>;
}

/// 基于 nifti 文件的 [`VolumeStore`] 实现.
///
/// 保存时先写入同目录下的临时文件, 再原子地重命名到目标路径,
/// 因此中途崩溃不会留下被截断的目标文件.
#[derive(Copy, Clone, Debug, Default)]
pub struct NiftiStore;

impl VolumeStore for NiftiStore {
    fn load(&self, path: &Path) -> Result<BoneMask, VolumeError> {
        if !path.try_exists().map_err(|e| VolumeError::io(path, e))? {
            return Err(VolumeError::NotFound(path.to_owned()));
        }
        BoneMask::open(path)
    }

    fn save(&self, mask: &BoneMask, path: &Path) -> Result<(), VolumeError> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let file_name = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        // 保留完整文件名作为后缀, 使 nifti writer 能依据 `.gz` 判断是否压缩.
        let tmp = tempfile::Builder::new()
            .prefix(PARTIAL_PREFIX)
            .suffix(&format!("-{file_name}"))
            .tempfile_in(dir)
            .map_err(|e| VolumeError::io(dir, e))?;

        mask.write_raw(tmp.path())
            .map_err(|source| VolumeError::Nifti {
                path: path.to_owned(),
                source,
            })?;
        tmp.persist(path)
            .map_err(|e| VolumeError::io(path, e.error))?;
        Ok(())
    }

    fn delete(&self, path: &Path) -> Result<(), VolumeError> {
        fs::remove_file(path).map_err(|e| VolumeError::io(path, e))
    }
}
