//! 通用常量.

/// 单通道体素值.
pub mod gray {
    /// 分割掩码中背景的体素值.
    pub const MASK_BACKGROUND: u8 = 0;

    /// 分割掩码 (以及拆分出的连通域) 中前景的体素值.
    pub const MASK_FOREGROUND: u8 = 1;

    /// 体素是否是背景?
    #[inline]
    pub const fn is_background(p: u8) -> bool {
        matches!(p, MASK_BACKGROUND)
    }

    /// 体素是否是前景? 任何非零值都被视为前景.
    #[inline]
    pub const fn is_foreground(p: u8) -> bool {
        !is_background(p)
    }
}

/// nifti 压缩文件的扩展名.
pub const NII_GZ: &str = ".nii.gz";

/// 修剪阶段保留的文件名关键字. 文件名中不包含任一关键字的文件会被删除.
pub const BONE_KEYWORDS: [&str; 4] = ["femur", "patella", "tibia", "fibula"];

/// 保存过程中临时文件的名字前缀. 以 `.` 开头, 避免与正常输出混淆.
/// 带该前缀的文件是中断保存的残留, 修剪阶段会将其删除.
pub const PARTIAL_PREFIX: &str = ".partial-";

/// 默认的被试根目录 (相对当前工作目录).
pub const DEFAULT_ROOT_DIR: &str = "output";

/// 默认的日志文件路径 (相对当前工作目录).
pub const DEFAULT_LOG_FILE: &str = "log/splitting.log";
