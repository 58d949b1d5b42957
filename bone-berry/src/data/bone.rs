//! 骨骼类别与左右侧.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::consts::NII_GZ;

/// 一个掩码文件在被试目录中扮演的角色.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum BoneClass {
    /// 左股骨, 参照物.
    FemurLeft,

    /// 右股骨, 参照物.
    FemurRight,

    /// 髌骨.
    Patella,

    /// 胫骨.
    Tibia,

    /// 腓骨.
    Fibula,
}

impl BoneClass {
    /// 需要判定左右侧的骨骼类别, 按处理顺序排列.
    pub const TARGETS: [BoneClass; 3] = [BoneClass::Patella, BoneClass::Tibia, BoneClass::Fibula];

    /// 文件名主干, 如 `femur_left`.
    pub const fn stem(&self) -> &'static str {
        match self {
            BoneClass::FemurLeft => "femur_left",
            BoneClass::FemurRight => "femur_right",
            BoneClass::Patella => "patella",
            BoneClass::Tibia => "tibia",
            BoneClass::Fibula => "fibula",
        }
    }

    /// 原始 (未判定左右侧) 文件名, 如 `tibia.nii.gz`.
    pub fn file_name(&self) -> String {
        format!("{}{NII_GZ}", self.stem())
    }

    /// 判定左右侧之后的文件名, 如 `tibia_left.nii.gz`.
    pub fn sided_file_name(&self, side: Side) -> String {
        format!("{}_{}{NII_GZ}", self.stem(), side.suffix())
    }

    /// 给定侧的股骨参照物.
    pub const fn femur(side: Side) -> BoneClass {
        match side {
            Side::Left => BoneClass::FemurLeft,
            Side::Right => BoneClass::FemurRight,
        }
    }
}

impl fmt::Display for BoneClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.stem())
    }
}

/// 左右侧.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Side {
    /// 左.
    Left,

    /// 右.
    Right,
}

impl Side {
    /// 按 (左, 右) 顺序排列的两侧.
    pub const BOTH: [Side; 2] = [Side::Left, Side::Right];

    /// 另一侧.
    #[inline]
    pub const fn opposite(&self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    /// 文件名后缀.
    #[inline]
    pub const fn suffix(&self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}
