#![warn(missing_docs)] // <= 合适时移除它.
// #![warn(clippy::missing_docs_in_private_items)]  // <= too strict.

//! 核心库. 对自动分割得到的下肢骨骼 nifti 掩码进行后处理:
//! 将含糊的多部件掩码拆分为连通域, 并依据股骨参照物为每个连通域判定左右侧.
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 注意
//!
//! 1. 骨骼分割本身 (CT 体素 -> 标签掩码) 由外部系统完成, 不在本 crate 的范围内.
//!   本 crate 只消费并精化已经存在的二值掩码.
//! 2. 所有距离都在体素索引空间中计算, 不经过 header 中的仿射变换,
//!   也不考虑体素分辨率. 对各向异性体数据, 这可能与物理空间中的结论不同.
//!
//! # 开发计划
//!
//! ### 三维 26-连通域拆分 ✅
//!
//! 按体素个数排序, 取最大的两个连通域.
//!
//! 实现位于 `bone-berry/src/post_proc/split.rs`.
//!
//! ### 左右侧判定 ✅
//!
//! 以左/右股骨质心为参照, 按最近质心原则判定. 参照物或连通域缺失时有明确的退化规则,
//! 无法自洽时放弃判定而不是猜测.
//!
//! 实现位于 `bone-berry/src/post_proc/side.rs`.
//!
//! ### 被试目录流水线 ✅
//!
//! 修剪无关文件 -> 加载参照物 -> 逐个骨骼类别拆分并判定 -> 保存结果并删除原文件.
//! 每一个决策分支都写入注入的 [`Journal`].
//!
//! 实现位于 `bone-berry/src/pipeline`.
//!
//! ### 原子写入 ✅
//!
//! 先写临时文件再重命名, 避免崩溃时留下被截断的输出.
//!
//! 实现位于 `bone-berry/src/data/store.rs`.
//!
//! ### 物理空间距离 ⌛️
//!
//! 是否需要按 header 的仿射变换在毫米空间中比较距离, 尚待确认.

/// 三维索引, 同时也可一定程度上用作非负整数向量. 顺序为 `(z, h, w)`.
pub type Idx3d = (usize, usize, usize);

/// 高精度三维坐标, 例如索引空间中的质心.
pub type Idx3dF = (f64, f64, f64);

/// 3D nii 掩码基础数据结构.
mod data;

pub use data::bone::{BoneClass, Side};
pub use data::{BoneMask, NiftiHeaderAttr, NiftiStore, VolumeStore};

mod error;

pub use error::{PipelineError, VolumeError};

pub mod consts;

pub mod dataset;

pub mod journal;

pub use journal::{Event, FileJournal, Journal, Level, MemoryJournal};

pub mod pipeline;

pub mod post_proc;

pub mod prelude;
