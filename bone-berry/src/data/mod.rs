use std::ops::{Index, IndexMut};
use std::path::Path;
use std::sync::Arc;

use ndarray::{Array3, ArrayView, Axis, Ix3};
use nifti::writer::WriterOptions;
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, NiftiType, ReaderOptions};

use crate::consts::gray::*;
use crate::error::VolumeError;
use crate::{Idx3d, Idx3dF};

pub mod bone;
mod store;

pub use store::{NiftiStore, VolumeStore};

/// `NiftiHeader` 是栈上大对象, 移动该对象的开销很可观.
/// 因此我们将其分配到堆上. 由同一个文件派生出的掩码共享同一份 header.
type SharedHeader = Arc<NiftiHeader>;

/// nii 文件 header 的共用属性和部分通用操作.
pub trait NiftiHeaderAttr {
    /// 获取 header 部分.
    fn header(&self) -> &NiftiHeader;

    /// 获取单个体素分辨率. 该分辨率以毫米为单位, 顺序与数据索引一致,
    /// 即 `(z, h, w)`.
    #[inline]
    fn pix_dim(&self) -> [f64; 3] {
        let [_, w, h, z, ..] = self.header().pixdim;
        [z as f64, h as f64, w as f64]
    }

    /// 体素分辨率在三个维度上是否是各向同的?
    ///
    /// 左右侧判定只使用体素索引, 不考虑分辨率. 对各向异性体数据,
    /// 判定结果可能与物理空间中的结论不同.
    #[inline]
    fn is_isotropic(&self) -> bool {
        let [z, h, w] = self.pix_dim();
        z == h && z == w
    }

    /// 获取体素的实际体积值, 以立方毫米为单位.
    #[inline]
    fn voxel(&self) -> f64 {
        self.pix_dim().iter().product()
    }
}

/// nii 格式的三维二值分割掩码, 包括 header 和体素数据. 体素值以 `u8` 保存,
/// 0 为背景, 非零为前景.
///
/// 数据按 `(z, h, w)` 组织, 即 nifti 原生 `[x, y, z]` 顺序的逆序,
/// 因此底层数组始终是行优先的标准布局.
#[derive(Debug, Clone)]
pub struct BoneMask {
    header: SharedHeader,
    data: Array3<u8>,
}

impl NiftiHeaderAttr for BoneMask {
    #[inline]
    fn header(&self) -> &NiftiHeader {
        &self.header
    }
}

impl Index<Idx3d> for BoneMask {
    type Output = u8;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl IndexMut<Idx3d> for BoneMask {
    #[inline]
    fn index_mut(&mut self, index: Idx3d) -> &mut Self::Output {
        &mut self.data[index]
    }
}

impl BoneMask {
    /// 打开 nii 文件格式的三维掩码. `path` 为 nii 文件的本地路径.
    ///
    /// 第四维长度为 1 的体数据会被视为三维. 其它维度数目返回
    /// `Err(VolumeError::Shape)`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, VolumeError> {
        let path = path.as_ref();
        let nifti_err = |source| VolumeError::Nifti {
            path: path.to_owned(),
            source,
        };
        let shape_err = |reason: String| VolumeError::Shape {
            path: path.to_owned(),
            reason,
        };

        let obj = ReaderOptions::new().read_file(path).map_err(nifti_err)?;
        let header = Arc::new(obj.header().clone());
        let data = obj.into_volume().into_ndarray::<u8>().map_err(nifti_err)?;

        let data = match data.ndim() {
            3 => data,
            4 if data.len_of(Axis(3)) == 1 => data.index_axis_move(Axis(3), 0),
            n => return Err(shape_err(format!("found {n} dimensions"))),
        };
        let data = data
            .into_dimensionality::<Ix3>()
            .map_err(|e| shape_err(e.to_string()))?;

        // [W, H, z] -> [z, H, W]
        // hint: 原第一维向下增长, 原第二维向右增长.
        let data = data.permuted_axes([2, 1, 0]);
        let data = if data.is_standard_layout() {
            data
        } else {
            data.as_standard_layout().into_owned()
        };
        debug_assert!(data.is_standard_layout());

        Ok(Self { header, data })
    }

    /// 按原样将掩码写入 `path`. 若 `path` 以 `.gz` 结尾则压缩.
    ///
    /// header 中的空间变换等信息原样写出, 体素数据类型与 header 中记录的一致,
    /// 且不再做线性缩放. 复数、RGB 等无法表示掩码的类型以 `u8` 写出.
    pub fn write_raw<P: AsRef<Path>>(&self, path: P) -> nifti::Result<()> {
        // 只修改局部副本, 共享的 header 保持不变.
        let mut header = NiftiHeader::clone(&self.header);
        header.scl_slope = 1.0;
        header.scl_inter = 0.0;
        let datatype = header.data_type();
        let writer = WriterOptions::new(path.as_ref()).reference_header(&header);

        // [z, H, W] -> [W, H, z]
        let xyz = self.data.view().permuted_axes([2, 1, 0]);

        macro_rules! write_as {
            ($t:ty) => {
                writer.write_nifti(&xyz.mapv(|p| p as $t))
            };
        }
        match datatype {
            Ok(NiftiType::Int8) => write_as!(i8),
            Ok(NiftiType::Uint16) => write_as!(u16),
            Ok(NiftiType::Int16) => write_as!(i16),
            Ok(NiftiType::Uint32) => write_as!(u32),
            Ok(NiftiType::Int32) => write_as!(i32),
            Ok(NiftiType::Uint64) => write_as!(u64),
            Ok(NiftiType::Int64) => write_as!(i64),
            Ok(NiftiType::Float32) => write_as!(f32),
            Ok(NiftiType::Float64) => write_as!(f64),
            _ => writer.write_nifti(&xyz),
        }
    }

    /// 可变 header, 仅供测试构造特殊输入.
    #[cfg(test)]
    pub(crate) fn header_mut(&mut self) -> &mut NiftiHeader {
        Arc::make_mut(&mut self.header)
    }

    /// 根据裸掩码数据和体素分辨率直接创建 `BoneMask` 实体.
    ///
    /// # 参数
    ///
    /// 1. `data` 按照本 crate 的 \[z, h, w\] 格式存储.
    /// 2. `pix_dim` 同样按照 \[z, h, w\] 格式存储, 以毫米为单位.
    ///
    /// # 注意
    ///
    /// header 中只有尺寸与分辨率是有意义的, 因此你应仅将其用于实验与测试目的.
    pub fn fake(data: Array3<u8>, pix_dim: [f32; 3]) -> Self {
        let data = if data.is_standard_layout() {
            data
        } else {
            data.as_standard_layout().into_owned()
        };

        let mut header = NiftiHeader::default();
        let (z, h, w) = data.dim();
        header.dim = [3, w as u16, h as u16, z as u16, 1, 1, 1, 1];
        let [pz, ph, pw] = pix_dim;
        header.pixdim = [1.0, pw, ph, pz, 1.0, 1.0, 1.0, 1.0];
        header.scl_slope = 1.0;
        header.scl_inter = 0.0;
        header.datatype = NiftiType::Uint8 as i16;
        header.bitpix = 8;
        header.intent_name[..4].copy_from_slice(b"fake");

        Self {
            header: Arc::new(header),
            data,
        }
    }

    /// 判断该结构是否是由 [`Self::fake`] 手动拼接的.
    pub fn is_faked(&self) -> bool {
        self.header.intent_name.starts_with(b"fake")
    }

    /// 以 `data` 为体素数据, 派生一个与 `self` 共享 header 的新掩码.
    ///
    /// `data` 的形状必须与 `self` 一致, 否则程序 panic.
    pub(crate) fn derive(&self, data: Array3<u8>) -> Self {
        assert_eq!(self.data.dim(), data.dim(), "派生掩码形状不一致");
        Self {
            header: Arc::clone(&self.header),
            data,
        }
    }

    /// 两个掩码是否共享同一份 header (即由同一个文件派生而来).
    #[inline]
    pub fn shares_header_with(&self, other: &BoneMask) -> bool {
        Arc::ptr_eq(&self.header, &other.header)
    }

    /// 获取数据形状大小, `(z, h, w)`.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        self.data.dim()
    }

    /// 获取数据体素个数.
    #[inline]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// 检查索引是否合法.
    #[inline]
    pub fn check(&self, (z0, h0, w0): &Idx3d) -> bool {
        let (z, h, w) = self.shape();
        *z0 < z && *h0 < h && *w0 < w
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView<'_, u8, Ix3> {
        self.data.view()
    }

    /// 消费自我, 获得底层数据.
    #[inline]
    pub fn into_raw(self) -> Array3<u8> {
        self.data
    }

    /// 是否不存在任何前景体素?
    #[inline]
    pub fn is_empty(&self) -> bool {
        !self.data.iter().any(|&p| is_foreground(p))
    }

    /// 收集所有前景体素对应的下标. 结果按行优先存储.
    pub fn foreground_pos(&self) -> Vec<Idx3d> {
        self.data
            .indexed_iter()
            .filter_map(|(pos, pixel)| is_foreground(*pixel).then_some(pos))
            .collect()
    }

    /// 计算前景体素在索引空间中的质心 (各坐标分量的算术平均值).
    ///
    /// 结果的单位是体素索引而非毫米, 分量顺序为 `(z, h, w)`.
    /// 如果不存在前景, 则返回 `None`.
    pub fn centroid(&self) -> Option<Idx3dF> {
        let mut count = 0u64;
        let (mut sz, mut sh, mut sw) = (0.0, 0.0, 0.0);
        for ((z, h, w), _) in self
            .data
            .indexed_iter()
            .filter(|(_, p)| is_foreground(**p))
        {
            count += 1;
            sz += z as f64;
            sh += h as f64;
            sw += w as f64;
        }
        (count != 0).then(|| {
            let n = count as f64;
            (sz / n, sh / n, sw / n)
        })
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::prelude::*;

        impl BoneMask {
            /// 获取前景体素个数. 借助 `rayon` 并行统计, 结果与串行统计一致.
            pub fn count_foreground(&self) -> usize {
                self.data.par_iter().filter(|p| is_foreground(**p)).count()
            }
        }
    } else {
        impl BoneMask {
            /// 获取前景体素个数.
            pub fn count_foreground(&self) -> usize {
                self.data.iter().filter(|p| is_foreground(**p)).count()
            }
        }
    }
}
