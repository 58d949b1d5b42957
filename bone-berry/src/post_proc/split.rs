//! 三维掩码的连通域拆分.

use std::cmp::Reverse;
use std::collections::VecDeque;

use itertools::Itertools;
use ndarray::Array3;

use crate::consts::gray::*;
use crate::{BoneMask, Idx3d};

/// 获得 `(z, h, w)` 的 26-邻居索引 (共面、共棱或共顶点). 不检查越界.
#[inline]
pub(crate) fn neighbour26((z, h, w): Idx3d) -> [Idx3d; 26] {
    let mut ans = [(0, 0, 0); 26];
    let mut i = 0;
    for dz in [usize::MAX, 0, 1] {
        for dh in [usize::MAX, 0, 1] {
            for dw in [usize::MAX, 0, 1] {
                if (dz, dh, dw) == (0, 0, 0) {
                    continue;
                }
                // `usize::MAX` 加法回绕即为 `-1`; 越界结果会在 `check` 中被过滤.
                ans[i] = (z.wrapping_add(dz), h.wrapping_add(dh), w.wrapping_add(dw));
                i += 1;
            }
        }
    }
    ans
}

/// 连通域标记结果.
///
/// 标签值从 1 开始, 按行优先扫描中首次遇到该区域的顺序分配; 0 表示背景.
#[derive(Debug, Clone)]
pub struct Labeled {
    labels: Array3<u32>,
    areas: Vec<usize>,
}

impl Labeled {
    /// 连通域个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.areas.len()
    }

    /// 是否不存在任何连通域.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }

    /// 每个连通域的体素个数. 第 `i` 个元素对应标签 `i + 1`.
    #[inline]
    pub fn areas(&self) -> &[usize] {
        &self.areas
    }

    /// 获取标签图.
    #[inline]
    pub fn labels(&self) -> &Array3<u32> {
        &self.labels
    }

    /// 按体素个数降序排列的标签. 个数相同时保持标签顺序.
    pub fn ranked(&self) -> Vec<u32> {
        self.areas
            .iter()
            .enumerate()
            .sorted_by_key(|(_, area)| Reverse(**area))
            .map(|(idx, _)| idx as u32 + 1)
            .collect()
    }

    /// 生成只包含标签 `label` 的二值数据 (前景为 `MASK_FOREGROUND`).
    fn binary_of(&self, label: u32) -> Array3<u8> {
        self.labels
            .mapv(|l| if l == label { MASK_FOREGROUND } else { MASK_BACKGROUND })
    }
}

/// 按照 26-相邻规则标记 `mask` 中的所有前景连通域.
///
/// 两个前景体素 `p1` 和 `p2` 属于同一个区域, 当且仅当存在一条从 `p1` 到
/// `p2` 的 26-相邻路径, 且路径上的所有体素都是前景.
pub fn label_components(mask: &BoneMask) -> Labeled {
    let data = mask.data();
    let mut labels = Array3::<u32>::zeros(mask.shape());
    let mut areas = Vec::with_capacity(2);
    let mut bfs_q = VecDeque::with_capacity(64);

    for (pos, &pixel) in data.indexed_iter() {
        if is_background(pixel) || labels[pos] != 0 {
            continue;
        }
        let label = areas.len() as u32 + 1;
        let mut area = 0usize;

        labels[pos] = label;
        bfs_q.push_back(pos);
        while let Some(cur) = bfs_q.pop_front() {
            area += 1;
            for neigh in neighbour26(cur) {
                if mask.check(&neigh) && is_foreground(data[neigh]) && labels[neigh] == 0 {
                    labels[neigh] = label;
                    bfs_q.push_back(neigh);
                }
            }
        }
        areas.push(area);
    }

    Labeled { labels, areas }
}

/// 将 `mask` 拆分为最大和第二大的两个 26-连通域.
///
/// 两个结果都是与 `mask` 同形状、共享 header 的独立二值掩码.
/// 连通域不足两个时, 缺失的位置返回 `None` (而不是空掩码).
/// 全背景输入返回 `(None, None)`.
pub fn split_two_largest(mask: &BoneMask) -> (Option<BoneMask>, Option<BoneMask>) {
    let labeled = label_components(mask);
    let mut ranked = labeled
        .ranked()
        .into_iter()
        .map(|label| mask.derive(labeled.binary_of(label)));
    let first = ranked.next();
    let second = ranked.next();
    (first, second)
}
