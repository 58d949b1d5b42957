//! 依据股骨参照物判定连通域的左右侧.
//!
//! 距离均为体素索引空间中质心之间的欧氏距离. 判定过程不读取 header,
//! 因此不考虑体素分辨率和方向.

use std::fmt;

use once_cell::unsync::OnceCell;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{BoneMask, Idx3dF, Side};

/// 两点之间的欧氏距离.
#[inline]
fn distance((a, b, c): Idx3dF, (x, y, z): Idx3dF) -> f64 {
    ((a - x).powi(2) + (b - y).powi(2) + (c - z).powi(2)).sqrt()
}

/// 单个股骨参照物. 质心在第一次使用时才计算.
#[derive(Debug)]
pub struct Reference {
    mask: BoneMask,
    centroid: OnceCell<Option<Idx3dF>>,
}

impl Reference {
    /// 由股骨掩码创建参照物. 调用者负责保证掩码非空.
    pub fn new(mask: BoneMask) -> Self {
        Self {
            mask,
            centroid: OnceCell::new(),
        }
    }

    /// 参照物掩码.
    #[inline]
    pub fn mask(&self) -> &BoneMask {
        &self.mask
    }

    /// 参照物质心. 空掩码没有质心.
    #[inline]
    pub fn centroid(&self) -> Option<Idx3dF> {
        *self.centroid.get_or_init(|| self.mask.centroid())
    }
}

/// 一个被试的股骨参照物集合 (左, 右), 每一侧都可能缺失.
///
/// 集合在被试处理开始时构建一次, 之后不再修改.
#[derive(Debug, Default)]
pub struct ReferenceSet {
    left: Option<Reference>,
    right: Option<Reference>,
}

impl ReferenceSet {
    /// 由可能缺失的左右股骨掩码创建参照物集合. 空掩码被视为缺失.
    pub fn new(left: Option<BoneMask>, right: Option<BoneMask>) -> Self {
        let keep = |m: BoneMask| (!m.is_empty()).then(|| Reference::new(m));
        Self {
            left: left.and_then(keep),
            right: right.and_then(keep),
        }
    }

    /// 获取某一侧的参照物.
    #[inline]
    pub fn get(&self, side: Side) -> Option<&Reference> {
        match side {
            Side::Left => self.left.as_ref(),
            Side::Right => self.right.as_ref(),
        }
    }

    /// 获取某一侧参照物的质心.
    #[inline]
    fn centroid(&self, side: Side) -> Option<Idx3dF> {
        self.get(side).and_then(Reference::centroid)
    }

    /// 可用参照物的个数, 0 至 2.
    #[inline]
    pub fn len(&self) -> usize {
        Side::BOTH.iter().filter(|s| self.get(**s).is_some()).count()
    }

    /// 是否不存在任何参照物?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 可用参照物所在的侧, 按 (左, 右) 顺序排列.
    pub fn sides(&self) -> Vec<Side> {
        Side::BOTH
            .into_iter()
            .filter(|s| self.get(*s).is_some())
            .collect()
    }
}

/// 判定结果的可信程度.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Confidence {
    /// 由与两侧参照物的距离比较得出.
    Geometric,

    /// 只有一侧参照物, 结果由单锚点规则强制得出, 需要人工核实.
    ToBeVerified,
}

/// 无法判定的原因.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum UnresolvedReason {
    /// 没有任何股骨参照物. 这是预期内的情况, 不视为错误.
    NoReference,

    /// 没有可判定的连通域.
    NoComponent,

    /// 两个连通域的最近参照物不能构成一左一右.
    Ambiguous,

    /// 进入了理论上不可达的分支.
    InvariantViolated,
}

impl UnresolvedReason {
    /// 是否应当作为错误报告.
    #[inline]
    pub fn is_error(&self) -> bool {
        !matches!(self, UnresolvedReason::NoReference)
    }
}

impl fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UnresolvedReason::NoReference => "no femur reference available",
            UnresolvedReason::NoComponent => "no component to classify",
            UnresolvedReason::Ambiguous => {
                "components are not nearest to opposite femur references"
            }
            UnresolvedReason::InvariantViolated => "unreachable reference/component combination",
        })
    }
}

/// 左右侧判定结果.
#[derive(Debug)]
pub enum Assignment {
    /// 两侧都已确定.
    Resolved {
        /// 左侧连通域.
        left: BoneMask,
        /// 右侧连通域.
        right: BoneMask,
        /// 可信程度.
        confidence: Confidence,
    },

    /// 只确定了一侧.
    Partial {
        /// 所在侧.
        side: Side,
        /// 连通域.
        component: BoneMask,
        /// 可信程度.
        confidence: Confidence,
    },

    /// 无法判定.
    Unresolved(UnresolvedReason),
}

impl Assignment {
    /// 按 (左, 右) 的形式展开结果, 缺失的一侧为 `None`.
    pub fn into_pair(self) -> (Option<BoneMask>, Option<BoneMask>) {
        match self {
            Assignment::Resolved { left, right, .. } => (Some(left), Some(right)),
            Assignment::Partial {
                side: Side::Left,
                component,
                ..
            } => (Some(component), None),
            Assignment::Partial {
                side: Side::Right,
                component,
                ..
            } => (None, Some(component)),
            Assignment::Unresolved(_) => (None, None),
        }
    }

    /// 可信程度. 无法判定时返回 `None`.
    pub fn confidence(&self) -> Option<Confidence> {
        match self {
            Assignment::Resolved { confidence, .. } | Assignment::Partial { confidence, .. } => {
                Some(*confidence)
            }
            Assignment::Unresolved(_) => None,
        }
    }

    /// 展开为 (可信程度, [(侧, 连通域)]), 侧按 (左, 右) 顺序排列.
    /// 无法判定时返回原因.
    pub fn into_sides(self) -> Result<(Confidence, Vec<(Side, BoneMask)>), UnresolvedReason> {
        match self {
            Assignment::Resolved {
                left,
                right,
                confidence,
            } => Ok((confidence, vec![(Side::Left, left), (Side::Right, right)])),
            Assignment::Partial {
                side,
                component,
                confidence,
            } => Ok((confidence, vec![(side, component)])),
            Assignment::Unresolved(reason) => Err(reason),
        }
    }

    /// 以 (第一个, 第二个) 连通域的顺序和给定的左右关系构建完整结果.
    #[inline]
    fn pair(first_is_left: bool, first: BoneMask, second: BoneMask, c: Confidence) -> Self {
        let (left, right) = if first_is_left {
            (first, second)
        } else {
            (second, first)
        };
        Assignment::Resolved {
            left,
            right,
            confidence: c,
        }
    }
}

/// 依据参照物 `references`, 判定连通域 `components` (最大, 第二大) 的左右侧.
///
/// # 判定规则
///
/// 1. 没有参照物: `Unresolved(NoReference)`.
/// 2. 只有一个连通域:
///    - 两侧参照物都在: 归属质心更近的一侧, **距离相等时归左侧**;
///    - 只有一侧参照物: 无条件归属该侧, 标记为待核实;
/// 3. 两个连通域:
///    - 两侧参照物都在: 只有当两个连通域分别严格更靠近不同侧的参照物时才接受,
///      否则 `Unresolved(Ambiguous)`, 不做猜测;
///    - 只有一侧参照物: 严格更靠近该参照物的连通域归属该侧, 另一个归属对侧,
///      标记为待核实.
/// 4. 有参照物但没有连通域: `Unresolved(NoComponent)`.
///
/// 只传入第二个连通域时, 它被当作唯一的连通域处理.
pub fn assign(
    references: &ReferenceSet,
    components: (Option<BoneMask>, Option<BoneMask>),
) -> Assignment {
    use Assignment::Unresolved;
    use UnresolvedReason::*;

    if references.is_empty() {
        return Unresolved(NoReference);
    }
    let left_ref = references.centroid(Side::Left);
    let right_ref = references.centroid(Side::Right);

    match components {
        (None, None) => Unresolved(NoComponent),
        (Some(only), None) | (None, Some(only)) => assign_one(left_ref, right_ref, only),
        (Some(first), Some(second)) => assign_two(left_ref, right_ref, first, second),
    }
}

/// 单个连通域的判定.
fn assign_one(left_ref: Option<Idx3dF>, right_ref: Option<Idx3dF>, only: BoneMask) -> Assignment {
    let Some(c) = only.centroid() else {
        return Assignment::Unresolved(UnresolvedReason::NoComponent);
    };
    let (side, confidence) = match (left_ref, right_ref) {
        (Some(l), Some(r)) => {
            let side = if distance(c, l) <= distance(c, r) {
                Side::Left
            } else {
                Side::Right
            };
            (side, Confidence::Geometric)
        }
        (Some(_), None) => (Side::Left, Confidence::ToBeVerified),
        (None, Some(_)) => (Side::Right, Confidence::ToBeVerified),
        (None, None) => return Assignment::Unresolved(UnresolvedReason::InvariantViolated),
    };
    Assignment::Partial {
        side,
        component: only,
        confidence,
    }
}

/// 两个连通域的判定.
fn assign_two(
    left_ref: Option<Idx3dF>,
    right_ref: Option<Idx3dF>,
    first: BoneMask,
    second: BoneMask,
) -> Assignment {
    let (Some(c1), Some(c2)) = (first.centroid(), second.centroid()) else {
        return Assignment::Unresolved(UnresolvedReason::NoComponent);
    };
    match (left_ref, right_ref) {
        (Some(l), Some(r)) => {
            let (d1l, d1r) = (distance(c1, l), distance(c1, r));
            let (d2l, d2r) = (distance(c2, l), distance(c2, r));
            if d1l < d1r && d2l > d2r {
                Assignment::pair(true, first, second, Confidence::Geometric)
            } else if d1l > d1r && d2l < d2r {
                Assignment::pair(false, first, second, Confidence::Geometric)
            } else {
                Assignment::Unresolved(UnresolvedReason::Ambiguous)
            }
        }
        (Some(l), None) => {
            let first_is_left = distance(c1, l) < distance(c2, l);
            Assignment::pair(first_is_left, first, second, Confidence::ToBeVerified)
        }
        (None, Some(r)) => {
            let first_is_right = distance(c1, r) < distance(c2, r);
            Assignment::pair(!first_is_right, first, second, Confidence::ToBeVerified)
        }
        (None, None) => Assignment::Unresolved(UnresolvedReason::InvariantViolated),
    }
}
