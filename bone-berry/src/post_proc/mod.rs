//! 后处理流程集合.

mod side;
mod split;

pub use side::{assign, Assignment, Confidence, Reference, ReferenceSet, UnresolvedReason};

pub use split::{label_components, split_two_largest, Labeled};
