//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx3d, Idx3dF};

pub use crate::data::{BoneMask, NiftiHeaderAttr, NiftiStore, VolumeStore};
pub use crate::{BoneClass, Side};

pub use crate::consts::gray::{MASK_BACKGROUND, MASK_FOREGROUND};
pub use crate::consts::{BONE_KEYWORDS, NII_GZ};

pub use crate::journal::{Event, FileJournal, Journal, Level, MemoryJournal};
pub use crate::pipeline::{run_root, BoneOutcome, RunSummary, SubjectPipeline, SubjectReport};
pub use crate::post_proc::{assign, split_two_largest, Assignment, Confidence, ReferenceSet};

pub use crate::dataset::{self, subject_loader};
